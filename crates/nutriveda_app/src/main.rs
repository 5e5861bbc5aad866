use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};

use nutriveda_core::config::NutrivedaConfig;
use nutriveda_core::logging;
use nutriveda_core::processing::{PipelineSnapshot, UploadTracker};
use nutriveda_core::{Subscription, SystemClock};
use nutriveda_docs::ExportFormat;
use nutriveda_export::{
    DirectorySink, ExportOrchestrator, ExportSettings, InMemoryPlanSource, JobUpdate, PlanSource,
    RedownloadOutcome,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

fn init_services(config: &NutrivedaConfig) -> anyhow::Result<ExportOrchestrator> {
    let settings = ExportSettings::from_config(config).context("Invalid export settings")?;
    let export_dir = config.resolved_export_dir()?;
    info!("Exports will be saved to {}", export_dir.display());

    let orchestrator = ExportOrchestrator::new(
        settings,
        Arc::new(InMemoryPlanSource::with_samples()),
        Arc::new(DirectorySink::new(export_dir)),
        Arc::new(SystemClock),
    );
    info!(
        "ExportOrchestrator initialized ({} templates)",
        orchestrator.templates().all().len()
    );
    Ok(orchestrator)
}

fn log_progress() -> Subscription<JobUpdate> {
    Subscription::new(|update: &JobUpdate| {
        info!(job_id = %update.job_id, state = ?update.state, "{}%", update.progress);
    })
}

// ---------------------------------------------------------------------------
// Demo session
// ---------------------------------------------------------------------------

async fn simulate_upload(config: &NutrivedaConfig) -> anyhow::Result<()> {
    let mut tracker = UploadTracker::new();
    let observer = Subscription::new(|snap: &PipelineSnapshot| {
        if let Some(stage) = snap.current.and_then(|i| snap.stages.get(i)) {
            info!(
                stage = %stage.name,
                progress = stage.progress,
                overall = snap.overall_progress,
                "Processing prescription"
            );
        }
    });
    tracker.begin(
        "prescription.jpg",
        Duration::from_millis(config.upload_tick_ms),
        config.upload_step_percent,
        observer,
    )?;
    match tracker.finish().await {
        Some(snap) => info!("Prescription processed ({}%)", snap.overall_progress),
        None => warn!("Prescription processing was cancelled"),
    }
    Ok(())
}

async fn run_session(
    orchestrator: &ExportOrchestrator,
    config: &NutrivedaConfig,
) -> anyhow::Result<()> {
    let options = orchestrator.default_options()?;
    let format = orchestrator.settings().default_format;

    let single = orchestrator
        .export_single("plan-diabetes-001", format, options, log_progress())
        .await?;
    if let Some(e) = &single.delivery_failure {
        warn!("{e}; retrying from the cached copy");
        orchestrator.redownload(&single.entry)?;
    }
    info!("Saved {} ({} bytes)", single.entry.filename, single.entry.size);

    let minimal = orchestrator.apply_template("minimal")?;
    let plan_ids = InMemoryPlanSource::with_samples().plan_ids();
    let bulk = orchestrator
        .export_bulk(&plan_ids, ExportFormat::Spreadsheet, minimal, Subscription::detached())
        .await?;
    info!("Saved {} ({} bytes)", bulk.entry.filename, bulk.entry.size);

    if let RedownloadOutcome::Stale = orchestrator.redownload(&single.entry)? {
        warn!("{} expired before it could be downloaded again", single.entry.filename);
    }

    simulate_upload(config).await?;

    let notifications = orchestrator.notifications();
    let mut store = notifications.lock();
    info!("{} unread notification(s)", store.unread_count());
    for notification in store.all().iter().rev().filter(|n| !n.read) {
        info!(
            kind = ?notification.notification_type,
            "{}: {}",
            notification.title.as_deref().unwrap_or("Notice"),
            notification.message
        );
    }
    store.mark_all_read();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = NutrivedaConfig::load().context("Failed to load configuration")?;
    let _log_guard = logging::init_logging(&config).context("Failed to initialize logging")?;
    info!("Starting NutriVeda v{VERSION}");

    let orchestrator =
        init_services(&config).inspect_err(|e| error!("Service initialization failed: {e:#}"))?;
    let sweeper = orchestrator
        .downloads()
        .spawn_revocation_sweeper(Duration::from_secs(1));

    let result = run_session(&orchestrator, &config).await;
    sweeper.abort();
    if let Err(e) = &result {
        error!("Export session failed: {e:#}");
    }
    info!("History holds {} export(s)", orchestrator.history().len());
    result
}
