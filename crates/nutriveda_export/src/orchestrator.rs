//! Export orchestration: plans → document → artifact → download + history.
//!
//! Each call to [`ExportOrchestrator::export_single`] or
//! [`ExportOrchestrator::export_bulk`] runs one independent [`ExportJob`].
//! Jobs share nothing but the history and the download cache; there is no
//! queueing or de-duplication.

use nutriveda_core::{
    AppNotification, Clock, NotificationStore, NotificationType, NutrivedaConfig, NutrivedaError,
    Subscription,
};
use nutriveda_docs::{
    BuildContext, BuildError, ClinicBranding, ExportFormat, ExportOptions, RenderError,
    ReportDocument, build_document, renderer_for, try_build_single,
};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::download::{
    DownloadError, DownloadManager, DownloadSink, RedownloadOutcome, ResourceHandle,
};
use crate::history::{ExportHistory, ExportHistoryEntry};
use crate::job::{ExportJob, JobError, JobScope, JobState, JobUpdate};
use crate::source::{PlanSource, resolve_plans};
use crate::templates::{TemplateCatalog, TemplateError};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error("Invalid export settings: {0}")]
    Config(String),
}

impl From<&ExportError> for NutrivedaError {
    fn from(err: &ExportError) -> Self {
        match err {
            ExportError::Build(e) => NutrivedaError::InvalidData(e.to_string()),
            ExportError::Render(e) => NutrivedaError::Render(e.to_string()),
            ExportError::Download(e) => NutrivedaError::Download(e.to_string()),
            ExportError::Template(e) => NutrivedaError::Config(e.to_string()),
            ExportError::Job(e) => NutrivedaError::Internal(e.to_string()),
            ExportError::Config(msg) => NutrivedaError::Config(msg.clone()),
        }
    }
}

impl ExportError {
    /// Toast text for this failure.
    pub fn user_message(&self) -> String {
        NutrivedaError::from(self).user_message()
    }

    pub fn notification_type(&self) -> NotificationType {
        NutrivedaError::from(self).notification_type()
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSettings {
    /// Pause between progress ticks.
    pub step_delay: Duration,
    pub retention: Duration,
    pub history_limit: usize,
    pub default_format: ExportFormat,
    pub default_template: String,
    pub branding: ClinicBranding,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            step_delay: Duration::from_millis(120),
            retention: Duration::from_secs(300),
            history_limit: 50,
            default_format: ExportFormat::Pdf,
            default_template: "comprehensive".into(),
            branding: ClinicBranding::default(),
        }
    }
}

impl ExportSettings {
    pub fn from_config(config: &NutrivedaConfig) -> Result<Self, ExportError> {
        let default_format = config
            .default_format
            .parse::<ExportFormat>()
            .map_err(ExportError::Config)?;
        Ok(Self {
            step_delay: Duration::from_millis(config.progress_step_delay_ms),
            retention: Duration::from_secs(config.retention_secs),
            history_limit: config.history_limit,
            default_format,
            default_template: config.default_template.clone(),
            branding: ClinicBranding {
                clinic_name: config.clinic_name.clone(),
                practitioner: config.practitioner.clone(),
                contact: config.clinic_contact.clone(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// A finished job and the history entry it produced.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub job: ExportJob,
    pub entry: ExportHistoryEntry,
    /// Plans left out of a bulk export.
    pub warnings: Vec<String>,
    /// Set when the sink refused the file. The artifact stays cached under
    /// `entry.resource_handle` and can be retried with
    /// [`ExportOrchestrator::redownload`].
    pub delivery_failure: Option<DownloadError>,
}

/// What a successful run hands back to [`ExportOrchestrator::run`].
struct Finished {
    entry: ExportHistoryEntry,
    warnings: Vec<String>,
    delivery_failure: Option<DownloadError>,
}

#[derive(Clone)]
pub struct ExportOrchestrator {
    settings: ExportSettings,
    source: Arc<dyn PlanSource>,
    templates: Arc<Mutex<TemplateCatalog>>,
    history: ExportHistory,
    downloads: DownloadManager,
    notifications: Arc<Mutex<NotificationStore>>,
    clock: Arc<dyn Clock>,
}

impl ExportOrchestrator {
    pub fn new(
        settings: ExportSettings,
        source: Arc<dyn PlanSource>,
        sink: Arc<dyn DownloadSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let history = ExportHistory::new(settings.history_limit);
        let downloads = DownloadManager::new(sink, Arc::clone(&clock), settings.retention);
        Self {
            settings,
            source,
            templates: Arc::new(Mutex::new(TemplateCatalog::new())),
            history,
            downloads,
            notifications: Arc::new(Mutex::new(NotificationStore::new())),
            clock,
        }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn history(&self) -> &ExportHistory {
        &self.history
    }

    pub fn downloads(&self) -> &DownloadManager {
        &self.downloads
    }

    pub fn notifications(&self) -> Arc<Mutex<NotificationStore>> {
        Arc::clone(&self.notifications)
    }

    pub fn templates(&self) -> MutexGuard<'_, TemplateCatalog> {
        self.templates.lock()
    }

    /// Options selected by the named template.
    pub fn apply_template(&self, name: &str) -> Result<ExportOptions, ExportError> {
        let options = self.templates.lock().options_for(name)?;
        debug!(template = name, ?options, "Applied export template");
        Ok(options)
    }

    /// Options of the configured default template.
    pub fn default_options(&self) -> Result<ExportOptions, ExportError> {
        self.apply_template(&self.settings.default_template)
    }

    pub async fn export_single(
        &self,
        plan_id: &str,
        format: ExportFormat,
        options: ExportOptions,
        observer: Subscription<JobUpdate>,
    ) -> Result<ExportOutcome, ExportError> {
        self.run(JobScope::Single, vec![plan_id.to_string()], format, options, observer)
            .await
    }

    pub async fn export_bulk(
        &self,
        plan_ids: &[String],
        format: ExportFormat,
        options: ExportOptions,
        observer: Subscription<JobUpdate>,
    ) -> Result<ExportOutcome, ExportError> {
        self.run(JobScope::Bulk, plan_ids.to_vec(), format, options, observer)
            .await
    }

    /// Run the export a (typically stale) history entry describes again.
    pub async fn regenerate(
        &self,
        entry: &ExportHistoryEntry,
        observer: Subscription<JobUpdate>,
    ) -> Result<ExportOutcome, ExportError> {
        info!(entry_id = %entry.id, "Regenerating export");
        self.run(
            entry.scope,
            entry.plan_ids.clone(),
            entry.format,
            entry.options,
            observer,
        )
        .await
    }

    /// Re-deliver a history entry. A stale entry is reported through a
    /// notification offering regeneration.
    pub fn redownload(&self, entry: &ExportHistoryEntry) -> Result<RedownloadOutcome, ExportError> {
        match self.downloads.redownload(entry) {
            Ok(RedownloadOutcome::Stale) => {
                self.notify(
                    AppNotification::new(
                        NotificationType::Info,
                        format!("{} has expired. Regenerate it to download again.", entry.filename),
                    )
                    .with_title("Download expired")
                    .with_action("Regenerate", entry.id.clone()),
                );
                Ok(RedownloadOutcome::Stale)
            }
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let err = ExportError::from(e);
                self.notify_failure(&err);
                Err(err)
            }
        }
    }

    fn notify(&self, notification: AppNotification) {
        self.notifications
            .lock()
            .push(notification.at(self.clock.now()));
    }

    fn notify_failure(&self, err: &ExportError) {
        self.notify(
            AppNotification::new(err.notification_type(), err.user_message())
                .with_title("Export failed"),
        );
    }

    async fn run(
        &self,
        scope: JobScope,
        plan_ids: Vec<String>,
        format: ExportFormat,
        options: ExportOptions,
        observer: Subscription<JobUpdate>,
    ) -> Result<ExportOutcome, ExportError> {
        let mut job = ExportJob::new(format, scope, plan_ids, self.clock.now());
        info!(
            job_id = %job.id,
            ?scope,
            %format,
            plans = job.target_plan_ids.len(),
            "Export started"
        );
        observer.notify(&job.update());

        match self.drive(&mut job, &options, &observer).await {
            Ok(Finished {
                entry,
                warnings,
                delivery_failure,
            }) => {
                info!(job_id = %job.id, file = %entry.filename, size = entry.size, "Export complete");
                match &delivery_failure {
                    None => self.notify(
                        AppNotification::new(
                            NotificationType::Success,
                            format!("{} is ready", entry.filename),
                        )
                        .with_title("Export complete")
                        .with_action("Download again", entry.id.clone()),
                    ),
                    Some(e) => self.notify(
                        AppNotification::new(
                            NotificationType::Error,
                            format!("{e}. The file was kept; try the download again."),
                        )
                        .with_title("Download failed")
                        .with_action("Retry download", entry.id.clone()),
                    ),
                }
                if !warnings.is_empty() {
                    self.notify(
                        AppNotification::new(NotificationType::Warning, warnings.join("; "))
                            .with_title(format!("{} plan(s) left out", warnings.len())),
                    );
                }
                Ok(ExportOutcome {
                    job,
                    entry,
                    warnings,
                    delivery_failure,
                })
            }
            Err(err) => {
                warn!(job_id = %job.id, "Export failed: {err}");
                if !job.is_terminal() && job.fail(err.to_string()).is_ok() {
                    observer.notify(&job.update());
                }
                self.notify_failure(&err);
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        job: &mut ExportJob,
        options: &ExportOptions,
        observer: &Subscription<JobUpdate>,
    ) -> Result<Finished, ExportError> {
        self.enter(job, JobState::Building, observer)?;
        let doc = self.build(job, options)?;
        self.tick(job, 15, observer).await;
        self.tick(job, 30, observer).await;

        self.enter(job, JobState::Rendering, observer)?;
        let artifact = renderer_for(job.format).render(&doc)?;
        self.tick(job, 60, observer).await;
        self.tick(job, 90, observer).await;

        self.enter(job, JobState::Finalizing, observer)?;
        let filename = artifact.suggested_filename.clone();
        let size = artifact.size();
        let (handle, delivery_failure) = self.present(artifact);
        self.tick(job, 95, observer).await;

        let entry = ExportHistoryEntry {
            id: Uuid::new_v4().to_string(),
            filename,
            format: job.format,
            timestamp: self.clock.now(),
            size,
            resource_handle: Some(handle),
            scope: job.scope,
            plan_ids: job.target_plan_ids.clone(),
            options: *options,
        };
        self.history.append(entry.clone());
        self.enter(job, JobState::Complete, observer)?;
        Ok(Finished {
            entry,
            warnings: doc.warnings,
            delivery_failure,
        })
    }

    fn build(&self, job: &ExportJob, options: &ExportOptions) -> Result<ReportDocument, ExportError> {
        let ctx = BuildContext::new(self.clock.now(), self.settings.branding.clone());
        match job.scope {
            JobScope::Single => {
                let id = job.target_plan_ids.first().map_or("", String::as_str);
                let plan = self
                    .source
                    .plan(id)
                    .ok_or_else(|| BuildError::UnknownPlan(id.to_string()))?;
                Ok(try_build_single(&plan, options, &ctx)?)
            }
            JobScope::Bulk => {
                let resolved = resolve_plans(self.source.as_ref(), &job.target_plan_ids);
                let mut doc = build_document(&resolved.plans, options, &ctx);
                for id in resolved.missing {
                    warn!(job_id = %job.id, plan_id = %id, "Plan not found; leaving it out");
                    doc.warnings.push(BuildError::UnknownPlan(id).to_string());
                }
                Ok(doc)
            }
        }
    }

    /// Hand the artifact to the download manager. A refused download keeps
    /// the cached copy so the history entry can retry it.
    fn present(
        &self,
        artifact: nutriveda_docs::BinaryArtifact,
    ) -> (ResourceHandle, Option<DownloadError>) {
        match self.downloads.present(artifact) {
            Ok(handle) => (handle, None),
            Err(e) => {
                let DownloadError::TriggerFailed { handle, .. } = &e;
                warn!(handle = %handle.id, "Keeping artifact for a retry: {e}");
                (handle.clone(), Some(e))
            }
        }
    }

    fn enter(
        &self,
        job: &mut ExportJob,
        state: JobState,
        observer: &Subscription<JobUpdate>,
    ) -> Result<(), ExportError> {
        job.transition(state)?;
        debug!(job_id = %job.id, ?state, progress = job.progress, "Export stage");
        observer.notify(&job.update());
        Ok(())
    }

    async fn tick(&self, job: &mut ExportJob, value: u8, observer: &Subscription<JobUpdate>) {
        let before = job.progress;
        if job.set_progress(value) != before {
            observer.notify(&job.update());
        }
        if !self.settings.step_delay.is_zero() {
            tokio::time::sleep(self.settings.step_delay).await;
        }
    }
}
