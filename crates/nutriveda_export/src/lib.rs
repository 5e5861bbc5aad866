pub mod download;
pub mod history;
pub mod job;
pub mod orchestrator;
pub mod source;
pub mod templates;

pub use download::{
    DirectorySink, DownloadError, DownloadManager, DownloadSink, RecordingSink,
    RedownloadOutcome, ResourceHandle, Revocation,
};
pub use history::{ExportHistory, ExportHistoryEntry};
pub use job::{ExportJob, JobError, JobScope, JobState, JobUpdate};
pub use orchestrator::{ExportError, ExportOrchestrator, ExportOutcome, ExportSettings};
pub use source::{InMemoryPlanSource, PlanSource, ResolvedPlans, resolve_plans};
pub use templates::{ExportTemplate, TemplateCatalog, TemplateError, built_in_templates};
