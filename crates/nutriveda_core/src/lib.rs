pub mod clock;
pub mod config;
pub mod error_handler;
pub mod logging;
pub mod notifications;
pub mod observer;
pub mod processing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::NutrivedaConfig;
pub use error_handler::{ErrorCategory, NutrivedaError};
pub use notifications::{AppNotification, NotificationAction, NotificationStore, NotificationType};
pub use observer::{DetachHandle, Subscription};
pub use processing::{
    PipelineSnapshot, ProcessingError, ProcessingPipeline, ProcessingStage, UploadTracker,
    prescription_stages, stages_in_order,
};
