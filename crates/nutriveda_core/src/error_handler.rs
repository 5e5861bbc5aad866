use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notifications::NotificationType;

/// Top-level application error type.
#[derive(Error, Debug)]
pub enum NutrivedaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid plan data: {0}")]
    InvalidData(String),

    #[error("Document generation failed: {0}")]
    Render(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Classification of errors for logging and user display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Malformed or missing input supplied by another screen.
    DataError,
    /// Document or workbook could not be produced.
    RenderError,
    /// The host could not hand the file to the user.
    DeliveryError,
    /// Internal system error (file I/O, etc.).
    SystemError,
    /// Invalid or missing configuration.
    ConfigError,
}

impl NutrivedaError {
    /// Returns the broad error category for routing and display purposes.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::ConfigError,
            Self::InvalidData(_) => ErrorCategory::DataError,
            Self::Render(_) => ErrorCategory::RenderError,
            Self::Download(_) => ErrorCategory::DeliveryError,
            Self::FileSystem(_) => ErrorCategory::SystemError,
            Self::Internal(_) => ErrorCategory::SystemError,
        }
    }

    /// Returns a user-friendly message (hides internal details).
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(msg) => format!("Configuration issue: {msg}"),
            Self::InvalidData(msg) => format!("Some plan data could not be used: {msg}"),
            Self::Render(_) => "The document could not be generated. Please try again.".into(),
            Self::Download(_) => {
                "The download could not be started. Retry it from the export history.".into()
            }
            Self::FileSystem(msg) => format!("File error: {msg}"),
            Self::Internal(_) => "An unexpected error occurred.".into(),
        }
    }

    /// How the error should be shown as a toast.
    pub fn notification_type(&self) -> NotificationType {
        match self.category() {
            ErrorCategory::DataError => NotificationType::Warning,
            _ => NotificationType::Error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_route_by_variant() {
        assert_eq!(
            NutrivedaError::Config("x".into()).category(),
            ErrorCategory::ConfigError
        );
        assert_eq!(
            NutrivedaError::InvalidData("x".into()).category(),
            ErrorCategory::DataError
        );
        assert_eq!(
            NutrivedaError::Render("x".into()).category(),
            ErrorCategory::RenderError
        );
        assert_eq!(
            NutrivedaError::Download("x".into()).category(),
            ErrorCategory::DeliveryError
        );
        assert_eq!(
            NutrivedaError::FileSystem("x".into()).category(),
            ErrorCategory::SystemError
        );
    }

    #[test]
    fn user_message_hides_internal_details() {
        let err = NutrivedaError::Render("XlsxError: sheet name too long".into());
        assert!(!err.user_message().contains("XlsxError"));

        let err = NutrivedaError::Internal("lock poisoned".into());
        assert_eq!(err.user_message(), "An unexpected error occurred.");
    }

    #[test]
    fn data_errors_are_warnings() {
        let err = NutrivedaError::InvalidData("missing name".into());
        assert_eq!(err.notification_type(), NotificationType::Warning);
        let err = NutrivedaError::Download("denied".into());
        assert_eq!(err.notification_type(), NotificationType::Error);
    }

    #[test]
    fn display_includes_prefix() {
        let err = NutrivedaError::Config("bad value".into());
        assert_eq!(err.to_string(), "Configuration error: bad value");
    }
}
