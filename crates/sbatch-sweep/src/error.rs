//! Error handling for sweep launches.

use thiserror::Error;

/// Result type for launcher operations.
pub type LaunchResult<T> = Result<T, LaunchError>;

/// Errors that can occur while resolving, rendering or submitting a sweep.
#[derive(Error, Debug)]
pub enum LaunchError {
    /// Invalid or conflicting launch options. Raised before anything touches disk.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The inputs are not enough to produce a script.
    #[error("Render error: {0}")]
    Render(String),

    /// The submission binary is missing or cannot be executed.
    #[error("Environment error: {0}")]
    Environment(String),

    /// The scheduler rejected the script.
    #[error("Submission failed: {stderr}")]
    Submission { stderr: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LaunchError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        LaunchError::Configuration(message.into())
    }

    /// The scheduler's standard error text, if this is a rejected submission.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            LaunchError::Submission { stderr } => Some(stderr),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LaunchError::Configuration("gpus must be positive".to_string());
        assert_eq!(err.to_string(), "Configuration error: gpus must be positive");

        let err = LaunchError::Submission {
            stderr: "Invalid partition".to_string(),
        };
        assert_eq!(err.to_string(), "Submission failed: Invalid partition");
        assert_eq!(err.stderr(), Some("Invalid partition"));

        let err = LaunchError::Render("no tasks".to_string());
        assert!(err.stderr().is_none());
    }
}
