//! Application error types

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types organized by layer/domain
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("adb not found. Ensure 'adb' is in your PATH.")]
    AdbNotFound,

    #[error("adb process error: {message}")]
    Process { message: String },

    #[error("discovery error: {message}")]
    Discovery { message: String },
}

impl Error {
    pub fn process(message: impl Into<String>) -> Self {
        Self::Process {
            message: message.into(),
        }
    }

    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = Error::process("adb pair exited early");
        assert_eq!(err.to_string(), "adb process error: adb pair exited early");

        let err = Error::AdbNotFound;
        assert!(err.to_string().contains("adb not found"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(Error::process("x"), Error::Process { .. }));
        assert!(matches!(Error::discovery("x"), Error::Discovery { .. }));
    }
}
