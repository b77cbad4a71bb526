//! File service errors

use std::path::Path;

use thiserror::Error;

/// File service errors
#[derive(Debug, Error)]
pub enum FileServiceError {
    /// Directory creation/deletion or provider write failed
    #[error("Storage failure: {message}")]
    StorageFailure {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
    /// The caller asked for something that can never succeed
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type FileServiceResult<T> = Result<T, FileServiceError>;

impl FileServiceError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageFailure {
            message: message.into(),
            source: None,
        }
    }

    /// Storage failure caused by an IO error on `path`
    pub fn io(action: &str, path: &Path, source: std::io::Error) -> Self {
        Self::StorageFailure {
            message: format!("Unable to {} {}", action, path.display()),
            source: Some(source),
        }
    }

    pub fn is_storage_failure(&self) -> bool {
        matches!(self, Self::StorageFailure { .. })
    }

    pub fn is_invalid_operation(&self) -> bool {
        matches!(self, Self::InvalidOperation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_io_error_keeps_source() {
        let err = FileServiceError::io(
            "delete temporary working directory",
            Path::new("/tmp/ab"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );

        assert!(err.is_storage_failure());
        assert_eq!(
            err.to_string(),
            "Storage failure: Unable to delete temporary working directory /tmp/ab"
        );
        assert!(err.source().is_some());
    }
}
