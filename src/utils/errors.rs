use crate::service::ServiceError;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PerseusError {
    #[error("Missing material: {} does not exist", .0.display())]
    MissingMaterial(PathBuf),

    #[error("Invalid credential for {}: {reason}", path.display())]
    InvalidCredential { path: PathBuf, reason: String },

    #[error("Corrupt key material in {}: {reason}", path.display())]
    CorruptKeyMaterial { path: PathBuf, reason: String },

    #[error("Key type mismatch in {}: expected {expected}, found {found}", path.display())]
    KeyTypeMismatch {
        path: PathBuf,
        expected: &'static str,
        found: String,
    },

    #[error(
        "Root certificate {} was not issued for root key {}",
        cert_path.display(),
        key_path.display()
    )]
    RootMismatch { cert_path: PathBuf, key_path: PathBuf },

    #[error("Root authority unavailable: {0}")]
    Authority(#[source] Box<PerseusError>),

    #[error("Key operation failed: {0}")]
    KeyOperation(String),

    #[error("Signing error for {subject}: {reason}")]
    Signing { subject: String, reason: String },

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Certificate parsing error: {0}")]
    CertParsing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{failed} of {total} sites failed")]
    PartialFailure { failed: usize, total: usize },
}

impl PerseusError {
    /// Errors that make every remaining subject of a run pointless to attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PerseusError::Authority(_) | PerseusError::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, PerseusError>;

/// Attach the failing path to an I/O error.
pub trait FsContext<T> {
    fn fs_context(self, path: &Path) -> Result<T>;
}

impl<T> FsContext<T> for std::io::Result<T> {
    fn fs_context(self, path: &Path) -> Result<T> {
        self.map_err(|source| PerseusError::Filesystem {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authority_errors_are_fatal() {
        let inner = PerseusError::InvalidCredential {
            path: PathBuf::from("/ssl/perseus_ca.key"),
            reason: "decryption failed".to_string(),
        };
        assert!(!inner.is_fatal());
        assert!(PerseusError::Authority(Box::new(inner)).is_fatal());

        let signing = PerseusError::Signing {
            subject: "blog.example.com".to_string(),
            reason: "bad extension".to_string(),
        };
        assert!(!signing.is_fatal());
    }

    #[test]
    fn test_filesystem_error_names_path() {
        let err = std::fs::read("/nonexistent/perseus/client.key")
            .fs_context(Path::new("/nonexistent/perseus/client.key"))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("/nonexistent/perseus/client.key"));
    }
}
