//! Crate-wide error type.
//!
//! Background verification never surfaces these: it reports problems through
//! [`LicenseInfo::status`](crate::status::LicenseInfo). `LicenseError` is for
//! operations whose caller needs a success/failure answer (activation,
//! certificate import, configuration, storage).

use thiserror::Error;

use crate::certificate::CertificateError;
use crate::client::errors::ApiError;

#[derive(Debug, Error)]
pub enum LicenseError {
    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("storage error: {0}")]
    StorageError(#[from] std::io::Error),

    #[error("encryption error: {0}")]
    EncryptionError(String),

    #[error("decryption error: {0}")]
    DecryptionError(String),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("offline certificate rejected: {0}")]
    Certificate(#[from] CertificateError),

    #[error("license server error: {0}")]
    Api(#[from] ApiError),

    #[error("no license key is activated on this device")]
    NotActivated,

    #[error("invalid license: {0}")]
    InvalidLicense(String),

    #[error("trial unavailable: {0}")]
    TrialUnavailable(String),
}

/// Convenience alias used throughout the crate.
pub type LicenseResult<T> = Result<T, LicenseError>;

impl LicenseError {
    /// Short machine-readable code, handed to the IPC layer alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            LicenseError::ConfigError(_) => "config_error",
            LicenseError::StorageError(_) => "storage_error",
            LicenseError::EncryptionError(_) => "encryption_error",
            LicenseError::DecryptionError(_) => "decryption_error",
            LicenseError::SerializationError(_) => "serialization_error",
            LicenseError::Certificate(e) => e.code(),
            LicenseError::Api(e) => e.code.as_str(),
            LicenseError::NotActivated => "not_activated",
            LicenseError::InvalidLicense(_) => "invalid_license",
            LicenseError::TrialUnavailable(_) => "trial_unavailable",
        }
    }
}
