//! Error types for the remote license client.
//!
//! The license server answers every call with `{"ok": bool, ...}`; failures
//! carry `"error": "<code>"`. Transport failures are folded into the same
//! shape with [`ApiErrorCode::NetworkError`] so callers can degrade to offline
//! verification instead of propagating I/O errors.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes returned by the license server, plus the client-side
/// `network_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorCode {
    // === Transport (client-side) ===
    /// Timeout, connection failure, or an unreadable response
    NetworkError,

    // === License State ===
    /// No license with this key exists for the product
    LicenseNotFound,
    /// No activation for this key and device exists
    ActivationNotFound,
    /// License has been revoked
    Revoked,
    /// License has expired
    Expired,

    // === Activation Limits ===
    /// Every activation slot is in use
    MaxActivationsReached,

    // === Request Errors ===
    /// Server rejected the `X-Signature` header
    InvalidSignature,
    /// Missing or malformed request fields
    InvalidRequest,

    // === Server Errors ===
    ServerError,

    /// Unknown error code (forward compatibility)
    #[serde(other)]
    Unknown,
}

impl ApiErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorCode::NetworkError => "network_error",
            ApiErrorCode::LicenseNotFound => "license_not_found",
            ApiErrorCode::ActivationNotFound => "activation_not_found",
            ApiErrorCode::Revoked => "revoked",
            ApiErrorCode::Expired => "expired",
            ApiErrorCode::MaxActivationsReached => "max_activations_reached",
            ApiErrorCode::InvalidSignature => "invalid_signature",
            ApiErrorCode::InvalidRequest => "invalid_request",
            ApiErrorCode::ServerError => "server_error",
            ApiErrorCode::Unknown => "unknown",
        }
    }

    /// Parse a wire code; unrecognised codes map to `Unknown`.
    pub fn from_code(code: &str) -> Self {
        serde_json::from_value(serde_json::Value::String(code.to_string()))
            .unwrap_or(ApiErrorCode::Unknown)
    }

    /// Returns a default human-readable message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ApiErrorCode::NetworkError => "Could not reach the license server",
            ApiErrorCode::LicenseNotFound => "License not found",
            ApiErrorCode::ActivationNotFound => "This device is not activated for the license",
            ApiErrorCode::Revoked => "License has been revoked",
            ApiErrorCode::Expired => "License has expired",
            ApiErrorCode::MaxActivationsReached => {
                "License is already activated on the maximum number of devices"
            }
            ApiErrorCode::InvalidSignature => "License server rejected the request signature",
            ApiErrorCode::InvalidRequest => "License server rejected the request",
            ApiErrorCode::ServerError => "License server error",
            ApiErrorCode::Unknown => "Unknown error",
        }
    }

    /// True when the server no longer knows this license or activation.
    pub fn is_missing_server_state(&self) -> bool {
        matches!(
            self,
            ApiErrorCode::LicenseNotFound | ApiErrorCode::ActivationNotFound
        )
    }

    /// True when the license itself can no longer be used.
    pub fn is_license_invalid(&self) -> bool {
        matches!(self, ApiErrorCode::LicenseNotFound | ApiErrorCode::Revoked)
    }

    /// True when the caller should fall back to offline verification.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiErrorCode::NetworkError | ApiErrorCode::ServerError)
    }
}

impl fmt::Display for ApiErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed license server call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::NetworkError, message)
    }

    /// Build from the server's `error` field, keeping the raw code in the
    /// message when it is not one we recognise.
    pub fn from_server(code: &str) -> Self {
        let parsed = ApiErrorCode::from_code(code);
        let message = match parsed {
            ApiErrorCode::Unknown => code.to_string(),
            known => known.default_message().to_string(),
        };
        Self::new(parsed, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::network("license server request timed out")
        } else {
            ApiError::network(err.to_string())
        }
    }
}

/// Result of a remote call.
pub type ApiResult<T> = Result<T, ApiError>;
