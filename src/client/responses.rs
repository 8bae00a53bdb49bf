//! Response types for the remote license client.
//!
//! Every response is a JSON object with a boolean `ok`. These types describe
//! the endpoint-specific fields of successful responses; `ok` itself and the
//! failure `error` code are handled by the client.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::certificate::OfflineCertificate;

/// `issue` → the new license key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueResponse {
    pub license_key: String,
}

/// Plan metadata attached to a license on the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LicenseMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    /// Anything else the server sends along.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `verify` → current server-side view of a license.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResponse {
    /// "active", "revoked", "expired", …
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default)]
    pub metadata: LicenseMetadata,
    #[serde(default, alias = "activation_count", skip_serializing_if = "Option::is_none")]
    pub activations_used: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_activations: Option<u32>,
}

impl VerifyResponse {
    pub fn is_revoked(&self) -> bool {
        self.status.eq_ignore_ascii_case("revoked")
    }

    /// Parsed `expires_at`, if present and readable.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_at.as_deref().and_then(parse_server_time)
    }
}

/// `activate` → the activation id, sometimes with the license's plan data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivateResponse {
    pub activation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<LicenseMetadata>,
}

impl ActivateResponse {
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_at.as_deref().and_then(parse_server_time)
    }
}

/// Body-less success (`deactivate`, `revoke`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `heartbeat` → server time, useful for spotting local clock drift.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_time: Option<String>,
}

/// `generate_offline_certificate` → a signed certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateResponse {
    pub certificate: OfflineCertificate,
}

/// One device activation of a license.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activation_id: Option<String>,
    pub device_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<String>,
}

/// `list_activations` → every device the license is active on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListActivationsResponse {
    #[serde(default)]
    pub activations: Vec<Activation>,
}

/// Parse a server timestamp: RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC), or a bare
/// date meaning midnight UTC.
pub fn parse_server_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
