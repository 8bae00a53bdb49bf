//! Offline certificates.
//!
//! An offline certificate is a server-signed, time-bounded statement that a
//! license key is entitled on (optionally) one device. It lets the POS keep
//! working when the license server cannot be reached.
//!
//! ```json
//! {
//!   "payload": {
//!     "type": "offline_cert", "version": 1, "product_code": "POS",
//!     "license_key": "POS-XXXX-XXXX", "device_hash": "…",
//!     "device_name": "till-01", "app_version": "2.4.0",
//!     "issued_at": "2025-06-01T00:00:00.000Z",
//!     "valid_until": "2025-07-01T00:00:00.000Z",
//!     "constraints": { "max_activations": 3 }
//!   },
//!   "signature": "<base64 Ed25519 over canonical_json(payload)>",
//!   "alg": "Ed25519",
//!   "version": 1
//! }
//! ```
//!
//! The payload is kept as raw JSON until the signature has been checked, so
//! fields this crate does not know about still count towards the signature.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chrono::{DateTime, Utc};
use ring::signature::{self, UnparsedPublicKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::errors::{LicenseError, LicenseResult};
use crate::signing::canonical_json;

/// The only signature algorithm accepted.
pub const CERT_ALG: &str = "Ed25519";

/// Value of `payload.type` for offline certificates.
pub const CERT_TYPE: &str = "offline_cert";

/// DER prefix of an Ed25519 SubjectPublicKeyInfo; the raw key follows it.
const ED25519_SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Why a certificate was rejected. Gates are checked in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CertificateError {
    #[error("certificate is malformed or uses an unsupported algorithm")]
    BadCertificate,
    #[error("certificate signature does not verify")]
    BadSignature,
    #[error("not an offline certificate")]
    InvalidCertType,
    #[error("offline certificate has expired")]
    ExpiredOfflineCert,
    #[error("certificate was issued for a different device")]
    DeviceMismatch,
}

impl CertificateError {
    pub fn code(&self) -> &'static str {
        match self {
            CertificateError::BadCertificate => "bad_certificate",
            CertificateError::BadSignature => "bad_signature",
            CertificateError::InvalidCertType => "invalid_cert_type",
            CertificateError::ExpiredOfflineCert => "expired_offline_cert",
            CertificateError::DeviceMismatch => "device_mismatch",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_activations: Option<u32>,
}

/// Typed view of a verified certificate payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificatePayload {
    #[serde(rename = "type")]
    pub cert_type: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub product_code: String,
    pub license_key: String,
    /// Empty when the certificate is not bound to a device.
    #[serde(default)]
    pub device_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(with = "cert_time")]
    pub issued_at: DateTime<Utc>,
    #[serde(with = "cert_time")]
    pub valid_until: DateTime<Utc>,
    #[serde(default)]
    pub constraints: CertificateConstraints,
}

fn default_version() -> u32 {
    1
}

/// Certificate as stored on disk or received from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflineCertificate {
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
}

impl OfflineCertificate {
    /// Parse certificate JSON. Syntax errors count as a malformed certificate.
    pub fn from_json(json: &str) -> Result<Self, CertificateError> {
        serde_json::from_str(json).map_err(|_| CertificateError::BadCertificate)
    }

    pub fn to_json(&self) -> LicenseResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Issue a certificate over `payload` with an Ed25519 PKCS#8 private key.
    ///
    /// Used by issuing tools and tests; the POS itself only verifies.
    pub fn sign(payload: &CertificatePayload, pkcs8_private_key: &[u8]) -> LicenseResult<Self> {
        let key_pair = signature::Ed25519KeyPair::from_pkcs8(pkcs8_private_key)
            .map_err(|e| LicenseError::EncryptionError(format!("invalid Ed25519 key: {e}")))?;
        let payload = serde_json::to_value(payload)?;
        let message = canonical_json(&payload)?;
        let sig = key_pair.sign(&message);

        Ok(Self {
            payload,
            signature: Some(B64.encode(sig.as_ref())),
            alg: Some(CERT_ALG.to_string()),
            version: Some(Value::from(1)),
        })
    }
}

/// Ed25519 public key trusted to sign offline certificates.
#[derive(Clone, PartialEq, Eq)]
pub struct TrustedKey([u8; 32]);

impl std::fmt::Debug for TrustedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TrustedKey({})", hex::encode(self.0))
    }
}

impl TrustedKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Accepts a PEM `PUBLIC KEY`, 64 hex characters, or base64 of either the
    /// raw 32-byte key or its DER SubjectPublicKeyInfo.
    pub fn parse(text: &str) -> LicenseResult<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LicenseError::ConfigError(
                "trusted public key is empty".to_string(),
            ));
        }

        let bytes = if text.starts_with("-----BEGIN") {
            let body: String = text
                .lines()
                .filter(|line| !line.starts_with("-----"))
                .map(str::trim)
                .collect();
            B64.decode(body)
                .map_err(|e| LicenseError::ConfigError(format!("invalid PEM public key: {e}")))?
        } else if text.len() == 64 && text.chars().all(|c| c.is_ascii_hexdigit()) {
            hex::decode(text)
                .map_err(|e| LicenseError::ConfigError(format!("invalid hex public key: {e}")))?
        } else {
            B64.decode(text)
                .map_err(|e| LicenseError::ConfigError(format!("invalid base64 public key: {e}")))?
        };

        Self::from_der_or_raw(&bytes)
    }

    fn from_der_or_raw(bytes: &[u8]) -> LicenseResult<Self> {
        let raw = match bytes.len() {
            32 => bytes,
            44 if bytes.starts_with(&ED25519_SPKI_PREFIX) => &bytes[ED25519_SPKI_PREFIX.len()..],
            n => {
                return Err(LicenseError::ConfigError(format!(
                    "public key is not an Ed25519 key ({n} bytes)"
                )))
            }
        };
        let mut key = [0u8; 32];
        key.copy_from_slice(raw);
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Verify `cert` against `key` at time `now`.
///
/// Gates, first failure wins: structure, signature, type, time window.
pub fn verify_certificate(
    cert: &OfflineCertificate,
    key: &TrustedKey,
    now: DateTime<Utc>,
) -> Result<CertificatePayload, CertificateError> {
    // Structure
    let signature_b64 = match (&cert.payload, cert.signature.as_deref(), cert.alg.as_deref()) {
        (Value::Object(_), Some(sig), Some(CERT_ALG)) if !sig.trim().is_empty() => sig.trim(),
        _ => return Err(CertificateError::BadCertificate),
    };

    // Signature
    let signature = B64
        .decode(signature_b64)
        .map_err(|_| CertificateError::BadSignature)?;
    let message = canonical_json(&cert.payload).map_err(|_| CertificateError::BadCertificate)?;
    UnparsedPublicKey::new(&signature::ED25519, key.as_bytes())
        .verify(&message, &signature)
        .map_err(|_| CertificateError::BadSignature)?;

    // Type
    if cert.payload.get("type").and_then(Value::as_str) != Some(CERT_TYPE) {
        return Err(CertificateError::InvalidCertType);
    }

    let payload: CertificatePayload = serde_json::from_value(cert.payload.clone())
        .map_err(|_| CertificateError::BadCertificate)?;

    // Time window
    if now > payload.valid_until {
        return Err(CertificateError::ExpiredOfflineCert);
    }

    Ok(payload)
}

/// [`verify_certificate`] plus device binding. A certificate with an empty
/// `device_hash` is valid on any device.
pub fn verify_for_device(
    cert: &OfflineCertificate,
    key: &TrustedKey,
    now: DateTime<Utc>,
    device_hash: &str,
) -> Result<CertificatePayload, CertificateError> {
    let payload = verify_certificate(cert, key, now)?;
    if !payload.device_hash.is_empty() && payload.device_hash != device_hash {
        return Err(CertificateError::DeviceMismatch);
    }
    Ok(payload)
}

/// Certificate timestamps: ISO 8601 strings, or epoch milliseconds from older issuers.
mod cert_time {
    use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Millis(i64),
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(de::Error::custom),
            Raw::Millis(ms) => Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| de::Error::custom("timestamp out of range")),
        }
    }
}
