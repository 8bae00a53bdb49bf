//! Request signing and canonical JSON.
//!
//! Every call to the license server carries
//! `X-Signature: base64(HMAC-SHA256(secret, canonical_json(body)))`.
//! The same canonical encoding is what offline certificate signatures cover.
//!
//! Canonical form: compact JSON (no insignificant whitespace), object keys
//! sorted lexicographically by their UTF-8 bytes at every depth, numbers as
//! serde_json prints them. The server must canonicalize identically or every
//! signature check fails.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use ring::hmac;
use serde::Serialize;
use serde_json::Value;

use crate::errors::{LicenseError, LicenseResult};

/// Header the signature travels in.
pub const SIGNATURE_HEADER: &str = "X-Signature";

/// Serialize `value` to canonical JSON bytes.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> LicenseResult<Vec<u8>> {
    let value = serde_json::to_value(value)?;
    let mut out = Vec::new();
    write_canonical(&value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> LicenseResult<()> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_canonical(val, out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        scalar => serde_json::to_writer(&mut *out, scalar)?,
    }
    Ok(())
}

/// HMAC-SHA256 signer keyed with the shared product secret.
#[derive(Clone)]
pub struct RequestSigner {
    key: hmac::Key,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner").finish_non_exhaustive()
    }
}

impl RequestSigner {
    pub fn new(secret: &[u8]) -> LicenseResult<Self> {
        if secret.is_empty() {
            return Err(LicenseError::ConfigError(
                "request signing secret cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            key: hmac::Key::new(hmac::HMAC_SHA256, secret),
        })
    }

    /// Base64 HMAC over the canonical encoding of `body`.
    pub fn sign<T: Serialize + ?Sized>(&self, body: &T) -> LicenseResult<String> {
        let bytes = canonical_json(body)?;
        Ok(self.sign_bytes(&bytes))
    }

    /// Base64 HMAC over already-canonical bytes.
    pub fn sign_bytes(&self, bytes: &[u8]) -> String {
        B64.encode(hmac::sign(&self.key, bytes).as_ref())
    }

    /// Constant-time check of a base64 signature against `body`.
    pub fn verify<T: Serialize + ?Sized>(&self, body: &T, signature: &str) -> bool {
        let Ok(tag) = B64.decode(signature.trim()) else {
            return false;
        };
        match canonical_json(body) {
            Ok(bytes) => hmac::verify(&self.key, &bytes, &tag).is_ok(),
            Err(_) => false,
        }
    }
}
