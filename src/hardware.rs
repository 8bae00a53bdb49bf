//! Device fingerprint.
//!
//! The fingerprint binds server-side activations (and optionally offline
//! certificates) to one physical machine. It is a SHA-256 hex digest over
//! host identifiers that survive reboots:
//!
//! - hostname
//! - platform and CPU architecture
//! - MAC address of the first non-internal network interface
//! - primary CPU model string
//!
//! Every probe is best-effort. A missing identifier is left out of the hash
//! rather than failing, so [`get_hardware_id`] is total.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform;
#[cfg(target_os = "macos")]
use macos as platform;
#[cfg(target_os = "windows")]
use windows as platform;

/// Raw identifiers of the current machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub hostname: Option<String>,
    pub platform: String,
    pub arch: String,
    pub mac_address: Option<String>,
    pub cpu_model: Option<String>,
}

impl DeviceInfo {
    /// Probe the host. Never fails.
    pub fn collect() -> Self {
        Self {
            hostname: get_hostname(),
            platform: env::consts::OS.to_string(),
            arch: env::consts::ARCH.to_string(),
            mac_address: primary_mac_address(),
            cpu_model: cpu_model(),
        }
    }

    /// Name shown to the user in the activation list.
    pub fn device_name(&self) -> String {
        self.hostname
            .clone()
            .unwrap_or_else(|| format!("{}-{}", self.platform, self.arch))
    }

    /// SHA-256 hex digest over the available identifiers.
    pub fn fingerprint(&self) -> String {
        let components: Vec<&str> = [
            self.hostname.as_deref(),
            Some(self.platform.as_str()),
            Some(self.arch.as_str()),
            self.mac_address.as_deref(),
            self.cpu_model.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|c| !c.is_empty())
        .collect();

        let mut hasher = Sha256::new();
        hasher.update(components.join("|").as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Returns the fingerprint of the current machine.
pub fn get_hardware_id() -> String {
    DeviceInfo::collect().fingerprint()
}

fn get_hostname() -> Option<String> {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn primary_mac_address() -> Option<String> {
    platform::primary_mac_address()
        .ok()
        .flatten()
        .map(|mac| normalize_mac(&mac))
        .filter(|mac| is_usable_mac(mac))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn primary_mac_address() -> Option<String> {
    None
}

#[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
fn cpu_model() -> Option<String> {
    platform::get_cpu_model()
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn cpu_model() -> Option<String> {
    None
}

/// Lowercase, colon-separated.
pub(crate) fn normalize_mac(raw: &str) -> String {
    raw.trim().to_lowercase().replace('-', ":")
}

/// Rejects the all-zero address loopback interfaces report.
pub(crate) fn is_usable_mac(mac: &str) -> bool {
    let hex_digits: String = mac.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    hex_digits.len() == 12 && hex_digits.chars().any(|c| c != '0')
}
