//! The persisted license record.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Key of the singleton record.
pub const RECORD_ID: u32 = 1;

/// Subscription plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Trial,
    Monthly,
    Quarterly,
    Annual,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Trial => "trial",
            Plan::Monthly => "monthly",
            Plan::Quarterly => "quarterly",
            Plan::Annual => "annual",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Plan::Trial => "Trial",
            Plan::Monthly => "Monthly",
            Plan::Quarterly => "Quarterly",
            Plan::Annual => "Annual",
        }
    }

    /// Nominal length of one billing period.
    pub fn duration_days(&self) -> i64 {
        match self {
            Plan::Trial | Plan::Monthly => 30,
            Plan::Quarterly => 90,
            Plan::Annual => 365,
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, Plan::Trial)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trial" => Ok(Plan::Trial),
            "monthly" => Ok(Plan::Monthly),
            "quarterly" => Ok(Plan::Quarterly),
            "annual" | "yearly" => Ok(Plan::Annual),
            other => Err(format!("unknown plan '{other}'")),
        }
    }
}

/// Everything this installation remembers about its license.
///
/// `last_seen_monotonic` is the highest wall-clock reading (epoch ms) ever
/// observed. It only moves forward; a reading below it means the system clock
/// was set back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub id: u32,
    pub plan: Plan,
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_verified_at: Option<DateTime<Utc>>,
    /// Raw JSON of the last successful `verify` response.
    #[serde(default)]
    pub signed_token_blob: Option<String>,
    #[serde(default)]
    pub machine_fingerprint: String,
    #[serde(default)]
    pub last_seen_monotonic: i64,
    #[serde(default)]
    pub license_key: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub activation_id: Option<String>,
    /// Serialized offline certificate JSON.
    #[serde(default)]
    pub offline_certificate: Option<String>,
}

impl LicenseRecord {
    /// Fresh trial starting at `now`.
    pub fn new_trial(now: DateTime<Utc>, trial_days: u32, machine_fingerprint: &str) -> Self {
        Self {
            id: RECORD_ID,
            plan: Plan::Trial,
            expiry: Some(now + Duration::days(i64::from(trial_days))),
            last_verified_at: None,
            signed_token_blob: None,
            machine_fingerprint: machine_fingerprint.to_string(),
            last_seen_monotonic: now.timestamp_millis(),
            license_key: None,
            customer_email: None,
            activation_id: None,
            offline_certificate: None,
        }
    }

    /// True when a license key is stored.
    pub fn has_key(&self) -> bool {
        self.license_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty())
    }

    /// Forget the paid license; the record becomes "not activated".
    pub fn clear_license(&mut self) {
        self.plan = Plan::Trial;
        self.expiry = None;
        self.license_key = None;
        self.activation_id = None;
        self.customer_email = None;
        self.offline_certificate = None;
        self.signed_token_blob = None;
        self.last_verified_at = None;
    }

    /// Record a wall-clock reading. Returns false, leaving the mark untouched,
    /// when `now_ms` is behind it.
    pub fn observe_time(&mut self, now_ms: i64) -> bool {
        if now_ms < self.last_seen_monotonic {
            return false;
        }
        self.last_seen_monotonic = now_ms;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 8, 30, 0).unwrap()
    }

    #[test]
    fn plan_parsing_is_case_insensitive() {
        assert_eq!("Quarterly".parse::<Plan>().unwrap(), Plan::Quarterly);
        assert_eq!("ANNUAL".parse::<Plan>().unwrap(), Plan::Annual);
        assert_eq!(" monthly ".parse::<Plan>().unwrap(), Plan::Monthly);
        assert!("lifetime".parse::<Plan>().is_err());
    }

    #[test]
    fn plan_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Plan::Quarterly).unwrap(), "\"quarterly\"");
        assert_eq!(Plan::Quarterly.to_string(), "Quarterly");
        assert!(!Plan::Trial.is_paid());
        assert_eq!(Plan::Annual.duration_days(), 365);
    }

    #[test]
    fn new_trial_defaults() {
        let record = LicenseRecord::new_trial(now(), 30, "fp");
        assert_eq!(record.id, RECORD_ID);
        assert_eq!(record.plan, Plan::Trial);
        assert_eq!(record.expiry, Some(now() + Duration::days(30)));
        assert_eq!(record.last_seen_monotonic, now().timestamp_millis());
        assert!(!record.has_key());
    }

    #[test]
    fn observe_time_never_moves_backwards() {
        let mut record = LicenseRecord::new_trial(now(), 30, "fp");
        let mark = record.last_seen_monotonic;

        assert!(!record.observe_time(mark - 1));
        assert_eq!(record.last_seen_monotonic, mark);

        assert!(record.observe_time(mark));
        assert!(record.observe_time(mark + 10));
        assert_eq!(record.last_seen_monotonic, mark + 10);
    }

    #[test]
    fn clear_license_keeps_clock_mark() {
        let mut record = LicenseRecord::new_trial(now(), 30, "fp");
        record.license_key = Some("KEY".to_string());
        record.plan = Plan::Annual;
        record.activation_id = Some("act-1".to_string());
        record.last_seen_monotonic += 5;
        let mark = record.last_seen_monotonic;

        record.clear_license();
        assert!(!record.has_key());
        assert_eq!(record.plan, Plan::Trial);
        assert_eq!(record.expiry, None);
        assert_eq!(record.last_seen_monotonic, mark);
    }

    #[test]
    fn blank_key_is_not_a_key() {
        let mut record = LicenseRecord::new_trial(now(), 30, "fp");
        record.license_key = Some("  ".to_string());
        assert!(!record.has_key());
    }

    #[test]
    fn deserializes_sparse_record() {
        let json = r#"{"id": 1, "plan": "monthly", "expiry": "2025-02-01T00:00:00Z"}"#;
        let record: LicenseRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.plan, Plan::Monthly);
        assert_eq!(record.last_seen_monotonic, 0);
        assert_eq!(record.license_key, None);
    }
}
