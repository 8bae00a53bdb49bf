//! Derived license state handed to the UI.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::features::{features_for, FeatureSet};
use crate::record::Plan;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    NotActivated,
    Trial,
    Valid,
    Grace,
    Expired,
    Invalid,
    Tampered,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::NotActivated => "not_activated",
            LicenseStatus::Trial => "trial",
            LicenseStatus::Valid => "valid",
            LicenseStatus::Grace => "grace",
            LicenseStatus::Expired => "expired",
            LicenseStatus::Invalid => "invalid",
            LicenseStatus::Tampered => "tampered",
        }
    }

    /// Statuses that let the application run.
    pub fn is_usable(&self) -> bool {
        matches!(
            self,
            LicenseStatus::Trial | LicenseStatus::Valid | LicenseStatus::Grace
        )
    }
}

impl fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the license as computed by the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseInfo {
    pub is_valid: bool,
    pub is_expired: bool,
    pub is_trial: bool,
    pub plan: Plan,
    pub expiry_date: Option<DateTime<Utc>>,
    pub days_remaining: i64,
    pub grace_remaining: i64,
    pub features: FeatureSet,
    pub status: LicenseStatus,
    pub message: String,
}

impl LicenseInfo {
    pub fn new(status: LicenseStatus, plan: Plan, message: impl Into<String>) -> Self {
        Self {
            is_valid: status.is_usable(),
            is_expired: status == LicenseStatus::Expired,
            is_trial: plan == Plan::Trial,
            plan,
            expiry_date: None,
            days_remaining: 0,
            grace_remaining: 0,
            features: features_for(plan),
            status,
            message: message.into(),
        }
    }

    pub fn with_expiry(mut self, expiry: Option<DateTime<Utc>>) -> Self {
        self.expiry_date = expiry;
        self
    }

    pub fn with_days_remaining(mut self, days: i64) -> Self {
        self.days_remaining = days;
        self
    }

    pub fn with_grace_remaining(mut self, days: i64) -> Self {
        self.grace_remaining = days;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_follows_status() {
        for (status, valid) in [
            (LicenseStatus::NotActivated, false),
            (LicenseStatus::Trial, true),
            (LicenseStatus::Valid, true),
            (LicenseStatus::Grace, true),
            (LicenseStatus::Expired, false),
            (LicenseStatus::Invalid, false),
            (LicenseStatus::Tampered, false),
        ] {
            let info = LicenseInfo::new(status, Plan::Monthly, "");
            assert_eq!(info.is_valid, valid, "{status}");
        }
    }

    #[test]
    fn serializes_for_ipc() {
        let info = LicenseInfo::new(LicenseStatus::NotActivated, Plan::Trial, "no license")
            .with_days_remaining(3);
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["status"], "not_activated");
        assert_eq!(json["plan"], "trial");
        assert_eq!(json["isTrial"], true);
        assert_eq!(json["daysRemaining"], 3);
        assert_eq!(json["features"]["maxOrders"], 100);
    }

    #[test]
    fn expired_flag() {
        let info = LicenseInfo::new(LicenseStatus::Expired, Plan::Annual, "expired");
        assert!(info.is_expired);
        assert!(!info.is_trial);
        assert!(!info.is_valid);
    }
}
