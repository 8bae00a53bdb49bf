//! Plan tiers and the entitlements they unlock.
//!
//! The mapping is a static table: no configuration, no I/O. Gating helpers
//! take the current [`LicenseInfo`] so that an invalid, expired or tampered
//! license unlocks nothing regardless of plan.
//!
//! | plan      | users | orders | export | backup | templates | installments | reports | email | phone |
//! |-----------|-------|--------|--------|--------|-----------|--------------|---------|-------|-------|
//! | trial     | 1     | 100    |        |        |           |              |         |       |       |
//! | monthly   | 3     | ∞      | ✓      | ✓      |           | ✓            |         | ✓     |       |
//! | quarterly | 5     | ∞      | ✓      | ✓      | ✓         | ✓            | ✓       | ✓     |       |
//! | annual    | ∞     | ∞      | ✓      | ✓      | ✓         | ✓            | ✓       | ✓     | ✓     |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::record::Plan;
use crate::status::LicenseInfo;

/// Limit value meaning "no limit".
pub const UNLIMITED: i64 = -1;

/// Entitlements of one plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureSet {
    pub max_users: i64,
    pub max_orders: i64,
    pub can_export: bool,
    pub can_backup: bool,
    pub multiple_templates: bool,
    pub installments: bool,
    pub advanced_reports: bool,
    pub email_support: bool,
    pub phone_support: bool,
}

impl FeatureSet {
    /// Check if this set includes a boolean feature.
    pub fn has(&self, feature: Feature) -> bool {
        match feature {
            Feature::Export => self.can_export,
            Feature::Backup => self.can_backup,
            Feature::MultipleTemplates => self.multiple_templates,
            Feature::Installments => self.installments,
            Feature::AdvancedReports => self.advanced_reports,
            Feature::EmailSupport => self.email_support,
            Feature::PhoneSupport => self.phone_support,
        }
    }

    /// The limit for `kind`; [`UNLIMITED`] when there is none.
    pub fn limit(&self, kind: LimitKind) -> i64 {
        match kind {
            LimitKind::Users => self.max_users,
            LimitKind::Orders => self.max_orders,
        }
    }

    /// True if `current` more items are still below the limit.
    pub fn within_limit(&self, kind: LimitKind, current: i64) -> bool {
        let max = self.limit(kind);
        max == UNLIMITED || current < max
    }
}

const TRIAL: FeatureSet = FeatureSet {
    max_users: 1,
    max_orders: 100,
    can_export: false,
    can_backup: false,
    multiple_templates: false,
    installments: false,
    advanced_reports: false,
    email_support: false,
    phone_support: false,
};

const MONTHLY: FeatureSet = FeatureSet {
    max_users: 3,
    max_orders: UNLIMITED,
    can_export: true,
    can_backup: true,
    multiple_templates: false,
    installments: true,
    advanced_reports: false,
    email_support: true,
    phone_support: false,
};

const QUARTERLY: FeatureSet = FeatureSet {
    max_users: 5,
    max_orders: UNLIMITED,
    can_export: true,
    can_backup: true,
    multiple_templates: true,
    installments: true,
    advanced_reports: true,
    email_support: true,
    phone_support: false,
};

const ANNUAL: FeatureSet = FeatureSet {
    max_users: UNLIMITED,
    max_orders: UNLIMITED,
    can_export: true,
    can_backup: true,
    multiple_templates: true,
    installments: true,
    advanced_reports: true,
    email_support: true,
    phone_support: true,
};

/// Entitlements for `plan`.
pub fn features_for(plan: Plan) -> FeatureSet {
    match plan {
        Plan::Trial => TRIAL,
        Plan::Monthly => MONTHLY,
        Plan::Quarterly => QUARTERLY,
        Plan::Annual => ANNUAL,
    }
}

/// A boolean entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    #[serde(rename = "canExport")]
    Export,
    #[serde(rename = "canBackup")]
    Backup,
    MultipleTemplates,
    Installments,
    AdvancedReports,
    EmailSupport,
    PhoneSupport,
}

impl Feature {
    pub const ALL: [Feature; 7] = [
        Feature::Export,
        Feature::Backup,
        Feature::MultipleTemplates,
        Feature::Installments,
        Feature::AdvancedReports,
        Feature::EmailSupport,
        Feature::PhoneSupport,
    ];

    /// Name used by the IPC layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Export => "canExport",
            Feature::Backup => "canBackup",
            Feature::MultipleTemplates => "multipleTemplates",
            Feature::Installments => "installments",
            Feature::AdvancedReports => "advancedReports",
            Feature::EmailSupport => "emailSupport",
            Feature::PhoneSupport => "phoneSupport",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown feature '{s}'"))
    }
}

/// A counted resource with a per-plan cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitKind {
    Users,
    Orders,
}

impl FromStr for LimitKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "users" | "maxusers" => Ok(LimitKind::Users),
            "orders" | "maxorders" => Ok(LimitKind::Orders),
            other => Err(format!("unknown limit '{other}'")),
        }
    }
}

/// `info.is_valid && features[feature]`.
pub fn is_feature_available(info: &LicenseInfo, feature: Feature) -> bool {
    info.is_valid && info.features.has(feature)
}

/// `info.is_valid && (max == -1 || current < max)`.
pub fn check_limit(info: &LicenseInfo, kind: LimitKind, current: i64) -> bool {
    info.is_valid && info.features.within_limit(kind, current)
}
