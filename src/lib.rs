//! NetViper POS licensing - license validation and activation for the
//! point-of-sale desktop app.
//!
//! # Overview
//!
//! - [`manager::LicenseManager`] owns the local license record and answers
//!   "is this installation licensed, and for what?" as a
//!   [`status::LicenseInfo`].
//! - [`client::api::RemoteLicenseClient`] talks to the license server with
//!   HMAC-signed requests.
//! - [`certificate`] verifies Ed25519-signed offline certificates, so a
//!   machine without network access can still be licensed.
//! - [`features`] maps a plan to the features and limits it unlocks.
//!
//! # Example
//!
//! ```rust,no_run
//! use pos_license::config::LicensingConfig;
//! use pos_license::features::Feature;
//! use pos_license::manager::DefaultLicenseManager;
//!
//! # async fn run() -> pos_license::errors::LicenseResult<()> {
//! let config = LicensingConfig::load()?;
//! let manager = DefaultLicenseManager::from_config(&config)?;
//!
//! let info = manager.start().await;
//! println!("{}: {}", info.status, info.message);
//!
//! if manager.is_feature_available(Feature::Export).await {
//!     // ...
//! }
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod certificate;
pub mod clock;
pub mod config;
pub mod encryption;
pub mod errors;
pub mod features;
pub mod hardware;
pub mod logging;
pub mod record;
pub mod signing;
pub mod status;

// License server client
pub mod client {
    pub mod api;
    pub mod errors;
    pub mod responses;

    pub use api::{DeviceIdentity, LicenseApi, RemoteLicenseClient};
}

// State machine and its collaborators
pub mod manager;
pub mod scheduler;
pub mod storage;

pub use errors::{LicenseError, LicenseResult};
pub use features::{Feature, FeatureSet, LimitKind};
pub use manager::{DefaultLicenseManager, LicenseManager, ManagerSettings};
pub use record::Plan;
pub use status::{LicenseInfo, LicenseStatus};
