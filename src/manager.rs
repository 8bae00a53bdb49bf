//! The license state machine.
//!
//! [`LicenseManager`] owns the persisted [`LicenseRecord`] and turns it into a
//! [`LicenseInfo`] for the application. One manager is constructed at startup
//! and shared as an `Arc`; its background timers hold only a weak reference.
//!
//! Evaluation order, first match wins:
//!
//! 1. unreadable record: `Invalid`
//! 2. clock behind the last reading we stored: `Tampered` (never cached)
//! 3. no key: trial arithmetic, `Trial` / `Expired` / `NotActivated`
//! 4. key bound to another device, revoked or unknown key, rejected offline
//!    certificate: `Invalid`
//! 5. expiry arithmetic: `Valid` (or `Trial`) / `Grace` / `Expired`

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::certificate::{
    verify_for_device, CertificateError, CertificatePayload, OfflineCertificate, TrustedKey,
};
use crate::client::api::{DeviceIdentity, LicenseApi, RemoteLicenseClient};
use crate::client::errors::ApiErrorCode;
use crate::client::responses::{parse_server_time, Activation, HeartbeatResponse, VerifyResponse};
use crate::clock::{days_until, Clock, SystemClock};
use crate::config::LicensingConfig;
use crate::errors::{LicenseError, LicenseResult};
use crate::features::{self, Feature, LimitKind};
use crate::record::{LicenseRecord, Plan};
use crate::scheduler::{LicenseTask, Scheduler, TaskFuture};
use crate::status::{LicenseInfo, LicenseStatus};
use crate::storage::{FileStore, LicenseStore};

/// Server time further than this from ours is worth a warning.
const CLOCK_DRIFT_WARNING: chrono::Duration = chrono::Duration::hours(24);

/// Policy values the manager runs with.
#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub product_code: String,
    pub trusted_key: TrustedKey,
    pub trial_days: u32,
    pub grace_days: u32,
    pub cache_ttl: Duration,
    pub refresh_interval: Duration,
    pub heartbeat_interval: Duration,
}

impl ManagerSettings {
    /// Defaults: 30-day trial, 7-day grace, 1 h cache and refresh, 24 h heartbeat.
    pub fn new(product_code: impl Into<String>, trusted_key: TrustedKey) -> Self {
        Self {
            product_code: product_code.into(),
            trusted_key,
            trial_days: 30,
            grace_days: 7,
            cache_ttl: Duration::from_secs(3600),
            refresh_interval: Duration::from_secs(3600),
            heartbeat_interval: Duration::from_secs(86_400),
        }
    }

    pub fn from_config(config: &LicensingConfig) -> LicenseResult<Self> {
        Ok(Self {
            product_code: config.api.product_code.clone(),
            trusted_key: config.trusted_key()?,
            trial_days: config.policy.trial_days,
            grace_days: config.policy.grace_days,
            cache_ttl: Duration::from_secs(config.policy.cache_ttl_secs),
            refresh_interval: Duration::from_secs(config.policy.refresh_interval_secs),
            heartbeat_interval: Duration::from_secs(config.policy.heartbeat_interval_secs),
        })
    }
}

struct CachedInfo {
    info: LicenseInfo,
    computed_at: Instant,
}

/// Result of one evaluation pass.
struct Evaluation {
    info: LicenseInfo,
    cacheable: bool,
    paid_key: bool,
}

impl Evaluation {
    fn new(info: LicenseInfo, record: &LicenseRecord) -> Self {
        Self {
            info,
            cacheable: true,
            paid_key: record.has_key() && record.plan.is_paid(),
        }
    }
}

/// Production manager: HTTPS client, encrypted file, system clock.
pub type DefaultLicenseManager = LicenseManager<RemoteLicenseClient, FileStore, SystemClock>;

pub struct LicenseManager<A, S, C> {
    api: A,
    store: S,
    clock: C,
    settings: ManagerSettings,
    device: DeviceIdentity,
    scheduler: Scheduler,
    /// Guards the cache and every read-modify-write of the record.
    cache: Mutex<Option<CachedInfo>>,
    timers_enabled: AtomicBool,
    this: Weak<Self>,
}

impl DefaultLicenseManager {
    /// Build the production manager for this machine.
    pub fn from_config(config: &LicensingConfig) -> LicenseResult<Arc<Self>> {
        let device =
            DeviceIdentity::current(&config.app.version, config.app.device_name.as_deref());
        let store = FileStore::new(
            config.storage.resolved_path(),
            &device.device_hash,
            &config.api.product_code,
        );
        Ok(Self::new(
            RemoteLicenseClient::new(&config.api)?,
            store,
            SystemClock,
            ManagerSettings::from_config(config)?,
            device,
        ))
    }
}

impl<A, S, C> LicenseManager<A, S, C>
where
    A: LicenseApi,
    S: LicenseStore,
    C: Clock,
{
    pub fn new(
        api: A,
        store: S,
        clock: C,
        settings: ManagerSettings,
        device: DeviceIdentity,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            api,
            store,
            clock,
            scheduler: Scheduler::new(settings.refresh_interval, settings.heartbeat_interval),
            settings,
            device,
            cache: Mutex::new(None),
            timers_enabled: AtomicBool::new(true),
            this: this.clone(),
        })
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Current license state.
    ///
    /// Within the cache TTL, concurrent callers share one evaluation and see
    /// the same snapshot. `force_refresh` always re-evaluates.
    pub async fn get_license_info(&self, force_refresh: bool) -> LicenseInfo {
        let mut cache = self.cache.lock().await;

        if !force_refresh {
            if let Some(cached) = cache.as_ref() {
                if cached.computed_at.elapsed() < self.settings.cache_ttl {
                    debug!(status = %cached.info.status, "license status served from cache");
                    return cached.info.clone();
                }
            }
        }

        let eval = self.evaluate().await;
        *cache = eval.cacheable.then(|| CachedInfo {
            info: eval.info.clone(),
            computed_at: Instant::now(),
        });
        drop(cache);

        self.sync_timers(eval.paid_key);
        eval.info
    }

    /// Drop the cached status so the next call re-evaluates.
    pub async fn invalidate_cache(&self) {
        *self.cache.lock().await = None;
        debug!("license cache invalidated");
    }

    /// Activate `license_key` on this device.
    ///
    /// Not retried on failure: activation consumes a seat on the server.
    pub async fn activate(&self, license_key: &str) -> LicenseResult<LicenseInfo> {
        let key = license_key.trim();
        if key.is_empty() {
            return Err(LicenseError::InvalidLicense(
                "license key is empty".to_string(),
            ));
        }

        {
            let mut cache = self.cache.lock().await;
            *cache = None;

            let resp = self.api.activate(key, &self.device).await.map_err(|e| {
                warn!(code = %e.code, "activation failed");
                e
            })?;

            let now = self.clock.now();
            let mut plan = resp
                .metadata
                .as_ref()
                .and_then(|m| m.plan.as_deref())
                .and_then(|p| p.parse::<Plan>().ok());
            let mut expiry = resp.expiry();
            let mut email = resp
                .metadata
                .as_ref()
                .and_then(|m| m.customer_email.clone());
            let mut verified: Option<VerifyResponse> = None;

            if plan.is_none() || expiry.is_none() {
                match self.api.verify(key).await {
                    Ok(v) => {
                        plan = plan.or_else(|| v.metadata.plan.as_deref().and_then(|p| p.parse().ok()));
                        expiry = expiry.or_else(|| v.expiry());
                        email = email.or_else(|| v.metadata.customer_email.clone());
                        verified = Some(v);
                    }
                    Err(e) => {
                        warn!(code = %e.code, "follow-up verification after activation failed");
                    }
                }
            }

            let plan = plan.unwrap_or_else(|| {
                warn!("server did not report a plan, assuming monthly");
                Plan::Monthly
            });
            let expiry =
                expiry.unwrap_or_else(|| now + chrono::Duration::days(plan.duration_days()));

            let mut record = self.load_or_new_trial(now).await;
            record.observe_time(now.timestamp_millis());
            record.license_key = Some(key.to_string());
            record.activation_id = Some(resp.activation_id.clone());
            record.plan = plan;
            record.expiry = Some(expiry);
            record.machine_fingerprint = self.device.device_hash.clone();
            record.customer_email = email;
            if let Some(v) = &verified {
                record.last_verified_at = Some(now);
                record.signed_token_blob = serde_json::to_string(v).ok();
            }
            if record
                .offline_certificate
                .as_deref()
                .and_then(|c| OfflineCertificate::from_json(c).ok())
                .and_then(|c| c.payload.get("license_key").cloned())
                .is_some_and(|k| k.as_str() != Some(key))
            {
                record.offline_certificate = None;
            }
            self.store.save(&record).await?;

            info!(
                plan = %plan,
                expiry = %expiry.to_rfc3339(),
                activation_id = %resp.activation_id,
                "license activated"
            );
        }

        Ok(self.get_license_info(true).await)
    }

    /// Release this device's activation and return to the not-activated state.
    pub async fn deactivate(&self) -> LicenseResult<LicenseInfo> {
        {
            let mut cache = self.cache.lock().await;
            let mut record = self.store.load().await?.ok_or(LicenseError::NotActivated)?;
            let key = record
                .license_key
                .clone()
                .filter(|_| record.has_key())
                .ok_or(LicenseError::NotActivated)?;

            match self.api.deactivate(&key, &self.device.device_hash).await {
                Ok(_) => {}
                Err(e) if e.code.is_missing_server_state() => {
                    warn!(code = %e.code, "server has no activation for this device, clearing locally");
                }
                Err(e) => {
                    warn!(code = %e.code, "deactivation failed");
                    return Err(e.into());
                }
            }

            self.scheduler.stop_heartbeat();
            record.clear_license();
            record.observe_time(self.clock.now_ms());
            self.store.save(&record).await?;
            *cache = None;
            info!("license deactivated on this device");
        }

        Ok(self.get_license_info(true).await)
    }

    /// Send one heartbeat for the stored key.
    ///
    /// If the server no longer knows the license or activation, the cache is
    /// invalidated so the next status check re-verifies. The record is kept.
    pub async fn heartbeat(&self) -> LicenseResult<HeartbeatResponse> {
        let key = self.stored_key().await?;

        match self.api.heartbeat(&key, &self.device.device_hash).await {
            Ok(resp) => {
                if let Some(server) = resp.server_time.as_deref().and_then(parse_server_time) {
                    let drift = server - self.clock.now();
                    if drift.abs() > CLOCK_DRIFT_WARNING {
                        warn!(
                            drift_hours = drift.num_hours(),
                            "local clock differs from license server time"
                        );
                    }
                }
                debug!("heartbeat acknowledged");
                Ok(resp)
            }
            Err(e) if e.code.is_missing_server_state() => {
                warn!(code = %e.code, "heartbeat rejected, forcing re-verification");
                self.invalidate_cache().await;
                Err(e.into())
            }
            Err(e) => {
                debug!(code = %e.code, "heartbeat failed");
                Err(e.into())
            }
        }
    }

    /// Verify and store an offline certificate.
    pub async fn import_certificate(&self, json: &str) -> LicenseResult<CertificatePayload> {
        let cert = OfflineCertificate::from_json(json)?;
        let mut cache = self.cache.lock().await;
        let payload = self.store_certificate(cert).await?;
        *cache = None;
        Ok(payload)
    }

    /// [`import_certificate`](Self::import_certificate) from a file.
    pub async fn import_certificate_file(
        &self,
        path: impl AsRef<Path>,
    ) -> LicenseResult<CertificatePayload> {
        let json = tokio::fs::read_to_string(path.as_ref()).await?;
        self.import_certificate(&json).await
    }

    /// Ask the server for an offline certificate for this device and store it.
    pub async fn generate_offline_certificate(&self) -> LicenseResult<CertificatePayload> {
        let key = self.stored_key().await?;
        let cert = self
            .api
            .generate_offline_certificate(&key, &self.device)
            .await?;

        let mut cache = self.cache.lock().await;
        let payload = self.store_certificate(cert).await?;
        *cache = None;
        Ok(payload)
    }

    /// Devices the stored key is active on.
    pub async fn list_activations(&self) -> LicenseResult<Vec<Activation>> {
        let key = self.stored_key().await?;
        Ok(self.api.list_activations(&key).await?)
    }

    /// Start a trial. Only possible when no license or trial is present.
    pub async fn start_trial(&self) -> LicenseResult<LicenseInfo> {
        {
            let mut cache = self.cache.lock().await;
            let now = self.clock.now();

            let record = match self.store.load().await? {
                None => LicenseRecord::new_trial(
                    now,
                    self.settings.trial_days,
                    &self.device.device_hash,
                ),
                Some(mut record) if !record.has_key() && record.expiry.is_none() => {
                    if !record.observe_time(now.timestamp_millis()) {
                        return Err(LicenseError::TrialUnavailable(
                            "system clock is behind the last recorded time".to_string(),
                        ));
                    }
                    record.plan = Plan::Trial;
                    record.expiry =
                        Some(now + chrono::Duration::days(i64::from(self.settings.trial_days)));
                    record.machine_fingerprint = self.device.device_hash.clone();
                    record
                }
                Some(_) => {
                    return Err(LicenseError::TrialUnavailable(
                        "a license or trial is already present".to_string(),
                    ))
                }
            };

            self.store.save(&record).await?;
            *cache = None;
            info!(days = self.settings.trial_days, "trial started");
        }

        Ok(self.get_license_info(true).await)
    }

    /// Discard everything stored and start a fresh trial.
    pub async fn reset_to_trial(&self) -> LicenseResult<LicenseInfo> {
        {
            let mut cache = self.cache.lock().await;
            self.scheduler.stop_heartbeat();
            self.store.clear().await?;

            let record = LicenseRecord::new_trial(
                self.clock.now(),
                self.settings.trial_days,
                &self.device.device_hash,
            );
            self.store.save(&record).await?;
            *cache = None;
            info!("license record reset to a fresh trial");
        }

        Ok(self.get_license_info(true).await)
    }

    /// Enable background timers and evaluate the license.
    pub async fn start(&self) -> LicenseInfo {
        self.timers_enabled.store(true, Ordering::SeqCst);
        self.get_license_info(true).await
    }

    /// Stop background timers until the next [`start`](Self::start).
    pub fn stop(&self) {
        self.timers_enabled.store(false, Ordering::SeqCst);
        self.scheduler.stop();
        debug!("license timers stopped");
    }

    pub async fn is_feature_available(&self, feature: Feature) -> bool {
        features::is_feature_available(&self.get_license_info(false).await, feature)
    }

    pub async fn check_limit(&self, kind: LimitKind, current: i64) -> bool {
        features::check_limit(&self.get_license_info(false).await, kind, current)
    }

    async fn stored_key(&self) -> LicenseResult<String> {
        self.store
            .load()
            .await?
            .filter(LicenseRecord::has_key)
            .and_then(|r| r.license_key)
            .ok_or(LicenseError::NotActivated)
    }

    async fn load_or_new_trial(&self, now: DateTime<Utc>) -> LicenseRecord {
        match self.store.load().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                LicenseRecord::new_trial(now, self.settings.trial_days, &self.device.device_hash)
            }
            Err(e) => {
                warn!(error = %e, "replacing unreadable license record");
                LicenseRecord::new_trial(now, self.settings.trial_days, &self.device.device_hash)
            }
        }
    }

    /// Verify `cert` for this device and product and write it to the record.
    /// Caller holds the cache lock.
    async fn store_certificate(&self, cert: OfflineCertificate) -> LicenseResult<CertificatePayload> {
        let now = self.clock.now();
        let payload = verify_for_device(
            &cert,
            &self.settings.trusted_key,
            now,
            &self.device.device_hash,
        )
        .map_err(|e| {
            warn!(code = e.code(), "offline certificate rejected");
            e
        })?;

        if payload.product_code != self.settings.product_code {
            return Err(LicenseError::InvalidLicense(format!(
                "certificate is for product '{}'",
                payload.product_code
            )));
        }

        let mut record = self.load_or_new_trial(now).await;
        record.observe_time(now.timestamp_millis());
        if record.has_key() && record.license_key.as_deref() == Some(payload.license_key.as_str()) {
            if !record.expiry.is_some_and(|e| e >= payload.valid_until) {
                record.expiry = Some(payload.valid_until);
            }
        } else {
            // a new key is bounded by its certificate, not by any trial window
            record.activation_id = None;
            record.expiry = Some(payload.valid_until);
        }
        record.license_key = Some(payload.license_key.clone());
        record.offline_certificate = Some(cert.to_json()?);
        record.machine_fingerprint = self.device.device_hash.clone();
        self.store.save(&record).await?;

        info!(
            valid_until = %payload.valid_until.to_rfc3339(),
            "offline certificate stored"
        );
        Ok(payload)
    }

    fn sync_timers(&self, paid_key: bool) {
        if !self.timers_enabled.load(Ordering::SeqCst) {
            return;
        }
        self.scheduler.start_refresh(self.this.clone());
        if paid_key {
            self.scheduler.start_heartbeat(self.this.clone());
        } else {
            self.scheduler.stop_heartbeat();
        }
    }

    async fn evaluate(&self) -> Evaluation {
        let now = self.clock.now();
        let now_ms = now.timestamp_millis();

        let mut record = match self.store.load().await {
            Ok(Some(record)) => record,
            Ok(None) => {
                let record = LicenseRecord::new_trial(
                    now,
                    self.settings.trial_days,
                    &self.device.device_hash,
                );
                info!(days = self.settings.trial_days, "no license record, starting trial");
                record
            }
            Err(e) => {
                warn!(error = %e, "license record unreadable");
                return Evaluation {
                    info: LicenseInfo::new(
                        LicenseStatus::Invalid,
                        Plan::Trial,
                        "License data is damaged. Re-activate or import a certificate.",
                    ),
                    cacheable: true,
                    paid_key: false,
                };
            }
        };

        if !record.observe_time(now_ms) {
            warn!(
                now_ms,
                last_seen_ms = record.last_seen_monotonic,
                "system clock is behind the last recorded time"
            );
            return Evaluation {
                cacheable: false,
                ..Evaluation::new(
                    LicenseInfo::new(
                        LicenseStatus::Tampered,
                        record.plan,
                        "The system clock has been set back. Correct the date and time to continue.",
                    )
                    .with_expiry(record.expiry),
                    &record,
                )
            };
        }

        let info = self.evaluate_record(&mut record, now).await;

        if let Err(e) = self.store.save(&record).await {
            warn!(error = %e, "failed to persist license record");
        }
        Evaluation::new(info, &record)
    }

    async fn evaluate_record(&self, record: &mut LicenseRecord, now: DateTime<Utc>) -> LicenseInfo {
        let Some(key) = record.license_key.clone().filter(|_| record.has_key()) else {
            return trial_info(record, now);
        };

        if record.machine_fingerprint != self.device.device_hash {
            warn!("license record belongs to another device");
            return invalid(record, "This license is registered to another device.");
        }

        match self.api.verify(&key).await {
            Ok(resp) => {
                if resp.is_revoked() {
                    warn!("license revoked by server");
                    return invalid(record, "This license has been revoked.");
                }
                apply_verification(record, &resp, now);
                debug!(plan = %record.plan, "license verified online");
            }
            Err(e) if e.code.is_license_invalid() => {
                warn!(code = %e.code, "license rejected by server");
                let message = match e.code {
                    ApiErrorCode::Revoked => "This license has been revoked.",
                    _ => "This license key is not recognised by the license server.",
                };
                return invalid(record, message);
            }
            Err(e) => {
                if e.code.is_transient() {
                    warn!(code = %e.code, "online verification unavailable, using offline data");
                } else {
                    warn!(code = %e.code, "unexpected verification error, using offline data");
                }
                if let Err(cert_err) = self.check_offline_certificate(record, &key, now) {
                    warn!(code = cert_err.code(), "stored offline certificate rejected");
                    return invalid(record, &format!("Offline certificate rejected: {cert_err}"));
                }
            }
        }

        paid_info(record, now, self.settings.grace_days)
    }

    /// Offline fallback. A missing or expired certificate is not an error:
    /// status then follows the stored expiry.
    fn check_offline_certificate(
        &self,
        record: &LicenseRecord,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<(), CertificateError> {
        let Some(json) = record.offline_certificate.as_deref() else {
            debug!("no offline certificate stored");
            return Ok(());
        };

        let cert = OfflineCertificate::from_json(json)?;
        match verify_for_device(&cert, &self.settings.trusted_key, now, &self.device.device_hash) {
            Ok(payload) if payload.license_key != key => Err(CertificateError::BadCertificate),
            Ok(payload) => {
                debug!(valid_until = %payload.valid_until.to_rfc3339(), "offline certificate valid");
                Ok(())
            }
            Err(CertificateError::ExpiredOfflineCert) => {
                debug!("offline certificate expired");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn apply_verification(record: &mut LicenseRecord, resp: &VerifyResponse, now: DateTime<Utc>) {
    if let Some(plan) = resp.metadata.plan.as_deref() {
        match plan.parse::<Plan>() {
            Ok(plan) => record.plan = plan,
            Err(e) => warn!(error = %e, "ignoring plan reported by server"),
        }
    }
    if let Some(expiry) = resp.expiry() {
        record.expiry = Some(expiry);
    }
    if let Some(email) = &resp.metadata.customer_email {
        record.customer_email = Some(email.clone());
    }
    record.last_verified_at = Some(now);
    record.signed_token_blob = serde_json::to_string(resp).ok();
}

fn invalid(record: &LicenseRecord, message: &str) -> LicenseInfo {
    LicenseInfo::new(LicenseStatus::Invalid, record.plan, message).with_expiry(record.expiry)
}

fn trial_info(record: &LicenseRecord, now: DateTime<Utc>) -> LicenseInfo {
    let Some(expiry) = record.expiry else {
        return LicenseInfo::new(
            LicenseStatus::NotActivated,
            Plan::Trial,
            "No license is activated. Start a trial or enter a license key.",
        );
    };

    let days = days_until(expiry.timestamp_millis(), now.timestamp_millis());
    let info = if days > 0 {
        LicenseInfo::new(
            LicenseStatus::Trial,
            Plan::Trial,
            format!("Trial: {days} day(s) remaining."),
        )
    } else {
        LicenseInfo::new(
            LicenseStatus::Expired,
            Plan::Trial,
            "The trial period has ended.",
        )
    };
    info.with_expiry(Some(expiry)).with_days_remaining(days)
}

fn paid_info(record: &LicenseRecord, now: DateTime<Utc>, grace_days: u32) -> LicenseInfo {
    let plan = record.plan;
    let Some(expiry) = record.expiry else {
        return LicenseInfo::new(LicenseStatus::Valid, plan, format!("{plan} license active."));
    };

    let days = days_until(expiry.timestamp_millis(), now.timestamp_millis());
    if days > 0 {
        let status = if plan == Plan::Trial {
            LicenseStatus::Trial
        } else {
            LicenseStatus::Valid
        };
        return LicenseInfo::new(status, plan, format!("{plan} license: {days} day(s) remaining."))
            .with_expiry(Some(expiry))
            .with_days_remaining(days);
    }

    // only paid plans get a grace period
    let since = days.abs();
    let grace = i64::from(grace_days);
    if plan.is_paid() && since <= grace {
        let left = grace - since;
        LicenseInfo::new(
            LicenseStatus::Grace,
            plan,
            format!("License expired {since} day(s) ago. {left} grace day(s) left to renew."),
        )
        .with_expiry(Some(expiry))
        .with_days_remaining(days)
        .with_grace_remaining(left)
    } else {
        LicenseInfo::new(
            LicenseStatus::Expired,
            plan,
            "License has expired. Renew to continue.",
        )
        .with_expiry(Some(expiry))
        .with_days_remaining(days)
    }
}

impl<A, S, C> LicenseTask for LicenseManager<A, S, C>
where
    A: LicenseApi,
    S: LicenseStore,
    C: Clock,
{
    fn scheduled_refresh(self: Arc<Self>) -> TaskFuture {
        Box::pin(async move {
            let info = self.get_license_info(true).await;
            debug!(status = %info.status, "scheduled license refresh");
        })
    }

    fn scheduled_heartbeat(self: Arc<Self>) -> TaskFuture {
        Box::pin(async move {
            if let Err(e) = self.heartbeat().await {
                debug!(error = %e, "scheduled heartbeat failed");
            }
        })
    }
}
