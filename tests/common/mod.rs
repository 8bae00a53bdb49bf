//! Shared fixtures: a scriptable license server, a certificate issuer and a
//! manager wired to in-memory storage and a manual clock.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};

use pos_license::certificate::{
    CertificateConstraints, CertificatePayload, OfflineCertificate, TrustedKey, CERT_TYPE,
};
use pos_license::client::api::{DeviceIdentity, LicenseApi};
use pos_license::client::errors::{ApiError, ApiErrorCode, ApiResult};
use pos_license::client::responses::{
    Ack, ActivateResponse, Activation, HeartbeatResponse, LicenseMetadata, VerifyResponse,
};
use pos_license::clock::ManualClock;
use pos_license::manager::{LicenseManager, ManagerSettings};
use pos_license::record::{LicenseRecord, Plan};
use pos_license::storage::MemoryStore;

pub const PRODUCT: &str = "netviper-pos";
pub const DEVICE_HASH: &str = "5f2b9c0e7d4a8b1c3e6f9a2d5c8b1e4f7a0d3c6b9e2f5a8d1c4b7e0a3d6f9c2b";
pub const LICENSE_KEY: &str = "NVPOS-7K2M-QX4P-9TRW";

/// 2025-06-01 09:00 UTC.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
}

pub fn device() -> DeviceIdentity {
    DeviceIdentity {
        device_hash: DEVICE_HASH.to_string(),
        device_name: "till-01".to_string(),
        app_version: "2.4.0".to_string(),
    }
}

pub fn network_down() -> ApiError {
    ApiError::network("connection refused")
}

pub fn server_error(code: &str) -> ApiError {
    ApiError::from_server(code)
}

/// An `active` verify response for `plan`, expiring at `expires_at`.
pub fn verify_ok(plan: &str, expires_at: &str) -> VerifyResponse {
    VerifyResponse {
        status: "active".to_string(),
        expires_at: Some(expires_at.to_string()),
        metadata: LicenseMetadata {
            plan: Some(plan.to_string()),
            customer_name: Some("Corner Shop".to_string()),
            customer_email: Some("owner@cornershop.example".to_string()),
            extra: Default::default(),
        },
        activations_used: Some(1),
        max_activations: Some(3),
    }
}

/// Scriptable responses plus a log of every call.
pub struct FakeServer {
    pub verify: Mutex<ApiResult<VerifyResponse>>,
    pub activate: Mutex<ApiResult<ActivateResponse>>,
    pub deactivate: Mutex<ApiResult<Ack>>,
    pub heartbeat: Mutex<ApiResult<HeartbeatResponse>>,
    pub certificate: Mutex<ApiResult<OfflineCertificate>>,
    pub activations: Mutex<ApiResult<Vec<Activation>>>,
    pub verify_delay: Mutex<Option<Duration>>,
    pub calls: Mutex<Vec<String>>,
}

impl Default for FakeServer {
    fn default() -> Self {
        Self {
            verify: Mutex::new(Err(network_down())),
            activate: Mutex::new(Err(network_down())),
            deactivate: Mutex::new(Ok(Ack::default())),
            heartbeat: Mutex::new(Ok(HeartbeatResponse::default())),
            certificate: Mutex::new(Err(network_down())),
            activations: Mutex::new(Ok(Vec::new())),
            verify_delay: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeApi(pub Arc<FakeServer>);

impl FakeApi {
    pub fn set_verify(&self, result: ApiResult<VerifyResponse>) {
        *self.0.verify.lock().unwrap() = result;
    }

    pub fn set_activate(&self, result: ApiResult<ActivateResponse>) {
        *self.0.activate.lock().unwrap() = result;
    }

    pub fn set_deactivate(&self, result: ApiResult<Ack>) {
        *self.0.deactivate.lock().unwrap() = result;
    }

    pub fn set_heartbeat(&self, result: ApiResult<HeartbeatResponse>) {
        *self.0.heartbeat.lock().unwrap() = result;
    }

    pub fn set_certificate(&self, result: ApiResult<OfflineCertificate>) {
        *self.0.certificate.lock().unwrap() = result;
    }

    pub fn set_activations(&self, result: ApiResult<Vec<Activation>>) {
        *self.0.activations.lock().unwrap() = result;
    }

    pub fn set_verify_delay(&self, delay: Duration) {
        *self.0.verify_delay.lock().unwrap() = Some(delay);
    }

    /// Number of calls made to `endpoint`.
    pub fn count(&self, endpoint: &str) -> usize {
        self.0
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == endpoint)
            .count()
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.calls.lock().unwrap().clone()
    }

    fn log(&self, endpoint: &str) {
        self.0.calls.lock().unwrap().push(endpoint.to_string());
    }
}

impl LicenseApi for FakeApi {
    async fn verify(&self, _license_key: &str) -> ApiResult<VerifyResponse> {
        self.log("verify");
        let delay = *self.0.verify_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.0.verify.lock().unwrap().clone()
    }

    async fn activate(
        &self,
        _license_key: &str,
        _device: &DeviceIdentity,
    ) -> ApiResult<ActivateResponse> {
        self.log("activate");
        self.0.activate.lock().unwrap().clone()
    }

    async fn deactivate(&self, _license_key: &str, _device_hash: &str) -> ApiResult<Ack> {
        self.log("deactivate");
        self.0.deactivate.lock().unwrap().clone()
    }

    async fn heartbeat(
        &self,
        _license_key: &str,
        _device_hash: &str,
    ) -> ApiResult<HeartbeatResponse> {
        self.log("heartbeat");
        self.0.heartbeat.lock().unwrap().clone()
    }

    async fn generate_offline_certificate(
        &self,
        _license_key: &str,
        _device: &DeviceIdentity,
    ) -> ApiResult<OfflineCertificate> {
        self.log("generate_offline_certificate");
        self.0.certificate.lock().unwrap().clone()
    }

    async fn list_activations(&self, _license_key: &str) -> ApiResult<Vec<Activation>> {
        self.log("list_activations");
        self.0.activations.lock().unwrap().clone()
    }
}

/// Holds an Ed25519 key pair and signs offline certificates with it.
pub struct Issuer {
    pkcs8: Vec<u8>,
    pub trusted: TrustedKey,
}

impl Issuer {
    pub fn new() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).unwrap();
        let pair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).unwrap();
        let public: [u8; 32] = pair.public_key().as_ref().try_into().unwrap();
        Self {
            pkcs8: pkcs8.as_ref().to_vec(),
            trusted: TrustedKey::from_bytes(public),
        }
    }

    pub fn payload(
        &self,
        license_key: &str,
        device_hash: &str,
        valid_until: DateTime<Utc>,
    ) -> CertificatePayload {
        CertificatePayload {
            cert_type: CERT_TYPE.to_string(),
            version: 1,
            product_code: PRODUCT.to_string(),
            license_key: license_key.to_string(),
            device_hash: device_hash.to_string(),
            device_name: Some("till-01".to_string()),
            app_version: Some("2.4.0".to_string()),
            issued_at: start_time(),
            valid_until,
            constraints: CertificateConstraints {
                max_activations: Some(3),
            },
        }
    }

    pub fn sign(&self, payload: &CertificatePayload) -> OfflineCertificate {
        OfflineCertificate::sign(payload, &self.pkcs8).unwrap()
    }

    /// Certificate for [`LICENSE_KEY`] bound to this test device.
    pub fn certificate(&self, valid_until: DateTime<Utc>) -> OfflineCertificate {
        self.sign(&self.payload(LICENSE_KEY, DEVICE_HASH, valid_until))
    }
}

pub type TestManager = LicenseManager<FakeApi, MemoryStore, Arc<ManualClock>>;

/// A manager plus handles on everything it talks to.
pub struct Harness {
    pub manager: Arc<TestManager>,
    pub api: FakeApi,
    pub store: MemoryStore,
    pub clock: Arc<ManualClock>,
    pub issuer: Issuer,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new())
    }

    pub fn with_record(record: LicenseRecord) -> Self {
        Self::with_store(MemoryStore::with_record(record))
    }

    pub fn with_store(store: MemoryStore) -> Self {
        let api = FakeApi::default();
        let clock = Arc::new(ManualClock::new(start_time()));
        let issuer = Issuer::new();
        let settings = ManagerSettings::new(PRODUCT, issuer.trusted.clone());
        let manager = LicenseManager::new(
            api.clone(),
            store.clone(),
            clock.clone(),
            settings,
            device(),
        );
        Self {
            manager,
            api,
            store,
            clock,
            issuer,
        }
    }

    pub async fn record(&self) -> LicenseRecord {
        self.store.snapshot().await.expect("record should exist")
    }
}

/// A record holding an activated paid key for this device.
pub fn paid_record(plan: Plan, expiry: DateTime<Utc>) -> LicenseRecord {
    let mut record = LicenseRecord::new_trial(start_time(), 30, DEVICE_HASH);
    record.plan = plan;
    record.expiry = Some(expiry);
    record.license_key = Some(LICENSE_KEY.to_string());
    record.activation_id = Some("act-0001".to_string());
    record
}

pub fn api_code(err: &pos_license::LicenseError) -> Option<ApiErrorCode> {
    match err {
        pos_license::LicenseError::Api(e) => Some(e.code),
        _ => None,
    }
}
