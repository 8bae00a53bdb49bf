//! HTTP client for the license server.
//!
//! Every operation is a single `POST {base_url}/{endpoint}` whose JSON body
//! always carries `product_code` and is signed with the shared product secret
//! (see [`crate::signing`]). The body is sent in canonical form, so the bytes
//! on the wire are exactly the bytes that were signed.
//!
//! Calls never fail with a transport error: timeouts and connection problems
//! come back as [`ApiErrorCode::NetworkError`].
//!
//! `verify` and `list_activations` are safe to retry. `activate` and
//! `deactivate` move server-side activation counters; after a failure, call
//! `verify` before trying again.

use std::future::Future;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::certificate::OfflineCertificate;
use crate::client::errors::{ApiError, ApiErrorCode, ApiResult};
use crate::client::responses::{
    Ack, ActivateResponse, Activation, CertificateResponse, HeartbeatResponse, IssueResponse,
    ListActivationsResponse, VerifyResponse,
};
use crate::config::ApiConfig;
use crate::errors::{LicenseError, LicenseResult};
use crate::hardware::DeviceInfo;
use crate::signing::{canonical_json, RequestSigner, SIGNATURE_HEADER};

/// Endpoint names, relative to the base URL.
pub mod endpoints {
    pub const ISSUE: &str = "issue";
    pub const VERIFY: &str = "verify";
    pub const ACTIVATE: &str = "activate";
    pub const DEACTIVATE: &str = "deactivate";
    pub const HEARTBEAT: &str = "heartbeat";
    pub const GENERATE_OFFLINE_CERTIFICATE: &str = "generate_offline_certificate";
    pub const REVOKE: &str = "revoke";
    pub const LIST_ACTIVATIONS: &str = "list_activations";
}

/// Identity of this installation, sent with activation and certificate requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub device_hash: String,
    pub device_name: String,
    pub app_version: String,
}

impl DeviceIdentity {
    /// Identity of the machine we are running on.
    pub fn current(app_version: &str, device_name: Option<&str>) -> Self {
        let info = DeviceInfo::collect();
        Self {
            device_hash: info.fingerprint(),
            device_name: device_name
                .map(str::to_string)
                .unwrap_or_else(|| info.device_name()),
            app_version: app_version.to_string(),
        }
    }
}

/// License server operations the manager depends on.
pub trait LicenseApi: Send + Sync + 'static {
    fn verify(&self, license_key: &str) -> impl Future<Output = ApiResult<VerifyResponse>> + Send;

    fn activate(
        &self,
        license_key: &str,
        device: &DeviceIdentity,
    ) -> impl Future<Output = ApiResult<ActivateResponse>> + Send;

    fn deactivate(
        &self,
        license_key: &str,
        device_hash: &str,
    ) -> impl Future<Output = ApiResult<Ack>> + Send;

    fn heartbeat(
        &self,
        license_key: &str,
        device_hash: &str,
    ) -> impl Future<Output = ApiResult<HeartbeatResponse>> + Send;

    fn generate_offline_certificate(
        &self,
        license_key: &str,
        device: &DeviceIdentity,
    ) -> impl Future<Output = ApiResult<OfflineCertificate>> + Send;

    fn list_activations(
        &self,
        license_key: &str,
    ) -> impl Future<Output = ApiResult<Vec<Activation>>> + Send;
}

/// Signed HTTPS client for the license server.
#[derive(Debug, Clone)]
pub struct RemoteLicenseClient {
    http: Client,
    base_url: String,
    product_code: String,
    signer: RequestSigner,
}

impl RemoteLicenseClient {
    pub fn new(config: &ApiConfig) -> LicenseResult<Self> {
        Self::with_settings(
            &config.base_url,
            &config.product_code,
            config.hmac_secret.as_bytes(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn with_settings(
        base_url: &str,
        product_code: &str,
        secret: &[u8],
        timeout: Duration,
    ) -> LicenseResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LicenseError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            product_code: product_code.to_string(),
            signer: RequestSigner::new(secret)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a new license key (vendor tooling).
    pub async fn issue(
        &self,
        customer_name: &str,
        customer_email: &str,
        max_activations: u32,
    ) -> ApiResult<IssueResponse> {
        self.call(
            endpoints::ISSUE,
            json!({
                "customer_name": customer_name,
                "customer_email": customer_email,
                "max_activations": max_activations,
            }),
        )
        .await
    }

    /// Revoke a license key (vendor tooling).
    pub async fn revoke(&self, license_key: &str) -> ApiResult<Ack> {
        self.call(endpoints::REVOKE, json!({ "license_key": license_key }))
            .await
    }

    /// Build the signed request body for `fields`.
    fn signed_body(&self, fields: Value) -> ApiResult<(Vec<u8>, String)> {
        let mut body = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        body.insert(
            "product_code".to_string(),
            Value::String(self.product_code.clone()),
        );

        let bytes = canonical_json(&body)
            .map_err(|e| ApiError::new(ApiErrorCode::InvalidRequest, e.to_string()))?;
        let signature = self.signer.sign_bytes(&bytes);
        Ok((bytes, signature))
    }

    async fn call<T: DeserializeOwned>(&self, endpoint: &str, fields: Value) -> ApiResult<T> {
        let (bytes, signature) = self.signed_body(fields)?;
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(endpoint, "calling license server");

        let resp = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(bytes)
            .send()
            .await
            .map_err(|e| {
                warn!(endpoint, error = %e, "license server unreachable");
                ApiError::from(e)
            })?;

        let status = resp.status();
        let value: Value = match resp.json().await {
            Ok(v) => v,
            Err(e) if status.is_server_error() => {
                return Err(ApiError::new(
                    ApiErrorCode::ServerError,
                    format!("HTTP {status}: {e}"),
                ))
            }
            Err(e) => return Err(ApiError::network(format!("unreadable response: {e}"))),
        };

        let result = parse_envelope(status, value);
        if let Err(err) = &result {
            debug!(endpoint, code = %err.code, "license server call failed");
        }
        result
    }
}

/// Interpret an `{ok, error, ...}` response.
pub(crate) fn parse_envelope<T: DeserializeOwned>(status: StatusCode, value: Value) -> ApiResult<T> {
    let ok = value.get("ok").and_then(Value::as_bool).unwrap_or(false);
    if ok {
        return serde_json::from_value(value).map_err(|e| {
            ApiError::new(
                ApiErrorCode::ServerError,
                format!("malformed license server response: {e}"),
            )
        });
    }

    match value.get("error").and_then(Value::as_str) {
        Some(code) => Err(ApiError::from_server(code)),
        None if status.is_server_error() => Err(ApiError::new(
            ApiErrorCode::ServerError,
            format!("HTTP {status}"),
        )),
        None => Err(ApiError::new(
            ApiErrorCode::Unknown,
            format!("request failed with HTTP {status}"),
        )),
    }
}

impl LicenseApi for RemoteLicenseClient {
    async fn verify(&self, license_key: &str) -> ApiResult<VerifyResponse> {
        self.call(endpoints::VERIFY, json!({ "license_key": license_key }))
            .await
    }

    async fn activate(
        &self,
        license_key: &str,
        device: &DeviceIdentity,
    ) -> ApiResult<ActivateResponse> {
        self.call(
            endpoints::ACTIVATE,
            json!({
                "license_key": license_key,
                "device_hash": device.device_hash,
                "device_name": device.device_name,
                "app_version": device.app_version,
            }),
        )
        .await
    }

    async fn deactivate(&self, license_key: &str, device_hash: &str) -> ApiResult<Ack> {
        self.call(
            endpoints::DEACTIVATE,
            json!({ "license_key": license_key, "device_hash": device_hash }),
        )
        .await
    }

    async fn heartbeat(&self, license_key: &str, device_hash: &str) -> ApiResult<HeartbeatResponse> {
        self.call(
            endpoints::HEARTBEAT,
            json!({ "license_key": license_key, "device_hash": device_hash }),
        )
        .await
    }

    async fn generate_offline_certificate(
        &self,
        license_key: &str,
        device: &DeviceIdentity,
    ) -> ApiResult<OfflineCertificate> {
        let resp: CertificateResponse = self
            .call(
                endpoints::GENERATE_OFFLINE_CERTIFICATE,
                json!({
                    "license_key": license_key,
                    "device_hash": device.device_hash,
                    "device_name": device.device_name,
                    "app_version": device.app_version,
                }),
            )
            .await?;
        Ok(resp.certificate)
    }

    async fn list_activations(&self, license_key: &str) -> ApiResult<Vec<Activation>> {
        let resp: ListActivationsResponse = self
            .call(
                endpoints::LIST_ACTIVATIONS,
                json!({ "license_key": license_key }),
            )
            .await?;
        Ok(resp.activations)
    }
}
