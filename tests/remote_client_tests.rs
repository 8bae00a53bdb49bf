//! `RemoteLicenseClient` against a local mock license server.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use pos_license::certificate::{
    verify_for_device, CertificateConstraints, CertificatePayload, OfflineCertificate,
    TrustedKey, CERT_TYPE,
};
use pos_license::client::api::{DeviceIdentity, LicenseApi, RemoteLicenseClient};
use pos_license::client::errors::ApiErrorCode;
use pos_license::signing::{RequestSigner, SIGNATURE_HEADER};

const SECRET: &[u8] = b"shared-product-secret";
const PRODUCT: &str = "netviper-pos";

#[derive(Clone)]
struct MockServer {
    signer: RequestSigner,
    /// (endpoint, body) of every correctly signed request
    received: Arc<Mutex<Vec<(String, Value)>>>,
    /// Ed25519 PKCS#8 key the server signs certificates with
    issuer: Arc<Vec<u8>>,
}

impl MockServer {
    fn certificate(&self, body: &Value) -> OfflineCertificate {
        let issued_at = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        let payload = CertificatePayload {
            cert_type: CERT_TYPE.to_string(),
            version: 1,
            product_code: body["product_code"].as_str().unwrap_or_default().to_string(),
            license_key: body["license_key"].as_str().unwrap_or_default().to_string(),
            device_hash: body["device_hash"].as_str().unwrap_or_default().to_string(),
            device_name: body["device_name"].as_str().map(str::to_string),
            app_version: body["app_version"].as_str().map(str::to_string),
            issued_at,
            valid_until: issued_at + ChronoDuration::days(30),
            constraints: CertificateConstraints {
                max_activations: Some(3),
            },
        };
        OfflineCertificate::sign(&payload, &self.issuer).unwrap()
    }

    fn trusted_key(&self) -> TrustedKey {
        let pair = Ed25519KeyPair::from_pkcs8(&self.issuer).unwrap();
        TrustedKey::from_bytes(pair.public_key().as_ref().try_into().unwrap())
    }
}

async fn handle(
    State(server): State<MockServer>,
    Path(endpoint): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Ok(body) = serde_json::from_slice::<Value>(&body) else {
        return (StatusCode::BAD_REQUEST, Json(json!({"ok": false, "error": "invalid_request"})))
            .into_response();
    };
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !server.signer.verify(&body, signature) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"ok": false, "error": "invalid_signature"})),
        )
            .into_response();
    }
    server
        .received
        .lock()
        .unwrap()
        .push((endpoint.clone(), body.clone()));

    let key = body["license_key"].as_str().unwrap_or_default();
    match (endpoint.as_str(), key) {
        ("verify", "NVPOS-GONE") => Json(json!({"ok": false, "error": "license_not_found"})).into_response(),
        ("verify", _) => Json(json!({
            "ok": true,
            "status": "active",
            "expires_at": "2025-12-01",
            "metadata": {"plan": "quarterly", "customer_email": "owner@cornershop.example"},
            "activation_count": 2,
            "max_activations": 3
        }))
        .into_response(),
        ("activate", "NVPOS-FULL") => (
            StatusCode::CONFLICT,
            Json(json!({"ok": false, "error": "max_activations_reached"})),
        )
            .into_response(),
        ("activate", _) => Json(json!({"ok": true, "activation_id": "act-1001"})).into_response(),
        ("heartbeat", "NVPOS-BOOM") => {
            (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response()
        }
        ("heartbeat", _) => {
            Json(json!({"ok": true, "server_time": "2025-06-01T09:00:00Z"})).into_response()
        }
        ("generate_offline_certificate", _) => {
            Json(json!({"ok": true, "certificate": server.certificate(&body)})).into_response()
        }
        ("issue", _) => Json(json!({"ok": true, "license_key": "NVPOS-N3W1-K3Y5-0001"})).into_response(),
        ("revoke", _) => Json(json!({"ok": true, "message": "license revoked"})).into_response(),
        ("deactivate", _) => (StatusCode::BAD_GATEWAY, Json(json!({"ok": false}))).into_response(),
        ("list_activations", _) => Json(json!({
            "ok": true,
            "activations": [
                {"device_hash": "aa11", "device_name": "till-01", "activated_at": "2025-05-01T10:00:00Z"},
                {"device_hash": "bb22"}
            ]
        }))
        .into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({"ok": false, "error": "not_found"}))).into_response(),
    }
}

async fn spawn_server() -> (SocketAddr, MockServer) {
    let server = MockServer {
        signer: RequestSigner::new(SECRET).unwrap(),
        received: Arc::new(Mutex::new(Vec::new())),
        issuer: Arc::new(
            Ed25519KeyPair::generate_pkcs8(&SystemRandom::new())
                .unwrap()
                .as_ref()
                .to_vec(),
        ),
    };
    let app = Router::new()
        .route("/api/:endpoint", post(handle))
        .with_state(server.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, server)
}

fn client(addr: SocketAddr, secret: &[u8]) -> RemoteLicenseClient {
    RemoteLicenseClient::with_settings(
        &format!("http://{addr}/api/"),
        PRODUCT,
        secret,
        Duration::from_secs(5),
    )
    .unwrap()
}

fn device() -> DeviceIdentity {
    DeviceIdentity {
        device_hash: "aa11".to_string(),
        device_name: "till-01".to_string(),
        app_version: "2.4.0".to_string(),
    }
}

#[tokio::test]
async fn verify_sends_signed_request_with_product_code() {
    let (addr, server) = spawn_server().await;
    let resp = client(addr, SECRET).verify("NVPOS-7K2M").await.unwrap();

    assert_eq!(resp.status, "active");
    assert_eq!(resp.metadata.plan.as_deref(), Some("quarterly"));
    assert_eq!(resp.activations_used, Some(2));
    assert!(resp.expiry().is_some());

    let received = server.received.lock().unwrap().clone();
    assert_eq!(received.len(), 1);
    let (endpoint, body) = &received[0];
    assert_eq!(endpoint, "verify");
    assert_eq!(body["product_code"], PRODUCT);
    assert_eq!(body["license_key"], "NVPOS-7K2M");
}

#[tokio::test]
async fn activate_sends_device_identity() {
    let (addr, server) = spawn_server().await;
    let resp = client(addr, SECRET)
        .activate("NVPOS-7K2M", &device())
        .await
        .unwrap();
    assert_eq!(resp.activation_id, "act-1001");
    assert_eq!(resp.metadata, None);

    let received = server.received.lock().unwrap().clone();
    let (_, body) = &received[0];
    assert_eq!(body["device_hash"], "aa11");
    assert_eq!(body["device_name"], "till-01");
    assert_eq!(body["app_version"], "2.4.0");
}

#[tokio::test]
async fn server_error_codes_are_mapped() {
    let (addr, _server) = spawn_server().await;
    let client = client(addr, SECRET);

    let err = client.verify("NVPOS-GONE").await.unwrap_err();
    assert_eq!(err.code, ApiErrorCode::LicenseNotFound);

    let err = client.activate("NVPOS-FULL", &device()).await.unwrap_err();
    assert_eq!(err.code, ApiErrorCode::MaxActivationsReached);

    // 5xx with a body that is not JSON
    let err = client.heartbeat("NVPOS-BOOM", "aa11").await.unwrap_err();
    assert_eq!(err.code, ApiErrorCode::ServerError);

    // 5xx envelope without an error code
    let err = client.deactivate("NVPOS-7K2M", "aa11").await.unwrap_err();
    assert_eq!(err.code, ApiErrorCode::ServerError);
}

#[tokio::test]
async fn wrong_secret_is_rejected() {
    let (addr, server) = spawn_server().await;
    let err = client(addr, b"not-the-secret")
        .verify("NVPOS-7K2M")
        .await
        .unwrap_err();
    assert_eq!(err.code, ApiErrorCode::InvalidSignature);
    assert!(server.received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn list_activations_returns_devices() {
    let (addr, _server) = spawn_server().await;
    let activations = client(addr, SECRET)
        .list_activations("NVPOS-7K2M")
        .await
        .unwrap();
    assert_eq!(activations.len(), 2);
    assert_eq!(activations[0].device_name.as_deref(), Some("till-01"));
    assert_eq!(activations[1].device_hash, "bb22");
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(addr, SECRET).verify("NVPOS-7K2M").await.unwrap_err();
    assert_eq!(err.code, ApiErrorCode::NetworkError);
}

#[tokio::test]
async fn repeated_verify_gives_same_answer() {
    let (addr, server) = spawn_server().await;
    let client = client(addr, SECRET);

    let first = client.verify("NVPOS-7K2M").await.unwrap();
    let second = client.verify("NVPOS-7K2M").await.unwrap();
    assert_eq!(first.status, second.status);
    assert_eq!(first.metadata, second.metadata);
    assert_eq!(first.expiry(), second.expiry());

    let received = server.received.lock().unwrap().clone();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].1, received[1].1, "request body is canonical");
}

#[tokio::test]
async fn heartbeat_returns_server_time() {
    let (addr, server) = spawn_server().await;
    let resp = client(addr, SECRET)
        .heartbeat("NVPOS-7K2M", "aa11")
        .await
        .unwrap();
    assert_eq!(resp.server_time.as_deref(), Some("2025-06-01T09:00:00Z"));

    let (endpoint, body) = server.received.lock().unwrap()[0].clone();
    assert_eq!(endpoint, "heartbeat");
    assert_eq!(body["device_hash"], "aa11");
}

#[tokio::test]
async fn generated_certificate_verifies_for_this_device() {
    let (addr, server) = spawn_server().await;
    let cert = client(addr, SECRET)
        .generate_offline_certificate("NVPOS-7K2M", &device())
        .await
        .unwrap();

    let now = Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap();
    let payload = verify_for_device(&cert, &server.trusted_key(), now, "aa11").unwrap();
    assert_eq!(payload.license_key, "NVPOS-7K2M");
    assert_eq!(payload.product_code, PRODUCT);
    assert_eq!(payload.device_name.as_deref(), Some("till-01"));
}

#[tokio::test]
async fn vendor_issue_and_revoke() {
    let (addr, server) = spawn_server().await;
    let client = client(addr, SECRET);

    let issued = client
        .issue("Corner Shop", "owner@cornershop.example", 3)
        .await
        .unwrap();
    assert_eq!(issued.license_key, "NVPOS-N3W1-K3Y5-0001");

    let ack = client.revoke(&issued.license_key).await.unwrap();
    assert_eq!(ack.message.as_deref(), Some("license revoked"));

    let received = server.received.lock().unwrap().clone();
    let (_, issue_body) = &received[0];
    assert_eq!(issue_body["customer_name"], "Corner Shop");
    assert_eq!(issue_body["customer_email"], "owner@cornershop.example");
    assert_eq!(issue_body["max_activations"], 3);
    let (endpoint, revoke_body) = &received[1];
    assert_eq!(endpoint, "revoke");
    assert_eq!(revoke_body["license_key"], "NVPOS-N3W1-K3Y5-0001");
    assert_eq!(revoke_body["product_code"], PRODUCT);
}
