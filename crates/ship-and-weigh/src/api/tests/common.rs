use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use crate::api::auth::{Capability, Session, StaticAuthenticator, NONCE_HEADER};
use crate::api::{api_router, ApiState};
use crate::settings::SettingsSpec;
use crate::store::{InMemoryOptionStore, OptionStore, StoreError};
use crate::verification::{
    Address, AddressVerifier, FieldError, VerificationError, VerificationResult,
};

pub(crate) const ADMIN_TOKEN: &str = "admin-token";
pub(crate) const ADMIN_NONCE: &str = "admin-nonce";
pub(crate) const EDITOR_TOKEN: &str = "editor-token";
pub(crate) const EDITOR_NONCE: &str = "editor-nonce";

/// Verifier that records requests and flags any address without a zip.
#[derive(Default)]
pub(crate) struct FakeVerifier {
    pub(crate) calls: Mutex<Vec<Address>>,
}

#[async_trait]
impl AddressVerifier for FakeVerifier {
    async fn verify_address(
        &self,
        address: &Address,
    ) -> Result<VerificationResult, VerificationError> {
        self.calls.lock().expect("calls mutex").push(address.clone());
        if address.zip.is_some() {
            Ok(VerificationResult {
                verified: true,
                normalized_address: Some(Address {
                    street1: address.street1.as_ref().map(|s| s.to_uppercase()),
                    ..address.clone()
                }),
                errors: Vec::new(),
            })
        } else {
            Ok(VerificationResult {
                verified: false,
                normalized_address: None,
                errors: vec![FieldError {
                    field: Some("zip".to_string()),
                    code: Some("E.ADDRESS.NOT_FOUND".to_string()),
                    message: "Address not found".to_string(),
                }],
            })
        }
    }
}

/// Verifier standing in for an unreachable provider.
pub(crate) struct DownVerifier;

#[async_trait]
impl AddressVerifier for DownVerifier {
    async fn verify_address(
        &self,
        _address: &Address,
    ) -> Result<VerificationResult, VerificationError> {
        Err(VerificationError::Unreachable("connection refused".to_string()))
    }
}

/// Option store whose backend is gone.
pub(crate) struct UnavailableStore;

impl OptionStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<Value>, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn set(&self, _key: &str, _value: Value) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }

    fn update(
        &self,
        _key: &str,
        _apply: &mut dyn FnMut(Option<Value>) -> Result<Value, StoreError>,
    ) -> Result<Value, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

pub(crate) fn authenticator() -> StaticAuthenticator {
    StaticAuthenticator::new([
        Session {
            token: ADMIN_TOKEN.to_string(),
            user: "admin".to_string(),
            nonce: ADMIN_NONCE.to_string(),
            capabilities: vec![Capability::ManageOptions],
        },
        Session {
            token: EDITOR_TOKEN.to_string(),
            user: "editor".to_string(),
            nonce: EDITOR_NONCE.to_string(),
            capabilities: Vec::new(),
        },
    ])
}

pub(crate) fn state_with(
    options: Arc<dyn OptionStore>,
    verifier: Arc<dyn AddressVerifier>,
) -> ApiState {
    ApiState::new(
        Arc::new(SettingsSpec::standard()),
        options,
        verifier,
        Arc::new(authenticator()),
    )
}

pub(crate) fn state() -> (ApiState, InMemoryOptionStore) {
    let options = InMemoryOptionStore::new();
    let state = state_with(Arc::new(options.clone()), Arc::new(FakeVerifier::default()));
    (state, options)
}

pub(crate) fn router() -> (Router, InMemoryOptionStore) {
    let (state, options) = state();
    (api_router(state), options)
}

pub(crate) fn url(path: &str) -> String {
    format!("/sg-ship-and-weigh-api/v1{path}")
}

/// Request builder authenticated as the admin session, nonce included.
pub(crate) fn admin(method: Method, path: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(url(path))
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_TOKEN}"))
        .header(NONCE_HEADER, ADMIN_NONCE)
}

pub(crate) fn json_body(value: Value) -> Body {
    Body::from(serde_json::to_vec(&value).expect("json body"))
}

pub(crate) async fn send(router: &Router, request: Request<Body>) -> Response {
    router.clone().oneshot(request).await.expect("route executes")
}

pub(crate) async fn send_json(
    router: &Router,
    method: Method,
    path: &str,
    body: Value,
) -> Response {
    let request = admin(method, path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(json_body(body))
        .expect("request builds");
    send(router, request).await
}

pub(crate) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(crate) fn assert_error(payload: &Value, status: StatusCode, code: &str) {
    assert_eq!(payload["code"], code, "payload: {payload}");
    assert_eq!(payload["data"]["status"], status.as_u16(), "payload: {payload}");
}
