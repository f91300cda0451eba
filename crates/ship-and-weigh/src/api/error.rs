use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use tracing::{error, warn};

use crate::recipients::RecipientError;
use crate::settings::SettingsError;
use crate::store::StoreError;
use crate::verification::VerificationError;

/// Failure surfaced by the REST namespace, rendered as a JSON error body.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Sorry, you are not allowed to do that.")]
    Forbidden,
    #[error("Cookie check failed.")]
    InvalidNonce,
    #[error("Missing parameter(s): {}", .0.join(", "))]
    MissingParams(Vec<String>),
    #[error("Invalid parameter(s): {}", .0.keys().cloned().collect::<Vec<_>>().join(", "))]
    InvalidParams(BTreeMap<String, String>),
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
    #[error("Unsupported content type '{0}'.")]
    UnsupportedMediaType(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Recipients(#[from] RecipientError),
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Forbidden | ApiError::InvalidNonce => StatusCode::FORBIDDEN,
            ApiError::MissingParams(_) | ApiError::InvalidParams(_) | ApiError::InvalidBody(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Settings(SettingsError::Store(_))
            | ApiError::Recipients(RecipientError::Store(_))
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Settings(_) | ApiError::Recipients(_) => StatusCode::BAD_REQUEST,
            ApiError::Verification(VerificationError::NotConfigured) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Verification(VerificationError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Verification(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Forbidden => "rest_forbidden",
            ApiError::InvalidNonce => "rest_cookie_invalid_nonce",
            ApiError::MissingParams(_) => "rest_missing_callback_param",
            ApiError::InvalidParams(_) => "rest_invalid_param",
            ApiError::InvalidBody(_) => "rest_invalid_json",
            ApiError::UnsupportedMediaType(_) => "rest_unsupported_media_type",
            ApiError::Settings(SettingsError::UnknownSetting(_))
            | ApiError::Settings(SettingsError::InvalidValue { .. })
            | ApiError::Recipients(RecipientError::NoAddresses)
            | ApiError::Recipients(RecipientError::BlankAddress { .. })
            | ApiError::Recipients(RecipientError::InvalidId(_)) => "rest_invalid_param",
            ApiError::Settings(SettingsError::Store(_))
            | ApiError::Recipients(RecipientError::Store(_)) => "persistence_error",
            ApiError::Verification(err) => err.code(),
            ApiError::Internal(_) => "internal_error",
        }
    }

    fn params(&self) -> Option<Value> {
        match self {
            ApiError::MissingParams(names) => Some(json!(names)),
            ApiError::InvalidParams(params) => Some(json!(params)),
            ApiError::Settings(SettingsError::UnknownSetting(key)) => {
                Some(json!({ key: "unknown setting" }))
            }
            ApiError::Settings(SettingsError::InvalidValue { key, reason }) => {
                Some(json!({ key: reason }))
            }
            ApiError::Recipients(RecipientError::NoAddresses)
            | ApiError::Recipients(RecipientError::BlankAddress { .. }) => {
                Some(json!({ "to_address": self.to_string() }))
            }
            ApiError::Recipients(RecipientError::InvalidId(_)) => {
                Some(json!({ "uuid": self.to_string() }))
            }
            _ => None,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        Self::Settings(SettingsError::Store(value))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(code = self.code(), error = %self, "request failed");
        } else if status == StatusCode::FORBIDDEN {
            warn!(code = self.code(), "request rejected");
        }

        let mut data = json!({ "status": status.as_u16() });
        if let Some(params) = self.params() {
            data["params"] = params;
        }

        let body = Json(json!({
            "code": self.code(),
            "message": self.to_string(),
            "data": data,
        }));
        (status, body).into_response()
    }
}
