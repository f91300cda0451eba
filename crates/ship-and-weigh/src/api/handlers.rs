use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::error::ApiError;
use super::params::Params;
use super::ApiState;
use crate::recipients::Recipient;
use crate::settings::SettingsMap;
use crate::verification::{Address, VerificationResult};

/// Body of a settings update: one entry per declared setting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct SettingsInput(pub BTreeMap<String, Value>);

#[derive(Debug, Clone, Deserialize)]
pub struct AddRecipientParams {
    pub to_address: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoveRecipientParams {
    pub uuid: String,
}

/// Outcome of a delete; `removed` is false when the id was already gone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalResult {
    pub id: String,
    pub removed: bool,
}

pub(crate) async fn get_settings(
    State(state): State<ApiState>,
) -> Result<Json<SettingsMap>, ApiError> {
    Ok(Json(state.settings.get_settings()?))
}

pub(crate) async fn update_settings(
    State(state): State<ApiState>,
    Params(SettingsInput(input)): Params<SettingsInput>,
) -> Result<(StatusCode, Json<SettingsMap>), ApiError> {
    let settings = state.settings.save_settings(&input)?;
    Ok((StatusCode::CREATED, Json(settings)))
}

pub(crate) async fn settings_schema(State(state): State<ApiState>) -> Result<Json<Value>, ApiError> {
    serde_json::to_value(state.settings.spec().describe())
        .map(Json)
        .map_err(|err| ApiError::Internal(err.to_string()))
}

pub(crate) async fn list_recipients(
    State(state): State<ApiState>,
) -> Result<Json<Vec<Recipient>>, ApiError> {
    Ok(Json(state.recipients.get_recipients()?))
}

pub(crate) async fn add_recipient(
    State(state): State<ApiState>,
    Params(params): Params<AddRecipientParams>,
) -> Result<Json<Recipient>, ApiError> {
    if state.diagnostics {
        debug!(to_address = ?params.to_address, "adding recipient");
    }
    Ok(Json(state.recipients.add_recipient(&params.to_address)?))
}

pub(crate) async fn remove_recipient(
    State(state): State<ApiState>,
    Params(params): Params<RemoveRecipientParams>,
) -> Result<Json<RemovalResult>, ApiError> {
    let removed = state.recipients.remove_recipient(&params.uuid)?;
    Ok(Json(RemovalResult {
        id: params.uuid,
        removed,
    }))
}

pub(crate) async fn verify_address(
    State(state): State<ApiState>,
    Params(address): Params<Address>,
) -> Result<Json<VerificationResult>, ApiError> {
    Ok(Json(state.verifier.verify_address(&address).await?))
}
