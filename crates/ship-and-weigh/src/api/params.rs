//! Declared request parameters and the validation pass run before handlers.

use std::collections::BTreeMap;

use axum::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::{Form, FromRequest, FromRequestParts, Query};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Method, Request, Uri};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::error::ApiError;
use crate::sanitize::Sanitizer;
use crate::settings::{SettingType, SettingsSpec};

/// One accepted parameter: name, shape, whether it must be present, and the
/// cleaner applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: SettingType,
    pub required: bool,
    pub sanitizer: Sanitizer,
}

impl ParamSpec {
    pub fn required(name: &str, kind: SettingType, sanitizer: Sanitizer) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            sanitizer,
        }
    }

    pub fn optional(name: &str, kind: SettingType, sanitizer: Sanitizer) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, sanitizer)
        }
    }
}

/// The full set of parameters a route accepts. Anything else is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSchema {
    params: Vec<ParamSpec>,
}

impl ParamSchema {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(params: impl IntoIterator<Item = ParamSpec>) -> Self {
        Self {
            params: params.into_iter().collect(),
        }
    }

    /// Every setting becomes an optional parameter with its declared type and
    /// sanitizer.
    pub fn from_settings(spec: &SettingsSpec) -> Self {
        Self::new(spec.definitions().map(|definition| {
            ParamSpec::optional(&definition.key, definition.kind, definition.sanitizer)
        }))
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|param| param.name == name)
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    /// Reject unknown, missing and mistyped parameters, then sanitize what is
    /// left.
    pub fn validate(&self, raw: Map<String, Value>) -> Result<Map<String, Value>, ApiError> {
        let mut invalid = BTreeMap::new();
        for name in raw.keys() {
            if self.get(name).is_none() {
                invalid.insert(name.clone(), "unknown parameter".to_string());
            }
        }

        let mut missing = Vec::new();
        let mut sanitized = Map::new();
        for param in &self.params {
            match raw.get(&param.name) {
                None | Some(Value::Null) => {
                    if param.required {
                        missing.push(param.name.clone());
                    }
                }
                Some(value) => match param.kind.coerce(value) {
                    Ok(value) => {
                        let clean = value.sanitized(param.sanitizer);
                        sanitized.insert(param.name.clone(), clean.to_json());
                    }
                    Err(_) => {
                        invalid.insert(
                            param.name.clone(),
                            format!("{} is not of type {}", param.name, param.kind.label()),
                        );
                    }
                },
            }
        }

        if !missing.is_empty() {
            return Err(ApiError::MissingParams(missing));
        }
        if !invalid.is_empty() {
            return Err(ApiError::InvalidParams(invalid));
        }
        Ok(sanitized)
    }
}

/// Raw request parameters from the query string and the body.
///
/// Body values win over query values. `key[]` and repeated keys build arrays,
/// matching how browser forms submit lists.
pub async fn collect(
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Map<String, Value>, ApiError> {
    let mut params = Map::new();

    if uri.query().is_some() {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri)
            .map_err(|err| ApiError::InvalidBody(err.body_text()))?;
        merge_pairs(&mut params, pairs);
    }

    if body.is_empty() {
        return Ok(params);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let mime: mime::Mime = content_type
        .parse()
        .map_err(|_| ApiError::UnsupportedMediaType(content_type.to_string()))?;

    let from_body = if mime.essence_str() == mime::APPLICATION_JSON.essence_str()
        || mime.suffix() == Some(mime::JSON)
    {
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(ApiError::InvalidBody(
                    "expected a JSON object".to_string(),
                ))
            }
            Err(err) => return Err(ApiError::InvalidBody(err.to_string())),
        }
    } else if mime.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() {
        let request = Request::builder()
            .method(Method::POST)
            .header(header::CONTENT_TYPE, mime::APPLICATION_WWW_FORM_URLENCODED.as_ref())
            .body(Body::from(body))
            .map_err(|err| ApiError::Internal(err.to_string()))?;
        let Form(pairs) = Form::<Vec<(String, String)>>::from_request(request, &())
            .await
            .map_err(|err| ApiError::InvalidBody(err.body_text()))?;
        let mut map = Map::new();
        merge_pairs(&mut map, pairs);
        map
    } else {
        return Err(ApiError::UnsupportedMediaType(content_type.to_string()));
    };

    params.extend(from_body);
    Ok(params)
}

fn merge_pairs(params: &mut Map<String, Value>, pairs: Vec<(String, String)>) {
    for (key, value) in pairs {
        let (key, is_list) = match key.strip_suffix("[]") {
            Some(stripped) => (stripped.to_string(), true),
            None => (key, false),
        };
        match params.get_mut(&key) {
            Some(Value::Array(items)) => items.push(Value::String(value)),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, Value::String(value)]);
            }
            None if is_list => {
                params.insert(key, Value::Array(vec![Value::String(value)]));
            }
            None => {
                params.insert(key, Value::String(value));
            }
        }
    }
}

/// Sanitized parameters attached to the request once validation passed.
#[derive(Debug, Clone, Default)]
pub struct ValidatedParams(pub Map<String, Value>);

/// Typed view of a route's validated parameters.
#[derive(Debug, Clone)]
pub struct Params<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for Params<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ValidatedParams(params) = parts
            .extensions
            .get::<ValidatedParams>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("request parameters were not validated".to_string()))?;

        serde_json::from_value(Value::Object(params))
            .map(Params)
            .map_err(|err| ApiError::InvalidBody(err.to_string()))
    }
}
