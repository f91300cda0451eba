use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{Address, FieldError, VerificationResult};
use super::{AddressVerifier, VerificationError};
use crate::config::EasyPostConfig;

const UNVERIFIED_MESSAGE: &str = "address could not be verified";

/// EasyPost-backed [`AddressVerifier`].
#[derive(Clone)]
pub struct EasyPostClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateAddressRequest<'a> {
    address: &'a Address,
    verify: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct EasyPostAddress {
    #[serde(flatten)]
    address: Address,
    #[serde(default)]
    verifications: Option<Verifications>,
}

#[derive(Debug, Deserialize)]
struct Verifications {
    #[serde(default)]
    delivery: Option<Verification>,
}

#[derive(Debug, Deserialize)]
struct Verification {
    success: bool,
    #[serde(default)]
    errors: Vec<ProviderFieldError>,
}

#[derive(Debug, Deserialize)]
struct ProviderFieldError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    field: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ProviderError,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<ProviderFieldError>,
}

impl From<ProviderFieldError> for FieldError {
    fn from(value: ProviderFieldError) -> Self {
        FieldError {
            field: value.field,
            code: value.code,
            message: value
                .message
                .unwrap_or_else(|| UNVERIFIED_MESSAGE.to_string()),
        }
    }
}

impl EasyPostClient {
    pub fn new(config: &EasyPostConfig) -> Result<Self, VerificationError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| VerificationError::Client(err.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn map_transport_error(err: reqwest::Error) -> VerificationError {
        if err.is_timeout() {
            VerificationError::Timeout
        } else {
            VerificationError::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
impl AddressVerifier for EasyPostClient {
    async fn verify_address(
        &self,
        address: &Address,
    ) -> Result<VerificationResult, VerificationError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(VerificationError::NotConfigured)?;

        let address = address.clone().compact();
        let url = format!("{}/addresses", self.base_url);
        debug!(%url, address = %address.one_line(), "verifying address");

        let response = self
            .http
            .post(&url)
            .basic_auth(api_key, None::<&str>)
            .json(&CreateAddressRequest {
                address: &address,
                verify: ["delivery"],
            })
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let status = response.status();
        let body = response.text().await.map_err(Self::map_transport_error)?;

        if status.is_success() {
            let parsed: EasyPostAddress = serde_json::from_str(&body)
                .map_err(|err| VerificationError::Malformed(err.to_string()))?;
            let result = into_result(parsed);
            info!(verified = result.verified, errors = result.errors.len(), "address verified");
            return Ok(result);
        }

        let envelope = serde_json::from_str::<ErrorEnvelope>(&body).ok();
        let message = envelope
            .as_ref()
            .and_then(|envelope| envelope.error.message.clone())
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown error").to_string());

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(status = status.as_u16(), "verification provider rejected credentials");
                Err(VerificationError::Auth(message))
            }
            StatusCode::UNPROCESSABLE_ENTITY => {
                let errors = match envelope {
                    Some(ErrorEnvelope { error }) if !error.errors.is_empty() => {
                        error.errors.into_iter().map(FieldError::from).collect()
                    }
                    Some(ErrorEnvelope { error }) => vec![FieldError {
                        field: None,
                        code: error.code,
                        message,
                    }],
                    None => vec![FieldError {
                        field: None,
                        code: None,
                        message,
                    }],
                };
                info!(errors = errors.len(), "verification provider rejected address");
                Ok(VerificationResult {
                    verified: false,
                    normalized_address: None,
                    errors,
                })
            }
            _ => {
                warn!(status = status.as_u16(), %message, "verification provider error");
                Err(VerificationError::Upstream {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

fn into_result(parsed: EasyPostAddress) -> VerificationResult {
    let delivery = parsed.verifications.and_then(|v| v.delivery);
    let normalized = parsed.address.compact();
    let normalized_address = (!normalized.is_empty()).then_some(normalized);

    match delivery {
        Some(Verification {
            success: true,
            errors,
        }) => VerificationResult {
            verified: true,
            normalized_address,
            errors: errors.into_iter().map(FieldError::from).collect(),
        },
        Some(Verification {
            success: false,
            errors,
        }) => {
            let mut errors: Vec<FieldError> = errors.into_iter().map(FieldError::from).collect();
            if errors.is_empty() {
                errors.push(FieldError {
                    field: None,
                    code: None,
                    message: UNVERIFIED_MESSAGE.to_string(),
                });
            }
            VerificationResult {
                verified: false,
                normalized_address,
                errors,
            }
        }
        None => VerificationResult {
            verified: false,
            normalized_address,
            errors: vec![FieldError {
                field: None,
                code: None,
                message: "provider returned no delivery verification".to_string(),
            }],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, api_key: Option<&str>) -> EasyPostClient {
        EasyPostClient::new(&EasyPostConfig {
            api_key: api_key.map(str::to_string),
            base_url: format!("{}/v2/", server.uri()),
            timeout: Duration::from_millis(500),
        })
        .expect("client builds")
    }

    fn candidate() -> Address {
        Address {
            street1: Some("417 montgomery street".to_string()),
            street2: Some(String::new()),
            city: Some("SF".to_string()),
            state: Some("CA".to_string()),
            zip: Some("94104".to_string()),
            country: Some("US".to_string()),
            name: Some("Dr. Steve Brule".to_string()),
            company: None,
        }
    }

    #[tokio::test]
    async fn verified_address_returns_normalized_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/addresses"))
            .and(header_exists("authorization"))
            .and(body_partial_json(json!({
                "address": {"street1": "417 montgomery street", "zip": "94104"},
                "verify": ["delivery"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "adr_123",
                "object": "Address",
                "street1": "417 MONTGOMERY ST STE 500",
                "street2": "",
                "city": "SAN FRANCISCO",
                "state": "CA",
                "zip": "94104-1129",
                "country": "US",
                "name": "DR. STEVE BRULE",
                "company": null,
                "verifications": {"delivery": {"success": true, "errors": []}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = client(&server, Some("EZTK_test"))
            .verify_address(&candidate())
            .await
            .expect("verification succeeds");

        assert!(result.verified);
        assert!(result.errors.is_empty());
        let normalized = result.normalized_address.expect("normalized address");
        assert_eq!(normalized.street1.as_deref(), Some("417 MONTGOMERY ST STE 500"));
        assert_eq!(normalized.street2, None);
        assert_eq!(normalized.zip.as_deref(), Some("94104-1129"));
    }

    #[tokio::test]
    async fn failed_delivery_verification_reports_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/addresses"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "street1": "UNDELIVERABLE ST",
                "verifications": {"delivery": {"success": false, "errors": [
                    {"code": "E.ADDRESS.NOT_FOUND", "field": "address", "message": "Address not found"}
                ]}}
            })))
            .mount(&server)
            .await;

        let result = client(&server, Some("EZTK_test"))
            .verify_address(&candidate())
            .await
            .expect("verification completes");

        assert!(!result.verified);
        assert_eq!(
            result.errors,
            vec![FieldError {
                field: Some("address".to_string()),
                code: Some("E.ADDRESS.NOT_FOUND".to_string()),
                message: "Address not found".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn unverified_without_details_still_reports_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "verifications": {"delivery": {"success": false}}
            })))
            .mount(&server)
            .await;

        let result = client(&server, Some("EZTK_test"))
            .verify_address(&candidate())
            .await
            .expect("verification completes");
        assert!(!result.verified);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.normalized_address, None);
    }

    #[tokio::test]
    async fn unprocessable_address_is_a_validation_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "error": {
                    "code": "ADDRESS.VERIFY.FAILURE",
                    "message": "Unable to verify address.",
                    "errors": [{"field": "zip", "message": "Invalid zip"}]
                }
            })))
            .mount(&server)
            .await;

        let result = client(&server, Some("EZTK_test"))
            .verify_address(&candidate())
            .await
            .expect("validation style result");
        assert!(!result.verified);
        assert_eq!(result.errors[0].field.as_deref(), Some("zip"));
    }

    #[tokio::test]
    async fn rejected_credentials_map_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"code": "APIKEY.INACTIVE", "message": "This api key is no longer active."}
            })))
            .mount(&server)
            .await;

        let err = client(&server, Some("EZTK_revoked"))
            .verify_address(&candidate())
            .await
            .expect_err("auth failure");
        assert!(matches!(err, VerificationError::Auth(ref message) if message.contains("no longer active")));
    }

    #[tokio::test]
    async fn server_errors_and_garbage_bodies_are_upstream_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = client(&server, Some("EZTK_test"));
        let first = client.verify_address(&candidate()).await.expect_err("503");
        assert!(matches!(first, VerificationError::Upstream { status: 503, .. }));

        let second = client.verify_address(&candidate()).await.expect_err("garbage");
        assert!(matches!(second, VerificationError::Malformed(_)));
    }

    #[tokio::test]
    async fn slow_provider_times_out_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, Some("EZTK_test"))
            .verify_address(&candidate())
            .await
            .expect_err("timeout");
        assert!(matches!(err, VerificationError::Timeout));
    }

    #[tokio::test]
    async fn missing_api_key_is_not_configured() {
        let server = MockServer::start().await;
        let client = client(&server, None);
        assert!(!client.is_configured());
        let err = client
            .verify_address(&candidate())
            .await
            .expect_err("no key");
        assert!(matches!(err, VerificationError::NotConfigured));
    }
}
