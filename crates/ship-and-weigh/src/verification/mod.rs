//! Address verification against an external provider.

pub mod domain;
pub mod easypost;

pub use domain::{Address, FieldError, VerificationResult, ADDRESS_FIELDS};
pub use easypost::EasyPostClient;

use async_trait::async_trait;

/// Checks a candidate address and suggests corrections.
///
/// Implementations make a single attempt per call; retrying is left to the
/// caller.
#[async_trait]
pub trait AddressVerifier: Send + Sync {
    async fn verify_address(
        &self,
        address: &Address,
    ) -> Result<VerificationResult, VerificationError>;
}

/// Error raised while talking to the verification provider.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("address verification is not configured")]
    NotConfigured,
    #[error("verification provider rejected the configured credentials: {0}")]
    Auth(String),
    #[error("verification provider timed out")]
    Timeout,
    #[error("verification provider unreachable: {0}")]
    Unreachable(String),
    #[error("verification provider returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("verification provider returned a malformed response: {0}")]
    Malformed(String),
    #[error("failed to build verification client: {0}")]
    Client(String),
}

impl VerificationError {
    pub fn code(&self) -> &'static str {
        match self {
            VerificationError::NotConfigured => "verification_not_configured",
            VerificationError::Auth(_) => "verification_auth_failed",
            VerificationError::Timeout => "verification_timeout",
            VerificationError::Unreachable(_) => "verification_unreachable",
            VerificationError::Upstream { .. } => "verification_upstream_error",
            VerificationError::Malformed(_) => "verification_malformed_response",
            VerificationError::Client(_) => "verification_client_error",
        }
    }
}
