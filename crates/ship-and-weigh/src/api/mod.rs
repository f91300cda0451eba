//! REST namespace `sg-ship-and-weigh-api/v1`.
//!
//! Routes come from a single table ([`routes::route_table`]). Each request is
//! authorized, then its parameters are validated and sanitized against the
//! route's schema, and only then dispatched to a typed handler.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod params;
pub mod routes;

#[cfg(test)]
pub(crate) mod tests;

use std::sync::Arc;

use crate::recipients::RecipientStore;
use crate::settings::{SettingsSpec, SettingsStore};
use crate::store::OptionStore;
use crate::verification::AddressVerifier;

pub use auth::{Authenticator, Capability, Principal, Session, StaticAuthenticator};
pub use error::ApiError;
pub use handlers::{AddRecipientParams, RemovalResult, RemoveRecipientParams, SettingsInput};
pub use params::{ParamSchema, ParamSpec, Params};
pub use routes::{api_router, route_table, Access, RouteDefinition, NAMESPACE};

/// Shared handles the handlers dispatch to.
#[derive(Clone)]
pub struct ApiState {
    pub settings: SettingsStore,
    pub recipients: RecipientStore,
    pub verifier: Arc<dyn AddressVerifier>,
    pub authenticator: Arc<dyn Authenticator>,
    /// Log request payloads that are otherwise kept out of the logs.
    pub diagnostics: bool,
}

impl ApiState {
    pub fn new(
        spec: Arc<SettingsSpec>,
        options: Arc<dyn OptionStore>,
        verifier: Arc<dyn AddressVerifier>,
        authenticator: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            settings: SettingsStore::new(spec, options.clone()),
            recipients: RecipientStore::new(options),
            verifier,
            authenticator,
            diagnostics: false,
        }
    }

    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.diagnostics = enabled;
        self
    }
}
