//! The namespace's route table and the guard every route runs through.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::handler::Handler;
use axum::http::Method;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{self, MethodRouter};
use axum::Router;
use tracing::debug;

use super::auth::{Capability, Principal, NONCE_HEADER};
use super::error::ApiError;
use super::handlers;
use super::params::{self, ParamSchema, ParamSpec, ValidatedParams};
use super::ApiState;
use crate::sanitize::Sanitizer;
use crate::settings::SettingType;
use crate::verification::ADDRESS_FIELDS;

/// REST namespace every route is mounted under.
pub const NAMESPACE: &str = "sg-ship-and-weigh-api/v1";

const MAX_BODY_BYTES: usize = 64 * 1024;

/// Who may call a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    pub capability: Capability,
    /// Whether the caller must also present the session nonce.
    pub nonce: bool,
}

impl Access {
    pub const fn admin() -> Self {
        Self {
            capability: Capability::ManageOptions,
            nonce: false,
        }
    }

    pub const fn admin_with_nonce() -> Self {
        Self {
            capability: Capability::ManageOptions,
            nonce: true,
        }
    }
}

/// One row of the route table.
pub struct RouteDefinition {
    pub method: Method,
    pub path: &'static str,
    pub params: ParamSchema,
    pub access: Access,
    handler: MethodRouter<ApiState>,
}

impl RouteDefinition {
    fn new<H, T>(method: Method, path: &'static str, handler: H) -> Self
    where
        H: Handler<T, ApiState>,
        T: 'static,
    {
        let handler = if method == Method::POST {
            routing::post(handler)
        } else if method == Method::DELETE {
            routing::delete(handler)
        } else {
            routing::get(handler)
        };
        Self {
            method,
            path,
            params: ParamSchema::empty(),
            access: Access::admin(),
            handler,
        }
    }

    pub fn get<H, T>(path: &'static str, handler: H) -> Self
    where
        H: Handler<T, ApiState>,
        T: 'static,
    {
        Self::new(Method::GET, path, handler)
    }

    pub fn post<H, T>(path: &'static str, handler: H) -> Self
    where
        H: Handler<T, ApiState>,
        T: 'static,
    {
        Self::new(Method::POST, path, handler)
    }

    pub fn delete<H, T>(path: &'static str, handler: H) -> Self
    where
        H: Handler<T, ApiState>,
        T: 'static,
    {
        Self::new(Method::DELETE, path, handler)
    }

    pub fn params(mut self, params: ParamSchema) -> Self {
        self.params = params;
        self
    }

    pub fn access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    /// Full path including the namespace, e.g. `/sg-ship-and-weigh-api/v1/settings`.
    pub fn full_path(&self) -> String {
        format!("/{NAMESPACE}{}", self.path)
    }
}

/// Every route the namespace exposes.
///
/// All routes require the administrative capability; anything that writes, or
/// spends provider credit, also requires the nonce.
pub fn route_table(state: &ApiState) -> Vec<RouteDefinition> {
    let address_params = ParamSchema::new(ADDRESS_FIELDS.iter().map(|field| {
        ParamSpec::optional(field, SettingType::String, Sanitizer::TextField)
    }));

    vec![
        RouteDefinition::get("/settings", handlers::get_settings),
        RouteDefinition::post("/settings", handlers::update_settings)
            .params(ParamSchema::from_settings(state.settings.spec()))
            .access(Access::admin_with_nonce()),
        RouteDefinition::get("/settings/schema", handlers::settings_schema),
        RouteDefinition::get("/recipients", handlers::list_recipients),
        RouteDefinition::post("/recipients", handlers::add_recipient)
            .params(ParamSchema::new([ParamSpec::required(
                "to_address",
                SettingType::StringArray,
                Sanitizer::Attribute,
            )]))
            .access(Access::admin_with_nonce()),
        RouteDefinition::delete("/recipients", handlers::remove_recipient)
            .params(ParamSchema::new([ParamSpec::required(
                "uuid",
                SettingType::String,
                Sanitizer::TextField,
            )]))
            .access(Access::admin_with_nonce()),
        RouteDefinition::get("/easypost/verify-address", handlers::verify_address)
            .params(address_params)
            .access(Access::admin_with_nonce()),
    ]
}

#[derive(Clone)]
struct RouteGuard {
    state: ApiState,
    route: &'static str,
    access: Access,
    params: Arc<ParamSchema>,
}

/// Build the namespace router by walking the route table.
pub fn api_router(state: ApiState) -> Router {
    let mut router = Router::new();
    for route in route_table(&state) {
        let full_path = route.full_path();
        debug!(method = %route.method, path = %full_path, "registering route");

        let guard = RouteGuard {
            state: state.clone(),
            route: route.path,
            access: route.access,
            params: Arc::new(route.params),
        };
        let endpoint = route
            .handler
            .layer(middleware::from_fn_with_state(guard, guard_request));
        router = router.route(&full_path, endpoint);
    }
    router.with_state(state)
}

/// Authorize, then validate and sanitize parameters, before dispatching.
async fn guard_request(State(guard): State<RouteGuard>, request: Request, next: Next) -> Response {
    match prepare(&guard, request).await {
        Ok(request) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

async fn prepare(guard: &RouteGuard, request: Request) -> Result<Request, ApiError> {
    let (mut parts, body) = request.into_parts();

    let principal = authorize(guard, &parts.headers)?;
    debug!(route = guard.route, method = %parts.method, user = %principal.user, "request authorized");

    let body = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|err| ApiError::InvalidBody(err.to_string()))?;
    let raw = params::collect(&parts.uri, &parts.headers, body).await?;
    let validated = guard.params.validate(raw)?;
    debug!(route = guard.route, params = validated.len(), "request validated");

    parts.extensions.insert(principal);
    parts.extensions.insert(ValidatedParams(validated));
    Ok(Request::from_parts(parts, Body::empty()))
}

fn authorize(guard: &RouteGuard, headers: &axum::http::HeaderMap) -> Result<Principal, ApiError> {
    let authenticator = &guard.state.authenticator;
    let principal = authenticator
        .authenticate(headers)
        .ok_or(ApiError::Forbidden)?;

    if !principal.can(guard.access.capability) {
        return Err(ApiError::Forbidden);
    }

    if guard.access.nonce {
        let nonce = headers
            .get(NONCE_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or(ApiError::InvalidNonce)?;
        if !authenticator.verify_nonce(&principal, nonce) {
            return Err(ApiError::InvalidNonce);
        }
    }

    Ok(principal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::common::state;

    #[test]
    fn table_lists_every_namespace_route() {
        let (state, _) = state();
        let table = route_table(&state);
        let rows: Vec<_> = table
            .iter()
            .map(|route| (route.method.clone(), route.path))
            .collect();

        assert_eq!(
            rows,
            vec![
                (Method::GET, "/settings"),
                (Method::POST, "/settings"),
                (Method::GET, "/settings/schema"),
                (Method::GET, "/recipients"),
                (Method::POST, "/recipients"),
                (Method::DELETE, "/recipients"),
                (Method::GET, "/easypost/verify-address"),
            ]
        );
        assert!(table
            .iter()
            .all(|route| route.access.capability == Capability::ManageOptions));
        assert!(table
            .iter()
            .filter(|route| route.method != Method::GET)
            .all(|route| route.access.nonce));
    }

    #[test]
    fn route_params_match_declared_interfaces() {
        let (state, _) = state();
        let table = route_table(&state);
        let find = |method: Method, path: &str| {
            table
                .iter()
                .find(|route| route.method == method && route.path == path)
                .expect("route present")
        };

        let add = find(Method::POST, "/recipients");
        let to_address = add.params.get("to_address").expect("to_address declared");
        assert!(to_address.required);
        assert_eq!(to_address.kind, SettingType::StringArray);

        let verify = find(Method::GET, "/easypost/verify-address");
        assert_eq!(verify.params.params().len(), ADDRESS_FIELDS.len());
        assert!(verify.params.params().iter().all(|param| !param.required));

        assert_eq!(
            find(Method::GET, "/settings").full_path(),
            "/sg-ship-and-weigh-api/v1/settings"
        );
    }
}
