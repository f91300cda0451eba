//! Caller identity, capabilities and the anti-forgery nonce.
//!
//! The hosting platform owns sessions; [`Authenticator`] is the seam it plugs
//! into. [`StaticAuthenticator`] serves configured bearer-token sessions.

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// Header carrying the per-session anti-forgery token.
pub const NONCE_HEADER: &str = "x-wp-nonce";

/// Permission levels understood by the route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Administrative access to plugin settings and recipients.
    ManageOptions,
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user: String,
    pub capabilities: Vec<Capability>,
}

impl Principal {
    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

/// Resolves callers and checks their nonce.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, headers: &HeaderMap) -> Option<Principal>;
    fn verify_nonce(&self, principal: &Principal, nonce: &str) -> bool;
}

/// A configured login session.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user: String,
    pub nonce: String,
    pub capabilities: Vec<Capability>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

/// Authenticator backed by a fixed list of sessions, keyed by bearer token.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    sessions: Vec<Session>,
}

impl StaticAuthenticator {
    pub fn new(sessions: impl IntoIterator<Item = Session>) -> Self {
        Self {
            sessions: sessions.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Authenticator for StaticAuthenticator {
    fn authenticate(&self, headers: &HeaderMap) -> Option<Principal> {
        let token = bearer_token(headers)?;
        self.sessions
            .iter()
            .find(|session| bool::from(session.token.as_bytes().ct_eq(token.as_bytes())))
            .map(|session| Principal {
                user: session.user.clone(),
                capabilities: session.capabilities.clone(),
            })
    }

    fn verify_nonce(&self, principal: &Principal, nonce: &str) -> bool {
        self.sessions
            .iter()
            .filter(|session| session.user == principal.user)
            .any(|session| bool::from(session.nonce.as_bytes().ct_eq(nonce.trim().as_bytes())))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn authenticator() -> StaticAuthenticator {
        StaticAuthenticator::new([
            Session {
                token: "admin-token".to_string(),
                user: "admin".to_string(),
                nonce: "n0nce".to_string(),
                capabilities: vec![Capability::ManageOptions],
            },
            Session {
                token: "shop-token".to_string(),
                user: "shop".to_string(),
                nonce: "shop-nonce".to_string(),
                capabilities: Vec::new(),
            },
        ])
    }

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(authorization).expect("valid header"),
        );
        headers
    }

    #[test]
    fn resolves_bearer_tokens() {
        let auth = authenticator();
        let principal = auth
            .authenticate(&headers("Bearer admin-token"))
            .expect("admin resolves");
        assert_eq!(principal.user, "admin");
        assert!(principal.can(Capability::ManageOptions));

        let shop = auth
            .authenticate(&headers("bearer shop-token"))
            .expect("shop resolves");
        assert!(!shop.can(Capability::ManageOptions));
    }

    #[test]
    fn rejects_unknown_or_malformed_credentials() {
        let auth = authenticator();
        assert!(auth.authenticate(&HeaderMap::new()).is_none());
        assert!(auth.authenticate(&headers("Bearer nope")).is_none());
        assert!(auth.authenticate(&headers("Basic admin-token")).is_none());
        assert!(auth.authenticate(&headers("Bearer ")).is_none());
    }

    #[test]
    fn nonce_is_bound_to_the_session_user() {
        let auth = authenticator();
        let admin = auth
            .authenticate(&headers("Bearer admin-token"))
            .expect("admin resolves");
        assert!(auth.verify_nonce(&admin, "n0nce"));
        assert!(!auth.verify_nonce(&admin, "shop-nonce"));
        assert!(!auth.verify_nonce(&admin, ""));
    }

    #[test]
    fn token_prefixes_and_extensions_do_not_match() {
        let auth = authenticator();
        assert!(auth.authenticate(&headers("Bearer admin-toke")).is_none());
        assert!(auth.authenticate(&headers("Bearer admin-token2")).is_none());

        let admin = auth
            .authenticate(&headers("Bearer admin-token"))
            .expect("admin resolves");
        assert!(!auth.verify_nonce(&admin, "n0nc"));
        assert!(!auth.verify_nonce(&admin, "n0nce0"));
        assert!(auth.verify_nonce(&admin, " n0nce "));
    }

    #[test]
    fn session_debug_hides_secrets() {
        let rendered = format!("{:?}", authenticator());
        assert!(!rendered.contains("admin-token"));
        assert!(!rendered.contains("n0nce"));
    }
}
