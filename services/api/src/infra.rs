use metrics_exporter_prometheus::PrometheusHandle;
use ship_and_weigh::api::{Authenticator, Session, StaticAuthenticator};
use ship_and_weigh::config::StorageConfig;
use ship_and_weigh::store::{FileOptionStore, InMemoryOptionStore, OptionStore, StoreError};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// File-backed store when a path is configured, otherwise an in-process map.
pub(crate) fn option_store(config: &StorageConfig) -> Result<Arc<dyn OptionStore>, StoreError> {
    match &config.path {
        Some(path) => {
            let store = FileOptionStore::open(path)?;
            info!(path = %store.path().display(), "using file option store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("APP_STORE_PATH not set; settings and recipients will not survive a restart");
            Ok(Arc::new(InMemoryOptionStore::new()))
        }
    }
}

pub(crate) fn authenticator(admin: Option<Session>) -> Arc<dyn Authenticator> {
    let authenticator = StaticAuthenticator::new(admin);
    if authenticator.is_empty() {
        warn!("APP_ADMIN_TOKEN not set; every namespace request will be rejected");
    }
    Arc::new(authenticator)
}
