use crate::cli::ServeArgs;
use crate::infra::{authenticator, option_store, AppState};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use ship_and_weigh::api::{api_router, ApiState, NAMESPACE};
use ship_and_weigh::config::AppConfig;
use ship_and_weigh::error::AppError;
use ship_and_weigh::settings::SettingsSpec;
use ship_and_weigh::telemetry;
use ship_and_weigh::verification::EasyPostClient;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry, config.debug)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let verifier = EasyPostClient::new(&config.easypost)?;
    if !verifier.is_configured() {
        warn!("EASYPOST_API_KEY not set; address verification will report not configured");
    }

    let api_state = ApiState::new(
        Arc::new(SettingsSpec::standard()),
        option_store(&config.storage)?,
        Arc::new(verifier),
        authenticator(config.admin.take()),
    )
    .with_diagnostics(config.debug);

    let app = with_service_routes(api_router(api_state))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, namespace = NAMESPACE, "ship and weigh api ready");

    axum::serve(listener, app).await?;
    Ok(())
}
