use crate::config::TelemetryConfig;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log level/filter '{value}': unable to build EnvFilter")]
    EnvFilter { value: String, source: ParseError },
    #[error("telemetry error: {0}")]
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

/// Filter directive used when no `RUST_LOG` override is present.
///
/// Diagnostic mode lifts this crate to `debug` so request payloads logged by
/// the API layer become visible without touching other targets.
pub fn default_directive(config: &TelemetryConfig, debug: bool) -> String {
    if debug {
        format!("{},ship_and_weigh=debug", config.log_level)
    } else {
        config.log_level.clone()
    }
}

pub fn init(config: &TelemetryConfig, debug: bool) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directive = default_directive(config, debug);
            EnvFilter::try_new(&directive).map_err(|source| TelemetryError::EnvFilter {
                value: directive.clone(),
                source,
            })?
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(debug)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}
