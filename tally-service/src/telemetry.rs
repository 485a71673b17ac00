//! Tracing initialisation.

use std::env;

use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::ServiceError;

const DEFAULT_FILTER: &str = "tally_service=info,tally_engine=info";

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides the default filter. `LOG_FORMAT=json` switches from
/// the pretty console output to structured JSON lines.
pub fn init_tracing() -> Result<(), ServiceError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = env::var("LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
            .map_err(|e| ServiceError::config(format!("Failed to initialise tracing: {e}")))?;

        info!(
            service_name = "tally-service",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with JSON format"
        );
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true).pretty())
            .try_init()
            .map_err(|e| ServiceError::config(format!("Failed to initialise tracing: {e}")))?;

        info!(
            service_name = "tally-service",
            service_version = env!("CARGO_PKG_VERSION"),
            "Tracing initialized with console output"
        );
    }

    Ok(())
}
