//! Structured logging initialization.

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{TelemetryError, TelemetryResult};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,patrol=debug,tower_http=info";

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// JSON under `RUST_ENV=production`, pretty otherwise.
    pub fn from_env() -> Self {
        Self::for_environment(std::env::var("RUST_ENV").ok().as_deref())
    }

    fn for_environment(env: Option<&str>) -> Self {
        match env {
            Some("production") => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging() -> TelemetryResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let format = LogFormat::from_env();
    let result = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_target(true).with_thread_names(true))
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    info!(?format, "Logging initialized");
    Ok(())
}
