use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingConfig};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Library code never
/// calls this; binaries do, once, before building the manager. A second call
/// is a no-op apart from a warning.
pub fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_span_events(FmtSpan::CLOSE))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().pretty().with_target(true))
            .try_init(),
    };

    match installed {
        Ok(()) => tracing::info!("Logging initialized with level: {}", config.level),
        Err(err) => tracing::warn!("logging already initialized: {err}"),
    }
}
