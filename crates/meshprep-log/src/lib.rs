//! Structured logging for the material preparation pipeline.
//!
//! Provides structured, filterable logging via the `tracing` ecosystem:
//! console output with timestamps and module paths, environment-based
//! filtering, and integration with the configuration system for runtime
//! log level control.

use meshprep_config::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, fmt};

/// Initialize the tracing subscriber for the pipeline.
///
/// Filtering precedence: the `RUST_LOG` environment variable wins; otherwise
/// the config's `debug.log_level` applies when set; otherwise the default
/// filter (`info`, with `image` quieted to `warn`).
///
/// # Examples
///
/// ```no_run
/// use meshprep_config::Config;
///
/// let config = Config::default();
/// meshprep_log::init_logging(Some(&config));
/// tracing::info!("pipeline starting");
/// ```
pub fn init_logging(config: Option<&Config>) {
    let filter_str = match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => default_filter_string(),
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .init();
}

/// Create an `EnvFilter` with the default filter string: `info` for all
/// targets, `warn` for the `image` crate to cut decoder noise.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(default_filter_string())
}

fn default_filter_string() -> String {
    "info,image=warn".to_string()
}
