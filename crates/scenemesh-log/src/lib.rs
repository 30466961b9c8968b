//! Structured logging and tracing for scenemesh.
//!
//! Provides span-based, filterable logging via the `tracing` ecosystem.
//! Console output carries uptime stamps and module paths. Debug runs can also
//! write JSON lines to a file for post-mortem analysis of integration cycles.
//! Records emitted through the `log` facade (e.g. by the config crate) are
//! forwarded into the same subscriber.

use scenemesh_config::Config;
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Filter used when neither `RUST_LOG` nor the config specify one.
pub const DEFAULT_FILTER: &str = "info";

/// Name of the JSON log file written in debug mode.
pub const LOG_FILE_NAME: &str = "scenemesh.log";

/// Initialize the global tracing subscriber.
///
/// Sets up structured logging with:
/// - Console output with uptime, module paths, thread names and levels
/// - JSON file logging when `debug_build` is set and `log_dir` is writable
/// - Environment-based filtering (`RUST_LOG` wins over the config)
///
/// # Examples
///
/// ```no_run
/// use scenemesh_log::init_logging;
/// use scenemesh_config::Config;
///
/// let config = Config::default();
/// init_logging(Some(std::path::Path::new("./recorded_data")), true, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let filter_str = filter_directive(config);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    // Integration runs on a named thread, so thread names are worth showing.
    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join(LOG_FILE_NAME))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// The filter directive derived from the config's `debug.log_level`.
pub fn filter_directive(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// Create an `EnvFilter` with the default filter string.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
