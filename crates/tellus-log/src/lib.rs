//! Structured logging setup for the planet generator.
//!
//! Provides structured, span-based, filterable logging via the `tracing`
//! ecosystem: console output with uptime timestamps and module paths, plus
//! JSON file logging in debug builds for post-mortem analysis. The worker
//! threads are named, so `with_thread_names` makes per-octree log lines
//! attributable at a glance.

use std::path::Path;

use tellus_config::WorldConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Filtering resolves in order: `RUST_LOG` when set, then the config's
/// `debug.log_level`, then `info`. In debug builds with a `log_dir` given,
/// a JSON file layer is added next to the console layer.
///
/// # Examples
///
/// ```no_run
/// use tellus_log::init_logging;
/// use tellus_config::WorldConfig;
///
/// // Basic initialization
/// init_logging(None, false, None);
///
/// // With file logging in debug mode
/// let log_dir = std::path::Path::new("./logs");
/// init_logging(Some(log_dir), true, None);
///
/// // With config override
/// let config = WorldConfig::default();
/// init_logging(None, false, Some(&config));
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&WorldConfig>) {
    let filter_str = match config {
        Some(config) if !config.debug.log_level.is_empty() => config.debug.log_level.clone(),
        _ => "info".to_string(),
    };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

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
        && let Ok(log_file) = std::fs::File::create(log_dir.join("tellus.log"))
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

/// The default `EnvFilter` used when neither `RUST_LOG` nor the config
/// overrides the level.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new("info")
}
