use std::fs;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use geointel::paths;

/// Initializes the tracing subscriber with layered output:
/// 1. Stderr: formatted per `log_json` and `verbose`. Stdout carries command results.
/// 2. File: JSON debug logs under `~/.geointel/logs/` when `log_file` is set.
///
/// Returns a WorkerGuard that must be held by main() to ensure file logs are flushed.
pub fn init(
    verbose: bool,
    log_json: bool,
    log_file: bool,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let registry = tracing_subscriber::registry();
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| default_env_filter(verbose));

    let (file_layer, guard) = if log_file {
        let log_dir = paths::log_dir();
        if let Err(e) = fs::create_dir_all(&log_dir) {
            eprintln!("Warning: Failed to create log dir {}: {e}", log_dir.display());
            (None, None)
        } else {
            let file_appender = tracing_appender::rolling::daily(&log_dir, "geointel.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(
                    Targets::new()
                        .with_target("geointel", tracing::Level::DEBUG)
                        .with_default(tracing::Level::INFO),
                );

            (Some(layer), Some(guard))
        }
    } else {
        (None, None)
    };

    let console_layer: Box<dyn Layer<Registry> + Send + Sync> = if log_json {
        Box::new(
            fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
    } else if verbose {
        Box::new(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
    } else {
        Box::new(
            fmt::layer()
                .with_writer(std::io::stderr)
                .without_time()
                .with_target(false)
                .with_level(true)
                .with_filter(console_filter),
        )
    };

    registry.with(console_layer).with(file_layer).init();

    guard
}

fn default_env_filter(verbose: bool) -> EnvFilter {
    let spec = if verbose {
        "geointel=debug,rig_core=warn,info"
    } else {
        "geointel=info,rig_core=warn,warn"
    };
    EnvFilter::new(spec)
}
