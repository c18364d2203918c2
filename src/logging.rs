use crate::models::LoggingSettings;
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::fs;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Build the env filter: `RUST_LOG` wins, otherwise debug or info.
fn build_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    })
}

fn file_layer<S>(writer: tracing_appender::non_blocking::NonBlocking, json: bool) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false) // No ANSI codes in log files
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true);

    if json {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

/// Setup logging with a daily rotating file and optional console output.
///
/// # Arguments
/// * `settings` - Log directory, file prefix, level and output options
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging
/// active. Fails if a global subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<WorkerGuard> {
    let log_path = Utf8PathBuf::from(&settings.directory);
    if !log_path.exists() {
        fs::create_dir_all(&log_path)
            .with_context(|| format!("Failed to create log directory: {}", log_path))?;
    }

    let file_appender = rolling::daily(&log_path, &settings.prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let mut layers = vec![file_layer(non_blocking, settings.json)];
    if settings.console {
        // Also log to console with ANSI colors for better readability
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_ansi(true)
                .with_target(false)
                .with_thread_names(true)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(build_filter(settings.debug))
        .with(layers)
        .try_init()
        .context("Logging is already initialized")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}, json={}",
        settings.directory,
        settings.prefix,
        settings.debug,
        settings.console,
        settings.json
    );

    Ok(guard)
}
