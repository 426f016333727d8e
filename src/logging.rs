use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// Options for [`setup_logging`].
#[derive(Debug, Clone)]
pub struct LogOptions<'a> {
    /// Directory for the daily rotated log files
    pub log_dir: &'a Utf8Path,
    /// File name prefix (e.g. "soundscape")
    pub log_prefix: &'a str,
    /// Debug level instead of info
    pub debug_mode: bool,
    /// Also log to the console
    pub console_output: bool,
    /// Write the log file as JSON lines
    pub json_file: bool,
}

/// Install the global subscriber: a daily rotating file layer plus an optional console layer.
///
/// `RUST_LOG` overrides the level derived from `debug_mode`.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep file logging active
pub fn setup_logging(options: &LogOptions<'_>) -> Result<WorkerGuard> {
    let log_dir = options.log_dir;
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    }

    let file_appender = rolling::daily(log_dir, options.log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if options.debug_mode { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = if options.json_file {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false) // No ANSI codes in log files
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    let console_layer = options
        .console_output
        .then(|| tracing_subscriber::fmt::layer().with_ansi(true).with_target(false));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, console={}, json={}",
        log_dir,
        options.log_prefix,
        options.debug_mode,
        options.console_output,
        options.json_file
    );

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_setup_logging_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = Utf8PathBuf::try_from(temp_dir.path().join("logs")).unwrap();

        // Installing the global subscriber can fail if another test already did;
        // the directory must exist either way.
        let _result = setup_logging(&LogOptions {
            log_dir: &log_dir,
            log_prefix: "test",
            debug_mode: false,
            console_output: false,
            json_file: false,
        });

        assert!(log_dir.exists());
    }
}
