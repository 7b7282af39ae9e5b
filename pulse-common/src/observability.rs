//! Logging setup shared by the `pulse` binary and integration tests.
//!
//! Events always go to a daily rolling file. Stderr is an optional second
//! sink in the same encoding. [`init_logging`] installs the subscriber once;
//! later calls return the file path chosen by the first.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::LogFormat;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Directory override consulted when [`LogConfig::log_dir`] is unset.
pub const LOG_DIR_ENV: &str = "PULSE_LOG_DIR";

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Names the log file and the fallback data directory.
    pub app_name: &'static str,
    /// Explicit directory. Otherwise `PULSE_LOG_DIR`, then `~/.local/share/<app_name>`.
    pub log_dir: Option<PathBuf>,
    pub emit_stderr: bool,
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "pulse",
            log_dir: None,
            emit_stderr: false,
            format: LogFormat::Text,
            default_filter: "info".to_string(),
        }
    }
}

/// Install the global subscriber and return today's log file path.
pub fn init_logging(config: LogConfig) -> anyhow::Result<PathBuf> {
    if let Some(path) = LOG_PATH.get() {
        return Ok(path.clone());
    }

    let dir = resolve_log_dir(config.app_name, config.log_dir.as_deref());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let file_name = format!("{}.log", config.app_name);
    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::daily(&dir, &file_name));
    let _ = LOG_GUARD.set(guard);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter.as_str()));
    let file = sink(config.format, writer, false);
    let stderr = config
        .emit_stderr
        .then(|| sink(config.format, std::io::stderr, true));

    tracing_subscriber::registry()
        .with(filter)
        .with(file.and_then(stderr))
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let path = daily_file(&dir, &file_name, Local::now().date_naive());
    let _ = LOG_PATH.set(path.clone());
    Ok(path)
}

/// One formatting layer over `writer`. ANSI colour only applies to text output.
fn sink<S, W>(format: LogFormat, writer: W, ansi: bool) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Text => fmt::layer().with_writer(writer).with_ansi(ansi).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
    }
}

/// Name `tracing_appender::rolling::daily` gives the file for `date`.
fn daily_file(dir: &Path, file_name: &str, date: NaiveDate) -> PathBuf {
    dir.join(format!("{file_name}.{}", date.format("%Y-%m-%d")))
}

fn resolve_log_dir(app_name: &str, explicit: Option<&Path>) -> PathBuf {
    let home = std::env::var("HOME").ok();
    if let Some(dir) = explicit {
        return expand_home(dir, home.as_deref());
    }
    if let Ok(dir) = std::env::var(LOG_DIR_ENV) {
        return expand_home(Path::new(&dir), home.as_deref());
    }
    match home {
        Some(home) => Path::new(&home).join(".local/share").join(app_name),
        None => Path::new(".").join(app_name),
    }
}

fn expand_home(path: &Path, home: Option<&str>) -> PathBuf {
    match (path.to_str().and_then(|s| s.strip_prefix("~/")), home) {
        (Some(rest), Some(home)) => Path::new(home).join(rest),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_dir_wins() {
        let dir = resolve_log_dir("pulse", Some(Path::new("/tmp/pulse-logs")));
        assert_eq!(dir, PathBuf::from("/tmp/pulse-logs"));
    }

    #[test]
    fn tilde_expands_only_with_a_home() {
        assert_eq!(
            expand_home(Path::new("~/logs"), Some("/home/ana")),
            PathBuf::from("/home/ana/logs")
        );
        assert_eq!(expand_home(Path::new("~/logs"), None), PathBuf::from("~/logs"));
        assert_eq!(
            expand_home(Path::new("relative/logs"), Some("/home/ana")),
            PathBuf::from("relative/logs")
        );
    }

    #[test]
    fn daily_file_carries_the_date_suffix() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(
            daily_file(Path::new("/var/log/pulse"), "pulse.log", date),
            PathBuf::from("/var/log/pulse/pulse.log.2026-03-09")
        );
    }

    #[test]
    fn init_logging_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let config = LogConfig {
            app_name: "pulse-observability-test",
            log_dir: Some(tmp.path().to_path_buf()),
            emit_stderr: true,
            ..LogConfig::default()
        };
        let first = init_logging(config.clone()).unwrap();
        let second = init_logging(config).unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with(tmp.path()));
    }
}
