//! Logging setup with an env-driven filter, daily rolling files and retention cleanup.

use chrono::{Local, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::LoggingSettings;

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "jellyfin_notify=info,sqlx=warn,tower_http=info";

/// Rolled log file prefix; files are named `jellyfin-notify.log.YYYY-MM-DD`.
const LOG_FILE_PREFIX: &str = "jellyfin-notify.log";

/// Timer that formats timestamps in the server's local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Log file location and retention policy.
pub struct LoggingConfig {
    log_dir: PathBuf,
    retention_days: i64,
}

impl LoggingConfig {
    fn new(log_dir: PathBuf, retention_days: i64) -> Self {
        Self {
            log_dir,
            retention_days,
        }
    }

    /// Start the daily log retention cleanup task.
    pub fn start_retention_cleanup(self: &Arc<Self>, cancel_token: CancellationToken) {
        let log_dir = self.log_dir.clone();
        let retention_days = self.retention_days;

        tokio::spawn(async move {
            let cleanup_interval = Duration::from_secs(24 * 60 * 60);

            loop {
                if let Err(e) = cleanup_old_logs(&log_dir, retention_days).await {
                    warn!(error = %e, "Failed to cleanup old logs");
                }

                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Log retention cleanup task shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(cleanup_interval) => {}
                }
            }
        });
    }
}

/// Delete rolled log files older than `retention_days`.
async fn cleanup_old_logs(log_dir: &Path, retention_days: i64) -> std::io::Result<usize> {
    let Some(cutoff) = chrono::TimeDelta::try_days(retention_days)
        .and_then(|age| Utc::now().checked_sub_signed(age))
        .map(|t| t.date_naive())
    else {
        warn!(retention_days, "Log retention window out of range, skipping cleanup");
        return Ok(0);
    };

    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut deleted_count = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(date_str) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|name| name.strip_prefix(LOG_FILE_PREFIX))
            .and_then(|rest| rest.strip_prefix('.'))
        else {
            continue;
        };

        let Ok(file_date) = chrono::NaiveDate::parse_from_str(date_str, "%Y-%m-%d") else {
            continue;
        };

        if file_date < cutoff {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to delete old log file");
            } else {
                deleted_count += 1;
                debug!(path = %path.display(), "Deleted old log file");
            }
        }
    }

    if deleted_count > 0 {
        info!(count = deleted_count, "Cleaned up old log files");
    }

    Ok(deleted_count)
}

/// Initial filter: `RUST_LOG` wins, then `LOG_LEVEL` applied to this crate.
fn initial_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directive = if level.is_empty() || level == "info" {
            DEFAULT_LOG_FILTER.to_string()
        } else {
            format!("jellyfin_notify={level},sqlx=warn,tower_http=info")
        };
        EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    })
}

/// Initialize console and rolling-file logging.
///
/// Keep the returned guard alive for the lifetime of the process so buffered
/// file output is flushed.
pub fn init_logging(settings: &LoggingSettings) -> crate::Result<(Arc<LoggingConfig>, WorkerGuard)> {
    let log_path = PathBuf::from(&settings.log_dir);
    std::fs::create_dir_all(&log_path)?;

    let file_appender = tracing_appender::rolling::daily(&log_path, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(initial_filter(&settings.level))
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer),
        )
        .try_init()
        .map_err(|e| {
            crate::Error::Other(format!("Failed to set global default subscriber: {}", e))
        })?;

    let config = Arc::new(LoggingConfig::new(log_path, settings.retention_days));

    Ok((config, guard))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(DEFAULT_LOG_FILTER.contains("jellyfin_notify=info"));
        assert!(DEFAULT_LOG_FILTER.contains("sqlx=warn"));
    }

    #[tokio::test]
    async fn test_cleanup_old_logs() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join(format!("{LOG_FILE_PREFIX}.2000-01-01"));
        let today = dir
            .path()
            .join(format!("{LOG_FILE_PREFIX}.{}", Utc::now().format("%Y-%m-%d")));
        let unrelated = dir.path().join("other.log.2000-01-01");
        for path in [&old, &today, &unrelated] {
            std::fs::write(path, b"x").unwrap();
        }

        let deleted = cleanup_old_logs(dir.path(), 30).await.unwrap();

        assert_eq!(deleted, 1);
        assert!(!old.exists());
        assert!(today.exists());
        assert!(unrelated.exists());
    }

    #[tokio::test]
    async fn test_cleanup_with_huge_retention_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join(format!("{LOG_FILE_PREFIX}.2000-01-01"));
        std::fs::write(&old, b"x").unwrap();

        assert_eq!(cleanup_old_logs(dir.path(), i64::MAX).await.unwrap(), 0);
        assert!(old.exists());
    }
}
