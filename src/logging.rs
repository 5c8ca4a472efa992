use std::fs;
use std::path::Path;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "retail_report.log";

/// Initializes the logging system with both console and file output.
///
/// The returned guard flushes the file writer when dropped, so the binary
/// holds on to it until `main` returns.
pub fn init_logging() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("retail_report=info"));
    let (subscriber, guard) = build_subscriber(filter, Path::new(LOG_DIR));
    subscriber.init();
    guard
}

/// Console layer on stderr plus a JSON daily-rolling file layer under `log_dir`.
/// File logging is best effort: when `log_dir` cannot be created only the
/// console layer is active and no guard is returned.
fn build_subscriber(
    filter: EnvFilter,
    log_dir: &Path,
) -> (impl Subscriber + Send + Sync, Option<WorkerGuard>) {
    let (file_layer, guard) = match fs::create_dir_all(log_dir) {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE);
            let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::layer().json().with_writer(non_blocking_writer);
            (Some(layer), Some(guard))
        }
        Err(_) => (None, None),
    };
    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer);
    (subscriber, guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_layer_writes_json_events() {
        let dir = tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let (subscriber, guard) =
            build_subscriber(EnvFilter::new("retail_report=info"), &log_dir);
        assert!(guard.is_some());

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(rows = 3, "Loaded source table");
            tracing::debug!("filtered out");
        });
        drop(guard);

        let files: Vec<_> = fs::read_dir(&log_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);
        let content = fs::read_to_string(&files[0]).unwrap();
        let event: serde_json::Value =
            serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(event["fields"]["message"], "Loaded source table");
        assert_eq!(event["fields"]["rows"], 3);
        assert!(!content.contains("filtered out"));
    }

    #[test]
    fn test_unwritable_log_dir_falls_back_to_console() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").unwrap();

        let (subscriber, guard) =
            build_subscriber(EnvFilter::new("retail_report=info"), &blocker.join("logs"));
        assert!(guard.is_none());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("console only");
        });
    }
}
