//! Logging setup for the CLI.
//!
//! Stdout carries rendered manifests, so console logs go to stderr. An
//! optional daily-rotated file sink is written through a non-blocking worker.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const LOG_FILE_PREFIX: &str = "gantry.log";

/// Keeps the file writer flushing until dropped.
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Compose the filter, console and optional file layers without installing them.
fn build_subscriber(
    verbosity: u8,
    log_dir: Option<&Path>,
) -> (
    impl tracing::Subscriber + Send + Sync + 'static,
    Option<WorkerGuard>,
) {
    let filter = EnvFilter::builder()
        .with_default_directive(level_from_verbosity(verbosity).into())
        .from_env_lossy();

    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file);
    (subscriber, guard)
}

/// Install the global subscriber. `RUST_LOG` overrides `verbosity`.
///
/// Calling this twice is harmless: the second install is ignored.
pub fn init_logging(verbosity: u8, log_dir: Option<&Path>) -> LoggingGuard {
    let (subscriber, guard) = build_subscriber(verbosity, log_dir);
    let installed = subscriber.try_init().is_ok();

    if let Some(dir) = log_dir.filter(|_| installed) {
        tracing::debug!(log_dir = %dir.display(), "File logging enabled");
    }

    LoggingGuard { _file: guard }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_from_verbosity(0), LevelFilter::WARN);
        assert_eq!(level_from_verbosity(2), LevelFilter::DEBUG);
        assert_eq!(level_from_verbosity(9), LevelFilter::TRACE);
    }

    #[test]
    fn test_file_layer_writes_to_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (subscriber, guard) = build_subscriber(3, Some(dir.path()));
        assert!(guard.is_some());

        // Scoped to this thread so other tests keep the default no-op dispatcher.
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("hello from test");
        });
        drop(guard);

        let logged: String = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| std::fs::read_to_string(entry.unwrap().path()).unwrap())
            .collect();
        assert!(logged.contains("hello from test"));
    }

    #[test]
    fn test_no_file_guard_without_log_dir() {
        let (_subscriber, guard) = build_subscriber(0, None);
        assert!(guard.is_none());
    }
}
