//! Utilities for logging.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::FmtSubscriber;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    HumanReadable,
    Json,
}

fn env_filter(default_level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy()
}

/// Configure the global logger.
///
/// `RUST_LOG` directives take precedence over `default_level`. Does nothing if
/// a global subscriber is already set.
pub fn configure_global_logger(default_level: Level, format: LogFormat) {
    let builder = FmtSubscriber::builder()
        .with_env_filter(env_filter(default_level))
        .with_file(true)
        .with_line_number(true);

    let _ = match format {
        LogFormat::HumanReadable => {
            tracing::subscriber::set_global_default(builder.finish())
        }
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    };
}

/// Initialize a logger for tests.
///
/// Output goes through the test writer so it's captured per test. Safe to call
/// from multiple tests.
pub fn init_test() {
    let subscriber = FmtSubscriber::builder()
        .with_test_writer()
        .with_env_filter(env_filter(Level::DEBUG))
        .with_file(true)
        .with_line_number(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
