//! Logging infrastructure for console and file output.

mod logger;
mod subscriber;
mod types;
mod utils;

pub use logger::{Logger, STAGE_TARGET};
pub use subscriber::{FileLayer, init_subscriber};
pub use types::Log;
pub use utils::log_dir;

/// Create a [`Logger`] whose events reach a [`FileLayer`] in a fresh
/// temporary directory through a thread-local subscriber.
///
/// Returns the log file path and the guards that must stay alive for the
/// duration of the test.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (
    Logger,
    std::path::PathBuf,
    tempfile::TempDir,
    tracing::dispatcher::DefaultGuard,
) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let file_layer = FileLayer::new(tmp.path(), "test").expect("failed to create file layer");
    let path = file_layer.path().to_path_buf();
    let subscriber =
        tracing_subscriber::registry().with(file_layer.with_filter(LevelFilter::DEBUG));
    let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
    (Logger::new(), path, tmp, guard)
}
