//! Shared services for command execution.
use std::sync::Arc;

use crate::config::{Config, FetchBackend};
use crate::exec::{Executor, SystemExecutor};
use crate::fetch::{CurlDownloader, Downloader, Fetcher, NativeDownloader};
use crate::install::Orchestrator;
use crate::inventory::{FileSnapshotStore, InventoryCache, SystemClock};
use crate::logging::{Log, Logger};
use crate::mount::MountManager;
use crate::operations::{FileSystemOps, SystemFileSystemOps};

/// Shared services for command execution.
///
/// Every component is built from the same executor, filesystem and logger so
/// that tests can swap all host interaction in one place.
#[derive(Clone)]
pub struct Context {
    /// Loaded configuration.
    pub config: Arc<Config>,
    /// Logger for progress output.
    pub log: Arc<dyn Log>,
    /// Command executor (for testing or real system calls).
    pub executor: Arc<dyn Executor>,
    /// Filesystem operation abstraction (injectable for testing).
    pub fs_ops: Arc<dyn FileSystemOps>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("log", &"<dyn Log>")
            .field("executor", &"<dyn Executor>")
            .field("fs_ops", &"<dyn FileSystemOps>")
            .finish()
    }
}

impl Context {
    /// Context backed by the real system.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let executor = Arc::new(SystemExecutor::new(config.timeout()));
        Self {
            config: Arc::new(config),
            log: Arc::new(Logger::new()),
            executor,
            fs_ops: Arc::new(SystemFileSystemOps),
        }
    }

    /// Replace the command executor.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Replace the filesystem abstraction.
    #[must_use]
    pub fn with_fs_ops(mut self, fs_ops: Arc<dyn FileSystemOps>) -> Self {
        self.fs_ops = fs_ops;
        self
    }

    /// Replace the logger.
    #[must_use]
    pub fn with_log(mut self, log: Arc<dyn Log>) -> Self {
        self.log = log;
        self
    }

    /// Downloader selected by `[fetch] backend`.
    #[must_use]
    pub fn downloader(&self) -> Arc<dyn Downloader> {
        match self.config.fetch.backend {
            FetchBackend::Curl => Arc::new(CurlDownloader::new(
                Arc::clone(&self.executor),
                Arc::clone(&self.log),
            )),
            FetchBackend::Native => Arc::new(NativeDownloader::new(Arc::clone(&self.log))),
        }
    }

    /// Fetcher using [`Context::downloader`].
    #[must_use]
    pub fn fetcher(&self) -> Fetcher {
        Fetcher::new(
            self.downloader(),
            Arc::clone(&self.fs_ops),
            Arc::clone(&self.log),
        )
    }

    /// Disk-image mount manager.
    #[must_use]
    pub fn mount_manager(&self) -> MountManager {
        MountManager::new(
            Arc::clone(&self.executor),
            Arc::clone(&self.fs_ops),
            Arc::clone(&self.log),
        )
    }

    /// Installation pipeline.
    #[must_use]
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.fetcher(),
            self.mount_manager(),
            Arc::clone(&self.executor),
            Arc::clone(&self.log),
        )
    }

    /// Inventory cache persisting slots under the configured cache directory.
    #[must_use]
    pub fn inventory(&self) -> InventoryCache {
        InventoryCache::new(
            Arc::clone(&self.executor),
            Arc::new(FileSnapshotStore::new(self.config.cache_dir())),
            Arc::new(SystemClock),
            Arc::clone(&self.log),
        )
        .with_ttl(self.config.ttl())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::test_helpers::RecordingHost;

    fn context(config: Config) -> (Context, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::new());
        let ctx = Context::new(config)
            .with_executor(host.clone())
            .with_fs_ops(host.clone());
        (ctx, host)
    }

    #[test]
    fn curl_backend_runs_curl_through_executor() {
        let (ctx, host) = context(Config::default());
        ctx.downloader()
            .download("https://example.com/a.dmg", std::path::Path::new("/tmp/a.dmg"), false)
            .unwrap();
        assert_eq!(host.calls_to(crate::fetch::CURL).len(), 1);
        assert!(host.has_path(std::path::Path::new("/tmp/a.dmg")));
    }

    #[test]
    fn native_backend_bypasses_executor() {
        let mut config = Config::default();
        config.fetch.backend = FetchBackend::Native;
        let (ctx, host) = context(config);
        let err = ctx
            .downloader()
            .download("ftp://example.com/a.dmg", std::path::Path::new("/tmp/a.dmg"), false)
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::Fetch { .. }));
        assert!(host.calls().is_empty());
    }

    #[test]
    fn inventory_uses_configured_cache_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.inventory.cache_dir = Some(dir.path().to_path_buf());
        let (ctx, host) = context(config);
        host.respond(
            crate::inventory::SYSTEM_PROFILER,
            &["-listDataTypes"],
            "Available Datatypes:\nSPHardwareDataType\n",
        );
        host.respond_prefix(
            crate::inventory::SYSTEM_PROFILER,
            "SPHardwareDataType",
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<plist version=\"1.0\"><array><dict><key>_items</key><array><dict><key>machine_model</key><string>Mac14,3</string></dict></array></dict></array></plist>\n",
        );
        let cache = ctx.inventory();
        cache
            .get(&crate::inventory::InventoryCategory::hardware())
            .unwrap();
        assert!(dir.path().join("SPHardwareDataType.inventory.json").exists());
    }
}
