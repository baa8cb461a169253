//! Fetch → mount → install → eject → delete, with release on every path.
//!
//! Acquired resources are released in reverse order whether the installer
//! succeeds, fails, or the run is interrupted: the volume is ejected first,
//! then a temporary download is deleted.  The installer's error stays the
//! primary error; release failures are attached to it as secondary errors.
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use super::installer::install_package;
use crate::error::Error;
use crate::exec::Executor;
use crate::fetch::{FetchHandle, FetchOptions, Fetcher};
use crate::logging::Log;
use crate::mount::{MountHandle, MountManager};

/// Default volume packages are installed onto.
pub const DEFAULT_TARGET: &str = "/";

/// Where the disk image comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// An image already on disk.
    Local(PathBuf),
    /// An image to download first.
    Url(String),
}

impl ImageSource {
    /// Classify a command-line argument: anything containing `://` is a URL.
    #[must_use]
    pub fn parse(source: &str) -> Self {
        if source.contains("://") {
            Self::Url(source.to_string())
        } else {
            Self::Local(PathBuf::from(source))
        }
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// One installation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationRequest {
    /// Disk image to install from.
    pub image_source: ImageSource,
    /// Package path relative to the image's mount point.
    pub package_relative_path: PathBuf,
    /// Volume to install onto.
    pub install_target: PathBuf,
    /// Expected SHA-256 of a downloaded image.
    pub sha256: Option<String>,
    /// Show transfer diagnostics while downloading.
    pub verbose_transfer: bool,
}

impl InstallationRequest {
    /// Request installing `package` from `image_source` onto `/`.
    #[must_use]
    pub fn new(image_source: ImageSource, package: impl Into<PathBuf>) -> Self {
        Self {
            image_source,
            package_relative_path: package.into(),
            install_target: PathBuf::from(DEFAULT_TARGET),
            sha256: None,
            verbose_transfer: false,
        }
    }

    /// Install onto `target` instead of `/`.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.install_target = target.into();
        self
    }

    /// Verify a downloaded image against `sha256`.
    #[must_use]
    pub fn with_sha256(mut self, sha256: Option<String>) -> Self {
        self.sha256 = sha256;
        self
    }

    /// Show transfer diagnostics.
    #[must_use]
    pub const fn with_verbose_transfer(mut self, verbose: bool) -> Self {
        self.verbose_transfer = verbose;
        self
    }
}

/// Pipeline progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing acquired.
    Idle,
    /// Downloading the image.
    Fetching,
    /// Image mounted.
    Mounted,
    /// Installer running.
    Installing,
    /// Releasing the mount and the download.
    CleaningUp,
    /// Finished successfully.
    Done,
    /// Finished with an error.
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Mounted => "mounted",
            Self::Installing => "installing",
            Self::CleaningUp => "cleaning up",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// A failed installation: the first failure plus any release failures
/// that followed it.
#[derive(Debug)]
pub struct InstallFailure {
    primary: Error,
    cleanup: Vec<Error>,
}

impl InstallFailure {
    /// The failure that ended the run.
    #[must_use]
    pub const fn kind(&self) -> &Error {
        &self.primary
    }

    /// Failures while releasing resources afterwards.
    #[must_use]
    pub fn cleanup_errors(&self) -> &[Error] {
        &self.cleanup
    }

    /// Discard the secondary errors.
    #[must_use]
    pub fn into_primary(self) -> Error {
        self.primary
    }
}

impl From<Error> for InstallFailure {
    fn from(primary: Error) -> Self {
        Self {
            primary,
            cleanup: Vec::new(),
        }
    }
}

impl fmt::Display for InstallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.primary)?;
        for e in &self.cleanup {
            write!(f, "; cleanup also failed: {e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for InstallFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.primary)
    }
}

/// Runs installation requests.
pub struct Orchestrator {
    fetcher: Fetcher,
    mounts: MountManager,
    executor: Arc<dyn Executor>,
    log: Arc<dyn Log>,
    state: Mutex<PipelineState>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("fetcher", &self.fetcher)
            .field("mounts", &self.mounts)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator.
    #[must_use]
    pub fn new(
        fetcher: Fetcher,
        mounts: MountManager,
        executor: Arc<dyn Executor>,
        log: Arc<dyn Log>,
    ) -> Self {
        Self {
            fetcher,
            mounts,
            executor,
            log,
            state: Mutex::new(PipelineState::Idle),
        }
    }

    /// State reached by the most recent run.
    #[must_use]
    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, next: PipelineState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.log.debug(&format!("pipeline: {} -> {next}", *state));
        *state = next;
    }

    /// Install a package from a local or remote disk image.
    ///
    /// # Errors
    ///
    /// Returns [`InstallFailure`] whose primary error is the first failure
    /// (fetch, mount, installer, or an eject after a successful install),
    /// with any later release failures attached.
    pub fn install_from_image(
        &self,
        request: &InstallationRequest,
    ) -> Result<(), InstallFailure> {
        self.transition(PipelineState::Idle);
        self.log
            .stage(&format!("Installing from {}", request.image_source));

        let (fetched, image) = match &request.image_source {
            ImageSource::Url(url) => {
                self.transition(PipelineState::Fetching);
                let options = FetchOptions {
                    verbose: request.verbose_transfer,
                    sha256: request.sha256.clone(),
                };
                match self.fetcher.fetch(url, None, &options) {
                    Ok(handle) => {
                        let path = handle.local_path().to_path_buf();
                        (Some(handle), path)
                    }
                    Err(e) => return self.finish(Err(e), Vec::new()),
                }
            }
            ImageSource::Local(path) => (None, path.clone()),
        };

        let mounted = match self.mounts.mount(&image, None) {
            Ok(handle) => handle,
            Err(e) => {
                self.transition(PipelineState::CleaningUp);
                if let Some(handle) = fetched {
                    handle.release();
                }
                return self.finish(Err(e), Vec::new());
            }
        };
        self.transition(PipelineState::Mounted);

        self.transition(PipelineState::Installing);
        let package = mounted.mount_point().join(&request.package_relative_path);
        let outcome = install_package(
            self.executor.as_ref(),
            self.log.as_ref(),
            &package,
            &request.install_target,
        );

        self.transition(PipelineState::CleaningUp);
        let cleanup = Self::release(mounted, fetched);
        self.finish(outcome, cleanup)
    }

    /// Eject, then delete the download. Never skips the second step.
    fn release(mounted: MountHandle, fetched: Option<FetchHandle>) -> Vec<Error> {
        let mut errors = Vec::new();
        if let Err(e) = mounted.eject() {
            errors.push(e);
        }
        if let Some(handle) = fetched {
            handle.release();
        }
        errors
    }

    fn finish(
        &self,
        outcome: Result<(), Error>,
        mut cleanup: Vec<Error>,
    ) -> Result<(), InstallFailure> {
        let primary = match outcome {
            Ok(()) if cleanup.is_empty() => {
                self.transition(PipelineState::Done);
                return Ok(());
            }
            Ok(()) => cleanup.remove(0),
            Err(e) => e,
        };
        for e in &cleanup {
            self.log.warn(&format!("cleanup failed: {e}"));
        }
        self.transition(PipelineState::Failed);
        Err(InstallFailure { primary, cleanup })
    }
}
