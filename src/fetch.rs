//! Remote fetch: download a URL to a local file behind a scoped handle.
//!
//! [`Fetcher::fetch`] validates the URL scheme before touching the network,
//! allocates a temporary file when no destination is given, and returns a
//! [`FetchHandle`].  Releasing (or dropping) a handle for a temporary file
//! deletes it; a caller-supplied destination is never deleted.
use std::fmt::Write as _;
use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use crate::error::{Error, Result};
use crate::exec::Executor;
use crate::interrupt;
use crate::logging::Log;
use crate::operations::FileSystemOps;

/// Absolute path of the command-line downloader.
pub const CURL: &str = "/usr/bin/curl";

const SUPPORTED_SCHEMES: [&str; 3] = ["http", "https", "ftp"];
const TEMP_PREFIX: &str = "macprov-fetch-";
const CHUNK_SIZE: usize = 64 * 1024;

/// Scheme of `url` (the text before `://`), if any.
#[must_use]
pub fn url_scheme(url: &str) -> Option<&str> {
    url.split_once("://").map(|(scheme, _)| scheme)
}

/// Check that `url` uses `http`, `https` or `ftp` (case-insensitive).
///
/// # Errors
///
/// Returns [`Error::UnsupportedScheme`] for any other scheme, or when the URL
/// has none.
pub fn validate_url(url: &str) -> Result<()> {
    let scheme = url_scheme(url).unwrap_or_default();
    if SUPPORTED_SCHEMES
        .iter()
        .any(|s| s.eq_ignore_ascii_case(scheme))
    {
        Ok(())
    } else {
        Err(Error::UnsupportedScheme {
            url: url.to_string(),
            scheme: scheme.to_string(),
        })
    }
}

/// File extension of the URL's last path segment, with its dot (`.dmg`).
fn url_suffix(url: &str) -> String {
    let path = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let Some((_, segment)) = path.rsplit_once('/') else {
        return String::new();
    };
    match segment.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty() && !ext.is_empty() && ext.chars().all(char::is_alphanumeric) =>
        {
            format!(".{ext}")
        }
        _ => String::new(),
    }
}

/// Compute the lowercase hex SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn compute_sha256(path: &Path) -> std::io::Result<String> {
    use sha2::{Digest, Sha256};

    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(64);
    for b in &digest {
        // write! to a String is infallible
        write!(hex, "{b:02x}").unwrap_or(());
    }
    Ok(hex)
}

/// Performs the actual transfer into an existing destination path.
#[cfg_attr(test, mockall::automock)]
pub trait Downloader: Send + Sync + std::fmt::Debug {
    /// Download `url` into `dest`, overwriting it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Fetch`] if the transfer fails.
    fn download(&self, url: &str, dest: &Path, verbose: bool) -> Result<()>;
}

/// Downloads with `/usr/bin/curl`.
pub struct CurlDownloader {
    executor: Arc<dyn Executor>,
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for CurlDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurlDownloader")
            .field("executor", &self.executor)
            .finish_non_exhaustive()
    }
}

impl CurlDownloader {
    /// Create a downloader that runs curl through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, log: Arc<dyn Log>) -> Self {
        Self { executor, log }
    }

    /// Argument vector for one transfer.
    #[must_use]
    pub fn args<'a>(url: &'a str, dest: &'a str, verbose: bool) -> Vec<&'a str> {
        let mut args = vec!["--fail", "--location"];
        if verbose {
            args.push("--verbose");
        } else {
            args.extend(["--silent", "--show-error"]);
        }
        args.extend(["-o", dest, url]);
        args
    }
}

impl Downloader for CurlDownloader {
    fn download(&self, url: &str, dest: &Path, verbose: bool) -> Result<()> {
        let dest_str = dest.to_string_lossy();
        let result = self
            .executor
            .run(CURL, &Self::args(url, &dest_str, verbose))?;
        if verbose {
            for line in result.stderr_lossy().lines() {
                self.log.debug(line);
            }
        }
        if !result.success() {
            return Err(Error::Fetch {
                url: url.to_string(),
                reason: format!("curl {}", result.failure_reason()),
            });
        }
        Ok(())
    }
}

/// Downloads in-process over HTTP(S).
pub struct NativeDownloader {
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for NativeDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeDownloader").finish_non_exhaustive()
    }
}

impl NativeDownloader {
    /// Create a native downloader.
    #[must_use]
    pub fn new(log: Arc<dyn Log>) -> Self {
        Self { log }
    }
}

impl Downloader for NativeDownloader {
    fn download(&self, url: &str, dest: &Path, verbose: bool) -> Result<()> {
        let fetch_error = |reason: String| Error::Fetch {
            url: url.to_string(),
            reason,
        };
        if url_scheme(url).is_some_and(|s| s.eq_ignore_ascii_case("ftp")) {
            return Err(fetch_error(
                "ftp is not supported by the native backend".to_string(),
            ));
        }
        if verbose {
            self.log.debug(&format!("GET {url}"));
        }

        let response = ureq::get(url)
            .call()
            .map_err(|e| fetch_error(e.to_string()))?;
        let mut reader = response.into_body().into_reader();
        let mut file = std::fs::File::create(dest)
            .map_err(|e| fetch_error(format!("cannot create {}: {e}", dest.display())))?;

        let mut buf = vec![0_u8; CHUNK_SIZE];
        let mut total: u64 = 0;
        loop {
            if interrupt::flag().swap(false, Ordering::SeqCst) {
                return Err(fetch_error("interrupted".to_string()));
            }
            let n = reader
                .read(&mut buf)
                .map_err(|e| fetch_error(e.to_string()))?;
            if n == 0 {
                break;
            }
            let chunk = buf.get(..n).unwrap_or_default();
            file.write_all(chunk)
                .map_err(|e| fetch_error(format!("cannot write {}: {e}", dest.display())))?;
            total += n as u64;
        }

        if verbose {
            self.log
                .debug(&format!("received {total} bytes into {}", dest.display()));
        }
        Ok(())
    }
}

/// Per-call fetch options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Show transfer diagnostics instead of running silently.
    pub verbose: bool,
    /// Expected lowercase hex SHA-256 digest of the downloaded file.
    pub sha256: Option<String>,
}

/// Downloads URLs into scoped [`FetchHandle`]s.
#[derive(Clone)]
pub struct Fetcher {
    downloader: Arc<dyn Downloader>,
    fs: Arc<dyn FileSystemOps>,
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("downloader", &self.downloader)
            .finish_non_exhaustive()
    }
}

impl Fetcher {
    /// Create a fetcher.
    #[must_use]
    pub fn new(
        downloader: Arc<dyn Downloader>,
        fs: Arc<dyn FileSystemOps>,
        log: Arc<dyn Log>,
    ) -> Self {
        Self {
            downloader,
            fs,
            log,
        }
    }

    /// Download `url` to `dest`, or to a new temporary file when `dest` is
    /// `None`.
    ///
    /// A temporary file is deleted again if the download or the checksum
    /// verification fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedScheme`] before any transfer for URLs that
    /// are not http, https or ftp, and [`Error::Fetch`] when the transfer or
    /// checksum verification fails.
    pub fn fetch(
        &self,
        url: &str,
        dest: Option<&Path>,
        options: &FetchOptions,
    ) -> Result<FetchHandle> {
        validate_url(url)?;

        let (local_path, temporary) = match dest {
            Some(path) => (path.to_path_buf(), false),
            None => {
                let path = self
                    .fs
                    .create_temp_file(TEMP_PREFIX, &url_suffix(url))
                    .map_err(|e| Error::Fetch {
                        url: url.to_string(),
                        reason: format!("cannot create temporary file: {e}"),
                    })?;
                (path, true)
            }
        };
        let handle = FetchHandle {
            local_path,
            temporary,
            fs: Arc::clone(&self.fs),
            log: Arc::clone(&self.log),
            released: false,
        };

        self.log
            .info(&format!("Downloading {url} to {}", handle.local_path.display()));
        self.downloader
            .download(url, &handle.local_path, options.verbose)?;

        if let Some(expected) = &options.sha256 {
            let actual = compute_sha256(&handle.local_path).map_err(|e| Error::Fetch {
                url: url.to_string(),
                reason: format!("cannot read download for checksum: {e}"),
            })?;
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                return Err(Error::Fetch {
                    url: url.to_string(),
                    reason: format!("checksum mismatch: expected {expected}, got {actual}"),
                });
            }
            self.log.debug(&format!("sha256 verified: {actual}"));
        }
        Ok(handle)
    }
}

/// A downloaded file.
///
/// For a temporary file, [`release`](Self::release) (or drop) deletes it.
/// Deletion failures are logged, never raised.
pub struct FetchHandle {
    local_path: PathBuf,
    temporary: bool,
    fs: Arc<dyn FileSystemOps>,
    log: Arc<dyn Log>,
    released: bool,
}

impl std::fmt::Debug for FetchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchHandle")
            .field("local_path", &self.local_path)
            .field("temporary", &self.temporary)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl FetchHandle {
    /// Path of the downloaded file.
    #[must_use]
    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    /// Whether release deletes the file.
    #[must_use]
    pub const fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Release the handle, deleting a temporary file.
    pub fn release(mut self) {
        self.release_inner();
    }

    /// Keep the file and return its path.
    #[must_use]
    pub fn persist(mut self) -> PathBuf {
        self.released = true;
        std::mem::take(&mut self.local_path)
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if !self.temporary {
            return;
        }
        match self.fs.remove_file(&self.local_path) {
            Ok(()) => self
                .log
                .debug(&format!("removed {}", self.local_path.display())),
            Err(e) => self.log.warn(&format!(
                "failed to remove temporary download {}: {e}",
                self.local_path.display()
            )),
        }
    }
}

impl Drop for FetchHandle {
    fn drop(&mut self) {
        self.release_inner();
    }
}
