//! Filesystem operation abstractions for dependency injection.
//!
//! Provides the [`FileSystemOps`] trait so that the mount manager and the
//! remote fetch can be unit-tested without real disk images or downloads.
//! Production code uses [`SystemFileSystemOps`].
use std::io;
use std::path::{Path, PathBuf};

/// Abstraction over the filesystem queries and side effects used by the
/// acquisition pipeline.
pub trait FileSystemOps: Send + Sync + std::fmt::Debug {
    /// Returns `true` if `path` exists.
    fn exists(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is a directory with a filesystem mounted on it.
    fn is_mount_point(&self, path: &Path) -> bool;

    /// Resolve `path` to an absolute path without symlinks.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` does not exist or cannot be resolved.
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Create a uniquely named directory in the temporary directory.
    ///
    /// The directory is not removed automatically.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_temp_dir(&self, prefix: &str) -> io::Result<PathBuf>;

    /// Create a uniquely named empty file in the temporary directory.
    ///
    /// The file is not removed automatically.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    fn create_temp_file(&self, prefix: &str, suffix: &str) -> io::Result<PathBuf>;

    /// Remove a regular file.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove an empty directory.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    #[cfg(unix)]
    fn is_mount_point(&self, path: &Path) -> bool {
        use std::os::unix::fs::MetadataExt as _;

        let Ok(path) = dunce::canonicalize(path) else {
            return false;
        };
        let Ok(meta) = std::fs::metadata(&path) else {
            return false;
        };
        if !meta.is_dir() {
            return false;
        }
        let Some(parent) = path.parent() else {
            return true;
        };
        std::fs::metadata(parent).is_ok_and(|parent_meta| {
            parent_meta.dev() != meta.dev() || parent_meta.ino() == meta.ino()
        })
    }

    #[cfg(not(unix))]
    fn is_mount_point(&self, _path: &Path) -> bool {
        false
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        dunce::canonicalize(path)
    }

    fn create_temp_dir(&self, prefix: &str) -> io::Result<PathBuf> {
        Ok(tempfile::Builder::new().prefix(prefix).tempdir()?.keep())
    }

    fn create_temp_file(&self, prefix: &str, suffix: &str) -> io::Result<PathBuf> {
        let file = tempfile::Builder::new()
            .prefix(prefix)
            .suffix(suffix)
            .tempfile()?;
        Ok(file.into_temp_path().keep()?)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir(path)
    }
}
