//! Domain-specific error types for the provisioning engine.
//!
//! Library components return [`Error`] (or the narrower
//! [`ExecError`](crate::exec::ExecError) and
//! [`ParseError`](crate::property_list::ParseError) it wraps).  Command
//! handlers at the CLI boundary convert them to [`anyhow::Error`] via `?`.
//!
//! # Error hierarchy
//!
//! ```text
//! Error
//! ├── Execution(ExecError)   — a process could not be run / checked run failed
//! ├── Parse(ParseError)      — malformed property list
//! ├── InvalidCategory        — inventory category not reported by the profiler
//! ├── FieldNotFound          — inventory record lacks the requested field
//! ├── InvalidPath            — image missing, mount point not mounted
//! ├── UnsupportedScheme      — URL scheme outside http/https/ftp
//! ├── Fetch / Mount / Unmount / Install — pipeline step failures
//! └── Cache                  — inventory cache slot I/O
//! ```
use std::path::PathBuf;

use thiserror::Error;

use crate::exec::ExecError;
use crate::property_list::ParseError;

/// Convenience alias used throughout the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type for the provisioning engine.
#[derive(Error, Debug)]
pub enum Error {
    /// An external command could not be run, or a checked run failed.
    #[error(transparent)]
    Execution(#[from] ExecError),

    /// Structured output from a system command could not be parsed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The inventory category is not among those the profiler supports.
    #[error("invalid inventory category '{category}': expected one of {supported}")]
    InvalidCategory {
        /// Requested category name.
        category: String,
        /// Comma-separated list of supported categories.
        supported: String,
    },

    /// An inventory record has no such field.
    #[error("field '{field}' not found")]
    FieldNotFound {
        /// Requested field name.
        field: String,
    },

    /// A path argument does not refer to what the operation requires.
    #[error("invalid path {}: {reason}", path.display())]
    InvalidPath {
        /// Offending path.
        path: PathBuf,
        /// Why the path was rejected.
        reason: String,
    },

    /// The URL scheme is not one of `http`, `https` or `ftp`.
    #[error("unsupported URL scheme '{scheme}' in {url}: expected http, https or ftp")]
    UnsupportedScheme {
        /// Full URL as given.
        url: String,
        /// Scheme that was found (empty when none).
        scheme: String,
    },

    /// Downloading a URL failed.
    #[error("failed to fetch {url}: {reason}")]
    Fetch {
        /// URL being fetched.
        url: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Mounting a disk image failed.
    #[error("failed to mount {}: {reason}", image.display())]
    Mount {
        /// Disk image being mounted.
        image: PathBuf,
        /// Human-readable reason.
        reason: String,
    },

    /// Ejecting or unmounting a volume failed.
    #[error("failed to unmount {}: {reason}", mount_point.display())]
    Unmount {
        /// Mount point being released.
        mount_point: PathBuf,
        /// Human-readable reason.
        reason: String,
    },

    /// The package installer reported failure.
    #[error("failed to install {}: {reason}", package.display())]
    Install {
        /// Package (or profile) being installed.
        package: PathBuf,
        /// Human-readable reason.
        reason: String,
    },

    /// An inventory cache slot could not be read or written.
    #[error("inventory cache error at {}: {reason}", path.display())]
    Cache {
        /// Slot path.
        path: PathBuf,
        /// Human-readable reason.
        reason: String,
    },
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn invalid_category_display() {
        let e = Error::InvalidCategory {
            category: "Whatever".to_string(),
            supported: "Applications, Hardware".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "invalid inventory category 'Whatever': expected one of Applications, Hardware"
        );
    }

    #[test]
    fn unsupported_scheme_display() {
        let e = Error::UnsupportedScheme {
            url: "file:///etc/passwd".to_string(),
            scheme: "file".to_string(),
        };
        assert!(e.to_string().contains("'file'"));
        assert!(e.to_string().contains("file:///etc/passwd"));
    }

    #[test]
    fn path_errors_include_path() {
        let e = Error::InvalidPath {
            path: PathBuf::from("/tmp/pkg.dmg"),
            reason: "disk image does not exist".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "invalid path /tmp/pkg.dmg: disk image does not exist"
        );

        let e = Error::Unmount {
            mount_point: PathBuf::from("/Volumes/Tool"),
            reason: "exit 16".to_string(),
        };
        assert_eq!(e.to_string(), "failed to unmount /Volumes/Tool: exit 16");
    }

    #[test]
    fn exec_error_is_transparent() {
        let e: Error = ExecError::Interrupted {
            program: "/usr/sbin/installer".to_string(),
        }
        .into();
        assert_eq!(e.to_string(), "/usr/sbin/installer was interrupted");
    }

    #[test]
    fn converts_to_anyhow() {
        let e = Error::FieldNotFound {
            field: "machine_model".to_string(),
        };
        let _anyhow_err: anyhow::Error = e.into();
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn error_is_send_sync() {
        assert_send_sync::<Error>();
    }
}
