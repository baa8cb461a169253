//! Disk image mounting with deterministic release.
//!
//! [`MountManager::mount`] attaches an image with `hdiutil` and returns a
//! [`MountHandle`]; releasing the handle ejects the volume, which also
//! retires the backing device node.  Images that carry a license agreement
//! print it and wait for input before mounting, so every attach is fed a
//! fixed answer on stdin (see [`attach_with_license_answer`]).
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::exec::{ExecError, ExecResult, Executor};
use crate::logging::Log;
use crate::operations::FileSystemOps;
use crate::property_list::{PlistValue, read_optional_property_list};

/// Absolute path of the disk image utility.
pub const HDIUTIL: &str = "/usr/bin/hdiutil";

/// Absolute path of the unmount utility.
pub const UMOUNT: &str = "/sbin/umount";

/// Keystrokes answering a license prompt: leave the pager, then agree.
pub const LICENSE_PROMPT_RESPONSE: &[u8] = b"Q\nY\n";

const MOUNT_DIR_PREFIX: &str = "macprov-mount-";

/// Attach `image` at `mount_point`, pre-answering any license prompt.
///
/// The answer is written whether or not a prompt appears; without a prompt
/// `hdiutil` never reads it.
///
/// # Errors
///
/// Returns [`ExecError`] if `hdiutil` cannot be run to completion.
pub fn attach_with_license_answer(
    executor: &dyn Executor,
    image: &Path,
    mount_point: &Path,
) -> Result<ExecResult, ExecError> {
    let image = image.to_string_lossy();
    let mount_point = mount_point.to_string_lossy();
    executor.run_interactive(
        HDIUTIL,
        &[
            "attach",
            "-plist",
            "-nobrowse",
            "-noverify",
            "-mountpoint",
            &mount_point,
            &image,
        ],
        LICENSE_PROMPT_RESPONSE,
    )
}

/// First `mount-point` listed under `system-entities` in attach output.
fn reported_mount_point(plist: &PlistValue) -> Option<PathBuf> {
    plist
        .as_dictionary()?
        .get("system-entities")?
        .as_array()?
        .iter()
        .filter_map(PlistValue::as_dictionary)
        .find_map(|entity| entity.get("mount-point")?.as_str().map(PathBuf::from))
}

/// `dev-entry` of the first `system-entities` item in attach output.
fn first_device(plist: &PlistValue) -> Option<&str> {
    plist
        .as_dictionary()?
        .get("system-entities")?
        .as_array()?
        .first()?
        .as_dictionary()?
        .get("dev-entry")?
        .as_str()
}

/// Mounts, ejects and unmounts disk images.
#[derive(Clone)]
pub struct MountManager {
    executor: Arc<dyn Executor>,
    fs: Arc<dyn FileSystemOps>,
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for MountManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountManager")
            .field("executor", &self.executor)
            .field("fs", &self.fs)
            .finish_non_exhaustive()
    }
}

impl MountManager {
    /// Create a mount manager.
    #[must_use]
    pub fn new(
        executor: Arc<dyn Executor>,
        fs: Arc<dyn FileSystemOps>,
        log: Arc<dyn Log>,
    ) -> Self {
        Self { executor, fs, log }
    }

    /// Mount `image` at `mount_point`, or at a new temporary directory.
    ///
    /// A generated directory is removed again if mounting fails, and after
    /// the returned handle ejects the volume.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if `image` does not exist,
    /// [`Error::Mount`] if `hdiutil` fails or reports errors, and
    /// [`Error::Parse`] if its output is a corrupt property list.
    pub fn mount(&self, image: &Path, mount_point: Option<&Path>) -> Result<MountHandle> {
        if !self.fs.exists(image) {
            return Err(Error::InvalidPath {
                path: image.to_path_buf(),
                reason: "disk image does not exist".to_string(),
            });
        }
        let image = self
            .fs
            .canonicalize(image)
            .map_err(|e| Error::InvalidPath {
                path: image.to_path_buf(),
                reason: e.to_string(),
            })?;

        let (dir, generated) = match mount_point {
            Some(dir) => (dir.to_path_buf(), false),
            None => {
                let dir = self
                    .fs
                    .create_temp_dir(MOUNT_DIR_PREFIX)
                    .map_err(|e| Error::Mount {
                        image: image.clone(),
                        reason: format!("cannot create mount point: {e}"),
                    })?;
                (dir, true)
            }
        };

        self.log.info(&format!(
            "Mounting {} at {}",
            image.display(),
            dir.display()
        ));
        match self.attach(&image, &dir) {
            Ok(resolved) => Ok(MountHandle {
                manager: self.clone(),
                source_image: image,
                mount_point: resolved,
                generated_dir: generated.then_some(dir),
                released: false,
            }),
            Err(e) => {
                if generated {
                    self.remove_generated_dir(&dir);
                }
                Err(e)
            }
        }
    }

    fn attach(&self, image: &Path, dir: &Path) -> Result<PathBuf> {
        let mount_error = |reason: String| Error::Mount {
            image: image.to_path_buf(),
            reason,
        };
        let result = attach_with_license_answer(self.executor.as_ref(), image, dir)?;
        if !result.success() {
            return Err(mount_error(format!("hdiutil {}", result.failure_reason())));
        }
        let stderr = result.stderr_lossy();
        if !stderr.trim().is_empty() {
            return Err(mount_error(format!("hdiutil reported errors: {}", stderr.trim())));
        }

        // From here on the image is attached and must be released on error.
        let plist = match read_optional_property_list(&result.stdout) {
            Ok(plist) => plist,
            Err(e) => {
                if let Err(release) = self.release_attached(dir, None) {
                    self.log
                        .warn(&format!("{} may still be attached: {release}", image.display()));
                }
                return Err(e.into());
            }
        };
        match plist {
            Some(plist) => match reported_mount_point(&plist) {
                Some(mount_point) => Ok(mount_point),
                None => {
                    let reason = "hdiutil reported no mount point";
                    Err(mount_error(
                        match self.release_attached(dir, first_device(&plist)) {
                            Ok(()) => reason.to_string(),
                            Err(release) => format!("{reason}; release failed: {release}"),
                        },
                    ))
                }
            },
            None if self.fs.is_mount_point(dir) => {
                self.log.debug(&format!(
                    "attach printed a license agreement; using {}",
                    dir.display()
                ));
                Ok(dir.to_path_buf())
            }
            None => Err(mount_error(format!(
                "hdiutil printed a license agreement and {} is not mounted",
                dir.display()
            ))),
        }
    }

    /// Release an image whose attach succeeded but yielded no usable volume.
    ///
    /// A mounted `dir` is ejected; otherwise `device` is detached.
    fn release_attached(&self, dir: &Path, device: Option<&str>) -> Result<(), String> {
        let (verb, target) = if self.fs.is_mount_point(dir) {
            ("eject", dir.to_string_lossy().into_owned())
        } else if let Some(device) = device {
            ("detach", device.to_string())
        } else {
            return Err("no mounted volume or device entry to release".to_string());
        };
        self.log
            .debug(&format!("releasing {target} after incomplete attach"));
        match self.executor.run(HDIUTIL, &[verb, &target]) {
            Ok(result) if result.success() => Ok(()),
            Ok(result) => Err(format!("hdiutil {verb} {target}: {}", result.failure_reason())),
            Err(e) => Err(format!("hdiutil {verb} {target}: {e}")),
        }
    }

    fn ensure_mounted(&self, mount_point: &Path) -> Result<()> {
        let reason = if !self.fs.is_dir(mount_point) {
            "not a directory"
        } else if !self.fs.is_mount_point(mount_point) {
            "not a mounted volume"
        } else {
            return Ok(());
        };
        Err(Error::InvalidPath {
            path: mount_point.to_path_buf(),
            reason: reason.to_string(),
        })
    }

    fn release_volume(&self, program: &str, args: &[&str], mount_point: &Path) -> Result<()> {
        self.ensure_mounted(mount_point)?;
        let result = self.executor.run(program, args)?;
        if !result.success() {
            return Err(Error::Unmount {
                mount_point: mount_point.to_path_buf(),
                reason: result.failure_reason(),
            });
        }
        Ok(())
    }

    /// Eject the volume at `mount_point`, detaching its device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if `mount_point` is not a mounted
    /// directory and [`Error::Unmount`] if `hdiutil eject` fails.
    pub fn eject(&self, mount_point: &Path) -> Result<()> {
        self.log
            .info(&format!("Ejecting {}", mount_point.display()));
        let target = mount_point.to_string_lossy();
        self.release_volume(HDIUTIL, &["eject", &target], mount_point)
    }

    /// Unmount the volume at `mount_point` without detaching its device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPath`] if `mount_point` is not a mounted
    /// directory and [`Error::Unmount`] if `umount` fails.
    pub fn unmount(&self, mount_point: &Path) -> Result<()> {
        self.log
            .info(&format!("Unmounting {}", mount_point.display()));
        let target = mount_point.to_string_lossy();
        self.release_volume(UMOUNT, &[&target], mount_point)
    }

    fn remove_generated_dir(&self, dir: &Path) {
        if let Err(e) = self.fs.remove_dir(dir) {
            self.log.warn(&format!(
                "failed to remove mount point {}: {e}",
                dir.display()
            ));
        }
    }
}

/// A mounted disk image.
///
/// [`eject`](Self::eject) is the explicit release; dropping an unreleased
/// handle ejects it and logs any failure.
#[derive(Debug)]
pub struct MountHandle {
    manager: MountManager,
    source_image: PathBuf,
    mount_point: PathBuf,
    generated_dir: Option<PathBuf>,
    released: bool,
}

impl MountHandle {
    /// Where the volume is mounted.
    #[must_use]
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Disk image the volume came from.
    #[must_use]
    pub fn source_image(&self) -> &Path {
        &self.source_image
    }

    /// Eject the volume and remove a generated mount directory.
    ///
    /// # Errors
    ///
    /// Returns the error of [`MountManager::eject`].  A leftover directory
    /// is only logged.
    pub fn eject(mut self) -> Result<()> {
        self.release_inner()
    }

    /// Leave the volume mounted and return its mount point.
    #[must_use]
    pub fn detach(mut self) -> PathBuf {
        self.released = true;
        std::mem::take(&mut self.mount_point)
    }

    fn release_inner(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.manager.eject(&self.mount_point)?;
        if let Some(dir) = &self.generated_dir {
            self.manager.remove_generated_dir(dir);
        }
        Ok(())
    }
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            self.manager.log.warn(&format!(
                "failed to eject {}: {e}",
                self.mount_point.display()
            ));
        }
    }
}
