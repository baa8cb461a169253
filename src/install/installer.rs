//! Package and configuration-profile installers.
use std::path::Path;

use crate::error::{Error, Result};
use crate::exec::Executor;
use crate::logging::Log;

/// Absolute path of the package installer.
pub const INSTALLER: &str = "/usr/sbin/installer";

/// Absolute path of the configuration-profile tool.
pub const PROFILES: &str = "/usr/bin/profiles";

/// Install the package at `package` onto the volume `target`.
///
/// Only the exit status decides success; `installer` prints progress on
/// stderr.
///
/// # Errors
///
/// Returns [`Error::Install`] on a non-zero exit and [`Error::Execution`]
/// if the installer cannot be run.
pub fn install_package(
    executor: &dyn Executor,
    log: &dyn Log,
    package: &Path,
    target: &Path,
) -> Result<()> {
    let package_str = package.to_string_lossy();
    let target_str = target.to_string_lossy();
    log.info(&format!("Installing {package_str} on {target_str}"));
    let result = executor.run(INSTALLER, &["-pkg", &package_str, "-target", &target_str])?;
    for line in result.stdout_lossy().lines() {
        log.debug(line);
    }
    if !result.success() {
        return Err(Error::Install {
            package: package.to_path_buf(),
            reason: format!("installer {}", result.failure_reason()),
        });
    }
    Ok(())
}

/// Install the configuration profile at `path`.
///
/// # Errors
///
/// Returns [`Error::Install`] on a non-zero exit and [`Error::Execution`]
/// if `profiles` cannot be run.
pub fn install_profile(executor: &dyn Executor, log: &dyn Log, path: &Path) -> Result<()> {
    let path_str = path.to_string_lossy();
    log.info(&format!("Installing profile {path_str}"));
    let result = executor.run(PROFILES, &["-I", "-F", &path_str])?;
    if !result.success() {
        return Err(Error::Install {
            package: path.to_path_buf(),
            reason: format!("profiles {}", result.failure_reason()),
        });
    }
    Ok(())
}
