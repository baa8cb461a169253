//! Commands: install a flat package or a configuration profile.
use anyhow::Result;

use crate::cli::{PkgOpts, ProfileOpts};
use crate::context::Context;
use crate::error::Error;
use crate::install::{install_package, install_profile};

/// Install `opts.package` onto `--target` or the configured target.
///
/// # Errors
///
/// Returns an error if the package is missing or the installer fails.
pub fn run_pkg(ctx: &Context, opts: &PkgOpts) -> Result<()> {
    if !ctx.fs_ops.exists(&opts.package) {
        return Err(Error::InvalidPath {
            path: opts.package.clone(),
            reason: "package not found".to_string(),
        }
        .into());
    }
    let target = opts
        .target
        .as_deref()
        .unwrap_or(&ctx.config.install.target);
    install_package(ctx.executor.as_ref(), ctx.log.as_ref(), &opts.package, target)?;
    Ok(())
}

/// Install the configuration profile at `opts.path`.
///
/// # Errors
///
/// Returns an error if the profile is missing or `profiles` fails.
pub fn run_profile(ctx: &Context, opts: &ProfileOpts) -> Result<()> {
    if !ctx.fs_ops.exists(&opts.path) {
        return Err(Error::InvalidPath {
            path: opts.path.clone(),
            reason: "profile not found".to_string(),
        }
        .into());
    }
    install_profile(ctx.executor.as_ref(), ctx.log.as_ref(), &opts.path)?;
    Ok(())
}
