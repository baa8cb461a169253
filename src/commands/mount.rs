//! Commands: mount, eject and unmount disk images.
use anyhow::Result;

use crate::cli::{MountOpts, VolumeOpts};
use crate::context::Context;

/// Attach `opts.image`, print the mount point and leave it mounted.
///
/// # Errors
///
/// Returns an error if the image is missing or cannot be attached.
pub fn run_mount(ctx: &Context, opts: &MountOpts) -> Result<()> {
    let handle = ctx
        .mount_manager()
        .mount(&opts.image, opts.mountpoint.as_deref())?;
    let mount_point = handle.detach();
    super::emit(&mount_point.display().to_string());
    Ok(())
}

/// Eject the disk image mounted at `opts.mount_point`.
///
/// # Errors
///
/// Returns an error if nothing is mounted there or `hdiutil eject` fails.
pub fn run_eject(ctx: &Context, opts: &VolumeOpts) -> Result<()> {
    ctx.mount_manager().eject(&opts.mount_point)?;
    Ok(())
}

/// Unmount the volume at `opts.mount_point`.
///
/// # Errors
///
/// Returns an error if nothing is mounted there or `umount` fails.
pub fn run_unmount(ctx: &Context, opts: &VolumeOpts) -> Result<()> {
    ctx.mount_manager().unmount(&opts.mount_point)?;
    Ok(())
}
