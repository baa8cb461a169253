//! Command: install a package from a disk image.
use anyhow::Result;

use crate::cli::InstallOpts;
use crate::context::Context;
use crate::install::{ImageSource, InstallationRequest};

/// Build the request for `opts`, filling unset options from the configuration.
#[must_use]
pub fn request(ctx: &Context, opts: &InstallOpts) -> InstallationRequest {
    let target = opts
        .target
        .clone()
        .unwrap_or_else(|| ctx.config.install.target.clone());
    InstallationRequest::new(ImageSource::parse(&opts.source), &opts.package)
        .with_target(target)
        .with_sha256(opts.transfer.sha256.clone())
        .with_verbose_transfer(opts.transfer.verbose_transfer || ctx.config.fetch.verbose)
}

/// Run the install command.
///
/// # Errors
///
/// Returns an error if fetching, mounting, installing or ejecting fails.
pub fn run(ctx: &Context, opts: &InstallOpts) -> Result<()> {
    let request = request(ctx, opts);
    let orchestrator = ctx.orchestrator();
    orchestrator.install_from_image(&request)?;
    ctx.log.info(&format!(
        "installed {} from {}",
        request.package_relative_path.display(),
        request.image_source
    ));
    Ok(())
}
