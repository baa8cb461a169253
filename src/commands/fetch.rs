//! Command: download a URL.
use std::path::PathBuf;

use anyhow::Result;

use crate::cli::FetchOpts;
use crate::context::Context;
use crate::fetch::FetchOptions;

/// Download `opts.url` and return the path of the kept file.
///
/// # Errors
///
/// Returns an error for unsupported schemes, failed transfers and checksum
/// mismatches.
pub fn download(ctx: &Context, opts: &FetchOpts) -> Result<PathBuf> {
    let options = FetchOptions {
        verbose: opts.transfer.verbose_transfer || ctx.config.fetch.verbose,
        sha256: opts.transfer.sha256.clone(),
    };
    let handle = ctx
        .fetcher()
        .fetch(&opts.url, opts.output.as_deref(), &options)?;
    Ok(handle.persist())
}

/// Run the fetch command, printing the downloaded file's path.
///
/// # Errors
///
/// See [`download`].
pub fn run(ctx: &Context, opts: &FetchOpts) -> Result<()> {
    ctx.log.stage(&format!("Fetching {}", opts.url));
    let path = download(ctx, opts)?;
    super::emit(&path.display().to_string());
    Ok(())
}
