//! Command: print version information.

/// Version stamped by the build script, or the crate version.
#[must_use]
pub fn version() -> &'static str {
    option_env!("MACPROV_VERSION").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Print the macprov version to stdout.
pub fn run() {
    super::emit(&format!("macprov {}", version()));
}
