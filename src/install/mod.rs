//! Package installation and the fetch/mount/install pipeline.
mod installer;
mod pipeline;

pub use installer::{INSTALLER, PROFILES, install_package, install_profile};
pub use pipeline::{
    DEFAULT_TARGET, ImageSource, InstallFailure, InstallationRequest, Orchestrator, PipelineState,
};
