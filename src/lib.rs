//! macOS host provisioning engine.
//!
//! Installs packages from local or remote disk images with guaranteed
//! cleanup, and answers host inventory queries from a TTL-bounded cache in
//! front of `system_profiler`.
//!
//! The public API is organised into layers:
//!
//! - **[`exec`]**, **[`operations`]**: process and filesystem seams
//! - **[`property_list`]**: typed view of plist command output
//! - **[`inventory`]**: cached system inventory and host classification
//! - **[`fetch`]**, **[`mount`]**, **[`install`]**: the acquisition and
//!   installation pipeline
//! - **[`commands`]**: top-level subcommands wired through a [`context::Context`]
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod exec;
pub mod fetch;
pub mod install;
pub mod interrupt;
pub mod inventory;
pub mod logging;
pub mod mount;
pub mod operations;
pub mod property_list;

#[cfg(test)]
mod test_helpers;
