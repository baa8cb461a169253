//! Ctrl-C handling.
//!
//! The handler only raises a flag.  [`SystemExecutor`](crate::exec::SystemExecutor)
//! polls the flag while waiting on a child, kills the child, and consumes the
//! flag, so the commands that release mounts and temporary files afterwards
//! still run.
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// The process-wide interrupt flag.
#[must_use]
pub fn flag() -> &'static AtomicBool {
    &INTERRUPTED
}

/// Install the Ctrl-C handler. Call once at startup.
///
/// # Errors
///
/// Returns an error if a handler is already installed or the signal cannot
/// be hooked.
pub fn install_handler() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        INTERRUPTED.store(true, Ordering::SeqCst);
    })
}
