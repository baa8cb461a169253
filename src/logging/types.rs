//! The [`Log`] trait shared by every component.

/// Abstraction over the logging backend.
///
/// Components receive an `Arc<dyn Log>` through
/// [`Context`](crate::context::Context) instead of calling `tracing`
/// directly, so tests can run them against a silent or recording logger.
pub trait Log: Send + Sync {
    /// Log a stage header (one per command or pipeline run).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (console only with `--verbose`; always in the log file).
    fn debug(&self, msg: &str);
    /// Log a warning, e.g. a best-effort cleanup that failed.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
}
