//! Progress reporting for pipeline consumers.
//!
//! The CLI drives an indicatif spinner through this trait; tests and
//! headless callers use [`SilentProgress`].

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each document descriptor is processed during the merge,
    /// whether it merged cleanly or was replaced by an error page.
    fn document_processed(&self, name: &str, current: usize, total: usize);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn document_processed(&self, _name: &str, _current: usize, _total: usize) {}
}
