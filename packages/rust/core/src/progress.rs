//! Progress reporting for the batch loops.

/// Progress callback for reporting batch status.
pub trait BatchProgress: Send + Sync {
    /// Called when a batch (or a phase of it) begins.
    fn phase(&self, name: &str);
    /// Called before each item is processed. `current` is 1-based.
    fn item_started(&self, label: &str, current: usize, total: usize);
    /// Called once, after the last item.
    fn done(&self, summary: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl BatchProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn item_started(&self, _label: &str, _current: usize, _total: usize) {}
    fn done(&self, _summary: &str) {}
}
