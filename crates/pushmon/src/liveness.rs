//! Cooperative self-termination via a shared marker file.
//!
//! Redeploys and disable actions touch or remove a well-known marker;
//! every running agent generation notices the mtime change on its next
//! cycle and exits on its own. There is no direct IPC.

use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

/// Marker state captured once at startup and compared on every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessSnapshot {
    modified: SystemTime,
}

/// Source of the liveness signal, polled once per scheduling cycle.
pub trait LivenessSource: Send + Sync {
    /// Capture the current marker state. Called once, at startup.
    fn capture(&self) -> LivenessSnapshot;

    /// True iff the marker has changed since `snapshot` was captured.
    fn should_stop(&self, snapshot: &LivenessSnapshot) -> bool;
}

/// Liveness from the modification time of a marker file.
///
/// An absent or unreadable marker counts as epoch zero on both sides of
/// the comparison, so absent at capture and still absent now is "live".
pub struct FileMarkerSource {
    path: PathBuf,
}

impl FileMarkerSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn current_mtime(&self) -> SystemTime {
        fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH)
    }
}

impl LivenessSource for FileMarkerSource {
    fn capture(&self) -> LivenessSnapshot {
        LivenessSnapshot { modified: self.current_mtime() }
    }

    fn should_stop(&self, snapshot: &LivenessSnapshot) -> bool {
        self.current_mtime() != snapshot.modified
    }
}

/// Explicit-signal source for tests and embedded deployments.
pub struct ManualSource {
    stop: std::sync::atomic::AtomicBool,
}

impl ManualSource {
    pub fn new() -> Self {
        Self { stop: std::sync::atomic::AtomicBool::new(false) }
    }

    /// Raise the stop signal for every holder of this source.
    pub fn signal_stop(&self) {
        self.stop.store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Default for ManualSource {
    fn default() -> Self {
        Self::new()
    }
}

impl LivenessSource for ManualSource {
    fn capture(&self) -> LivenessSnapshot {
        LivenessSnapshot { modified: SystemTime::UNIX_EPOCH }
    }

    fn should_stop(&self, _snapshot: &LivenessSnapshot) -> bool {
        self.stop.load(std::sync::atomic::Ordering::SeqCst)
    }
}
