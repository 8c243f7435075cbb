//! Advisory download progress reporting.
//!
//! Callers that want live byte counts pass a `watch` sender through
//! [`DownloadOptions`](crate::download::DownloadOptions); the state machine
//! publishes a snapshot after each accounting change. Purely observational —
//! progress never influences control flow, and the declared total is
//! advisory only.

use tokio::sync::watch;

/// Snapshot of one download's byte accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadProgress {
    /// Bytes appended to the sink so far.
    pub bytes_received: u64,
    /// Declared total size from the response's `content-length`, when known.
    pub declared_total_size: Option<u64>,
}

impl DownloadProgress {
    /// Creates a watch channel seeded with an empty snapshot.
    #[must_use]
    pub fn channel() -> (watch::Sender<Self>, watch::Receiver<Self>) {
        watch::channel(Self::default())
    }
}
