//! Recorded session history.

use tidings_client::ChatSnapshot;

/// Snapshots of one session in the order they were observed.
#[derive(Debug, Clone, Default)]
pub struct SessionTrace {
    /// Configured reconnect limit of the session
    pub max_reconnect_attempts: u32,
    /// Observed snapshots, oldest first
    pub snapshots: Vec<ChatSnapshot>,
}

impl SessionTrace {
    /// Empty trace for a session with the given reconnect limit.
    pub fn new(max_reconnect_attempts: u32) -> Self {
        Self { max_reconnect_attempts, snapshots: Vec::new() }
    }

    /// Append a snapshot.
    pub fn record(&mut self, snapshot: ChatSnapshot) {
        self.snapshots.push(snapshot);
    }

    /// Most recent snapshot.
    pub fn latest(&self) -> Option<&ChatSnapshot> {
        self.snapshots.last()
    }

    /// Consecutive snapshot pairs, oldest first.
    pub fn transitions(&self) -> impl Iterator<Item = (&ChatSnapshot, &ChatSnapshot)> {
        self.snapshots.windows(2).map(|pair| (&pair[0], &pair[1]))
    }
}
