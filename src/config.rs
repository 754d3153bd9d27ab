//! Tuning knobs for the sync engine.
//!
//! Defaults mirror the exchange-facing production values; tests shrink them
//! to keep runtimes short.

use std::time::Duration;

/// Timings and capacities used by the supervisor and its stream tasks.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Capacity of the shared inbound event queue.
    pub queue_capacity: usize,

    /// Maximum silence on a websocket before the connection is dropped.
    pub read_deadline: Duration,

    /// Reconciliation aborts when no diff has been applied for this long.
    pub stall_threshold: Duration,

    /// Sleep between websocket reconnect attempts.
    pub reconnect_backoff: Duration,

    /// Sleep before a new reconciliation round re-snapshots and re-links.
    pub restart_backoff: Duration,

    /// Delay between supervisor start and the REST snapshot fetch, letting
    /// the diff stream buffer events that straddle the snapshot.
    pub snapshot_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 50,
            read_deadline: Duration::from_secs(300),
            stall_threshold: Duration::from_secs(10),
            reconnect_backoff: Duration::from_secs(1),
            restart_backoff: Duration::from_secs(1),
            snapshot_delay: Duration::from_secs(1),
        }
    }
}
