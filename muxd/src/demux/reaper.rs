//! Closed-connection reaper.
//!
//! Connections are not torn down inline: closing marks the entry and
//! queues it, and the acceptor's thread drains the queue on a fixed
//! schedule, removing each entry from the table and releasing its
//! resources.

use crate::demux::connection::ClosedReceiver;
use crate::demux::table::ConnectionTable;
use std::time::Duration;
use tracing::debug;

/// How often the acceptor drains the closed queue.
pub const REAP_INTERVAL: Duration = Duration::from_millis(100);

pub struct ClosedConnectionReaper {
    closed_rx: ClosedReceiver,
}

impl ClosedConnectionReaper {
    pub fn new(closed_rx: ClosedReceiver) -> Self {
        Self { closed_rx }
    }

    /// Drain every queued closed connection. Returns how many were reaped.
    pub fn reap(&self, table: &ConnectionTable) -> usize {
        let mut reaped = 0;

        while let Ok(entry) = self.closed_rx.try_recv() {
            table.remove(&entry);
            debug!(
                cid = %entry.local_cid(),
                lifetime = ?entry.submit_time().elapsed(),
                "reaped closed connection"
            );
            reaped += 1;
        }

        reaped
    }
}
