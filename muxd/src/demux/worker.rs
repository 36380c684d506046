//! Connection worker threads.
//!
//! Each worker owns a pinned subset of connections and is the only thread
//! that touches their non-atomic state. The acceptor pushes poll events
//! onto the worker's queue; within one connection the queue preserves the
//! order in which datagrams left the socket.

use crate::demux::connection::ConnectionEntry;
use bytes::Bytes;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

/// One datagram bound to the connection that owns it.
pub struct PacketEvent {
    pub datagram: Bytes,
    pub peer: SocketAddr,
    pub entry: Arc<ConnectionEntry>,
}

pub struct ConnectionWorker {
    id: usize,
    events: Receiver<PacketEvent>,
    shutdown: Arc<AtomicBool>,
}

impl ConnectionWorker {
    pub fn new(id: usize, events: Receiver<PacketEvent>, shutdown: Arc<AtomicBool>) -> Self {
        Self {
            id,
            events,
            shutdown,
        }
    }

    pub fn run(self) {
        info!(worker_id = self.id, "connection worker starting");

        loop {
            match self.events.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => {
                    // Dispatches enqueued before a close remain in the
                    // queue; the closed flag is checked before processing.
                    if event.entry.is_closed() {
                        trace!(
                            worker_id = self.id,
                            cid = %event.entry.local_cid(),
                            "dropping event for closed connection"
                        );
                        continue;
                    }
                    event.entry.deliver(&event.datagram, event.peer);
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.shutdown.load(Ordering::Relaxed) {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    debug!(worker_id = self.id, "event channel disconnected");
                    break;
                }
            }
        }

        info!(worker_id = self.id, "connection worker shutting down");
    }
}
