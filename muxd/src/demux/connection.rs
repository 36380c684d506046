//! Per-connection bookkeeping shared between the acceptor and workers.

use crate::demux::cid::ConnectionId;
use crossbeam_channel::{Receiver, Sender};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

/// UDP endpoint pair identifying one peer flow. The protocol component of
/// the classic 5-tuple is always UDP here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FiveTuple {
    pub remote: SocketAddr,
    pub local: SocketAddr,
}

/// Which side initiated the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionContext {
    Inbound,
    Outbound,
}

/// Consumer of a connection's datagrams; the seam to the transport state
/// machine, which lives outside this subsystem.
pub trait ConnectionSink: Send {
    fn on_datagram(&mut self, datagram: &[u8], peer: SocketAddr);
}

/// Multi-producer single-consumer queue of entries awaiting teardown. Any
/// worker may enqueue on close; only the reaper dequeues.
pub type ClosedSender = Sender<Arc<ConnectionEntry>>;
pub type ClosedReceiver = Receiver<Arc<ConnectionEntry>>;

/// One live connection, created by the acceptor on the first unmatched
/// long-header packet and destroyed by the reaper after the closed flag is
/// set.
pub struct ConnectionEntry {
    /// Worker this connection is pinned to for its whole lifetime.
    worker: usize,
    /// CID the peer chose for itself (the SCID of its first Initial).
    peer_cid: ConnectionId,
    /// CID this endpoint issued; the table's primary key.
    local_cid: ConnectionId,
    /// DCID of the client's first Initial, kept for the handshake layer's
    /// key derivation.
    original_dcid: ConnectionId,
    tuple: FiveTuple,
    context: ConnectionContext,
    submit_time: Instant,
    socket: Arc<UdpSocket>,
    closed: AtomicBool,
    /// The first close wins the swap and enqueues the entry here.
    closed_tx: ClosedSender,
    /// Guards the non-atomic connection state; only the owning worker
    /// takes this lock during normal operation.
    sink: Mutex<Box<dyn ConnectionSink>>,
}

impl ConnectionEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker: usize,
        peer_cid: ConnectionId,
        local_cid: ConnectionId,
        original_dcid: ConnectionId,
        tuple: FiveTuple,
        socket: Arc<UdpSocket>,
        closed_tx: ClosedSender,
        sink: Box<dyn ConnectionSink>,
    ) -> Self {
        Self {
            worker,
            peer_cid,
            local_cid,
            original_dcid,
            tuple,
            context: ConnectionContext::Inbound,
            submit_time: Instant::now(),
            socket,
            closed: AtomicBool::new(false),
            closed_tx,
            sink: Mutex::new(sink),
        }
    }

    pub fn worker(&self) -> usize {
        self.worker
    }

    pub fn peer_cid(&self) -> &ConnectionId {
        &self.peer_cid
    }

    pub fn local_cid(&self) -> &ConnectionId {
        &self.local_cid
    }

    pub fn original_dcid(&self) -> &ConnectionId {
        &self.original_dcid
    }

    pub fn tuple(&self) -> FiveTuple {
        self.tuple
    }

    pub fn context(&self) -> ConnectionContext {
        self.context
    }

    pub fn submit_time(&self) -> Instant {
        self.submit_time
    }

    pub fn socket(&self) -> &Arc<UdpSocket> {
        &self.socket
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Flip the closed flag. The caller that wins the false-to-true swap
    /// enqueues the entry for the reaper, so each entry is queued at most
    /// once. Returns whether this call won.
    pub fn mark_closed(self: &Arc<Self>) -> bool {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let _ = self.closed_tx.send(Arc::clone(self));
            true
        } else {
            false
        }
    }

    /// Hand one datagram to the connection's sink under the entry lock.
    pub fn deliver(&self, datagram: &[u8], peer: SocketAddr) {
        let mut sink: MutexGuard<'_, _> = match self.sink.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sink.on_datagram(datagram, peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::thread;

    pub(crate) struct NullSink;

    impl ConnectionSink for NullSink {
        fn on_datagram(&mut self, _datagram: &[u8], _peer: SocketAddr) {}
    }

    fn test_entry(closed_tx: ClosedSender) -> Arc<ConnectionEntry> {
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        let local = socket.local_addr().unwrap();
        Arc::new(ConnectionEntry::new(
            0,
            ConnectionId::from_slice(&[1, 2, 3, 4]).unwrap(),
            ConnectionId::random(20).unwrap(),
            ConnectionId::from_slice(&[5, 6, 7, 8]).unwrap(),
            FiveTuple {
                remote: "127.0.0.1:9".parse().unwrap(),
                local,
            },
            socket,
            closed_tx,
            Box::new(NullSink),
        ))
    }

    #[test]
    fn test_mark_closed_enqueues_once() {
        let (tx, rx) = unbounded();
        let entry = test_entry(tx);

        assert!(entry.mark_closed());
        assert!(!entry.mark_closed());
        assert!(entry.is_closed());

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_mark_closed_race_single_winner() {
        let (tx, rx) = unbounded();
        let entry = test_entry(tx);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let entry = Arc::clone(&entry);
                thread::spawn(move || entry.mark_closed())
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();

        assert_eq!(wins, 1);
        assert_eq!(rx.try_iter().count(), 1);
    }
}
