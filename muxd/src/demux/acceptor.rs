//! Datagram accept path.
//!
//! One acceptor per UDP socket drains the socket and performs all
//! connection table inserts. Per datagram the decision ladder is, in
//! order: inspect, look up, stateless-reset, create, dispatch. The
//! ordering matters: a reset must be evaluated before connection creation
//! so that unmatched short-header traffic never allocates state.

use crate::config::DemuxConfig;
use crate::demux::cid::ConnectionId;
use crate::demux::connection::{ClosedSender, ConnectionEntry, ConnectionSink, FiveTuple};
use crate::demux::packet::{self, HeaderForm, Inspection};
use crate::demux::reaper::{ClosedConnectionReaper, REAP_INTERVAL};
use crate::demux::reset::{StatelessResetPacket, StatelessResetToken};
use crate::demux::sender;
use crate::demux::table::{ConnectionTable, InsertError};
use crate::demux::worker::PacketEvent;
use bytes::Bytes;
use crossbeam_channel::Sender;
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Maximum UDP payload the acceptor will read (RFC 9000 Section 18.2).
pub const MAX_UDP_PAYLOAD: usize = 65527;

/// Builds the sink a freshly accepted connection hands its datagrams to.
pub type SinkFactory = Arc<dyn Fn(&ConnectionId) -> Box<dyn ConnectionSink> + Send + Sync>;

pub struct Acceptor {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    table: Arc<ConnectionTable>,
    workers: Vec<Sender<PacketEvent>>,
    next_worker: usize,
    closed_tx: ClosedSender,
    reaper: ClosedConnectionReaper,
    sink_factory: SinkFactory,
    server_id: [u8; 8],
    short_dcid_len: usize,
    pmtu: usize,
    shutdown: Arc<AtomicBool>,
}

impl Acceptor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        socket: Arc<UdpSocket>,
        table: Arc<ConnectionTable>,
        workers: Vec<Sender<PacketEvent>>,
        closed_tx: ClosedSender,
        reaper: ClosedConnectionReaper,
        sink_factory: SinkFactory,
        config: &DemuxConfig,
        shutdown: Arc<AtomicBool>,
    ) -> io::Result<Self> {
        let local_addr = socket.local_addr()?;
        Ok(Self {
            socket,
            local_addr,
            table,
            workers,
            next_worker: 0,
            closed_tx,
            reaper,
            sink_factory,
            server_id: config.server_id_bytes(),
            short_dcid_len: config.local_cid_len,
            pmtu: config.pmtu,
            shutdown,
        })
    }

    /// Drain the socket until shutdown. The read timeout doubles as the
    /// reaper tick.
    pub fn run(mut self) -> anyhow::Result<()> {
        self.socket.set_read_timeout(Some(REAP_INTERVAL))?;
        let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
        let mut last_reap = Instant::now();

        info!(addr = %self.local_addr, "acceptor starting");

        while !self.shutdown.load(Ordering::Relaxed) {
            match self.socket.recv_from(&mut buf) {
                Ok((len, peer)) => self.on_datagram(&buf[..len], peer),
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {}
                Err(e) if e.raw_os_error() == Some(libc::ECONNABORTED) => {
                    debug!(error = %e, "ignoring aborted datagram");
                }
                Err(e) => {
                    error!(error = %e, "fatal socket error, aborting acceptor");
                    return Err(e.into());
                }
            }

            if last_reap.elapsed() >= REAP_INTERVAL {
                let reaped = self.reaper.reap(&self.table);
                if reaped > 0 {
                    debug!(reaped, live = self.table.len(), "reaper pass complete");
                }
                last_reap = Instant::now();
            }
        }

        info!(addr = %self.local_addr, "acceptor shutting down");
        Ok(())
    }

    /// Route one inbound datagram.
    pub fn on_datagram(&mut self, payload: &[u8], peer: SocketAddr) {
        let inspection = match packet::inspect(payload, self.short_dcid_len) {
            Ok(inspection) => inspection,
            Err(e) => {
                trace!(error = %e, from = %peer, len = payload.len(), "dropping malformed datagram");
                return;
            }
        };

        let tuple = FiveTuple {
            remote: peer,
            local: self.local_addr,
        };
        let entry = self.table.lookup(payload, tuple);

        // RFC 9000 Section 10.3: a short-header packet that matches no
        // connection, or any packet for a closed one, gets a stateless
        // reset; it must not leak whether connection state exists.
        let needs_reset = match &entry {
            None => inspection.form == HeaderForm::Short,
            Some(entry) => entry.is_closed(),
        };
        if needs_reset {
            self.send_stateless_reset(inspection.dcid, peer);
            return;
        }

        let entry = match entry {
            Some(entry) => entry,
            None => match self.accept_connection(&inspection, tuple) {
                Some(entry) => entry,
                // Peer retransmits; nothing to clean up.
                None => return,
            },
        };

        let event = PacketEvent {
            datagram: Bytes::copy_from_slice(payload),
            peer,
            entry: Arc::clone(&entry),
        };
        if let Err(e) = self.workers[entry.worker()].try_send(event) {
            warn!(
                worker_id = entry.worker(),
                cid = %entry.local_cid(),
                error = %e,
                "worker queue full, dropping datagram"
            );
        }
    }

    fn accept_connection(
        &mut self,
        inspection: &Inspection<'_>,
        tuple: FiveTuple,
    ) -> Option<Arc<ConnectionEntry>> {
        let peer_cid = ConnectionId::from_slice(inspection.scid.unwrap_or(&[]))?;
        let original_dcid = ConnectionId::from_slice(inspection.dcid)?;

        let local_cid = match ConnectionId::random(self.short_dcid_len) {
            Ok(cid) => cid,
            Err(e) => {
                warn!(error = %e, "cid generation failed, dropping datagram");
                return None;
            }
        };

        let worker = self.next_worker;
        self.next_worker = (self.next_worker + 1) % self.workers.len();

        let entry = Arc::new(ConnectionEntry::new(
            worker,
            peer_cid,
            local_cid,
            original_dcid,
            tuple,
            Arc::clone(&self.socket),
            self.closed_tx.clone(),
            (self.sink_factory)(&local_cid),
        ));

        match self.table.insert(Arc::clone(&entry)) {
            Ok(()) => {
                debug!(
                    cid = %entry.local_cid(),
                    peer_cid = %entry.peer_cid(),
                    original_dcid = %entry.original_dcid(),
                    worker_id = worker,
                    from = %tuple.remote,
                    "accepted connection"
                );
                Some(entry)
            }
            Err(InsertError::DuplicateCid) => {
                debug_assert!(false, "locally-issued cid collided");
                error!(cid = %entry.local_cid(), "duplicate locally-issued cid, dropping datagram");
                None
            }
            Err(InsertError::TableFull) => {
                warn!(
                    capacity = self.table.capacity(),
                    from = %tuple.remote,
                    "connection table full, dropping datagram"
                );
                None
            }
        }
    }

    fn send_stateless_reset(&self, dcid: &[u8], peer: SocketAddr) {
        let token = StatelessResetToken::generate(dcid, self.server_id);
        let packet = match StatelessResetPacket::new(token) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(error = %e, "no randomness for stateless reset, dropping");
                return;
            }
        };

        debug!(to = %peer, "sending stateless reset");
        sender::send_packet(&packet, &self.socket, peer, self.pmtu);
    }
}
