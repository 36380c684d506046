//! UDP datagram demultiplexer.
//!
//! Routes each inbound datagram to the connection that owns it, minting
//! new connections for unmatched long-header packets and answering
//! unmatched short-header traffic with stateless resets.
//!
//! # Architecture
//!
//! - One **acceptor** thread per UDP socket drains the socket and performs
//!   every connection table insert. It blocks only on read-readiness.
//! - N **connection worker** threads each own a pinned subset of
//!   connections; only the owning worker touches an entry's non-atomic
//!   state. The acceptor hands datagrams over on bounded channels, FIFO
//!   per connection.
//! - A **reaper** pass on the acceptor thread drains the closed queue
//!   every 100 ms and releases table slots.
//!
//! No lock is held across I/O anywhere in the subsystem.

mod acceptor;
mod cid;
mod connection;
mod packet;
mod reaper;
mod reset;
mod sender;
pub mod socket;
mod table;
mod worker;

#[cfg(test)]
mod tests;

pub use acceptor::{Acceptor, SinkFactory, MAX_UDP_PAYLOAD};
pub use cid::{ConnectionId, MAX_CID_LEN};
pub use connection::{ConnectionContext, ConnectionEntry, ConnectionSink, FiveTuple};
pub use packet::{inspect, HeaderForm, InspectError, Inspection};
pub use reaper::{ClosedConnectionReaper, REAP_INTERVAL};
pub use reset::{StatelessResetPacket, StatelessResetToken, RESET_TOKEN_LEN};
pub use sender::{send_packet, OutboundPacket};
pub use table::{ConnectionTable, InsertError};
pub use worker::{ConnectionWorker, PacketEvent};

use crate::config::DemuxConfig;
use anyhow::Result;
use crossbeam_channel::bounded;
use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};

/// Handle over the demultiplexer's threads.
pub struct DemuxHandle {
    acceptor: JoinHandle<Result<()>>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    table: Arc<ConnectionTable>,
}

impl DemuxHandle {
    pub fn connection_count(&self) -> usize {
        self.table.len()
    }

    /// Signal every thread to stop and wait for them to exit.
    pub fn shutdown(self) {
        info!("shutting down demultiplexer");
        self.shutdown.store(true, Ordering::Relaxed);

        match self.acceptor.join() {
            Ok(Ok(())) => debug!("acceptor exited cleanly"),
            Ok(Err(e)) => error!(error = ?e, "acceptor returned error"),
            Err(e) => error!(error = ?e, "acceptor panicked"),
        }

        for (i, worker) in self.workers.into_iter().enumerate() {
            match worker.join() {
                Ok(()) => debug!(worker_id = i, "worker exited cleanly"),
                Err(e) => error!(worker_id = i, error = ?e, "worker panicked"),
            }
        }

        info!("demultiplexer shutdown complete");
    }
}

/// Spawn the acceptor and connection workers for one UDP socket.
pub fn spawn(socket: UdpSocket, config: &DemuxConfig, sink_factory: SinkFactory) -> Result<DemuxHandle> {
    if config.workers == 0 {
        anyhow::bail!("demux workers must be at least 1");
    }

    info!(
        workers = config.workers,
        connection_table_size = config.connection_table_size,
        cid_len = config.local_cid_len,
        "initializing demultiplexer"
    );

    let socket = Arc::new(socket);
    let shutdown = Arc::new(AtomicBool::new(false));
    let table = Arc::new(ConnectionTable::new(
        config.connection_table_size,
        config.local_cid_len,
    ));
    let (closed_tx, closed_rx) = crossbeam_channel::unbounded();

    let mut workers = Vec::with_capacity(config.workers);
    let mut event_txs = Vec::with_capacity(config.workers);

    for worker_id in 0..config.workers {
        let (event_tx, event_rx) = bounded(config.channel_capacity);
        event_txs.push(event_tx);

        let worker = ConnectionWorker::new(worker_id, event_rx, Arc::clone(&shutdown));
        let handle = thread::Builder::new()
            .name(format!("muxd-conn-{}", worker_id))
            .spawn(move || worker.run())?;
        workers.push(handle);
    }

    let acceptor = Acceptor::new(
        Arc::clone(&socket),
        Arc::clone(&table),
        event_txs,
        closed_tx,
        ClosedConnectionReaper::new(closed_rx),
        sink_factory,
        config,
        Arc::clone(&shutdown),
    )?;
    let acceptor = thread::Builder::new()
        .name("muxd-accept".to_string())
        .spawn(move || acceptor.run())?;

    info!(workers = config.workers, "demultiplexer started");

    Ok(DemuxHandle {
        acceptor,
        workers,
        shutdown,
        table,
    })
}
