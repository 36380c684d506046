//! Demultiplexer behavior tests.
//!
//! The acceptor is driven directly through `on_datagram` against loopback
//! sockets, so every scenario observes real datagrams on the reset path.

use super::acceptor::Acceptor;
use super::cid::ConnectionId;
use super::connection::{ClosedReceiver, ConnectionContext, ConnectionEntry, ConnectionSink, FiveTuple};
use super::reaper::ClosedConnectionReaper;
use super::reset::StatelessResetToken;
use super::table::{ConnectionTable, InsertError};
use super::worker::PacketEvent;
use crate::config::DemuxConfig;
use crossbeam_channel::{bounded, unbounded, Receiver};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

struct NullSink;

impl ConnectionSink for NullSink {
    fn on_datagram(&mut self, _datagram: &[u8], _peer: SocketAddr) {}
}

struct Harness {
    acceptor: Acceptor,
    table: Arc<ConnectionTable>,
    event_rxs: Vec<Receiver<PacketEvent>>,
    closed_rx: ClosedReceiver,
    config: DemuxConfig,
}

impl Harness {
    fn new(workers: usize, local_cid_len: usize) -> Self {
        let config = DemuxConfig {
            workers,
            local_cid_len,
            connection_table_size: 64,
            ..DemuxConfig::default()
        };

        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        let table = Arc::new(ConnectionTable::new(
            config.connection_table_size,
            config.local_cid_len,
        ));
        let (closed_tx, closed_rx) = unbounded();

        let mut event_txs = Vec::new();
        let mut event_rxs = Vec::new();
        for _ in 0..workers {
            let (tx, rx) = bounded(config.channel_capacity);
            event_txs.push(tx);
            event_rxs.push(rx);
        }

        let acceptor = Acceptor::new(
            socket,
            Arc::clone(&table),
            event_txs,
            closed_tx,
            ClosedConnectionReaper::new(closed_rx.clone()),
            Arc::new(|_: &ConnectionId| Box::new(NullSink) as Box<dyn ConnectionSink>),
            &config,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();

        Self {
            acceptor,
            table,
            event_rxs,
            closed_rx,
            config,
        }
    }
}

fn client_socket() -> (UdpSocket, SocketAddr) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_millis(500)))
        .unwrap();
    let addr = socket.local_addr().unwrap();
    (socket, addr)
}

fn long_header(dcid: &[u8], scid: &[u8]) -> Vec<u8> {
    let mut payload = vec![0xC0, 0x00, 0x00, 0x00, 0x01];
    payload.push(dcid.len() as u8);
    payload.extend_from_slice(dcid);
    payload.push(scid.len() as u8);
    payload.extend_from_slice(scid);
    payload.extend_from_slice(&[0u8; 32]);
    payload
}

fn short_header(dcid: &[u8]) -> Vec<u8> {
    let mut payload = vec![0x40];
    payload.extend_from_slice(dcid);
    payload.extend_from_slice(&[0u8; 16]);
    payload
}

#[test]
fn test_unmatched_short_header_gets_stateless_reset() {
    let mut harness = Harness::new(1, 8);
    let (client, client_addr) = client_socket();

    let dcid = [0xAB; 8];
    harness.acceptor.on_datagram(&short_header(&dcid), client_addr);

    // No connection state was allocated.
    assert!(harness.table.is_empty());
    assert!(harness.event_rxs[0].try_recv().is_err());

    // Exactly one reset datagram, carrying the deterministic token.
    let mut buf = [0u8; 128];
    let (len, _) = client.recv_from(&mut buf).unwrap();
    assert!(len >= 21);
    assert_eq!(buf[0] & 0x80, 0);

    let expected = StatelessResetToken::generate(&dcid, harness.config.server_id_bytes());
    assert_eq!(&buf[len - 16..len], expected.as_bytes());

    assert!(client.recv_from(&mut buf).is_err());
}

#[test]
fn test_long_header_creates_one_connection() {
    let mut harness = Harness::new(1, 20);
    let (client, client_addr) = client_socket();

    let dcid = [1u8, 2, 3, 4, 5, 6, 7, 8];
    let scid = [9u8, 10, 11, 12];
    harness.acceptor.on_datagram(&long_header(&dcid, &scid), client_addr);

    assert_eq!(harness.table.len(), 1);

    let event = harness.event_rxs[0]
        .recv_timeout(Duration::from_millis(100))
        .unwrap();
    assert_eq!(event.peer, client_addr);
    assert_eq!(event.entry.peer_cid().as_bytes(), &scid);
    assert_eq!(event.entry.original_dcid().as_bytes(), &dcid);
    assert_eq!(event.entry.local_cid().len(), 20);
    assert_eq!(event.entry.worker(), 0);
    assert_eq!(event.entry.context(), ConnectionContext::Inbound);

    // No reset was sent on the accept path.
    let mut buf = [0u8; 128];
    assert!(client.recv_from(&mut buf).is_err());
}

#[test]
fn test_retransmitted_initial_matches_existing_connection() {
    let mut harness = Harness::new(1, 20);
    let (_client, client_addr) = client_socket();

    let payload = long_header(&[1u8; 8], &[2u8; 4]);
    harness.acceptor.on_datagram(&payload, client_addr);
    harness.acceptor.on_datagram(&payload, client_addr);

    assert_eq!(harness.table.len(), 1);

    let first = harness.event_rxs[0].try_recv().unwrap();
    let second = harness.event_rxs[0].try_recv().unwrap();
    assert!(Arc::ptr_eq(&first.entry, &second.entry));
}

#[test]
fn test_short_header_matches_by_local_cid_in_fifo_order() {
    let mut harness = Harness::new(1, 20);
    let (_client, client_addr) = client_socket();

    harness
        .acceptor
        .on_datagram(&long_header(&[1u8; 8], &[2u8; 4]), client_addr);
    let accepted = harness.event_rxs[0].try_recv().unwrap();
    let local_cid = *accepted.entry.local_cid();

    for marker in [0x10u8, 0x20, 0x30] {
        let mut payload = short_header(local_cid.as_bytes());
        payload.push(marker);
        harness.acceptor.on_datagram(&payload, client_addr);
    }

    assert_eq!(harness.table.len(), 1);
    for marker in [0x10u8, 0x20, 0x30] {
        let event = harness.event_rxs[0].try_recv().unwrap();
        assert!(Arc::ptr_eq(&event.entry, &accepted.entry));
        assert_eq!(*event.datagram.last().unwrap(), marker);
    }
}

#[test]
fn test_closed_connection_gets_reset_until_reaped() {
    let mut harness = Harness::new(1, 20);
    let (client, client_addr) = client_socket();

    harness
        .acceptor
        .on_datagram(&long_header(&[1u8; 8], &[2u8; 4]), client_addr);
    let entry = harness.event_rxs[0].try_recv().unwrap().entry;
    let local_cid = *entry.local_cid();

    assert!(entry.mark_closed());

    harness
        .acceptor
        .on_datagram(&short_header(local_cid.as_bytes()), client_addr);

    // Reset sent, nothing dispatched.
    let mut buf = [0u8; 128];
    let (len, _) = client.recv_from(&mut buf).unwrap();
    let expected =
        StatelessResetToken::generate(local_cid.as_bytes(), harness.config.server_id_bytes());
    assert_eq!(&buf[len - 16..len], expected.as_bytes());
    assert!(harness.event_rxs[0].try_recv().is_err());

    // Reaping releases the table slot.
    let reaper = ClosedConnectionReaper::new(harness.closed_rx.clone());
    assert_eq!(reaper.reap(&harness.table), 1);
    assert!(harness.table.is_empty());
    assert_eq!(reaper.reap(&harness.table), 0);
}

#[test]
fn test_zero_length_cid_deployment_matches_by_tuple() {
    let mut harness = Harness::new(1, 0);
    let (_client, client_addr) = client_socket();

    harness
        .acceptor
        .on_datagram(&long_header(&[1u8; 8], &[2u8; 4]), client_addr);
    assert_eq!(harness.table.len(), 1);
    let accepted = harness.event_rxs[0].try_recv().unwrap();
    assert!(accepted.entry.local_cid().is_empty());

    // Short header with a zero-length DCID resolves through the 5-tuple.
    harness.acceptor.on_datagram(&short_header(&[]), client_addr);
    let event = harness.event_rxs[0].try_recv().unwrap();
    assert!(Arc::ptr_eq(&event.entry, &accepted.entry));
}

#[test]
fn test_round_robin_worker_assignment() {
    let mut harness = Harness::new(2, 20);
    let (_client_a, addr_a) = client_socket();
    let (_client_b, addr_b) = client_socket();

    harness
        .acceptor
        .on_datagram(&long_header(&[1u8; 8], &[2u8; 4]), addr_a);
    harness
        .acceptor
        .on_datagram(&long_header(&[3u8; 8], &[4u8; 4]), addr_b);

    let first = harness.event_rxs[0].try_recv().unwrap();
    let second = harness.event_rxs[1].try_recv().unwrap();
    assert_eq!(first.entry.worker(), 0);
    assert_eq!(second.entry.worker(), 1);
}

#[test]
fn test_malformed_datagram_is_dropped() {
    let mut harness = Harness::new(1, 20);
    let (client, client_addr) = client_socket();

    harness.acceptor.on_datagram(&[0xC0], client_addr);
    harness.acceptor.on_datagram(&[], client_addr);
    harness
        .acceptor
        .on_datagram(&[0xC0, 0, 0, 0, 1, 21, 1, 2], client_addr);

    assert!(harness.table.is_empty());
    assert!(harness.event_rxs[0].try_recv().is_err());
    let mut buf = [0u8; 64];
    assert!(client.recv_from(&mut buf).is_err());
}

struct CountingSink(Arc<std::sync::atomic::AtomicUsize>);

impl ConnectionSink for CountingSink {
    fn on_datagram(&mut self, _datagram: &[u8], _peer: SocketAddr) {
        self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }
}

#[test]
fn test_spawn_end_to_end() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let server_addr = socket.local_addr().unwrap();
    let config = DemuxConfig {
        workers: 2,
        local_cid_len: 8,
        ..DemuxConfig::default()
    };

    let delivered = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&delivered);
    let handle = super::spawn(
        socket,
        &config,
        Arc::new(move |_: &ConnectionId| {
            Box::new(CountingSink(Arc::clone(&counter))) as Box<dyn ConnectionSink>
        }),
    )
    .unwrap();

    let (client, _) = client_socket();
    client
        .send_to(&long_header(&[1u8; 8], &[2u8; 4]), server_addr)
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(2);
    while delivered.load(Ordering::Relaxed) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(delivered.load(Ordering::Relaxed), 1);
    assert_eq!(handle.connection_count(), 1);
    handle.shutdown();
}

fn test_entry(local_cid: ConnectionId, remote: SocketAddr) -> Arc<ConnectionEntry> {
    let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
    let local = socket.local_addr().unwrap();
    let (closed_tx, _closed_rx) = unbounded();
    Arc::new(ConnectionEntry::new(
        0,
        ConnectionId::from_slice(&[7u8; 4]).unwrap(),
        local_cid,
        ConnectionId::from_slice(&[8u8; 4]).unwrap(),
        FiveTuple { remote, local },
        socket,
        closed_tx,
        Box::new(NullSink),
    ))
}

#[test]
fn test_table_rejects_duplicate_cid() {
    let table = ConnectionTable::new(64, 20);
    let cid = ConnectionId::random(20).unwrap();

    let first = test_entry(cid, "127.0.0.1:1000".parse().unwrap());
    let second = test_entry(cid, "127.0.0.1:2000".parse().unwrap());

    assert!(table.insert(first).is_ok());
    assert_eq!(table.insert(second), Err(InsertError::DuplicateCid));
}

#[test]
fn test_table_enforces_capacity() {
    let table = ConnectionTable::new(1, 20);

    let first = test_entry(
        ConnectionId::random(20).unwrap(),
        "127.0.0.1:1000".parse().unwrap(),
    );
    let second = test_entry(
        ConnectionId::random(20).unwrap(),
        "127.0.0.1:2000".parse().unwrap(),
    );

    assert!(table.insert(first).is_ok());
    assert_eq!(table.insert(second), Err(InsertError::TableFull));
}

#[test]
fn test_table_remove_clears_all_indexes() {
    let table = ConnectionTable::new(64, 20);
    let cid = ConnectionId::random(20).unwrap();
    let entry = test_entry(cid, "127.0.0.1:1000".parse().unwrap());

    table.insert(Arc::clone(&entry)).unwrap();
    assert_eq!(table.len(), 1);

    table.remove(&entry);
    assert!(table.is_empty());

    let payload = short_header(cid.as_bytes());
    let tuple = entry.tuple();
    assert!(table.lookup(&payload, tuple).is_none());
}
