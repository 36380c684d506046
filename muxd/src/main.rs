use anyhow::Context;
use muxd::config;
use muxd::demux::{self, ConnectionId, ConnectionSink};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, trace};

/// Stand-in for the transport layer: counts and traces the datagrams
/// delivered to each connection.
struct TraceSink {
    cid: ConnectionId,
    datagrams: u64,
}

impl ConnectionSink for TraceSink {
    fn on_datagram(&mut self, datagram: &[u8], peer: SocketAddr) {
        self.datagrams += 1;
        trace!(
            cid = %self.cid,
            bytes = datagram.len(),
            from = %peer,
            total = self.datagrams,
            "datagram delivered"
        );
    }
}

fn main() -> anyhow::Result<()> {
    let config = config::load_config()?;
    muxd::telemetry::init_logging()?;

    info!(?config, "configuration loaded");

    let bind_addr: SocketAddr = format!("{}:{}", config.network.host, config.network.port)
        .parse()
        .with_context(|| "invalid bind address")?;

    let socket = demux::socket::bind_acceptor_socket(bind_addr, &config.network)?;

    let handle = demux::spawn(
        socket,
        &config.demux,
        Arc::new(|cid: &ConnectionId| {
            Box::new(TraceSink {
                cid: *cid,
                datagrams: 0,
            }) as Box<dyn ConnectionSink>
        }),
    )?;

    info!(
        %bind_addr,
        workers = config.demux.workers,
        "demultiplexer running"
    );

    // The data plane runs on native threads; this runtime exists only to
    // wait for the shutdown signal.
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(tokio::signal::ctrl_c())
        .context("failed to wait for Ctrl+C")?;

    info!("shutdown signal received");
    handle.shutdown();

    Ok(())
}
