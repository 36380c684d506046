//! Acceptor socket setup.
//!
//! Each acceptor thread owns exactly one blocking UDP socket. With
//! `reuse_port` enabled, several acceptors (or several muxd processes)
//! bind the same port and the kernel hashes flows between them; a
//! connection table only ever sees flows from its own socket, so no
//! cross-acceptor synchronization is needed.

use crate::config::NetworkConfig;
use anyhow::{Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, UdpSocket};

/// Bind the acceptor's UDP socket with the configured options applied.
pub fn bind_acceptor_socket(bind_addr: SocketAddr, config: &NetworkConfig) -> Result<UdpSocket> {
    let socket = Socket::new(
        Domain::for_address(bind_addr),
        Type::DGRAM,
        Some(Protocol::UDP),
    )
    .context("allocating acceptor socket")?;

    socket
        .set_reuse_address(true)
        .context("enabling address reuse")?;

    if config.reuse_port {
        enable_port_sharing(&socket)?;
    }

    // The acceptor stops reading for up to one reaper tick at a time; the
    // kernel receive buffer is what absorbs traffic in that window.
    if let Some(bytes) = config.socket_recv_buffer_size {
        socket
            .set_recv_buffer_size(bytes)
            .with_context(|| format!("sizing receive buffer to {} bytes", bytes))?;
    }
    if let Some(bytes) = config.socket_send_buffer_size {
        socket
            .set_send_buffer_size(bytes)
            .with_context(|| format!("sizing send buffer to {} bytes", bytes))?;
    }

    // A wildcard v6 bind should also carry v4-mapped peers; a concrete v6
    // address stays v6-only so a sibling v4 acceptor can coexist.
    if let SocketAddr::V6(v6) = bind_addr {
        socket
            .set_only_v6(!v6.ip().is_unspecified())
            .context("scoping IPv6 socket")?;
    }

    socket
        .bind(&bind_addr.into())
        .with_context(|| format!("binding {}", bind_addr))?;

    Ok(socket.into())
}

#[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
fn enable_port_sharing(socket: &Socket) -> Result<()> {
    socket
        .set_reuse_port(true)
        .context("enabling port sharing")
}

#[cfg(not(all(unix, not(any(target_os = "solaris", target_os = "illumos")))))]
fn enable_port_sharing(_socket: &Socket) -> Result<()> {
    tracing::warn!("reuse_port configured but SO_REUSEPORT is unavailable here; binding anyway");
    Ok(())
}
