//! Outbound datagram path.

use bytes::BytesMut;
use std::net::{SocketAddr, UdpSocket};
use tracing::{trace, warn};

/// A packet that can serialize itself into a caller-provided buffer.
pub trait OutboundPacket {
    fn store(&self, buf: &mut BytesMut);
}

/// Wrap `packet` in a UDP datagram targeted at `remote` and submit it.
///
/// The I/O buffer is sized by `pmtu` and owned by this call; the caller
/// retains nothing after it returns. Submission is fire-and-forget: send
/// errors are logged, never propagated.
pub fn send_packet(
    packet: &impl OutboundPacket,
    socket: &UdpSocket,
    remote: SocketAddr,
    pmtu: usize,
) {
    let mut buf = BytesMut::with_capacity(pmtu);
    packet.store(&mut buf);

    match socket.send_to(&buf, remote) {
        Ok(sent) if sent < buf.len() => {
            warn!(sent, len = buf.len(), to = %remote, "short datagram send");
        }
        Ok(_) => {
            trace!(len = buf.len(), to = %remote, "sent packet");
        }
        Err(e) => {
            warn!(error = %e, to = %remote, "datagram send failed");
        }
    }
}
