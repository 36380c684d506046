//! Stateless reset packets (RFC 9000 Section 10.3).
//!
//! Short-header traffic that matches no live connection must be answered
//! without consulting per-connection state, so the token is derived
//! deterministically from the packet's DCID and the deployment-wide server
//! id. The peer verifies the token against the set it received during the
//! handshake and tears the connection down.

use crate::demux::sender::OutboundPacket;
use bytes::{BufMut, BytesMut};
use siphasher::sip::SipHasher13;
use std::hash::Hasher;

pub const RESET_TOKEN_LEN: usize = 16;

/// Unpredictable-bits prefix preceding the token. 22 + 16 keeps the packet
/// under the size at which a peer could mistake it for a packet that needs
/// a reset in response.
const RANDOM_PREFIX_LEN: usize = 22;

/// 16-byte stateless reset token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatelessResetToken([u8; RESET_TOKEN_LEN]);

impl StatelessResetToken {
    /// Derive the token for `dcid`. Keyed SipHash-1-3 over the CID bytes,
    /// one pass per token half; same `(dcid, server_id)` always yields the
    /// same token.
    pub fn generate(dcid: &[u8], server_id: [u8; 8]) -> Self {
        let key = u64::from_be_bytes(server_id);
        let mut token = [0u8; RESET_TOKEN_LEN];

        for (half, chunk) in token.chunks_exact_mut(8).enumerate() {
            let mut hasher = SipHasher13::new_with_keys(key, half as u64 + 1);
            hasher.write(dcid);
            chunk.copy_from_slice(&hasher.finish().to_be_bytes());
        }

        Self(token)
    }

    pub fn as_bytes(&self) -> &[u8; RESET_TOKEN_LEN] {
        &self.0
    }
}

/// A stateless reset on the wire: random bytes shaped like a short-header
/// packet, then the token.
pub struct StatelessResetPacket {
    random: [u8; RANDOM_PREFIX_LEN],
    token: StatelessResetToken,
}

impl StatelessResetPacket {
    pub fn new(token: StatelessResetToken) -> Result<Self, getrandom::Error> {
        let mut random = [0u8; RANDOM_PREFIX_LEN];
        getrandom::getrandom(&mut random)?;

        // First byte must parse as a short header: high bit clear, fixed
        // bit set.
        random[0] = (random[0] & 0x3F) | 0x40;

        Ok(Self { random, token })
    }

    pub fn len(&self) -> usize {
        RANDOM_PREFIX_LEN + RESET_TOKEN_LEN
    }
}

impl OutboundPacket for StatelessResetPacket {
    fn store(&self, buf: &mut BytesMut) {
        buf.put_slice(&self.random);
        buf.put_slice(self.token.as_bytes());
    }
}
