//! QUIC packet header inspection.
//!
//! Extracts just enough of a datagram to route it: the header form and the
//! connection IDs. Everything past the SCID (token, length, packet number)
//! belongs to the transport layer and is never touched here.

use crate::demux::cid::MAX_CID_LEN;
use thiserror::Error;

/// Header form, from the high bit of the first byte (RFC 9000 Section 17).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderForm {
    /// `1...`: long header, used during connection establishment. Carries
    /// explicit DCID and SCID with length prefixes.
    Long,
    /// `0...`: short header. Carries only a DCID whose length is fixed by
    /// the receiving deployment.
    Short,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectError {
    #[error("datagram too short for a QUIC header")]
    Truncated,
    #[error("connection id length {0} exceeds 20 bytes")]
    InvalidCidLength(usize),
}

/// Borrowed view of one datagram's routing fields. No bytes are copied;
/// the slices point into the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inspection<'a> {
    pub form: HeaderForm,
    pub dcid: &'a [u8],
    /// Source CID; long headers only.
    pub scid: Option<&'a [u8]>,
}

/// Inspect the head of a UDP payload.
///
/// Long header layout: `first(1) | version(4) | dcid_len(1) | dcid |
/// scid_len(1) | scid | ...`. Short header layout: `first(1) |
/// dcid(short_dcid_len) | ...`. Length fields are bounded against both the
/// 20-byte CID maximum and the actual payload length before any slice is
/// taken.
pub fn inspect(payload: &[u8], short_dcid_len: usize) -> Result<Inspection<'_>, InspectError> {
    let first = *payload.first().ok_or(InspectError::Truncated)?;

    if first & 0x80 == 0 {
        let end = 1 + short_dcid_len;
        if payload.len() < end {
            return Err(InspectError::Truncated);
        }
        return Ok(Inspection {
            form: HeaderForm::Short,
            dcid: &payload[1..end],
            scid: None,
        });
    }

    // first(1) + version(4) + dcid_len(1)
    if payload.len() < 6 {
        return Err(InspectError::Truncated);
    }

    let dcid_len = payload[5] as usize;
    if dcid_len > MAX_CID_LEN {
        return Err(InspectError::InvalidCidLength(dcid_len));
    }
    let dcid_end = 6 + dcid_len;
    if payload.len() < dcid_end + 1 {
        return Err(InspectError::Truncated);
    }

    let scid_len = payload[dcid_end] as usize;
    if scid_len > MAX_CID_LEN {
        return Err(InspectError::InvalidCidLength(scid_len));
    }
    let scid_end = dcid_end + 1 + scid_len;
    if payload.len() < scid_end {
        return Err(InspectError::Truncated);
    }

    Ok(Inspection {
        form: HeaderForm::Long,
        dcid: &payload[6..dcid_end],
        scid: Some(&payload[dcid_end + 1..scid_end]),
    })
}
