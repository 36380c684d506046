//! Connection table: locally-issued CID to live connection entries.
//!
//! Workers call `lookup` concurrently with one another and with at most
//! one `insert` or `remove` at a time; a reader-writer lock over the
//! indexes satisfies that contract.

use crate::demux::cid::ConnectionId;
use crate::demux::connection::{ConnectionEntry, FiveTuple};
use crate::demux::packet;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    /// The locally-issued CID already maps to a live entry. CIDs are drawn
    /// from a 160-bit random space, so this indicates a bug upstream.
    #[error("connection id already present in table")]
    DuplicateCid,
    #[error("connection table is full")]
    TableFull,
}

#[derive(Default)]
struct Indexes {
    /// Primary index: locally-issued CID, plus the client's original DCID
    /// as an alias so handshake continuation packets keep matching before
    /// the peer adopts our CID.
    by_cid: HashMap<ConnectionId, Arc<ConnectionEntry>>,
    /// Every entry exactly once; also the fallback for short-header
    /// packets in zero-length-CID deployments.
    by_tuple: HashMap<FiveTuple, Arc<ConnectionEntry>>,
}

pub struct ConnectionTable {
    inner: RwLock<Indexes>,
    capacity: usize,
    short_dcid_len: usize,
}

impl ConnectionTable {
    pub fn new(capacity: usize, short_dcid_len: usize) -> Self {
        Self {
            inner: RwLock::new(Indexes::default()),
            capacity,
            short_dcid_len,
        }
    }

    /// Look up the entry owning a datagram. Probes by DCID first; only a
    /// zero-length DCID falls back to the 5-tuple.
    pub fn lookup(&self, payload: &[u8], tuple: FiveTuple) -> Option<Arc<ConnectionEntry>> {
        let inspection = packet::inspect(payload, self.short_dcid_len).ok()?;
        let indexes = self.read();

        if !inspection.dcid.is_empty() {
            let cid = ConnectionId::from_slice(inspection.dcid)?;
            return indexes.by_cid.get(&cid).cloned();
        }

        indexes.by_tuple.get(&tuple).cloned()
    }

    /// Register an entry under its locally-issued CID, its original DCID,
    /// and its tuple.
    pub fn insert(&self, entry: Arc<ConnectionEntry>) -> Result<(), InsertError> {
        let mut indexes = self.write();

        if indexes.by_tuple.len() >= self.capacity {
            return Err(InsertError::TableFull);
        }

        let local_cid = *entry.local_cid();
        if !local_cid.is_empty() {
            if indexes.by_cid.contains_key(&local_cid) {
                return Err(InsertError::DuplicateCid);
            }
            indexes.by_cid.insert(local_cid, Arc::clone(&entry));
        }

        let original_dcid = *entry.original_dcid();
        if !original_dcid.is_empty() && original_dcid != local_cid {
            // Alias only while vacant: a colliding client-chosen DCID must
            // not displace a live connection.
            indexes
                .by_cid
                .entry(original_dcid)
                .or_insert_with(|| Arc::clone(&entry));
        }

        indexes.by_tuple.insert(entry.tuple(), entry);
        Ok(())
    }

    /// Drop an entry from every index. Called by the reaper only.
    pub fn remove(&self, entry: &ConnectionEntry) {
        let mut indexes = self.write();

        for cid in [entry.local_cid(), entry.original_dcid()] {
            if !cid.is_empty() {
                if let Some(found) = indexes.by_cid.get(cid) {
                    if std::ptr::eq(found.as_ref(), entry) {
                        indexes.by_cid.remove(cid);
                    }
                }
            }
        }

        if let Some(found) = indexes.by_tuple.get(&entry.tuple()) {
            if std::ptr::eq(found.as_ref(), entry) {
                indexes.by_tuple.remove(&entry.tuple());
            }
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.read().by_tuple.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Indexes> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Indexes> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
