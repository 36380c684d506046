//! HPACK dynamic table.
//!
//! A size-bounded FIFO of header fields, newest entry first. Insertion and
//! eviction both touch only the ends of the deque, so each is O(1).

use crate::header_field::HeaderField;
use std::collections::VecDeque;

/// The dynamic part of the indexing table for one direction of a
/// connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicTable {
    entries: VecDeque<HeaderField>,
    current_size: usize,
    max_size: usize,
}

impl DynamicTable {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            current_size: 0,
            max_size,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of entry sizes currently held.
    pub fn current_size(&self) -> usize {
        self.current_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Entry by 0-based index relative to this table; 0 is the newest entry.
    pub fn get(&self, index: usize) -> Option<&HeaderField> {
        self.entries.get(index)
    }

    /// Reduce or raise the size bound, evicting oldest entries until the
    /// contents fit (RFC 7541 Section 4.3).
    pub fn set_max_size(&mut self, new_size: usize) {
        while self.current_size > new_size {
            self.evict_oldest();
        }
        self.max_size = new_size;
    }

    /// Insert a field at the newest end, evicting from the oldest end to
    /// make room.
    ///
    /// An entry larger than the entire table empties the table and is not
    /// inserted (RFC 7541 Section 4.4).
    pub fn add_header_field(&mut self, field: HeaderField) {
        let size = field.size();

        if size > self.max_size {
            self.entries.clear();
            self.current_size = 0;
            return;
        }

        while self.current_size + size > self.max_size {
            self.evict_oldest();
        }

        self.current_size += size;
        self.entries.push_front(field);
    }

    fn evict_oldest(&mut self) {
        if let Some(evicted) = self.entries.pop_back() {
            self.current_size -= evicted.size();
        }
    }
}
