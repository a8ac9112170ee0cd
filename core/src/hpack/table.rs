/*
 * table.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of hpack-engine, an HTTP/2 header compression engine.
 *
 * hpack-engine is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * hpack-engine is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with hpack-engine.  If not, see <http://www.gnu.org/licenses/>.
 */

//! Decoder header table: the static table followed by a size-bounded ring
//! of dynamic entries.
//!
//! Entries are appended at the tail and evicted from the head. Index 62 is
//! always the newest dynamic entry. Capacity of the ring tracks the number
//! of entries the agreed size could hold: it grows to at least double when
//! that exceeds capacity and shrinks when it falls under a third, so the
//! O(n) rebuild is amortised.

use tracing::debug;

use super::entry::{SharedEntry, ENTRY_OVERHEAD};
use super::static_table::{self, STATIC_TABLE_SIZE};
use crate::error::HpackError;

/// Table size both peers assume before any SETTINGS exchange.
pub const INITIAL_TABLE_SIZE: u32 = 4096;

const MIN_CAPACITY: usize = 16;

fn entries_for_bytes(bytes: u32) -> usize {
    (bytes as usize + ENTRY_OVERHEAD - 1) / ENTRY_OVERHEAD
}

/// Result of a key/value search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableMatch {
    pub index: u32,
    /// The value matched as well as the key.
    pub has_value: bool,
}

pub struct HeaderTable {
    ents: Vec<Option<SharedEntry>>,
    first_ent: usize,
    num_ents: usize,
    mem_used: usize,
    /// Hard ceiling from our SETTINGS_HEADER_TABLE_SIZE.
    max_bytes: u32,
    /// Size last agreed through a dynamic table size update.
    current_table_bytes: u32,
    max_entries: usize,
}

impl HeaderTable {
    pub fn new(max_bytes: u32) -> Self {
        let max_entries = entries_for_bytes(max_bytes);
        let cap = max_entries.max(MIN_CAPACITY);
        Self {
            ents: vec![None; cap],
            first_ent: 0,
            num_ents: 0,
            mem_used: 0,
            max_bytes,
            current_table_bytes: max_bytes,
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.num_ents
    }

    pub fn is_empty(&self) -> bool {
        self.num_ents == 0
    }

    pub fn mem_used(&self) -> usize {
        self.mem_used
    }

    pub fn max_bytes(&self) -> u32 {
        self.max_bytes
    }

    pub fn current_table_bytes(&self) -> u32 {
        self.current_table_bytes
    }

    /// Allocated ring slots.
    pub fn capacity(&self) -> usize {
        self.ents.len()
    }

    /// Change the hard ceiling. Lowering it below the agreed size also
    /// lowers the agreed size, evicting as needed.
    pub fn set_max_bytes(&mut self, max_bytes: u32) {
        if self.max_bytes == max_bytes {
            return;
        }
        debug!(max_bytes, "update hpack parser max size");
        self.max_bytes = max_bytes;
        if self.current_table_bytes > max_bytes {
            self.evict_to(max_bytes as usize);
            self.current_table_bytes = max_bytes;
            if let Err(e) = self.fit_capacity() {
                debug!(error = %e, "keeping larger table ring");
            }
        }
    }

    /// Apply a dynamic table size update received from the peer.
    pub fn set_current_table_size(&mut self, bytes: u32) -> Result<(), HpackError> {
        if self.current_table_bytes == bytes {
            return Ok(());
        }
        if bytes > self.max_bytes {
            return Err(HpackError::TableSizeExceedsMax {
                requested: bytes,
                max: self.max_bytes,
            });
        }
        debug!(bytes, "update hpack parser table size");
        self.evict_to(bytes as usize);
        self.current_table_bytes = bytes;
        self.fit_capacity()
    }

    /// Append `entry` at the tail, evicting from the head to make room.
    ///
    /// An entry larger than the whole table empties the table and is not
    /// stored (RFC 7541 section 4.4); returns whether the entry was kept.
    pub fn add(&mut self, entry: SharedEntry) -> bool {
        debug_assert!(self.current_table_bytes <= self.max_bytes);
        let size = entry.conceptual_size();
        let budget = self.current_table_bytes as usize;
        if size > budget {
            while self.num_ents > 0 {
                self.evict_oldest();
            }
            return false;
        }
        while size > budget - self.mem_used {
            self.evict_oldest();
        }
        let cap = self.ents.len();
        self.ents[(self.first_ent + self.num_ents) % cap] = Some(entry);
        self.num_ents += 1;
        self.mem_used += size;
        true
    }

    /// Remove the oldest entry.
    pub fn evict_oldest(&mut self) -> Option<SharedEntry> {
        if self.num_ents == 0 {
            return None;
        }
        let entry = self.ents[self.first_ent].take()?;
        self.mem_used -= entry.conceptual_size();
        self.first_ent = (self.first_ent + 1) % self.ents.len();
        self.num_ents -= 1;
        Some(entry)
    }

    /// Entry at `index`: 1..=61 static, then dynamic newest first.
    pub fn lookup(&self, index: u32) -> Option<SharedEntry> {
        if index <= STATIC_TABLE_SIZE {
            return static_table::lookup(index).cloned();
        }
        let rel = (index - STATIC_TABLE_SIZE - 1) as usize;
        if rel >= self.num_ents {
            return None;
        }
        let offset = (self.num_ents - 1 - rel + self.first_ent) % self.ents.len();
        self.ents[offset].clone()
    }

    /// Search static then dynamic entries for `key`, preferring an exact value match.
    ///
    /// A linear scan for callers holding a table of their own, such as
    /// proxies re-encoding with a decoded table. `Encoder` does not use it;
    /// its cuckoo cache answers the same question without scanning.
    pub fn find(&self, key: &[u8], value: &[u8]) -> Option<TableMatch> {
        if let Some(index) = static_table::index_of(key, value) {
            return Some(TableMatch {
                index,
                has_value: true,
            });
        }
        let mut key_match = static_table::key_index(key).map(|index| TableMatch {
            index,
            has_value: false,
        });
        for (rel, entry) in self.iter().enumerate() {
            if &entry.key()[..] != key {
                continue;
            }
            let index = STATIC_TABLE_SIZE + 1 + rel as u32;
            if &entry.value()[..] == value {
                return Some(TableMatch {
                    index,
                    has_value: true,
                });
            }
            key_match.get_or_insert(TableMatch {
                index,
                has_value: false,
            });
        }
        key_match
    }

    /// Dynamic entries, newest first (index 62 upwards).
    pub fn iter(&self) -> impl Iterator<Item = &SharedEntry> + '_ {
        let cap = self.ents.len();
        (0..self.num_ents).filter_map(move |rel| {
            self.ents[(self.num_ents - 1 - rel + self.first_ent) % cap].as_ref()
        })
    }

    fn evict_to(&mut self, bytes: usize) {
        while self.mem_used > bytes {
            self.evict_oldest();
        }
    }

    fn fit_capacity(&mut self) -> Result<(), HpackError> {
        self.max_entries = entries_for_bytes(self.current_table_bytes);
        let cap = self.ents.len();
        if self.max_entries > cap {
            self.rebuild(self.max_entries.max(2 * cap))
        } else if self.max_entries < cap / 3 {
            let new_cap = self.max_entries.max(MIN_CAPACITY);
            if new_cap != cap {
                self.rebuild(new_cap)
            } else {
                Ok(())
            }
        } else {
            Ok(())
        }
    }

    fn rebuild(&mut self, new_cap: usize) -> Result<(), HpackError> {
        debug_assert!(self.num_ents <= new_cap);
        let mut ents: Vec<Option<SharedEntry>> = Vec::new();
        ents.try_reserve_exact(new_cap)
            .map_err(|_| HpackError::TableAllocation)?;
        let cap = self.ents.len();
        for i in 0..self.num_ents {
            ents.push(self.ents[(self.first_ent + i) % cap].take());
        }
        ents.resize(new_cap, None);
        debug!(from = cap, to = new_cap, "rebuilt hpack table ring");
        self.ents = ents;
        self.first_ent = 0;
        Ok(())
    }
}

impl Default for HeaderTable {
    fn default() -> Self {
        Self::new(INITIAL_TABLE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hpack::entry::HeaderEntry;

    fn entry(k: &str, v: &str) -> SharedEntry {
        SharedEntry::new(HeaderEntry::new(k.to_owned(), v.to_owned()))
    }

    fn check_invariants(t: &HeaderTable) {
        assert!(t.mem_used() <= t.current_table_bytes() as usize);
        assert!(t.current_table_bytes() <= t.max_bytes());
        assert!(t.len() <= t.capacity());
        let sum: usize = t.iter().map(|e| e.conceptual_size()).sum();
        assert_eq!(sum, t.mem_used());
    }

    #[test]
    fn newest_entry_is_62() {
        let mut t = HeaderTable::default();
        t.add(entry("a", "1"));
        t.add(entry("b", "2"));
        assert_eq!(&t.lookup(62).unwrap().key()[..], b"b");
        assert_eq!(&t.lookup(63).unwrap().key()[..], b"a");
        assert!(t.lookup(64).is_none());
        check_invariants(&t);
    }

    #[test]
    fn static_lookup_unaffected_by_dynamic_entries() {
        let mut t = HeaderTable::new(256);
        for i in 0..50 {
            t.add(entry(":method", &format!("M{}", i)));
            let e = t.lookup(2).unwrap();
            assert_eq!((&e.key()[..], &e.value()[..]), (&b":method"[..], &b"GET"[..]));
        }
    }

    #[test]
    fn rfc7541_c5_eviction_sequence() {
        // C.5: responses with a 256-byte table
        let mut t = HeaderTable::new(256);
        t.add(entry(":status", "302"));
        t.add(entry("cache-control", "private"));
        t.add(entry("date", "Mon, 21 Oct 2013 20:13:21 GMT"));
        t.add(entry("location", "https://www.example.com"));
        assert_eq!(t.mem_used(), 222);
        t.add(entry(":status", "307"));
        assert_eq!(t.len(), 4);
        assert_eq!(t.mem_used(), 222);
        assert_eq!(&t.lookup(62).unwrap().value()[..], b"307");
        assert_eq!(&t.lookup(65).unwrap().key()[..], b"cache-control");
        check_invariants(&t);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut t = HeaderTable::new(200);
        let mut evicted = Vec::new();
        for i in 0..20 {
            let before: Vec<_> = t.iter().map(|e| e.value().clone()).collect();
            t.add(entry("k", &format!("{:03}", i)));
            let after: Vec<_> = t.iter().map(|e| e.value().clone()).collect();
            for v in before {
                if !after.contains(&v) {
                    evicted.push(v);
                }
            }
            check_invariants(&t);
        }
        let mut sorted = evicted.clone();
        sorted.sort();
        assert_eq!(evicted, sorted);
        assert!(!evicted.is_empty());
    }

    #[test]
    fn oversized_entry_clears_table() {
        let mut t = HeaderTable::new(100);
        t.add(entry("a", "b"));
        let big = "x".repeat(100);
        assert!(!t.add(entry("big", &big)));
        assert_eq!(t.len(), 0);
        assert_eq!(t.mem_used(), 0);
        assert!(t.add(entry("a", "b")));
    }

    #[test]
    fn size_update_above_max_fails() {
        let mut t = HeaderTable::new(4096);
        assert_eq!(
            t.set_current_table_size(8192),
            Err(HpackError::TableSizeExceedsMax {
                requested: 8192,
                max: 4096
            })
        );
        assert!(t.set_current_table_size(0).is_ok());
        assert_eq!(t.current_table_bytes(), 0);
    }

    #[test]
    fn shrinking_evicts_and_rebuilds() {
        let mut t = HeaderTable::new(4096);
        for i in 0..100 {
            t.add(entry("key", &format!("value-{}", i)));
        }
        assert_eq!(t.capacity(), 128);
        t.set_current_table_size(128).unwrap();
        assert!(t.mem_used() <= 128);
        assert_eq!(t.capacity(), 16);
        assert_eq!(&t.lookup(62).unwrap().value()[..], b"value-99");
        check_invariants(&t);
    }

    #[test]
    fn growing_doubles_capacity() {
        let mut t = HeaderTable::new(1024);
        t.add(entry("a", "b"));
        assert_eq!(t.capacity(), 32);
        t.set_max_bytes(8192);
        t.set_current_table_size(8192).unwrap();
        assert_eq!(t.capacity(), 256);
        t.set_current_table_size(4096).unwrap();
        // 128 is not under a third of 256
        assert_eq!(t.capacity(), 256);
        assert_eq!(&t.lookup(62).unwrap().key()[..], b"a");
    }

    #[test]
    fn lowering_ceiling_clamps_agreed_size() {
        let mut t = HeaderTable::new(4096);
        for i in 0..40 {
            t.add(entry("k", &format!("{:040}", i)));
        }
        t.set_max_bytes(200);
        assert_eq!(t.current_table_bytes(), 200);
        check_invariants(&t);
    }

    #[test]
    fn find_prefers_exact_match() {
        let mut t = HeaderTable::default();
        t.add(entry("x-user", "alice"));
        t.add(entry("x-user", "bob"));
        assert_eq!(
            t.find(b"x-user", b"alice"),
            Some(TableMatch { index: 63, has_value: true })
        );
        assert_eq!(
            t.find(b"x-user", b"carol"),
            Some(TableMatch { index: 62, has_value: false })
        );
        assert_eq!(
            t.find(b":method", b"POST"),
            Some(TableMatch { index: 3, has_value: true })
        );
        assert_eq!(
            t.find(b":method", b"PUT"),
            Some(TableMatch { index: 2, has_value: false })
        );
        assert_eq!(t.find(b"nope", b""), None);
    }
}
