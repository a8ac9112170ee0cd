/*
 * cuckoo.rs
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

//! Encoder-side belief about the peer's dynamic table.
//!
//! `RemoteTable` replays the decoder's eviction arithmetic using entry
//! sizes only. Every entry the encoder tells the peer to index gets a
//! monotonically increasing insertion index; an entry is still resident
//! while its index is greater than `tail_remote_index`.
//!
//! `CuckooCache` remembers, per two 8-bit hash slots, which full entries
//! and which keys were inserted last and under which insertion index. A
//! slot may be overwritten while the peer still holds the entry (costing a
//! retransmission), but a reported hit always refers to a live entry.

use bytes::Bytes;
use tracing::debug;

use super::entry::{HeaderEntry, SharedEntry, ENTRY_OVERHEAD};
use super::static_table::STATIC_TABLE_SIZE;

/// Slots per cuckoo table.
pub const NUM_VALUES: usize = 256;

const MIN_CAPACITY: usize = 16;

/// 32-bit FNV-1a followed by the murmur3 finaliser so every byte of the
/// result is usable as an independent fragment.
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for &b in bytes {
        h ^= b as u32;
        h = h.wrapping_mul(0x0100_0193);
    }
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^ (h >> 16)
}

/// Hashes of a header's key alone and of key plus value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderHash {
    pub key: u32,
    pub elem: u32,
}

impl HeaderHash {
    pub fn of(entry: &HeaderEntry) -> Self {
        let key = hash_bytes(entry.key());
        let value = hash_bytes(entry.value());
        Self {
            key,
            elem: key.rotate_left(2) ^ value,
        }
    }

    /// Fragment feeding the popularity filter.
    pub fn filter_fragment(&self) -> u8 {
        self.elem as u8
    }
}

fn slots(hash: u32) -> [usize; 2] {
    [((hash >> 8) & 0xff) as usize, ((hash >> 16) & 0xff) as usize]
}

fn elems_for_bytes(bytes: u32) -> usize {
    (bytes as usize + ENTRY_OVERHEAD - 1) / ENTRY_OVERHEAD
}

/// Size-only replay of the peer decoder's dynamic table.
pub struct RemoteTable {
    /// Insertion index of the most recently evicted entry.
    tail_remote_index: u64,
    table_elems: usize,
    table_size: usize,
    max_table_size: u32,
    /// Ceiling the peer allows (its SETTINGS_HEADER_TABLE_SIZE).
    max_usable_size: u32,
    /// Conceptual sizes, slot `index % len`.
    elem_sizes: Vec<usize>,
}

impl RemoteTable {
    pub fn new(table_size: u32) -> Self {
        Self {
            tail_remote_index: 0,
            table_elems: 0,
            table_size: 0,
            max_table_size: table_size,
            max_usable_size: table_size,
            elem_sizes: vec![0; elems_for_bytes(table_size).max(MIN_CAPACITY)],
        }
    }

    pub fn tail_remote_index(&self) -> u64 {
        self.tail_remote_index
    }

    pub fn len(&self) -> usize {
        self.table_elems
    }

    pub fn is_empty(&self) -> bool {
        self.table_elems == 0
    }

    pub fn table_size(&self) -> usize {
        self.table_size
    }

    pub fn max_table_size(&self) -> u32 {
        self.max_table_size
    }

    pub fn max_usable_size(&self) -> u32 {
        self.max_usable_size
    }

    pub fn capacity(&self) -> usize {
        self.elem_sizes.len()
    }

    /// Entry inserted under `index` has not been evicted yet.
    pub fn is_live(&self, index: u64) -> bool {
        index > self.tail_remote_index && index <= self.tail_remote_index + self.table_elems as u64
    }

    /// Wire index (62 = newest) for a live insertion index.
    pub fn wire_index(&self, index: u64) -> u32 {
        (STATIC_TABLE_SIZE as u64 + 1 + self.tail_remote_index + self.table_elems as u64 - index) as u32
    }

    fn evict_one(&mut self) {
        self.tail_remote_index += 1;
        let cap = self.elem_sizes.len();
        let size = self.elem_sizes[(self.tail_remote_index % cap as u64) as usize];
        debug_assert!(self.table_elems > 0 && self.table_size >= size);
        self.table_size -= size;
        self.table_elems -= 1;
    }

    /// Reserve room for an entry the peer is about to index, evicting
    /// exactly as the peer will. Returns the new insertion index, or `None`
    /// when the entry is larger than the table (which the peer empties).
    pub fn prepare_space(&mut self, elem_size: usize) -> Option<u64> {
        if elem_size > self.max_table_size as usize {
            while self.table_elems > 0 {
                self.evict_one();
            }
            return None;
        }
        while self.table_size + elem_size > self.max_table_size as usize {
            self.evict_one();
        }
        let new_index = self.tail_remote_index + self.table_elems as u64 + 1;
        let cap = self.elem_sizes.len();
        self.elem_sizes[(new_index % cap as u64) as usize] = elem_size;
        self.table_size += elem_size;
        self.table_elems += 1;
        Some(new_index)
    }

    /// Peer's advertised ceiling changed. Returns whether the table size changed.
    pub fn set_max_usable_size(&mut self, max_usable_size: u32) -> bool {
        self.max_usable_size = max_usable_size;
        self.set_max_table_size(self.max_table_size.min(max_usable_size))
    }

    /// Choose a new table size, capped by the usable size. Returns whether it changed.
    pub fn set_max_table_size(&mut self, max_table_size: u32) -> bool {
        let max_table_size = max_table_size.min(self.max_usable_size);
        if max_table_size == self.max_table_size {
            return false;
        }
        while self.table_size > max_table_size as usize {
            self.evict_one();
        }
        self.max_table_size = max_table_size;
        let needed = elems_for_bytes(max_table_size);
        let cap = self.elem_sizes.len();
        if needed > cap {
            self.rebuild(needed.max(2 * cap));
        } else if needed < cap / 3 {
            let new_cap = needed.max(MIN_CAPACITY);
            if new_cap != cap {
                self.rebuild(new_cap);
            }
        }
        debug!(max_table_size, "set hpack compressor table size");
        true
    }

    fn rebuild(&mut self, new_cap: usize) {
        debug_assert!(self.table_elems <= new_cap);
        let old_cap = self.elem_sizes.len() as u64;
        let mut sizes = vec![0; new_cap];
        for i in 0..self.table_elems as u64 {
            let index = self.tail_remote_index + i + 1;
            sizes[(index % new_cap as u64) as usize] = self.elem_sizes[(index % old_cap) as usize];
        }
        self.elem_sizes = sizes;
    }
}

/// Two-choice slot table: each value hashes to two candidate slots.
struct SlotTable<T> {
    entries: Vec<Option<T>>,
    indices: Vec<u64>,
}

impl<T: Clone> SlotTable<T> {
    fn new() -> Self {
        Self {
            entries: vec![None; NUM_VALUES],
            indices: vec![0; NUM_VALUES],
        }
    }

    fn lookup(&self, hash: u32, remote: &RemoteTable, matches: impl Fn(&T) -> bool) -> Option<u64> {
        slots(hash).into_iter().find_map(|slot| match &self.entries[slot] {
            Some(v) if matches(v) && remote.is_live(self.indices[slot]) => Some(self.indices[slot]),
            _ => None,
        })
    }

    /// Record `value` under `new_index`: refresh a slot already holding it,
    /// else take an empty slot, else replace the older of the two.
    fn insert(&mut self, hash: u32, value: &T, new_index: u64, matches: impl Fn(&T) -> bool) {
        let [a, b] = slots(hash);
        let slot = if self.entries[a].as_ref().is_some_and(&matches) {
            a
        } else if self.entries[b].as_ref().is_some_and(&matches) {
            b
        } else if self.entries[a].is_none() {
            a
        } else if self.entries[b].is_none() {
            b
        } else if self.indices[a] < self.indices[b] {
            a
        } else {
            b
        };
        if !self.entries[slot].as_ref().is_some_and(&matches) {
            self.entries[slot] = Some(value.clone());
        }
        self.indices[slot] = new_index;
    }
}

/// Outcome of a cache lookup for one header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    /// Whole entry resident at this insertion index.
    Hit(u64),
    /// Only the key is resident at this insertion index.
    KeyHit(u64),
    Miss,
}

pub struct CuckooCache {
    elems: SlotTable<SharedEntry>,
    keys: SlotTable<Bytes>,
}

impl CuckooCache {
    pub fn new() -> Self {
        Self {
            elems: SlotTable::new(),
            keys: SlotTable::new(),
        }
    }

    pub fn lookup(&self, entry: &HeaderEntry, hash: HeaderHash, remote: &RemoteTable) -> CacheLookup {
        if let Some(index) = self.elems.lookup(hash.elem, remote, |e| **e == *entry) {
            return CacheLookup::Hit(index);
        }
        if let Some(index) = self.keys.lookup(hash.key, remote, |k| k == entry.key()) {
            return CacheLookup::KeyHit(index);
        }
        CacheLookup::Miss
    }

    /// Account for the peer indexing `entry`, charged `elem_size` bytes,
    /// and remember where it went.
    pub fn add(&mut self, entry: &SharedEntry, hash: HeaderHash, elem_size: usize, remote: &mut RemoteTable) {
        let new_index = match remote.prepare_space(elem_size) {
            Some(i) => i,
            None => return,
        };
        self.elems.insert(hash.elem, entry, new_index, |e| **e == **entry);
        self.keys.insert(hash.key, entry.key(), new_index, |k| k == entry.key());
    }
}

impl Default for CuckooCache {
    fn default() -> Self {
        Self::new()
    }
}
