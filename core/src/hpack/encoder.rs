/*
 * encoder.rs
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

//! Header block compression.
//!
//! The encoder never holds the peer's table itself. It replays the peer's
//! eviction arithmetic in a [`RemoteTable`] and remembers recently indexed
//! entries in a [`CuckooCache`]; a [`PopularityFilter`] decides which
//! literals are worth asking the peer to index.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use super::cuckoo::{CacheLookup, CuckooCache, HeaderHash, RemoteTable};
use super::entry::{HeaderEntry, SharedEntry};
use super::filter::PopularityFilter;
use super::static_table;
use super::table::INITIAL_TABLE_SIZE;
use super::timeout::{self, TIMEOUT_KEY};
use super::value::{wire_entry_size, ValueOptions, WireString};
use super::varint::Varint;
use crate::error::HpackError;
use crate::h2::{
    EncodeStats, FrameEmitter, DEFAULT_MAX_FRAME_SIZE, ERROR_FRAME_SIZE_ERROR, MAX_MAX_FRAME_SIZE, MIN_MAX_FRAME_SIZE,
};

/// Framing parameters for one header block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    pub stream_id: u32,
    /// Set END_STREAM on the HEADERS frame.
    pub is_eof: bool,
    /// Peer's SETTINGS_MAX_FRAME_SIZE; must lie in 16384..=16777215.
    pub max_frame_size: usize,
    pub use_true_binary_metadata: bool,
}

impl EncodeOptions {
    pub fn new(stream_id: u32) -> Self {
        Self {
            stream_id,
            ..Self::default()
        }
    }
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            stream_id: 1,
            is_eof: false,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            use_true_binary_metadata: false,
        }
    }
}

/// An ordered header list plus an optional deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBatch {
    headers: Vec<HeaderEntry>,
    timeout: Option<Duration>,
}

impl HeaderBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> &mut Self {
        self.headers.push(HeaderEntry::new(key, value));
        self
    }

    pub fn push_entry(&mut self, entry: HeaderEntry) -> &mut Self {
        self.headers.push(entry);
        self
    }

    /// Deadline sent as a trailing `grpc-timeout` header.
    pub fn set_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn headers(&self) -> &[HeaderEntry] {
        &self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.timeout.is_none()
    }

    fn validate(&self) -> Result<(), HpackError> {
        let mut seen_regular = false;
        for h in &self.headers {
            if h.key().is_empty() {
                return Err(HpackError::EmptyKey);
            }
            if h.is_pseudo() {
                if seen_regular {
                    return Err(HpackError::PseudoHeaderAfterRegular);
                }
            } else {
                seen_regular = true;
            }
        }
        Ok(())
    }
}

impl FromIterator<HeaderEntry> for HeaderBatch {
    fn from_iter<I: IntoIterator<Item = HeaderEntry>>(iter: I) -> Self {
        Self {
            headers: iter.into_iter().collect(),
            timeout: None,
        }
    }
}

impl Extend<HeaderEntry> for HeaderBatch {
    fn extend<I: IntoIterator<Item = HeaderEntry>>(&mut self, iter: I) {
        self.headers.extend(iter);
    }
}

pub struct Encoder {
    filter: PopularityFilter,
    cache: CuckooCache,
    remote: RemoteTable,
    /// Smallest table size chosen since the last advertisement, if any.
    pending_size_update: Option<u32>,
    huffman: bool,
}

impl Encoder {
    /// Encoder for a peer using the protocol's initial table size.
    pub fn new() -> Self {
        Self {
            filter: PopularityFilter::new(),
            cache: CuckooCache::new(),
            remote: RemoteTable::new(INITIAL_TABLE_SIZE),
            pending_size_update: None,
            huffman: true,
        }
    }

    /// Huffman-code non-binary strings when shorter (default on).
    pub fn set_huffman(&mut self, huffman: bool) {
        self.huffman = huffman;
    }

    pub fn max_table_size(&self) -> u32 {
        self.remote.max_table_size()
    }

    pub fn remote_table(&self) -> &RemoteTable {
        &self.remote
    }

    /// The peer's SETTINGS_HEADER_TABLE_SIZE.
    pub fn set_max_usable_size(&mut self, max_usable_size: u32) {
        if self.remote.set_max_usable_size(max_usable_size) {
            self.note_size_change();
        }
    }

    /// Pick the table size to use, at most the peer's usable size.
    pub fn set_max_table_size(&mut self, max_table_size: u32) {
        if self.remote.set_max_table_size(max_table_size) {
            self.note_size_change();
        }
    }

    fn note_size_change(&mut self) {
        let size = self.remote.max_table_size();
        debug!(size, "hpack encoder will advertise table size");
        self.pending_size_update = Some(self.pending_size_update.map_or(size, |s| s.min(size)));
    }

    /// Encode `batch` as a HEADERS frame plus any CONTINUATION frames,
    /// appending them to `out`.
    ///
    /// An invalid batch or frame size is rejected before any encoder state
    /// changes.
    pub fn encode_header_batch(
        &mut self,
        batch: &HeaderBatch,
        options: &EncodeOptions,
        out: &mut BytesMut,
    ) -> Result<EncodeStats, HpackError> {
        if !(MIN_MAX_FRAME_SIZE..=MAX_MAX_FRAME_SIZE).contains(&options.max_frame_size) {
            return Err(HpackError::frame(
                ERROR_FRAME_SIZE_ERROR,
                format!("max frame size {} out of range", options.max_frame_size),
            ));
        }
        batch.validate()?;
        let value_opts = ValueOptions {
            true_binary: options.use_true_binary_metadata,
            huffman: self.huffman,
        };
        let mut em = FrameEmitter::new(out, options.stream_id, options.max_frame_size, options.is_eof);
        if let Some(smallest) = self.pending_size_update.take() {
            let size = self.remote.max_table_size();
            if smallest < size {
                em.add_tiny(Varint::new(smallest, 3, 0x20).as_bytes());
            }
            em.add_tiny(Varint::new(size, 3, 0x20).as_bytes());
        }
        for entry in batch.headers() {
            self.encode_header(entry, value_opts, &mut em);
        }
        if let Some(deadline) = batch.timeout() {
            let entry = HeaderEntry::new(TIMEOUT_KEY, timeout::encode(deadline));
            self.encode_header(&entry, value_opts, &mut em);
        }
        let stats = em.finish();
        trace!(
            stream_id = options.stream_id,
            headers = batch.len(),
            header_bytes = stats.header_bytes,
            framing_bytes = stats.framing_bytes,
            "encoded header batch"
        );
        Ok(stats)
    }

    fn encode_header(&mut self, entry: &HeaderEntry, opts: ValueOptions, em: &mut FrameEmitter<'_>) {
        if let Some(index) = static_table::index_of(entry.key(), entry.value()) {
            trace!(index, "static indexed header");
            em.add_tiny(Varint::new(index, 1, 0x80).as_bytes());
            return;
        }
        let hash = HeaderHash::of(entry);
        let fragment = hash.filter_fragment();
        self.filter.increment(fragment);
        let name_index = match self.cache.lookup(entry, hash, &self.remote) {
            CacheLookup::Hit(index) => {
                let wire = self.remote.wire_index(index);
                trace!(index = wire, "dynamic indexed header");
                em.add_tiny(Varint::new(wire, 1, 0x80).as_bytes());
                return;
            }
            CacheLookup::KeyHit(index) => Some(self.remote.wire_index(index)),
            CacheLookup::Miss => static_table::key_index(entry.key()),
        };

        let value = WireString::value_of(entry, opts);
        let size = wire_entry_size(entry.key(), &value);
        let should_add = self.filter.should_index(fragment, size);
        let (prefix_bits, prefix_or) = if should_add { (2, 0x40) } else { (4, 0x00) };
        trace!(?name_index, should_add, size, "literal header");
        match name_index {
            Some(index) => em.add_tiny(Varint::new(index, prefix_bits, prefix_or).as_bytes()),
            None => {
                em.add_tiny(&[prefix_or]);
                emit_string(em, &WireString::text(entry.key(), opts));
            }
        }
        emit_string(em, &value);
        if should_add {
            self.cache.add(&SharedEntry::new(entry.clone()), hash, size, &mut self.remote);
        }
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

fn emit_string(em: &mut FrameEmitter<'_>, s: &WireString) {
    em.add_tiny(Varint::new(s.len() as u32, 1, s.huffman_prefix()).as_bytes());
    if s.insert_null() {
        em.add_tiny(&[0]);
    }
    em.add_header_data(s.data());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h2::FRAME_HEADER_LENGTH;

    fn payload(enc: &mut Encoder, batch: &HeaderBatch) -> Vec<u8> {
        let mut out = BytesMut::new();
        enc.encode_header_batch(batch, &EncodeOptions::default(), &mut out).unwrap();
        out[FRAME_HEADER_LENGTH..].to_vec()
    }

    #[test]
    fn static_pair_is_one_octet() {
        let mut enc = Encoder::new();
        let mut batch = HeaderBatch::new();
        batch.push(":method", "GET").push(":path", "/");
        assert_eq!(payload(&mut enc, &batch), vec![0x82, 0x84]);
        assert!(enc.remote_table().is_empty());
    }

    #[test]
    fn repeated_header_becomes_indexed() {
        let mut enc = Encoder::new();
        let mut batch = HeaderBatch::new();
        batch.push("custom-key", "custom-value");
        let first = payload(&mut enc, &batch);
        assert_eq!(first[0], 0x40);
        assert_eq!(enc.remote_table().len(), 1);
        assert_eq!(payload(&mut enc, &batch), vec![0xbe]);
    }

    #[test]
    fn key_hit_reuses_name() {
        let mut enc = Encoder::new();
        let mut batch = HeaderBatch::new();
        batch.push("custom-key", "a");
        payload(&mut enc, &batch);
        let mut batch = HeaderBatch::new();
        batch.push("custom-key", "b");
        assert_eq!(payload(&mut enc, &batch), vec![0x7e, 0x01, b'b']);
    }

    #[test]
    fn static_name_used_for_literal() {
        let mut enc = Encoder::new();
        enc.set_huffman(false);
        let mut batch = HeaderBatch::new();
        batch.push("content-type", "x");
        // content-type is static index 31
        assert_eq!(payload(&mut enc, &batch), vec![0x40 | 31, 0x01, b'x']);
    }

    #[test]
    fn size_update_advertised_once() {
        let mut enc = Encoder::new();
        enc.set_max_table_size(1024);
        let batch: HeaderBatch = [HeaderEntry::new(":method", "GET")].into_iter().collect();
        // 001 + 5-bit varint 1024: 0x3f then 1024 - 31 = 993
        assert_eq!(payload(&mut enc, &batch), vec![0x3f, 0xe1, 0x07, 0x82]);
        assert_eq!(payload(&mut enc, &batch), vec![0x82]);
    }

    #[test]
    fn shrink_then_grow_advertises_minimum_first() {
        let mut enc = Encoder::new();
        enc.set_max_table_size(0);
        enc.set_max_table_size(4096);
        let batch = HeaderBatch::new();
        assert_eq!(payload(&mut enc, &batch), vec![0x20, 0x3f, 0xe1, 0x1f]);
    }

    #[test]
    fn usable_size_caps_table() {
        let mut enc = Encoder::new();
        enc.set_max_table_size(8192);
        assert_eq!(enc.max_table_size(), 4096);
        enc.set_max_usable_size(100);
        assert_eq!(enc.max_table_size(), 100);
    }

    #[test]
    fn invalid_batches_leave_output_untouched() {
        let mut enc = Encoder::new();
        let mut out = BytesMut::new();
        let mut batch = HeaderBatch::new();
        batch.push("", "v");
        assert_eq!(
            enc.encode_header_batch(&batch, &EncodeOptions::default(), &mut out),
            Err(HpackError::EmptyKey)
        );
        let mut batch = HeaderBatch::new();
        batch.push("a", "b").push(":status", "200");
        assert_eq!(
            enc.encode_header_batch(&batch, &EncodeOptions::default(), &mut out),
            Err(HpackError::PseudoHeaderAfterRegular)
        );
        assert!(out.is_empty());
    }

    #[test]
    fn frame_size_out_of_range_rejected() {
        let mut enc = Encoder::new();
        enc.set_max_table_size(1024);
        let mut batch = HeaderBatch::new();
        batch.push("x-trace", "0123456789abcdef");
        let mut out = BytesMut::new();
        for size in [0, 1, 8, MIN_MAX_FRAME_SIZE - 1, MAX_MAX_FRAME_SIZE + 1] {
            let options = EncodeOptions {
                max_frame_size: size,
                ..EncodeOptions::default()
            };
            let err = enc.encode_header_batch(&batch, &options, &mut out).unwrap_err();
            assert_eq!(err.h2_error_code(), ERROR_FRAME_SIZE_ERROR);
        }
        assert!(out.is_empty());
        assert!(enc.remote_table().is_empty());

        // the pending size update survives the rejected calls
        let options = EncodeOptions {
            max_frame_size: MIN_MAX_FRAME_SIZE,
            ..EncodeOptions::default()
        };
        enc.encode_header_batch(&batch, &options, &mut out).unwrap();
        assert_eq!(out[FRAME_HEADER_LENGTH] & 0xe0, 0x20);
    }

    #[test]
    fn large_header_not_indexed() {
        let mut enc = Encoder::new();
        let mut batch = HeaderBatch::new();
        batch.push("big", vec![b'x'; 600]);
        payload(&mut enc, &batch);
        assert!(enc.remote_table().is_empty());
    }
}
