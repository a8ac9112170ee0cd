/*
 * decoder.rs
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

//! Header block decompression.
//!
//! Blocks may arrive in arbitrary fragments. Each field is parsed only
//! once all of its octets are present and is applied as a unit, so a
//! fragment boundary never leaves the table half updated. Headers are
//! handed to the caller as soon as their field completes.

use bytes::{Buf, Bytes, BytesMut};
use tracing::{trace, warn};

use super::entry::{HeaderEntry, SharedEntry};
use super::huffman;
use super::table::HeaderTable;
use super::value::decode_binary_value;
use super::varint::decode_varint;
use crate::error::HpackError;
use crate::h2::ERROR_ENHANCE_YOUR_CALM;

/// Receives decoded headers in block order.
pub trait HeaderHandler {
    fn header(&mut self, header: HeaderEntry);
}

impl<F: FnMut(HeaderEntry)> HeaderHandler for F {
    fn header(&mut self, header: HeaderEntry) {
        self(header)
    }
}

const MAX_SIZE_UPDATES: u8 = 2;

/// Default ceiling on the octets held for one incomplete field.
pub const DEFAULT_MAX_FIELD_SIZE: usize = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Indexing {
    Incremental,
    Without,
    Never,
}

/// Location of a string literal within the input.
#[derive(Debug, Clone, Copy)]
struct StringRef {
    start: usize,
    len: usize,
    huffman: bool,
}

impl StringRef {
    fn resolve(&self, input: &Bytes) -> Result<Bytes, HpackError> {
        let raw = input.slice(self.start..self.start + self.len);
        if self.huffman {
            huffman::decode(&raw).map(Bytes::from)
        } else {
            Ok(raw)
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Name {
    Indexed(u32),
    Literal(StringRef),
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Indexed(u32),
    Literal {
        indexing: Indexing,
        name: Name,
        value: StringRef,
    },
    SizeUpdate(u32),
}

/// Length-prefixed string at `pos`; `None` if not all of it is present.
fn parse_string(input: &[u8], pos: usize) -> Result<Option<(StringRef, usize)>, HpackError> {
    let first = match input.get(pos) {
        Some(b) => *b,
        None => return Ok(None),
    };
    let (len, n) = match decode_varint(&input[pos..], 1)? {
        Some(v) => v,
        None => return Ok(None),
    };
    let start = pos + n;
    let len = len as usize;
    if input.len() - start < len {
        return Ok(None);
    }
    let s = StringRef {
        start,
        len,
        huffman: first & 0x80 != 0,
    };
    Ok(Some((s, start + len)))
}

/// Parse one complete field from the start of `input`.
fn parse_field(input: &[u8]) -> Result<Option<(Field, usize)>, HpackError> {
    let first = match input.first() {
        Some(b) => *b,
        None => return Ok(None),
    };
    let (prefix_bits, indexing) = if first & 0x80 != 0 {
        return Ok(decode_varint(input, 1)?.map(|(i, n)| (Field::Indexed(i), n)));
    } else if first & 0x40 != 0 {
        (2, Indexing::Incremental)
    } else if first & 0x20 != 0 {
        return Ok(decode_varint(input, 3)?.map(|(s, n)| (Field::SizeUpdate(s), n)));
    } else if first & 0x10 != 0 {
        (4, Indexing::Never)
    } else {
        (4, Indexing::Without)
    };
    let (name_index, mut pos) = match decode_varint(input, prefix_bits)? {
        Some(v) => v,
        None => return Ok(None),
    };
    let name = if name_index == 0 {
        match parse_string(input, pos)? {
            Some((s, next)) => {
                pos = next;
                Name::Literal(s)
            }
            None => return Ok(None),
        }
    } else {
        Name::Indexed(name_index)
    };
    Ok(parse_string(input, pos)?.map(|(value, next)| {
        (
            Field::Literal {
                indexing,
                name,
                value,
            },
            next,
        )
    }))
}

pub struct Decoder {
    table: HeaderTable,
    /// Octets of an incomplete field carried to the next fragment.
    pending: BytesMut,
    max_field_size: usize,
    in_block: bool,
    seen_field: bool,
    size_updates: u8,
    size_update_required: bool,
}

impl Decoder {
    pub fn new(max_table_size: u32) -> Self {
        Self {
            table: HeaderTable::new(max_table_size),
            pending: BytesMut::new(),
            max_field_size: DEFAULT_MAX_FIELD_SIZE,
            in_block: false,
            seen_field: false,
            size_updates: 0,
            size_update_required: false,
        }
    }

    pub fn table(&self) -> &HeaderTable {
        &self.table
    }

    /// Our SETTINGS_HEADER_TABLE_SIZE. Lowering it below the size in use
    /// obliges the peer to open its next block with a size update.
    pub fn set_max_table_size(&mut self, max_table_size: u32) {
        if max_table_size < self.table.current_table_bytes() {
            self.size_update_required = true;
        }
        self.table.set_max_bytes(max_table_size);
    }

    /// Largest incomplete field carried between fragments. A field still
    /// unfinished past this many octets fails the block.
    pub fn set_max_field_size(&mut self, max_field_size: usize) {
        self.max_field_size = max_field_size;
    }

    /// Whether a block is partially decoded.
    pub fn in_block(&self) -> bool {
        self.in_block
    }

    /// Decode a whole header block.
    pub fn decode_block(&mut self, block: &[u8], handler: &mut impl HeaderHandler) -> Result<(), HpackError> {
        self.decode_fragment(block, true, handler)
    }

    /// Decode one fragment of a header block. `end_of_block` marks the
    /// final fragment, after which no partial field may remain.
    pub fn decode_fragment(
        &mut self,
        fragment: &[u8],
        end_of_block: bool,
        handler: &mut impl HeaderHandler,
    ) -> Result<(), HpackError> {
        if !self.in_block {
            self.in_block = true;
            self.seen_field = false;
            self.size_updates = 0;
        }
        let result = self.decode_pending(fragment, end_of_block, handler);
        if result.is_err() || end_of_block {
            self.pending.clear();
            self.in_block = false;
        }
        result
    }

    fn decode_pending(
        &mut self,
        fragment: &[u8],
        end_of_block: bool,
        handler: &mut impl HeaderHandler,
    ) -> Result<(), HpackError> {
        self.pending.extend_from_slice(fragment);
        let mut input = self.pending.split().freeze();
        while let Some((field, consumed)) = parse_field(&input)? {
            self.apply(field, &input, handler)?;
            input.advance(consumed);
        }
        if end_of_block {
            if !input.is_empty() {
                warn!(remaining = input.len(), "header block ended mid-field");
                return Err(HpackError::TruncatedBlock);
            }
            if self.size_update_required {
                warn!("header block missing required table size update");
                return Err(HpackError::TableSizeUpdateRequired);
            }
        } else if input.len() > self.max_field_size {
            warn!(buffered = input.len(), max = self.max_field_size, "header field too large");
            return Err(HpackError::frame(
                ERROR_ENHANCE_YOUR_CALM,
                format!("header field exceeds {} octets", self.max_field_size),
            ));
        } else {
            self.pending.extend_from_slice(&input);
        }
        Ok(())
    }

    fn apply(&mut self, field: Field, input: &Bytes, handler: &mut impl HeaderHandler) -> Result<(), HpackError> {
        match field {
            Field::SizeUpdate(size) => self.size_update(size),
            Field::Indexed(index) => {
                self.begin_field()?;
                let entry = self.lookup(index)?;
                trace!(index, "indexed header");
                handler.header(for_application(&entry)?);
                Ok(())
            }
            Field::Literal {
                indexing,
                name,
                value,
            } => {
                self.begin_field()?;
                let key = match name {
                    Name::Indexed(index) => self.lookup(index)?.key().clone(),
                    Name::Literal(s) => s.resolve(input)?,
                };
                let entry = HeaderEntry::new(key, value.resolve(input)?);
                let out = for_application(&entry)?;
                trace!(?indexing, "literal header");
                if indexing == Indexing::Incremental {
                    self.table.add(SharedEntry::new(entry));
                }
                handler.header(out);
                Ok(())
            }
        }
    }

    fn size_update(&mut self, size: u32) -> Result<(), HpackError> {
        if self.seen_field || self.size_updates >= MAX_SIZE_UPDATES {
            warn!(size, "table size update not at start of block");
            return Err(HpackError::TableSizeUpdateNotAllowed);
        }
        if let Err(e) = self.table.set_current_table_size(size) {
            warn!(error = %e, "rejected table size update");
            return Err(e);
        }
        self.size_updates += 1;
        self.size_update_required = false;
        Ok(())
    }

    fn begin_field(&mut self) -> Result<(), HpackError> {
        if self.size_update_required {
            warn!("header field before required table size update");
            return Err(HpackError::TableSizeUpdateRequired);
        }
        self.seen_field = true;
        Ok(())
    }

    fn lookup(&self, index: u32) -> Result<SharedEntry, HpackError> {
        if index == 0 {
            warn!("header field references index 0");
            return Err(HpackError::IndexZero);
        }
        self.table.lookup(index).ok_or_else(|| {
            warn!(index, entries = self.table.len(), "header field references missing table entry");
            HpackError::InvalidIndex(index)
        })
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(super::table::INITIAL_TABLE_SIZE)
    }
}

/// The table keeps wire values; binary headers are decoded on the way out.
fn for_application(entry: &HeaderEntry) -> Result<HeaderEntry, HpackError> {
    if entry.is_binary() {
        Ok(HeaderEntry::new(entry.key().clone(), decode_binary_value(entry.value())?))
    } else {
        Ok(entry.clone())
    }
}
