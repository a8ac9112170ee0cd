/*
 * value.rs
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

//! Wire form of string literals.
//!
//! Binary headers (`-bin` keys) go out either as true binary (a NUL octet
//! then the raw bytes) or as unpadded base64 that is then Huffman coded.
//! Other strings are Huffman coded when that is strictly shorter. The
//! peer's table is charged for the string after Huffman decoding, which
//! `decoded_len` reports.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use bytes::Bytes;

use super::entry::{HeaderEntry, ENTRY_OVERHEAD};
use super::huffman;
use crate::error::HpackError;

/// Per-call choices for string representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueOptions {
    /// Peer accepts binary header values without base64.
    pub true_binary: bool,
    /// Huffman-code non-binary strings when it saves space.
    pub huffman: bool,
}

impl Default for ValueOptions {
    fn default() -> Self {
        Self {
            true_binary: false,
            huffman: true,
        }
    }
}

/// A string literal ready for emission.
#[derive(Debug, Clone)]
pub struct WireString {
    data: Bytes,
    huffman: bool,
    insert_null: bool,
    decoded_len: usize,
}

impl WireString {
    /// Key or non-binary value.
    pub fn text(raw: &Bytes, opts: ValueOptions) -> Self {
        if opts.huffman && huffman::encoded_length(raw) < raw.len() {
            Self {
                data: Bytes::from(huffman::encode(raw)),
                huffman: true,
                insert_null: false,
                decoded_len: raw.len(),
            }
        } else {
            Self {
                data: raw.clone(),
                huffman: false,
                insert_null: false,
                decoded_len: raw.len(),
            }
        }
    }

    /// Value of `entry`, honouring binary-header rules.
    pub fn value_of(entry: &HeaderEntry, opts: ValueOptions) -> Self {
        if !entry.is_binary() {
            return Self::text(entry.value(), opts);
        }
        if opts.true_binary {
            return Self {
                data: entry.value().clone(),
                huffman: false,
                insert_null: true,
                decoded_len: entry.value().len() + 1,
            };
        }
        let encoded = STANDARD_NO_PAD.encode(entry.value());
        Self {
            data: Bytes::from(huffman::encode(encoded.as_bytes())),
            huffman: true,
            insert_null: false,
            decoded_len: encoded.len(),
        }
    }

    /// Octets following the length prefix.
    pub fn len(&self) -> usize {
        self.data.len() + self.insert_null as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// High bit of the length prefix.
    pub fn huffman_prefix(&self) -> u8 {
        if self.huffman {
            0x80
        } else {
            0x00
        }
    }

    pub fn insert_null(&self) -> bool {
        self.insert_null
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Length the peer stores after Huffman decoding.
    pub fn decoded_len(&self) -> usize {
        self.decoded_len
    }
}

/// Conceptual size the peer will charge for `key` with this wire value.
pub fn wire_entry_size(key: &[u8], value: &WireString) -> usize {
    key.len() + value.decoded_len() + ENTRY_OVERHEAD
}

/// Turn a received `-bin` value back into raw bytes.
pub fn decode_binary_value(wire: &Bytes) -> Result<Bytes, HpackError> {
    if wire.first() == Some(&0) {
        return Ok(wire.slice(1..));
    }
    let trimmed = match wire.iter().rposition(|&b| b != b'=') {
        Some(end) => &wire[..end + 1],
        None => &wire[..0],
    };
    STANDARD_NO_PAD
        .decode(trimmed)
        .map(Bytes::from)
        .map_err(|_| HpackError::InvalidBinaryValue)
}
