/*
 * entry.rs
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

//! Header entries: immutable (key, value) pairs shared between the tables
//! and in-flight encode/decode calls.

use bytes::Bytes;
use std::sync::Arc;

/// Per-entry overhead added to key and value lengths for table accounting (RFC 7541 section 4.1).
pub const ENTRY_OVERHEAD: usize = 32;

/// A header entry held by a table; the table is one owner among possibly several.
pub type SharedEntry = Arc<HeaderEntry>;

/// Immutable header (key, value). Both halves are reference-counted byte ranges.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeaderEntry {
    key: Bytes,
    value: Bytes,
}

impl HeaderEntry {
    pub fn new(key: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub const fn from_static(key: &'static str, value: &'static str) -> Self {
        Self {
            key: Bytes::from_static(key.as_bytes()),
            value: Bytes::from_static(value.as_bytes()),
        }
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// Size charged against the table budget; not the in-memory footprint.
    pub fn conceptual_size(&self) -> usize {
        conceptual_size(self.key.len(), self.value.len())
    }

    /// Key names a binary header (`-bin` suffix).
    pub fn is_binary(&self) -> bool {
        is_binary_key(&self.key)
    }

    /// Key is a `:`-prefixed pseudo-header.
    pub fn is_pseudo(&self) -> bool {
        self.key.first() == Some(&b':')
    }

    pub fn into_parts(self) -> (Bytes, Bytes) {
        (self.key, self.value)
    }
}

pub fn conceptual_size(key_len: usize, value_len: usize) -> usize {
    key_len + value_len + ENTRY_OVERHEAD
}

pub fn is_binary_key(key: &[u8]) -> bool {
    key.ends_with(b"-bin")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_includes_overhead() {
        let e = HeaderEntry::new("custom-key", "custom-header");
        assert_eq!(e.conceptual_size(), 10 + 13 + 32);
        assert_eq!(HeaderEntry::new("", "").conceptual_size(), ENTRY_OVERHEAD);
    }

    #[test]
    fn binary_and_pseudo_keys() {
        assert!(HeaderEntry::new("trace-bin", "x").is_binary());
        assert!(!HeaderEntry::new("binary", "x").is_binary());
        assert!(HeaderEntry::from_static(":path", "/").is_pseudo());
        assert!(!HeaderEntry::from_static("te", "trailers").is_pseudo());
    }
}
