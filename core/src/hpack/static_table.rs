/*
 * static_table.rs
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

//! HPACK static table (RFC 7541 Appendix A). Read-only, indices 1..=61.

use std::sync::OnceLock;

use super::entry::{HeaderEntry, SharedEntry};

/// Index of the last static entry; dynamic indices start right after it.
pub const STATIC_TABLE_SIZE: u32 = 61;

/// (name, value); an empty value means the name has no default value.
const PAIRS: [(&str, &str); STATIC_TABLE_SIZE as usize] = [
    (":authority", ""),
    (":method", "GET"),
    (":method", "POST"),
    (":path", "/"),
    (":path", "/index.html"),
    (":scheme", "http"),
    (":scheme", "https"),
    (":status", "200"),
    (":status", "204"),
    (":status", "206"),
    (":status", "304"),
    (":status", "400"),
    (":status", "404"),
    (":status", "500"),
    ("accept-charset", ""),
    ("accept-encoding", "gzip, deflate"),
    ("accept-language", ""),
    ("accept-ranges", ""),
    ("accept", ""),
    ("access-control-allow-origin", ""),
    ("age", ""),
    ("allow", ""),
    ("authorization", ""),
    ("cache-control", ""),
    ("content-disposition", ""),
    ("content-encoding", ""),
    ("content-language", ""),
    ("content-length", ""),
    ("content-location", ""),
    ("content-range", ""),
    ("content-type", ""),
    ("cookie", ""),
    ("date", ""),
    ("etag", ""),
    ("expect", ""),
    ("expires", ""),
    ("from", ""),
    ("host", ""),
    ("if-match", ""),
    ("if-modified-since", ""),
    ("if-none-match", ""),
    ("if-range", ""),
    ("if-unmodified-since", ""),
    ("last-modified", ""),
    ("link", ""),
    ("location", ""),
    ("max-forwards", ""),
    ("proxy-authenticate", ""),
    ("proxy-authorization", ""),
    ("range", ""),
    ("referer", ""),
    ("refresh", ""),
    ("retry-after", ""),
    ("server", ""),
    ("set-cookie", ""),
    ("strict-transport-security", ""),
    ("transfer-encoding", ""),
    ("user-agent", ""),
    ("vary", ""),
    ("via", ""),
    ("www-authenticate", ""),
];

static ENTRIES: OnceLock<Vec<SharedEntry>> = OnceLock::new();

fn entries() -> &'static [SharedEntry] {
    ENTRIES.get_or_init(|| {
        PAIRS
            .iter()
            .map(|&(k, v)| SharedEntry::new(HeaderEntry::from_static(k, v)))
            .collect()
    })
}

/// Entry at `index` (1-based), or `None` outside 1..=61.
pub fn lookup(index: u32) -> Option<&'static SharedEntry> {
    if index == 0 {
        return None;
    }
    entries().get(index as usize - 1)
}

/// Index of the entry matching both key and value.
pub fn index_of(key: &[u8], value: &[u8]) -> Option<u32> {
    PAIRS
        .iter()
        .position(|&(k, v)| k.as_bytes() == key && v.as_bytes() == value)
        .map(|i| i as u32 + 1)
}

/// Index of the first entry whose name is `key`.
pub fn key_index(key: &[u8]) -> Option<u32> {
    PAIRS
        .iter()
        .position(|&(k, _)| k.as_bytes() == key)
        .map(|i| i as u32 + 1)
}
