/*
 * mod.rs
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

//! HPACK (RFC 7541) header compression.
//!
//! [`Encoder`] and [`Decoder`] each own the table state for one direction
//! of one connection. Neither is shared between threads; the transport
//! serialises calls on each.

mod cuckoo;
mod decoder;
mod encoder;
mod entry;
mod filter;
pub mod huffman;
pub mod static_table;
mod table;
pub mod timeout;
mod value;
pub mod varint;

pub use cuckoo::{hash_bytes, CacheLookup, CuckooCache, HeaderHash, RemoteTable};
pub use decoder::{Decoder, HeaderHandler, DEFAULT_MAX_FIELD_SIZE};
pub use encoder::{EncodeOptions, Encoder, HeaderBatch};
pub use entry::{conceptual_size, is_binary_key, HeaderEntry, SharedEntry, ENTRY_OVERHEAD};
pub use filter::{PopularityFilter, MAX_DECODER_SPACE_USAGE, ONE_ON_ADD_PROBABILITY};
pub use static_table::STATIC_TABLE_SIZE;
pub use table::{HeaderTable, TableMatch, INITIAL_TABLE_SIZE};
pub use value::{decode_binary_value, ValueOptions, WireString};
