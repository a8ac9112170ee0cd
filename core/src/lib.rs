/*
 * lib.rs
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

//! HTTP/2 header compression engine.
//!
//! `hpack` holds the stateful encoder/decoder pair and their tables;
//! `h2` frames encoded header blocks and reads them back from a byte
//! stream. `config` builds both halves from one XML-backed settings value.

pub mod config;
pub mod error;
pub mod h2;
pub mod hpack;

pub use config::HpackConfig;
pub use error::HpackError;
pub use h2::{BlockCollector, EncodeStats, HeaderBlockHandler, HeaderFrameReader, ReceivedBlock};
pub use hpack::{Decoder, EncodeOptions, Encoder, HeaderBatch, HeaderEntry, HeaderHandler};
