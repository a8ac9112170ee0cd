/*
 * handler.rs
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

//! Callbacks for header blocks read from HTTP/2 frames.

use bytes::Bytes;

use super::frame::FrameHeader;
use crate::hpack::{HeaderEntry, HeaderHandler};

/// Receives decoded header blocks from a [`HeaderFrameReader`](super::HeaderFrameReader).
///
/// Headers arrive through [`HeaderHandler::header`] between
/// `begin_headers` and `end_headers`.
pub trait HeaderBlockHandler: HeaderHandler {
    fn begin_headers(&mut self, _stream_id: u32, _end_stream: bool) {}

    fn end_headers(&mut self, stream_id: u32, end_stream: bool);

    /// A frame outside any header block that is not HEADERS.
    fn other_frame(&mut self, _header: FrameHeader, _payload: Bytes) {}
}

/// One complete header block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceivedBlock {
    pub stream_id: u32,
    pub end_stream: bool,
    pub headers: Vec<HeaderEntry>,
}

/// Handler that keeps every block it is given.
#[derive(Debug, Default)]
pub struct BlockCollector {
    current: Vec<HeaderEntry>,
    blocks: Vec<ReceivedBlock>,
}

impl BlockCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blocks(&self) -> &[ReceivedBlock] {
        &self.blocks
    }

    pub fn take_blocks(&mut self) -> Vec<ReceivedBlock> {
        std::mem::take(&mut self.blocks)
    }
}

impl HeaderHandler for BlockCollector {
    fn header(&mut self, header: HeaderEntry) {
        self.current.push(header);
    }
}

impl HeaderBlockHandler for BlockCollector {
    fn begin_headers(&mut self, _stream_id: u32, _end_stream: bool) {
        self.current.clear();
    }

    fn end_headers(&mut self, stream_id: u32, end_stream: bool) {
        self.blocks.push(ReceivedBlock {
            stream_id,
            end_stream,
            headers: std::mem::take(&mut self.current),
        });
    }
}
