/*
 * emitter.rs
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

//! Header block framing.
//!
//! The emitter writes a header block as one HEADERS frame followed by as
//! many CONTINUATION frames as the negotiated maximum frame size requires.
//! Each frame header is reserved when the frame opens and back-patched
//! once its payload length is known.

use bytes::{BufMut, BytesMut};
use tracing::trace;

use super::frame::{
    FrameHeader, FLAG_END_HEADERS, FLAG_END_STREAM, FRAME_HEADER_LENGTH, TYPE_CONTINUATION, TYPE_HEADERS,
};

/// Octet counts for one encoded header block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeStats {
    /// HPACK payload octets.
    pub header_bytes: usize,
    /// Frame header octets (9 per frame).
    pub framing_bytes: usize,
}

impl EncodeStats {
    pub fn frames(&self) -> usize {
        self.framing_bytes / FRAME_HEADER_LENGTH
    }

    pub fn total(&self) -> usize {
        self.header_bytes + self.framing_bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    NoFrame,
    /// Open frame whose payload starts at this offset in the output.
    Header { payload_start: usize },
}

pub struct FrameEmitter<'a> {
    out: &'a mut BytesMut,
    stream_id: u32,
    max_frame_size: usize,
    end_stream: bool,
    state: FrameState,
    is_first_frame: bool,
    stats: EncodeStats,
}

impl<'a> FrameEmitter<'a> {
    /// `max_frame_size` must be at least the largest varint plus one octet;
    /// callers pass a negotiated SETTINGS_MAX_FRAME_SIZE (>= 16384).
    pub fn new(out: &'a mut BytesMut, stream_id: u32, max_frame_size: usize, end_stream: bool) -> Self {
        debug_assert!(max_frame_size >= 16);
        Self {
            out,
            stream_id,
            max_frame_size,
            end_stream,
            state: FrameState::NoFrame,
            is_first_frame: true,
            stats: EncodeStats::default(),
        }
    }

    pub fn begin_frame(&mut self) {
        debug_assert_eq!(self.state, FrameState::NoFrame);
        self.out.put_bytes(0, FRAME_HEADER_LENGTH);
        self.state = FrameState::Header {
            payload_start: self.out.len(),
        };
    }

    fn payload_len(&self) -> usize {
        match self.state {
            FrameState::NoFrame => 0,
            FrameState::Header { payload_start } => self.out.len() - payload_start,
        }
    }

    /// Make sure an open frame can take `need` more octets, closing the
    /// current frame and opening a continuation if it cannot.
    pub fn ensure_space(&mut self, need: usize) {
        match self.state {
            FrameState::NoFrame => self.begin_frame(),
            FrameState::Header { .. } => {
                if self.payload_len() + need > self.max_frame_size {
                    self.finish_frame(false);
                    self.begin_frame();
                }
            }
        }
    }

    /// Append octets that must not straddle a frame boundary.
    pub fn add_tiny(&mut self, data: &[u8]) {
        self.ensure_space(data.len());
        self.out.put_slice(data);
    }

    /// Append string data, splitting it across frames as needed.
    pub fn add_header_data(&mut self, mut data: &[u8]) {
        while !data.is_empty() {
            self.ensure_space(1);
            let n = data.len().min(self.max_frame_size - self.payload_len());
            self.out.put_slice(&data[..n]);
            data = &data[n..];
        }
    }

    /// Back-patch the open frame's header and close it.
    ///
    /// END_STREAM goes on the HEADERS frame, not on the last frame of the
    /// block, since RFC 7540 §6.10 does not allow CONTINUATION to carry it.
    /// END_HEADERS goes on whichever frame closes the block.
    pub fn finish_frame(&mut self, is_header_boundary: bool) {
        let payload_start = match self.state {
            FrameState::NoFrame => return,
            FrameState::Header { payload_start } => payload_start,
        };
        let length = self.out.len() - payload_start;
        let mut flags = 0;
        if is_header_boundary {
            flags |= FLAG_END_HEADERS;
        }
        if self.is_first_frame && self.end_stream {
            flags |= FLAG_END_STREAM;
        }
        let header = FrameHeader {
            length,
            frame_type: if self.is_first_frame {
                TYPE_HEADERS
            } else {
                TYPE_CONTINUATION
            },
            flags,
            stream_id: self.stream_id,
        };
        let at = payload_start - FRAME_HEADER_LENGTH;
        self.out[at..payload_start].copy_from_slice(&header.encode());
        trace!(
            stream_id = self.stream_id,
            frame_type = header.frame_type,
            flags,
            length,
            "finished header frame"
        );
        self.stats.header_bytes += length;
        self.stats.framing_bytes += FRAME_HEADER_LENGTH;
        self.is_first_frame = false;
        self.state = FrameState::NoFrame;
    }

    /// Close the block. An empty block still yields one HEADERS frame.
    pub fn finish(mut self) -> EncodeStats {
        if self.state == FrameState::NoFrame && self.is_first_frame {
            self.begin_frame();
        }
        self.finish_frame(true);
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(buf: &[u8]) -> Vec<(FrameHeader, Vec<u8>)> {
        let mut out = Vec::new();
        let mut rest = buf;
        while !rest.is_empty() {
            let h = FrameHeader::parse(rest).unwrap();
            let end = FRAME_HEADER_LENGTH + h.length;
            out.push((h, rest[FRAME_HEADER_LENGTH..end].to_vec()));
            rest = &rest[end..];
        }
        out
    }

    #[test]
    fn empty_block_is_one_headers_frame() {
        let mut buf = BytesMut::new();
        let stats = FrameEmitter::new(&mut buf, 3, 16384, true).finish();
        assert_eq!(stats, EncodeStats { header_bytes: 0, framing_bytes: 9 });
        let f = frames(&buf);
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].0.frame_type, TYPE_HEADERS);
        assert_eq!(f[0].0.flags, FLAG_END_HEADERS | FLAG_END_STREAM);
        assert_eq!(f[0].0.stream_id, 3);
    }

    #[test]
    fn long_data_splits_into_continuations() {
        let mut buf = BytesMut::new();
        let mut em = FrameEmitter::new(&mut buf, 1, 16, false);
        em.add_tiny(&[0x40]);
        let data: Vec<u8> = (0..40).collect();
        em.add_header_data(&data);
        let stats = em.finish();
        assert_eq!(stats.header_bytes, 41);
        assert_eq!(stats.frames(), 3);

        let f = frames(&buf);
        assert_eq!(f.len(), 3);
        assert_eq!(f[0].0.frame_type, TYPE_HEADERS);
        assert_eq!(f[0].0.flags, 0);
        assert_eq!(f[1].0.frame_type, TYPE_CONTINUATION);
        assert_eq!(f[1].0.flags, 0);
        assert_eq!(f[2].0.frame_type, TYPE_CONTINUATION);
        assert_eq!(f[2].0.flags, FLAG_END_HEADERS);
        assert!(f.iter().all(|(h, _)| h.length <= 16));

        let payload: Vec<u8> = f.into_iter().flat_map(|(_, p)| p).collect();
        assert_eq!(payload[0], 0x40);
        assert_eq!(&payload[1..], &data[..]);
    }

    #[test]
    fn tiny_writes_do_not_straddle_frames() {
        let mut buf = BytesMut::new();
        let mut em = FrameEmitter::new(&mut buf, 1, 16, false);
        em.add_header_data(&[7; 14]);
        em.add_tiny(&[1, 2, 3]);
        em.finish();
        let f = frames(&buf);
        assert_eq!(f.len(), 2);
        assert_eq!(f[0].0.length, 14);
        assert_eq!(f[1].1, vec![1, 2, 3]);
    }

    #[test]
    fn end_stream_only_on_first_frame() {
        let mut buf = BytesMut::new();
        let mut em = FrameEmitter::new(&mut buf, 5, 16, true);
        em.add_header_data(&[0; 20]);
        em.finish();
        let f = frames(&buf);
        assert!(f[0].0.has_flag(FLAG_END_STREAM));
        assert!(!f[1].0.has_flag(FLAG_END_STREAM));
        assert!(f[1].0.has_flag(FLAG_END_HEADERS));
    }
}
