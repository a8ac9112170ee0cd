/*
 * frame.rs
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

//! HTTP/2 frame header, type, flag and error-code constants (RFC 7540).

// Frame types
pub const TYPE_DATA: u8 = 0x0;
pub const TYPE_HEADERS: u8 = 0x1;
pub const TYPE_PRIORITY: u8 = 0x2;
pub const TYPE_RST_STREAM: u8 = 0x3;
pub const TYPE_SETTINGS: u8 = 0x4;
pub const TYPE_PUSH_PROMISE: u8 = 0x5;
pub const TYPE_PING: u8 = 0x6;
pub const TYPE_GOAWAY: u8 = 0x7;
pub const TYPE_WINDOW_UPDATE: u8 = 0x8;
pub const TYPE_CONTINUATION: u8 = 0x9;

// Flags
pub const FLAG_END_STREAM: u8 = 0x1;
pub const FLAG_END_HEADERS: u8 = 0x4;
pub const FLAG_PADDED: u8 = 0x8;
pub const FLAG_PRIORITY: u8 = 0x20;

// Error codes
pub const ERROR_NO_ERROR: u32 = 0x0;
pub const ERROR_PROTOCOL_ERROR: u32 = 0x1;
pub const ERROR_INTERNAL_ERROR: u32 = 0x2;
pub const ERROR_FLOW_CONTROL_ERROR: u32 = 0x3;
pub const ERROR_SETTINGS_TIMEOUT: u32 = 0x4;
pub const ERROR_STREAM_CLOSED: u32 = 0x5;
pub const ERROR_FRAME_SIZE_ERROR: u32 = 0x6;
pub const ERROR_REFUSED_STREAM: u32 = 0x7;
pub const ERROR_CANCEL: u32 = 0x8;
pub const ERROR_COMPRESSION_ERROR: u32 = 0x9;
pub const ERROR_CONNECT_ERROR: u32 = 0xa;
pub const ERROR_ENHANCE_YOUR_CALM: u32 = 0xb;
pub const ERROR_INADEQUATE_SECURITY: u32 = 0xc;
pub const ERROR_HTTP_1_1_REQUIRED: u32 = 0xd;

pub const FRAME_HEADER_LENGTH: usize = 9;
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16384;
pub const MIN_MAX_FRAME_SIZE: usize = 16384;
pub const MAX_MAX_FRAME_SIZE: usize = 16_777_215;

pub fn error_to_string(code: u32) -> &'static str {
    match code {
        ERROR_NO_ERROR => "NO_ERROR",
        ERROR_PROTOCOL_ERROR => "PROTOCOL_ERROR",
        ERROR_INTERNAL_ERROR => "INTERNAL_ERROR",
        ERROR_FLOW_CONTROL_ERROR => "FLOW_CONTROL_ERROR",
        ERROR_SETTINGS_TIMEOUT => "SETTINGS_TIMEOUT",
        ERROR_STREAM_CLOSED => "STREAM_CLOSED",
        ERROR_FRAME_SIZE_ERROR => "FRAME_SIZE_ERROR",
        ERROR_REFUSED_STREAM => "REFUSED_STREAM",
        ERROR_CANCEL => "CANCEL",
        ERROR_COMPRESSION_ERROR => "COMPRESSION_ERROR",
        ERROR_CONNECT_ERROR => "CONNECT_ERROR",
        ERROR_ENHANCE_YOUR_CALM => "ENHANCE_YOUR_CALM",
        ERROR_INADEQUATE_SECURITY => "INADEQUATE_SECURITY",
        ERROR_HTTP_1_1_REQUIRED => "HTTP_1_1_REQUIRED",
        _ => "UNKNOWN",
    }
}

/// The 9-octet header preceding every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub length: usize,
    pub frame_type: u8,
    pub flags: u8,
    pub stream_id: u32,
}

impl FrameHeader {
    /// Parse the first 9 octets of `buf`; `None` if fewer are available.
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < FRAME_HEADER_LENGTH {
            return None;
        }
        Some(Self {
            length: (buf[0] as usize) << 16 | (buf[1] as usize) << 8 | (buf[2] as usize),
            frame_type: buf[3],
            flags: buf[4],
            stream_id: ((buf[5] & 0x7f) as u32) << 24
                | (buf[6] as u32) << 16
                | (buf[7] as u32) << 8
                | (buf[8] as u32),
        })
    }

    pub fn encode(&self) -> [u8; FRAME_HEADER_LENGTH] {
        let len = self.length;
        let id = self.stream_id & 0x7fff_ffff;
        [
            (len >> 16) as u8,
            (len >> 8) as u8,
            len as u8,
            self.frame_type,
            self.flags,
            (id >> 24) as u8,
            (id >> 16) as u8,
            (id >> 8) as u8,
            id as u8,
        ]
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_big_endian() {
        let h = FrameHeader {
            length: 0x01_0203,
            frame_type: TYPE_CONTINUATION,
            flags: FLAG_END_HEADERS,
            stream_id: 0x0506_0708,
        };
        let bytes = h.encode();
        assert_eq!(bytes, [0x01, 0x02, 0x03, 0x09, 0x04, 0x05, 0x06, 0x07, 0x08]);
        assert_eq!(FrameHeader::parse(&bytes), Some(h));
        assert!(h.has_flag(FLAG_END_HEADERS));
        assert!(!h.has_flag(FLAG_END_STREAM));
    }

    #[test]
    fn reserved_bit_ignored() {
        let h = FrameHeader::parse(&[0, 0, 0, TYPE_HEADERS, 0, 0x80, 0, 0, 1]).unwrap();
        assert_eq!(h.stream_id, 1);
        assert!(FrameHeader::parse(&[0; 8]).is_none());
    }
}
