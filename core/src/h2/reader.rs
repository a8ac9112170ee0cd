/*
 * reader.rs
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

//! Push reader for header frames: consumes complete frames from a buffer
//! and streams HEADERS/CONTINUATION fragments into a [`Decoder`].

use bytes::{Buf, Bytes, BytesMut};
use tracing::{trace, warn};

use super::frame::*;
use super::handler::HeaderBlockHandler;
use crate::error::HpackError;
use crate::hpack::Decoder;

/// Header block left open by a HEADERS frame without END_HEADERS.
#[derive(Debug, Clone, Copy)]
struct OpenBlock {
    stream_id: u32,
    end_stream: bool,
}

pub struct HeaderFrameReader {
    max_frame_size: usize,
    open: Option<OpenBlock>,
}

fn frame_error(code: u32, message: String) -> HpackError {
    warn!(code = error_to_string(code), %message, "header frame error");
    HpackError::frame(code, message)
}

impl HeaderFrameReader {
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            open: None,
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Apply our SETTINGS_MAX_FRAME_SIZE.
    pub fn set_max_frame_size(&mut self, size: usize) -> Result<(), HpackError> {
        if !(MIN_MAX_FRAME_SIZE..=MAX_MAX_FRAME_SIZE).contains(&size) {
            return Err(frame_error(
                ERROR_PROTOCOL_ERROR,
                format!("max frame size {} out of range", size),
            ));
        }
        self.max_frame_size = size;
        Ok(())
    }

    /// Whether CONTINUATION frames are still expected.
    pub fn in_header_block(&self) -> bool {
        self.open.is_some()
    }

    /// Consume as many complete frames as possible from `buf`. A partial
    /// frame is left in `buf`.
    pub fn receive<H: HeaderBlockHandler>(
        &mut self,
        buf: &mut BytesMut,
        decoder: &mut Decoder,
        handler: &mut H,
    ) -> Result<(), HpackError> {
        while let Some(header) = FrameHeader::parse(buf) {
            if header.length > self.max_frame_size {
                return Err(frame_error(
                    ERROR_FRAME_SIZE_ERROR,
                    format!("frame size {} exceeds max {}", header.length, self.max_frame_size),
                ));
            }
            if buf.len() < FRAME_HEADER_LENGTH + header.length {
                return Ok(());
            }
            buf.advance(FRAME_HEADER_LENGTH);
            let payload = buf.split_to(header.length).freeze();
            trace!(
                frame_type = header.frame_type,
                flags = header.flags,
                stream_id = header.stream_id,
                length = header.length,
                "received frame"
            );
            self.dispatch(header, payload, decoder, handler)?;
        }
        Ok(())
    }

    fn dispatch<H: HeaderBlockHandler>(
        &mut self,
        header: FrameHeader,
        payload: Bytes,
        decoder: &mut Decoder,
        handler: &mut H,
    ) -> Result<(), HpackError> {
        if let Some(open) = self.open {
            if header.frame_type != TYPE_CONTINUATION || header.stream_id != open.stream_id {
                return Err(frame_error(
                    ERROR_PROTOCOL_ERROR,
                    format!(
                        "expected CONTINUATION on stream {}, got type {} on stream {}",
                        open.stream_id, header.frame_type, header.stream_id
                    ),
                ));
            }
            return self.fragment(open, header.has_flag(FLAG_END_HEADERS), &payload, decoder, handler);
        }
        match header.frame_type {
            TYPE_HEADERS => {
                let fragment = headers_fragment(&header, payload)?;
                let open = OpenBlock {
                    stream_id: header.stream_id,
                    end_stream: header.has_flag(FLAG_END_STREAM),
                };
                handler.begin_headers(open.stream_id, open.end_stream);
                self.fragment(open, header.has_flag(FLAG_END_HEADERS), &fragment, decoder, handler)
            }
            TYPE_CONTINUATION => Err(frame_error(
                ERROR_PROTOCOL_ERROR,
                format!("CONTINUATION on stream {} without open header block", header.stream_id),
            )),
            TYPE_PUSH_PROMISE => Err(frame_error(ERROR_PROTOCOL_ERROR, "PUSH_PROMISE not accepted".into())),
            _ => {
                handler.other_frame(header, payload);
                Ok(())
            }
        }
    }

    fn fragment<H: HeaderBlockHandler>(
        &mut self,
        open: OpenBlock,
        end_headers: bool,
        fragment: &[u8],
        decoder: &mut Decoder,
        handler: &mut H,
    ) -> Result<(), HpackError> {
        self.open = None;
        decoder.decode_fragment(fragment, end_headers, handler)?;
        if end_headers {
            handler.end_headers(open.stream_id, open.end_stream);
        } else {
            self.open = Some(open);
        }
        Ok(())
    }
}

impl Default for HeaderFrameReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip padding and priority fields from a HEADERS payload.
fn headers_fragment(header: &FrameHeader, mut payload: Bytes) -> Result<Bytes, HpackError> {
    if header.stream_id == 0 {
        return Err(frame_error(ERROR_PROTOCOL_ERROR, "HEADERS frame with stream ID 0".into()));
    }
    let pad_len = if header.has_flag(FLAG_PADDED) {
        if payload.is_empty() {
            return Err(frame_error(
                ERROR_PROTOCOL_ERROR,
                "HEADERS frame PADDED but no pad length".into(),
            ));
        }
        payload.get_u8() as usize
    } else {
        0
    };
    if header.has_flag(FLAG_PRIORITY) {
        if payload.len() < 5 {
            return Err(frame_error(
                ERROR_FRAME_SIZE_ERROR,
                "HEADERS frame with PRIORITY too short".into(),
            ));
        }
        payload.advance(5);
    }
    if payload.len() < pad_len {
        return Err(frame_error(
            ERROR_PROTOCOL_ERROR,
            "HEADERS frame padding exceeds payload".into(),
        ));
    }
    payload.truncate(payload.len() - pad_len);
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h2::BlockCollector;

    fn frame(frame_type: u8, flags: u8, stream_id: u32, payload: &[u8]) -> Vec<u8> {
        let mut v = FrameHeader {
            length: payload.len(),
            frame_type,
            flags,
            stream_id,
        }
        .encode()
        .to_vec();
        v.extend_from_slice(payload);
        v
    }

    #[test]
    fn headers_then_continuation() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&frame(TYPE_HEADERS, FLAG_END_STREAM, 1, &[0x82, 0x86]));
        buf.extend_from_slice(&frame(TYPE_CONTINUATION, FLAG_END_HEADERS, 1, &[0x84]));
        let mut reader = HeaderFrameReader::new();
        let mut dec = Decoder::default();
        let mut blocks = BlockCollector::new();
        reader.receive(&mut buf, &mut dec, &mut blocks).unwrap();
        assert!(buf.is_empty());
        assert!(!reader.in_header_block());
        let b = &blocks.blocks()[0];
        assert_eq!(b.stream_id, 1);
        assert!(b.end_stream);
        assert_eq!(b.headers.len(), 3);
        assert_eq!(&b.headers[2].value()[..], b"/");
    }

    #[test]
    fn partial_frame_waits() {
        let bytes = frame(TYPE_HEADERS, FLAG_END_HEADERS, 3, &[0x82]);
        let mut buf = BytesMut::from(&bytes[..5]);
        let mut reader = HeaderFrameReader::new();
        let mut dec = Decoder::default();
        let mut blocks = BlockCollector::new();
        reader.receive(&mut buf, &mut dec, &mut blocks).unwrap();
        assert_eq!(buf.len(), 5);
        buf.extend_from_slice(&bytes[5..]);
        reader.receive(&mut buf, &mut dec, &mut blocks).unwrap();
        assert_eq!(blocks.blocks().len(), 1);
    }

    #[test]
    fn padding_and_priority_stripped() {
        // pad length 2, priority 5 octets, fragment 0x82, two pad octets
        let payload = [2, 0, 0, 0, 0, 15, 0x82, 0, 0];
        let mut buf = BytesMut::from(&frame(TYPE_HEADERS, FLAG_END_HEADERS | FLAG_PADDED | FLAG_PRIORITY, 1, &payload)[..]);
        let mut reader = HeaderFrameReader::new();
        let mut dec = Decoder::default();
        let mut blocks = BlockCollector::new();
        reader.receive(&mut buf, &mut dec, &mut blocks).unwrap();
        assert_eq!(blocks.blocks()[0].headers.len(), 1);
    }

    #[test]
    fn interleaved_frame_rejected() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&frame(TYPE_HEADERS, 0, 1, &[0x82]));
        buf.extend_from_slice(&frame(TYPE_DATA, 0, 1, b"x"));
        let mut reader = HeaderFrameReader::new();
        let mut dec = Decoder::default();
        let mut blocks = BlockCollector::new();
        let err = reader.receive(&mut buf, &mut dec, &mut blocks).unwrap_err();
        assert_eq!(err.h2_error_code(), ERROR_PROTOCOL_ERROR);
    }

    #[test]
    fn continuation_on_other_stream_rejected() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&frame(TYPE_HEADERS, 0, 1, &[0x82]));
        buf.extend_from_slice(&frame(TYPE_CONTINUATION, FLAG_END_HEADERS, 3, &[0x84]));
        let mut reader = HeaderFrameReader::new();
        let mut dec = Decoder::default();
        let err = reader.receive(&mut buf, &mut dec, &mut BlockCollector::new()).unwrap_err();
        assert_eq!(err.h2_error_code(), ERROR_PROTOCOL_ERROR);
    }

    #[test]
    fn oversized_frame_rejected() {
        let mut buf = BytesMut::from(&frame(TYPE_HEADERS, FLAG_END_HEADERS, 1, &vec![0x82; 16385])[..]);
        let mut reader = HeaderFrameReader::new();
        let mut dec = Decoder::default();
        let err = reader.receive(&mut buf, &mut dec, &mut BlockCollector::new()).unwrap_err();
        assert_eq!(err.h2_error_code(), ERROR_FRAME_SIZE_ERROR);
        assert!(reader.set_max_frame_size(100).is_err());
        reader.set_max_frame_size(32768).unwrap();
    }

    #[test]
    fn other_frames_passed_through() {
        struct Counting(usize);
        impl crate::hpack::HeaderHandler for Counting {
            fn header(&mut self, _header: crate::hpack::HeaderEntry) {}
        }
        impl HeaderBlockHandler for Counting {
            fn end_headers(&mut self, _stream_id: u32, _end_stream: bool) {}
            fn other_frame(&mut self, header: FrameHeader, _payload: Bytes) {
                assert_eq!(header.frame_type, TYPE_PING);
                self.0 += 1;
            }
        }
        let mut buf = BytesMut::from(&frame(TYPE_PING, 0, 0, &[0; 8])[..]);
        let mut handler = Counting(0);
        HeaderFrameReader::new()
            .receive(&mut buf, &mut Decoder::default(), &mut handler)
            .unwrap();
        assert_eq!(handler.0, 1);
    }
}
