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

//! HTTP/2 framing for header blocks: frame constants, the emitter that
//! splits an encoded block into HEADERS/CONTINUATION frames, and the reader
//! that reassembles them for the decoder.

mod emitter;
mod frame;
mod handler;
mod reader;

pub use emitter::{EncodeStats, FrameEmitter};
pub use frame::{
    error_to_string, FrameHeader, DEFAULT_MAX_FRAME_SIZE, ERROR_CANCEL, ERROR_COMPRESSION_ERROR,
    ERROR_CONNECT_ERROR, ERROR_ENHANCE_YOUR_CALM, ERROR_FLOW_CONTROL_ERROR, ERROR_FRAME_SIZE_ERROR,
    ERROR_HTTP_1_1_REQUIRED, ERROR_INADEQUATE_SECURITY, ERROR_INTERNAL_ERROR, ERROR_NO_ERROR,
    ERROR_PROTOCOL_ERROR, ERROR_REFUSED_STREAM, ERROR_SETTINGS_TIMEOUT, ERROR_STREAM_CLOSED,
    FLAG_END_HEADERS, FLAG_END_STREAM, FLAG_PADDED, FLAG_PRIORITY, FRAME_HEADER_LENGTH,
    MAX_MAX_FRAME_SIZE, MIN_MAX_FRAME_SIZE, TYPE_CONTINUATION, TYPE_DATA, TYPE_GOAWAY, TYPE_HEADERS,
    TYPE_PING, TYPE_PRIORITY, TYPE_PUSH_PROMISE, TYPE_RST_STREAM, TYPE_SETTINGS, TYPE_WINDOW_UPDATE,
};
pub use handler::{BlockCollector, HeaderBlockHandler, ReceivedBlock};
pub use reader::HeaderFrameReader;
