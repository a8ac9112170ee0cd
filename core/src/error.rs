/*
 * error.rs
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

//! HPACK and header-framing errors.
//!
//! Every variant except `Config` is fatal for the connection: once the
//! encoder and decoder tables disagree there is no way to resynchronise,
//! so the transport must send GOAWAY with `h2_error_code()` and close.

use std::fmt;
use std::io;

use crate::h2::{ERROR_COMPRESSION_ERROR, ERROR_INTERNAL_ERROR, ERROR_PROTOCOL_ERROR};

/// Errors from table management, encoding, decoding, or header framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HpackError {
    /// Index refers to a dynamic table slot that was evicted or never filled.
    InvalidIndex(u32),
    /// Indexed representation with index 0.
    IndexZero,
    /// Dynamic table size update larger than the negotiated ceiling.
    TableSizeExceedsMax { requested: u32, max: u32 },
    /// Size update after the first header field, or more than two in a block.
    TableSizeUpdateNotAllowed,
    /// Ceiling was lowered but the block did not open with a size update.
    TableSizeUpdateRequired,
    /// Varint continuation too long or value does not fit in 32 bits.
    VarintOverflow,
    /// Header block ended in the middle of a field.
    TruncatedBlock,
    /// Invalid Huffman-coded string.
    Huffman(&'static str),
    /// `-bin` header value that is neither true binary nor valid base64.
    InvalidBinaryValue,
    /// Header key of length zero.
    EmptyKey,
    /// `:`-prefixed header after a regular header in the same batch.
    PseudoHeaderAfterRegular,
    /// Growing the table ring buffer failed.
    TableAllocation,
    /// Framing-layer violation with its HTTP/2 error code.
    Frame { code: u32, message: String },
    /// Configuration could not be parsed or was out of range.
    Config(String),
}

impl HpackError {
    pub fn frame(code: u32, message: impl Into<String>) -> Self {
        Self::Frame {
            code,
            message: message.into(),
        }
    }

    /// HTTP/2 error code to report in GOAWAY for this error.
    pub fn h2_error_code(&self) -> u32 {
        match self {
            HpackError::Frame { code, .. } => *code,
            HpackError::EmptyKey | HpackError::PseudoHeaderAfterRegular => ERROR_PROTOCOL_ERROR,
            HpackError::TableAllocation | HpackError::Config(_) => ERROR_INTERNAL_ERROR,
            _ => ERROR_COMPRESSION_ERROR,
        }
    }

    /// True when the error means the two peers' tables can no longer agree.
    pub fn is_compression_error(&self) -> bool {
        self.h2_error_code() == ERROR_COMPRESSION_ERROR
    }
}

impl fmt::Display for HpackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HpackError::InvalidIndex(i) => write!(f, "HPACK index {} out of range", i),
            HpackError::IndexZero => write!(f, "HPACK indexed header index 0"),
            HpackError::TableSizeExceedsMax { requested, max } => write!(
                f,
                "attempt to make hpack table {} bytes when max is {} bytes",
                requested, max
            ),
            HpackError::TableSizeUpdateNotAllowed => {
                write!(f, "HPACK dynamic table size update not allowed here")
            }
            HpackError::TableSizeUpdateRequired => {
                write!(f, "HPACK max table size reduced but not reflected by hpack stream")
            }
            HpackError::VarintOverflow => write!(f, "HPACK integer overflow"),
            HpackError::TruncatedBlock => write!(f, "HPACK header block truncated"),
            HpackError::Huffman(m) => write!(f, "HPACK Huffman: {}", m),
            HpackError::InvalidBinaryValue => write!(f, "invalid base64 in binary header value"),
            HpackError::EmptyKey => write!(f, "empty header key"),
            HpackError::PseudoHeaderAfterRegular => {
                write!(f, "reserved header (colon-prefixed) after regular headers")
            }
            HpackError::TableAllocation => write!(f, "HPACK table allocation failed"),
            HpackError::Frame { code, message } => {
                write!(f, "{}: {}", crate::h2::error_to_string(*code), message)
            }
            HpackError::Config(m) => write!(f, "config: {}", m),
        }
    }
}

impl std::error::Error for HpackError {}

impl From<HpackError> for io::Error {
    fn from(e: HpackError) -> Self {
        io::Error::new(io::ErrorKind::InvalidData, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::h2::ERROR_FRAME_SIZE_ERROR;

    #[test]
    fn table_divergence_is_compression_error() {
        assert!(HpackError::InvalidIndex(70).is_compression_error());
        assert!(HpackError::TruncatedBlock.is_compression_error());
        assert!(!HpackError::EmptyKey.is_compression_error());
    }

    #[test]
    fn frame_error_keeps_code() {
        let e = HpackError::frame(ERROR_FRAME_SIZE_ERROR, "too big");
        assert_eq!(e.h2_error_code(), ERROR_FRAME_SIZE_ERROR);
        assert_eq!(e.to_string(), "FRAME_SIZE_ERROR: too big");
    }

    #[test]
    fn converts_to_io_error() {
        let e: io::Error = HpackError::VarintOverflow.into();
        assert_eq!(e.kind(), io::ErrorKind::InvalidData);
    }
}
