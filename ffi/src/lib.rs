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

//! C FFI for hpack_engine. Encoders and decoders are opaque handles owned by
//! the caller; each must be used from one thread at a time.
//! Functions returning `c_int` return 0 on success or a negative HTTP/2
//! error code (e.g. -9 for COMPRESSION_ERROR); `hpack_last_error` then
//! describes the failure.

use libc::{c_char, c_int, c_void, size_t};
use std::ffi::CString;
use std::ptr;
use std::slice;
use std::time::Duration;

use bytes::BytesMut;
use hpack_engine::h2::{ERROR_INTERNAL_ERROR, DEFAULT_MAX_FRAME_SIZE};
use hpack_engine::{Decoder, EncodeOptions, Encoder, HeaderBatch, HeaderEntry, HpackError};

thread_local! {
    static LAST_ERROR: std::cell::RefCell<Option<CString>> = const { std::cell::RefCell::new(None) };
}

fn set_last_error(message: &str) {
    let msg = CString::new(message.replace('\0', " ")).unwrap_or_default();
    LAST_ERROR.with(|e| *e.borrow_mut() = Some(msg));
}

fn clear_last_error() {
    LAST_ERROR.with(|e| *e.borrow_mut() = None);
}

fn fail(err: &HpackError) -> c_int {
    set_last_error(&err.to_string());
    -(err.h2_error_code() as c_int)
}

fn invalid_argument(message: &str) -> c_int {
    set_last_error(message);
    -(ERROR_INTERNAL_ERROR as c_int)
}

/// Opaque encoder handle.
pub struct HpackEncoder {
    encoder: Encoder,
}

/// Opaque decoder handle.
pub struct HpackDecoder {
    decoder: Decoder,
}

/// One header as borrowed byte ranges.
#[repr(C)]
pub struct HpackHeader {
    pub key: *const u8,
    pub key_len: size_t,
    pub value: *const u8,
    pub value_len: size_t,
}

/// Framing choices for `hpack_encoder_encode`.
#[repr(C)]
pub struct HpackEncodeOptions {
    pub stream_id: u32,
    pub is_eof: c_int,
    /// 0 selects the protocol default (16384).
    pub max_frame_size: size_t,
    pub use_true_binary_metadata: c_int,
    /// Deadline in milliseconds sent as grpc-timeout; negative for none.
    pub timeout_ms: i64,
}

/// Frames produced by `hpack_encoder_encode`. Free with `hpack_buffer_free`.
#[repr(C)]
pub struct HpackBuffer {
    pub data: *mut u8,
    pub len: size_t,
    pub header_bytes: size_t,
    pub framing_bytes: size_t,
}

/// Per-header callback: key, key_len, value, value_len, user_data.
/// The pointers are valid only for the duration of the call.
pub type HpackHeaderCallback = extern "C" fn(*const u8, size_t, *const u8, size_t, *mut c_void);

/// Version string (static, do not free).
#[no_mangle]
pub extern "C" fn hpack_version() -> *const c_char {
    b"0.1.0\0".as_ptr() as *const c_char
}

/// Last error message from a failed call on this thread. Valid until the
/// next FFI call. Do not free.
#[no_mangle]
pub extern "C" fn hpack_last_error() -> *const c_char {
    LAST_ERROR.with(|e| e.borrow().as_ref().map(|s| s.as_ptr()).unwrap_or(ptr::null()))
}

/// Create an encoder using the protocol's initial table size (4096).
#[no_mangle]
pub extern "C" fn hpack_encoder_new() -> *mut HpackEncoder {
    Box::into_raw(Box::new(HpackEncoder {
        encoder: Encoder::new(),
    }))
}

/// Free an encoder. No-op if enc is NULL.
#[no_mangle]
pub unsafe extern "C" fn hpack_encoder_free(enc: *mut HpackEncoder) {
    if !enc.is_null() {
        drop(Box::from_raw(enc));
    }
}

/// Apply the peer's SETTINGS_HEADER_TABLE_SIZE.
#[no_mangle]
pub unsafe extern "C" fn hpack_encoder_set_max_usable_size(enc: *mut HpackEncoder, size: u32) -> c_int {
    let Some(enc) = enc.as_mut() else {
        return invalid_argument("encoder is NULL");
    };
    enc.encoder.set_max_usable_size(size);
    clear_last_error();
    0
}

/// Choose the table size (capped by the usable size). The change is
/// advertised at the start of the next encoded block.
#[no_mangle]
pub unsafe extern "C" fn hpack_encoder_set_max_table_size(enc: *mut HpackEncoder, size: u32) -> c_int {
    let Some(enc) = enc.as_mut() else {
        return invalid_argument("encoder is NULL");
    };
    enc.encoder.set_max_table_size(size);
    clear_last_error();
    0
}

unsafe fn bytes_arg<'a>(data: *const u8, len: size_t) -> Option<&'a [u8]> {
    if len == 0 {
        Some(&[])
    } else if data.is_null() {
        None
    } else {
        Some(slice::from_raw_parts(data, len))
    }
}

/// Encode `count` headers into HEADERS/CONTINUATION frames. On success
/// `*out` owns a malloc'd buffer (free with `hpack_buffer_free`).
#[no_mangle]
pub unsafe extern "C" fn hpack_encoder_encode(
    enc: *mut HpackEncoder,
    headers: *const HpackHeader,
    count: size_t,
    options: *const HpackEncodeOptions,
    out: *mut HpackBuffer,
) -> c_int {
    let (Some(enc), Some(options), Some(out)) = (enc.as_mut(), options.as_ref(), out.as_mut()) else {
        return invalid_argument("encoder, options and out must not be NULL");
    };
    let headers: &[HpackHeader] = if count == 0 {
        &[]
    } else if headers.is_null() {
        return invalid_argument("headers is NULL");
    } else {
        slice::from_raw_parts(headers, count)
    };
    let mut batch = HeaderBatch::new();
    for h in headers {
        let (Some(key), Some(value)) = (bytes_arg(h.key, h.key_len), bytes_arg(h.value, h.value_len)) else {
            return invalid_argument("header key or value is NULL");
        };
        batch.push_entry(HeaderEntry::new(key.to_vec(), value.to_vec()));
    }
    if options.timeout_ms >= 0 {
        batch.set_timeout(Duration::from_millis(options.timeout_ms as u64));
    }
    let opts = EncodeOptions {
        stream_id: options.stream_id,
        is_eof: options.is_eof != 0,
        max_frame_size: if options.max_frame_size == 0 {
            DEFAULT_MAX_FRAME_SIZE
        } else {
            options.max_frame_size
        },
        use_true_binary_metadata: options.use_true_binary_metadata != 0,
    };
    let mut wire = BytesMut::new();
    let stats = match enc.encoder.encode_header_batch(&batch, &opts, &mut wire) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let data = libc::malloc(wire.len().max(1)) as *mut u8;
    if data.is_null() {
        return fail(&HpackError::TableAllocation);
    }
    ptr::copy_nonoverlapping(wire.as_ptr(), data, wire.len());
    *out = HpackBuffer {
        data,
        len: wire.len(),
        header_bytes: stats.header_bytes,
        framing_bytes: stats.framing_bytes,
    };
    clear_last_error();
    0
}

/// Release the data of a buffer filled by `hpack_encoder_encode`.
#[no_mangle]
pub unsafe extern "C" fn hpack_buffer_free(buf: *mut HpackBuffer) {
    if let Some(buf) = buf.as_mut() {
        if !buf.data.is_null() {
            libc::free(buf.data as *mut c_void);
        }
        buf.data = ptr::null_mut();
        buf.len = 0;
    }
}

/// Create a decoder advertising `max_table_size` as SETTINGS_HEADER_TABLE_SIZE.
#[no_mangle]
pub extern "C" fn hpack_decoder_new(max_table_size: u32) -> *mut HpackDecoder {
    Box::into_raw(Box::new(HpackDecoder {
        decoder: Decoder::new(max_table_size),
    }))
}

/// Free a decoder. No-op if dec is NULL.
#[no_mangle]
pub unsafe extern "C" fn hpack_decoder_free(dec: *mut HpackDecoder) {
    if !dec.is_null() {
        drop(Box::from_raw(dec));
    }
}

/// Change our SETTINGS_HEADER_TABLE_SIZE.
#[no_mangle]
pub unsafe extern "C" fn hpack_decoder_set_max_table_size(dec: *mut HpackDecoder, size: u32) -> c_int {
    let Some(dec) = dec.as_mut() else {
        return invalid_argument("decoder is NULL");
    };
    dec.decoder.set_max_table_size(size);
    clear_last_error();
    0
}

/// Decode one fragment of a header block (frame headers already removed),
/// invoking `callback` for each header as soon as it is complete. Pass
/// `end_of_block` = 1 with the last fragment.
#[no_mangle]
pub unsafe extern "C" fn hpack_decoder_decode(
    dec: *mut HpackDecoder,
    data: *const u8,
    len: size_t,
    end_of_block: c_int,
    callback: Option<HpackHeaderCallback>,
    user_data: *mut c_void,
) -> c_int {
    let (Some(dec), Some(callback)) = (dec.as_mut(), callback) else {
        return invalid_argument("decoder and callback must not be NULL");
    };
    let Some(data) = bytes_arg(data, len) else {
        return invalid_argument("data is NULL");
    };
    let mut emit = |h: HeaderEntry| {
        callback(h.key().as_ptr(), h.key().len(), h.value().as_ptr(), h.value().len(), user_data);
    };
    match dec.decoder.decode_fragment(data, end_of_block != 0, &mut emit) {
        Ok(()) => {
            clear_last_error();
            0
        }
        Err(e) => fail(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpack_engine::h2::{ERROR_COMPRESSION_ERROR, ERROR_FRAME_SIZE_ERROR, FRAME_HEADER_LENGTH};
    use std::ffi::CStr;

    extern "C" fn collect(key: *const u8, key_len: size_t, value: *const u8, value_len: size_t, user_data: *mut c_void) {
        let out = unsafe { &mut *(user_data as *mut Vec<(Vec<u8>, Vec<u8>)>) };
        let (k, v) = unsafe { (bytes_arg(key, key_len).unwrap(), bytes_arg(value, value_len).unwrap()) };
        out.push((k.to_vec(), v.to_vec()));
    }

    fn header(k: &'static [u8], v: &'static [u8]) -> HpackHeader {
        HpackHeader {
            key: k.as_ptr(),
            key_len: k.len(),
            value: v.as_ptr(),
            value_len: v.len(),
        }
    }

    #[test]
    fn encode_then_decode() {
        unsafe {
            let enc = hpack_encoder_new();
            let dec = hpack_decoder_new(4096);
            let headers = [header(b":method", b"POST"), header(b"x-id-bin", b"\x00\x01\xff")];
            let options = HpackEncodeOptions {
                stream_id: 1,
                is_eof: 1,
                max_frame_size: 0,
                use_true_binary_metadata: 0,
                timeout_ms: 250,
            };
            let mut buf = HpackBuffer {
                data: ptr::null_mut(),
                len: 0,
                header_bytes: 0,
                framing_bytes: 0,
            };
            assert_eq!(hpack_encoder_encode(enc, headers.as_ptr(), headers.len(), &options, &mut buf), 0);
            assert_eq!(buf.len, buf.header_bytes + buf.framing_bytes);
            assert_eq!(buf.framing_bytes, FRAME_HEADER_LENGTH);

            let mut got: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
            let block = buf.data.add(FRAME_HEADER_LENGTH);
            let rc = hpack_decoder_decode(
                dec,
                block,
                buf.header_bytes,
                1,
                Some(collect),
                &mut got as *mut _ as *mut c_void,
            );
            assert_eq!(rc, 0);
            assert_eq!(got.len(), 3);
            assert_eq!(got[1], (b"x-id-bin".to_vec(), vec![0, 1, 255]));
            assert_eq!(got[2], (b"grpc-timeout".to_vec(), b"250m".to_vec()));

            hpack_buffer_free(&mut buf);
            assert!(buf.data.is_null());
            hpack_encoder_free(enc);
            hpack_decoder_free(dec);
        }
    }

    #[test]
    fn errors_are_negated_h2_codes() {
        unsafe {
            let dec = hpack_decoder_new(4096);
            let mut got: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
            let block = [0xbeu8];
            let rc = hpack_decoder_decode(dec, block.as_ptr(), 1, 1, Some(collect), &mut got as *mut _ as *mut c_void);
            assert_eq!(rc, -(ERROR_COMPRESSION_ERROR as c_int));
            let msg = CStr::from_ptr(hpack_last_error()).to_string_lossy().into_owned();
            assert!(msg.contains("62"));
            assert_eq!(hpack_decoder_decode(ptr::null_mut(), block.as_ptr(), 1, 1, Some(collect), ptr::null_mut()), -2);
            hpack_decoder_free(dec);

            let enc = hpack_encoder_new();
            let headers = [header(b"", b"v")];
            let options = HpackEncodeOptions {
                stream_id: 1,
                is_eof: 0,
                max_frame_size: 0,
                use_true_binary_metadata: 0,
                timeout_ms: -1,
            };
            let mut buf = HpackBuffer {
                data: ptr::null_mut(),
                len: 0,
                header_bytes: 0,
                framing_bytes: 0,
            };
            assert_eq!(hpack_encoder_encode(enc, headers.as_ptr(), 1, &options, &mut buf), -1);
            assert!(buf.data.is_null());
            assert_eq!(hpack_encoder_set_max_table_size(enc, 1024), 0);
            hpack_encoder_free(enc);
        }
    }

    #[test]
    fn bad_frame_size_reported() {
        unsafe {
            let enc = hpack_encoder_new();
            let headers = [header(b"x-trace", b"abc")];
            let mut buf = HpackBuffer {
                data: ptr::null_mut(),
                len: 0,
                header_bytes: 0,
                framing_bytes: 0,
            };
            for max_frame_size in [1, 16383, 16_777_216] {
                let options = HpackEncodeOptions {
                    stream_id: 1,
                    is_eof: 0,
                    max_frame_size,
                    use_true_binary_metadata: 0,
                    timeout_ms: i64::MAX,
                };
                let rc = hpack_encoder_encode(enc, headers.as_ptr(), 1, &options, &mut buf);
                assert_eq!(rc, -(ERROR_FRAME_SIZE_ERROR as c_int));
                assert!(buf.data.is_null());
            }
            let msg = CStr::from_ptr(hpack_last_error()).to_string_lossy().into_owned();
            assert!(msg.contains("16777216"));

            let options = HpackEncodeOptions {
                stream_id: 1,
                is_eof: 0,
                max_frame_size: 0,
                use_true_binary_metadata: 0,
                timeout_ms: i64::MAX,
            };
            assert_eq!(hpack_encoder_encode(enc, headers.as_ptr(), 1, &options, &mut buf), 0);
            hpack_buffer_free(&mut buf);
            hpack_encoder_free(enc);
        }
    }
}
