/*
 * varint.rs
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

//! HPACK prefixed integers (RFC 7541 section 5.1).
//!
//! `prefix_bits` counts the high-order bits of the first octet that belong
//! to the representation's opcode, so an indexed field (`1xxxxxxx`) uses
//! `prefix_bits == 1` and leaves 7 bits for the value. Values are limited
//! to 32 bits; anything longer on the wire is a compression error.

use bytes::BufMut;

use crate::error::HpackError;

/// Longest encoding of a 32-bit value: one prefix octet plus five continuations.
pub const MAX_VARINT_LENGTH: usize = 6;

/// Largest value that fits entirely in the first octet.
pub const fn max_in_prefix(prefix_bits: u8) -> u32 {
    (1u32 << (8 - prefix_bits)) - 1
}

/// Number of octets needed to encode `value` after `prefix_bits` opcode bits.
pub fn varint_length(value: u32, prefix_bits: u8) -> usize {
    let max = max_in_prefix(prefix_bits);
    if value < max {
        1
    } else {
        1 + tail_length(value - max)
    }
}

fn tail_length(tail: u32) -> usize {
    match tail {
        0..=0x7f => 1,
        0x80..=0x3fff => 2,
        0x4000..=0x1f_ffff => 3,
        0x20_0000..=0xfff_ffff => 4,
        _ => 5,
    }
}

/// An encoded varint held on the stack, ready to be appended to a frame.
#[derive(Debug, Clone, Copy)]
pub struct Varint {
    buf: [u8; MAX_VARINT_LENGTH],
    len: u8,
}

impl Varint {
    /// Encode `value`; `prefix_or` supplies the opcode bits of the first octet.
    pub fn new(value: u32, prefix_bits: u8, prefix_or: u8) -> Self {
        let mut buf = [0u8; MAX_VARINT_LENGTH];
        let max = max_in_prefix(prefix_bits);
        if value < max {
            buf[0] = prefix_or | value as u8;
            return Self { buf, len: 1 };
        }
        buf[0] = prefix_or | max as u8;
        let mut tail = value - max;
        let mut len = 1;
        while tail >= 0x80 {
            buf[len] = 0x80 | (tail & 0x7f) as u8;
            tail >>= 7;
            len += 1;
        }
        buf[len] = tail as u8;
        Self {
            buf,
            len: len as u8 + 1,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for Varint {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Append the encoding of `value` to `out`.
pub fn write_varint(value: u32, prefix_bits: u8, prefix_or: u8, out: &mut impl BufMut) {
    out.put_slice(Varint::new(value, prefix_bits, prefix_or).as_bytes());
}

/// Decode a varint at the start of `buf`.
///
/// Returns `Ok(None)` when `buf` ends before the last continuation octet,
/// otherwise the value and the number of octets consumed.
pub fn decode_varint(buf: &[u8], prefix_bits: u8) -> Result<Option<(u32, usize)>, HpackError> {
    let first = match buf.first() {
        Some(b) => *b,
        None => return Ok(None),
    };
    let max = max_in_prefix(prefix_bits);
    let value = (first as u32) & max;
    if value < max {
        return Ok(Some((value, 1)));
    }
    let mut acc = value as u64;
    let mut shift = 0u32;
    for (i, &b) in buf[1..].iter().enumerate() {
        if i == MAX_VARINT_LENGTH - 1 {
            return Err(HpackError::VarintOverflow);
        }
        acc += ((b & 0x7f) as u64) << shift;
        if acc > u32::MAX as u64 {
            return Err(HpackError::VarintOverflow);
        }
        if b & 0x80 == 0 {
            return Ok(Some((acc as u32, i + 2)));
        }
        shift += 7;
    }
    if buf.len() >= MAX_VARINT_LENGTH {
        return Err(HpackError::VarintOverflow);
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn encode(value: u32, prefix_bits: u8) -> Vec<u8> {
        let mut out = Vec::new();
        write_varint(value, prefix_bits, 0, &mut out);
        out
    }

    #[test]
    fn single_byte_zero() {
        assert_eq!(varint_length(0, 1), 1);
        assert_eq!(encode(0, 1), vec![0x00]);
    }

    #[test]
    fn one_past_prefix() {
        assert_eq!(varint_length(128, 1), 2);
        assert_eq!(encode(128, 1), vec![0x7f, 0x01]);
    }

    #[test]
    fn max_u32() {
        assert_eq!(varint_length(0xffff_ffff, 1), 6);
        assert_eq!(encode(0xffff_ffff, 1), vec![0x7f, 0x80, 0xff, 0xff, 0xff, 0x0f]);
        assert_eq!(
            decode_varint(&[0x7f, 0x80, 0xff, 0xff, 0xff, 0x0f], 1).unwrap(),
            Some((0xffff_ffff, 6))
        );
    }

    #[test]
    fn rfc7541_examples() {
        // C.1.1: 10 with a 5-bit prefix
        assert_eq!(encode(10, 3), vec![0x0a]);
        // C.1.2: 1337 with a 5-bit prefix
        assert_eq!(encode(1337, 3), vec![0x1f, 0x9a, 0x0a]);
        assert_eq!(decode_varint(&[0x1f, 0x9a, 0x0a], 3).unwrap(), Some((1337, 3)));
    }

    #[test]
    fn prefix_or_bits_preserved() {
        let v = Varint::new(2, 1, 0x80);
        assert_eq!(v.as_bytes(), &[0x82]);
        // opcode bits are masked off when decoding
        assert_eq!(decode_varint(&[0x82], 1).unwrap(), Some((2, 1)));
        assert_eq!(decode_varint(&[0x7f, 0x05], 2).unwrap(), Some((63 + 5, 2)));
    }

    #[test]
    fn incomplete_returns_none() {
        assert_eq!(decode_varint(&[], 1).unwrap(), None);
        assert_eq!(decode_varint(&[0x7f, 0x80], 1).unwrap(), None);
    }

    #[test]
    fn overflow_rejected() {
        assert_eq!(
            decode_varint(&[0x7f, 0x80, 0xff, 0xff, 0xff, 0x10], 1),
            Err(HpackError::VarintOverflow)
        );
        assert_eq!(
            decode_varint(&[0x7f, 0x80, 0x80, 0x80, 0x80, 0x80, 0x00], 1),
            Err(HpackError::VarintOverflow)
        );
    }

    #[test]
    fn random_values_every_prefix() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for prefix_bits in 1..=7u8 {
            let max = max_in_prefix(prefix_bits);
            let mut values = vec![0, max - 1, max, max + 1, u32::MAX];
            values.extend((0..200).map(|_| rng.gen::<u32>() >> rng.gen_range(0..32)));
            for value in values {
                let bytes = encode(value, prefix_bits);
                assert_eq!(bytes.len(), varint_length(value, prefix_bits));
                assert_eq!(
                    decode_varint(&bytes, prefix_bits).unwrap(),
                    Some((value, bytes.len())),
                    "value {} prefix {}",
                    value,
                    prefix_bits
                );
            }
        }
    }
}
