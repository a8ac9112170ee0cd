/*
 * timeout.rs
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

//! `grpc-timeout` header values: up to eight ASCII digits and a unit
//! (`H` hours, `M` minutes, `S` seconds, `m` millis, `u` micros, `n` nanos).

use std::time::Duration;

pub const TIMEOUT_KEY: &str = "grpc-timeout";

const MAX_DIGITS: usize = 8;

/// Largest value eight digits can carry; longer deadlines are clamped to it.
const MAX_TIMEOUT_SECS: u64 = 99_999_999;

fn round_up(x: u64, divisor: u64) -> u64 {
    (x / divisor + (x % divisor != 0) as u64) * divisor
}

fn round_up_to_three_sig_figs(x: u64) -> u64 {
    match x {
        0..=999 => x,
        1_000..=9_999 => round_up(x, 10),
        10_000..=99_999 => round_up(x, 100),
        100_000..=999_999 => round_up(x, 1_000),
        1_000_000..=9_999_999 => round_up(x, 10_000),
        10_000_000..=99_999_999 => round_up(x, 100_000),
        100_000_000..=999_999_999 => round_up(x, 1_000_000),
        _ => round_up(x, 10_000_000),
    }
}

fn encode_seconds(secs: u64) -> String {
    if secs >= MAX_TIMEOUT_SECS {
        return format!("{}S", MAX_TIMEOUT_SECS);
    }
    let secs = round_up_to_three_sig_figs(secs).min(MAX_TIMEOUT_SECS);
    if secs % 3600 == 0 {
        format!("{}H", secs / 3600)
    } else if secs % 60 == 0 {
        format!("{}M", secs / 60)
    } else {
        format!("{}S", secs)
    }
}

fn encode_millis(millis: u64) -> String {
    let millis = round_up_to_three_sig_figs(millis);
    if millis < 1000 {
        format!("{}m", millis)
    } else if millis % 1000 == 0 {
        encode_seconds(millis / 1000)
    } else {
        format!("{}m", millis)
    }
}

/// Text form of a relative deadline, rounded up to millisecond precision.
/// Anything under a millisecond is sent as `1n`; deadlines of
/// 99999999 seconds or more are sent as `99999999S`.
pub fn encode(timeout: Duration) -> String {
    let nanos = timeout.as_nanos();
    if nanos == 0 {
        return "1n".to_owned();
    }
    let millis = (nanos + 999_999) / 1_000_000;
    if millis < 1_000_000 {
        encode_millis(millis as u64)
    } else {
        let secs = timeout.as_secs().saturating_add((timeout.subsec_nanos() != 0) as u64);
        encode_seconds(secs)
    }
}

/// Parse a `grpc-timeout` value; whitespace around the digits is allowed.
pub fn decode(value: &[u8]) -> Option<Duration> {
    let text = value.trim_ascii();
    let (&unit, digits) = text.split_last()?;
    let digits = digits.trim_ascii_end();
    if digits.is_empty() || digits.len() > MAX_DIGITS || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let n = digits.iter().fold(0u64, |n, &d| n * 10 + (d - b'0') as u64);
    let timeout = match unit {
        b'n' => Duration::from_nanos(n),
        b'u' => Duration::from_micros(n),
        b'm' => Duration::from_millis(n),
        b'S' => Duration::from_secs(n),
        b'M' => Duration::from_secs(n * 60),
        b'H' => Duration::from_secs(n * 3600),
        _ => return None,
    };
    Some(timeout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn encodes_like_grpc() {
        assert_eq!(encode(Duration::ZERO), "1n");
        assert_eq!(encode(ms(1)), "1m");
        assert_eq!(encode(ms(10)), "10m");
        assert_eq!(encode(ms(999)), "999m");
        assert_eq!(encode(ms(1000)), "1S");
        assert_eq!(encode(ms(1001)), "1010m");
        assert_eq!(encode(ms(60_000)), "1M");
        assert_eq!(encode(ms(90_000)), "90S");
        assert_eq!(encode(ms(3_600_000)), "1H");
        assert_eq!(encode(Duration::from_secs(1_000)), "1000S");
        assert_eq!(encode(Duration::from_secs(1_001)), "1010S");
        assert_eq!(encode(Duration::from_secs(7_200)), "2H");
        assert_eq!(encode(Duration::from_micros(1)), "1m");
    }

    #[test]
    fn decodes_units() {
        assert_eq!(decode(b"1n"), Some(Duration::from_nanos(1)));
        assert_eq!(decode(b"250u"), Some(Duration::from_micros(250)));
        assert_eq!(decode(b"1010m"), Some(ms(1010)));
        assert_eq!(decode(b" 30S "), Some(Duration::from_secs(30)));
        assert_eq!(decode(b"2M"), Some(Duration::from_secs(120)));
        assert_eq!(decode(b"1H"), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn rejects_malformed() {
        assert_eq!(decode(b""), None);
        assert_eq!(decode(b"S"), None);
        assert_eq!(decode(b"123456789S"), None);
        assert_eq!(decode(b"10x"), None);
        assert_eq!(decode(b"-1S"), None);
    }

    #[test]
    fn encoded_values_decode_to_at_least_the_original() {
        for millis in [1u64, 7, 999, 1000, 1234, 59_999, 61_000, 999_999, 1_000_000, 86_400_000] {
            let t = ms(millis);
            let back = decode(encode(t).as_bytes()).unwrap();
            assert!(back >= t, "{} -> {:?}", millis, back);
        }
    }

    #[test]
    fn long_deadlines_clamp_to_eight_digits() {
        assert_eq!(encode(Duration::MAX), "99999999S");
        assert_eq!(encode(Duration::from_secs(1_000_000_000_000)), "99999999S");
        assert_eq!(encode(Duration::from_secs(MAX_TIMEOUT_SECS)), "99999999S");
        assert_eq!(encode(Duration::from_millis(i64::MAX as u64)), "99999999S");
        assert_eq!(decode(b"99999999S"), Some(Duration::from_secs(MAX_TIMEOUT_SECS)));

        // rounding up to three significant figures must not cross the cap
        assert_eq!(encode(Duration::from_secs(MAX_TIMEOUT_SECS - 1)), "99999999S");
        assert_eq!(encode(Duration::from_secs(9_999_999)), "10000000S");
        for secs in [9_999_999u64, 12_345_678, 99_999_998, 500_000_000] {
            let text = encode(Duration::from_secs(secs));
            let digits = text.len() - 1;
            assert!(digits <= MAX_DIGITS, "{} -> {}", secs, text);
            assert!(decode(text.as_bytes()).is_some(), "{} -> {}", secs, text);
        }
    }
}
