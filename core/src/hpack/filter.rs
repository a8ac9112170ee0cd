/*
 * filter.rs
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

//! Popularity filter: an approximate frequency sketch over header hashes.
//!
//! 256 saturating byte counters indexed by one 8-bit fragment of the
//! header's hash. When a counter would reach 255 every counter is halved,
//! which ages out old traffic. A header is worth indexing when its counter
//! holds at least 1/128 of the total, so one-off values such as trace ids
//! stay out of the shared table while method names and content types get in.

pub const NUM_FILTERS: usize = 256;

/// A header must account for at least 1/ONE_ON_ADD_PROBABILITY of observations.
pub const ONE_ON_ADD_PROBABILITY: u32 = 128;

/// Headers at or above this conceptual size are never indexed.
pub const MAX_DECODER_SPACE_USAGE: usize = 512;

#[derive(Clone)]
pub struct PopularityFilter {
    counts: [u8; NUM_FILTERS],
    /// Always equal to the sum of `counts`.
    sum: u32,
}

impl PopularityFilter {
    pub fn new() -> Self {
        Self {
            counts: [0; NUM_FILTERS],
            sum: 0,
        }
    }

    /// Record one observation of `fragment`.
    pub fn increment(&mut self, fragment: u8) {
        let slot = &mut self.counts[fragment as usize];
        *slot += 1;
        if *slot < u8::MAX {
            self.sum += 1;
        } else {
            self.sum = 0;
            for c in self.counts.iter_mut() {
                *c /= 2;
                self.sum += *c as u32;
            }
        }
    }

    pub fn is_popular(&self, fragment: u8) -> bool {
        self.counts[fragment as usize] as u32 >= self.sum / ONE_ON_ADD_PROBABILITY
    }

    /// Popular and small enough to be worth a slot in the peer's table.
    pub fn should_index(&self, fragment: u8, conceptual_size: usize) -> bool {
        conceptual_size < MAX_DECODER_SPACE_USAGE && self.is_popular(fragment)
    }

    pub fn count(&self, fragment: u8) -> u8 {
        self.counts[fragment as usize]
    }

    pub fn sum(&self) -> u32 {
        self.sum
    }
}

impl Default for PopularityFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recomputed(f: &PopularityFilter) -> u32 {
        (0..=255u8).map(|i| f.count(i) as u32).sum()
    }

    #[test]
    fn sum_tracks_counters() {
        let mut f = PopularityFilter::new();
        for i in 0..1000u32 {
            f.increment((i * 7 % 13) as u8);
            assert_eq!(f.sum(), recomputed(&f));
        }
    }

    #[test]
    fn saturation_halves_everything() {
        let mut f = PopularityFilter::new();
        f.increment(9);
        f.increment(9);
        f.increment(9);
        for _ in 0..255 {
            f.increment(1);
        }
        // the 255th increment of slot 1 halved all counters
        assert_eq!(f.count(1), 127);
        assert_eq!(f.count(9), 1);
        assert_eq!(f.sum(), 128);
        assert_eq!(f.sum(), recomputed(&f));
    }

    #[test]
    fn rare_fragment_not_popular() {
        let mut f = PopularityFilter::new();
        // everything is popular while the total is small
        assert!(f.is_popular(3));
        for i in 0..4096u32 {
            f.increment((i % 20) as u8);
        }
        f.increment(250);
        assert!(!f.is_popular(250));
        assert!(f.is_popular(10));
    }

    #[test]
    fn large_entries_never_indexed() {
        let f = PopularityFilter::new();
        assert!(f.should_index(0, MAX_DECODER_SPACE_USAGE - 1));
        assert!(!f.should_index(0, MAX_DECODER_SPACE_USAGE));
    }
}
