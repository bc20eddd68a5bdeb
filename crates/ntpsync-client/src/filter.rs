// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Offset averaging for the synchronization engine.
//!
//! Accepted replies feed their raw offset, in signed microseconds, into a
//! running sum. Every `target` samples the mean is released as a candidate
//! offset and the accumulator starts over. Intermediate samples produce no
//! decision; the engine re-polls quickly until the round completes.

/// Default number of samples averaged into one candidate offset.
pub const DEFAULT_ROUNDS: u32 = 1;

/// Running sum of raw offsets, released as a mean every `target` samples.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OffsetAverager {
    offset_sum: i64,
    rounds: u32,
    target: u32,
}

impl OffsetAverager {
    /// Create an averager releasing one mean every `target` samples.
    ///
    /// A `target` of zero is treated as one.
    pub fn new(target: u32) -> Self {
        OffsetAverager {
            offset_sum: 0,
            rounds: 0,
            target: target.max(1),
        }
    }

    /// Fold in one raw offset in microseconds.
    ///
    /// Returns the mean `sum / target` once `target` samples have been
    /// collected, resetting the sum and round count to zero. Returns `None`
    /// while the round is still filling.
    pub fn push(&mut self, offset_us: i64) -> Option<i64> {
        self.offset_sum = self.offset_sum.saturating_add(offset_us);
        self.rounds += 1;
        if self.rounds < self.target {
            return None;
        }
        let mean = self.offset_sum / self.rounds as i64;
        self.reset();
        Some(mean)
    }

    /// Discard any partially collected round.
    pub(crate) fn reset(&mut self) {
        self.offset_sum = 0;
        self.rounds = 0;
    }

    /// Change the number of samples per round. Takes effect on the current round.
    pub fn set_target(&mut self, target: u32) {
        self.target = target.max(1);
    }

    /// Samples per round.
    pub fn target(&self) -> u32 {
        self.target
    }

    /// Samples collected so far in the current round.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Sum of the samples collected so far, in microseconds.
    pub fn offset_sum(&self) -> i64 {
        self.offset_sum
    }

    /// Returns true if the current round holds no samples.
    pub fn is_empty(&self) -> bool {
        self.rounds == 0
    }
}

impl Default for OffsetAverager {
    fn default() -> Self {
        Self::new(DEFAULT_ROUNDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_releases_every_sample() {
        let mut avg = OffsetAverager::default();
        assert_eq!(avg.push(-1234), Some(-1234));
        assert_eq!(avg.push(42), Some(42));
        assert!(avg.is_empty());
    }

    #[test]
    fn test_eight_rounds_of_1000us() {
        let mut avg = OffsetAverager::new(8);
        for _ in 0..7 {
            assert_eq!(avg.push(1000), None);
        }
        assert_eq!(avg.push(1000), Some(1000));
        assert_eq!(avg.offset_sum(), 0);
        assert_eq!(avg.rounds(), 0);
    }

    #[test]
    fn test_seven_samples_yield_nothing() {
        let mut avg = OffsetAverager::new(8);
        for _ in 0..7 {
            assert!(avg.push(1000).is_none());
        }
        assert_eq!(avg.rounds(), 7);
        assert_eq!(avg.offset_sum(), 7000);
    }

    #[test]
    fn test_mean_truncates_toward_zero() {
        let mut avg = OffsetAverager::new(3);
        avg.push(-1);
        avg.push(-1);
        assert_eq!(avg.push(0), Some(0));
        avg.push(5);
        avg.push(5);
        assert_eq!(avg.push(6), Some(5));
    }

    #[test]
    fn test_zero_target_means_one() {
        let mut avg = OffsetAverager::new(0);
        assert_eq!(avg.target(), 1);
        assert_eq!(avg.push(7), Some(7));
    }

    #[test]
    fn test_reset_discards_partial_round() {
        let mut avg = OffsetAverager::new(4);
        avg.push(100);
        avg.push(200);
        avg.reset();
        assert!(avg.is_empty());
        assert_eq!(avg.offset_sum(), 0);
    }

    #[test]
    fn test_lowering_target_completes_round() {
        let mut avg = OffsetAverager::new(4);
        avg.push(300);
        avg.push(100);
        avg.set_target(3);
        assert_eq!(avg.push(200), Some(200));
    }
}
