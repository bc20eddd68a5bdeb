// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

use ntpsync_client::filter::OffsetAverager;
use proptest::prelude::*;

proptest! {
    /// A candidate is released on every `target`-th sample and never in between.
    #[test]
    fn averager_releases_every_target_samples(
        target in 1u32..16,
        samples in prop::collection::vec(-1_000_000i64..1_000_000, 0..100),
    ) {
        let mut avg = OffsetAverager::new(target);
        for (i, s) in samples.iter().enumerate() {
            let released = avg.push(*s).is_some();
            prop_assert_eq!(released, (i + 1) % target as usize == 0);
            prop_assert!(avg.rounds() < target);
        }
    }

    /// The released mean is the integer quotient of the round's sum.
    #[test]
    fn averager_mean_is_sum_over_target(
        target in 1u32..16,
        samples in prop::collection::vec(-10_000_000i64..10_000_000, 16),
    ) {
        let mut avg = OffsetAverager::new(target);
        let round = &samples[..target as usize];
        let mut out = None;
        for s in round {
            out = avg.push(*s);
        }
        let expected = round.iter().sum::<i64>() / target as i64;
        prop_assert_eq!(out, Some(expected));
        prop_assert!(avg.is_empty());
    }

    /// A constant input averages to itself.
    #[test]
    fn averager_constant_input_is_fixed_point(
        target in 1u32..16,
        value in any::<i32>(),
    ) {
        let mut avg = OffsetAverager::new(target);
        let mut out = None;
        for _ in 0..target {
            out = avg.push(value as i64);
        }
        prop_assert_eq!(out, Some(value as i64));
    }
}
