// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

use core::fmt;
use std::time;

use crate::protocol::{self, FRACTION_SCALE};

/// The number of seconds from 1st January 1900 UTC to the start of the Unix epoch.
pub const EPOCH_DELTA: i64 = 2_208_988_800;

/// The number of seconds in one NTP era (2^32 seconds, approximately 136 years).
///
/// Era 0 spans from 1900-01-01 00:00:00 UTC to 2036-02-07 06:28:15 UTC.
/// Era 1 begins at 2036-02-07 06:28:16 UTC.
pub const ERA_SECONDS: i64 = 4_294_967_296; // 1i64 << 32

const MICROS_PER_SEC: i64 = 1_000_000;

/// A wall-clock time or time difference relative to the Unix epoch, in whole seconds plus a
/// microsecond remainder.
///
/// Both components always carry the same sign: `-0.25 s` is `{ secs: 0, micros: -250_000 }`
/// and `-1.5 s` is `{ secs: -1, micros: -500_000 }`. The constructors normalise their input so
/// the invariant cannot be broken from outside.
///
/// A `Timeval` of zero doubles as the "no timestamp" sentinel produced by the decoder for unset
/// NTP timestamp fields.
#[derive(Copy, Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Timeval {
    secs: i64,
    micros: i32,
}

impl Timeval {
    /// The zero value, also used as "no timestamp".
    pub const ZERO: Timeval = Timeval { secs: 0, micros: 0 };

    /// Create a new **Timeval** from seconds and microseconds.
    ///
    /// Out-of-range or mixed-sign input is folded into canonical form, so
    /// `Timeval::new(1, -250_000)` equals `Timeval::new(0, 750_000)`.
    pub fn new(secs: i64, micros: i64) -> Timeval {
        Timeval::from_micros(secs * MICROS_PER_SEC + micros)
    }

    /// Build a **Timeval** from a signed count of microseconds.
    pub fn from_micros(total: i64) -> Timeval {
        Timeval {
            secs: total / MICROS_PER_SEC,
            micros: (total % MICROS_PER_SEC) as i32,
        }
    }

    /// Split a floating-point number of seconds into whole seconds and a microsecond
    /// remainder, rounding to the nearest microsecond.
    pub fn from_secs_f64(secs: f64) -> Timeval {
        Timeval::from_micros((secs * 1_000_000.0).round() as i64)
    }

    /// Uses `std::time::SystemTime::now` to determine the current **Timeval**.
    ///
    /// ## Example
    ///
    /// ```
    /// println!("{}", ntpsync_proto::Timeval::now());
    /// ```
    pub fn now() -> Self {
        match time::SystemTime::now().duration_since(time::UNIX_EPOCH) {
            Ok(duration) => Timeval {
                secs: duration.as_secs() as i64,
                micros: duration.subsec_micros() as i32,
            },
            Err(sys_time_err) => {
                let before = sys_time_err.duration();
                Timeval {
                    secs: -(before.as_secs() as i64),
                    micros: -(before.subsec_micros() as i32),
                }
            }
        }
    }

    /// The "seconds" component.
    pub fn secs(&self) -> i64 {
        self.secs
    }

    /// The fractional component in microseconds, with the same sign as [`secs`](Self::secs).
    pub fn micros(&self) -> i32 {
        self.micros
    }

    /// Total value in microseconds.
    pub fn as_micros(&self) -> i64 {
        self.secs * MICROS_PER_SEC + self.micros as i64
    }

    /// Total value in seconds as a float.
    pub fn as_secs_f64(&self) -> f64 {
        self.secs as f64 + self.micros as f64 / 1_000_000.0
    }

    /// Whether this is the zero / "no timestamp" value.
    pub fn is_zero(&self) -> bool {
        self.secs == 0 && self.micros == 0
    }

    /// Add a signed offset using integer microsecond arithmetic.
    pub fn checked_add(&self, offset: Timeval) -> Option<Timeval> {
        self.as_micros()
            .checked_add(offset.as_micros())
            .map(Timeval::from_micros)
    }
}

impl fmt::Display for Timeval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.secs < 0 || self.micros < 0 {
            "-"
        } else {
            ""
        };
        write!(
            f,
            "{}{}.{:06}",
            sign,
            self.secs.unsigned_abs(),
            self.micros.unsigned_abs()
        )
    }
}

/// Convert microseconds (0..1_000_000) to an NTP 32-bit fraction, rounding to nearest.
pub fn micros_to_fraction(micros: u32) -> u32 {
    let fraction = (micros as f64 / 1_000_000.0 * FRACTION_SCALE).round();
    fraction.min(u32::MAX as f64) as u32
}

/// Convert an NTP 32-bit fraction to microseconds, rounding to nearest and never reaching a
/// full second.
pub fn fraction_to_micros(fraction: u32) -> u32 {
    let micros = (fraction as u64 * 1_000_000 + (1 << 31)) >> 32;
    micros.min(999_999) as u32
}

/// Choose the era for a raw 32-bit NTP seconds value so the result lies within half an era of
/// `pivot`, and return absolute NTP seconds.
fn era_aware_ntp_seconds(raw_seconds: u32, pivot: &Timeval) -> i64 {
    let pivot_ntp = pivot.secs + EPOCH_DELTA;
    let pivot_era = pivot_ntp.div_euclid(ERA_SECONDS);
    let candidate = pivot_era * ERA_SECONDS + raw_seconds as i64;

    let diff = candidate - pivot_ntp;
    if diff > ERA_SECONDS / 2 {
        candidate - ERA_SECONDS
    } else if diff < -(ERA_SECONDS / 2) {
        candidate + ERA_SECONDS
    } else {
        candidate
    }
}

/// Convert an NTP timestamp to a Unix [`Timeval`], resolving the era against `pivot`.
///
/// A seconds field of zero yields `secs == 0` rather than a date in 1900: servers legitimately
/// leave reference or origin timestamps unset, and such fields must read as "no timestamp".
pub fn timestamp_to_timeval(ts: protocol::TimestampFormat, pivot: &Timeval) -> Timeval {
    let micros = fraction_to_micros(ts.fraction) as i64;
    if ts.seconds == 0 {
        return Timeval::from_micros(micros);
    }
    let unix_secs = era_aware_ntp_seconds(ts.seconds, pivot) - EPOCH_DELTA;
    Timeval::new(unix_secs, micros)
}

impl From<Timeval> for protocol::TimestampFormat {
    fn from(t: Timeval) -> Self {
        let total = t.as_micros() + EPOCH_DELTA * MICROS_PER_SEC;
        let ntp_secs = total.div_euclid(MICROS_PER_SEC);
        let micros = total.rem_euclid(MICROS_PER_SEC) as u32;
        protocol::TimestampFormat {
            seconds: ntp_secs.rem_euclid(ERA_SECONDS) as u32,
            fraction: micros_to_fraction(micros),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalises_mixed_signs() {
        assert_eq!(Timeval::new(1, -250_000), Timeval::new(0, 750_000));
        let t = Timeval::new(0, -1_500_000);
        assert_eq!(t.secs(), -1);
        assert_eq!(t.micros(), -500_000);
    }

    #[test]
    fn from_secs_f64_splits_with_same_sign() {
        let t = Timeval::from_secs_f64(-0.5);
        assert_eq!(t.secs(), 0);
        assert_eq!(t.micros(), -500_000);
        let t = Timeval::from_secs_f64(2.25);
        assert_eq!(t.secs(), 2);
        assert_eq!(t.micros(), 250_000);
    }

    #[test]
    fn display_keeps_sign_for_sub_second_negatives() {
        assert_eq!(Timeval::new(0, -250_000).to_string(), "-0.250000");
        assert_eq!(Timeval::new(12, 5).to_string(), "12.000005");
    }

    #[test]
    fn checked_add_crosses_second_boundary() {
        let now = Timeval::new(1_700_000_000, 900_000);
        let later = now.checked_add(Timeval::new(0, 200_000)).unwrap();
        assert_eq!(later, Timeval::new(1_700_000_001, 100_000));
        let earlier = now.checked_add(Timeval::new(-1, -950_000)).unwrap();
        assert_eq!(earlier, Timeval::new(1_699_999_998, 950_000));
    }

    #[test]
    fn fraction_half_second() {
        assert_eq!(micros_to_fraction(500_000), 0x8000_0000);
        assert_eq!(fraction_to_micros(0x8000_0000), 500_000);
    }

    #[test]
    fn fraction_never_reaches_one_second() {
        assert_eq!(fraction_to_micros(u32::MAX), 999_999);
        assert_eq!(micros_to_fraction(999_999), 4_294_963_001);
    }

    #[test]
    fn seventy_years_decodes_to_unix_zero() {
        let ts = protocol::TimestampFormat {
            seconds: 0x83AA_7E80,
            fraction: 0,
        };
        let t = timestamp_to_timeval(ts, &Timeval::new(1_704_067_200, 0));
        assert_eq!(t.secs(), 0);
        assert_eq!(t.micros(), 0);
    }

    #[test]
    fn zero_seconds_is_sentinel() {
        let ts = protocol::TimestampFormat {
            seconds: 0,
            fraction: 0,
        };
        assert!(timestamp_to_timeval(ts, &Timeval::now()).is_zero());
    }

    #[test]
    fn era0_timestamp_to_timeval() {
        // 2024-01-01 00:00:00 UTC: Unix=1704067200, NTP=3913056000
        let ts = protocol::TimestampFormat {
            seconds: 3_913_056_000,
            fraction: 0,
        };
        let pivot = Timeval::new(1_704_067_200, 0);
        assert_eq!(timestamp_to_timeval(ts, &pivot).secs(), 1_704_067_200);
    }

    #[test]
    fn era_boundary_pivot_before_ts_after() {
        // Pivot in Jan 2036 (Era 0). Timestamp NTP=1000 should resolve to Era 1.
        let pivot = Timeval::new(2_082_758_400, 0);
        let ts = protocol::TimestampFormat {
            seconds: 1000,
            fraction: 0,
        };
        let expected = ERA_SECONDS + 1000 - EPOCH_DELTA;
        assert_eq!(timestamp_to_timeval(ts, &pivot).secs(), expected);
    }

    #[test]
    fn timestamp_roundtrip_within_a_microsecond() {
        let original = Timeval::new(1_704_067_200, 123_456);
        let ts: protocol::TimestampFormat = original.into();
        let restored = timestamp_to_timeval(ts, &original);
        assert_eq!(restored.secs(), original.secs());
        assert!((restored.micros() - original.micros()).abs() <= 1);
    }
}
