// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Request construction and the four-timestamp offset/delay calculation.

use log::debug;

use ntpsync_proto::protocol::{ConstPackedSizeBytes, Packet, TimestampFormat};
use ntpsync_proto::{DecodedPacket, Timeval, encode_request};

/// Offset, delay and dispersion derived from one reply.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Measurement {
    /// Clock offset in seconds (positive = local clock behind server).
    ///
    /// Computed as `((T2 - T1) + (T3 - T4)) / 2`, where:
    /// - T1 = origin timestamp (client transmit time)
    /// - T2 = receive timestamp (server receive time)
    /// - T3 = transmit timestamp (server transmit time)
    /// - T4 = destination timestamp (client receive time)
    pub offset: f64,
    /// Round-trip delay in seconds, `(T4 - T1) - (T3 - T2)`. Not clamped, so a
    /// misbehaving path can make it negative.
    pub delay: f64,
    /// Root dispersion reported by the server, in seconds.
    pub dispersion: f64,
}

impl Measurement {
    /// Compute the measurement for a decoded reply.
    pub fn from_reply(reply: &DecodedPacket) -> Measurement {
        let (offset, delay) = compute_offset_delay(
            &reply.origin,
            &reply.receive,
            &reply.transmit,
            &reply.destination,
        );
        debug!(
            "T1: {} T2: {} T3: {} T4: {} offset: {:.6} s delay: {:.6} s",
            reply.origin, reply.receive, reply.transmit, reply.destination, offset, delay
        );
        Measurement {
            offset,
            delay,
            dispersion: reply.dispersion,
        }
    }

    /// The offset split into whole seconds plus a microsecond remainder.
    pub fn offset_timeval(&self) -> Timeval {
        Timeval::from_secs_f64(self.offset)
    }
}

/// Compute clock offset and round-trip delay from the four NTP timestamps.
pub(crate) fn compute_offset_delay(
    t1: &Timeval,
    t2: &Timeval,
    t3: &Timeval,
    t4: &Timeval,
) -> (f64, f64) {
    // Differences in integer microseconds first: absolute times near the
    // current epoch only carry ~0.24 us of precision as f64.
    let t1 = t1.as_micros();
    let t2 = t2.as_micros();
    let t3 = t3.as_micros();
    let t4 = t4.as_micros();
    let offset = ((t2 - t1) + (t3 - t4)) as f64 / 2.0 / 1_000_000.0;
    let delay = ((t4 - t1) - (t3 - t2)) as f64 / 1_000_000.0;
    (offset, delay)
}

/// Build an NTP client request stamped with `now`.
///
/// Returns the serialized buffer and the transmit timestamp a genuine reply
/// must echo back in its origin field.
pub(crate) fn build_request_packet(
    now: Timeval,
) -> ([u8; Packet::PACKED_SIZE_BYTES], TimestampFormat) {
    let bytes = encode_request(now);
    let origin = if now.is_zero() {
        TimestampFormat::default()
    } else {
        TimestampFormat::from(now)
    };
    (bytes, origin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntpsync_proto::protocol::ReadBytes;

    // ── compute_offset_delay ──────────────────────────────────────

    #[test]
    fn test_offset_delay_one_second_each_way() {
        // T1=0, T2=1.0, T3=1.0, T4=2.0
        // offset = ((1-0)+(1-2))/2 = 0
        // delay = (2-0)-(1-1) = 2.0
        let t1 = Timeval::new(0, 0);
        let t2 = Timeval::new(1, 0);
        let t3 = Timeval::new(1, 0);
        let t4 = Timeval::new(2, 0);
        let (offset, delay) = compute_offset_delay(&t1, &t2, &t3, &t4);
        assert!(offset.abs() < 1e-9, "expected 0 offset, got {offset}");
        assert!((delay - 2.0).abs() < 1e-9, "expected 2.0 delay, got {delay}");
    }

    #[test]
    fn test_offset_delay_symmetric() {
        // T1=0, T2=0.5, T3=0.5, T4=1.0
        let t1 = Timeval::new(0, 0);
        let t2 = Timeval::new(0, 500_000);
        let t3 = Timeval::new(0, 500_000);
        let t4 = Timeval::new(1, 0);
        let (offset, delay) = compute_offset_delay(&t1, &t2, &t3, &t4);
        assert!(offset.abs() < 1e-9, "expected ~0 offset, got {offset}");
        assert!((delay - 1.0).abs() < 1e-9, "expected 1.0 delay, got {delay}");
    }

    #[test]
    fn test_offset_delay_local_ahead() {
        // T1=0, T2=0, T3=0, T4=1.0
        // offset = ((0-0)+(0-1))/2 = -0.5
        // delay = (1-0)-(0-0) = 1.0
        let t1 = Timeval::new(0, 0);
        let t2 = Timeval::new(0, 0);
        let t3 = Timeval::new(0, 0);
        let t4 = Timeval::new(1, 0);
        let (offset, delay) = compute_offset_delay(&t1, &t2, &t3, &t4);
        assert!((offset + 0.5).abs() < 1e-9, "expected -0.5 offset, got {offset}");
        assert!((delay - 1.0).abs() < 1e-9, "expected 1.0 delay, got {delay}");
    }

    #[test]
    fn test_offset_delay_microsecond_precision_at_epoch_scale() {
        let t1 = Timeval::new(1_700_000_000, 0);
        let t2 = Timeval::new(1_700_000_000, 1_500);
        let t3 = Timeval::new(1_700_000_000, 1_700);
        let t4 = Timeval::new(1_700_000_000, 200);
        let (offset, delay) = compute_offset_delay(&t1, &t2, &t3, &t4);
        assert!((offset - 0.0015).abs() < 1e-6);
        assert!((delay - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_offset_timeval_split() {
        let m = Measurement {
            offset: -1.25,
            ..Measurement::default()
        };
        let tv = m.offset_timeval();
        assert_eq!(tv.secs(), -1);
        assert_eq!(tv.micros(), -250_000);
    }

    // ── build_request_packet ──────────────────────────────────────

    #[test]
    fn test_build_request_returns_echo_value() {
        let now = Timeval::new(1_704_067_200, 10);
        let (bytes, origin) = build_request_packet(now);
        let mut transmit = &bytes[40..48];
        let on_wire: TimestampFormat = transmit.read_bytes().unwrap();
        assert_eq!(on_wire, origin);
    }

    #[test]
    fn test_build_request_unset_clock() {
        let (bytes, origin) = build_request_packet(Timeval::ZERO);
        assert!(origin.is_zero());
        assert!(bytes[40..48].iter().all(|b| *b == 0));
    }
}
