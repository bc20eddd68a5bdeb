// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Plausibility checks applied to a reply before its offset is trusted.
//!
//! Header checks always apply. The precision and dispersion checks only run
//! once the client has been synchronized at least partially, since before
//! that the local clock may be arbitrarily far off and any offset is worth
//! taking.

use std::fmt;

use ntpsync_proto::DecodedPacket;
use ntpsync_proto::protocol::{LeapIndicator, Mode, Version};

use crate::session::SyncStatus;

/// Why a reply was rejected.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Rejection {
    /// Leap indicator was not zero.
    LeapIndicator(u8),
    /// Protocol version was not 4.
    Version(u8),
    /// Mode was not server (4).
    Mode(u8),
    /// Stratum outside 1..=15.
    Stratum(u8),
    /// Server clock precision is coarser than a tenth of the accuracy target.
    Precision {
        /// Reported precision in seconds.
        precision: f64,
        /// Largest accepted precision in seconds.
        limit: f64,
    },
    /// Root dispersion is zero or larger than the offset it should bound.
    Dispersion {
        /// Reported root dispersion in seconds.
        dispersion: f64,
        /// Candidate offset in seconds.
        offset: f64,
    },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::LeapIndicator(li) => write!(f, "leap indicator error: {li}"),
            Rejection::Version(v) => write!(f, "NTP version error: {v}"),
            Rejection::Mode(m) => write!(f, "NTP mode error: {m}"),
            Rejection::Stratum(s) => write!(f, "peer stratum error: {s}"),
            Rejection::Precision { precision, limit } => write!(
                f,
                "peer precision error: {:.3} us > {:.3} us",
                precision * 1e6,
                limit * 1e6
            ),
            Rejection::Dispersion { dispersion, offset } => write!(
                f,
                "dispersion error: {:.3} ms vs offset {:.3} ms",
                dispersion * 1e3,
                offset * 1e3
            ),
        }
    }
}

/// Check a decoded reply against the current sync status.
///
/// `offset_us` is the candidate (averaged) offset in microseconds and
/// `min_sync_accuracy_us` the configured accuracy target.
pub fn check_response(
    packet: &DecodedPacket,
    offset_us: i64,
    status: SyncStatus,
    min_sync_accuracy_us: i64,
) -> Result<(), Rejection> {
    if packet.leap_indicator != LeapIndicator::NoWarning {
        return Err(Rejection::LeapIndicator(packet.leap_indicator as u8));
    }
    if packet.version != Version::V4 {
        return Err(Rejection::Version(packet.version.value()));
    }
    if packet.mode != Mode::Server {
        return Err(Rejection::Mode(packet.mode as u8));
    }
    if !packet.stratum.is_synchronizable() {
        return Err(Rejection::Stratum(packet.stratum.0));
    }

    if matches!(status, SyncStatus::Synced | SyncStatus::PartialSync) {
        let limit = min_sync_accuracy_us as f64 / 10_000_000.0;
        if packet.precision > limit {
            return Err(Rejection::Precision {
                precision: packet.precision,
                limit,
            });
        }

        let offset = (offset_us as f64 / 1_000_000.0).abs();
        if packet.dispersion > offset || packet.dispersion == 0.0 {
            return Err(Rejection::Dispersion {
                dispersion: packet.dispersion,
                offset,
            });
        }
    }

    Ok(())
}
