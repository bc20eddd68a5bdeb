// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! The request encoder and reply decoder the sync engine talks to.
//!
//! [`encode_request`] produces the exact 48 bytes a client puts on the wire.
//! [`decode_reply`] turns a server reply into a [`DecodedPacket`] whose timestamps
//! are Unix [`Timeval`]s and whose exponent and short-format fields are already
//! expanded to seconds.

use crate::error::ParseError;
use crate::protocol::{
    ConstPackedSizeBytes, FromBytes, LeapIndicator, Mode, Packet, Stratum, TimestampFormat,
    ToBytes, Version,
};
use crate::unix_time::{Timeval, timestamp_to_timeval};

/// A server reply with every field converted to the units the engine works in.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodedPacket {
    /// Leap indicator (0-3).
    pub leap_indicator: LeapIndicator,
    /// Protocol version (expected 4).
    pub version: Version,
    /// Association mode (expected [`Mode::Server`]).
    pub mode: Mode,
    /// Peer stratum.
    pub stratum: Stratum,
    /// Polling interval, `2^poll` seconds.
    pub poll_interval: f64,
    /// Peer clock precision, `2^precision` seconds.
    pub precision: f64,
    /// Root delay in seconds (may be negative).
    pub root_delay: f64,
    /// Root dispersion in seconds (may be negative).
    pub dispersion: f64,
    /// Raw reference identifier.
    pub reference_id: [u8; 4],
    /// Time the server clock was last set.
    pub reference: Timeval,
    /// T1: our transmit time, echoed back by the server.
    pub origin: Timeval,
    /// T2: server receipt time.
    pub receive: Timeval,
    /// T3: server transmit time.
    pub transmit: Timeval,
    /// T4: local receipt time, stamped by the transport.
    pub destination: Timeval,
    /// The origin field exactly as it appeared on the wire, for echo matching.
    pub origin_timestamp: TimestampFormat,
}

/// Build a client request carrying `now` in its transmit field.
///
/// A zero `now` (local clock never set) leaves transmit zero, which tells the
/// server the client is unsynchronized.
pub fn encode_request(now: Timeval) -> [u8; Packet::PACKED_SIZE_BYTES] {
    let mut buf = [0u8; Packet::PACKED_SIZE_BYTES];
    let packet = request_packet(now);
    // The buffer is exactly PACKED_SIZE_BYTES, the only length to_bytes rejects.
    if packet.to_bytes(&mut buf).is_err() {
        buf = [0u8; Packet::PACKED_SIZE_BYTES];
    }
    buf
}

/// The request header [`encode_request`] serializes.
pub fn request_packet(now: Timeval) -> Packet {
    let transmit_timestamp = if now.is_zero() {
        TimestampFormat::default()
    } else {
        now.into()
    };
    Packet {
        transmit_timestamp,
        ..Packet::default()
    }
}

/// Decode a server reply received at `destination` (local time, T4).
///
/// Fails with [`ParseError::BufferTooShort`] when fewer than 48 bytes are given.
/// Bytes after the header are ignored. The destination time is also the pivot used
/// to place 32-bit timestamps in the right NTP era.
pub fn decode_reply(bytes: &[u8], destination: Timeval) -> Result<DecodedPacket, ParseError> {
    let (packet, _) = Packet::from_bytes(bytes)?;
    Ok(DecodedPacket {
        leap_indicator: packet.leap_indicator,
        version: packet.version,
        mode: packet.mode,
        stratum: packet.stratum,
        poll_interval: 2f64.powi(packet.poll as i32),
        precision: 2f64.powi(packet.precision as i32),
        root_delay: packet.root_delay.to_secs(),
        dispersion: packet.root_dispersion.to_secs(),
        reference_id: packet.reference_id,
        reference: timestamp_to_timeval(packet.reference_timestamp, &destination),
        origin: timestamp_to_timeval(packet.origin_timestamp, &destination),
        receive: timestamp_to_timeval(packet.receive_timestamp, &destination),
        transmit: timestamp_to_timeval(packet.transmit_timestamp, &destination),
        destination,
        origin_timestamp: packet.origin_timestamp,
    })
}
