// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! NTPv4 wire types and the fixed 48-byte request/reply codec.
//!
//! This crate is the bottom layer of `ntpsync`: it knows how to lay out a
//! client request on the wire and how to turn a server reply back into
//! structured fields, and nothing else. It performs no I/O and keeps no state.

#![warn(missing_docs)]

/// Error types for buffer-based NTP packet parsing.
pub mod error;

/// NTP protocol types and constants (RFC 5905).
pub mod protocol;

/// Unix time values and conversion to and from NTP timestamps.
pub mod unix_time;

/// Request encoding and reply decoding into engine-facing values.
pub mod decoded;

pub use decoded::{DecodedPacket, decode_reply, encode_request};
pub use unix_time::Timeval;
