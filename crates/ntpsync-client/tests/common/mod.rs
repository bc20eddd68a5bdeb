// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for integration tests.

// Integration test helpers are `pub` so each `tests/*.rs` file can import them
// via `mod common`, but clippy flags them as unreachable outside the crate.
#![allow(unreachable_pub)]
#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use ntpsync_client::clock::{Clock, ClockError};
use ntpsync_client::error::{ResolveError, SendError};
use ntpsync_client::host::{Resolver, Scheduler, TimerHandle, Transport};
use ntpsync_client::protocol::{
    LeapIndicator, Mode, Packet, ReadBytes, ShortFormat, Stratum, TimestampFormat, ToBytes,
    Version,
};
use ntpsync_client::Timeval;

pub const SERVER_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 123));

pub fn server_addr() -> SocketAddr {
    SocketAddr::new(SERVER_IP, 123)
}

// ── Mock collaborators ──────────────────────────────────────────────

/// Records every datagram; optionally fails instead.
#[derive(Default)]
pub struct MockTransport {
    pub sent: Vec<(SocketAddr, Vec<u8>)>,
    pub fail_with: Option<fn() -> SendError>,
}

impl Transport for MockTransport {
    fn send(&mut self, addr: SocketAddr, bytes: &[u8]) -> Result<(), SendError> {
        if let Some(make) = self.fail_with {
            return Err(make());
        }
        self.sent.push((addr, bytes.to_vec()));
        Ok(())
    }
}

/// Resolves every name to one address, or to nothing.
pub struct MockResolver {
    pub answer: Option<IpAddr>,
    pub lookups: usize,
}

impl Default for MockResolver {
    fn default() -> Self {
        MockResolver {
            answer: Some(SERVER_IP),
            lookups: 0,
        }
    }
}

impl Resolver for MockResolver {
    fn resolve(&mut self, host: &str) -> Result<IpAddr, ResolveError> {
        self.lookups += 1;
        self.answer.ok_or_else(|| ResolveError::NotFound {
            host: host.to_owned(),
        })
    }
}

/// Hands out sequential handles and tracks which are armed.
#[derive(Default)]
pub struct MockScheduler {
    next: u64,
    pub armed: Vec<(TimerHandle, Duration)>,
}

impl MockScheduler {
    /// The most recently armed timer still outstanding.
    pub fn last_armed(&self) -> Option<TimerHandle> {
        self.armed.last().map(|(h, _)| *h)
    }
}

impl Scheduler for MockScheduler {
    fn schedule(&mut self, after: Duration) -> TimerHandle {
        self.next += 1;
        let handle = TimerHandle(self.next);
        self.armed.push((handle, after));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        self.armed.retain(|(h, _)| *h != handle);
    }
}

/// A settable clock that records every write.
pub struct MockClock {
    pub now: Timeval,
    pub writes: Vec<Timeval>,
    pub reject: bool,
}

impl MockClock {
    pub fn at(now: Timeval) -> Self {
        MockClock {
            now,
            writes: Vec::new(),
            reject: false,
        }
    }
}

impl Clock for MockClock {
    fn now(&self) -> Timeval {
        self.now
    }

    fn set(&mut self, time: Timeval) -> Result<(), ClockError> {
        if self.reject {
            return Err(ClockError::WriteRejected);
        }
        self.writes.push(time);
        self.now = time;
        Ok(())
    }
}

// ── Server replies ──────────────────────────────────────────────────

/// Header fields of a synthetic server reply.
#[derive(Clone, Copy, Debug)]
pub struct ReplySpec {
    pub leap_indicator: LeapIndicator,
    pub version: Version,
    pub mode: Mode,
    pub stratum: u8,
    pub precision: i8,
    pub dispersion: ShortFormat,
    /// Replace the echoed origin with this value.
    pub origin_override: Option<TimestampFormat>,
}

impl Default for ReplySpec {
    fn default() -> Self {
        ReplySpec {
            leap_indicator: LeapIndicator::NoWarning,
            version: Version::V4,
            mode: Mode::Server,
            stratum: 2,
            precision: -23,
            // 16 / 65536 s, about 244 us.
            dispersion: ShortFormat {
                seconds: 0,
                fraction: 16,
            },
            origin_override: None,
        }
    }
}

/// Build a reply to `request` whose receive and transmit timestamps both read
/// `server_time`. The request's transmit timestamp is echoed as origin.
pub fn reply_for(request: &[u8], server_time: Timeval, spec: &ReplySpec) -> [u8; 48] {
    let mut transmit = &request[40..48];
    let echoed: TimestampFormat = transmit.read_bytes().expect("request transmit field");
    let stamp = TimestampFormat::from(server_time);
    let packet = Packet {
        leap_indicator: spec.leap_indicator,
        version: spec.version,
        mode: spec.mode,
        stratum: Stratum(spec.stratum),
        poll: 6,
        precision: spec.precision,
        root_delay: ShortFormat::default(),
        root_dispersion: spec.dispersion,
        reference_id: *b"LOCL",
        reference_timestamp: stamp,
        origin_timestamp: spec.origin_override.unwrap_or(echoed),
        receive_timestamp: stamp,
        transmit_timestamp: stamp,
    };
    let mut buf = [0u8; 48];
    packet.to_bytes(&mut buf).expect("48-byte buffer");
    buf
}
