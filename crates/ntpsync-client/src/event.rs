// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Events reported to the host application.
//!
//! The engine emits exactly one [`SyncEvent`] per meaningful outcome, after
//! all state changes for that outcome are done. Every event names the server
//! it concerns; sync outcomes also carry the offset, delay and dispersion
//! behind the decision.

use std::fmt;
use std::net::IpAddr;

use ntpsync_proto::Timeval;

use crate::request::Measurement;

/// The server an event concerns.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ServerAddr {
    /// Configured host name.
    pub host: String,
    /// Resolved address, if resolution succeeded.
    pub ip: Option<IpAddr>,
    /// Server port.
    pub port: u16,
}

impl fmt::Display for ServerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ip {
            Some(IpAddr::V6(ip)) => write!(f, "[{}]:{}", ip, self.port),
            Some(IpAddr::V4(ip)) => write!(f, "{}:{}", ip, self.port),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

/// The kind of a [`SyncEvent`], without its payload.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum SyncEventKind {
    /// A request went out.
    RequestSent,
    /// A reply was too short or malformed.
    ResponseError,
    /// No reply arrived before the timeout.
    NoResponse,
    /// The server name could not be resolved or is unroutable.
    InvalidAddress,
    /// The local port is unusable.
    InvalidPort,
    /// The request could not be sent.
    ErrorSending,
    /// Repeated replies failed validation.
    AccuracyError,
    /// The offset was under the threshold; the clock was left alone.
    SyncNotNeeded,
    /// The clock is synchronized.
    TimeSyncd,
    /// The clock was stepped but needs another round.
    PartlySync,
    /// Stepping the clock failed.
    SyncError,
}

/// An outcome reported by the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncEvent {
    /// A request was sent.
    RequestSent {
        /// Destination.
        server: ServerAddr,
    },
    /// A short or malformed reply was received.
    ResponseError {
        /// Source of the reply.
        server: ServerAddr,
    },
    /// The response timeout fired.
    NoResponse {
        /// Server that did not answer.
        server: ServerAddr,
    },
    /// Resolution failed or the destination is unroutable.
    InvalidAddress {
        /// Server concerned.
        server: ServerAddr,
    },
    /// The local port could not be used.
    InvalidPort {
        /// Server concerned.
        server: ServerAddr,
    },
    /// The transport failed to send.
    ErrorSending {
        /// Server concerned.
        server: ServerAddr,
    },
    /// Too many consecutive replies failed validation.
    AccuracyError {
        /// Source of the last rejected reply.
        server: ServerAddr,
        /// Candidate offset and the reply's dispersion.
        measurement: Measurement,
    },
    /// The averaged offset was below the threshold.
    SyncNotNeeded {
        /// Source of the reply.
        server: ServerAddr,
        /// Averaged offset, delay and dispersion.
        measurement: Measurement,
    },
    /// Synchronization completed.
    TimeSyncd {
        /// Source of the reply.
        server: ServerAddr,
        /// Applied offset, delay and dispersion.
        measurement: Measurement,
        /// Local time after the step.
        time: Timeval,
    },
    /// A step was applied but the residual error is above target.
    PartlySync {
        /// Source of the reply.
        server: ServerAddr,
        /// Applied offset, delay and dispersion.
        measurement: Measurement,
        /// Retry count so far.
        retries: u32,
        /// Local time after the step.
        time: Timeval,
    },
    /// The clock rejected the step.
    SyncError {
        /// Source of the reply.
        server: ServerAddr,
        /// The offset that could not be applied, in seconds.
        offset: f64,
    },
}

impl SyncEvent {
    /// The event kind.
    pub fn kind(&self) -> SyncEventKind {
        match self {
            SyncEvent::RequestSent { .. } => SyncEventKind::RequestSent,
            SyncEvent::ResponseError { .. } => SyncEventKind::ResponseError,
            SyncEvent::NoResponse { .. } => SyncEventKind::NoResponse,
            SyncEvent::InvalidAddress { .. } => SyncEventKind::InvalidAddress,
            SyncEvent::InvalidPort { .. } => SyncEventKind::InvalidPort,
            SyncEvent::ErrorSending { .. } => SyncEventKind::ErrorSending,
            SyncEvent::AccuracyError { .. } => SyncEventKind::AccuracyError,
            SyncEvent::SyncNotNeeded { .. } => SyncEventKind::SyncNotNeeded,
            SyncEvent::TimeSyncd { .. } => SyncEventKind::TimeSyncd,
            SyncEvent::PartlySync { .. } => SyncEventKind::PartlySync,
            SyncEvent::SyncError { .. } => SyncEventKind::SyncError,
        }
    }

    /// The server the event concerns.
    pub fn server(&self) -> &ServerAddr {
        match self {
            SyncEvent::RequestSent { server }
            | SyncEvent::ResponseError { server }
            | SyncEvent::NoResponse { server }
            | SyncEvent::InvalidAddress { server }
            | SyncEvent::InvalidPort { server }
            | SyncEvent::ErrorSending { server }
            | SyncEvent::AccuracyError { server, .. }
            | SyncEvent::SyncNotNeeded { server, .. }
            | SyncEvent::TimeSyncd { server, .. }
            | SyncEvent::PartlySync { server, .. }
            | SyncEvent::SyncError { server, .. } => server,
        }
    }

    /// The measurement behind a sync outcome, if any.
    pub fn measurement(&self) -> Option<&Measurement> {
        match self {
            SyncEvent::AccuracyError { measurement, .. }
            | SyncEvent::SyncNotNeeded { measurement, .. }
            | SyncEvent::TimeSyncd { measurement, .. }
            | SyncEvent::PartlySync { measurement, .. } => Some(measurement),
            _ => None,
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::RequestSent { server } => write!(f, "NTP request sent to {server}"),
            SyncEvent::ResponseError { server } => {
                write!(f, "NTP response error from {server}")
            }
            SyncEvent::NoResponse { server } => {
                write!(f, "No response from NTP server {server}")
            }
            SyncEvent::InvalidAddress { server } => match server.ip {
                Some(ip) => write!(f, "Invalid address {ip}"),
                None => write!(f, "Invalid address {}", server.host),
            },
            SyncEvent::InvalidPort { server } => write!(f, "Invalid port {}", server.port),
            SyncEvent::ErrorSending { .. } => write!(f, "Error sending NTP request"),
            SyncEvent::AccuracyError {
                server,
                measurement: m,
            } => write!(
                f,
                "Accuracy error from {server}. Offset: {:.3} ms. Dispersion: {:.3} ms",
                m.offset * 1000.0,
                m.dispersion * 1000.0
            ),
            SyncEvent::SyncNotNeeded {
                server,
                measurement: m,
            } => write!(
                f,
                "Sync not needed from {server}. Offset: {:.3} ms. Dispersion: {:.3} ms",
                m.offset * 1000.0,
                m.dispersion * 1000.0
            ),
            SyncEvent::TimeSyncd {
                server,
                measurement: m,
                time,
            } => write!(
                f,
                "Got NTP time {time} from {server}. Offset: {:.3} ms. Delay: {:.3} ms. Dispersion: {:.3} ms",
                m.offset * 1000.0,
                m.delay * 1000.0,
                m.dispersion * 1000.0
            ),
            SyncEvent::PartlySync {
                server,
                measurement: m,
                retries,
                time,
            } => write!(
                f,
                "#{retries} Partial sync {time} from {server}. Offset: {:.3} ms. Delay: {:.3} ms. Dispersion: {:.3} ms",
                m.offset * 1000.0,
                m.delay * 1000.0,
                m.dispersion * 1000.0
            ),
            SyncEvent::SyncError { .. } => write!(f, "Error applying sync"),
        }
    }
}
