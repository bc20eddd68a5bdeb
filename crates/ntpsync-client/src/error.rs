// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Error types for the synchronization engine and its collaborators.
//!
//! None of these is fatal to the engine. Configuration errors are returned to
//! the caller of a setter; transport, resolution and clock errors are turned
//! into [`SyncEvent`](crate::event::SyncEvent)s and retried on the next poll.
//!
//! [`NtpSyncError`] wraps every category and converts into [`io::Error`] for
//! host code that prefers `io::Result`:
//!
//! ```
//! use ntpsync_client::error::{ConfigError, NtpSyncError};
//!
//! let err: std::io::Error = NtpSyncError::Config(ConfigError::EmptyServerName).into();
//! assert_eq!(err.kind(), std::io::ErrorKind::InvalidInput);
//! ```

// Re-export proto error types so callers need only one import path.
pub use ntpsync_proto::error::ParseError;

pub use crate::clock::ClockError;

use std::fmt;
use std::io;
use std::time::Duration;

/// Any error surfaced by `ntpsync_client`.
#[derive(Debug)]
pub enum NtpSyncError {
    /// A setter or builder rejected a value.
    Config(ConfigError),
    /// The transport could not send a request.
    Send(SendError),
    /// The server name could not be resolved.
    Resolve(ResolveError),
    /// The system clock could not be read or stepped.
    Clock(ClockError),
    /// A reply could not be decoded.
    Parse(ParseError),
}

/// Rejected configuration values.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// A poll interval below the floor.
    IntervalTooShort {
        /// The value that was asked for.
        requested: Duration,
        /// The smallest accepted value.
        minimum: Duration,
    },
    /// A response timeout below the floor.
    TimeoutTooShort {
        /// The value that was asked for.
        requested: Duration,
        /// The smallest accepted value.
        minimum: Duration,
    },
    /// An empty server host name.
    EmptyServerName,
    /// A counter that must be at least one was zero.
    ZeroCount {
        /// Name of the setting.
        setting: &'static str,
    },
}

/// Failures reported by a [`Transport`](crate::host::Transport) when sending.
#[derive(Debug)]
pub enum SendError {
    /// The local port is unusable (already bound, or the socket is gone).
    InvalidPort,
    /// The destination is unroutable.
    InvalidAddress,
    /// Any other I/O failure.
    Io(io::Error),
}

/// Failures reported by a [`Resolver`](crate::host::Resolver).
#[derive(Debug)]
pub enum ResolveError {
    /// The name resolved to no usable address.
    NotFound {
        /// The host name that was looked up.
        host: String,
    },
    /// The lookup itself failed.
    Io(io::Error),
}

// ── Display implementations ─────────────────────────────────────────

impl fmt::Display for NtpSyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NtpSyncError::Config(e) => write!(f, "NTP config error: {e}"),
            NtpSyncError::Send(e) => write!(f, "NTP send error: {e}"),
            NtpSyncError::Resolve(e) => write!(f, "NTP resolve error: {e}"),
            NtpSyncError::Clock(e) => write!(f, "clock error: {e}"),
            NtpSyncError::Parse(e) => write!(f, "NTP parse error: {e}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IntervalTooShort { requested, minimum } => write!(
                f,
                "sync interval {}s is below the minimum of {}s",
                requested.as_secs(),
                minimum.as_secs()
            ),
            ConfigError::TimeoutTooShort { requested, minimum } => write!(
                f,
                "response timeout {}ms is below the minimum of {}ms",
                requested.as_millis(),
                minimum.as_millis()
            ),
            ConfigError::EmptyServerName => write!(f, "server name must not be empty"),
            ConfigError::ZeroCount { setting } => write!(f, "{setting} must be at least 1"),
        }
    }
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::InvalidPort => write!(f, "local port unavailable"),
            SendError::InvalidAddress => write!(f, "destination unreachable"),
            SendError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::NotFound { host } => {
                write!(f, "host name resolved to no addresses: {host}")
            }
            ResolveError::Io(e) => write!(f, "{e}"),
        }
    }
}

// ── Error trait implementations ─────────────────────────────────────

impl std::error::Error for NtpSyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NtpSyncError::Config(e) => Some(e),
            NtpSyncError::Send(e) => Some(e),
            NtpSyncError::Resolve(e) => Some(e),
            NtpSyncError::Clock(e) => Some(e),
            NtpSyncError::Parse(e) => Some(e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl std::error::Error for SendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SendError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResolveError::Io(e) => Some(e),
            _ => None,
        }
    }
}

// ── From conversions ────────────────────────────────────────────────

impl From<io::Error> for SendError {
    fn from(err: io::Error) -> SendError {
        match err.kind() {
            io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => SendError::InvalidPort,
            io::ErrorKind::NetworkUnreachable | io::ErrorKind::HostUnreachable => {
                SendError::InvalidAddress
            }
            _ => SendError::Io(err),
        }
    }
}

impl From<io::Error> for ResolveError {
    fn from(err: io::Error) -> ResolveError {
        ResolveError::Io(err)
    }
}

impl From<ConfigError> for NtpSyncError {
    fn from(err: ConfigError) -> NtpSyncError {
        NtpSyncError::Config(err)
    }
}

impl From<SendError> for NtpSyncError {
    fn from(err: SendError) -> NtpSyncError {
        NtpSyncError::Send(err)
    }
}

impl From<ResolveError> for NtpSyncError {
    fn from(err: ResolveError) -> NtpSyncError {
        NtpSyncError::Resolve(err)
    }
}

impl From<ClockError> for NtpSyncError {
    fn from(err: ClockError) -> NtpSyncError {
        NtpSyncError::Clock(err)
    }
}

impl From<ParseError> for NtpSyncError {
    fn from(err: ParseError) -> NtpSyncError {
        NtpSyncError::Parse(err)
    }
}

impl From<NtpSyncError> for io::Error {
    fn from(err: NtpSyncError) -> io::Error {
        let kind = match &err {
            NtpSyncError::Config(_) => io::ErrorKind::InvalidInput,
            NtpSyncError::Send(SendError::Io(e)) => e.kind(),
            NtpSyncError::Send(SendError::InvalidPort) => io::ErrorKind::AddrInUse,
            NtpSyncError::Send(SendError::InvalidAddress) => io::ErrorKind::NetworkUnreachable,
            NtpSyncError::Resolve(_) => io::ErrorKind::NotFound,
            NtpSyncError::Clock(ClockError::PermissionDenied) => io::ErrorKind::PermissionDenied,
            NtpSyncError::Clock(ClockError::Unsupported) => io::ErrorKind::Unsupported,
            NtpSyncError::Clock(_) => io::ErrorKind::Other,
            NtpSyncError::Parse(_) => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, err)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
