// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Wall-clock access and the clock step applied after a sync decision.
//!
//! The engine only ever steps the clock: it reads the current time, adds the
//! averaged offset in integer microseconds and writes the result back. There
//! is no slewing.
//!
//! # Privileges
//!
//! [`SystemClock::set`] requires elevated privileges (root, or `CAP_SYS_TIME`
//! on Linux) and the `clock` feature. Without the feature it always returns
//! [`ClockError::Unsupported`].

#![allow(unsafe_code)]

use std::fmt;

use log::debug;
use ntpsync_proto::Timeval;

/// Error type for clock read and write operations.
#[derive(Debug)]
pub enum ClockError {
    /// The operation requires elevated privileges (root/admin).
    PermissionDenied,
    /// Platform-specific error with an OS error code.
    OsError(i32),
    /// Clock adjustment is not supported on this platform or build.
    Unsupported,
    /// The clock refused the new value without a more specific reason.
    WriteRejected,
}

impl fmt::Display for ClockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockError::PermissionDenied => write!(f, "permission denied (requires root/admin)"),
            ClockError::OsError(code) => write!(f, "OS error: {}", code),
            ClockError::Unsupported => write!(f, "clock adjustment not supported on this platform"),
            ClockError::WriteRejected => write!(f, "clock write rejected"),
        }
    }
}

impl std::error::Error for ClockError {}

/// The wall clock the engine reads and steps.
pub trait Clock {
    /// Current wall-clock time. A zero value means the clock has never been set.
    fn now(&self) -> Timeval;

    /// Step the clock to an absolute time.
    fn set(&mut self, time: Timeval) -> Result<(), ClockError>;
}

impl<C: Clock + ?Sized> Clock for Box<C> {
    fn now(&self) -> Timeval {
        (**self).now()
    }

    fn set(&mut self, time: Timeval) -> Result<(), ClockError> {
        (**self).set(time)
    }
}

/// The operating-system real-time clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timeval {
        Timeval::now()
    }

    fn set(&mut self, time: Timeval) -> Result<(), ClockError> {
        platform::set(time)
    }
}

/// Outcome of a successful clock step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AppliedOffset {
    /// Clock reading just before the step.
    pub previous: Timeval,
    /// The time written to the clock.
    pub new_time: Timeval,
    /// The offset that was added.
    pub offset: Timeval,
}

/// Step `clock` by `offset`.
///
/// The addition happens in integer microseconds so no precision is lost at
/// current epoch magnitudes. An overflowing result is reported as
/// [`ClockError::WriteRejected`] without touching the clock.
pub fn apply_offset<C: Clock + ?Sized>(
    clock: &mut C,
    offset: Timeval,
) -> Result<AppliedOffset, ClockError> {
    let previous = clock.now();
    let new_time = previous
        .checked_add(offset)
        .ok_or(ClockError::WriteRejected)?;
    clock.set(new_time)?;
    debug!("clock stepped by {} s: {} -> {}", offset, previous, new_time);
    Ok(AppliedOffset {
        previous,
        new_time,
        offset,
    })
}

/// Convert an OS errno to a [`ClockError`].
#[cfg(all(unix, feature = "clock"))]
fn os_error_from_errno() -> ClockError {
    let errno = std::io::Error::last_os_error().raw_os_error().unwrap_or(-1);
    if errno == libc::EPERM {
        ClockError::PermissionDenied
    } else {
        ClockError::OsError(errno)
    }
}

#[cfg(all(unix, feature = "clock"))]
mod platform {
    use super::*;

    pub(super) fn set(time: Timeval) -> Result<(), ClockError> {
        let mut tp: libc::timespec = unsafe { std::mem::zeroed() };
        let total_micros = time.as_micros();
        tp.tv_sec = total_micros.div_euclid(1_000_000) as _;
        tp.tv_nsec = (total_micros.rem_euclid(1_000_000) * 1_000) as _;

        let ret = unsafe { libc::clock_settime(libc::CLOCK_REALTIME, &tp) };
        if ret < 0 {
            return Err(os_error_from_errno());
        }
        Ok(())
    }
}

#[cfg(not(all(unix, feature = "clock")))]
mod platform {
    use super::*;

    pub(super) fn set(_time: Timeval) -> Result<(), ClockError> {
        Err(ClockError::Unsupported)
    }
}
