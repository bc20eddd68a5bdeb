// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Collaborators the engine drives but does not own.
//!
//! The engine performs no I/O of its own. The host supplies a [`Transport`]
//! for sending datagrams, a [`Resolver`] for the server name, a [`Scheduler`]
//! for the response timeout and a [`Clock`](crate::clock::Clock). Replies and
//! timer expiries are pushed back in through
//! [`SyncEngine::on_datagram`](crate::engine::SyncEngine::on_datagram) and
//! [`SyncEngine::on_timeout`](crate::engine::SyncEngine::on_timeout).
//!
//! [`Connectivity`] is only consulted by the periodic driver.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::error::{ResolveError, SendError};

/// Fire-and-forget datagram sender.
pub trait Transport {
    /// Send `bytes` to `addr` without waiting for a reply.
    fn send(&mut self, addr: SocketAddr, bytes: &[u8]) -> Result<(), SendError>;
}

/// Host name resolution.
pub trait Resolver {
    /// Resolve `host` to one address.
    fn resolve(&mut self, host: &str) -> Result<IpAddr, ResolveError>;
}

/// Identifies one armed timer.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TimerHandle(pub u64);

/// One-shot timers.
///
/// When a timer fires the host calls
/// [`SyncEngine::on_timeout`](crate::engine::SyncEngine::on_timeout) with its
/// handle. Handles that no longer match the pending request are ignored, so a
/// host that cannot retract a timer in flight stays correct.
pub trait Scheduler {
    /// Arm a timer that fires after `after`.
    fn schedule(&mut self, after: Duration) -> TimerHandle;

    /// Disarm a timer. Unknown or already fired handles are ignored.
    fn cancel(&mut self, handle: TimerHandle);
}

/// Network presence probe.
pub trait Connectivity {
    /// Whether the network is usable right now.
    fn is_up(&self) -> bool;
}

/// A probe that always reports the network as up.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysUp;

impl Connectivity for AlwaysUp {
    fn is_up(&self) -> bool {
        true
    }
}

impl<F: Fn() -> bool> Connectivity for F {
    fn is_up(&self) -> bool {
        self()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, addr: SocketAddr, bytes: &[u8]) -> Result<(), SendError> {
        (**self).send(addr, bytes)
    }
}

impl<R: Resolver + ?Sized> Resolver for Box<R> {
    fn resolve(&mut self, host: &str) -> Result<IpAddr, ResolveError> {
        (**self).resolve(host)
    }
}

impl<S: Scheduler + ?Sized> Scheduler for Box<S> {
    fn schedule(&mut self, after: Duration) -> TimerHandle {
        (**self).schedule(after)
    }

    fn cancel(&mut self, handle: TimerHandle) {
        (**self).cancel(handle)
    }
}

/// A resolver for IP literals only. Any other name fails with
/// [`ResolveError::NotFound`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LiteralResolver;

impl Resolver for LiteralResolver {
    fn resolve(&mut self, host: &str) -> Result<IpAddr, ResolveError> {
        host.parse().map_err(|_| ResolveError::NotFound {
            host: host.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::net::Ipv4Addr;

    #[test]
    fn test_literal_resolver() {
        let mut r = LiteralResolver;
        assert_eq!(
            r.resolve("192.0.2.7").unwrap(),
            IpAddr::V4(Ipv4Addr::new(192, 0, 2, 7))
        );
        assert!(matches!(
            r.resolve("pool.ntp.org"),
            Err(ResolveError::NotFound { .. })
        ));
    }

    #[test]
    fn test_closure_connectivity() {
        let up = Cell::new(false);
        let probe = || up.get();
        assert!(!probe.is_up());
        up.set(true);
        assert!(probe.is_up());
        assert!(AlwaysUp.is_up());
    }
}
