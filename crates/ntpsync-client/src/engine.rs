// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! The sans-IO synchronization engine.
//!
//! [`SyncEngine`] owns the sync session and the single pending request. It is
//! driven from outside: the host calls [`trigger_sync`](SyncEngine::trigger_sync)
//! whenever [`actual_interval`](SyncEngine::actual_interval) has elapsed, and
//! feeds replies and timer expiries back through
//! [`on_datagram`](SyncEngine::on_datagram) and
//! [`on_timeout`](SyncEngine::on_timeout). Every call runs to completion
//! without blocking, so a single owner (or a mutex around the engine) is all
//! the synchronization a host needs.
//!
//! # Examples
//!
//! ```
//! use std::net::SocketAddr;
//! use std::time::Duration;
//! use ntpsync_client::clock::{Clock, ClockError};
//! use ntpsync_client::config::SyncConfig;
//! use ntpsync_client::engine::SyncEngine;
//! use ntpsync_client::error::SendError;
//! use ntpsync_client::host::{LiteralResolver, Scheduler, TimerHandle, Transport};
//! use ntpsync_client::Timeval;
//!
//! struct NullTransport;
//! impl Transport for NullTransport {
//!     fn send(&mut self, _: SocketAddr, _: &[u8]) -> Result<(), SendError> { Ok(()) }
//! }
//! struct NullScheduler;
//! impl Scheduler for NullScheduler {
//!     fn schedule(&mut self, _: Duration) -> TimerHandle { TimerHandle(1) }
//!     fn cancel(&mut self, _: TimerHandle) {}
//! }
//! struct FrozenClock;
//! impl Clock for FrozenClock {
//!     fn now(&self) -> Timeval { Timeval::new(1_700_000_000, 0) }
//!     fn set(&mut self, _: Timeval) -> Result<(), ClockError> { Err(ClockError::Unsupported) }
//! }
//!
//! let mut engine = SyncEngine::new(
//!     SyncConfig::default(),
//!     NullTransport,
//!     LiteralResolver,
//!     NullScheduler,
//!     FrozenClock,
//! );
//! engine.on_sync_event(|event| println!("{event}"));
//! engine.begin("192.0.2.1").unwrap();
//! assert!(engine.is_pending());
//!
//! engine.on_timeout(TimerHandle(1));
//! assert!(!engine.is_pending());
//! ```

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tracing::{debug, trace, warn};

use ntpsync_proto::protocol::TimestampFormat;
use ntpsync_proto::{Timeval, decode_reply};

use crate::clock::{Clock, apply_offset};
use crate::config::{self, SyncConfig};
use crate::error::{ConfigError, SendError};
use crate::event::{ServerAddr, SyncEvent};
use crate::host::{Resolver, Scheduler, TimerHandle, Transport};
use crate::request::{Measurement, build_request_packet};
use crate::session::{PollSelection, SyncSession, SyncStatus};
use crate::validate::check_response;

type EventSink = Box<dyn FnMut(&SyncEvent) + Send>;

/// The request currently awaiting a reply.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct PendingRequest {
    /// Transmit timestamp a genuine reply echoes as its origin.
    origin: TimestampFormat,
    timer: TimerHandle,
    server: SocketAddr,
}

/// Single-server NTP synchronization engine.
pub struct SyncEngine<T, R, S, C> {
    config: SyncConfig,
    session: SyncSession,
    pending: Option<PendingRequest>,
    server_ip: Option<IpAddr>,
    transport: T,
    resolver: R,
    scheduler: S,
    clock: C,
    sink: Option<EventSink>,
}

impl<T, R, S, C> SyncEngine<T, R, S, C>
where
    T: Transport,
    R: Resolver,
    S: Scheduler,
    C: Clock,
{
    /// Create an idle engine. Nothing is sent until [`begin`](Self::begin) or
    /// [`trigger_sync`](Self::trigger_sync).
    pub fn new(config: SyncConfig, transport: T, resolver: R, scheduler: S, clock: C) -> Self {
        let session = SyncSession::new(config.num_ave_rounds);
        SyncEngine {
            config,
            session,
            pending: None,
            server_ip: None,
            transport,
            resolver,
            scheduler,
            clock,
            sink: None,
        }
    }

    /// Register the observer that receives every [`SyncEvent`], replacing
    /// any previous one.
    pub fn on_sync_event<F>(&mut self, sink: F)
    where
        F: FnMut(&SyncEvent) + Send + 'static,
    {
        self.sink = Some(Box::new(sink));
    }

    /// Set the server and send the first request.
    pub fn begin(&mut self, server: &str) -> Result<(), ConfigError> {
        self.set_server(server)?;
        debug!(server, "starting NTP sync");
        self.trigger_sync();
        Ok(())
    }

    // ── Configuration ───────────────────────────────────────────────

    /// Change the server host name. Takes effect on the next request.
    pub fn set_server(&mut self, server: &str) -> Result<(), ConfigError> {
        config::check_server(server)?;
        if self.config.server != server {
            self.config.server = server.to_owned();
            self.server_ip = None;
        }
        Ok(())
    }

    /// Set the long (steady-state) poll interval.
    ///
    /// Values below [`MIN_INTERVAL`](crate::config::MIN_INTERVAL) are rejected
    /// and leave the current setting untouched.
    pub fn set_interval(&mut self, long: Duration) -> Result<(), ConfigError> {
        config::check_interval(long)?;
        self.config.long_interval = long;
        if self.session.status == SyncStatus::Synced {
            self.session.poll = PollSelection::Long;
        }
        debug!(long_s = long.as_secs(), "sync interval set");
        Ok(())
    }

    /// Set both poll intervals. Either value below the floor rejects both.
    pub fn set_intervals(&mut self, short: Duration, long: Duration) -> Result<(), ConfigError> {
        config::check_interval(short)?;
        config::check_interval(long)?;
        self.config.short_interval = short;
        self.config.long_interval = long;
        self.session.poll = if self.session.status == SyncStatus::Synced {
            PollSelection::Long
        } else {
            PollSelection::Short
        };
        debug!(
            short_s = short.as_secs(),
            long_s = long.as_secs(),
            "sync intervals set"
        );
        Ok(())
    }

    /// Set the response timeout, which is also the fast re-poll interval.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<(), ConfigError> {
        config::check_timeout(timeout)?;
        self.config.timeout = timeout;
        Ok(())
    }

    /// Offsets below this many microseconds leave the clock alone.
    pub fn set_time_sync_threshold(&mut self, us: i64) {
        self.config.time_sync_threshold_us = us;
    }

    /// Residual error bound for a full sync, in microseconds.
    pub fn set_min_sync_accuracy(&mut self, us: i64) {
        self.config.min_sync_accuracy_us = us;
    }

    /// Partial-sync retry budget.
    pub fn set_max_num_sync_retry(&mut self, n: u32) {
        self.config.max_num_sync_retry = n;
    }

    /// Validation failures tolerated before an accuracy error is reported.
    pub fn set_max_dispersion_errors(&mut self, n: u32) {
        self.config.max_dispersion_errors = n;
    }

    /// Samples averaged into one candidate offset. Must be at least one.
    pub fn set_num_ave_rounds(&mut self, n: u32) -> Result<(), ConfigError> {
        config::check_rounds(n)?;
        self.config.num_ave_rounds = n;
        self.session.averager.set_target(n);
        Ok(())
    }

    /// Enable or disable origin echo matching.
    pub fn set_verify_origin(&mut self, verify: bool) {
        self.config.verify_origin = verify;
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// Current configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Session state.
    pub fn session(&self) -> &SyncSession {
        &self.session
    }

    /// Current sync status.
    pub fn status(&self) -> SyncStatus {
        self.session.status
    }

    /// Time set by the most recent successful clock step.
    pub fn last_sync(&self) -> Option<Timeval> {
        self.session.last_sync
    }

    /// Time set by the first successful clock step.
    pub fn first_sync(&self) -> Option<Timeval> {
        self.session.first_sync
    }

    /// Time elapsed since the first successful sync, zero before it.
    pub fn uptime(&self, now: Timeval) -> Duration {
        match self.session.first_sync {
            Some(first) => Duration::from_secs((now.secs() - first.secs()).max(0) as u64),
            None => Duration::ZERO,
        }
    }

    /// The short poll interval.
    pub fn short_interval(&self) -> Duration {
        self.config.short_interval
    }

    /// The long poll interval.
    pub fn long_interval(&self) -> Duration {
        self.config.long_interval
    }

    /// The response timeout.
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// How long the driver should wait before the next [`trigger_sync`](Self::trigger_sync).
    pub fn actual_interval(&self) -> Duration {
        self.session.poll.resolve(
            self.config.short_interval,
            self.config.long_interval,
            self.config.timeout,
        )
    }

    /// Whether a request is awaiting its reply or timeout.
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Last resolved server address.
    pub fn server_ip(&self) -> Option<IpAddr> {
        self.server_ip
    }

    /// The clock collaborator.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The clock collaborator, mutably.
    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// The transport collaborator.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The transport collaborator, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The scheduler collaborator.
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// The scheduler collaborator, mutably.
    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// The resolver collaborator, mutably.
    pub fn resolver_mut(&mut self) -> &mut R {
        &mut self.resolver
    }

    // ── Request / timeout control ───────────────────────────────────

    /// Send a request unless one is already outstanding.
    pub fn trigger_sync(&mut self) {
        if self.pending.is_some() {
            trace!("request already pending, not sending another");
            return;
        }

        let ip = match self.resolver.resolve(&self.config.server) {
            Ok(ip) => ip,
            Err(e) => {
                warn!(server = %self.config.server, error = %e, "server name resolution failed");
                self.server_ip = None;
                self.session.poll = PollSelection::Short;
                let server = self.server_addr();
                self.emit(SyncEvent::InvalidAddress { server });
                return;
            }
        };
        self.server_ip = Some(ip);
        let dest = SocketAddr::new(ip, self.config.port);

        let (bytes, origin) = build_request_packet(self.clock.now());
        let timer = self.scheduler.schedule(self.config.timeout);

        if let Err(e) = self.transport.send(dest, &bytes) {
            self.scheduler.cancel(timer);
            warn!(server = %dest, error = %e, "failed to send NTP request");
            let server = self.server_addr();
            let event = match e {
                SendError::InvalidPort => SyncEvent::InvalidPort { server },
                SendError::InvalidAddress => SyncEvent::InvalidAddress { server },
                SendError::Io(_) => SyncEvent::ErrorSending { server },
            };
            self.emit(event);
            return;
        }

        self.pending = Some(PendingRequest {
            origin,
            timer,
            server: dest,
        });
        trace!(server = %dest, timeout_ms = self.config.timeout.as_millis() as u64, "request pending");
        let server = self.server_addr();
        self.emit(SyncEvent::RequestSent { server });
    }

    /// A timer armed by this engine fired.
    pub fn on_timeout(&mut self, handle: TimerHandle) {
        match self.pending {
            Some(p) if p.timer == handle => {}
            _ => {
                trace!(?handle, "stale timer ignored");
                return;
            }
        }
        self.pending = None;
        self.session.mark_unsynced();
        debug!(server = %self.config.server, "NTP response timeout");
        let server = self.server_addr();
        self.emit(SyncEvent::NoResponse { server });
    }

    /// A datagram arrived from `from`, stamped with the local receive time.
    pub fn on_datagram(&mut self, bytes: &[u8], from: SocketAddr, received_at: Timeval) {
        let Some(pending) = self.pending else {
            debug!(%from, "unsolicited NTP reply discarded");
            return;
        };

        if self.config.verify_origin && from != pending.server {
            debug!(%from, expected = %pending.server, "reply from unexpected source discarded");
            return;
        }

        let reply = match decode_reply(bytes, received_at) {
            Ok(reply) => reply,
            Err(e) => {
                self.retire(pending);
                self.session.status = SyncStatus::Unsynced;
                debug!(%from, error = %e, "malformed NTP reply");
                let server = self.server_addr();
                self.emit(SyncEvent::ResponseError { server });
                return;
            }
        };

        if self.config.verify_origin && reply.origin_timestamp != pending.origin {
            debug!(%from, "reply origin does not match pending request, discarded");
            return;
        }

        self.retire(pending);

        let sample = Measurement::from_reply(&reply);
        let offset_us = sample.offset_timeval().as_micros();
        let Some(mean_us) = self.session.averager.push(offset_us) else {
            trace!(
                offset_us,
                rounds = self.session.averager.rounds(),
                "sample accumulated"
            );
            self.session.poll = PollSelection::Timeout;
            return;
        };

        let measurement = Measurement {
            offset: mean_us as f64 / 1_000_000.0,
            ..sample
        };
        self.session.last_measurement = Some(measurement);
        let server = self.server_addr();

        if mean_us.abs() < self.config.time_sync_threshold_us {
            self.session.mark_synced();
            self.session.dispersion_errors = 0;
            debug!(offset_us = mean_us, "offset under threshold, clock left alone");
            if self.session.was_partial {
                self.session.was_partial = false;
                let time = self.clock.now();
                self.emit(SyncEvent::TimeSyncd {
                    server,
                    measurement,
                    time,
                });
            } else {
                self.emit(SyncEvent::SyncNotNeeded {
                    server,
                    measurement,
                });
            }
            return;
        }

        if let Err(rejection) = check_response(
            &reply,
            mean_us,
            self.session.status,
            self.config.min_sync_accuracy_us,
        ) {
            debug!(
                %rejection,
                count = self.session.dispersion_errors + 1,
                "reply rejected"
            );
            if self
                .session
                .record_dispersion_error(self.config.max_dispersion_errors)
            {
                self.emit(SyncEvent::AccuracyError {
                    server,
                    measurement,
                });
            }
            return;
        }
        self.session.dispersion_errors = 0;

        let previous_status = self.session.status;
        match apply_offset(&mut self.clock, Timeval::from_micros(mean_us)) {
            Err(e) => {
                warn!(error = %e, offset_us = mean_us, "failed to step clock");
                self.session.status = previous_status;
                self.session.poll = PollSelection::Short;
                self.emit(SyncEvent::SyncError {
                    server,
                    offset: measurement.offset,
                });
            }
            Ok(applied) => {
                self.session.record_step(applied.new_time);
                if mean_us.abs() > self.config.min_sync_accuracy_us
                    && self.session.sync_retries < self.config.max_num_sync_retry
                {
                    self.session.mark_partial();
                    debug!(
                        offset_us = mean_us,
                        retries = self.session.sync_retries,
                        "accuracy target not reached, repeating sync"
                    );
                    let retries = self.session.sync_retries;
                    self.emit(SyncEvent::PartlySync {
                        server,
                        measurement,
                        retries,
                        time: applied.new_time,
                    });
                } else {
                    self.session.mark_synced();
                    self.session.was_partial = false;
                    debug!(offset_us = mean_us, "clock synchronized");
                    self.emit(SyncEvent::TimeSyncd {
                        server,
                        measurement,
                        time: applied.new_time,
                    });
                }
            }
        }
    }

    fn retire(&mut self, pending: PendingRequest) {
        self.scheduler.cancel(pending.timer);
        self.pending = None;
    }

    fn server_addr(&self) -> ServerAddr {
        ServerAddr {
            host: self.config.server.clone(),
            ip: self.server_ip,
            port: self.config.port,
        }
    }

    fn emit(&mut self, event: SyncEvent) {
        debug!(kind = ?event.kind(), "{}", event);
        if let Some(sink) = self.sink.as_mut() {
            sink(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockError;
    use crate::error::ResolveError;
    use crate::event::SyncEventKind;
    use std::net::Ipv4Addr;
    use std::sync::{Arc, Mutex};

    const SERVER_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));

    #[derive(Default)]
    struct RecordingTransport {
        sent: Vec<(SocketAddr, Vec<u8>)>,
        fail: Option<fn() -> SendError>,
    }

    impl Transport for RecordingTransport {
        fn send(&mut self, addr: SocketAddr, bytes: &[u8]) -> Result<(), SendError> {
            if let Some(fail) = self.fail {
                return Err(fail());
            }
            self.sent.push((addr, bytes.to_vec()));
            Ok(())
        }
    }

    struct FixedResolver(Option<IpAddr>);

    impl Resolver for FixedResolver {
        fn resolve(&mut self, host: &str) -> Result<IpAddr, ResolveError> {
            self.0.ok_or_else(|| ResolveError::NotFound {
                host: host.to_owned(),
            })
        }
    }

    #[derive(Default)]
    struct CountingScheduler {
        next: u64,
        armed: Vec<TimerHandle>,
    }

    impl Scheduler for CountingScheduler {
        fn schedule(&mut self, _after: Duration) -> TimerHandle {
            self.next += 1;
            let h = TimerHandle(self.next);
            self.armed.push(h);
            h
        }

        fn cancel(&mut self, handle: TimerHandle) {
            self.armed.retain(|h| *h != handle);
        }
    }

    struct TestClock(Timeval);

    impl Clock for TestClock {
        fn now(&self) -> Timeval {
            self.0
        }

        fn set(&mut self, time: Timeval) -> Result<(), ClockError> {
            self.0 = time;
            Ok(())
        }
    }

    type TestEngine = SyncEngine<RecordingTransport, FixedResolver, CountingScheduler, TestClock>;

    fn engine() -> (TestEngine, Arc<Mutex<Vec<SyncEvent>>>) {
        let mut e = SyncEngine::new(
            SyncConfig::default(),
            RecordingTransport::default(),
            FixedResolver(Some(SERVER_IP)),
            CountingScheduler::default(),
            TestClock(Timeval::new(1_700_000_000, 0)),
        );
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        e.on_sync_event(move |ev| sink.lock().unwrap().push(ev.clone()));
        (e, events)
    }

    fn kinds(events: &Arc<Mutex<Vec<SyncEvent>>>) -> Vec<SyncEventKind> {
        events.lock().unwrap().iter().map(SyncEvent::kind).collect()
    }

    #[test]
    fn test_begin_rejects_empty_server() {
        let (mut e, events) = engine();
        assert_eq!(e.begin(""), Err(ConfigError::EmptyServerName));
        assert!(!e.is_pending());
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_trigger_sends_once_while_pending() {
        let (mut e, events) = engine();
        e.begin("pool.ntp.org").unwrap();
        e.trigger_sync();
        assert_eq!(e.transport().sent.len(), 1);
        assert_eq!(e.transport().sent[0].0, SocketAddr::new(SERVER_IP, 123));
        assert_eq!(kinds(&events), vec![SyncEventKind::RequestSent]);
    }

    #[test]
    fn test_timeout_then_new_request() {
        let (mut e, events) = engine();
        e.trigger_sync();
        e.on_timeout(TimerHandle(1));
        assert!(!e.is_pending());
        assert_eq!(e.status(), SyncStatus::Unsynced);
        e.trigger_sync();
        assert!(e.is_pending());
        assert_eq!(e.transport().sent.len(), 2);
        assert_eq!(
            kinds(&events),
            vec![
                SyncEventKind::RequestSent,
                SyncEventKind::NoResponse,
                SyncEventKind::RequestSent
            ]
        );
    }

    #[test]
    fn test_stale_timer_ignored() {
        let (mut e, events) = engine();
        e.trigger_sync();
        e.on_timeout(TimerHandle(99));
        assert!(e.is_pending());
        assert_eq!(kinds(&events), vec![SyncEventKind::RequestSent]);
    }

    #[test]
    fn test_resolve_failure_selects_short() {
        let (mut e, events) = engine();
        e.resolver_mut().0 = None;
        e.session.poll = PollSelection::Long;
        e.trigger_sync();
        assert!(!e.is_pending());
        assert_eq!(e.actual_interval(), e.short_interval());
        assert_eq!(kinds(&events), vec![SyncEventKind::InvalidAddress]);
    }

    #[test]
    fn test_send_failure_maps_event_and_disarms_timer() {
        let (mut e, events) = engine();
        e.transport_mut().fail = Some(|| SendError::InvalidPort);
        e.trigger_sync();
        assert!(!e.is_pending());
        assert!(e.scheduler().armed.is_empty());
        e.transport_mut().fail = Some(|| SendError::Io(std::io::ErrorKind::BrokenPipe.into()));
        e.trigger_sync();
        assert_eq!(
            kinds(&events),
            vec![SyncEventKind::InvalidPort, SyncEventKind::ErrorSending]
        );
    }

    #[test]
    fn test_set_interval_below_floor_keeps_value() {
        let (mut e, _) = engine();
        let before = e.long_interval();
        assert!(e.set_interval(Duration::from_secs(9)).is_err());
        assert_eq!(e.long_interval(), before);
        assert!(
            e.set_intervals(Duration::from_secs(5), Duration::from_secs(60))
                .is_err()
        );
        assert_eq!(e.short_interval(), Duration::from_secs(15));
        assert!(e.set_interval(Duration::from_secs(10)).is_ok());
        assert_eq!(e.long_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_set_timeout_bounds() {
        let (mut e, _) = engine();
        assert!(e.set_timeout(Duration::from_millis(50)).is_err());
        assert_eq!(e.timeout(), Duration::from_millis(5000));
        assert!(e.set_timeout(Duration::from_millis(800)).is_ok());
        assert_eq!(e.timeout(), Duration::from_millis(800));
    }

    #[test]
    fn test_set_num_ave_rounds_zero_rejected() {
        let (mut e, _) = engine();
        assert!(e.set_num_ave_rounds(0).is_err());
        assert!(e.set_num_ave_rounds(8).is_ok());
        assert_eq!(e.session().averager().target(), 8);
    }

    #[test]
    fn test_unsolicited_reply_discarded() {
        let (mut e, events) = engine();
        e.on_datagram(&[0u8; 48], SocketAddr::new(SERVER_IP, 123), Timeval::now());
        assert_eq!(e.status(), SyncStatus::Unsynced);
        assert!(e.session().averager().is_empty());
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_short_reply_is_response_error() {
        let (mut e, events) = engine();
        e.trigger_sync();
        e.on_datagram(&[0u8; 20], SocketAddr::new(SERVER_IP, 123), Timeval::now());
        assert!(!e.is_pending());
        assert!(e.scheduler().armed.is_empty());
        assert_eq!(e.status(), SyncStatus::Unsynced);
        assert_eq!(
            kinds(&events),
            vec![SyncEventKind::RequestSent, SyncEventKind::ResponseError]
        );
    }

    #[test]
    fn test_uptime_zero_before_first_sync() {
        let (e, _) = engine();
        assert_eq!(e.uptime(Timeval::new(1_700_000_100, 0)), Duration::ZERO);
    }
}
