// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Tokio host driver for [`SyncEngine`].
//!
//! [`NtpSyncClient`] supplies the engine's collaborators on top of tokio: a
//! UDP socket for the transport, `lookup_host` for resolution, a deadline for
//! the response timer and the system clock. Its [`run`](NtpSyncClient::run)
//! loop is the periodic driver:
//!
//! - every 100 ms it asks the connectivity probe whether the network is up;
//! - on a down transition it drops the socket;
//! - on an up transition it binds a fresh socket and syncs immediately;
//! - while up it syncs whenever the engine's current interval has elapsed.
//!
//! # Architecture
//!
//! The client uses a builder pattern for configuration and a `tokio::sync::watch`
//! channel for publishing a [`SyncSnapshot`] after every engine step.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> std::io::Result<()> {
//! let (client, state_rx) = ntpsync_client::client::NtpSyncClient::builder()
//!     .server("time.nist.gov")
//!     .intervals(
//!         std::time::Duration::from_secs(15),
//!         std::time::Duration::from_secs(1800),
//!     )
//!     .on_event(|event| println!("{event}"))
//!     .build()?;
//!
//! // Spawn the driver loop.
//! tokio::spawn(client.run());
//!
//! // Read the latest sync state at any time.
//! let state = state_rx.borrow();
//! println!("Status: {}, offset: {:.6}s", state.status, state.offset);
//! # Ok(())
//! # }
//! ```

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace, warn};

use ntpsync_proto::Timeval;

use crate::clock::{Clock, SystemClock};
use crate::config::{SyncConfig, SyncConfigBuilder};
use crate::engine::SyncEngine;
use crate::error::{NtpSyncError, ResolveError, SendError};
use crate::event::{SyncEvent, SyncEventKind};
use crate::host::{AlwaysUp, Connectivity, Resolver, Scheduler, TimerHandle, Transport};
use crate::session::SyncStatus;

/// How often the driver polls the connectivity probe.
pub const CONNECTIVITY_PROBE_INTERVAL: Duration = Duration::from_millis(100);

const RECV_BUF_SIZE: usize = 1024;

/// Sync state published to the watch channel after every engine step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncSnapshot {
    /// Current sync status.
    pub status: SyncStatus,
    /// Last averaged offset in seconds (positive = local clock behind server).
    pub offset: f64,
    /// Round-trip delay of the last decisive reply, in seconds.
    pub delay: f64,
    /// Root dispersion of the last decisive reply, in seconds.
    pub dispersion: f64,
    /// Time set by the most recent clock step.
    pub last_sync: Option<Timeval>,
    /// Time set by the first clock step.
    pub first_sync: Option<Timeval>,
    /// Interval the driver waits before the next request.
    pub actual_interval: Duration,
    /// Kind of the most recent event.
    pub last_event: Option<SyncEventKind>,
    /// Last resolved server address.
    pub server_ip: Option<IpAddr>,
}

// ── Collaborators ───────────────────────────────────────────────────

/// Transport over a tokio UDP socket. Without a socket every send fails
/// with [`SendError::InvalidPort`].
#[derive(Debug)]
pub struct UdpTransport {
    socket: Option<Arc<UdpSocket>>,
    bind_addr: Option<SocketAddr>,
}

impl UdpTransport {
    fn new(bind_addr: Option<SocketAddr>) -> Self {
        UdpTransport {
            socket: None,
            bind_addr,
        }
    }

    /// The bound socket, if any.
    pub fn socket(&self) -> Option<Arc<UdpSocket>> {
        self.socket.clone()
    }

    /// Whether a socket is bound.
    pub fn is_bound(&self) -> bool {
        self.socket.is_some()
    }

    async fn bind(&mut self, family_of: Option<IpAddr>) -> io::Result<()> {
        let addr = self.bind_addr.unwrap_or_else(|| unspecified_for(family_of));
        let socket = UdpSocket::bind(addr).await?;
        debug!(local = %socket.local_addr()?, "NTP socket bound");
        self.socket = Some(Arc::new(socket));
        Ok(())
    }

    /// Rebind if the current socket cannot reach `ip`.
    async fn ensure_family(&mut self, ip: IpAddr) -> io::Result<()> {
        if self.bind_addr.is_some() {
            return Ok(());
        }
        let matches = match &self.socket {
            Some(s) => s.local_addr()?.is_ipv4() == ip.is_ipv4(),
            None => false,
        };
        if !matches {
            self.bind(Some(ip)).await?;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.socket = None;
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, addr: SocketAddr, bytes: &[u8]) -> Result<(), SendError> {
        let socket = self.socket.as_ref().ok_or(SendError::InvalidPort)?;
        socket.try_send_to(bytes, addr)?;
        Ok(())
    }
}

fn unspecified_for(ip: Option<IpAddr>) -> SocketAddr {
    match ip {
        Some(IpAddr::V6(_)) => SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), 0),
        _ => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
    }
}

/// Resolver backed by the driver's most recent async lookup.
///
/// The driver resolves the server with `tokio::net::lookup_host` just before
/// each trigger and stores the answer here; the engine then reads it back
/// synchronously.
#[derive(Debug, Default)]
pub struct CachedResolver {
    entry: Option<(String, Option<IpAddr>)>,
}

impl CachedResolver {
    fn store(&mut self, host: String, ip: Option<IpAddr>) {
        self.entry = Some((host, ip));
    }
}

impl Resolver for CachedResolver {
    fn resolve(&mut self, host: &str) -> Result<IpAddr, ResolveError> {
        match &self.entry {
            Some((cached, Some(ip))) if cached == host => Ok(*ip),
            _ => Err(ResolveError::NotFound {
                host: host.to_owned(),
            }),
        }
    }
}

async fn lookup(host: &str, port: u16) -> Result<IpAddr, ResolveError> {
    let mut addrs = tokio::net::lookup_host((host, port)).await?;
    addrs
        .next()
        .map(|a| a.ip())
        .ok_or_else(|| ResolveError::NotFound {
            host: host.to_owned(),
        })
}

/// A single one-shot deadline. Arming a new timer replaces the old one.
#[derive(Debug, Default)]
pub struct DeadlineScheduler {
    next_id: u64,
    armed: Option<(TimerHandle, Instant)>,
}

impl DeadlineScheduler {
    /// The armed timer and when it fires.
    pub fn deadline(&self) -> Option<(TimerHandle, Instant)> {
        self.armed
    }
}

impl Scheduler for DeadlineScheduler {
    fn schedule(&mut self, after: Duration) -> TimerHandle {
        self.next_id += 1;
        let handle = TimerHandle(self.next_id);
        self.armed = Some((handle, Instant::now() + after));
        handle
    }

    fn cancel(&mut self, handle: TimerHandle) {
        if matches!(self.armed, Some((h, _)) if h == handle) {
            self.armed = None;
        }
    }
}

type ClientEngine =
    SyncEngine<UdpTransport, CachedResolver, DeadlineScheduler, Box<dyn Clock + Send>>;
type EventCallback = Box<dyn FnMut(&SyncEvent) + Send>;

// ── Builder ─────────────────────────────────────────────────────────

/// Builder for configuring and creating an [`NtpSyncClient`].
pub struct NtpSyncClientBuilder {
    config: SyncConfigBuilder,
    bind_addr: Option<SocketAddr>,
    clock: Option<Box<dyn Clock + Send>>,
    connectivity: Option<Box<dyn Connectivity + Send>>,
    on_event: Option<EventCallback>,
}

impl NtpSyncClientBuilder {
    fn new() -> Self {
        NtpSyncClientBuilder {
            config: SyncConfig::builder(),
            bind_addr: None,
            clock: None,
            connectivity: None,
            on_event: None,
        }
    }

    /// Server host name or IP literal.
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.config = self.config.server(server);
        self
    }

    /// Server UDP port.
    pub fn port(mut self, port: u16) -> Self {
        self.config = self.config.port(port);
        self
    }

    /// Short and long poll intervals.
    pub fn intervals(mut self, short: Duration, long: Duration) -> Self {
        self.config = self.config.intervals(short, long);
        self
    }

    /// Response timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.timeout(timeout);
        self
    }

    /// Offset threshold below which the clock is left alone, in microseconds.
    pub fn time_sync_threshold_us(mut self, us: i64) -> Self {
        self.config = self.config.time_sync_threshold_us(us);
        self
    }

    /// Residual error bound for a full sync, in microseconds.
    pub fn min_sync_accuracy_us(mut self, us: i64) -> Self {
        self.config = self.config.min_sync_accuracy_us(us);
        self
    }

    /// Partial-sync retry budget.
    pub fn max_num_sync_retry(mut self, n: u32) -> Self {
        self.config = self.config.max_num_sync_retry(n);
        self
    }

    /// Validation failures tolerated before escalating.
    pub fn max_dispersion_errors(mut self, n: u32) -> Self {
        self.config = self.config.max_dispersion_errors(n);
        self
    }

    /// Samples per averaged offset.
    pub fn num_ave_rounds(mut self, n: u32) -> Self {
        self.config = self.config.num_ave_rounds(n);
        self
    }

    /// Enable or disable origin echo matching.
    pub fn verify_origin(mut self, verify: bool) -> Self {
        self.config = self.config.verify_origin(verify);
        self
    }

    /// Local address to bind. Defaults to the unspecified address of the
    /// server's family with an ephemeral port.
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = Some(addr);
        self
    }

    /// Clock to read and step. Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: impl Clock + Send + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Connectivity probe. Defaults to [`AlwaysUp`].
    pub fn connectivity(mut self, probe: impl Connectivity + Send + 'static) -> Self {
        self.connectivity = Some(Box::new(probe));
        self
    }

    /// Observer for every [`SyncEvent`].
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&SyncEvent) + Send + 'static,
    {
        self.on_event = Some(Box::new(callback));
        self
    }

    /// Build the client.
    ///
    /// Returns the client (to be spawned) and a watch receiver for state updates.
    pub fn build(self) -> io::Result<(NtpSyncClient, watch::Receiver<SyncSnapshot>)> {
        let config = self.config.build().map_err(NtpSyncError::from)?;
        let clock = self.clock.unwrap_or_else(|| Box::new(SystemClock));
        let mut engine = SyncEngine::new(
            config,
            UdpTransport::new(self.bind_addr),
            CachedResolver::default(),
            DeadlineScheduler::default(),
            clock,
        );

        let last_event = Arc::new(Mutex::new(None));
        let recorder = Arc::clone(&last_event);
        let mut callback = self.on_event;
        engine.on_sync_event(move |event| {
            if let Ok(mut last) = recorder.lock() {
                *last = Some(event.kind());
            }
            if let Some(cb) = callback.as_mut() {
                cb(event);
            }
        });

        let snapshot = SyncSnapshot {
            actual_interval: engine.actual_interval(),
            ..SyncSnapshot::default()
        };
        let (state_tx, state_rx) = watch::channel(snapshot);

        Ok((
            NtpSyncClient {
                engine,
                connectivity: self.connectivity.unwrap_or_else(|| Box::new(AlwaysUp)),
                state_tx,
                last_event,
            },
            state_rx,
        ))
    }
}

// ── Client ──────────────────────────────────────────────────────────

/// A single-server NTP client driving a [`SyncEngine`] on tokio.
///
/// Created via [`NtpSyncClient::builder()`]. Call [`run()`](NtpSyncClient::run)
/// to start the driver loop (typically via `tokio::spawn`).
pub struct NtpSyncClient {
    engine: ClientEngine,
    connectivity: Box<dyn Connectivity + Send>,
    state_tx: watch::Sender<SyncSnapshot>,
    last_event: Arc<Mutex<Option<SyncEventKind>>>,
}

impl NtpSyncClient {
    /// Create a builder for configuring the client.
    pub fn builder() -> NtpSyncClientBuilder {
        NtpSyncClientBuilder::new()
    }

    /// The engine being driven.
    pub fn engine(&self) -> &ClientEngine {
        &self.engine
    }

    /// Run the driver loop. This future runs indefinitely.
    pub async fn run(mut self) {
        debug!(server = %self.engine.config().server, "NTP sync client starting");
        let mut probe = tokio::time::interval(CONNECTIVITY_PROBE_INTERVAL);
        probe.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_trigger: Option<Instant> = None;
        let mut buf = [0u8; RECV_BUF_SIZE];

        loop {
            let socket = self.engine.transport().socket();
            let deadline = self.engine.scheduler().deadline();

            tokio::select! {
                _ = probe.tick() => {
                    let up = self.connectivity.is_up();
                    let bound = self.engine.transport().is_bound();
                    if bound && !up {
                        warn!("network down, closing NTP socket");
                        self.engine.transport_mut().close();
                    } else if !bound && up {
                        debug!("network up, binding NTP socket");
                        if let Err(e) = self.engine.transport_mut().bind(None).await {
                            warn!(error = %e, "failed to bind NTP socket");
                            continue;
                        }
                        self.sync_now().await;
                        last_trigger = Some(Instant::now());
                    } else if up {
                        let due = last_trigger
                            .is_none_or(|t| t.elapsed() >= self.engine.actual_interval());
                        if due {
                            self.sync_now().await;
                            last_trigger = Some(Instant::now());
                        }
                    }
                }
                handle = wait_deadline(deadline) => {
                    self.engine.on_timeout(handle);
                    self.publish();
                }
                received = recv(socket.as_deref(), &mut buf) => {
                    match received {
                        Ok((len, from)) => {
                            let received_at = self.engine.clock().now();
                            trace!(%from, len, "datagram received");
                            self.engine.on_datagram(&buf[..len], from, received_at);
                            self.publish();
                        }
                        Err(e) => {
                            debug!(error = %e, "NTP socket receive failed");
                        }
                    }
                }
            }
        }
    }

    /// Resolve the server and ask the engine to send a request.
    async fn sync_now(&mut self) {
        if self.engine.is_pending() {
            return;
        }
        let host = self.engine.config().server.clone();
        let port = self.engine.config().port;
        let ip = match lookup(&host, port).await {
            Ok(ip) => {
                if let Err(e) = self.engine.transport_mut().ensure_family(ip).await {
                    warn!(error = %e, "failed to rebind NTP socket");
                }
                Some(ip)
            }
            Err(e) => {
                debug!(%host, error = %e, "lookup failed");
                None
            }
        };
        self.engine.resolver_mut().store(host, ip);
        // `try_send_to` reports WouldBlock until the reactor has seen the
        // socket writable, which a freshly bound socket has not.
        if let Some(socket) = self.engine.transport().socket() {
            if let Err(e) = socket.writable().await {
                warn!(error = %e, "NTP socket not writable");
            }
        }
        self.engine.trigger_sync();
        self.publish();
    }

    fn publish(&self) {
        let session = self.engine.session();
        let measurement = session.last_measurement().unwrap_or_default();
        let last_event = self.last_event.lock().ok().and_then(|e| *e);
        let snapshot = SyncSnapshot {
            status: session.status(),
            offset: measurement.offset,
            delay: measurement.delay,
            dispersion: measurement.dispersion,
            last_sync: session.last_sync(),
            first_sync: session.first_sync(),
            actual_interval: self.engine.actual_interval(),
            last_event,
            server_ip: self.engine.server_ip(),
        };
        self.state_tx.send_replace(snapshot);
    }
}

async fn wait_deadline(deadline: Option<(TimerHandle, Instant)>) -> TimerHandle {
    match deadline {
        Some((handle, at)) => {
            tokio::time::sleep_until(at).await;
            handle
        }
        None => std::future::pending().await,
    }
}

async fn recv(socket: Option<&UdpSocket>, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
    match socket {
        Some(s) => s.recv_from(buf).await,
        None => std::future::pending().await,
    }
}
