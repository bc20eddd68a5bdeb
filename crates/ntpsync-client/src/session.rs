// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Mutable synchronization state owned by the engine.
//!
//! A [`SyncSession`] lives for as long as its engine. It records the sync
//! status, the counters that drive retry and escalation decisions, and which
//! of the three poll intervals is currently selected.

use std::fmt;
use std::time::Duration;

use ntpsync_proto::Timeval;

use crate::filter::OffsetAverager;
use crate::request::Measurement;

/// Synchronization status of the local clock.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum SyncStatus {
    /// Never synchronized, or the last exchange failed.
    #[default]
    Unsynced,
    /// A correction was applied but the residual error is still above target.
    PartialSync,
    /// The clock is within the accuracy target.
    Synced,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Unsynced => write!(f, "unsynced"),
            SyncStatus::PartialSync => write!(f, "partial sync"),
            SyncStatus::Synced => write!(f, "synced"),
        }
    }
}

/// Which poll interval the driver should wait before the next request.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum PollSelection {
    /// Degraded: unsynchronized or repeated errors.
    #[default]
    Short,
    /// Steady state.
    Long,
    /// Fast re-poll after the response timeout, while averaging or retrying.
    Timeout,
}

impl PollSelection {
    /// Resolve the selection to a concrete duration.
    pub fn resolve(self, short: Duration, long: Duration, timeout: Duration) -> Duration {
        match self {
            PollSelection::Short => short,
            PollSelection::Long => long,
            PollSelection::Timeout => timeout,
        }
    }
}

/// Engine-wide sync state.
#[derive(Clone, Debug)]
pub struct SyncSession {
    pub(crate) status: SyncStatus,
    pub(crate) averager: OffsetAverager,
    pub(crate) dispersion_errors: u32,
    pub(crate) sync_retries: u32,
    pub(crate) was_partial: bool,
    pub(crate) poll: PollSelection,
    pub(crate) last_sync: Option<Timeval>,
    pub(crate) first_sync: Option<Timeval>,
    pub(crate) last_measurement: Option<Measurement>,
}

impl SyncSession {
    /// A fresh, unsynchronized session averaging `rounds` samples per decision.
    pub fn new(rounds: u32) -> Self {
        SyncSession {
            status: SyncStatus::Unsynced,
            averager: OffsetAverager::new(rounds),
            dispersion_errors: 0,
            sync_retries: 0,
            was_partial: false,
            poll: PollSelection::Short,
            last_sync: None,
            first_sync: None,
            last_measurement: None,
        }
    }

    /// Current status.
    pub fn status(&self) -> SyncStatus {
        self.status
    }

    /// Currently selected poll interval.
    pub fn poll(&self) -> PollSelection {
        self.poll
    }

    /// Time written to the clock by the most recent successful step.
    pub fn last_sync(&self) -> Option<Timeval> {
        self.last_sync
    }

    /// Time written to the clock by the first successful step.
    pub fn first_sync(&self) -> Option<Timeval> {
        self.first_sync
    }

    /// Consecutive validation failures since the last accepted reply.
    pub fn dispersion_errors(&self) -> u32 {
        self.dispersion_errors
    }

    /// Consecutive partial-sync retries.
    pub fn sync_retries(&self) -> u32 {
        self.sync_retries
    }

    /// Measurement of the most recent reply that completed an average.
    pub fn last_measurement(&self) -> Option<Measurement> {
        self.last_measurement
    }

    /// The sample accumulator.
    pub fn averager(&self) -> &OffsetAverager {
        &self.averager
    }

    /// Steady state: no step needed or the residual error is acceptable.
    pub(crate) fn mark_synced(&mut self) {
        self.status = SyncStatus::Synced;
        self.sync_retries = 0;
        self.poll = PollSelection::Long;
    }

    /// A step was applied but more correction is needed.
    pub(crate) fn mark_partial(&mut self) {
        self.status = SyncStatus::PartialSync;
        self.sync_retries += 1;
        self.was_partial = true;
        self.poll = PollSelection::Timeout;
    }

    /// The exchange failed: lose sync and leave the fast re-poll if selected.
    pub(crate) fn mark_unsynced(&mut self) {
        self.status = SyncStatus::Unsynced;
        if self.poll == PollSelection::Timeout {
            self.poll = PollSelection::Short;
        }
    }

    /// Count one validation failure. Returns true once the count exceeds
    /// `max`, in which case the count is reset and the short interval selected.
    pub(crate) fn record_dispersion_error(&mut self, max: u32) -> bool {
        self.dispersion_errors += 1;
        if self.dispersion_errors > max {
            self.dispersion_errors = 0;
            self.poll = PollSelection::Short;
            return true;
        }
        false
    }

    /// Record a successful clock step.
    pub(crate) fn record_step(&mut self, new_time: Timeval) {
        self.last_sync = Some(new_time);
        if self.first_sync.is_none() {
            self.first_sync = Some(new_time);
        }
    }
}

impl Default for SyncSession {
    fn default() -> Self {
        Self::new(crate::filter::DEFAULT_ROUNDS)
    }
}
