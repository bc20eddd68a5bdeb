// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Tunables for the synchronization engine.
//!
//! [`SyncConfig`] carries every setting with working defaults. The builder
//! applies the same floors and ceilings as the engine's runtime setters:
//!
//! ```
//! use std::time::Duration;
//! use ntpsync_client::config::SyncConfig;
//!
//! let config = SyncConfig::builder()
//!     .server("time.nist.gov")
//!     .intervals(Duration::from_secs(30), Duration::from_secs(3600))
//!     .timeout(Duration::from_millis(1500))
//!     .build()
//!     .unwrap();
//! assert_eq!(config.long_interval, Duration::from_secs(3600));
//! ```

use std::time::Duration;

use ntpsync_proto::protocol::PORT;

use crate::error::ConfigError;

/// Default NTP server host name.
pub const DEFAULT_SERVER: &str = "pool.ntp.org";
/// Default steady-state poll interval.
pub const DEFAULT_LONG_INTERVAL: Duration = Duration::from_secs(1800);
/// Default poll interval while unsynchronized or degraded.
pub const DEFAULT_SHORT_INTERVAL: Duration = Duration::from_secs(15);
/// Smallest accepted poll interval.
pub const MIN_INTERVAL: Duration = Duration::from_secs(10);
/// Default response timeout, also the fast re-poll interval.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);
/// Smallest accepted response timeout.
pub const MIN_TIMEOUT: Duration = Duration::from_millis(100);
/// Offsets below this many microseconds need no clock step.
pub const DEFAULT_TIME_SYNC_THRESHOLD_US: i64 = 2500;
/// Residual error above this many microseconds triggers a partial-sync retry.
pub const DEFAULT_MIN_SYNC_ACCURACY_US: i64 = 5000;
/// Default number of consecutive partial-sync retries.
pub const DEFAULT_MAX_NUM_SYNC_RETRY: u32 = 3;
/// Default number of tolerated validation failures before escalating.
pub const DEFAULT_MAX_DISPERSION_ERRORS: u32 = 5;
/// Default number of samples per averaged offset.
pub const DEFAULT_NUM_AVE_ROUNDS: u32 = 1;

/// Engine configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Server host name or IP literal.
    pub server: String,
    /// Server UDP port.
    pub port: u16,
    /// Poll interval while unsynchronized or after repeated errors.
    pub short_interval: Duration,
    /// Poll interval once synchronized.
    pub long_interval: Duration,
    /// Response timeout and fast re-poll interval.
    pub timeout: Duration,
    /// Mean offsets below this many microseconds are not applied.
    pub time_sync_threshold_us: i64,
    /// Residual error bound for a full sync, in microseconds.
    pub min_sync_accuracy_us: i64,
    /// Partial-sync retries before accepting the residual error.
    pub max_num_sync_retry: u32,
    /// Validation failures tolerated before an accuracy error is reported.
    pub max_dispersion_errors: u32,
    /// Samples averaged into one candidate offset.
    pub num_ave_rounds: u32,
    /// Discard replies whose origin timestamp does not echo the pending request.
    pub verify_origin: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            server: DEFAULT_SERVER.to_owned(),
            port: PORT,
            short_interval: DEFAULT_SHORT_INTERVAL,
            long_interval: DEFAULT_LONG_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            time_sync_threshold_us: DEFAULT_TIME_SYNC_THRESHOLD_US,
            min_sync_accuracy_us: DEFAULT_MIN_SYNC_ACCURACY_US,
            max_num_sync_retry: DEFAULT_MAX_NUM_SYNC_RETRY,
            max_dispersion_errors: DEFAULT_MAX_DISPERSION_ERRORS,
            num_ave_rounds: DEFAULT_NUM_AVE_ROUNDS,
            verify_origin: true,
        }
    }
}

impl SyncConfig {
    /// Start building a configuration from the defaults.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder {
            config: SyncConfig::default(),
        }
    }
}

/// Builder for [`SyncConfig`].
#[derive(Clone, Debug)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    /// Server host name or IP literal.
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.config.server = server.into();
        self
    }

    /// Server UDP port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Short and long poll intervals.
    pub fn intervals(mut self, short: Duration, long: Duration) -> Self {
        self.config.short_interval = short;
        self.config.long_interval = long;
        self
    }

    /// Response timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Offset threshold below which the clock is left alone, in microseconds.
    pub fn time_sync_threshold_us(mut self, us: i64) -> Self {
        self.config.time_sync_threshold_us = us;
        self
    }

    /// Residual error bound for a full sync, in microseconds.
    pub fn min_sync_accuracy_us(mut self, us: i64) -> Self {
        self.config.min_sync_accuracy_us = us;
        self
    }

    /// Partial-sync retry budget.
    pub fn max_num_sync_retry(mut self, n: u32) -> Self {
        self.config.max_num_sync_retry = n;
        self
    }

    /// Validation failures tolerated before escalating.
    pub fn max_dispersion_errors(mut self, n: u32) -> Self {
        self.config.max_dispersion_errors = n;
        self
    }

    /// Samples per averaged offset.
    pub fn num_ave_rounds(mut self, n: u32) -> Self {
        self.config.num_ave_rounds = n;
        self
    }

    /// Enable or disable origin echo matching.
    pub fn verify_origin(mut self, verify: bool) -> Self {
        self.config.verify_origin = verify;
        self
    }

    /// Validate and return the configuration.
    pub fn build(self) -> Result<SyncConfig, ConfigError> {
        let c = self.config;
        check_server(&c.server)?;
        check_interval(c.short_interval)?;
        check_interval(c.long_interval)?;
        check_timeout(c.timeout)?;
        check_rounds(c.num_ave_rounds)?;
        Ok(c)
    }
}

pub(crate) fn check_server(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::EmptyServerName);
    }
    Ok(())
}

pub(crate) fn check_interval(requested: Duration) -> Result<(), ConfigError> {
    if requested < MIN_INTERVAL {
        return Err(ConfigError::IntervalTooShort {
            requested,
            minimum: MIN_INTERVAL,
        });
    }
    Ok(())
}

pub(crate) fn check_timeout(requested: Duration) -> Result<(), ConfigError> {
    if requested < MIN_TIMEOUT {
        return Err(ConfigError::TimeoutTooShort {
            requested,
            minimum: MIN_TIMEOUT,
        });
    }
    Ok(())
}

pub(crate) fn check_rounds(n: u32) -> Result<(), ConfigError> {
    if n == 0 {
        return Err(ConfigError::ZeroCount {
            setting: "num_ave_rounds",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = SyncConfig::default();
        assert_eq!(c.server, "pool.ntp.org");
        assert_eq!(c.port, 123);
        assert_eq!(c.long_interval, Duration::from_secs(1800));
        assert_eq!(c.short_interval, Duration::from_secs(15));
        assert_eq!(c.timeout, Duration::from_millis(5000));
        assert_eq!(c.time_sync_threshold_us, 2500);
        assert_eq!(c.min_sync_accuracy_us, 5000);
        assert_eq!(c.max_num_sync_retry, 3);
        assert_eq!(c.max_dispersion_errors, 5);
        assert_eq!(c.num_ave_rounds, 1);
        assert!(c.verify_origin);
    }

    #[test]
    fn test_builder_defaults_are_valid() {
        assert_eq!(SyncConfig::builder().build().unwrap(), SyncConfig::default());
    }

    #[test]
    fn test_builder_rejects_short_interval() {
        let err = SyncConfig::builder()
            .intervals(Duration::from_secs(9), Duration::from_secs(60))
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::IntervalTooShort {
                requested: Duration::from_secs(9),
                minimum: MIN_INTERVAL,
            }
        );
    }

    #[test]
    fn test_builder_timeout_bounds() {
        assert!(matches!(
            SyncConfig::builder()
                .timeout(Duration::from_millis(99))
                .build(),
            Err(ConfigError::TimeoutTooShort { .. })
        ));
        assert!(
            SyncConfig::builder()
                .timeout(Duration::from_millis(65_535))
                .build()
                .is_ok()
        );
        assert!(
            SyncConfig::builder()
                .timeout(MIN_TIMEOUT)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn test_builder_rejects_empty_server_and_zero_rounds() {
        assert_eq!(
            SyncConfig::builder().server("").build().unwrap_err(),
            ConfigError::EmptyServerName
        );
        assert_eq!(
            SyncConfig::builder().num_ave_rounds(0).build().unwrap_err(),
            ConfigError::ZeroCount {
                setting: "num_ave_rounds"
            }
        );
    }

    #[test]
    fn test_interval_floor_is_inclusive() {
        assert!(check_interval(MIN_INTERVAL).is_ok());
    }
}
