//! Configuration types

use crate::constants::*;
use crate::{ConfigError, Scope, StrataResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time-to-live per bucketed scope, in minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeTtls {
    pub call: u32,
    pub short: u32,
    pub medium: u32,
    pub long: u32,
    pub very_long: u32,
}

impl Default for ScopeTtls {
    fn default() -> Self {
        Self {
            call: DEFAULT_CALL_TTL_MINUTES,
            short: DEFAULT_SHORT_TTL_MINUTES,
            medium: DEFAULT_MEDIUM_TTL_MINUTES,
            long: DEFAULT_LONG_TTL_MINUTES,
            very_long: DEFAULT_VERY_LONG_TTL_MINUTES,
        }
    }
}

impl ScopeTtls {
    /// TTL in minutes for a scope; `None` for `Permanent`.
    pub fn minutes(&self, scope: Scope) -> Option<u32> {
        match scope {
            Scope::Call => Some(self.call),
            Scope::Short => Some(self.short),
            Scope::Medium => Some(self.medium),
            Scope::Long => Some(self.long),
            Scope::VeryLong => Some(self.very_long),
            Scope::Permanent => None,
        }
    }

    /// Override the SHORT, MEDIUM and LONG times. Values that are not
    /// positive or do not fit in a `u32` are ignored.
    pub fn set_times(&mut self, short: i64, medium: i64, long: i64) {
        let minutes = |value: i64| u32::try_from(value).ok().filter(|m| *m > 0);
        if let Some(short) = minutes(short) {
            self.short = short;
        }
        if let Some(medium) = minutes(medium) {
            self.medium = medium;
        }
        if let Some(long) = minutes(long) {
            self.long = long;
        }
    }
}

/// Configuration for the size-based LRU evictor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionConfig {
    /// Whether the evictor runs at all
    pub enabled: bool,
    /// Ceiling on the estimated cache footprint, in megabytes
    pub max_size_mb: u64,
    /// Time between size checks
    pub run_interval: Duration,
    /// Halt the evictor on the first failed iteration instead of retrying
    pub stop_on_error: bool,
    /// Name of this server, matched against `servers_list`
    pub server_name: String,
    /// Servers the evictor runs on: `NONE`, empty (all), `a,b` or `-a,b` (all but)
    pub servers_list: String,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_size_mb: DEFAULT_MAX_CACHE_SIZE_MB,
            run_interval: Duration::from_secs(DEFAULT_LRU_RUN_INTERVAL_SECS),
            stop_on_error: true,
            server_name: String::new(),
            servers_list: String::new(),
        }
    }
}

impl EvictionConfig {
    /// Size ceiling in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb.saturating_mul(ONE_MEGABYTE)
    }

    /// Whether the configured run-list selects the named server.
    pub fn runs_on(&self, server_name: &str) -> bool {
        let list = self.servers_list.trim();
        if list.eq_ignore_ascii_case(SERVERS_LIST_NONE) {
            return false;
        }
        if list.is_empty() {
            return true;
        }

        let (excluding, names) = match list.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, list),
        };
        let listed = names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .any(|name| name.eq_ignore_ascii_case(server_name));

        listed != excluding
    }

    /// Whether the evictor should be started on the configured server.
    pub fn should_run(&self) -> bool {
        self.enabled && self.runs_on(&self.server_name)
    }
}

/// Master configuration for a cache directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub scope_ttls: ScopeTtls,
    /// Time between TTL sweeps
    pub sweep_interval: Duration,
    pub eviction: EvictionConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            scope_ttls: ScopeTtls::default(),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            eviction: EvictionConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-scope TTLs.
    pub fn with_scope_ttls(mut self, ttls: ScopeTtls) -> Self {
        self.scope_ttls = ttls;
        self
    }

    /// Set the sweep interval.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Set the LRU evictor configuration.
    pub fn with_eviction(mut self, eviction: EvictionConfig) -> Self {
        self.eviction = eviction;
        self
    }

    /// Create CacheConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `STRATA_TTL_SHORT_MINUTES`: SHORT scope TTL (default: 5)
    /// - `STRATA_TTL_MEDIUM_MINUTES`: MEDIUM scope TTL (default: 15)
    /// - `STRATA_TTL_LONG_MINUTES`: LONG scope TTL (default: 30)
    /// - `STRATA_TTL_VERY_LONG_MINUTES`: VERY_LONG scope TTL (default: 120)
    /// - `STRATA_SWEEP_INTERVAL_SECS`: TTL sweep interval (default: 60)
    /// - `STRATA_LRU_ENABLED`: Run the LRU evictor (default: false)
    /// - `STRATA_LRU_MAX_SIZE_MB`: LRU size ceiling (default: 256)
    /// - `STRATA_LRU_RUN_INTERVAL_SECS`: LRU check interval (default: 10)
    /// - `STRATA_LRU_STOP_ON_ERROR`: Halt the evictor on error (default: true)
    /// - `STRATA_SERVER_NAME`: This server's name (default: empty)
    /// - `STRATA_LRU_SERVERS`: Evictor run-list (default: empty, all servers)
    pub fn from_env() -> Self {
        let scope_ttls = ScopeTtls {
            call: DEFAULT_CALL_TTL_MINUTES,
            short: env_parse("STRATA_TTL_SHORT_MINUTES", DEFAULT_SHORT_TTL_MINUTES),
            medium: env_parse("STRATA_TTL_MEDIUM_MINUTES", DEFAULT_MEDIUM_TTL_MINUTES),
            long: env_parse("STRATA_TTL_LONG_MINUTES", DEFAULT_LONG_TTL_MINUTES),
            very_long: env_parse("STRATA_TTL_VERY_LONG_MINUTES", DEFAULT_VERY_LONG_TTL_MINUTES),
        };

        let sweep_interval = Duration::from_secs(env_parse(
            "STRATA_SWEEP_INTERVAL_SECS",
            DEFAULT_SWEEP_INTERVAL_SECS,
        ));

        let eviction = EvictionConfig {
            enabled: std::env::var("STRATA_LRU_ENABLED")
                .ok()
                .map(|s| s.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            max_size_mb: env_parse("STRATA_LRU_MAX_SIZE_MB", DEFAULT_MAX_CACHE_SIZE_MB),
            run_interval: Duration::from_secs(env_parse(
                "STRATA_LRU_RUN_INTERVAL_SECS",
                DEFAULT_LRU_RUN_INTERVAL_SECS,
            )),
            stop_on_error: std::env::var("STRATA_LRU_STOP_ON_ERROR")
                .ok()
                .map(|s| s.to_lowercase() != "false")
                .unwrap_or(true),
            server_name: std::env::var("STRATA_SERVER_NAME").unwrap_or_default(),
            servers_list: std::env::var("STRATA_LRU_SERVERS").unwrap_or_default(),
        };

        Self {
            scope_ttls,
            sweep_interval,
            eviction,
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - sweep_interval is positive
    /// - every swept scope has a positive TTL
    /// - TTLs do not decrease from SHORT to VERY_LONG
    /// - an enabled evictor has a positive ceiling and run interval
    pub fn validate(&self) -> StrataResult<()> {
        if self.sweep_interval.is_zero() {
            return Err(invalid(
                "sweep_interval",
                format!("{:?}", self.sweep_interval),
                "sweep_interval must be positive",
            ));
        }

        let mut previous = 0;
        for scope in Scope::SWEPT {
            let minutes = self.scope_ttls.minutes(scope).unwrap_or_default();
            if minutes == 0 {
                return Err(invalid(
                    "scope_ttls",
                    format!("{scope}={minutes}"),
                    "swept scopes must have a positive TTL",
                ));
            }
            if minutes < previous {
                return Err(invalid(
                    "scope_ttls",
                    format!("{scope}={minutes}"),
                    "TTLs must not decrease with scope longevity",
                ));
            }
            previous = minutes;
        }

        if self.eviction.enabled {
            if self.eviction.max_size_mb == 0 {
                return Err(invalid(
                    "eviction.max_size_mb",
                    "0".to_string(),
                    "max_size_mb must be greater than 0",
                ));
            }
            if self.eviction.run_interval.is_zero() {
                return Err(invalid(
                    "eviction.run_interval",
                    format!("{:?}", self.eviction.run_interval),
                    "run_interval must be positive",
                ));
            }
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn invalid(field: &str, value: String, reason: &str) -> crate::StrataError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value,
        reason: reason.to_string(),
    }
    .into()
}
