//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the services. Nothing here reads process-wide environment variables directly:
//! binaries hand [`CoreConfig::from_lookup`] a lookup function (normally `std::env::var`), which
//! keeps request handling independent of the environment and makes resolution testable.

use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_DRAIN_WINDOW, DEFAULT_GATEWAY_ADDR, DEFAULT_ISSUANCE_ADDR,
    DEFAULT_STORAGE_ADDR, DEFAULT_STORAGE_UPSTREAM, ENV_DATA_DIR, ENV_DRAIN_SECS,
    ENV_GATEWAY_ADDR, ENV_ISSUANCE_ADDR, ENV_STORAGE_ADDR, ENV_STORAGE_UPSTREAM,
    ENV_VALIDITY_RULES,
};
use crate::validity::{validity_rules_from_env_value, ValidityRules};
use crate::{PassError, PassResult};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on the shutdown drain window.
const MAX_DRAIN_SECS: u64 = 300;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    validity_rules: ValidityRules,
    drain_window: Duration,
    issuance_addr: SocketAddr,
    storage_addr: SocketAddr,
    gateway_addr: SocketAddr,
    storage_upstream: String,
}

impl CoreConfig {
    /// Create a new `CoreConfig` with default listen addresses.
    pub fn new(
        data_dir: PathBuf,
        validity_rules: ValidityRules,
        drain_window: Duration,
    ) -> PassResult<Self> {
        if data_dir.as_os_str().is_empty() {
            return Err(PassError::InvalidInput("data_dir cannot be empty".into()));
        }

        Ok(Self {
            data_dir,
            validity_rules,
            drain_window,
            issuance_addr: parse_socket_addr(ENV_ISSUANCE_ADDR, DEFAULT_ISSUANCE_ADDR)?,
            storage_addr: parse_socket_addr(ENV_STORAGE_ADDR, DEFAULT_STORAGE_ADDR)?,
            gateway_addr: parse_socket_addr(ENV_GATEWAY_ADDR, DEFAULT_GATEWAY_ADDR)?,
            storage_upstream: DEFAULT_STORAGE_UPSTREAM.to_string(),
        })
    }

    /// Resolve the full configuration from a key lookup.
    ///
    /// Missing or blank keys fall back to the defaults in [`crate::constants`].
    ///
    /// # Errors
    ///
    /// Returns `PassError::InvalidConfig` naming the offending key when a value cannot be
    /// parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PassResult<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let data_dir = get(ENV_DATA_DIR).unwrap_or_else(|| DEFAULT_DATA_DIR.into());
        let validity_rules = validity_rules_from_env_value(get(ENV_VALIDITY_RULES)).map_err(|e| {
            PassError::InvalidConfig {
                key: ENV_VALIDITY_RULES,
                reason: e.to_string(),
            }
        })?;
        let drain_window = drain_window_from_env_value(get(ENV_DRAIN_SECS))?;

        let mut cfg = Self::new(PathBuf::from(data_dir), validity_rules, drain_window)?;

        if let Some(addr) = get(ENV_ISSUANCE_ADDR) {
            cfg.issuance_addr = parse_socket_addr(ENV_ISSUANCE_ADDR, &addr)?;
        }
        if let Some(addr) = get(ENV_STORAGE_ADDR) {
            cfg.storage_addr = parse_socket_addr(ENV_STORAGE_ADDR, &addr)?;
        }
        if let Some(addr) = get(ENV_GATEWAY_ADDR) {
            cfg.gateway_addr = parse_socket_addr(ENV_GATEWAY_ADDR, &addr)?;
        }
        if let Some(upstream) = get(ENV_STORAGE_UPSTREAM) {
            cfg.storage_upstream = validate_upstream(ENV_STORAGE_UPSTREAM, upstream)?;
        }

        tracing::debug!(
            data_dir = %cfg.data_dir.display(),
            validity_rules = %cfg.validity_rules,
            storage_upstream = %cfg.storage_upstream,
            "resolved core configuration"
        );

        Ok(cfg)
    }

    /// Resolve the configuration from the process environment.
    pub fn from_env() -> PassResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn validity_rules(&self) -> ValidityRules {
        self.validity_rules
    }

    pub fn drain_window(&self) -> Duration {
        self.drain_window
    }

    pub fn issuance_addr(&self) -> SocketAddr {
        self.issuance_addr
    }

    pub fn storage_addr(&self) -> SocketAddr {
        self.storage_addr
    }

    pub fn gateway_addr(&self) -> SocketAddr {
        self.gateway_addr
    }

    /// `host:port` of the storage service as seen by its upstream callers.
    pub fn storage_upstream(&self) -> &str {
        &self.storage_upstream
    }

    #[must_use]
    pub fn with_storage_upstream(mut self, upstream: impl Into<String>) -> Self {
        self.storage_upstream = upstream.into();
        self
    }
}

/// Parse the drain window (whole seconds) from an optional configuration value.
pub fn drain_window_from_env_value(value: Option<String>) -> PassResult<Duration> {
    let Some(value) = value else {
        return Ok(DEFAULT_DRAIN_WINDOW);
    };

    let secs: u64 = value.trim().parse().map_err(|_| PassError::InvalidConfig {
        key: ENV_DRAIN_SECS,
        reason: format!("'{value}' is not a whole number of seconds"),
    })?;

    if secs > MAX_DRAIN_SECS {
        return Err(PassError::InvalidConfig {
            key: ENV_DRAIN_SECS,
            reason: format!("{secs}s exceeds the maximum of {MAX_DRAIN_SECS}s"),
        });
    }

    Ok(Duration::from_secs(secs))
}

fn parse_socket_addr(key: &'static str, value: &str) -> PassResult<SocketAddr> {
    value.parse().map_err(|e| PassError::InvalidConfig {
        key,
        reason: format!("'{value}' is not a socket address: {e}"),
    })
}

fn validate_upstream(key: &'static str, value: String) -> PassResult<String> {
    let valid = value
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());

    if !valid {
        return Err(PassError::InvalidConfig {
            key,
            reason: format!("'{value}' must have the form host:port"),
        });
    }
    Ok(value)
}
