//! Constants used throughout the greenpass core crate.
//!
//! Default listen ports follow the deployed services: issuance on 1024, storage on 1025
//! and the public gateway on 1026.

use std::time::Duration;

/// Default directory for record storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "greenpass_data";

/// Default issuance service listen address.
pub const DEFAULT_ISSUANCE_ADDR: &str = "0.0.0.0:1024";

/// Default storage service listen address.
pub const DEFAULT_STORAGE_ADDR: &str = "0.0.0.0:1025";

/// Default gateway listen address.
pub const DEFAULT_GATEWAY_ADDR: &str = "0.0.0.0:1026";

/// Default address the issuance service and gateway use to reach the storage service.
pub const DEFAULT_STORAGE_UPSTREAM: &str = "127.0.0.1:1025";

/// Default addresses the `greenpass` client uses to reach the public services.
pub const DEFAULT_ISSUANCE_UPSTREAM: &str = "127.0.0.1:1024";
pub const DEFAULT_GATEWAY_UPSTREAM: &str = "127.0.0.1:1026";

/// Default time in-flight workers get to finish after a shutdown request.
pub const DEFAULT_DRAIN_WINDOW: Duration = Duration::from_secs(5);

/// Months a freshly issued pass remains valid.
pub const PASS_VALIDITY_MONTHS: i32 = 4;

pub const ENV_DATA_DIR: &str = "GREENPASS_DATA_DIR";
pub const ENV_ISSUANCE_ADDR: &str = "GREENPASS_ISSUANCE_ADDR";
pub const ENV_STORAGE_ADDR: &str = "GREENPASS_STORAGE_ADDR";
pub const ENV_GATEWAY_ADDR: &str = "GREENPASS_GATEWAY_ADDR";
pub const ENV_STORAGE_UPSTREAM: &str = "GREENPASS_STORAGE_UPSTREAM";
pub const ENV_ISSUANCE_UPSTREAM: &str = "GREENPASS_ISSUANCE_UPSTREAM";
pub const ENV_GATEWAY_UPSTREAM: &str = "GREENPASS_GATEWAY_UPSTREAM";
pub const ENV_VALIDITY_RULES: &str = "GREENPASS_VALIDITY_RULES";
pub const ENV_DRAIN_SECS: &str = "GREENPASS_DRAIN_SECS";
