// ⚙️ Configuration - loaded from environment variables
//
// Binaries load a `.env` file first (dotenvy), then call Config::from_env().
// Signing material is optional here; the Signer refuses to build without it.

use crate::error::{Result, SyncError};
use std::time::Duration;

pub const DEFAULT_REGISTRY_URL: &str = "https://preprod.registry.ondc.org/v2.0/lookup";
pub const DEFAULT_REGISTRY_ENV: &str = "preprod";
pub const DEFAULT_DOMAINS: &[&str] = &[
    "ONDC:RET10",
    "ONDC:RET11",
    "ONDC:RET12",
    "ONDC:RET13",
    "ONDC:RET14",
    "ONDC:RET15",
    "ONDC:RET16",
    "ONDC:RET17",
    "ONDC:RET18",
];

// ============================================================================
// RETRY POLICY
// ============================================================================

/// Network policy for registry lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-attempt request timeout (default: 30s)
    pub timeout: Duration,

    /// Retries after the first attempt (default: 3)
    pub max_retries: u32,

    /// Fixed delay between attempts (default: 5s)
    pub backoff_delay: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, max_retries: u32, backoff_delay: Duration) -> Self {
        RetryPolicy {
            timeout,
            max_retries,
            backoff_delay,
        }
    }

    /// Total attempts including the first one
    pub fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            backoff_delay: Duration::from_secs(5),
        }
    }
}

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite file backing the participant store
    pub database_path: String,

    pub registry_url: String,

    /// Base64 ed25519 private key (64-byte keypair or 32-byte seed)
    pub private_key: Option<String>,

    /// Our own subscriber id, first part of the signature keyId
    pub subscriber_id: Option<String>,

    /// Registry-issued unique key id, second part of the signature keyId
    pub unique_key_id: Option<String>,

    pub registry_env: String,
    pub domains: Vec<String>,
    pub retry: RetryPolicy,

    /// Scheduler period between sync runs (default: 6 hours)
    pub sync_interval: Duration,

    /// Server bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: String,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Optional:
    /// - `DATABASE_PATH` (default: "registry_sync.db")
    /// - `REGISTRY_URL`, `REGISTRY_ENV`, `DOMAINS` (comma-separated)
    /// - `PRIVATE_KEY`, `SUBSCRIBER_ID`, `UNIQUE_KEY_ID`
    /// - `REGISTRY_TIMEOUT_SECS` (30), `REGISTRY_MAX_RETRIES` (3), `REGISTRY_BACKOFF_SECS` (5)
    /// - `SYNC_INTERVAL_SECS` (21600), `BIND_ADDR` ("0.0.0.0:8080")
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            timeout: match get("REGISTRY_TIMEOUT_SECS") {
                Some(raw) => Duration::from_secs(parse_number("REGISTRY_TIMEOUT_SECS", &raw)?),
                None => defaults.timeout,
            },
            max_retries: match get("REGISTRY_MAX_RETRIES") {
                Some(raw) => parse_number::<u32>("REGISTRY_MAX_RETRIES", &raw)?,
                None => defaults.max_retries,
            },
            backoff_delay: match get("REGISTRY_BACKOFF_SECS") {
                Some(raw) => Duration::from_secs(parse_number("REGISTRY_BACKOFF_SECS", &raw)?),
                None => defaults.backoff_delay,
            },
        };

        let sync_interval = match get("SYNC_INTERVAL_SECS") {
            Some(raw) => Duration::from_secs(parse_number("SYNC_INTERVAL_SECS", &raw)?),
            None => Duration::from_secs(6 * 60 * 60),
        };
        if sync_interval.is_zero() {
            return Err(SyncError::Configuration(
                "SYNC_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        let domains = match get("DOMAINS") {
            Some(raw) => split_and_trim(&raw),
            None => DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect(),
        };

        let config = Config {
            database_path: get("DATABASE_PATH").unwrap_or_else(|| "registry_sync.db".to_string()),
            registry_url: get("REGISTRY_URL").unwrap_or_else(|| DEFAULT_REGISTRY_URL.to_string()),
            private_key: get("PRIVATE_KEY"),
            subscriber_id: get("SUBSCRIBER_ID"),
            unique_key_id: get("UNIQUE_KEY_ID"),
            registry_env: get("REGISTRY_ENV").unwrap_or_else(|| DEFAULT_REGISTRY_ENV.to_string()),
            domains,
            retry,
            sync_interval,
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        tracing::info!(
            registry_url = %config.registry_url,
            registry_env = %config.registry_env,
            domains = config.domains.len(),
            signing_key = config.private_key.is_some(),
            "configuration loaded"
        );

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse::<T>()
        .map_err(|_| SyncError::Configuration(format!("{key} must be a non-negative integer, got {raw:?}")))
}

/// Split a comma-separated list, dropping blanks
pub fn split_and_trim(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}
