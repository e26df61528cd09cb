//! Client configuration.

use std::{path::PathBuf, time::Duration};

pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:3000/ws";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000/api";
pub const STORE_FILE_NAME: &str = "tayori.json";

/// Transport-level reconnect policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before the given reconnect attempt (1-based), doubling from
    /// `initial_delay` and capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempts_made` failures.
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }
}

/// Timer intervals used by the synchronization core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// A remote typing indicator is cleared after this long without a refresh.
    pub typing_expiry: Duration,
    /// Local typing stops after this long without input.
    pub typing_idle: Duration,
    /// Health-check period of the connection manager.
    pub health_check: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            typing_expiry: Duration::from_secs(3),
            typing_idle: Duration::from_secs(1),
            health_check: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Event stream base URL (`ws://` / `wss://`).
    pub server_url: String,
    /// REST API base URL, including the `/api` prefix.
    pub api_url: String,
    /// Directory holding the local store file.
    pub data_dir: PathBuf,
    /// Message history page size.
    pub page_size: u32,
    pub timing: TimingConfig,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            data_dir: PathBuf::from("."),
            page_size: 50,
            timing: TimingConfig::default(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE_NAME)
    }
}
