use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for the fleet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    /// Accounting service base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Per-request client timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Seconds between balance reports while a session is active.
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,

    /// Attempt budget for registration checks and balance updates.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Linear backoff unit between attempts, in seconds.
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    /// Pause after a report cycle exhausts its retries, in seconds.
    #[serde(default = "default_failure_cooldown_secs")]
    pub failure_cooldown_secs: u64,

    /// Upper bound on the coordinated stop sequence, in seconds.
    #[serde(default = "default_shutdown_deadline_secs")]
    pub shutdown_deadline_secs: u64,

    /// Simulated earnings per MH/s per second.
    #[serde(default = "default_earnings_rate")]
    pub earnings_rate: f64,

    /// Lower bound of the simulated hashrate draw, MH/s.
    #[serde(default = "default_hashrate_min_mhs")]
    pub hashrate_min_mhs: f64,

    /// Upper bound of the simulated hashrate draw, MH/s.
    #[serde(default = "default_hashrate_max_mhs")]
    pub hashrate_max_mhs: f64,
}

fn default_api_base_url() -> String {
    "https://api.minefleet.dev/v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_report_interval_secs() -> u64 {
    60
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_backoff_secs() -> u64 {
    2
}

fn default_failure_cooldown_secs() -> u64 {
    10
}

fn default_shutdown_deadline_secs() -> u64 {
    30
}

fn default_earnings_rate() -> f64 {
    0.000001
}

fn default_hashrate_min_mhs() -> f64 {
    40.0
}

fn default_hashrate_max_mhs() -> f64 {
    120.0
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            report_interval_secs: default_report_interval_secs(),
            retry_attempts: default_retry_attempts(),
            retry_backoff_secs: default_retry_backoff_secs(),
            failure_cooldown_secs: default_failure_cooldown_secs(),
            shutdown_deadline_secs: default_shutdown_deadline_secs(),
            earnings_rate: default_earnings_rate(),
            hashrate_min_mhs: default_hashrate_min_mhs(),
            hashrate_max_mhs: default_hashrate_max_mhs(),
        }
    }
}

impl FleetConfig {
    /// Config file path within the state directory.
    pub fn config_path(state_dir: &Path) -> PathBuf {
        state_dir.join("config.toml")
    }

    /// Load config from disk. Returns defaults if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn failure_cooldown(&self) -> Duration {
        Duration::from_secs(self.failure_cooldown_secs)
    }

    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_secs(self.shutdown_deadline_secs)
    }
}
