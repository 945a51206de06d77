//! Configuration module for chainbbs.

use serde::Deserialize;
use std::path::Path;

use crate::fee::{ChangePolicy, FeeParams};
use crate::{BoardError, Result};

/// Economic parameters for posting.
#[derive(Debug, Clone, Deserialize)]
pub struct EconomicsConfig {
    /// Minimum relayable output value.
    #[serde(default = "default_dust")]
    pub dust: u64,
    /// Fee per started kilobyte of signed transaction size.
    #[serde(default = "default_fee_rate")]
    pub fee_rate: u64,
}

fn default_dust() -> u64 {
    5460
}

fn default_fee_rate() -> u64 {
    10_000
}

impl Default for EconomicsConfig {
    fn default() -> Self {
        Self {
            dust: default_dust(),
            fee_rate: default_fee_rate(),
        }
    }
}

/// Synchronization timing parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Width of one historical scan window, in days.
    #[serde(default = "default_scan_step_days")]
    pub scan_step_days: i64,
    /// Pause between successful scan passes, in milliseconds.
    #[serde(default = "default_pass_delay_ms")]
    pub pass_delay_ms: u64,
    /// Pause before retrying a failed scan pass, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_scan_step_days() -> i64 {
    30
}

fn default_pass_delay_ms() -> u64 {
    1000
}

fn default_retry_delay_ms() -> u64 {
    1000
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            scan_step_days: default_scan_step_days(),
            pass_delay_ms: default_pass_delay_ms(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl SyncConfig {
    /// Scan window width.
    pub fn scan_step(&self) -> chrono::Duration {
        chrono::Duration::days(self.scan_step_days)
    }

    /// Inter-pass pause.
    pub fn pass_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.pass_delay_ms)
    }

    /// Failed-pass retry pause.
    pub fn retry_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.retry_delay_ms)
    }
}

/// Funding policy knobs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyConfig {
    /// Where a below-dust leftover is folded.
    #[serde(default)]
    pub change_policy: ChangePolicy,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "data/chainbbs.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Economic parameters.
    #[serde(default)]
    pub economics: EconomicsConfig,
    /// Synchronization timing.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Funding policy.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| BoardError::Config(e.to_string()))
    }

    /// Fee engine parameters implied by this configuration.
    pub fn fee_params(&self) -> FeeParams {
        FeeParams {
            dust: self.economics.dust,
            fee_rate: self.economics.fee_rate,
            change_policy: self.policy.change_policy,
        }
    }
}
