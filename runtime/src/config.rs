//! Configuration management for the ledger runtime.
//!
//! Loads configuration from environment variables with sensible defaults. Binaries call
//! `dotenvy::dotenv()` first so a local `.env` file is honored.

use crate::retry::RetryPolicy;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Backoff multiplier must be a positive finite number.
    #[error("LEDGER_RETRY_MULTIPLIER must be positive and finite, got {0}")]
    InvalidMultiplier(f64),
    /// Max delay below initial delay.
    #[error("LEDGER_RETRY_MAX_DELAY_MS ({max_ms}) is below LEDGER_RETRY_INITIAL_DELAY_MS ({initial_ms})")]
    DelayOrdering {
        /// Initial delay in milliseconds
        initial_ms: u64,
        /// Max delay in milliseconds
        max_ms: u64,
    },
}

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Commit conflict retry settings
    pub retry: RetryConfig,
    /// Log filter directive (`RUST_LOG` syntax)
    pub log_filter: String,
    /// Install the Prometheus recorder
    pub metrics_enabled: bool,
    /// Instant the demo clock is frozen at
    pub demo_now: DateTime<Utc>,
}

/// Commit conflict retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,
    /// Backoff cap, in milliseconds
    pub max_delay_ms: u64,
    /// Backoff multiplier
    pub multiplier: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Default log filter.
    pub const DEFAULT_LOG_FILTER: &'static str = "info,campus_points_runtime=debug";

    /// Load configuration from environment variables.
    ///
    /// Unset or unparseable variables fall back to their defaults; call
    /// [`Config::validate`] before use.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            retry: RetryConfig {
                max_retries: parsed(&lookup, "LEDGER_MAX_RETRIES").unwrap_or(5),
                initial_delay_ms: parsed(&lookup, "LEDGER_RETRY_INITIAL_DELAY_MS").unwrap_or(2),
                max_delay_ms: parsed(&lookup, "LEDGER_RETRY_MAX_DELAY_MS").unwrap_or(100),
                multiplier: parsed(&lookup, "LEDGER_RETRY_MULTIPLIER").unwrap_or(2.0),
            },
            log_filter: lookup("RUST_LOG").unwrap_or_else(|| Self::DEFAULT_LOG_FILTER.to_string()),
            metrics_enabled: lookup("METRICS_ENABLED")
                .is_some_and(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes")),
            demo_now: lookup("DEMO_NOW")
                .and_then(|s| DateTime::parse_from_rfc3339(s.trim()).ok())
                .map(|t| t.with_timezone(&Utc))
                .or_else(default_demo_now)
                .unwrap_or_else(Utc::now),
        }
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidMultiplier`] if the multiplier is zero, negative or not finite
    /// - [`ConfigError::DelayOrdering`] if the max delay is below the initial delay
    pub fn validate(&self) -> Result<(), ConfigError> {
        let multiplier = self.retry.multiplier;
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(ConfigError::InvalidMultiplier(multiplier));
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(ConfigError::DelayOrdering {
                initial_ms: self.retry.initial_delay_ms,
                max_ms: self.retry.max_delay_ms,
            });
        }
        Ok(())
    }

    /// The retry policy described by this configuration.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.retry.max_retries)
            .initial_delay(Duration::from_millis(self.retry.initial_delay_ms))
            .max_delay(Duration::from_millis(self.retry.max_delay_ms))
            .multiplier(self.retry.multiplier)
            .build()
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

fn default_demo_now() -> Option<DateTime<Utc>> {
    Utc.with_ymd_and_hms(2025, 1, 20, 15, 0, 0).single()
}
