//! Discovery configuration
//!
//! Defaults suit a single-region scan; every knob can be overridden from
//! the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default worker-pool size
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default per-operation timeout
pub const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 20_000;

/// Default overall batch timeout
pub const DEFAULT_BATCH_TIMEOUT_MS: u64 = 300_000;

/// Configuration for one discovery run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Regions to scan; global services use the first one
    pub regions: Vec<String>,
    /// Maximum tasks running at once
    pub concurrency: usize,
    /// Budget for a single API operation, in milliseconds
    pub operation_timeout_ms: u64,
    /// Budget for the whole batch, in milliseconds
    pub batch_timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            regions: vec!["us-east-1".to_string()],
            concurrency: DEFAULT_CONCURRENCY,
            operation_timeout_ms: DEFAULT_OPERATION_TIMEOUT_MS,
            batch_timeout_ms: DEFAULT_BATCH_TIMEOUT_MS,
        }
    }
}

impl DiscoveryConfig {
    /// Defaults overlaid with `INVENTORY_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(regions) = var("INVENTORY_REGIONS") {
            self.regions = parse_regions(&regions);
        }
        if let Some(v) = var("INVENTORY_CONCURRENCY") {
            self.concurrency = v
                .trim()
                .parse()
                .context("INVENTORY_CONCURRENCY must be a positive integer")?;
        }
        if let Some(v) = var("INVENTORY_OPERATION_TIMEOUT_SECS") {
            let secs: u64 = v
                .trim()
                .parse()
                .context("INVENTORY_OPERATION_TIMEOUT_SECS must be an integer")?;
            self.operation_timeout_ms = secs
                .checked_mul(1000)
                .context("INVENTORY_OPERATION_TIMEOUT_SECS is too large")?;
        }
        if let Some(v) = var("INVENTORY_BATCH_TIMEOUT_SECS") {
            let secs: u64 = v
                .trim()
                .parse()
                .context("INVENTORY_BATCH_TIMEOUT_SECS must be an integer")?;
            self.batch_timeout_ms = secs
                .checked_mul(1000)
                .context("INVENTORY_BATCH_TIMEOUT_SECS is too large")?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.regions.is_empty() {
            anyhow::bail!("At least one region must be configured");
        }
        if self.concurrency == 0 {
            anyhow::bail!("Concurrency must be at least 1");
        }
        if self.operation_timeout_ms == 0 || self.batch_timeout_ms == 0 {
            anyhow::bail!("Timeouts must be non-zero");
        }
        Ok(())
    }

    pub fn with_regions(mut self, regions: Vec<String>) -> Self {
        self.regions = regions;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_ms = saturating_millis(timeout);
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout_ms = saturating_millis(timeout);
        self
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    /// Region whose client serves account-global services
    pub fn home_region(&self) -> &str {
        self.regions.first().map(String::as_str).unwrap_or("us-east-1")
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Split a comma-separated region list, dropping blanks
pub fn parse_regions(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}
