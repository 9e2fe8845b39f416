//! Configuration struct definitions.
//!
//! All config structs with serde deserialization support and default values.

use crate::defaults;
use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::level_filters::LevelFilter;

// ============================================================================
// Serde default functions (required for #[serde(default = "...")])
// ============================================================================

fn d_log_level() -> String {
    defaults::log_level().into()
}
fn d_exploration_constant() -> f64 {
    defaults::exploration_constant()
}
fn d_iterations() -> u64 {
    defaults::iterations()
}
fn d_deadline_ms() -> u64 {
    defaults::deadline_ms()
}
fn d_max_in_flight() -> usize {
    defaults::max_in_flight()
}
fn d_max_invalid_actions() -> u32 {
    defaults::max_invalid_actions()
}
fn d_drain_grace_ms() -> u64 {
    defaults::drain_grace_ms()
}
fn d_num_workers() -> usize {
    defaults::num_workers()
}
fn d_queue_capacity() -> usize {
    defaults::queue_capacity()
}
fn d_simulation_timeout_ms() -> u64 {
    defaults::simulation_timeout_ms()
}
fn d_max_rollout_depth() -> u32 {
    defaults::max_rollout_depth()
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Root configuration structure matching config.toml
#[derive(Debug, Deserialize, Default, Clone)]
pub struct CentralConfig {
    #[serde(default)]
    pub common: CommonConfig,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub workers: WorkersSection,
}

impl CentralConfig {
    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.common.log_level.parse::<LevelFilter>().is_err() {
            return Err(anyhow!(
                "invalid log level '{}', expected one of trace, debug, info, warn, error",
                self.common.log_level
            ));
        }

        let c = self.search.exploration_constant;
        if !c.is_finite() || c < 0.0 {
            return Err(anyhow!(
                "search.exploration_constant must be a finite non-negative number, got {}",
                c
            ));
        }

        if self.search.max_in_flight == 0 {
            return Err(anyhow!("search.max_in_flight must be greater than 0"));
        }

        if self.search.max_invalid_actions == 0 {
            return Err(anyhow!("search.max_invalid_actions must be greater than 0"));
        }

        if self.workers.num_workers == 0 {
            return Err(anyhow!("workers.num_workers must be greater than 0"));
        }

        if self.workers.queue_capacity == 0 {
            return Err(anyhow!("workers.queue_capacity must be greater than 0"));
        }

        if self.workers.simulation_timeout_ms == 0 {
            return Err(anyhow!("workers.simulation_timeout_ms must be greater than 0"));
        }

        Ok(())
    }
}

/// Common configuration shared by all components
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CommonConfig {
    #[serde(default = "d_log_level")]
    pub log_level: String,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::log_level().into(),
        }
    }
}

/// Tree search configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchSection {
    /// UCT exploration constant C
    #[serde(default = "d_exploration_constant")]
    pub exploration_constant: f64,
    /// Iterations per build when the caller supplies no budget
    #[serde(default = "d_iterations")]
    pub iterations: u64,
    /// Wall-clock deadline per build in milliseconds (0 = none)
    #[serde(default = "d_deadline_ms")]
    pub deadline_ms: u64,
    /// Maximum simulations outstanding at once
    #[serde(default = "d_max_in_flight")]
    pub max_in_flight: usize,
    /// Invalid-action failures tolerated per build before it halts
    #[serde(default = "d_max_invalid_actions")]
    pub max_invalid_actions: u32,
    /// How long a build waits for in-flight simulations after its deadline
    #[serde(default = "d_drain_grace_ms")]
    pub drain_grace_ms: u64,
}

impl SearchSection {
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_ms > 0).then(|| Duration::from_millis(self.deadline_ms))
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            exploration_constant: defaults::exploration_constant(),
            iterations: defaults::iterations(),
            deadline_ms: defaults::deadline_ms(),
            max_in_flight: defaults::max_in_flight(),
            max_invalid_actions: defaults::max_invalid_actions(),
            drain_grace_ms: defaults::drain_grace_ms(),
        }
    }
}

/// Simulation worker pool configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WorkersSection {
    #[serde(default = "d_num_workers")]
    pub num_workers: usize,
    /// Bounded capacity of the job queue shared by the workers
    #[serde(default = "d_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "d_simulation_timeout_ms")]
    pub simulation_timeout_ms: u64,
    /// Actions applied before a rollout is truncated and scored
    #[serde(default = "d_max_rollout_depth")]
    pub max_rollout_depth: u32,
    /// Base seed for per-worker RNGs (None = entropy)
    #[serde(default)]
    pub seed: Option<u64>,
}

impl WorkersSection {
    pub fn simulation_timeout(&self) -> Duration {
        Duration::from_millis(self.simulation_timeout_ms)
    }
}

impl Default for WorkersSection {
    fn default() -> Self {
        Self {
            num_workers: defaults::num_workers(),
            queue_capacity: defaults::queue_capacity(),
            simulation_timeout_ms: defaults::simulation_timeout_ms(),
            max_rollout_depth: defaults::max_rollout_depth(),
            seed: None,
        }
    }
}
