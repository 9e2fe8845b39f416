//! Default configuration values loaded from config.defaults.toml.
//!
//! The shared TOML file is embedded at compile time so every component
//! starts from the same defaults.

use once_cell::sync::Lazy;
use serde::Deserialize;

/// The embedded defaults TOML file (loaded at compile time)
const DEFAULTS_TOML: &str = include_str!("../../../config.defaults.toml");

/// Parsed defaults structure (parsed once at first use)
static DEFAULTS: Lazy<DefaultsConfig> = Lazy::new(|| {
    toml::from_str(DEFAULTS_TOML).expect("config.defaults.toml should be valid TOML")
});

// ============================================================================
// Internal structs for parsing config.defaults.toml
// ============================================================================

#[derive(Debug, Deserialize)]
struct DefaultsConfig {
    common: CommonDefaults,
    search: SearchDefaults,
    workers: WorkersDefaults,
}

#[derive(Debug, Deserialize)]
struct CommonDefaults {
    log_level: String,
}

#[derive(Debug, Deserialize)]
struct SearchDefaults {
    exploration_constant: f64,
    iterations: u64,
    deadline_ms: u64,
    max_in_flight: usize,
    max_invalid_actions: u32,
    drain_grace_ms: u64,
}

#[derive(Debug, Deserialize)]
struct WorkersDefaults {
    num_workers: usize,
    queue_capacity: usize,
    simulation_timeout_ms: u64,
    max_rollout_depth: u32,
}

// ============================================================================
// Public accessor functions
// ============================================================================

// Common
pub fn log_level() -> &'static str {
    &DEFAULTS.common.log_level
}

// Search
pub fn exploration_constant() -> f64 {
    DEFAULTS.search.exploration_constant
}
pub fn iterations() -> u64 {
    DEFAULTS.search.iterations
}
pub fn deadline_ms() -> u64 {
    DEFAULTS.search.deadline_ms
}
pub fn max_in_flight() -> usize {
    DEFAULTS.search.max_in_flight
}
pub fn max_invalid_actions() -> u32 {
    DEFAULTS.search.max_invalid_actions
}
pub fn drain_grace_ms() -> u64 {
    DEFAULTS.search.drain_grace_ms
}

// Workers
pub fn num_workers() -> usize {
    DEFAULTS.workers.num_workers
}
pub fn queue_capacity() -> usize {
    DEFAULTS.workers.queue_capacity
}
pub fn simulation_timeout_ms() -> u64 {
    DEFAULTS.workers.simulation_timeout_ms
}
pub fn max_rollout_depth() -> u32 {
    DEFAULTS.workers.max_rollout_depth
}
