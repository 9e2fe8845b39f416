//! Configuration loading logic.
//!
//! Handles loading config from files and applying environment variable overrides.

use crate::CentralConfig;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Standard locations to search for config.toml
pub const CONFIG_SEARCH_PATHS: &[&str] = &[
    "config.toml",    // Current directory
    "../config.toml", // Parent directory (when running from a crate directory)
];

/// Load the central configuration from config.toml.
///
/// Searches in the following order:
/// 1. Path specified by the DMCTS_CONFIG environment variable
/// 2. Current directory (config.toml)
/// 3. Parent directory (../config.toml)
///
/// After loading, environment variable overrides are applied.
pub fn load_config() -> CentralConfig {
    if let Ok(path) = std::env::var("DMCTS_CONFIG") {
        let path = PathBuf::from(&path);
        if path.exists() {
            info!("Loading config from DMCTS_CONFIG: {}", path.display());
            return load_from_path(&path);
        }
        warn!(
            "DMCTS_CONFIG={} not found, searching defaults",
            path.display()
        );
    }

    for path_str in CONFIG_SEARCH_PATHS {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading config from {}", path.display());
            return load_from_path(&path);
        }
    }

    debug!("No config.toml found, using built-in defaults");
    apply_env_overrides(CentralConfig::default())
}

/// Load configuration from a specific path.
///
/// Unreadable or unparsable files fall back to the built-in defaults.
pub fn load_from_path(path: &Path) -> CentralConfig {
    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => apply_env_overrides(config),
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                apply_env_overrides(CentralConfig::default())
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            apply_env_overrides(CentralConfig::default())
        }
    }
}

/// Macro to reduce env override boilerplate
macro_rules! env_override {
    // String field
    ($config:expr, $section:ident . $field:ident, $key:expr) => {
        if let Ok(v) = std::env::var($key) {
            $config.$section.$field = v;
        }
    };
    // Parseable field (u64, f64, usize, etc.)
    ($config:expr, $section:ident . $field:ident, $key:expr, parse) => {
        if let Ok(v) =
            std::env::var($key).and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent))
        {
            $config.$section.$field = v;
        }
    };
    // Optional parseable field (Option<u64>, etc.)
    ($config:expr, $section:ident . $field:ident, $key:expr, optional_parse) => {
        if let Ok(v) =
            std::env::var($key).and_then(|s| s.parse().map_err(|_| std::env::VarError::NotPresent))
        {
            $config.$section.$field = Some(v);
        }
    };
}

/// Apply environment variable overrides to a configuration.
///
/// Environment variables follow the pattern: DMCTS_<SECTION>_<KEY>
pub fn apply_env_overrides(mut config: CentralConfig) -> CentralConfig {
    // Common
    env_override!(config, common.log_level, "DMCTS_COMMON_LOG_LEVEL");

    // Search
    env_override!(
        config,
        search.exploration_constant,
        "DMCTS_SEARCH_EXPLORATION_CONSTANT",
        parse
    );
    env_override!(config, search.iterations, "DMCTS_SEARCH_ITERATIONS", parse);
    env_override!(
        config,
        search.deadline_ms,
        "DMCTS_SEARCH_DEADLINE_MS",
        parse
    );
    env_override!(
        config,
        search.max_in_flight,
        "DMCTS_SEARCH_MAX_IN_FLIGHT",
        parse
    );
    env_override!(
        config,
        search.max_invalid_actions,
        "DMCTS_SEARCH_MAX_INVALID_ACTIONS",
        parse
    );
    env_override!(
        config,
        search.drain_grace_ms,
        "DMCTS_SEARCH_DRAIN_GRACE_MS",
        parse
    );

    // Workers
    env_override!(
        config,
        workers.num_workers,
        "DMCTS_WORKERS_NUM_WORKERS",
        parse
    );
    env_override!(
        config,
        workers.queue_capacity,
        "DMCTS_WORKERS_QUEUE_CAPACITY",
        parse
    );
    env_override!(
        config,
        workers.simulation_timeout_ms,
        "DMCTS_WORKERS_SIMULATION_TIMEOUT_MS",
        parse
    );
    env_override!(
        config,
        workers.max_rollout_depth,
        "DMCTS_WORKERS_MAX_ROLLOUT_DEPTH",
        parse
    );
    env_override!(config, workers.seed, "DMCTS_WORKERS_SEED", optional_parse);

    config
}
