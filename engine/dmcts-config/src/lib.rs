//! Centralized configuration loading from config.toml.
//!
//! This crate provides the configuration structs and loading logic shared by
//! every DMCTS component (tree engine, simulation worker pool), plus the
//! tracing setup used by hosts embedding the engine.
//!
//! # Configuration Priority
//!
//! Settings are loaded with the following priority (highest to lowest):
//! 1. Environment variables (`DMCTS_<SECTION>_<KEY>`)
//! 2. config.toml file
//! 3. Built-in defaults (config.defaults.toml)
//!
//! # Environment Variable Override Pattern
//!
//! ```text
//! DMCTS_<SECTION>_<KEY>=value
//!
//! Examples:
//!     DMCTS_COMMON_LOG_LEVEL=debug
//!     DMCTS_SEARCH_ITERATIONS=5000
//!     DMCTS_SEARCH_EXPLORATION_CONSTANT=0.7
//!     DMCTS_WORKERS_NUM_WORKERS=16
//!     DMCTS_WORKERS_SEED=42
//! ```

mod defaults;
mod loader;
mod structs;
mod telemetry;

pub use defaults::*;
pub use loader::{apply_env_overrides, load_config, load_from_path, CONFIG_SEARCH_PATHS};
pub use structs::*;
pub use telemetry::init_tracing;
