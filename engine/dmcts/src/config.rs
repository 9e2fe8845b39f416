//! Search and worker pool configuration parameters.

use crate::error::EngineError;
use dmcts_config::CentralConfig;
use std::time::Duration;

/// Configuration for a tree engine.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Exploration constant C in the UCT formula.
    /// Higher values favor rarely visited children, 0 is pure exploitation.
    pub exploration_constant: f64,

    /// Iterations per build when the budget names neither bound.
    pub iterations: u64,

    /// Default wall-clock deadline per build (None = iterations only).
    pub deadline: Option<Duration>,

    /// Maximum simulations outstanding at once.
    /// Set to 1 for strictly sequential select-simulate-backpropagate.
    pub max_in_flight: usize,

    /// Invalid-action failures tolerated in one build before it halts.
    pub max_invalid_actions: u32,

    /// How long in-flight simulations are awaited after the deadline.
    pub drain_grace: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            exploration_constant: std::f64::consts::SQRT_2,
            iterations: 1000,
            deadline: None,
            max_in_flight: 16,
            max_invalid_actions: 8,
            drain_grace: Duration::from_secs(1),
        }
    }
}

impl SearchConfig {
    /// Create a small sequential config for testing.
    pub fn for_testing() -> Self {
        Self {
            exploration_constant: std::f64::consts::SQRT_2,
            iterations: 50,
            deadline: None,
            max_in_flight: 1,
            max_invalid_actions: 8,
            drain_grace: Duration::from_millis(100),
        }
    }

    /// Builder pattern: set exploration constant.
    pub fn with_exploration_constant(mut self, c: f64) -> Self {
        self.exploration_constant = c;
        self
    }

    /// Builder pattern: set default iteration count.
    pub fn with_iterations(mut self, n: u64) -> Self {
        self.iterations = n;
        self
    }

    /// Builder pattern: set default deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Builder pattern: set the in-flight simulation bound.
    pub fn with_max_in_flight(mut self, n: usize) -> Self {
        self.max_in_flight = n;
        self
    }

    /// Builder pattern: set the invalid-action halt threshold.
    pub fn with_max_invalid_actions(mut self, n: u32) -> Self {
        self.max_invalid_actions = n;
        self
    }

    /// Builder pattern: set the post-deadline drain window.
    pub fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.exploration_constant.is_finite() || self.exploration_constant < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "exploration_constant must be finite and non-negative, got {}",
                self.exploration_constant
            )));
        }
        if self.max_in_flight == 0 {
            return Err(EngineError::InvalidConfig(
                "max_in_flight must be greater than 0".into(),
            ));
        }
        if self.max_invalid_actions == 0 {
            return Err(EngineError::InvalidConfig(
                "max_invalid_actions must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

impl From<&CentralConfig> for SearchConfig {
    fn from(config: &CentralConfig) -> Self {
        let search = &config.search;
        Self {
            exploration_constant: search.exploration_constant,
            iterations: search.iterations,
            deadline: search.deadline(),
            max_in_flight: search.max_in_flight,
            max_invalid_actions: search.max_invalid_actions,
            drain_grace: search.drain_grace(),
        }
    }
}

/// Configuration for a simulation worker pool.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub num_workers: usize,

    /// Bounded capacity of the shared job queue.
    pub queue_capacity: usize,

    /// Upper bound on one dispatch, queueing included.
    pub simulation_timeout: Duration,

    /// Actions a random rollout applies before scoring a truncated state.
    pub max_rollout_depth: u32,

    /// Base seed; worker `i` uses `seed + i`. None seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            queue_capacity: 256,
            simulation_timeout: Duration::from_secs(5),
            max_rollout_depth: 200,
            seed: None,
        }
    }
}

impl WorkerConfig {
    /// Create a small seeded config for testing.
    pub fn for_testing() -> Self {
        Self {
            num_workers: 2,
            queue_capacity: 16,
            simulation_timeout: Duration::from_secs(1),
            max_rollout_depth: 50,
            seed: Some(42),
        }
    }

    pub fn with_num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn with_queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    pub fn with_simulation_timeout(mut self, timeout: Duration) -> Self {
        self.simulation_timeout = timeout;
        self
    }

    pub fn with_max_rollout_depth(mut self, depth: u32) -> Self {
        self.max_rollout_depth = depth;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.num_workers == 0 {
            return Err(EngineError::InvalidConfig(
                "num_workers must be greater than 0".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "queue_capacity must be greater than 0".into(),
            ));
        }
        if self.simulation_timeout.is_zero() {
            return Err(EngineError::InvalidConfig(
                "simulation_timeout must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

impl From<&CentralConfig> for WorkerConfig {
    fn from(config: &CentralConfig) -> Self {
        let workers = &config.workers;
        Self {
            num_workers: workers.num_workers,
            queue_capacity: workers.queue_capacity,
            simulation_timeout: workers.simulation_timeout(),
            max_rollout_depth: workers.max_rollout_depth,
            seed: workers.seed,
        }
    }
}
