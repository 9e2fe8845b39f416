//! Distributed Monte Carlo Tree Search.
//!
//! This crate builds a UCT search tree over any domain implementing the
//! `dmcts-core` [`SearchState`] trait, offloading the simulation step to a
//! pool of independent workers so many playouts run at once.
//!
//! # Overview
//!
//! Each iteration has four phases:
//!
//! 1. **Selection**: From the root, descend through fully expanded nodes to
//!    the child maximizing `mean + C * sqrt(ln(N_parent) / N_child)`.
//!    Unvisited children are always chosen first.
//! 2. **Expansion**: Turn the first untried action of the selected node into
//!    a child.
//! 3. **Simulation**: Ship the child's state to a worker, which plays it out
//!    and returns a scalar. Terminal nodes are scored in place.
//! 4. **Backpropagation**: Add the scalar to every node from the child up to
//!    the root.
//!
//! Simulations are pipelined: up to `max_in_flight` run concurrently while
//! the engine keeps selecting and expanding.
//!
//! # Usage
//!
//! ```rust,ignore
//! use dmcts::{Budget, SearchConfig, TreeEngine, WorkerConfig, WorkerPool};
//! use games_knapsack::{Item, Knapsack};
//! use std::sync::Arc;
//!
//! let pool = Arc::new(WorkerPool::random_rollout(&WorkerConfig::default())?);
//! let mut engine = TreeEngine::new(SearchConfig::default(), pool.clone())?;
//!
//! let items = vec![Item::new(12, 4), Item::new(2, 2), Item::new(1, 1)];
//! engine.init(Knapsack::new(items, 15))?;
//!
//! let report = engine.build(Budget::iterations(2000)).await?;
//! if let Some(top) = engine.top_action()? {
//!     println!("Best first move: {:?} ({} visits)", top.action, top.visit_count);
//!     engine.continue_from(top.id)?;
//! }
//!
//! pool.shutdown().await;
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  commands   ┌────────────────────────────┐
//! │  TreeHandle  │ ──────────▶ │    tree service task       │
//! └──────────────┘  (mpsc)     │  ┌──────────────────────┐  │
//!                              │  │     TreeEngine       │  │
//!                              │  │  ┌────────────────┐  │  │
//!                              │  │  │   SearchTree   │  │  │
//!                              │  │  └────────────────┘  │  │
//!                              │  └──────────┬───────────┘  │
//!                              └─────────────┼──────────────┘
//!                                            │ SimulationDispatcher
//!                                            ▼
//!                              ┌────────────────────────────┐
//!                              │ WorkerPool (N tokio tasks) │
//!                              │ one ChaCha20Rng per worker │
//!                              └────────────────────────────┘
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod node;
pub mod service;
pub mod tree;
pub mod worker;

// Re-export main types
pub use config::{SearchConfig, WorkerConfig};
pub use dmcts_core::{InvalidActionError, SearchState};
pub use engine::{Budget, BuildReport, TreeEngine};
pub use error::{EngineError, SimulationError};
pub use node::{Node, NodeId};
pub use service::{spawn_tree, TreeHandle};
pub use tree::{NodeView, SearchTree, TreeStats};
pub use worker::{
    InlineDispatcher, RandomRollout, SimulationDispatcher, SimulationWorker, WorkerPool,
};
