//! Core contract for the DMCTS search engine
//!
//! This crate provides the one abstraction every problem domain implements:
//! - `SearchState`: enumerate legal actions, apply an action, score a state
//! - `InvalidActionError`: raised when an action is applied where it is not legal
//!
//! The tree engine (`dmcts` crate) is generic over `SearchState` and never
//! inspects what a state represents.

pub mod state;

pub use state::{InvalidActionError, SearchState};
