//! Typed state/action contract implemented by each domain.
//!
//! States are immutable values: `apply` returns a new state and leaves the
//! input untouched, so the same state can be handed to several simulation
//! workers at once.

use std::fmt::Debug;

/// Error returned when an action is not legal in the state it is applied to.
///
/// The engine treats this as a bug in the domain adapter, never as a normal
/// search outcome.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid action {action}: {reason}")]
pub struct InvalidActionError {
    /// Debug rendering of the rejected action
    pub action: String,
    /// Why the domain rejected it
    pub reason: String,
}

impl InvalidActionError {
    pub fn new(action: &impl Debug, reason: impl Into<String>) -> Self {
        Self {
            action: format!("{:?}", action),
            reason: reason.into(),
        }
    }
}

/// Trait for problem states explored by the search tree.
///
/// # Type Parameters
///
/// * `Action` - Move type, compared by equality when looking up children
///
/// # Example
///
/// ```rust
/// use dmcts_core::{InvalidActionError, SearchState};
///
/// #[derive(Debug, Clone)]
/// struct Countdown(u32);
///
/// impl SearchState for Countdown {
///     type Action = u32;
///
///     fn available_actions(&self) -> Vec<u32> {
///         (1..=self.0.min(2)).collect()
///     }
///
///     fn apply(&self, action: &u32) -> Result<Self, InvalidActionError> {
///         if *action == 0 || *action > self.0.min(2) {
///             return Err(InvalidActionError::new(action, "step out of range"));
///         }
///         Ok(Countdown(self.0 - action))
///     }
///
///     fn score(&self) -> f64 {
///         -(self.0 as f64)
///     }
/// }
///
/// let next = Countdown(3).apply(&2).unwrap();
/// assert_eq!(next.0, 1);
/// assert!(Countdown(1).apply(&2).is_err());
/// ```
pub trait SearchState: Clone + Debug + Send + Sync + 'static {
    /// Action type - should be small and cheap to clone
    type Action: Clone + PartialEq + Debug + Send + Sync + 'static;

    /// Legal actions from this state.
    ///
    /// Must be deterministic: the order returned is the order in which the
    /// tree expands children. An empty result marks a terminal state.
    fn available_actions(&self) -> Vec<Self::Action>;

    /// Produce the successor state reached by `action`.
    ///
    /// Must not mutate `self`. Returns `InvalidActionError` if `action` is not
    /// currently legal.
    fn apply(&self, action: &Self::Action) -> Result<Self, InvalidActionError>;

    /// Heuristic or terminal evaluation of this state.
    fn score(&self) -> f64;

    /// Whether the state has no legal actions.
    fn is_terminal(&self) -> bool {
        self.available_actions().is_empty()
    }
}
