//! Search tree node representation.
//!
//! Each node holds a materialized domain state reached by taking an action
//! from its parent, plus the visit statistics used for UCT selection.

use dmcts_core::SearchState;
use std::collections::VecDeque;
use std::fmt;

/// Opaque node identifier. Issued monotonically by the tree and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl NodeId {
    /// The id following this one.
    #[inline]
    pub fn next(self) -> NodeId {
        NodeId(self.0 + 1)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node in the search tree.
#[derive(Debug, Clone)]
pub struct Node<S: SearchState> {
    /// Parent node (None for root)
    pub parent: Option<NodeId>,

    /// Action that led to this node from parent (None for root)
    pub action: Option<S::Action>,

    /// Domain state at this node
    pub state: S,

    /// Expanded children as (action, child id) pairs, unique per action
    pub children: Vec<(S::Action, NodeId)>,

    /// Legal actions not yet expanded, in expansion order
    pub untried_actions: VecDeque<S::Action>,

    /// Number of completed simulations that passed through this node
    pub visit_count: u64,

    /// Sum of simulation scores backpropagated through this node
    pub total_value: f64,
}

impl<S: SearchState> Node<S> {
    /// Create a new root node, enumerating its legal actions.
    pub fn new_root(state: S) -> Self {
        Self::new(None, None, state)
    }

    /// Create a new child node reached from `parent` via `action`.
    pub fn new_child(parent: NodeId, action: S::Action, state: S) -> Self {
        Self::new(Some(parent), Some(action), state)
    }

    fn new(parent: Option<NodeId>, action: Option<S::Action>, state: S) -> Self {
        let untried_actions = state.available_actions().into();
        Self {
            parent,
            action,
            state,
            children: Vec::new(),
            untried_actions,
            visit_count: 0,
            total_value: 0.0,
        }
    }

    /// Mean score `total_value / visit_count`. Returns 0.0 if never visited.
    #[inline]
    pub fn mean_value(&self) -> f64 {
        if self.visit_count == 0 {
            0.0
        } else {
            self.total_value / self.visit_count as f64
        }
    }

    /// UCT score of this node as a child of a parent with `ln(N_parent)` given.
    ///
    /// UCT(s,a) = Q(s,a) + c * sqrt(ln(N_parent) / N(s,a))
    ///
    /// An unvisited node scores +inf so it is always tried before any visited
    /// sibling.
    #[inline]
    pub fn uct_score(&self, parent_visits_ln: f64, c: f64) -> f64 {
        if self.visit_count == 0 {
            return f64::INFINITY;
        }
        self.mean_value() + c * (parent_visits_ln / self.visit_count as f64).sqrt()
    }

    /// Whether every legal action has been turned into a child.
    #[inline]
    pub fn is_fully_expanded(&self) -> bool {
        self.untried_actions.is_empty()
    }

    /// A node with nothing left to expand and no children cannot be descended
    /// past; its own score stands in for a simulation.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.untried_actions.is_empty() && self.children.is_empty()
    }

    /// Whether `id` is one of this node's children.
    pub fn has_child(&self, id: NodeId) -> bool {
        self.children.iter().any(|(_, child)| *child == id)
    }
}
