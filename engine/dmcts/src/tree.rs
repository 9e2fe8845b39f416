//! Search tree store.
//!
//! Nodes live in a map keyed by `NodeId`. Ids come from a monotonically
//! increasing counter, so re-rooting can drop whole subtrees without ever
//! handing out an id twice. The tree is the only holder of node records;
//! callers mutate it exclusively through the methods below.

use crate::error::EngineError;
use crate::node::{Node, NodeId};
use dmcts_core::{InvalidActionError, SearchState};
use std::collections::HashMap;

/// Read-only summary of a root child, returned by search queries.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView<A> {
    pub id: NodeId,
    pub action: A,
    pub visit_count: u64,
    pub mean_value: f64,
}

/// Search tree with map-based node storage.
#[derive(Debug)]
pub struct SearchTree<S: SearchState> {
    nodes: HashMap<NodeId, Node<S>>,

    root: NodeId,

    /// Next id to hand out
    next_id: NodeId,

    /// Incremented on every re-root so results issued before it can be told apart
    generation: u64,
}

impl<S: SearchState> SearchTree<S> {
    /// Create a new tree whose root holds `root_state`.
    pub fn new(root_state: S) -> Self {
        Self::with_first_id(root_state, NodeId(0))
    }

    /// Create a new tree whose ids start at `first`.
    ///
    /// Used when replacing a tree so ids stay unique across the engine's lifetime.
    pub fn with_first_id(root_state: S, first: NodeId) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(first, Node::new_root(root_state));
        Self {
            nodes,
            root: first,
            next_id: first.next(),
            generation: 0,
        }
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    #[inline]
    pub fn root_node(&self) -> &Node<S> {
        &self.nodes[&self.root]
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node<S>> {
        self.nodes.get(&id)
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The id the next allocated node will receive.
    #[inline]
    pub fn next_id(&self) -> NodeId {
        self.next_id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false once constructed; the root is never removed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn allocate(&mut self, node: Node<S>) -> NodeId {
        let id = self.next_id;
        self.next_id = id.next();
        self.nodes.insert(id, node);
        id
    }

    /// Select the child of `node_id` with the highest UCT score.
    ///
    /// Unvisited children win outright. Ties go to the lowest node id.
    pub fn select_child(&self, node_id: NodeId, c: f64) -> Option<NodeId> {
        let node = self.get(node_id)?;
        // Pre-compute ln once instead of per-child comparison
        let parent_visits_ln = (node.visit_count.max(1) as f64).ln();

        let mut best: Option<(f64, NodeId)> = None;
        for &(_, child_id) in &node.children {
            let Some(child) = self.get(child_id) else {
                continue;
            };
            let score = child.uct_score(parent_visits_ln, c);
            best = match best {
                Some((best_score, best_id))
                    if best_score > score || (best_score == score && best_id < child_id) =>
                {
                    Some((best_score, best_id))
                }
                _ => Some((score, child_id)),
            };
        }
        best.map(|(_, id)| id)
    }

    /// Descend from the root while the current node is fully expanded and
    /// has children. Returns the node where expansion (or scoring) happens.
    pub fn select(&self, c: f64) -> NodeId {
        let mut current = self.root;

        loop {
            let node = &self.nodes[&current];
            if !node.is_fully_expanded() || node.children.is_empty() {
                return current;
            }
            match self.select_child(current, c) {
                Some(child) => current = child,
                None => return current,
            }
        }
    }

    /// Expand the first untried action of `node_id`.
    ///
    /// Returns `Ok(None)` when there is nothing to expand. The action is
    /// removed from the untried list before it is applied, so an action the
    /// domain rejects is never retried.
    pub fn expand(&mut self, node_id: NodeId) -> Result<Option<NodeId>, InvalidActionError> {
        let Some(node) = self.nodes.get_mut(&node_id) else {
            return Ok(None);
        };
        let Some(action) = node.untried_actions.pop_front() else {
            return Ok(None);
        };

        let child_state = node.state.apply(&action)?;
        let child = Node::new_child(node_id, action.clone(), child_state);
        let child_id = self.allocate(child);

        if let Some(parent) = self.nodes.get_mut(&node_id) {
            parent.children.push((action, child_id));
        }

        Ok(Some(child_id))
    }

    /// Add `score` to every node from `leaf_id` up to the root, inclusive.
    ///
    /// Returns the number of nodes updated (0 if `leaf_id` is not in the tree).
    pub fn backpropagate(&mut self, leaf_id: NodeId, score: f64) -> usize {
        let mut current = Some(leaf_id);
        let mut updated = 0;

        while let Some(id) = current {
            let Some(node) = self.nodes.get_mut(&id) else {
                break;
            };
            node.visit_count += 1;
            node.total_value += score;
            updated += 1;
            current = node.parent;
        }

        updated
    }

    /// The root child with the most visits. Ties go to the lowest node id.
    pub fn best_child_by_visits(&self) -> Option<NodeId> {
        self.root_node()
            .children
            .iter()
            .filter_map(|(_, id)| self.get(*id).map(|n| (n.visit_count, *id)))
            .max_by(|(va, ia), (vb, ib)| va.cmp(vb).then(ib.cmp(ia)))
            .map(|(_, id)| id)
    }

    /// The most visited root child as a view, or None if the root has no children.
    pub fn top_action(&self) -> Option<NodeView<S::Action>> {
        self.best_child_by_visits().and_then(|id| self.view(id))
    }

    /// Views of every root child in expansion order.
    pub fn root_children(&self) -> Vec<NodeView<S::Action>> {
        self.root_node()
            .children
            .iter()
            .filter_map(|(_, id)| self.view(*id))
            .collect()
    }

    fn view(&self, id: NodeId) -> Option<NodeView<S::Action>> {
        let node = self.get(id)?;
        Some(NodeView {
            id,
            action: node.action.clone()?,
            visit_count: node.visit_count,
            mean_value: node.mean_value(),
        })
    }

    /// Re-root the tree at `node_id`, which must be a child of the current root.
    ///
    /// Every node outside the new root's subtree is dropped. Returns how many
    /// nodes were discarded. On error the tree is left untouched.
    pub fn continue_from(&mut self, node_id: NodeId) -> Result<usize, EngineError> {
        if !self.root_node().has_child(node_id) {
            return Err(EngineError::UnknownNode(node_id));
        }

        let mut keep = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![node_id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                keep.push(id);
                stack.extend(node.children.iter().map(|(_, child)| *child));
            }
        }

        let mut kept = HashMap::with_capacity(keep.len());
        for id in keep {
            if let Some(node) = self.nodes.remove(&id) {
                kept.insert(id, node);
            }
        }
        let discarded = self.nodes.len();
        self.nodes = kept;

        if let Some(root) = self.nodes.get_mut(&node_id) {
            root.parent = None;
            root.action = None;
        }
        self.root = node_id;
        self.generation += 1;

        Ok(discarded)
    }

    /// Get statistics about the tree for debugging.
    pub fn stats(&self) -> TreeStats {
        let root = self.root_node();
        TreeStats {
            total_nodes: self.nodes.len(),
            root_visits: root.visit_count,
            root_value: root.mean_value(),
            max_depth: self.compute_max_depth(),
            generation: self.generation,
        }
    }

    fn compute_max_depth(&self) -> u32 {
        // Iterative so very deep rollouts-turned-branches cannot overflow the stack
        let mut max_depth = 0;
        let mut stack = vec![(self.root, 0u32)];
        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            if let Some(node) = self.get(id) {
                stack.extend(node.children.iter().map(|(_, child)| (*child, depth + 1)));
            }
        }
        max_depth
    }
}

/// Statistics about a search tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeStats {
    pub total_nodes: usize,
    pub root_visits: u64,
    pub root_value: f64,
    pub max_depth: u32,
    pub generation: u64,
}
