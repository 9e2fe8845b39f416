//! Tree engine: drives select / expand / simulate / backpropagate cycles.
//!
//! The engine is the single owner of its `SearchTree`. Expansion and
//! backpropagation run synchronously between awaits, so no node reference is
//! ever held across a suspension point. Terminal nodes, including freshly
//! expanded ones, are scored in place and never dispatched.
//!
//! Up to `max_in_flight` simulations run at once. Each is tagged with the tree
//! generation it was issued under, and a result that no longer matches the
//! live tree is discarded.

use std::sync::Arc;
use std::time::Duration;

use dmcts_core::{InvalidActionError, SearchState};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::config::SearchConfig;
use crate::error::{EngineError, SimulationError};
use crate::metrics;
use crate::node::NodeId;
use crate::tree::{NodeView, SearchTree, TreeStats};
use crate::worker::SimulationDispatcher;

/// Limits for one `build` call.
///
/// A budget with neither bound falls back to the engine's configured
/// iteration count and deadline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Budget {
    pub iterations: Option<u64>,
    pub deadline: Option<Duration>,
}

impl Budget {
    pub fn iterations(n: u64) -> Self {
        Self {
            iterations: Some(n),
            deadline: None,
        }
    }

    pub fn deadline(d: Duration) -> Self {
        Self {
            iterations: None,
            deadline: Some(d),
        }
    }

    /// Whichever bound is hit first ends the build.
    pub fn new(iterations: u64, deadline: Duration) -> Self {
        Self {
            iterations: Some(iterations),
            deadline: Some(deadline),
        }
    }

    fn resolve(self, config: &SearchConfig) -> (Option<u64>, Option<Duration>) {
        match (self.iterations, self.deadline) {
            (None, None) => (Some(config.iterations), config.deadline),
            bounds => bounds,
        }
    }
}

/// Outcome counts of one build.
///
/// `completed` includes `terminal_hits`. Every issued iteration lands in
/// exactly one of completed, failed, timed_out, invalid_actions, cancelled or
/// stale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub issued: u64,
    pub completed: u64,
    pub terminal_hits: u64,
    pub failed: u64,
    pub timed_out: u64,
    pub invalid_actions: u32,
    pub cancelled: u64,
    pub stale: u64,
    pub elapsed: Duration,
    /// Tree size when the build returned
    pub nodes: usize,
}

impl BuildReport {
    /// Iterations that contributed nothing to the tree.
    pub fn dropped(&self) -> u64 {
        self.failed + self.timed_out + self.invalid_actions as u64 + self.cancelled + self.stale
    }

    pub fn log_summary(&self) {
        info!(
            issued = self.issued,
            completed = self.completed,
            terminal_hits = self.terminal_hits,
            failed = self.failed,
            timed_out = self.timed_out,
            invalid_actions = self.invalid_actions,
            cancelled = self.cancelled,
            stale = self.stale,
            nodes = self.nodes,
            elapsed_ms = self.elapsed.as_millis() as u64,
            "Build finished"
        );
    }

    fn record_metrics(&self) {
        metrics::BUILDS_TOTAL.inc();
        metrics::ITERATIONS_COMPLETED.inc_by(self.completed);
        metrics::TERMINAL_HITS.inc_by(self.terminal_hits);
        metrics::record_dropped("failed", self.failed);
        metrics::record_dropped("timeout", self.timed_out);
        metrics::record_dropped("invalid_action", self.invalid_actions as u64);
        metrics::record_dropped("cancelled", self.cancelled);
        metrics::record_dropped("stale", self.stale);
        metrics::BUILD_SECONDS.observe(self.elapsed.as_secs_f64());
        metrics::TREE_NODES.set(self.nodes as i64);
    }
}

/// A simulation awaiting its result.
///
/// The state snapshot travels with the dispatch itself; only the identity
/// needed to apply the result stays here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingSimulation {
    node: NodeId,
    generation: u64,
}

/// Iterations issued between cooperative yields.
const YIELD_EVERY: u64 = 32;

type Completion = (PendingSimulation, Result<f64, SimulationError>, Duration);

/// Owns a search tree and builds it with a simulation dispatcher.
pub struct TreeEngine<S: SearchState> {
    config: SearchConfig,
    dispatcher: Arc<dyn SimulationDispatcher<S>>,
    tree: Option<SearchTree<S>>,
}

impl<S: SearchState> TreeEngine<S> {
    pub fn new(
        config: SearchConfig,
        dispatcher: Arc<dyn SimulationDispatcher<S>>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            dispatcher,
            tree: None,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.tree.is_some()
    }

    /// Create the root. Fails if a tree already exists; use `reset` to replace it.
    pub fn init(&mut self, root_state: S) -> Result<NodeId, EngineError> {
        if self.tree.is_some() {
            return Err(EngineError::AlreadyInitialized);
        }
        Ok(self.reset(root_state))
    }

    /// Discard any existing tree and start over from `root_state`.
    ///
    /// Node ids keep increasing across resets.
    pub fn reset(&mut self, root_state: S) -> NodeId {
        let first = self
            .tree
            .as_ref()
            .map_or(NodeId(0), |tree| tree.next_id());
        let tree = SearchTree::with_first_id(root_state, first);
        let root = tree.root();
        debug!(
            root = %root,
            actions = tree.root_node().untried_actions.len(),
            "Tree initialized"
        );
        self.tree = Some(tree);
        root
    }

    pub fn tree(&self) -> Option<&SearchTree<S>> {
        self.tree.as_ref()
    }

    fn live_tree(&self) -> Result<&SearchTree<S>, EngineError> {
        self.tree.as_ref().ok_or(EngineError::Uninitialized)
    }

    /// Run iterations until `budget` is exhausted.
    ///
    /// Dropped iterations (failed, timed out, invalid) are reported, not
    /// returned as errors, unless invalid actions reach the configured limit.
    /// Statistics from completed iterations stay in the tree either way.
    pub async fn build(&mut self, budget: Budget) -> Result<BuildReport, EngineError> {
        let tree = self.tree.as_mut().ok_or(EngineError::Uninitialized)?;
        let (iterations, deadline) = budget.resolve(&self.config);
        let started = Instant::now();

        debug!(
            ?iterations,
            ?deadline,
            root = %tree.root(),
            max_in_flight = self.config.max_in_flight,
            "Starting build"
        );

        let run = BuildRun::new(&mut *tree, &self.config, &self.dispatcher);
        let (mut report, last_invalid) = run.run(iterations, deadline.map(|d| started + d)).await;

        report.elapsed = started.elapsed();
        report.nodes = tree.len();
        report.record_metrics();
        report.log_summary();

        if report.invalid_actions >= self.config.max_invalid_actions {
            if let Some(last) = last_invalid {
                warn!(
                    count = report.invalid_actions,
                    "Build halted on repeated invalid actions"
                );
                return Err(EngineError::InvalidActionLimit {
                    count: report.invalid_actions,
                    last,
                });
            }
        }

        Ok(report)
    }

    /// The most visited root child. `None` means the root has no children.
    pub fn top_action(&self) -> Result<Option<NodeView<S::Action>>, EngineError> {
        Ok(self.live_tree()?.top_action())
    }

    pub fn root_children(&self) -> Result<Vec<NodeView<S::Action>>, EngineError> {
        Ok(self.live_tree()?.root_children())
    }

    /// Re-root at `node_id`, a child of the current root, keeping its subtree.
    pub fn continue_from(&mut self, node_id: NodeId) -> Result<(), EngineError> {
        let tree = self.tree.as_mut().ok_or(EngineError::Uninitialized)?;
        let discarded = tree.continue_from(node_id)?;
        debug!(
            root = %node_id,
            discarded,
            kept = tree.len(),
            generation = tree.generation(),
            "Continued from child"
        );
        Ok(())
    }

    pub fn stats(&self) -> Option<TreeStats> {
        self.tree.as_ref().map(SearchTree::stats)
    }
}

/// State of one `build` call.
struct BuildRun<'a, S: SearchState> {
    tree: &'a mut SearchTree<S>,
    config: &'a SearchConfig,
    dispatcher: &'a Arc<dyn SimulationDispatcher<S>>,
    in_flight: JoinSet<Completion>,
    report: BuildReport,
    last_invalid: Option<InvalidActionError>,
}

impl<'a, S: SearchState> BuildRun<'a, S> {
    fn new(
        tree: &'a mut SearchTree<S>,
        config: &'a SearchConfig,
        dispatcher: &'a Arc<dyn SimulationDispatcher<S>>,
    ) -> Self {
        Self {
            tree,
            config,
            dispatcher,
            in_flight: JoinSet::new(),
            report: BuildReport::default(),
            last_invalid: None,
        }
    }

    async fn run(
        mut self,
        iterations: Option<u64>,
        deadline: Option<Instant>,
    ) -> (BuildReport, Option<InvalidActionError>) {
        loop {
            while self.in_flight.len() < self.config.max_in_flight
                && self.may_issue(iterations, deadline)
            {
                self.issue();
                // Terminal hits never await, so hand the thread back periodically
                if self.report.issued % YIELD_EVERY == 0 {
                    tokio::task::yield_now().await;
                }
            }

            if self.in_flight.is_empty() || !self.may_issue(iterations, deadline) {
                break;
            }

            let joined = match deadline {
                Some(at) => tokio::select! {
                    joined = self.in_flight.join_next() => joined,
                    _ = tokio::time::sleep_until(at) => break,
                },
                None => self.in_flight.join_next().await,
            };
            if let Some(joined) = joined {
                self.apply(joined);
            }
        }

        if !self.in_flight.is_empty() {
            debug!(in_flight = self.in_flight.len(), "Draining simulations");
            match deadline {
                Some(at) => {
                    let until = at.max(Instant::now()) + self.config.drain_grace;
                    // Elapsed means the grace window closed with work outstanding
                    let _ = tokio::time::timeout_at(until, self.drain()).await;
                    self.cancel_remaining();
                }
                None => self.drain().await,
            }
        }

        (self.report, self.last_invalid)
    }

    fn halted(&self) -> bool {
        self.report.invalid_actions >= self.config.max_invalid_actions
    }

    fn may_issue(&self, iterations: Option<u64>, deadline: Option<Instant>) -> bool {
        !self.halted()
            && iterations.map_or(true, |n| self.report.issued < n)
            && deadline.map_or(true, |at| Instant::now() < at)
    }

    /// Run selection and expansion for one iteration, then score or dispatch.
    fn issue(&mut self) {
        self.report.issued += 1;
        let leaf = self.tree.select(self.config.exploration_constant);

        if self.score_if_terminal(leaf) {
            return;
        }

        match self.tree.expand(leaf) {
            Ok(Some(child)) => {
                if !self.score_if_terminal(child) {
                    self.dispatch(child);
                }
            }
            // select only stops at terminal nodes or nodes with untried actions
            Ok(None) => debug_assert!(false, "selected node {leaf} had nothing to expand"),
            Err(e) => self.record_invalid(leaf, e),
        }
    }

    /// Backpropagate a terminal node's own score in place of a simulation.
    fn score_if_terminal(&mut self, node_id: NodeId) -> bool {
        let score = match self.tree.get(node_id) {
            Some(node) if node.is_terminal() => node.state.score(),
            _ => return false,
        };
        self.tree.backpropagate(node_id, score);
        self.report.completed += 1;
        self.report.terminal_hits += 1;
        trace!(node = %node_id, score, "Scored terminal node");
        true
    }

    fn dispatch(&mut self, node: NodeId) {
        let Some(state) = self.tree.get(node).map(|n| n.state.clone()) else {
            return;
        };
        let pending = PendingSimulation {
            node,
            generation: self.tree.generation(),
        };
        let dispatcher = Arc::clone(self.dispatcher);

        trace!(node = %node, in_flight = self.in_flight.len() + 1, "Dispatching simulation");
        self.in_flight.spawn(async move {
            let started = Instant::now();
            let result = dispatcher.simulate(state).await;
            (pending, result, started.elapsed())
        });
    }

    fn apply(&mut self, joined: Result<Completion, JoinError>) {
        let (pending, result, elapsed) = match joined {
            Ok(completion) => completion,
            Err(e) => {
                self.report.failed += 1;
                warn!("Simulation task ended without a result: {}", e);
                return;
            }
        };
        metrics::observe_simulation(elapsed);

        match result {
            Ok(score) => self.backpropagate(pending, score),
            Err(SimulationError::InvalidAction(e)) => self.record_invalid(pending.node, e),
            Err(SimulationError::Timeout(timeout)) => {
                self.report.timed_out += 1;
                warn!(node = %pending.node, ?timeout, "Simulation timed out");
            }
            Err(e) => {
                self.report.failed += 1;
                warn!(node = %pending.node, kind = e.kind(), "Simulation failed: {}", e);
            }
        }
    }

    fn backpropagate(&mut self, pending: PendingSimulation, score: f64) {
        if pending.generation != self.tree.generation() || !self.tree.contains(pending.node) {
            self.report.stale += 1;
            debug!(
                node = %pending.node,
                issued_generation = pending.generation,
                generation = self.tree.generation(),
                "Discarding stale simulation result"
            );
            return;
        }

        let updated = self.tree.backpropagate(pending.node, score);
        self.report.completed += 1;
        trace!(node = %pending.node, score, updated, "Backpropagated");
    }

    fn record_invalid(&mut self, node: NodeId, error: InvalidActionError) {
        self.report.invalid_actions += 1;
        warn!(
            node = %node,
            count = self.report.invalid_actions,
            limit = self.config.max_invalid_actions,
            "Iteration aborted: {}",
            error
        );
        self.last_invalid = Some(error);
    }

    async fn drain(&mut self) {
        while let Some(joined) = self.in_flight.join_next().await {
            self.apply(joined);
        }
    }

    fn cancel_remaining(&mut self) {
        let remaining = self.in_flight.len() as u64;
        if remaining > 0 {
            warn!(remaining, "Cancelling simulations still running after drain grace");
            self.in_flight.abort_all();
            self.report.cancelled += remaining;
        }
    }
}
