//! Tree service: one task owning one `TreeEngine`, driven by commands.
//!
//! Each tree instance is reachable only through its `TreeHandle`. Commands are
//! handled strictly in arrival order, one at a time, so a `continue_from`
//! never interleaves with the in-flight simulations of a `build`.

use dmcts_core::SearchState;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::{Budget, BuildReport, TreeEngine};
use crate::error::EngineError;
use crate::node::NodeId;
use crate::tree::{NodeView, TreeStats};

const COMMAND_QUEUE_CAPACITY: usize = 32;

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

enum Command<S: SearchState> {
    Init { state: S, reply: Reply<NodeId> },
    Reset { state: S, reply: Reply<NodeId> },
    Build { budget: Budget, reply: Reply<BuildReport> },
    TopAction { reply: Reply<Option<NodeView<S::Action>>> },
    ContinueFrom { node: NodeId, reply: Reply<()> },
    Stats { reply: Reply<Option<TreeStats>> },
}

/// Cloneable address of a running tree service.
pub struct TreeHandle<S: SearchState> {
    commands: mpsc::Sender<Command<S>>,
}

impl<S: SearchState> Clone for TreeHandle<S> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
        }
    }
}

/// Move `engine` into its own task and return a handle to it.
///
/// The task runs until every handle has been dropped.
pub fn spawn_tree<S: SearchState>(engine: TreeEngine<S>) -> (TreeHandle<S>, JoinHandle<()>) {
    let (commands, receiver) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    let task = tokio::spawn(serve(engine, receiver));
    (TreeHandle { commands }, task)
}

async fn serve<S: SearchState>(mut engine: TreeEngine<S>, mut commands: mpsc::Receiver<Command<S>>) {
    debug!("Tree service started");

    // A dropped reply means the caller stopped waiting; the command still ran
    while let Some(command) = commands.recv().await {
        match command {
            Command::Init { state, reply } => {
                let _ = reply.send(engine.init(state));
            }
            Command::Reset { state, reply } => {
                let _ = reply.send(Ok(engine.reset(state)));
            }
            Command::Build { budget, reply } => {
                let _ = reply.send(engine.build(budget).await);
            }
            Command::TopAction { reply } => {
                let _ = reply.send(engine.top_action());
            }
            Command::ContinueFrom { node, reply } => {
                let _ = reply.send(engine.continue_from(node));
            }
            Command::Stats { reply } => {
                let _ = reply.send(Ok(engine.stats()));
            }
        }
    }

    debug!("Tree service stopped");
}

impl<S: SearchState> TreeHandle<S> {
    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command<S>,
    ) -> Result<T, EngineError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| EngineError::ServiceStopped)?;
        response.await.map_err(|_| EngineError::ServiceStopped)?
    }

    pub async fn init(&self, state: S) -> Result<NodeId, EngineError> {
        self.request(|reply| Command::Init { state, reply }).await
    }

    pub async fn reset(&self, state: S) -> Result<NodeId, EngineError> {
        self.request(|reply| Command::Reset { state, reply }).await
    }

    pub async fn build(&self, budget: Budget) -> Result<BuildReport, EngineError> {
        self.request(|reply| Command::Build { budget, reply }).await
    }

    pub async fn top_action(&self) -> Result<Option<NodeView<S::Action>>, EngineError> {
        self.request(|reply| Command::TopAction { reply }).await
    }

    pub async fn continue_from(&self, node: NodeId) -> Result<(), EngineError> {
        self.request(|reply| Command::ContinueFrom { node, reply }).await
    }

    pub async fn stats(&self) -> Result<Option<TreeStats>, EngineError> {
        self.request(|reply| Command::Stats { reply }).await
    }

    /// Whether the service task has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::error::SimulationError;
    use crate::worker::{InlineDispatcher, RandomRollout, SimulationDispatcher};
    use async_trait::async_trait;
    use dmcts_core::InvalidActionError;
    use std::sync::Arc;
    use std::time::Duration;

    /// Climb up to `top` rungs, one or two at a time; score is the height.
    #[derive(Debug, Clone, PartialEq)]
    struct Ladder {
        rung: u32,
        top: u32,
    }

    impl SearchState for Ladder {
        type Action = u32;

        fn available_actions(&self) -> Vec<u32> {
            (1..=2).filter(|step| self.rung + step <= self.top).collect()
        }

        fn apply(&self, step: &u32) -> Result<Self, InvalidActionError> {
            if self.rung + step > self.top {
                return Err(InvalidActionError::new(step, "past the top"));
            }
            Ok(Ladder {
                rung: self.rung + step,
                top: self.top,
            })
        }

        fn score(&self) -> f64 {
            self.rung as f64
        }
    }

    struct Delayed(Duration);

    #[async_trait]
    impl SimulationDispatcher<Ladder> for Delayed {
        async fn simulate(&self, state: Ladder) -> Result<f64, SimulationError> {
            tokio::time::sleep(self.0).await;
            Ok(state.score())
        }
    }

    fn ladder(top: u32) -> Ladder {
        Ladder { rung: 0, top }
    }

    fn spawn_inline() -> (TreeHandle<Ladder>, JoinHandle<()>) {
        let dispatcher: Arc<dyn SimulationDispatcher<Ladder>> =
            Arc::new(InlineDispatcher::<Ladder>::new(RandomRollout::new(50), 1));
        let engine = TreeEngine::new(SearchConfig::for_testing(), dispatcher).unwrap();
        spawn_tree(engine)
    }

    #[tokio::test]
    async fn test_service_round_trip() {
        let (handle, _task) = spawn_inline();

        let root = handle.init(ladder(6)).await.unwrap();
        assert_eq!(root, NodeId(0));
        assert!(matches!(
            handle.init(ladder(6)).await,
            Err(EngineError::AlreadyInitialized)
        ));

        let report = handle.build(Budget::iterations(40)).await.unwrap();
        assert_eq!(report.completed, 40);

        let top = handle.top_action().await.unwrap().unwrap();
        handle.continue_from(top.id).await.unwrap();

        let stats = handle.stats().await.unwrap().unwrap();
        assert_eq!(stats.generation, 1);
        assert_eq!(stats.root_visits, top.visit_count);

        let err = handle.continue_from(NodeId(9999)).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownNode(NodeId(9999))));
    }

    #[tokio::test]
    async fn test_service_reports_uninitialized() {
        let (handle, _task) = spawn_inline();

        assert!(handle.stats().await.unwrap().is_none());
        assert!(matches!(
            handle.build(Budget::iterations(1)).await,
            Err(EngineError::Uninitialized)
        ));

        let root = handle.reset(ladder(3)).await.unwrap();
        assert_eq!(root, NodeId(0));
        assert!(handle.stats().await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_are_serialized_behind_build() {
        let dispatcher: Arc<dyn SimulationDispatcher<Ladder>> =
            Arc::new(Delayed(Duration::from_millis(5)));
        let config = SearchConfig::for_testing().with_max_in_flight(4);
        let engine = TreeEngine::new(config, dispatcher).unwrap();
        let (handle, _task) = spawn_tree(engine);
        handle.init(ladder(20)).await.unwrap();

        // join! polls in order, so the stats request is queued behind the build
        let (report, stats) = tokio::join!(handle.build(Budget::iterations(30)), handle.stats());
        let report = report.unwrap();
        let stats = stats.unwrap().unwrap();

        assert_eq!(report.completed, 30);
        assert_eq!(stats.root_visits, 30);
    }

    #[tokio::test]
    async fn test_service_exits_when_handles_dropped() {
        let (handle, task) = spawn_inline();
        let other = handle.clone();
        handle.init(ladder(4)).await.unwrap();

        drop(handle);
        drop(other);

        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("service should stop")
            .unwrap();
    }

    #[tokio::test]
    async fn test_stopped_service() {
        let (handle, task) = spawn_inline();
        task.abort();
        let _ = task.await;

        assert!(handle.is_closed());
        assert!(matches!(
            handle.init(ladder(4)).await,
            Err(EngineError::ServiceStopped)
        ));
        assert!(matches!(
            handle.top_action().await,
            Err(EngineError::ServiceStopped)
        ));
    }
}
