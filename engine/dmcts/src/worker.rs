//! Simulation workers and the dispatch seam between the tree and them.
//!
//! A `SimulationWorker` is the synchronous playout policy. A
//! `SimulationDispatcher` is the transport: hand a state to some worker and
//! await its scalar. Two dispatchers ship with the crate:
//!
//! - `WorkerPool`: N tokio tasks sharing a bounded job queue, each owning its
//!   RNG, running rollouts on the blocking thread pool.
//! - `InlineDispatcher`: runs the worker on the caller's task. Deterministic
//!   for a given seed, used by tests and benches.

use crate::config::WorkerConfig;
use crate::error::{EngineError, SimulationError};
use async_trait::async_trait;
use dmcts_core::SearchState;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A playout policy.
///
/// Implementations must not hold mutable state of their own; all randomness
/// comes from the RNG the caller owns.
pub trait SimulationWorker<S: SearchState>: Send + Sync {
    fn simulate(&self, state: &S, rng: &mut ChaCha20Rng) -> Result<f64, SimulationError>;
}

/// Uniform-random playout, truncated after `max_depth` applied actions.
#[derive(Debug, Clone, Copy)]
pub struct RandomRollout {
    pub max_depth: u32,
}

impl RandomRollout {
    pub fn new(max_depth: u32) -> Self {
        Self { max_depth }
    }
}

impl<S: SearchState> SimulationWorker<S> for RandomRollout {
    fn simulate(&self, state: &S, rng: &mut ChaCha20Rng) -> Result<f64, SimulationError> {
        let mut current = state.clone();

        for _ in 0..self.max_depth {
            let actions = current.available_actions();
            if actions.is_empty() {
                break;
            }
            let action = &actions[rng.gen_range(0..actions.len())];
            current = current.apply(action)?;
        }

        Ok(current.score())
    }
}

/// Transport capability: run one simulation somewhere and await its result.
#[async_trait]
pub trait SimulationDispatcher<S: SearchState>: Send + Sync {
    async fn simulate(&self, state: S) -> Result<f64, SimulationError>;
}

/// RNG for worker `index`: `seed + index` when seeded, entropy otherwise.
fn worker_rng(seed: Option<u64>, index: usize) -> ChaCha20Rng {
    match seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed.wrapping_add(index as u64)),
        None => ChaCha20Rng::seed_from_u64(rand::random()),
    }
}

struct Job<S> {
    state: S,
    reply: oneshot::Sender<Result<f64, SimulationError>>,
}

type SharedReceiver<S> = Arc<tokio::sync::Mutex<mpsc::Receiver<Job<S>>>>;

/// Pool of simulation worker tasks fed from one bounded queue.
pub struct WorkerPool<S: SearchState> {
    /// None once shut down
    sender: Mutex<Option<mpsc::Sender<Job<S>>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    timeout: Duration,
    num_workers: usize,
}

impl<S: SearchState> WorkerPool<S> {
    /// Spawn `config.num_workers` tasks running `worker`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<W>(worker: W, config: &WorkerConfig) -> Result<Self, EngineError>
    where
        W: SimulationWorker<S> + 'static,
    {
        config.validate()?;

        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let receiver: SharedReceiver<S> = Arc::new(tokio::sync::Mutex::new(receiver));
        let worker = Arc::new(worker);

        let handles = (0..config.num_workers)
            .map(|index| {
                let rng = worker_rng(config.seed, index);
                tokio::spawn(run_worker(
                    index,
                    Arc::clone(&worker),
                    Arc::clone(&receiver),
                    rng,
                    config.seed,
                ))
            })
            .collect();

        debug!(
            num_workers = config.num_workers,
            queue_capacity = config.queue_capacity,
            "Simulation worker pool started"
        );

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            handles: Mutex::new(handles),
            timeout: config.simulation_timeout,
            num_workers: config.num_workers,
        })
    }

    /// Pool running `RandomRollout` with the configured depth.
    pub fn random_rollout(config: &WorkerConfig) -> Result<Self, EngineError> {
        Self::new(RandomRollout::new(config.max_rollout_depth), config)
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    pub fn is_shut_down(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_none()
    }

    /// Close the job queue and wait for every worker to finish.
    ///
    /// Jobs already queued are still run. Later dispatches fail with
    /// `WorkerUnavailable`.
    pub async fn shutdown(&self) {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let handles = std::mem::take(&mut *self.handles.lock().unwrap_or_else(|e| e.into_inner()));
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Simulation worker task ended abnormally: {}", e);
            }
        }
        debug!("Simulation worker pool stopped");
    }

    fn sender(&self) -> Result<mpsc::Sender<Job<S>>, SimulationError> {
        self.sender
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| SimulationError::WorkerUnavailable("worker pool is shut down".into()))
    }
}

async fn dispatch<S: SearchState>(
    sender: mpsc::Sender<Job<S>>,
    state: S,
) -> Result<f64, SimulationError> {
    let (reply, response) = oneshot::channel();
    sender
        .send(Job { state, reply })
        .await
        .map_err(|_| SimulationError::WorkerUnavailable("job queue closed".into()))?;
    response
        .await
        .map_err(|_| SimulationError::WorkerUnavailable("worker dropped the job".into()))?
}

#[async_trait]
impl<S: SearchState> SimulationDispatcher<S> for WorkerPool<S> {
    async fn simulate(&self, state: S) -> Result<f64, SimulationError> {
        let sender = self.sender()?;
        match tokio::time::timeout(self.timeout, dispatch(sender, state)).await {
            Ok(result) => result,
            Err(_) => Err(SimulationError::Timeout(self.timeout)),
        }
    }
}

async fn run_worker<S, W>(
    index: usize,
    worker: Arc<W>,
    receiver: SharedReceiver<S>,
    mut rng: ChaCha20Rng,
    seed: Option<u64>,
) where
    S: SearchState,
    W: SimulationWorker<S> + 'static,
{
    let mut panics = 0u64;

    loop {
        let job = receiver.lock().await.recv().await;
        let Some(Job { state, reply }) = job else {
            break;
        };

        // Caller already gave up (timeout or cancelled build)
        if reply.is_closed() {
            continue;
        }

        let policy = Arc::clone(&worker);
        let outcome = tokio::task::spawn_blocking(move || {
            let result = policy.simulate(&state, &mut rng);
            (result, rng)
        })
        .await;

        let result = match outcome {
            Ok((result, returned)) => {
                rng = returned;
                result
            }
            Err(e) => {
                warn!(worker = index, "Simulation panicked: {}", e);
                panics += 1;
                rng = worker_rng(seed, index);
                rng.set_stream(panics);
                Err(SimulationError::Failed(format!("worker {} panicked", index)))
            }
        };

        // Receiver may have timed out while the rollout ran
        let _ = reply.send(result);
    }

    debug!(worker = index, "Simulation worker exiting");
}

/// Runs simulations on the calling task with a private, seeded RNG.
pub struct InlineDispatcher<S: SearchState> {
    worker: Arc<dyn SimulationWorker<S>>,
    rng: Mutex<ChaCha20Rng>,
}

impl<S: SearchState> InlineDispatcher<S> {
    pub fn new<W>(worker: W, seed: u64) -> Self
    where
        W: SimulationWorker<S> + 'static,
    {
        Self {
            worker: Arc::new(worker),
            rng: Mutex::new(ChaCha20Rng::seed_from_u64(seed)),
        }
    }
}

#[async_trait]
impl<S: SearchState> SimulationDispatcher<S> for InlineDispatcher<S> {
    async fn simulate(&self, state: S) -> Result<f64, SimulationError> {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        self.worker.simulate(&state, &mut rng)
    }
}
