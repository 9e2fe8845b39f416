//! Tree engine benchmarks.
//!
//! Run with: `cargo bench -p dmcts`
//!
//! These benchmarks measure:
//! - Full builds with varying iteration counts (inline dispatch)
//! - Pipelined builds through the worker pool at different in-flight bounds
//! - Raw tree operations (selection, backpropagation)
//! - The init -> build -> top_action -> continue_from loop

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dmcts::{
    Budget, InlineDispatcher, RandomRollout, SearchConfig, SearchTree, SimulationDispatcher,
    TreeEngine, WorkerConfig, WorkerPool,
};
use games_knapsack::{Item, Knapsack};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::sync::Arc;
use tokio::runtime::Runtime;

fn problem(n: usize, seed: u64) -> Knapsack {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let items = (0..n)
        .map(|_| Item::new(rng.gen_range(1..100), rng.gen_range(1..30)))
        .collect::<Vec<_>>();
    let capacity = items.iter().map(|i| i.weight).sum::<u32>() / 3;
    Knapsack::new(items, capacity)
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap()
}

fn inline_engine(config: SearchConfig) -> TreeEngine<Knapsack> {
    let dispatcher: Arc<dyn SimulationDispatcher<Knapsack>> =
        Arc::new(InlineDispatcher::<Knapsack>::new(RandomRollout::new(200), 42));
    TreeEngine::new(config, dispatcher).unwrap()
}

// =============================================================================
// Build Benchmarks
// =============================================================================

fn bench_build_iterations(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("build_iterations");

    for iterations in [100u64, 500, 2000] {
        group.throughput(Throughput::Elements(iterations));
        group.bench_with_input(
            BenchmarkId::new("knapsack20_inline", iterations),
            &iterations,
            |b, &iterations| {
                let config = SearchConfig::default().with_max_in_flight(1);
                b.iter(|| {
                    let mut engine = inline_engine(config.clone());
                    engine.init(problem(20, 7)).unwrap();
                    black_box(rt.block_on(engine.build(Budget::iterations(iterations))).unwrap())
                });
            },
        );
    }

    group.finish();
}

fn bench_pool_in_flight(c: &mut Criterion) {
    let rt = runtime();
    let pool = rt.block_on(async {
        let config = WorkerConfig::default().with_seed(42);
        Arc::new(WorkerPool::<Knapsack>::random_rollout(&config).unwrap())
    });
    let mut group = c.benchmark_group("pool_in_flight");
    group.throughput(Throughput::Elements(1000));

    for in_flight in [1usize, 4, 16, 64] {
        group.bench_with_input(
            BenchmarkId::new("knapsack40", in_flight),
            &in_flight,
            |b, &in_flight| {
                let config = SearchConfig::default().with_max_in_flight(in_flight);
                b.iter(|| {
                    let dispatcher: Arc<dyn SimulationDispatcher<Knapsack>> = pool.clone();
                    let mut engine = TreeEngine::new(config.clone(), dispatcher).unwrap();
                    engine.init(problem(40, 11)).unwrap();
                    black_box(rt.block_on(engine.build(Budget::iterations(1000))).unwrap())
                });
            },
        );
    }

    group.finish();
    rt.block_on(pool.shutdown());
}

// =============================================================================
// Tree Operation Benchmarks
// =============================================================================

fn bench_tree_operations(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("tree_operations");

    // Pre-build a tree to benchmark operations on
    let mut engine = inline_engine(SearchConfig::default().with_max_in_flight(1));
    engine.init(problem(20, 3)).unwrap();
    rt.block_on(engine.build(Budget::iterations(5000))).unwrap();
    let tree: &SearchTree<Knapsack> = engine.tree().unwrap();
    let c_uct = std::f64::consts::SQRT_2;

    group.bench_function("select", |b| b.iter(|| black_box(tree.select(c_uct))));

    group.bench_function("top_action", |b| b.iter(|| black_box(tree.top_action())));

    group.bench_function("stats", |b| b.iter(|| black_box(tree.stats())));

    group.finish();

    let mut group = c.benchmark_group("tree_backpropagate");
    group.bench_function("deepest_leaf", |b| {
        let mut tree = SearchTree::new(problem(20, 3));
        let mut leaf = tree.root();
        while let Ok(Some(child)) = tree.expand(leaf) {
            leaf = child;
        }
        b.iter(|| black_box(tree.backpropagate(leaf, 1.0)));
    });
    group.finish();
}

// =============================================================================
// Decision Loop Benchmark
// =============================================================================

fn bench_decision_loop(c: &mut Criterion) {
    let rt = runtime();
    let mut group = c.benchmark_group("decision_loop");
    group.sample_size(20);

    group.bench_function("knapsack20_play_out", |b| {
        b.iter(|| {
            let mut engine = inline_engine(SearchConfig::default().with_max_in_flight(1));
            engine.init(problem(20, 5)).unwrap();
            rt.block_on(async {
                loop {
                    engine.build(Budget::iterations(200)).await.unwrap();
                    match engine.top_action().unwrap() {
                        Some(top) => engine.continue_from(top.id).unwrap(),
                        None => break,
                    }
                }
            });
            black_box(engine.stats())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_build_iterations,
    bench_pool_in_flight,
    bench_tree_operations,
    bench_decision_loop,
);
criterion_main!(benches);
