//! End-to-end searches over the knapsack domain with a real worker pool.

use dmcts::{
    spawn_tree, Budget, EngineError, SearchConfig, SearchState, SimulationDispatcher, TreeEngine,
    WorkerConfig, WorkerPool,
};
use games_knapsack::{optimal_value, Item, Knapsack};
use std::sync::Arc;
use std::time::Duration;

fn classic() -> Knapsack {
    Knapsack::new(
        vec![Item::new(60, 10), Item::new(100, 20), Item::new(120, 30)],
        50,
    )
}

fn mixed() -> Knapsack {
    let items = vec![
        Item::new(10, 5),
        Item::new(40, 4),
        Item::new(30, 6),
        Item::new(50, 3),
        Item::new(35, 7),
        Item::new(25, 2),
        Item::new(5, 9),
        Item::new(45, 8),
    ];
    Knapsack::new(items, 20)
}

fn pool() -> Arc<WorkerPool<Knapsack>> {
    let config = WorkerConfig::for_testing().with_num_workers(4);
    Arc::new(WorkerPool::random_rollout(&config).unwrap())
}

fn engine(pool: &Arc<WorkerPool<Knapsack>>, config: SearchConfig) -> TreeEngine<Knapsack> {
    let dispatcher: Arc<dyn SimulationDispatcher<Knapsack>> = pool.clone();
    TreeEngine::new(config, dispatcher).unwrap()
}

/// Alternate build and continue_from until the root is terminal.
async fn play_out(engine: &mut TreeEngine<Knapsack>, iterations: u64) -> Knapsack {
    loop {
        engine.build(Budget::iterations(iterations)).await.unwrap();
        match engine.top_action().unwrap() {
            Some(top) => engine.continue_from(top.id).unwrap(),
            None => break,
        }
    }
    engine.tree().unwrap().root_node().state.clone()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_finds_optimal_packing() {
    let pool = pool();
    let mut engine = engine(&pool, SearchConfig::default().with_max_in_flight(8));
    engine.init(classic()).unwrap();

    let packed = play_out(&mut engine, 2000).await;

    assert!(packed.is_terminal());
    assert_eq!(packed.value(), optimal_value(classic().items(), 50));
    assert_eq!(packed.packed_items(), vec![1, 2]);

    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_root_visits_match_completed_simulations() {
    let pool = pool();
    let mut engine = engine(&pool, SearchConfig::default());
    engine.init(mixed()).unwrap();

    let mut completed = 0;
    for _ in 0..3 {
        let report = engine.build(Budget::iterations(500)).await.unwrap();
        assert_eq!(report.issued, 500);
        assert_eq!(report.issued, report.completed + report.dropped());
        completed += report.completed;
    }

    let stats = engine.stats().unwrap();
    assert_eq!(stats.root_visits, completed);

    // No mean can exceed the best packing
    let best = optimal_value(mixed().items(), 20) as f64;
    for child in engine.root_children().unwrap() {
        assert!(child.mean_value >= 0.0 && child.mean_value <= best);
    }

    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_search_quality_on_mixed_items() {
    let pool = pool();
    let mut engine = engine(&pool, SearchConfig::default());
    engine.init(mixed()).unwrap();

    let packed = play_out(&mut engine, 1500).await;
    let best = optimal_value(mixed().items(), 20);

    assert!(packed.weight() <= packed.capacity());
    assert!(packed.value() <= best);
    assert!(
        packed.value() * 10 >= best * 7,
        "packed {} of optimal {}",
        packed.value(),
        best
    );

    pool.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_deadline_build_with_pool() {
    let pool = pool();
    let mut engine = engine(&pool, SearchConfig::default());
    engine.init(mixed()).unwrap();

    let report = engine
        .build(Budget::deadline(Duration::from_millis(200)))
        .await
        .unwrap();

    assert!(report.completed > 0);
    assert!(report.elapsed < Duration::from_secs(5));
    assert_eq!(engine.stats().unwrap().root_visits, report.completed);

    pool.shutdown().await;
}

#[tokio::test]
async fn test_shut_down_pool_drops_iterations() {
    let pool = pool();
    pool.shutdown().await;

    let mut engine = engine(&pool, SearchConfig::for_testing());
    engine.init(classic()).unwrap();

    let report = engine.build(Budget::iterations(3)).await.unwrap();

    assert_eq!(report.failed, 3);
    assert_eq!(report.completed, 0);
    assert_eq!(engine.stats().unwrap().root_visits, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_independent_tree_services_share_a_pool() {
    let pool = pool();
    let (first, first_task) = spawn_tree(engine(&pool, SearchConfig::default()));
    let (second, second_task) = spawn_tree(engine(&pool, SearchConfig::default()));

    first.init(classic()).await.unwrap();
    second.init(mixed()).await.unwrap();

    let (a, b) = tokio::join!(
        first.build(Budget::iterations(300)),
        second.build(Budget::iterations(300))
    );
    assert_eq!(a.unwrap().completed, 300);
    assert_eq!(b.unwrap().completed, 300);

    let top = first.top_action().await.unwrap().unwrap();
    first.continue_from(top.id).await.unwrap();
    assert!(matches!(
        second.continue_from(dmcts::NodeId(10_000)).await,
        Err(EngineError::UnknownNode(_))
    ));

    assert_eq!(first.stats().await.unwrap().unwrap().generation, 1);
    assert_eq!(second.stats().await.unwrap().unwrap().generation, 0);

    drop(first);
    drop(second);
    first_task.await.unwrap();
    second_task.await.unwrap();
    pool.shutdown().await;
}
