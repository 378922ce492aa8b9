use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::SmallRng;
use rand_core::SeedableRng;

use entropy::board::BoardState;
use entropy::mcts::rollout::smart_rollout_order;
use entropy::mcts::{SearchConfig, SearchEnv};
use entropy::pool::ChipPool;

fn rollout(c: &mut Criterion) {
    let board = BoardState::new();
    let pool = ChipPool::new();
    c.bench_function("smart_rollout", |b| {
        let mut rng = SmallRng::seed_from_u64(0xC0FFEE);
        b.iter(|| smart_rollout_order(&board, &pool, &mut rng));
    });
}

fn ponder(c: &mut Criterion) {
    let mut group = c.benchmark_group("ponder");
    group.sample_size(10);
    for n in [250, 500, 1000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut env = SearchEnv::new(SearchConfig::new().rollouts(n).seed(0xFACADE));
                let root = env.insert_order_root(BoardState::new(), ChipPool::new());
                env.tree_search_order(root);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, rollout, ponder);
criterion_main!(benches);
