use std::io;
use std::time::Instant;

use clap::{Parser, Subcommand};
use rand::rngs::SmallRng;
use rand_core::SeedableRng;

use entropy::board::BoardState;
use entropy::maker::MoveMaker;
use entropy::mcts::rollout::smart_rollout_order;
use entropy::mcts::{SearchConfig, SearchEnv};
use entropy::pool::ChipPool;
use entropy::referee::run_console_game;
use entropy::tables::score_tables;
use entropy::util;

#[derive(Parser)]
#[command(name = "entropy", about = "MCTS engine for Entropy (Order and Chaos)")]
struct Cli {
    /// Search budget per move.
    #[arg(long)]
    rollouts: Option<u32>,

    /// Search RNG seed; drawn from entropy when omitted.
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Time table construction, the rollout policy, and one full ponder.
    Benchmark,
    /// Self-play games between two agents; emits a JSON report on stdout.
    Competition {
        #[arg(long, default_value_t = 10)]
        games: usize,

        /// Per-move budget for the searching agents.
        #[arg(long, default_value_t = 2_000)]
        rollouts: u32,

        /// Seat the uniform-random agent as Order instead of a second
        /// searcher.
        #[arg(long)]
        random_order: bool,
    },
}

fn main() -> io::Result<()> {
    color_backtrace::install();
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        None => {
            let mut maker = MoveMaker::mcts(config_from(cli.rollouts, cli.seed));
            run_console_game(&mut maker, io::stdin().lock(), io::stdout().lock())
        }
        Some(Command::Benchmark) => {
            benchmark(config_from(cli.rollouts, cli.seed));
            Ok(())
        }
        Some(Command::Competition {
            games,
            rollouts,
            random_order,
        }) => {
            competition(games, rollouts, cli.seed.unwrap_or(0xC0DE), random_order);
            Ok(())
        }
    }
}

fn config_from(rollouts: Option<u32>, seed: Option<u64>) -> SearchConfig {
    let mut config = SearchConfig::new();
    if let Some(rollouts) = rollouts {
        config = config.rollouts(rollouts);
    }
    if let Some(seed) = seed {
        config = config.seed(seed);
    }
    config
}

fn benchmark(config: SearchConfig) {
    let start = Instant::now();
    score_tables();
    eprintln!("score tables built in {:.1?}", start.elapsed());

    let board = BoardState::new();
    let pool = ChipPool::new();
    let mut rng = SmallRng::seed_from_u64(config.seed.unwrap_or(1));

    const ROLLOUTS: u32 = 20_000;
    let start = Instant::now();
    let mut total = 0u64;
    for _ in 0..ROLLOUTS {
        total += u64::from(smart_rollout_order(&board, &pool, &mut rng));
    }
    let elapsed = start.elapsed();
    eprintln!(
        "{ROLLOUTS} rollouts in {:.1?} ({:.0}/s), mean terminal score {:.1}",
        elapsed,
        f64::from(ROLLOUTS) / elapsed.as_secs_f64(),
        total as f64 / f64::from(ROLLOUTS)
    );

    let iterations = config.rollouts;
    let mut env = SearchEnv::new(config);
    let root = env.insert_order_root(board, pool);
    let start = Instant::now();
    env.tree_search_order(root);
    eprintln!(
        "ponder: {iterations} iterations in {:.1?}; cache hits {} order / {} chaos",
        start.elapsed(),
        env.order_cache.hits,
        env.chaos_cache.hits
    );
}

fn competition(games: usize, rollouts: u32, seed: u64, random_order: bool) {
    let chaos_config = SearchConfig::new().rollouts(rollouts);
    let order_config = chaos_config.clone();
    let report = util::competition(
        games,
        move |game_seed| MoveMaker::mcts(chaos_config.clone().seed(game_seed)),
        move |game_seed| {
            if random_order {
                MoveMaker::random(game_seed)
            } else {
                MoveMaker::mcts(order_config.clone().seed(game_seed))
            }
        },
        seed,
    );
    eprintln!(
        "{} games: mean {:.1}, min {}, max {}",
        report.games, report.mean_score, report.min_score, report.max_score
    );
    println!("{}", serde_json::to_string_pretty(&report).expect("report serializes"));
}
