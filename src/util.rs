//! Self-play harness.
//!
//! The engine itself is single-threaded; only whole games run in parallel
//! here, each with its own agents and referee-side state.

use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::SmallRng;
use rand_core::SeedableRng;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{sleep, spawn};
use std::time::Duration;

use crate::board::{BoardState, BOARD_AREA};
use crate::maker::MoveMaker;
use crate::pool::ChipPool;

/// Plays one complete game, drawing chips referee-side. Returns the final
/// total score (Order wants it high, Chaos wants it low).
pub fn play_game(chaos: &mut MoveMaker, order: &mut MoveMaker, rng: &mut SmallRng) -> u32 {
    let mut board = BoardState::new();
    let mut pool = ChipPool::new();
    for _ in 0..BOARD_AREA {
        let colour = pool.draw(rng);
        pool = pool.remove(colour);

        let cm = chaos.suggest_chaos_move(colour);
        debug_assert_eq!(board.chip_at(cm.pos), 0, "chaos reply onto a chip");
        board.place(cm);
        chaos.register_chaos_move(cm);
        order.register_chaos_move(cm);

        let om = order.suggest_order_move();
        debug_assert!(board.is_legal_order_move(om), "illegal order reply");
        board.move_chip(om);
        chaos.register_order_move(om);
        order.register_order_move(om);
    }
    debug_assert!(board.is_full());
    board.total_score()
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct CompetitionReport {
    pub games: usize,
    pub mean_score: f64,
    pub min_score: u32,
    pub max_score: u32,
}

/// Runs independent games in parallel. The factories receive a per-game
/// seed so every game is reproducible from `base_seed`.
pub fn competition(
    games: usize,
    make_chaos: impl Fn(u64) -> MoveMaker + Sync,
    make_order: impl Fn(u64) -> MoveMaker + Sync,
    base_seed: u64,
) -> CompetitionReport {
    assert!(games > 0);
    let bar = ProgressBar::new(games as u64);
    bar.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>4}/{len:4} {msg}")
            .unwrap(),
    );
    bar.set_message("self-play");

    let scores: Vec<u32> = (0..games)
        .into_par_iter()
        .map(|game| {
            let seed = base_seed.wrapping_add(game as u64);
            let mut chaos = make_chaos(seed);
            let mut order = make_order(seed ^ 0x5157_3E0A_11C9_02D7);
            let mut rng =
                SmallRng::seed_from_u64(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1));
            let score = play_game(&mut chaos, &mut order, &mut rng);
            bar.inc(1);
            score
        })
        .collect();
    bar.finish();

    CompetitionReport {
        games,
        mean_score: scores.iter().map(|&s| f64::from(s)).sum::<f64>() / games as f64,
        min_score: scores.iter().copied().min().unwrap(),
        max_score: scores.iter().copied().max().unwrap(),
    }
}

/// A flag that flips after the duration; poll it from a search to turn the
/// rollout budget into a wall-clock budget.
pub fn timeout_signal(dur: Duration) -> Arc<AtomicBool> {
    let signal = Arc::new(AtomicBool::new(false));
    let signal2 = signal.clone();
    spawn(move || {
        sleep(dur);
        signal2.store(true, Ordering::Relaxed);
    });
    signal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_agents_finish_a_game() {
        let mut chaos = MoveMaker::random(1);
        let mut order = MoveMaker::random(2);
        let mut rng = SmallRng::seed_from_u64(3);
        let score = play_game(&mut chaos, &mut order, &mut rng);
        assert!(score <= 14 * 77);
    }

    #[test]
    fn games_are_reproducible_from_their_seeds() {
        let run = || {
            let mut chaos = MoveMaker::random(10);
            let mut order = MoveMaker::random(20);
            let mut rng = SmallRng::seed_from_u64(30);
            play_game(&mut chaos, &mut order, &mut rng)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn competition_aggregates_scores() {
        let report = competition(
            4,
            |seed| MoveMaker::random(seed),
            |seed| MoveMaker::random(seed),
            99,
        );
        assert_eq!(report.games, 4);
        assert!(report.min_score <= report.max_score);
        assert!(f64::from(report.min_score) <= report.mean_score);
        assert!(report.mean_score <= f64::from(report.max_score));
    }

    #[test]
    fn timeout_signal_eventually_fires() {
        let signal = timeout_signal(Duration::from_millis(10));
        assert!(!signal.load(Ordering::Relaxed));
        for _ in 0..200 {
            if signal.load(Ordering::Relaxed) {
                return;
            }
            sleep(Duration::from_millis(5));
        }
        panic!("timeout signal never fired");
    }
}
