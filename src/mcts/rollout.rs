//! Greedy simulation policy for both roles.
//!
//! Order takes a uniformly random move among those with the best immediate
//! score change (pass included at zero); Chaos draws a chip and drops it on
//! a uniformly random cell among those with the smallest change. Playing
//! both sides greedily concentrates the terminal-score distribution around
//! straightforward play, which reads much better than uniform noise.

use rand::rngs::SmallRng;
use rand::Rng;

use crate::board::{BoardState, Colour, MinimalBoardState, OrderMove, Position, BOARD_AREA};
use crate::pool::ChipPool;

/// A line holds at most 10 slides (two boundary chips sliding into a
/// five-cell empty segment), and there are 14 lines.
pub const MAX_ORDER_MOVES: usize = 140;

/// Plays a state with Order to move out to a full board; returns the final
/// total score. The caller's state is untouched.
pub fn smart_rollout_order(board: &BoardState, pool: &ChipPool, rng: &mut SmallRng) -> u32 {
    debug_assert_eq!(pool.total(), board.open_cells());
    let mut minimal = board.minimal().clone();
    let mut chips = pool.as_multiset();
    let mut score = board.total_score();
    play_out(
        &mut minimal,
        &mut score,
        board.open_cells() as usize,
        &mut chips,
        rng,
    );
    score
}

/// Same, from a state with Chaos about to draw.
pub fn smart_rollout_chaos(board: &BoardState, pool: &ChipPool, rng: &mut SmallRng) -> u32 {
    let open = board.open_cells() as usize;
    if open == 0 {
        return board.total_score();
    }
    debug_assert_eq!(pool.total(), board.open_cells());
    let mut minimal = board.minimal().clone();
    let mut chips = pool.as_multiset();
    let mut score = board.total_score();
    smart_chaos_move(&mut minimal, &mut score, open, &mut chips, rng);
    play_out(&mut minimal, &mut score, open - 1, &mut chips, rng);
    score
}

fn play_out(
    minimal: &mut MinimalBoardState,
    score: &mut u32,
    mut open: usize,
    chips: &mut [Colour; BOARD_AREA],
    rng: &mut SmallRng,
) {
    while open > 0 {
        smart_order_move(minimal, score, rng);
        smart_chaos_move(minimal, score, open, chips, rng);
        open -= 1;
    }
}

fn smart_order_move(minimal: &mut MinimalBoardState, score: &mut u32, rng: &mut SmallRng) {
    let mut moves = [OrderMove::Pass; MAX_ORDER_MOVES + 1];
    let mut n = 1;
    let mut best = 0i32;
    minimal.for_each_order_move_with_delta(|from, to, delta| {
        if delta >= best {
            if delta > best {
                best = delta;
                n = 0;
            }
            moves[n] = OrderMove::Slide { from, to };
            n += 1;
        }
    });
    if let OrderMove::Slide { from, to } = moves[rng.gen_range(0..n)] {
        minimal.move_chip(from, to);
        *score = (*score as i32 + best) as u32;
    }
}

fn smart_chaos_move(
    minimal: &mut MinimalBoardState,
    score: &mut u32,
    open: usize,
    chips: &mut [Colour; BOARD_AREA],
    rng: &mut SmallRng,
) {
    debug_assert!(open > 0);
    let drawn = rng.gen_range(0..open);
    let colour = chips[drawn];
    chips[drawn] = chips[open - 1];

    let mut cells = [Position::from_index(0); BOARD_AREA];
    let mut n = 0;
    let mut best = i32::MAX;
    minimal.for_each_chaos_placement_with_delta(colour, |p, delta| {
        if delta == best {
            cells[n] = p;
            n += 1;
        } else if delta < best {
            cells[0] = p;
            best = delta;
            n = 1;
        }
    });
    minimal.place_chip(cells[rng.gen_range(0..n)], colour);
    *score = (*score as i32 + best) as u32;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::{ChaosMove, BOARD_SIZE};
    use crate::tables::score_tables;
    use rand_core::SeedableRng;

    fn recomputed_total(minimal: &MinimalBoardState) -> u32 {
        let tables = score_tables();
        (0..BOARD_SIZE)
            .map(|i| tables.line_score(minimal.row(i)) + tables.line_score(minimal.column(i)))
            .sum()
    }

    #[test]
    fn playout_fills_the_board_and_tracks_the_score() {
        let board = BoardState::new();
        let pool = ChipPool::new();
        let mut rng = SmallRng::seed_from_u64(17);

        let mut minimal = board.minimal().clone();
        let mut chips = pool.as_multiset();
        let mut score = board.total_score();
        play_out(&mut minimal, &mut score, BOARD_AREA, &mut chips, &mut rng);

        for i in 0..BOARD_AREA {
            assert_ne!(minimal.chip_at(crate::board::Position::from_index(i)), 0);
        }
        assert_eq!(score, recomputed_total(&minimal));
    }

    #[test]
    fn rollouts_are_deterministic_in_the_seed() {
        let board = BoardState::new();
        let pool = ChipPool::new();
        let mut a = SmallRng::seed_from_u64(99);
        let mut b = SmallRng::seed_from_u64(99);
        for _ in 0..5 {
            assert_eq!(
                smart_rollout_order(&board, &pool, &mut a),
                smart_rollout_order(&board, &pool, &mut b)
            );
        }
    }

    #[test]
    fn mid_game_rollouts_terminate_from_both_roles() {
        let mut board = BoardState::new();
        let mut pool = ChipPool::new();
        let mut rng = SmallRng::seed_from_u64(4);
        for i in 0..9 {
            let colour = pool.draw(&mut rng);
            pool = pool.remove(colour);
            board.place(ChaosMove {
                pos: crate::board::Position::new(i / 3, 2 * (i % 3)),
                colour,
            });
        }
        let from_order = smart_rollout_order(&board, &pool, &mut rng);
        let from_chaos = smart_rollout_chaos(&board, &pool, &mut rng);
        assert!(from_order >= board.total_score());
        assert!(from_chaos >= board.total_score());
    }

    #[test]
    fn terminal_chaos_rollout_returns_the_board_total() {
        let mut board = BoardState::new();
        let mut pool = ChipPool::new();
        for r in 0..BOARD_SIZE {
            let colour = (r + 1) as u8;
            for c in 0..BOARD_SIZE {
                board.place(ChaosMove {
                    pos: crate::board::Position::new(r, c),
                    colour,
                });
                pool = pool.remove(colour);
            }
        }
        assert!(board.is_full());
        // Seven uniform rows of 77, columns score nothing.
        assert_eq!(board.total_score(), 7 * 77);
        let mut rng = SmallRng::seed_from_u64(1);
        assert_eq!(
            smart_rollout_chaos(&board, &pool, &mut rng),
            board.total_score()
        );
    }

    #[test]
    fn order_step_never_lowers_the_score() {
        let mut rng = SmallRng::seed_from_u64(23);
        let mut board = BoardState::new();
        let mut pool = ChipPool::new();
        for _ in 0..12 {
            let colour = pool.draw(&mut rng);
            pool = pool.remove(colour);
            let mut target = None;
            board.minimal().for_each_chaos_placement_with_delta(colour, |p, _| {
                target.get_or_insert(p);
            });
            board.place(ChaosMove { pos: target.unwrap(), colour });
        }
        let mut minimal = board.minimal().clone();
        let mut score = board.total_score();
        smart_order_move(&mut minimal, &mut score, &mut rng);
        assert!(score >= board.total_score());
        assert_eq!(score, recomputed_total(&minimal));
    }

    #[test]
    fn rollout_score_stays_within_the_theoretical_range() {
        let board = BoardState::new();
        let pool = ChipPool::new();
        let mut rng = SmallRng::seed_from_u64(7);
        for _ in 0..10 {
            let score = smart_rollout_order(&board, &pool, &mut rng);
            // 14 lines of at most 77 each.
            assert!(score <= 14 * 77);
        }
    }
}
