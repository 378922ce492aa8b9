//! Decision engine for the board game Entropy (Order and Chaos).
//!
//! Chaos drops randomly drawn chips onto a 7×7 board; Order slides chips to
//! build palindromic runs. The engine searches both roles with a
//! chance-aware MCTS over incrementally scored boards.

pub mod board;
pub mod maker;
pub mod mcts;
pub mod notation;
pub mod pool;
pub mod referee;
pub mod tables;
pub mod util;
pub mod zobrist;
