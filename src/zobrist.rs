//! Incremental board hashing.
//!
//! One 64-bit key per (colour, position) pair, generated once from a fixed
//! seed. A board's hash is the XOR of the keys of its occupied cells; the
//! open-cell count rides along so that states at different plies never
//! compare equal.

use rand::rngs::StdRng;
use rand::Rng;
use rand_core::SeedableRng;
use std::sync::OnceLock;

use crate::board::{Colour, Position, BOARD_AREA, NUM_COLOURS};

pub struct ZobristTable {
    keys: Box<[u64]>,
}

impl ZobristTable {
    fn new(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let keys = (0..NUM_COLOURS * BOARD_AREA)
            .map(|_| rng.gen::<u64>())
            .collect();
        ZobristTable { keys }
    }

    #[inline]
    fn key(&self, colour: Colour, pos: Position) -> u64 {
        debug_assert!((1..=NUM_COLOURS as Colour).contains(&colour));
        self.keys[(colour as usize - 1) * BOARD_AREA + pos.index()]
    }
}

pub struct LazyZobristTable {
    once: OnceLock<ZobristTable>,
    seed: u64,
}

impl LazyZobristTable {
    pub const fn new(seed: u64) -> Self {
        LazyZobristTable {
            once: OnceLock::new(),
            seed,
        }
    }

    #[inline(always)]
    fn get_or_init(&self) -> &ZobristTable {
        self.once.get_or_init(|| ZobristTable::new(self.seed))
    }

    #[inline(always)]
    pub fn key(&self, colour: Colour, pos: Position) -> u64 {
        self.get_or_init().key(colour, pos)
    }
}

static KEYS: LazyZobristTable = LazyZobristTable::new(0xD10F_6A7B_43C2_95E8);

/// Hash of a board position plus its open-cell count.
///
/// Two boards compare equal exactly when they carry the same chips on the
/// same cells and sit at the same ply.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BoardHash {
    hash: u64,
    open: u8,
}

impl BoardHash {
    pub fn new() -> Self {
        BoardHash {
            hash: 0,
            open: BOARD_AREA as u8,
        }
    }

    #[inline]
    pub fn toggle(&mut self, colour: Colour, pos: Position) {
        self.hash ^= KEYS.key(colour, pos);
    }

    #[inline]
    pub fn decrement_open(&mut self) {
        debug_assert!(self.open > 0);
        self.open -= 1;
    }

    #[inline]
    pub(crate) fn increment_open(&mut self) {
        debug_assert!((self.open as usize) < BOARD_AREA);
        self.open += 1;
    }

    #[inline]
    pub fn open(&self) -> u32 {
        u32::from(self.open)
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.hash
    }
}

impl Default for BoardHash {
    fn default() -> Self {
        Self::new()
    }
}
