//! The multiset of chips Chaos has not yet drawn.
//!
//! Stored as cumulative counts per colour, which makes a fair draw one
//! uniform integer plus an upper bound on the prefix array.

use rand::rngs::SmallRng;
use rand::Rng;

use crate::board::{Colour, BOARD_AREA, CHIPS_PER_COLOUR, NUM_COLOURS};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ChipPool {
    prefix: [u8; NUM_COLOURS],
}

impl Default for ChipPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ChipPool {
    pub fn new() -> Self {
        ChipPool {
            prefix: std::array::from_fn(|i| ((i + 1) * CHIPS_PER_COLOUR) as u8),
        }
    }

    #[inline]
    pub fn total(&self) -> u32 {
        u32::from(self.prefix[NUM_COLOURS - 1])
    }

    #[inline]
    pub fn chips_left(&self, colour: Colour) -> u32 {
        let i = colour as usize - 1;
        let below = if i == 0 { 0 } else { self.prefix[i - 1] };
        u32::from(self.prefix[i] - below)
    }

    /// A new pool with one fewer chip of the colour.
    pub fn remove(&self, colour: Colour) -> ChipPool {
        assert!(
            self.chips_left(colour) > 0,
            "no chips of colour {colour} left in the pool"
        );
        let mut next = *self;
        for entry in &mut next.prefix[colour as usize - 1..] {
            *entry -= 1;
        }
        next
    }

    /// Fair draw over the remaining multiset; the pool is unchanged.
    pub fn draw(&self, rng: &mut SmallRng) -> Colour {
        let total = self.total();
        assert!(total > 0, "drawing from an empty chip pool");
        let r = rng.gen_range(0..total) as u8;
        let bucket = self.prefix.partition_point(|&n| n <= r);
        (bucket + 1) as Colour
    }

    /// The remaining chips as a dense array; only the first `total()`
    /// entries are meaningful.
    pub fn as_multiset(&self) -> [Colour; BOARD_AREA] {
        let mut chips = [0; BOARD_AREA];
        let mut n = 0;
        for colour in 1..=NUM_COLOURS as Colour {
            for _ in 0..self.chips_left(colour) {
                chips[n] = colour;
                n += 1;
            }
        }
        chips
    }
}
