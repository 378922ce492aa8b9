//! Board representation with incremental palindrome scoring.
//!
//! `MinimalBoardState` keeps the cell array mirrored into one packed string
//! per row and per column, which makes every score query a table lookup.
//! `BoardState` wraps it with cached per-line scores, the running total,
//! and the incrementally maintained board hash.

use serde::Serialize;
use std::fmt;

use crate::tables::score_tables;
use crate::zobrist::BoardHash;

pub const BOARD_SIZE: usize = 7;
pub const BOARD_AREA: usize = BOARD_SIZE * BOARD_SIZE;
pub const NUM_COLOURS: usize = 7;
pub const CHIPS_PER_COLOUR: usize = BOARD_AREA / NUM_COLOURS;

/// Cell value: 0 is empty, 1..=7 are chip colours.
pub type Colour = u8;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct Position(u8);

impl Position {
    #[inline]
    pub fn new(row: usize, column: usize) -> Self {
        debug_assert!(row < BOARD_SIZE && column < BOARD_SIZE);
        Position((row * BOARD_SIZE + column) as u8)
    }

    #[inline]
    pub fn from_index(index: usize) -> Self {
        debug_assert!(index < BOARD_AREA);
        Position(index as u8)
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn row(self) -> usize {
        self.0 as usize / BOARD_SIZE
    }

    #[inline]
    pub fn column(self) -> usize {
        self.0 as usize % BOARD_SIZE
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct ChaosMove {
    pub pos: Position,
    pub colour: Colour,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub enum OrderMove {
    Pass,
    Slide { from: Position, to: Position },
}

impl OrderMove {
    #[inline]
    pub fn is_pass(self) -> bool {
        matches!(self, OrderMove::Pass)
    }
}

////////////////////////////////////////////////////////////////////////////////

const CELL_BITS: usize = 3;
const CELL_MASK: u32 = (1 << CELL_BITS) - 1;

/// One row or column packed into 3 bits per cell.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct LineString(u32);

impl LineString {
    #[inline]
    pub fn from_raw(raw: u32) -> Self {
        debug_assert!((raw as usize) < crate::tables::LINE_ENCODINGS);
        LineString(raw)
    }

    pub fn from_cells(cells: &[Colour]) -> Self {
        debug_assert!(cells.len() <= BOARD_SIZE);
        let mut s = LineString::default();
        for (i, &c) in cells.iter().enumerate() {
            if c != 0 {
                s = s.with(i, c);
            }
        }
        s
    }

    #[inline]
    pub fn get(self, i: usize) -> Colour {
        ((self.0 >> (CELL_BITS * i)) & CELL_MASK) as Colour
    }

    /// Writes a colour into an empty cell.
    #[inline]
    pub fn with(self, i: usize, colour: Colour) -> Self {
        debug_assert_eq!(self.get(i), 0);
        LineString(self.0 | u32::from(colour) << (CELL_BITS * i))
    }

    #[inline]
    pub fn without(self, i: usize) -> Self {
        LineString(self.0 & !(CELL_MASK << (CELL_BITS * i)))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MinimalBoardState {
    cells: [Colour; BOARD_AREA],
    rows: [LineString; BOARD_SIZE],
    cols: [LineString; BOARD_SIZE],
}

impl Default for MinimalBoardState {
    fn default() -> Self {
        Self::new()
    }
}

impl MinimalBoardState {
    pub fn new() -> Self {
        MinimalBoardState {
            cells: [0; BOARD_AREA],
            rows: [LineString::default(); BOARD_SIZE],
            cols: [LineString::default(); BOARD_SIZE],
        }
    }

    #[inline]
    pub fn chip_at(&self, p: Position) -> Colour {
        self.cells[p.index()]
    }

    #[inline]
    pub fn row(&self, r: usize) -> LineString {
        self.rows[r]
    }

    #[inline]
    pub fn column(&self, c: usize) -> LineString {
        self.cols[c]
    }

    pub fn place_chip(&mut self, p: Position, colour: Colour) {
        debug_assert!((1..=NUM_COLOURS as Colour).contains(&colour));
        debug_assert_eq!(self.cells[p.index()], 0);
        self.cells[p.index()] = colour;
        self.rows[p.row()] = self.rows[p.row()].with(p.column(), colour);
        self.cols[p.column()] = self.cols[p.column()].with(p.row(), colour);
    }

    pub(crate) fn remove_chip(&mut self, p: Position) -> Colour {
        let colour = self.cells[p.index()];
        debug_assert_ne!(colour, 0);
        self.cells[p.index()] = 0;
        self.rows[p.row()] = self.rows[p.row()].without(p.column());
        self.cols[p.column()] = self.cols[p.column()].without(p.row());
        colour
    }

    pub fn move_chip(&mut self, from: Position, to: Position) {
        let colour = self.remove_chip(from);
        self.place_chip(to, colour);
    }

    /// Enumerates empty cells in index order.
    pub fn for_each_empty(&self, mut f: impl FnMut(Position)) {
        for i in 0..BOARD_AREA {
            if self.cells[i] == 0 {
                f(Position::from_index(i));
            }
        }
    }

    /// Emits every legal slide exactly once. Two sweeps over the grid, each
    /// tracking the most recent chip seen per row and per column; everything
    /// between that chip and a later empty cell of the same line is empty,
    /// or the chip would have been replaced as most recent.
    pub fn for_each_order_move(&self, mut f: impl FnMut(Position, Position)) {
        let mut row_chip = [usize::MAX; BOARD_SIZE];
        let mut col_chip = [usize::MAX; BOARD_SIZE];
        for i in 0..BOARD_AREA {
            let (r, c) = (i / BOARD_SIZE, i % BOARD_SIZE);
            if self.cells[i] != 0 {
                row_chip[r] = i;
                col_chip[c] = i;
            } else {
                if row_chip[r] != usize::MAX {
                    f(Position::from_index(row_chip[r]), Position::from_index(i));
                }
                if col_chip[c] != usize::MAX {
                    f(Position::from_index(col_chip[c]), Position::from_index(i));
                }
            }
        }

        row_chip = [usize::MAX; BOARD_SIZE];
        col_chip = [usize::MAX; BOARD_SIZE];
        for i in (0..BOARD_AREA).rev() {
            let (r, c) = (i / BOARD_SIZE, i % BOARD_SIZE);
            if self.cells[i] != 0 {
                row_chip[r] = i;
                col_chip[c] = i;
            } else {
                if row_chip[r] != usize::MAX {
                    f(Position::from_index(row_chip[r]), Position::from_index(i));
                }
                if col_chip[c] != usize::MAX {
                    f(Position::from_index(col_chip[c]), Position::from_index(i));
                }
            }
        }
    }

    /// Slide enumeration plus the signed total-score change of each slide.
    pub fn for_each_order_move_with_delta(&self, mut f: impl FnMut(Position, Position, i32)) {
        let tables = score_tables();
        let row_base: [i32; BOARD_SIZE] =
            std::array::from_fn(|r| tables.line_score(self.rows[r]) as i32);
        let col_base: [i32; BOARD_SIZE] =
            std::array::from_fn(|c| tables.line_score(self.cols[c]) as i32);

        self.for_each_order_move(|from, to| {
            let colour = self.cells[from.index()];
            let (fr, fc) = (from.row(), from.column());
            let (tr, tc) = (to.row(), to.column());
            let delta = if fr == tr {
                let row = self.rows[fr].without(fc).with(tc, colour);
                (tables.line_score(row) as i32 - row_base[fr])
                    + (tables.line_score(self.cols[fc].without(fr)) as i32 - col_base[fc])
                    + (tables.line_score(self.cols[tc].with(tr, colour)) as i32 - col_base[tc])
            } else {
                let col = self.cols[fc].without(fr).with(tr, colour);
                (tables.line_score(col) as i32 - col_base[fc])
                    + (tables.line_score(self.rows[fr].without(fc)) as i32 - row_base[fr])
                    + (tables.line_score(self.rows[tr].with(tc, colour)) as i32 - row_base[tr])
            };
            f(from, to, delta);
        });
    }

    /// For every empty cell, the signed total-score change of placing
    /// `colour` there.
    pub fn for_each_chaos_placement_with_delta(
        &self,
        colour: Colour,
        mut f: impl FnMut(Position, i32),
    ) {
        let tables = score_tables();
        let row_base: [i32; BOARD_SIZE] =
            std::array::from_fn(|r| tables.line_score(self.rows[r]) as i32);
        let col_base: [i32; BOARD_SIZE] =
            std::array::from_fn(|c| tables.line_score(self.cols[c]) as i32);

        for i in 0..BOARD_AREA {
            if self.cells[i] != 0 {
                continue;
            }
            let p = Position::from_index(i);
            let (r, c) = (p.row(), p.column());
            let delta = (tables.line_score(self.rows[r].with(c, colour)) as i32 - row_base[r])
                + (tables.line_score(self.cols[c].with(r, colour)) as i32 - col_base[c]);
            f(p, delta);
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, PartialEq, Debug)]
pub struct BoardState {
    minimal: MinimalBoardState,
    row_scores: [u32; BOARD_SIZE],
    col_scores: [u32; BOARD_SIZE],
    total_score: u32,
    hash: BoardHash,
}

impl Default for BoardState {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardState {
    pub fn new() -> Self {
        BoardState {
            minimal: MinimalBoardState::new(),
            row_scores: [0; BOARD_SIZE],
            col_scores: [0; BOARD_SIZE],
            total_score: 0,
            hash: BoardHash::new(),
        }
    }

    #[inline]
    pub fn minimal(&self) -> &MinimalBoardState {
        &self.minimal
    }

    #[inline]
    pub fn chip_at(&self, p: Position) -> Colour {
        self.minimal.chip_at(p)
    }

    #[inline]
    pub fn total_score(&self) -> u32 {
        self.total_score
    }

    #[inline]
    pub fn open_cells(&self) -> u32 {
        self.hash.open()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.open_cells() == 0
    }

    #[inline]
    pub fn hash(&self) -> BoardHash {
        self.hash
    }

    #[inline]
    pub fn row_score(&self, r: usize) -> u32 {
        self.row_scores[r]
    }

    #[inline]
    pub fn column_score(&self, c: usize) -> u32 {
        self.col_scores[c]
    }

    pub fn place(&mut self, m: ChaosMove) {
        self.minimal.place_chip(m.pos, m.colour);
        self.refresh_row(m.pos.row());
        self.refresh_column(m.pos.column());
        self.hash.toggle(m.colour, m.pos);
        self.hash.decrement_open();
    }

    pub fn move_chip(&mut self, m: OrderMove) {
        let OrderMove::Slide { from, to } = m else {
            return;
        };
        debug_assert!(self.is_legal_order_move(m));
        let colour = self.minimal.chip_at(from);
        self.minimal.move_chip(from, to);
        self.refresh_row(from.row());
        self.refresh_column(from.column());
        if to.row() != from.row() {
            self.refresh_row(to.row());
        }
        if to.column() != from.column() {
            self.refresh_column(to.column());
        }
        self.hash.toggle(colour, from);
        self.hash.toggle(colour, to);
    }

    pub(crate) fn remove_chip(&mut self, p: Position) -> Colour {
        let colour = self.minimal.remove_chip(p);
        self.refresh_row(p.row());
        self.refresh_column(p.column());
        self.hash.toggle(colour, p);
        self.hash.increment_open();
        colour
    }

    /// Hash of the state `place` would produce, without touching the board.
    pub fn hash_after_place(&self, m: ChaosMove) -> BoardHash {
        let mut h = self.hash;
        h.toggle(m.colour, m.pos);
        h.decrement_open();
        h
    }

    /// Hash of the state `move_chip` would produce, without touching the board.
    pub fn hash_after_move(&self, m: OrderMove) -> BoardHash {
        let mut h = self.hash;
        if let OrderMove::Slide { from, to } = m {
            let colour = self.minimal.chip_at(from);
            h.toggle(colour, from);
            h.toggle(colour, to);
        }
        h
    }

    pub fn is_legal_order_move(&self, m: OrderMove) -> bool {
        let OrderMove::Slide { from, to } = m else {
            return true;
        };
        if from == to
            || self.minimal.chip_at(from) == 0
            || self.minimal.chip_at(to) != 0
            || (from.row() != to.row() && from.column() != to.column())
        {
            return false;
        }
        let step = if from.row() == to.row() { 1 } else { BOARD_SIZE };
        let (lo, hi) = if from.index() < to.index() {
            (from.index(), to.index())
        } else {
            (to.index(), from.index())
        };
        ((lo + step..hi).step_by(step)).all(|i| self.minimal.cells[i] == 0)
    }

    fn refresh_row(&mut self, r: usize) {
        let new = score_tables().line_score(self.minimal.rows[r]);
        self.total_score -= self.row_scores[r];
        self.total_score += new;
        self.row_scores[r] = new;
    }

    fn refresh_column(&mut self, c: usize) {
        let new = score_tables().line_score(self.minimal.cols[c]);
        self.total_score -= self.col_scores[c];
        self.total_score += new;
        self.col_scores[c] = new;
    }
}

impl fmt::Display for BoardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, " ")?;
        for c in 0..BOARD_SIZE {
            write!(f, " {}", (b'a' + c as u8) as char)?;
        }
        writeln!(f)?;
        for r in 0..BOARD_SIZE {
            write!(f, "{}", (b'A' + r as u8) as char)?;
            for c in 0..BOARD_SIZE {
                match self.minimal.chip_at(Position::new(r, c)) {
                    0 => write!(f, " .")?,
                    chip => write!(f, " {chip}")?,
                }
            }
            writeln!(f)?;
        }
        write!(f, "score: {}", self.total_score)
    }
}
