//! Transposition cache: board hash to node handle.
//!
//! Entries are weak. The slab generation decides whether a probed handle is
//! still alive; dead entries are simply overwritten by the next insert.

use rustc_hash::FxHashMap;

use super::slab::Handle;
use crate::zobrist::BoardHash;

#[derive(Default, Debug)]
pub struct TranspositionTable {
    table: FxHashMap<BoardHash, Handle>,
    pub reads: usize,
    pub writes: usize,
    pub hits: usize,
}

impl TranspositionTable {
    pub fn clear(&mut self) {
        self.table.clear();
        self.reads = 0;
        self.writes = 0;
        self.hits = 0;
    }

    #[inline]
    pub fn probe(&mut self, key: &BoardHash) -> Option<Handle> {
        self.reads += 1;
        self.table.get(key).copied()
    }

    #[inline]
    pub fn insert(&mut self, key: BoardHash, handle: Handle) {
        self.writes += 1;
        self.table.insert(key, handle);
    }

    /// Liveness is checked by the caller against the slab.
    #[inline]
    pub fn note_hit(&mut self) {
        self.hits += 1;
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
