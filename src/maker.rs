//! Agents that play one side of the exchange.
//!
//! `MoveMaker` is the uniform surface the driver and the self-play harness
//! talk to; the MCTS agent and the uniform-random agent sit behind it as a
//! tagged variant.

use rand::rngs::SmallRng;
use rand::Rng;
use rand_core::SeedableRng;

use crate::board::{BoardState, ChaosMove, Colour, OrderMove};
use crate::mcts::node::{ChaosId, OrderId};
use crate::mcts::{SearchConfig, SearchEnv};
use crate::pool::ChipPool;

pub enum MoveMaker {
    Mcts(MctsMaker),
    Random(RandomMaker),
}

impl MoveMaker {
    pub fn mcts(config: SearchConfig) -> Self {
        MoveMaker::Mcts(MctsMaker::new(config))
    }

    pub fn random(seed: u64) -> Self {
        MoveMaker::Random(RandomMaker::new(seed))
    }

    pub fn name(&self) -> &'static str {
        match self {
            MoveMaker::Mcts(_) => "mcts",
            MoveMaker::Random(_) => "random",
        }
    }

    pub fn suggest_chaos_move(&mut self, colour: Colour) -> ChaosMove {
        match self {
            MoveMaker::Mcts(maker) => maker.suggest_chaos_move(colour),
            MoveMaker::Random(maker) => maker.suggest_chaos_move(colour),
        }
    }

    pub fn suggest_order_move(&mut self) -> OrderMove {
        match self {
            MoveMaker::Mcts(maker) => maker.suggest_order_move(),
            MoveMaker::Random(maker) => maker.suggest_order_move(),
        }
    }

    pub fn register_chaos_move(&mut self, m: ChaosMove) {
        match self {
            MoveMaker::Mcts(maker) => maker.register_chaos_move(m),
            MoveMaker::Random(maker) => maker.register_chaos_move(m),
        }
    }

    pub fn register_order_move(&mut self, m: OrderMove) {
        match self {
            MoveMaker::Mcts(maker) => maker.register_order_move(m),
            MoveMaker::Random(maker) => maker.register_order_move(m),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy)]
enum Root {
    Order(OrderId),
    Chaos(ChaosId),
}

/// The search agent. Keeps the live board and pool, and carries the subtree
/// of the last search across turns so registered moves descend instead of
/// starting over.
pub struct MctsMaker {
    board: BoardState,
    pool: ChipPool,
    env: SearchEnv,
    root: Option<Root>,
}

impl MctsMaker {
    pub fn new(config: SearchConfig) -> Self {
        MctsMaker {
            board: BoardState::new(),
            pool: ChipPool::new(),
            env: SearchEnv::new(config),
            root: None,
        }
    }

    pub fn board(&self) -> &BoardState {
        &self.board
    }

    pub fn suggest_chaos_move(&mut self, colour: Colour) -> ChaosMove {
        debug_assert!(self.pool.chips_left(colour) > 0);
        self.ensure_headroom();
        let root = match self.root {
            Some(Root::Chaos(id)) => {
                // A reused root still carries sibling-colour statistics.
                self.env.prune_except(id, colour);
                id
            }
            _ => {
                self.clear_root();
                let id = self.env.insert_chaos_root(self.board.clone(), self.pool);
                self.root = Some(Root::Chaos(id));
                id
            }
        };
        debug_assert_eq!(self.env.chaos_node(root).board.hash(), self.board.hash());
        self.env.tree_search_chaos(root, colour);
        let m = self.env.best_chaos_move(root, colour);
        log::debug!(
            "suggest chaos {:?}: root visits {}",
            m,
            self.env.chaos_node(root).visits
        );
        m
    }

    pub fn suggest_order_move(&mut self) -> OrderMove {
        self.ensure_headroom();
        let root = match self.root {
            Some(Root::Order(id)) => id,
            _ => {
                self.clear_root();
                let id = self.env.insert_order_root(self.board.clone(), self.pool);
                self.root = Some(Root::Order(id));
                id
            }
        };
        debug_assert_eq!(self.env.order_node(root).board.hash(), self.board.hash());
        self.env.tree_search_order(root);
        let m = self.env.best_order_move(root);
        log::debug!(
            "suggest order {:?}: root visits {}",
            m,
            self.env.order_node(root).visits
        );
        m
    }

    pub fn register_chaos_move(&mut self, m: ChaosMove) {
        debug_assert_eq!(self.board.chip_at(m.pos), 0, "chaos move onto a chip");
        self.root = match self.root.take() {
            Some(Root::Chaos(id)) => self.env.descend_to_order_child(id, m).map(Root::Order),
            Some(Root::Order(id)) => {
                self.env.release_order(id);
                None
            }
            None => None,
        };
        self.board.place(m);
        self.pool = self.pool.remove(m.colour);
        if let Some(Root::Order(id)) = self.root {
            debug_assert_eq!(self.env.order_node(id).board.hash(), self.board.hash());
        }
    }

    pub fn register_order_move(&mut self, m: OrderMove) {
        debug_assert!(self.board.is_legal_order_move(m), "illegal order move");
        self.root = match self.root.take() {
            Some(Root::Order(id)) => self.env.descend_to_chaos_child(id, m).map(Root::Chaos),
            Some(Root::Chaos(id)) => {
                self.env.release_chaos(id);
                None
            }
            None => None,
        };
        self.board.move_chip(m);
        if let Some(Root::Chaos(id)) = self.root {
            debug_assert_eq!(self.env.chaos_node(id).board.hash(), self.board.hash());
        }
    }

    fn clear_root(&mut self) {
        match self.root.take() {
            Some(Root::Order(id)) => self.env.release_order(id),
            Some(Root::Chaos(id)) => self.env.release_chaos(id),
            None => {}
        }
    }

    /// A search can create one node of each kind per iteration plus a full
    /// root expansion. When the slabs cannot absorb that, drop the carried
    /// tree and start this turn from scratch.
    fn ensure_headroom(&mut self) {
        let needed = self.env.config.rollouts as usize + 256;
        if self.env.slots_available() < needed {
            log::debug!(
                "dropping carried tree: {} slots left, {} needed",
                self.env.slots_available(),
                needed
            );
            self.clear_root();
            self.env.clear_cache();
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

/// Uniform-random baseline opponent.
pub struct RandomMaker {
    board: BoardState,
    rng: SmallRng,
}

impl RandomMaker {
    pub fn new(seed: u64) -> Self {
        log::info!("random agent seed: {seed:#x}");
        RandomMaker {
            board: BoardState::new(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    pub fn suggest_chaos_move(&mut self, colour: Colour) -> ChaosMove {
        let mut empties = Vec::with_capacity(self.board.open_cells() as usize);
        self.board.minimal().for_each_empty(|p| empties.push(p));
        ChaosMove {
            pos: empties[self.rng.gen_range(0..empties.len())],
            colour,
        }
    }

    pub fn suggest_order_move(&mut self) -> OrderMove {
        let mut moves = vec![OrderMove::Pass];
        self.board
            .minimal()
            .for_each_order_move(|from, to| moves.push(OrderMove::Slide { from, to }));
        moves[self.rng.gen_range(0..moves.len())]
    }

    pub fn register_chaos_move(&mut self, m: ChaosMove) {
        self.board.place(m);
    }

    pub fn register_order_move(&mut self, m: OrderMove) {
        self.board.move_chip(m);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;

    fn small_config(seed: u64) -> SearchConfig {
        SearchConfig::new().rollouts(16).seed(seed)
    }

    #[test]
    fn order_suggestions_are_legal_and_reuse_the_tree() {
        let mut maker = MctsMaker::new(small_config(1));

        maker.register_chaos_move(ChaosMove { pos: Position::new(3, 3), colour: 3 });
        let m = maker.suggest_order_move();
        assert!(maker.board.is_legal_order_move(m));

        maker.register_order_move(m);
        // The played child became a chaos root matching the live board.
        match maker.root {
            Some(Root::Chaos(id)) => {
                assert_eq!(maker.env.chaos_node(id).board.hash(), maker.board.hash());
            }
            _ => panic!("expected a chaos root after an order move"),
        }

        maker.register_chaos_move(ChaosMove { pos: Position::new(0, 6), colour: 5 });
        let m = maker.suggest_order_move();
        assert!(maker.board.is_legal_order_move(m));
    }

    #[test]
    fn chaos_suggestions_land_on_empty_cells() {
        let mut maker = MctsMaker::new(small_config(2));
        for colour in [4, 4, 1] {
            let m = maker.suggest_chaos_move(colour);
            assert_eq!(maker.board.chip_at(m.pos), 0);
            assert_eq!(m.colour, colour);
            maker.register_chaos_move(m);
            maker.register_order_move(OrderMove::Pass);
        }
        assert_eq!(maker.board.open_cells(), 46);
    }

    #[test]
    fn unexpanded_registrations_clear_the_root() {
        let mut maker = MctsMaker::new(small_config(3));
        maker.register_chaos_move(ChaosMove { pos: Position::new(2, 2), colour: 7 });
        let _ = maker.suggest_order_move();
        // A slide the search may never have expanded from this root.
        maker.register_order_move(OrderMove::Pass);
        maker.register_chaos_move(ChaosMove { pos: Position::new(6, 6), colour: 7 });
        let m = maker.suggest_order_move();
        assert!(maker.board.is_legal_order_move(m));
    }

    #[test]
    fn random_maker_plays_legal_moves() {
        let mut maker = RandomMaker::new(9);
        for colour in 1..=7u8 {
            let cm = maker.suggest_chaos_move(colour);
            assert_eq!(maker.board.chip_at(cm.pos), 0);
            maker.register_chaos_move(cm);
            let om = maker.suggest_order_move();
            assert!(maker.board.is_legal_order_move(om));
            maker.register_order_move(om);
        }
        assert_eq!(maker.board.open_cells(), 42);
    }
}
