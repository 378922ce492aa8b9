//! Selection, expansion, rollout and backup over the node graph.
//!
//! The graph is a DAG: transpositions merge nodes, so a node may have many
//! parents. Back-propagation walks the selection path recorded during the
//! descent, never the parent sets, so merged nodes are credited exactly once
//! per iteration. When a cache hit attaches an existing child to a new
//! parent, that parent alone is credited with the child's accumulated
//! statistics, once per attachment.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::rngs::SmallRng;
use rand::Rng;
use rand_core::SeedableRng;

use crate::board::{BoardState, ChaosMove, Colour, OrderMove, BOARD_AREA, NUM_COLOURS};
use crate::pool::ChipPool;

use super::config::SearchConfig;
use super::node::{ChaosId, ChaosNode, OrderId, OrderNode};
use super::rollout::{smart_rollout_chaos, smart_rollout_order};
use super::slab::Slab;
use super::table::TranspositionTable;

enum PathStep {
    Order(OrderId),
    Chaos(ChaosId, Option<Colour>),
}

pub struct SearchEnv {
    pub(crate) order_nodes: Slab<OrderNode>,
    pub(crate) chaos_nodes: Slab<ChaosNode>,
    pub order_cache: TranspositionTable,
    pub chaos_cache: TranspositionTable,
    pub config: SearchConfig,
    rng: SmallRng,
    seed: u64,
    path: Vec<PathStep>,
    stop: Arc<AtomicBool>,
}

impl SearchEnv {
    pub fn new(config: SearchConfig) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        log::info!("search rng seed: {seed:#018x}");
        SearchEnv {
            order_nodes: Slab::with_capacity(config.slab_capacity),
            chaos_nodes: Slab::with_capacity(config.slab_capacity),
            order_cache: TranspositionTable::default(),
            chaos_cache: TranspositionTable::default(),
            rng: SmallRng::seed_from_u64(seed),
            seed,
            path: Vec::with_capacity(2 * BOARD_AREA),
            stop: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Setting the flag makes a running search return after its current
    /// iteration; accumulated statistics stay valid.
    pub fn stop_signal(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn set_stop_signal(&mut self, stop: Arc<AtomicBool>) {
        self.stop = stop;
    }

    pub fn slots_available(&self) -> usize {
        self.order_nodes.available().min(self.chaos_nodes.available())
    }

    /// Forgets every cached transposition. Only sensible once no root is
    /// live; stale entries would otherwise merely miss.
    pub fn clear_cache(&mut self) {
        self.order_cache.clear();
        self.chaos_cache.clear();
    }

    ////////////////////////////////////////////////////////////////////////
    // roots and node access

    pub fn insert_order_root(&mut self, board: BoardState, pool: ChipPool) -> OrderId {
        OrderId(self.order_nodes.insert(OrderNode::new_root(board, pool)))
    }

    pub fn insert_chaos_root(&mut self, board: BoardState, pool: ChipPool) -> ChaosId {
        ChaosId(self.chaos_nodes.insert(ChaosNode::new_root(board, pool)))
    }

    pub(crate) fn order_node(&self, id: OrderId) -> &OrderNode {
        self.order_nodes.get(id.0)
    }

    pub(crate) fn chaos_node(&self, id: ChaosId) -> &ChaosNode {
        self.chaos_nodes.get(id.0)
    }

    ////////////////////////////////////////////////////////////////////////
    // ownership

    /// Drops one reference; on the last one the node detaches from its
    /// children and the release cascades.
    pub fn release_order(&mut self, id: OrderId) {
        if let Some(node) = self.order_nodes.release(id.0) {
            for (_, child) in node.children {
                self.chaos_nodes
                    .get_mut(child.0)
                    .parents
                    .retain(|&(p, _)| p != id);
                self.release_chaos(child);
            }
        }
    }

    pub fn release_chaos(&mut self, id: ChaosId) {
        if let Some(node) = self.chaos_nodes.release(id.0) {
            for bucket in node.children {
                for (_, child) in bucket {
                    self.order_nodes
                        .get_mut(child.0)
                        .parents
                        .retain(|&(p, _)| p != id);
                    self.release_order(child);
                }
            }
        }
    }

    ////////////////////////////////////////////////////////////////////////
    // child acquisition through the transposition caches

    fn get_chaos_child(&mut self, parent: OrderId, m: OrderMove) -> ChaosId {
        let key = self.order_node(parent).board.hash_after_move(m);
        if let Some(handle) = self.chaos_cache.probe(&key) {
            if self.chaos_nodes.contains(handle) {
                self.chaos_cache.note_hit();
                self.chaos_nodes.retain(handle);
                let (visits, score_sum) = {
                    let child = self.chaos_nodes.get_mut(handle);
                    child.parents.push((parent, m));
                    (child.visits, child.score_sum)
                };
                // Credit the attaching parent with the child's history.
                let node = self.order_nodes.get_mut(parent.0);
                node.visits += visits;
                node.score_sum += score_sum;
                return ChaosId(handle);
            }
        }
        let child = {
            let p = self.order_nodes.get(parent.0);
            ChaosNode::child_of(parent, &p.board, &p.pool, m)
        };
        let id = ChaosId(self.chaos_nodes.insert(child));
        self.chaos_cache.insert(key, id.0);
        id
    }

    fn get_order_child(&mut self, parent: ChaosId, m: ChaosMove) -> OrderId {
        let key = self.chaos_node(parent).board.hash_after_place(m);
        if let Some(handle) = self.order_cache.probe(&key) {
            if self.order_nodes.contains(handle) {
                self.order_cache.note_hit();
                self.order_nodes.retain(handle);
                let (visits, score_sum) = {
                    let child = self.order_nodes.get_mut(handle);
                    child.parents.push((parent, m));
                    (child.visits, child.score_sum)
                };
                let bucket = m.colour as usize - 1;
                let node = self.chaos_nodes.get_mut(parent.0);
                node.visits += visits;
                node.score_sum += score_sum;
                node.colour_visits[bucket] += visits;
                node.colour_scores[bucket] += score_sum;
                return OrderId(handle);
            }
        }
        let child = {
            let p = self.chaos_nodes.get(parent.0);
            OrderNode::child_of(parent, &p.board, &p.pool, m)
        };
        let id = OrderId(self.order_nodes.insert(child));
        self.order_cache.insert(key, id.0);
        id
    }

    ////////////////////////////////////////////////////////////////////////
    // expansion

    fn expand_order(&mut self, id: OrderId) -> ChaosId {
        let m = {
            let node = self.order_nodes.get_mut(id.0);
            let pick = self.rng.gen_range(0..node.unvisited.len());
            node.unvisited.swap_remove(pick)
        };
        let child = self.get_chaos_child(id, m);
        self.order_nodes.get_mut(id.0).children.push((m, child));
        child
    }

    fn expand_chaos(&mut self, id: ChaosId, colour: Colour) -> OrderId {
        let bucket = colour as usize - 1;
        let pos = {
            let node = self.chaos_nodes.get_mut(id.0);
            let pick = self.rng.gen_range(0..node.unvisited[bucket].len());
            node.unvisited[bucket].swap_remove(pick)
        };
        let child = self.get_order_child(id, ChaosMove { pos, colour });
        self.chaos_nodes.get_mut(id.0).children[bucket].push((pos, child));
        child
    }

    ////////////////////////////////////////////////////////////////////////
    // UCT

    fn select_chaos_child(&self, id: OrderId) -> ChaosId {
        let node = self.order_node(id);
        debug_assert!(!node.children.is_empty());
        let log_n = f64::from(node.visits).max(1.0).ln();
        let k = self.config.score_scale;
        let t = self.config.uct_temperature;
        let mut best_score = f64::NEG_INFINITY;
        let mut best = node.children[0].1;
        for &(_, child_id) in &node.children {
            let child = self.chaos_node(child_id);
            let score =
                child.expected_score() * k + t * (log_n / f64::from(child.visits)).sqrt();
            if score > best_score {
                best_score = score;
                best = child_id;
            }
        }
        best
    }

    /// Chaos minimises, so the exploitation term flips sign; the exploration
    /// term is normalised by the colour bucket's own visit count.
    fn select_order_child(&self, id: ChaosId, colour: Colour) -> OrderId {
        let node = self.chaos_node(id);
        let bucket = colour as usize - 1;
        debug_assert!(!node.children[bucket].is_empty());
        let log_n = f64::from(node.colour_visits[bucket]).max(1.0).ln();
        let k = self.config.score_scale;
        let t = self.config.uct_temperature;
        let mut best_score = f64::NEG_INFINITY;
        let mut best = node.children[bucket][0].1;
        for &(_, child_id) in &node.children[bucket] {
            let child = self.order_node(child_id);
            let score =
                -child.expected_score() * k + t * (log_n / f64::from(child.visits)).sqrt();
            if score > best_score {
                best_score = score;
                best = child_id;
            }
        }
        best
    }

    ////////////////////////////////////////////////////////////////////////
    // search

    pub fn tree_search_order(&mut self, root: OrderId) {
        self.init_order(root);
        while self.order_node(root).can_expand() {
            if self.stop.load(Ordering::Relaxed) {
                return;
            }
            let child = self.expand_order(root);
            self.path.push(PathStep::Order(root));
            self.path.push(PathStep::Chaos(child, None));
            let score = self.rollout_chaos(child);
            self.backup(score);
        }
        for _ in 0..self.config.rollouts {
            if self.stop.load(Ordering::Relaxed) {
                return;
            }
            self.iterate(root);
        }
    }

    pub fn tree_search_chaos(&mut self, root: ChaosId, colour: Colour) {
        if self.chaos_node(root).is_terminal() {
            return;
        }
        self.init_chaos(root);
        while self.chaos_node(root).can_expand(colour) {
            if self.stop.load(Ordering::Relaxed) {
                return;
            }
            let child = self.expand_chaos(root, colour);
            self.path.push(PathStep::Chaos(root, Some(colour)));
            self.path.push(PathStep::Order(child));
            let score = self.rollout_order(child);
            self.backup(score);
        }
        for _ in 0..self.config.rollouts {
            if self.stop.load(Ordering::Relaxed) {
                return;
            }
            self.path.push(PathStep::Chaos(root, Some(colour)));
            let start = self.select_order_child(root, colour);
            self.iterate(start);
        }
    }

    /// One selection-expansion-rollout-backup iteration, starting the
    /// descent at an order node. The path buffer may already hold root
    /// steps contributed by the caller.
    fn iterate(&mut self, mut current: OrderId) {
        let score = loop {
            self.path.push(PathStep::Order(current));
            self.init_order(current);
            if self.order_node(current).can_expand() {
                let child = self.expand_order(current);
                self.path.push(PathStep::Chaos(child, None));
                break self.rollout_chaos(child);
            }

            let chaos = self.select_chaos_child(current);
            if self.chaos_node(chaos).is_terminal() {
                self.path.push(PathStep::Chaos(chaos, None));
                break self.chaos_node(chaos).board.total_score();
            }
            self.init_chaos(chaos);
            let colour = {
                let node = self.chaos_nodes.get(chaos.0);
                node.pool.draw(&mut self.rng)
            };
            self.path.push(PathStep::Chaos(chaos, Some(colour)));
            if self.chaos_node(chaos).can_expand(colour) {
                let child = self.expand_chaos(chaos, colour);
                self.path.push(PathStep::Order(child));
                break self.rollout_order(child);
            }
            current = self.select_order_child(chaos, colour);
        };
        self.backup(score);
    }

    fn backup(&mut self, score: u32) {
        let path = std::mem::take(&mut self.path);
        for step in &path {
            match *step {
                PathStep::Order(id) => self.order_nodes.get_mut(id.0).record(score),
                PathStep::Chaos(id, colour) => {
                    self.chaos_nodes.get_mut(id.0).record(score, colour)
                }
            }
        }
        self.path = path;
        self.path.clear();
    }

    fn init_order(&mut self, id: OrderId) {
        let node = self.order_nodes.get_mut(id.0);
        if !node.initialized {
            node.init();
        }
    }

    fn init_chaos(&mut self, id: ChaosId) {
        let node = self.chaos_nodes.get_mut(id.0);
        if !node.initialized {
            node.init();
        }
    }

    fn rollout_order(&mut self, id: OrderId) -> u32 {
        let node = self.order_nodes.get(id.0);
        smart_rollout_order(&node.board, &node.pool, &mut self.rng)
    }

    fn rollout_chaos(&mut self, id: ChaosId) -> u32 {
        let node = self.chaos_nodes.get(id.0);
        smart_rollout_chaos(&node.board, &node.pool, &mut self.rng)
    }

    ////////////////////////////////////////////////////////////////////////
    // answers

    /// Highest average from Order's viewpoint; ties fall to the more
    /// visited child, then to discovery order.
    pub fn best_order_move(&self, root: OrderId) -> OrderMove {
        let node = self.order_node(root);
        assert!(!node.children.is_empty(), "order root has no children");
        let mut best = node.children[0].0;
        let mut best_key = (f64::NEG_INFINITY, 0u32);
        for &(m, child_id) in &node.children {
            let child = self.chaos_node(child_id);
            let key = (child.expected_score(), child.visits);
            if key.0 > best_key.0 || (key.0 == best_key.0 && key.1 > best_key.1) {
                best_key = key;
                best = m;
            }
        }
        best
    }

    /// Lowest average from Chaos's viewpoint, same tie-breaks.
    pub fn best_chaos_move(&self, root: ChaosId, colour: Colour) -> ChaosMove {
        let node = self.chaos_node(root);
        let bucket = colour as usize - 1;
        assert!(
            !node.children[bucket].is_empty(),
            "chaos root has no children for colour {colour}"
        );
        let mut best = node.children[bucket][0].0;
        let mut best_key = (f64::INFINITY, 0u32);
        for &(pos, child_id) in &node.children[bucket] {
            let child = self.order_node(child_id);
            let key = (child.expected_score(), child.visits);
            if key.0 < best_key.0 || (key.0 == best_key.0 && key.1 > best_key.1) {
                best_key = key;
                best = pos;
            }
        }
        ChaosMove { pos: best, colour }
    }

    ////////////////////////////////////////////////////////////////////////
    // root maintenance for the move maker

    /// Once the drawn colour is known, sibling-colour children are dead
    /// weight: their subtrees are released and their statistics leave the
    /// totals so UCT keeps seeing consistent counts.
    pub fn prune_except(&mut self, root: ChaosId, colour: Colour) {
        let keep = colour as usize - 1;
        for bucket in 0..NUM_COLOURS {
            if bucket == keep {
                continue;
            }
            let children = {
                let node = self.chaos_nodes.get_mut(root.0);
                node.unvisited[bucket].clear();
                node.visits -= node.colour_visits[bucket];
                node.score_sum -= node.colour_scores[bucket];
                node.colour_visits[bucket] = 0;
                node.colour_scores[bucket] = 0;
                std::mem::take(&mut node.children[bucket])
            };
            for (_, child) in children {
                self.order_nodes
                    .get_mut(child.0)
                    .parents
                    .retain(|&(p, _)| p != root);
                self.release_order(child);
            }
        }
    }

    /// Hands the subtree for a played chaos move over as the new root,
    /// releasing everything else. `None` when the move was never expanded.
    pub fn descend_to_order_child(&mut self, root: ChaosId, m: ChaosMove) -> Option<OrderId> {
        let bucket = m.colour as usize - 1;
        let child = self.chaos_node(root).children[bucket]
            .iter()
            .find(|&&(pos, _)| pos == m.pos)
            .map(|&(_, id)| id);
        if let Some(id) = child {
            self.order_nodes.retain(id.0);
        }
        self.release_chaos(root);
        child
    }

    pub fn descend_to_chaos_child(&mut self, root: OrderId, m: OrderMove) -> Option<ChaosId> {
        let child = self
            .order_node(root)
            .children
            .iter()
            .find(|&&(mv, _)| mv == m)
            .map(|&(_, id)| id);
        if let Some(id) = child {
            self.chaos_nodes.retain(id.0);
        }
        self.release_order(root);
        child
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Position;

    fn env(rollouts: u32, seed: u64) -> SearchEnv {
        SearchEnv::new(SearchConfig::new().rollouts(rollouts).seed(seed))
    }

    fn place(pos: Position, colour: Colour) -> ChaosMove {
        ChaosMove { pos, colour }
    }

    #[test]
    fn search_is_deterministic_in_the_seed() {
        let mut board = BoardState::new();
        let mut pool = ChipPool::new();
        for (i, colour) in [3u8, 3, 5].into_iter().enumerate() {
            board.place(place(Position::new(2, 2 * i), colour));
            pool = pool.remove(colour);
        }

        let run = || {
            let mut e = env(150, 42);
            let root = e.insert_order_root(board.clone(), pool);
            e.tree_search_order(root);
            let node = e.order_node(root);
            (e.best_order_move(root), node.visits, node.score_sum)
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn order_root_visits_count_expansions_plus_iterations() {
        // An empty board has a single order move: pass.
        let mut e = env(50, 7);
        let root = e.insert_order_root(BoardState::new(), ChipPool::new());
        e.tree_search_order(root);

        let node = e.order_node(root);
        assert_eq!(node.visits, 50 + 1);
        assert_eq!(node.children.len(), 1);
        assert!(node.unvisited.is_empty());

        let (m, child_id) = node.children[0];
        assert!(m.is_pass());
        let child = e.chaos_node(child_id);
        assert_eq!(child.visits, 51);
        assert_eq!(child.score_sum, node.score_sum);
    }

    #[test]
    fn chaos_root_totals_equal_their_bucket_sums() {
        let mut e = env(40, 11);
        let root = e.insert_chaos_root(BoardState::new(), ChipPool::new());
        e.tree_search_chaos(root, 2);

        let node = e.chaos_node(root);
        assert_eq!(node.visits, BOARD_AREA as u32 + 40);
        assert_eq!(node.visits, node.colour_visits.iter().sum::<u32>());
        assert_eq!(node.score_sum, node.colour_scores.iter().sum::<u64>());
        // Only the searched colour accumulated anything at the root.
        assert_eq!(node.colour_visits[1], node.visits);
    }

    #[test]
    fn pass_child_shares_the_parent_hash() {
        let mut board = BoardState::new();
        board.place(place(Position::new(1, 1), 4));
        let pool = ChipPool::new().remove(4);

        let mut e = env(0, 3);
        let root = e.insert_order_root(board.clone(), pool);
        let child = e.get_chaos_child(root, OrderMove::Pass);
        assert_eq!(e.chaos_node(child).board.hash(), board.hash());
    }

    #[test]
    fn commuting_sequences_reach_the_same_node() {
        let mut e = env(0, 5);
        let root = e.insert_chaos_root(BoardState::new(), ChipPool::new());

        let a = place(Position::new(0, 0), 1);
        let b = place(Position::new(1, 1), 2);

        let o1 = e.get_order_child(root, a);
        let c1 = e.get_chaos_child(o1, OrderMove::Pass);
        let end1 = e.get_order_child(c1, b);

        let o2 = e.get_order_child(root, b);
        let c2 = e.get_chaos_child(o2, OrderMove::Pass);
        let end2 = e.get_order_child(c2, a);

        assert_eq!(end1, end2);
        assert_eq!(e.order_node(end1).parents.len(), 2);
        assert!(e.order_cache.hits >= 1);
    }

    #[test]
    fn attaching_a_known_child_credits_the_new_parent_once() {
        let mut e = env(0, 5);
        let root = e.insert_chaos_root(BoardState::new(), ChipPool::new());

        let a = place(Position::new(0, 0), 1);
        let b = place(Position::new(1, 1), 2);

        let o1 = e.get_order_child(root, a);
        let c1 = e.get_chaos_child(o1, OrderMove::Pass);
        let end = e.get_order_child(c1, b);
        e.order_nodes.get_mut(end.0).record(160);

        let o2 = e.get_order_child(root, b);
        let c2 = e.get_chaos_child(o2, OrderMove::Pass);
        let again = e.get_order_child(c2, a);

        assert_eq!(end, again);
        let parent = e.chaos_node(c2);
        assert_eq!(parent.visits, 1);
        assert_eq!(parent.score_sum, 160);
        assert_eq!(parent.colour_visits[0], 1);
        // The grandparent is credited only by per-iteration backups.
        assert_eq!(e.order_node(o2).visits, 0);
    }

    #[test]
    fn pruning_keeps_exactly_the_revealed_colour() {
        let mut e = env(25, 13);
        let root = e.insert_chaos_root(BoardState::new(), ChipPool::new());
        for colour in [1, 2, 3] {
            e.tree_search_chaos(root, colour);
        }

        let before = e.chaos_node(root);
        let kept_visits = before.colour_visits[1];
        let kept_scores = before.colour_scores[1];
        assert!(before.visits > kept_visits);
        let order_nodes_before = e.order_nodes.len();

        e.prune_except(root, 2);

        let node = e.chaos_node(root);
        assert_eq!(node.visits, kept_visits);
        assert_eq!(node.score_sum, kept_scores);
        for bucket in [0, 2, 3, 4, 5, 6] {
            assert_eq!(node.colour_visits[bucket], 0);
            assert!(node.children[bucket].is_empty());
            assert!(node.unvisited[bucket].is_empty());
        }
        assert!(e.order_nodes.len() < order_nodes_before);
    }

    #[test]
    fn releasing_the_root_empties_both_slabs() {
        let mut e = env(300, 21);
        let root = e.insert_order_root(BoardState::new(), ChipPool::new());
        e.tree_search_order(root);
        assert!(e.order_nodes.len() > 1 || e.chaos_nodes.len() > 1);

        e.release_order(root);
        assert!(e.order_nodes.is_empty());
        assert!(e.chaos_nodes.is_empty());
    }

    #[test]
    fn stop_signal_halts_before_any_work() {
        let mut e = env(10_000, 2);
        e.stop_signal().store(true, Ordering::Relaxed);
        let root = e.insert_order_root(BoardState::new(), ChipPool::new());
        e.tree_search_order(root);
        let node = e.order_node(root);
        assert_eq!(node.visits, 0);
        assert!(node.children.is_empty());
    }

    #[test]
    fn best_chaos_move_prefers_the_lowest_average() {
        let mut e = env(120, 31);
        let mut board = BoardState::new();
        board.place(place(Position::new(3, 3), 6));
        let pool = ChipPool::new().remove(6);
        let root = e.insert_chaos_root(board, pool);
        e.tree_search_chaos(root, 6);

        let m = e.best_chaos_move(root, 6);
        assert_eq!(m.colour, 6);
        let node = e.chaos_node(root);
        let picked = node.children[5]
            .iter()
            .find(|&&(pos, _)| pos == m.pos)
            .map(|&(_, id)| id)
            .unwrap();
        let picked_avg = e.order_node(picked).expected_score();
        for &(_, child_id) in &node.children[5] {
            assert!(picked_avg <= e.order_node(child_id).expected_score() + 1e-9);
        }
    }
}
