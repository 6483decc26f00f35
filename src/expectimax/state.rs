use std::collections::HashMap;

use ahash::RandomState as AHasher;

use crate::engine::{Board, BoardRaw, Move};
use crate::tables::Tables;

use super::heuristic::score_heur_board;
use super::{SearchConfig, SearchStats};

/// Added to every legal top-level score so it beats the `0.0` of an illegal move.
pub(crate) const TIE_EPSILON: f64 = 1e-6;
const MIN_DEPTH_LIMIT: u32 = 3;

/// Spawned tile ranks and their probabilities: a 2 (rank 1) or a 4 (rank 2).
pub(crate) const SPAWN_OUTCOMES: [(BoardRaw, f64); 2] = [(1, 0.9), (2, 0.1)];

#[derive(Clone, Copy)]
struct TranspositionEntry { depth: u32, heuristic: f64 }

/// Mutable context of one top-level direction evaluation.
///
/// Owns its transposition table; never shared between directions or turns.
pub(crate) struct SearchState<'a> {
    tables: &'a Tables,
    cfg: &'a SearchConfig,
    trans_table: HashMap<Board, TranspositionEntry, AHasher>,
    cur_depth: u32,
    max_depth: u32,
    depth_limit: u32,
    cache_hits: u64,
    moves_evaled: u64,
}

impl<'a> SearchState<'a> {
    /// Fresh state whose depth limit adapts to `root`: boards with more
    /// distinct ranks are searched deeper.
    pub(crate) fn new(tables: &'a Tables, cfg: &'a SearchConfig, root: Board) -> Self {
        Self {
            tables,
            cfg,
            trans_table: HashMap::with_hasher(AHasher::new()),
            cur_depth: 0,
            max_depth: 0,
            depth_limit: depth_limit(cfg, root),
            cache_hits: 0,
            moves_evaled: 0,
        }
    }

    pub(crate) fn stats(&self) -> SearchStats {
        SearchStats {
            moves_evaled: self.moves_evaled,
            cache_hits: self.cache_hits,
            cache_size: self.trans_table.len() as u64,
            max_depth: self.max_depth,
            depth_limit: self.depth_limit,
        }
    }

    /// Score of playing `direction` from `board`: `0.0` if the move changes
    /// nothing, otherwise the chance-node value of the result plus
    /// [`TIE_EPSILON`].
    pub(crate) fn score_toplevel_move(&mut self, board: Board, direction: Move) -> f64 {
        let new_board = self.tables.execute_move(direction, board);
        if new_board == board {
            return 0.0;
        }
        self.score_tilechoose_node(new_board, 1.0) + TIE_EPSILON
    }

    /// Max node: the best chance-node value over the directions that change
    /// the board, or the heuristic of `board` itself when none do.
    fn score_move_node(&mut self, board: Board, cprob: f64) -> f64 {
        let mut best: Option<f64> = None;
        self.cur_depth += 1;
        for direction in Move::ALL {
            let new_board = self.tables.execute_move(direction, board);
            self.moves_evaled += 1;
            if new_board != board {
                let score = self.score_tilechoose_node(new_board, cprob);
                best = Some(best.map_or(score, |b| b.max(score)));
            }
        }
        self.cur_depth -= 1;
        best.unwrap_or_else(|| score_heur_board(self.tables, board))
    }

    /// Chance node: the probability-weighted average over every empty cell
    /// and both spawn values.
    fn score_tilechoose_node(&mut self, board: Board, cprob: f64) -> f64 {
        if cprob < self.cfg.prob_cutoff || self.cur_depth >= self.depth_limit {
            self.max_depth = self.max_depth.max(self.cur_depth);
            return score_heur_board(self.tables, board);
        }

        let cacheable = self.cfg.cache_enabled && self.cur_depth < self.cfg.cache_depth_limit;
        if cacheable {
            if let Some(entry) = self.trans_table.get(&board) {
                // Only trust entries searched at least as deep as we would search now.
                if entry.depth <= self.cur_depth {
                    self.cache_hits += 1;
                    return entry.heuristic;
                }
            }
        }

        let num_open = board.count_empty();
        if num_open == 0 {
            return score_heur_board(self.tables, board);
        }
        let cell_prob = cprob / f64::from(num_open);

        let mut res = 0.0;
        for slot in empty_slots(board) {
            for (rank, probability) in SPAWN_OUTCOMES {
                let spawned = Board::from_raw(board.raw() | (slot * rank));
                res += self.score_move_node(spawned, cell_prob * probability) * probability;
            }
        }
        res /= f64::from(num_open);

        if cacheable {
            self.trans_table.insert(board, TranspositionEntry { depth: self.cur_depth, heuristic: res });
        }
        res
    }
}

/// `max(3, distinct_ranks - 2)`, then the configured cap if any.
fn depth_limit(cfg: &SearchConfig, board: Board) -> u32 {
    let dyn_depth = board.count_distinct_tiles().saturating_sub(2).max(MIN_DEPTH_LIMIT);
    match cfg.depth_cap { Some(cap) => dyn_depth.min(cap), None => dyn_depth }
}

/// A rank-1 tile positioned at each empty cell of `board`, lowest cell first.
fn empty_slots(board: Board) -> impl Iterator<Item = BoardRaw> {
    let raw = board.raw();
    (0..16u32)
        .filter(move |&idx| (raw >> (4 * idx)) & 0xf == 0)
        .map(|idx| 1 << (4 * idx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_limit_adapts_to_distinct_ranks() {
        let cfg = SearchConfig::default();
        assert_eq!(depth_limit(&cfg, Board::from_raw(0x1)), 3);
        assert_eq!(depth_limit(&cfg, Board::from_raw(0x0000_0000_0004_3211)), 3);
        assert_eq!(depth_limit(&cfg, Board::from_raw(0x0000_0000_0765_4321)), 5);
        let capped = SearchConfig { depth_cap: Some(4), ..Default::default() };
        assert_eq!(depth_limit(&capped, Board::from_raw(0x0000_0009_8765_4321)), 4);
    }

    #[test]
    fn spawn_weights_sum_to_one() {
        let board = Board::from_raw(0x0000_0000_0210_0301);
        let open = board.count_empty();
        assert_eq!(open, 12);
        assert_eq!(empty_slots(board).count() as u32, open);
        let total: f64 = empty_slots(board)
            .flat_map(|_| SPAWN_OUTCOMES.iter().map(|&(_, p)| p / f64::from(open)))
            .sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_slots_cover_only_empty_cells() {
        let board = Board::from_raw(0xffff_ffff_ffff_f0f0);
        let slots: Vec<_> = empty_slots(board).collect();
        assert_eq!(slots, vec![1, 1 << 8]);
    }

    #[test]
    fn cutoff_returns_heuristic_leaf() {
        let tables = Tables::new();
        let cfg = SearchConfig::default();
        let board = Board::from_raw(0x0000_0000_0000_0011);
        let mut state = SearchState::new(&tables, &cfg, board);
        let leaf = state.score_tilechoose_node(board, cfg.prob_cutoff / 2.0);
        assert_eq!(leaf, score_heur_board(&tables, board));
        assert_eq!(state.stats().moves_evaled, 0);

        state.cur_depth = state.depth_limit;
        assert_eq!(state.score_tilechoose_node(board, 1.0), score_heur_board(&tables, board));
    }

    #[test]
    fn stuck_move_node_falls_back_to_heuristic() {
        let tables = Tables::new();
        let cfg = SearchConfig::default();
        let stuck = Board::from_ranks([1, 2, 1, 2, 2, 1, 2, 1, 1, 2, 1, 2, 2, 1, 2, 1]);
        let mut state = SearchState::new(&tables, &cfg, stuck);
        assert_eq!(state.score_move_node(stuck, 1.0), score_heur_board(&tables, stuck));
        assert_eq!(state.cur_depth, 0);
        assert_eq!(state.stats().moves_evaled, 4);
    }

    #[test]
    fn cache_entry_trusted_only_when_searched_deep_enough() {
        let tables = Tables::new();
        let cfg = SearchConfig::default();
        let board = Board::from_raw(0x0000_0000_0000_0121);
        const SENTINEL: f64 = -42.0;

        let mut reference = SearchState::new(&tables, &cfg, board);
        reference.depth_limit = 3;
        reference.cur_depth = 1;
        let expected = reference.score_tilechoose_node(board, 1.0);

        let mut state = SearchState::new(&tables, &cfg, board);
        state.depth_limit = 3;
        state.trans_table.insert(board, TranspositionEntry { depth: 2, heuristic: SENTINEL });

        // Spawns raise the tile-value sum and moves preserve it, so `board`
        // never recurs below itself: only the top-level lookup sees the sentinel.
        // Cached at depth 2, requested at depth 1: a shallower search, ignore it.
        state.cur_depth = 1;
        let fresh = state.score_tilechoose_node(board, 1.0);
        assert_eq!(fresh, expected);

        // the recomputed entry replaced the sentinel at depth 1
        let entry = state.trans_table[&board];
        assert_eq!(entry.depth, 1);
        assert_eq!(entry.heuristic, fresh);

        state.trans_table.insert(board, TranspositionEntry { depth: 2, heuristic: SENTINEL });
        state.cur_depth = 2;
        let hits_before = state.cache_hits;
        assert_eq!(state.score_tilechoose_node(board, 1.0), SENTINEL);
        assert_eq!(state.cache_hits, hits_before + 1);
    }

    #[test]
    fn cache_disabled_never_stores() {
        let tables = Tables::new();
        let cfg = SearchConfig { cache_enabled: false, ..Default::default() };
        let board = Board::from_raw(0x0000_0000_0000_0011);
        let mut state = SearchState::new(&tables, &cfg, board);
        let score = state.score_toplevel_move(board, Move::Left);
        assert!(score > 0.0);
        assert_eq!(state.stats().cache_size, 0);
        assert_eq!(state.stats().cache_hits, 0);
    }

    #[test]
    fn toplevel_illegal_move_scores_zero() {
        let tables = Tables::new();
        let cfg = SearchConfig::default();
        let board = Board::from_raw(0x0000_0000_0000_0001);
        let mut state = SearchState::new(&tables, &cfg, board);
        assert_eq!(state.score_toplevel_move(board, Move::Left), 0.0);
        assert_eq!(state.score_toplevel_move(board, Move::Up), 0.0);
        assert!(state.score_toplevel_move(board, Move::Right) > TIE_EPSILON);
    }
}
