use crate::engine::{Board, Move};
use crate::tables::Tables;

use super::state::SearchState;
use super::{log_branch, pick_best, BranchEval, SearchConfig, SearchStats};

/// Single-threaded Expectimax move selector.
///
/// Each top-level direction is searched with a fresh [`SearchState`] (and so a
/// fresh transposition table), one after another.
pub struct Expectimax<'t> {
    tables: &'t Tables,
    cfg: SearchConfig,
    stats: SearchStats,
}

impl<'t> Expectimax<'t> {
    pub fn new(tables: &'t Tables) -> Self { Self::with_config(tables, SearchConfig::default()) }

    pub fn with_config(tables: &'t Tables, cfg: SearchConfig) -> Self {
        Self { tables, cfg, stats: SearchStats::default() }
    }

    /// Compute the best move, or `None` if no direction scores above zero
    /// (in particular when no move is legal).
    ///
    /// Example
    /// ```
    /// use solver_2048::engine::Board;
    /// use solver_2048::expectimax::Expectimax;
    /// use solver_2048::tables::Tables;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let tables = Tables::new();
    /// let mut rng = StdRng::seed_from_u64(7);
    /// let b = Board::initial(&mut rng);
    /// let mut ex = Expectimax::new(&tables);
    /// assert!(ex.best_move(b).is_some());
    /// ```
    pub fn best_move(&mut self, board: Board) -> Option<Move> {
        let best = pick_best(&self.branch_evals(board));
        tracing::trace!(board = ?board, best = ?best, "selected move");
        best
    }

    /// Get both the best move and all branch evaluations from one search.
    pub fn best_move_with_branches(&mut self, board: Board) -> (Option<Move>, [BranchEval; 4]) {
        let branches = self.branch_evals(board);
        (pick_best(&branches), branches)
    }

    /// Search value of every direction, in order `[Up, Down, Left, Right]`.
    ///
    /// Illegal moves are marked `legal=false` with `ev=0.0`.
    pub fn branch_evals(&mut self, board: Board) -> [BranchEval; 4] {
        self.stats = SearchStats::default();
        Move::ALL.map(|dir| {
            let mut state = SearchState::new(self.tables, &self.cfg, board);
            let ev = state.score_toplevel_move(board, dir);
            let branch = BranchEval { dir, ev, legal: self.tables.execute_move(dir, board) != board };
            let stats = state.stats();
            log_branch(&branch, &stats);
            self.stats.absorb(&stats);
            branch
        })
    }

    /// Search value of a single direction: `0.0` when illegal, otherwise the
    /// expectimax value plus a `1e-6` nudge.
    pub fn score_toplevel_move(&mut self, board: Board, dir: Move) -> f64 {
        let mut state = SearchState::new(self.tables, &self.cfg, board);
        let ev = state.score_toplevel_move(board, dir);
        self.stats = state.stats();
        ev
    }

    /// Statistics from the last call to [`Self::best_move`],
    /// [`Self::branch_evals`] or [`Self::score_toplevel_move`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    #[inline]
    pub fn config(&self) -> &SearchConfig { &self.cfg }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectimax::state::TIE_EPSILON;

    #[test]
    fn single_tile_picks_a_legal_move() {
        let tables = Tables::new();
        let mut ex = Expectimax::new(&tables);
        let board = Board::from_raw(0x1);
        let best = ex.best_move(board).expect("a legal move exists");
        assert_ne!(tables.execute_move(best, board), board);

        let branches = ex.branch_evals(board);
        assert!(!branches[Move::Up.index()].legal);
        assert!(!branches[Move::Left.index()].legal);
        assert_eq!(branches[Move::Up.index()].ev, 0.0);
        assert!(branches[Move::Down.index()].legal && branches[Move::Down.index()].ev > TIE_EPSILON);
        assert!(branches[Move::Right.index()].legal && branches[Move::Right.index()].ev > TIE_EPSILON);
    }

    #[test]
    fn stuck_board_has_no_move() {
        let tables = Tables::new();
        let mut ex = Expectimax::new(&tables);
        let stuck = Board::from_ranks([1, 2, 1, 2, 2, 1, 2, 1, 1, 2, 1, 2, 2, 1, 2, 1]);
        assert_eq!(ex.best_move(stuck), None);
        for branch in ex.branch_evals(stuck) {
            assert!(!branch.legal);
            assert_eq!(branch.ev, 0.0);
        }
        assert_eq!(ex.last_stats().moves_evaled, 0);
    }

    #[test]
    fn toplevel_score_matches_branch_eval() {
        let tables = Tables::new();
        let mut ex = Expectimax::new(&tables);
        let board = Board::from_raw(0x0000_0000_0001_0012);
        let branches = ex.branch_evals(board);
        for branch in branches {
            assert_eq!(ex.score_toplevel_move(board, branch.dir), branch.ev);
        }
    }

    #[test]
    fn stats_are_collected_and_reset() {
        let tables = Tables::new();
        let mut ex = Expectimax::new(&tables);
        ex.best_move(Board::from_raw(0x0000_0000_0001_0012));
        let stats = ex.last_stats();
        assert!(stats.moves_evaled > 0);
        assert!(stats.cache_size > 0);
        assert_eq!(stats.depth_limit, 3);
        assert!(stats.max_depth <= stats.depth_limit);
        ex.reset_stats();
        assert_eq!(ex.last_stats(), SearchStats::default());
    }
}
