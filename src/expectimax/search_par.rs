use rayon::prelude::*;

use crate::engine::{Board, Move};
use crate::tables::Tables;

use super::state::SearchState;
use super::{log_branch, pick_best, BranchEval, SearchConfig, SearchStats};

/// Parallel Expectimax: the four top-level directions run on the rayon pool.
///
/// Every direction owns its own [`SearchState`] and transposition table; only
/// the read-only [`Tables`] are shared. Results are identical to
/// [`super::Expectimax`].
pub struct ExpectimaxParallel<'t> {
    tables: &'t Tables,
    cfg: SearchConfig,
    stats: SearchStats,
}

impl<'t> ExpectimaxParallel<'t> {
    pub fn new(tables: &'t Tables) -> Self { Self::with_config(tables, SearchConfig::default()) }

    pub fn with_config(tables: &'t Tables, cfg: SearchConfig) -> Self {
        Self { tables, cfg, stats: SearchStats::default() }
    }

    /// Compute the best move using parallel expectimax.
    ///
    /// This is a convenience wrapper around `branch_evals` that just picks the best move.
    #[inline]
    pub fn best_move(&mut self, board: Board) -> Option<Move> {
        let best = pick_best(&self.branch_evals(board));
        tracing::trace!(board = ?board, best = ?best, "selected move");
        best
    }

    /// Get both the best move and all branch evaluations from one search.
    #[inline]
    pub fn best_move_with_branches(&mut self, board: Board) -> (Option<Move>, [BranchEval; 4]) {
        let branches = self.branch_evals(board);
        (pick_best(&branches), branches)
    }

    /// Search value of every direction, in order `[Up, Down, Left, Right]`.
    pub fn branch_evals(&mut self, board: Board) -> [BranchEval; 4] {
        let tables = self.tables;
        let cfg = &self.cfg;
        let results: Vec<(BranchEval, SearchStats)> = Move::ALL
            .par_iter()
            .map(|&dir| {
                let mut state = SearchState::new(tables, cfg, board);
                let ev = state.score_toplevel_move(board, dir);
                let legal = tables.execute_move(dir, board) != board;
                (BranchEval { dir, ev, legal }, state.stats())
            })
            .collect();

        // par_iter().collect() keeps the input order
        let mut out = Move::ALL.map(|dir| BranchEval { dir, ev: 0.0, legal: false });
        let mut stats = SearchStats::default();
        for (i, (branch, branch_stats)) in results.into_iter().enumerate() {
            log_branch(&branch, &branch_stats);
            stats.absorb(&branch_stats);
            out[i] = branch;
        }
        self.stats = stats;
        out
    }

    /// Statistics from the last call to [`Self::best_move`] or [`Self::branch_evals`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    /// Reset accumulated stats to zero.
    #[inline]
    pub fn reset_stats(&mut self) { self.stats = SearchStats::default(); }

    #[inline]
    pub fn config(&self) -> &SearchConfig { &self.cfg }
}
