//! Expectimax move search for 2048 (single-threaded and parallel).
//!
//! The search alternates two node kinds: a move node, where the player picks
//! the direction with the highest value, and a chance node, where a tile is
//! spawned in each empty cell (a 2 with probability 0.9, a 4 with 0.1) and the
//! results are averaged. Leaves are scored with the table heuristic.
//!
//! This module provides two selectors with the same surface:
//! - [`Expectimax`]: evaluates the four directions one after another.
//! - [`ExpectimaxParallel`]: evaluates them on the rayon pool.
//!
//! Each direction is searched with its own transposition table, so both
//! selectors produce identical values for the same board and config.
//!
//! ```
//! use solver_2048::engine::Board;
//! use solver_2048::expectimax::{Expectimax, ExpectimaxParallel};
//! use solver_2048::tables::Tables;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let tables = Tables::new();
//! let mut rng = StdRng::seed_from_u64(123);
//! let b0 = Board::initial(&mut rng);
//!
//! let mut ex = Expectimax::new(&tables);
//! let mut ex_par = ExpectimaxParallel::new(&tables);
//! assert_eq!(ex.best_move(b0), ex_par.best_move(b0));
//! ```

use crate::engine::Move;

pub mod heuristic;
mod search_par;
mod search_seq;
mod state;

pub use heuristic::{evaluate, score_board, score_heur_board, Evaluation};
pub use search_par::ExpectimaxParallel;
pub use search_seq::Expectimax;

/// Tunable search knobs. The defaults reproduce the reference search exactly.
///
/// - `prob_cutoff`: chance nodes reached with a lower cumulative probability are
///   scored with the heuristic instead of expanded.
/// - `cache_depth_limit`: the transposition table is consulted and written only
///   while the current depth is below this bound.
/// - `cache_enabled`: enable/disable transposition caching.
/// - `depth_cap`: optional hard cap on the adaptive depth limit.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub prob_cutoff: f64,
    pub cache_depth_limit: u32,
    pub cache_enabled: bool,
    pub depth_cap: Option<u32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { prob_cutoff: 1e-4, cache_depth_limit: 15, cache_enabled: true, depth_cap: None }
    }
}

/// Value of one top-level direction.
///
/// - `ev` is the search value for taking `dir`, or `0.0` when illegal.
/// - `legal` is false when the move is a no-op for the current board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Move,
    pub ev: f64,
    pub legal: bool,
}

/// Counters collected by one search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Directions tried at move nodes.
    pub moves_evaled: u64,
    pub cache_hits: u64,
    /// Transposition table entries when the search finished.
    pub cache_size: u64,
    /// Deepest move-node depth that reached a leaf.
    pub max_depth: u32,
    pub depth_limit: u32,
}

impl SearchStats {
    /// Fold another direction's stats into this one (counters add, depths max).
    pub fn absorb(&mut self, other: &SearchStats) {
        self.moves_evaled += other.moves_evaled;
        self.cache_hits += other.cache_hits;
        self.cache_size += other.cache_size;
        self.max_depth = self.max_depth.max(other.max_depth);
        self.depth_limit = self.depth_limit.max(other.depth_limit);
    }
}

/// Pick the best legal branch: strictly greater than every earlier one and
/// than `0.0`, so ties go to the earlier direction and non-positive values
/// never win.
fn pick_best(branches: &[BranchEval; 4]) -> Option<Move> {
    let mut best = 0.0;
    let mut best_move = None;
    for branch in branches {
        if branch.ev > best {
            best = branch.ev;
            best_move = Some(branch.dir);
        }
    }
    best_move
}

fn log_branch(branch: &BranchEval, stats: &SearchStats) {
    tracing::debug!(
        direction = %branch.dir,
        result = branch.ev,
        moves_evaled = stats.moves_evaled,
        cache_hits = stats.cache_hits,
        cache_size = stats.cache_size,
        max_depth = stats.max_depth,
        "evaluated move"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(dir: Move, ev: f64) -> BranchEval { BranchEval { dir, ev, legal: ev != 0.0 } }

    #[test]
    fn pick_best_prefers_first_of_ties() {
        let branches = [
            branch(Move::Up, 5.0),
            branch(Move::Down, 7.0),
            branch(Move::Left, 7.0),
            branch(Move::Right, 0.0),
        ];
        assert_eq!(pick_best(&branches), Some(Move::Down));
    }

    #[test]
    fn pick_best_rejects_non_positive() {
        let branches = [
            branch(Move::Up, 0.0),
            branch(Move::Down, 0.0),
            branch(Move::Left, -3.0),
            branch(Move::Right, 0.0),
        ];
        assert_eq!(pick_best(&branches), None);
    }

    #[test]
    fn stats_absorb() {
        let mut total = SearchStats::default();
        total.absorb(&SearchStats { moves_evaled: 10, cache_hits: 2, cache_size: 5, max_depth: 3, depth_limit: 3 });
        total.absorb(&SearchStats { moves_evaled: 4, cache_hits: 1, cache_size: 1, max_depth: 2, depth_limit: 3 });
        assert_eq!(
            total,
            SearchStats { moves_evaled: 14, cache_hits: 3, cache_size: 6, max_depth: 3, depth_limit: 3 }
        );
    }
}
