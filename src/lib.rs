//! solver-2048: a 2048 board engine and Expectimax move selector
//!
//! This crate provides:
//! - A packed `Board` type (16 cells of 4-bit ranks in one `u64`)
//! - Precomputed move, score and heuristic tables (`tables` module)
//! - An Expectimax search (`expectimax` module) with sequential and parallel variants
//!
//! Quick start:
//! ```
//! use solver_2048::engine::{Board, Move};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // One-time table init; pass the tables to everything that needs them
//! let tables = solver_2048::initialize_tables();
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let b0 = Board::initial(&mut rng);
//! if let Some(dir) = solver_2048::best_move(&tables, b0) {
//!     let b1 = solver_2048::apply_move(&tables, dir, b0);
//!     assert_ne!(b1, b0);
//! }
//!
//! let merged = solver_2048::apply_move(&tables, Move::Left, Board::from_raw(0x3211));
//! assert_eq!(merged, Board::from_raw(0x0322));
//! ```
//!
//! The free functions here are thin wrappers; use [`expectimax::Expectimax`] or
//! [`expectimax::ExpectimaxParallel`] directly to tune the search or read its stats.
pub mod engine;
pub mod expectimax;
pub mod tables;

use engine::{Board, Move};
use expectimax::{Evaluation, Expectimax};
use tables::Tables;

/// Build the move, score and heuristic tables. Call once and share by reference.
pub fn initialize_tables() -> Tables { Tables::new() }

/// Apply `direction` to `board` without spawning a tile.
#[inline]
pub fn apply_move(tables: &Tables, direction: Move, board: Board) -> Board {
    tables.execute_move(direction, board)
}

/// Best direction for `board` with the default search, or `None` if no move helps.
pub fn best_move(tables: &Tables, board: Board) -> Option<Move> {
    Expectimax::new(tables).best_move(board)
}

/// Heuristic value and game score of `board`.
#[inline]
pub fn evaluate(tables: &Tables, board: Board) -> Evaluation { expectimax::evaluate(tables, board) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_functions_delegate() {
        let tables = initialize_tables();
        let board = Board::from_raw(0x0000_0000_0000_0011);
        assert_eq!(apply_move(&tables, Move::Left, board), Board::from_raw(0x2));
        assert_eq!(best_move(&tables, board), Expectimax::new(&tables).best_move(board));
        assert_eq!(evaluate(&tables, board), expectimax::evaluate(&tables, board));
    }
}
