//! Precomputed per-line lookup tables and the table-driven move executor.
//!
//! A row or column of the board is a 16-bit [`Line`], so every transition and
//! every per-line score can be computed once for all 65,536 lines. Move
//! tables store XOR deltas (`line ^ moved_line`): applying a move is four
//! lookups and four XORs, and a zero delta means the line did not change.
//!
//! The vertical tables hold deltas already spread back into column layout
//! (one nibble per 16-bit row slot), so they are indexed by a row of the
//! transposed board but XORed into the untransposed one.

use std::time::Instant;

use rand::Rng;

use crate::engine::{transpose, Board, BoardRaw, Line, Move, Rank, ROW_MASK};
use crate::expectimax::heuristic::{line_heuristic, line_score};

const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines
const COL_MASK: BoardRaw = 0x000F_000F_000F_000F;

/// Immutable bundle of every lookup table the engine needs.
///
/// Build it once with [`Tables::new`] and share it by reference; it is
/// `Sync`, so parallel searches may read it concurrently.
pub struct Tables {
    row_left: Box<[Line]>,
    row_right: Box<[Line]>,
    col_up: Box<[BoardRaw]>,
    col_down: Box<[BoardRaw]>,
    heur_score: Box<[f64]>,
    score: Box<[f64]>,
}

impl Tables {
    /// Build all move, heuristic and score tables.
    ///
    /// Calling this again rebuilds identical tables.
    pub fn new() -> Self {
        let start = Instant::now();
        // Allocate on the heap to avoid large stack frames
        let mut row_left = vec![0 as Line; LINE_TABLE_SIZE];
        let mut row_right = vec![0 as Line; LINE_TABLE_SIZE];
        let mut col_up = vec![0 as BoardRaw; LINE_TABLE_SIZE];
        let mut col_down = vec![0 as BoardRaw; LINE_TABLE_SIZE];
        let mut heur_score = vec![0f64; LINE_TABLE_SIZE];
        let mut score = vec![0f64; LINE_TABLE_SIZE];

        for val in 0..LINE_TABLE_SIZE {
            let row = val as Line;
            let ranks = line_to_ranks(row);
            score[val] = line_score(&ranks);
            heur_score[val] = line_heuristic(&ranks);

            let result = ranks_to_line(slide_left(ranks));
            let rev_result = reverse_line(result);
            let rev_row = reverse_line(row);

            row_left[row as usize] = row ^ result;
            row_right[rev_row as usize] = rev_row ^ rev_result;
            col_up[row as usize] = unpack_col(row) ^ unpack_col(result);
            col_down[rev_row as usize] = unpack_col(rev_row) ^ unpack_col(rev_result);
        }

        tracing::debug!(elapsed_ms = start.elapsed().as_millis() as u64, "built lookup tables");

        Tables {
            row_left: row_left.into_boxed_slice(),
            row_right: row_right.into_boxed_slice(),
            col_up: col_up.into_boxed_slice(),
            col_down: col_down.into_boxed_slice(),
            heur_score: heur_score.into_boxed_slice(),
            score: score.into_boxed_slice(),
        }
    }

    /// Slide/merge tiles in `direction`. No randomness.
    ///
    /// Returns `board` itself when nothing moves; compare against the input to
    /// detect an illegal move.
    ///
    /// ```
    /// use solver_2048::engine::{Board, Move};
    /// use solver_2048::tables::Tables;
    /// let tables = Tables::new();
    /// // ranks [1, 1, 2, 3] in row 0
    /// let b = Board::from_raw(0x3211);
    /// assert_eq!(tables.execute_move(Move::Left, b), Board::from_raw(0x0322));
    /// ```
    #[inline]
    pub fn execute_move(&self, direction: Move, board: Board) -> Board {
        let raw = board.raw();
        let moved = match direction {
            Move::Up => shift_cols(&self.col_up, raw),
            Move::Down => shift_cols(&self.col_down, raw),
            Move::Left => shift_rows(&self.row_left, raw),
            Move::Right => shift_rows(&self.row_right, raw),
        };
        Board::from_raw(moved)
    }

    /// Executor keyed by a raw move code (0 = up, 1 = down, 2 = left, 3 = right).
    ///
    /// Any other code yields [`Board::INVALID`] (all ones).
    pub fn execute_move_code(&self, code: u8, board: Board) -> Board {
        match Move::try_from(code) {
            Ok(direction) => self.execute_move(direction, board),
            Err(_) => Board::INVALID,
        }
    }

    /// Perform a move, then insert a random tile if the move changed the board.
    ///
    /// ```
    /// use solver_2048::engine::{Board, Move};
    /// use solver_2048::tables::Tables;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let tables = Tables::new();
    /// let mut rng = StdRng::seed_from_u64(1);
    /// let b = Board::from_raw(0x0011);
    /// let next = tables.make_move(Move::Left, b, &mut rng);
    /// assert_eq!(next.count_tiles(), 2);
    /// ```
    pub fn make_move<R: Rng + ?Sized>(&self, direction: Move, board: Board, rng: &mut R) -> Board {
        let moved = self.execute_move(direction, board);
        if moved != board { moved.with_random_tile(rng) } else { board }
    }

    /// True if no move in any direction changes the board.
    pub fn is_game_over(&self, board: Board) -> bool {
        Move::ALL.iter().all(|&direction| self.execute_move(direction, board) == board)
    }

    #[inline(always)]
    pub(crate) fn heur_entry(&self, line: Line) -> f64 {
        // Line is 16 bits wide, every index is in range.
        self.heur_score[line as usize]
    }

    #[inline(always)]
    pub(crate) fn score_entry(&self, line: Line) -> f64 {
        self.score[line as usize]
    }
}

impl Default for Tables {
    fn default() -> Self { Self::new() }
}

#[inline(always)]
fn shift_rows(table: &[Line], board: BoardRaw) -> BoardRaw {
    (0..4).fold(board, |acc, row_idx| {
        let row = (board >> (16 * row_idx)) & ROW_MASK;
        acc ^ (BoardRaw::from(table[row as usize]) << (16 * row_idx))
    })
}

#[inline(always)]
fn shift_cols(table: &[BoardRaw], board: BoardRaw) -> BoardRaw {
    let t = transpose(board);
    (0..4).fold(board, |acc, col_idx| {
        let col = (t >> (16 * col_idx)) & ROW_MASK;
        acc ^ (table[col as usize] << (4 * col_idx))
    })
}

pub(crate) fn line_to_ranks(line: Line) -> [Rank; 4] {
    [0, 4, 8, 12].map(|shift| ((line >> shift) & 0xf) as Rank)
}

pub(crate) fn ranks_to_line(ranks: [Rank; 4]) -> Line {
    ranks
        .iter()
        .enumerate()
        .fold(0, |line, (idx, &rank)| line | (Line::from(rank) << (4 * idx)))
}

/// Mirror a line so cell 0 becomes cell 3.
pub(crate) fn reverse_line(line: Line) -> Line {
    (line >> 12) | ((line >> 4) & 0x00F0) | ((line << 4) & 0x0F00) | (line << 12)
}

/// Spread the four nibbles of a line down one column of a board.
pub(crate) fn unpack_col(line: Line) -> BoardRaw {
    let tmp = BoardRaw::from(line);
    (tmp | (tmp << 12) | (tmp << 24) | (tmp << 36)) & COL_MASK
}

/// Apply the 2048 left-move rule to one line of ranks.
///
/// Empty cells collapse toward index 0 and equal neighbours merge once per
/// pass; a merged tile cannot merge again in the same move. Rank 15 does not
/// grow further: merging two 15s leaves a single 15.
pub(crate) fn slide_left(mut line: [Rank; 4]) -> [Rank; 4] {
    let mut i = 0;
    while i < 3 {
        let Some(j) = (i + 1..4).find(|&j| line[j] != 0) else { break };
        if line[i] == 0 {
            line[i] = line[j];
            line[j] = 0;
            // re-examine slot i with its new occupant
            continue;
        }
        if line[i] == line[j] {
            if line[i] != 0xf {
                line[i] += 1;
            }
            line[j] = 0;
        }
        i += 1;
    }
    line
}
