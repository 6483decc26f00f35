use crate::engine::{Board, Rank};
use crate::tables::Tables;

const LOST_PENALTY: f64 = 200_000.0;
const MONOTONICITY_POWER: f64 = 4.0;
const MONOTONICITY_WEIGHT: f64 = 47.0;
const SUM_POWER: f64 = 3.5;
const SUM_WEIGHT: f64 = 11.0;
const MERGES_WEIGHT: f64 = 700.0;
const EMPTY_WEIGHT: f64 = 270.0;

/// Heuristic and actual game score of one board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Search heuristic over all rows and columns.
    pub heuristic: f64,
    /// Player-visible score implied by the tiles on the board.
    pub score: f64,
}

/// Evaluate `board` for display or logging.
pub fn evaluate(tables: &Tables, board: Board) -> Evaluation {
    Evaluation { heuristic: score_heur_board(tables, board), score: score_board(tables, board) }
}

/// Game score of a board: the sum of the score table over its four rows.
#[inline]
pub fn score_board(tables: &Tables, board: Board) -> f64 {
    (0..4).fold(0., |acc, row_idx| acc + tables.score_entry(board.row(row_idx)))
}

/// Heuristic value of a board: rows plus columns (via transpose).
#[inline]
pub fn score_heur_board(tables: &Tables, board: Board) -> f64 {
    let transposed = board.transpose();
    (0..4).fold(0., |acc, line_idx| {
        acc + tables.heur_entry(board.row(line_idx)) + tables.heur_entry(transposed.row(line_idx))
    })
}

// Credit to Nneonneo
/// Score contribution of one line: every tile of rank `r >= 2` was built by
/// `r - 1` merges, so it contributes `(r - 1) * 2^r`.
pub(crate) fn line_score(line: &[Rank; 4]) -> f64 {
    line.iter()
        .filter(|&&rank| rank >= 2)
        .map(|&rank| f64::from(rank - 1) * f64::from(1u32 << rank))
        .sum()
}

// Credit to Nneonneo for heuristic structure
pub(crate) fn line_heuristic(line: &[Rank; 4]) -> f64 {
    LOST_PENALTY + calc_empty(line) + calc_merges(line) - calc_monotonicity(line) - calc_sum(line)
}

fn calc_sum(line: &[Rank; 4]) -> f64 {
    line.iter().fold(0., |acc, &rank| acc + f64::from(rank).powf(SUM_POWER)) * SUM_WEIGHT
}

fn calc_empty(line: &[Rank; 4]) -> f64 {
    line.iter().filter(|&&rank| rank == 0).count() as f64 * EMPTY_WEIGHT
}

/// Runs of equal ranks, with empty cells skipped over: a run of `k + 1`
/// equal tiles scores `1 + k`.
fn calc_merges(line: &[Rank; 4]) -> f64 {
    let mut prev = 0;
    let mut counter = 0u32;
    let mut merges = 0u32;
    for &rank in line.iter().filter(|&&rank| rank != 0) {
        if prev == rank {
            counter += 1;
        } else if counter > 0 {
            merges += 1 + counter;
            counter = 0;
        }
        prev = rank;
    }
    if counter > 0 {
        merges += 1 + counter;
    }
    f64::from(merges) * MERGES_WEIGHT
}

fn calc_monotonicity(line: &[Rank; 4]) -> f64 {
    let mut monotonicity_left = 0.;
    let mut monotonicity_right = 0.;
    for pair in line.windows(2) {
        let tile1 = f64::from(pair[0]).powf(MONOTONICITY_POWER);
        let tile2 = f64::from(pair[1]).powf(MONOTONICITY_POWER);
        if pair[0] > pair[1] {
            monotonicity_left += tile1 - tile2;
        } else {
            monotonicity_right += tile2 - tile1;
        }
    }
    f64::min(monotonicity_left, monotonicity_right) * MONOTONICITY_WEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool { (a - b).abs() < 1e-6 }

    #[test]
    fn it_line_heuristic() {
        assert!(close(line_heuristic(&[0, 0, 0, 0]), 201_080.));
        assert!(close(line_heuristic(&[1, 1, 0, 0]), 201_918.));
        let sum = 1. + 2f64.powf(3.5) + 3f64.powf(3.5) + 4f64.powf(3.5);
        assert!(close(line_heuristic(&[1, 2, 3, 4]), 200_000. - 11. * sum));
    }

    #[test]
    fn merges_skip_empty_cells() {
        assert_eq!(calc_merges(&[2, 0, 2, 0]), 2. * MERGES_WEIGHT);
        assert_eq!(calc_merges(&[1, 1, 1, 2]), 3. * MERGES_WEIGHT);
        assert_eq!(calc_merges(&[1, 1, 2, 2]), 4. * MERGES_WEIGHT);
        assert_eq!(calc_merges(&[1, 2, 1, 2]), 0.);
    }

    #[test]
    fn monotonicity_takes_smaller_direction() {
        // 3 -> 1 descends by 81 - 1, 1 -> 2 ascends by 16 - 1
        assert!(close(calc_monotonicity(&[3, 1, 2, 2]), 15. * MONOTONICITY_WEIGHT));
        assert_eq!(calc_monotonicity(&[4, 3, 2, 1]), 0.);
    }

    #[test]
    fn it_line_score() {
        assert_eq!(line_score(&[0, 0, 0, 0]), 0.);
        assert_eq!(line_score(&[1, 1, 1, 1]), 0.);
        assert_eq!(line_score(&[1, 1, 2, 3]), 20.);
        assert_eq!(line_score(&[11, 0, 0, 0]), 10. * 2048.);
    }

    #[test]
    fn board_scores_use_rows_and_columns() {
        let tables = Tables::new();
        let b = Board::from_ranks([1, 1, 2, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(score_board(&tables, b), 20.);

        let expected: f64 = (0..4)
            .map(|i| tables.heur_entry(b.row(i)) + tables.heur_entry(b.transpose().row(i)))
            .sum();
        assert!(close(score_heur_board(&tables, b), expected));
        // the heuristic sees columns, so it is invariant under transpose
        assert!(close(score_heur_board(&tables, b), score_heur_board(&tables, b.transpose())));

        let eval = evaluate(&tables, b);
        assert_eq!(eval.score, 20.);
        assert!(close(eval.heuristic, expected));
    }

    #[test]
    fn merge_score_delta() {
        let tables = Tables::new();
        for rank in 1..15u8 {
            let before = Board::from_ranks([rank, rank, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
            let after = tables.execute_move(crate::engine::Move::Left, before);
            let delta = score_board(&tables, after) - score_board(&tables, before);
            // a merge scores the value of the tile it creates
            assert_eq!(delta, f64::from(1u32 << (rank + 1)));
        }
    }
}
