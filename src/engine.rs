use rand::Rng;
use std::fmt;
use std::str::FromStr;

/// A direction to move/merge tiles.
///
/// The discriminants are the stable move codes used by
/// [`crate::tables::Tables::execute_move_code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Move {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
}

impl Move {
    /// All directions in evaluation order.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];

    #[inline]
    pub fn index(self) -> usize { self as usize }

    /// Single-letter name (`U`, `D`, `L`, `R`).
    pub fn letter(self) -> char {
        match self {
            Move::Up => 'U',
            Move::Down => 'D',
            Move::Left => 'L',
            Move::Right => 'R',
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("invalid move code {0} (expected 0..=3)")]
pub struct InvalidMove(pub u8);

impl TryFrom<u8> for Move {
    type Error = InvalidMove;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Move::Up),
            1 => Ok(Move::Down),
            2 => Ok(Move::Left),
            3 => Ok(Move::Right),
            other => Err(InvalidMove(other)),
        }
    }
}

impl From<Move> for u8 {
    fn from(m: Move) -> Self { m as u8 }
}

/// Raw packed board encoding.
pub type BoardRaw = u64;
/// One row (or, after [`transpose`], one column): four 4-bit ranks.
pub type Line = u16;
/// Exponent of a tile; `0` is an empty cell, `r` is the tile `2^r`.
pub type Rank = u8;

pub(crate) const ROW_MASK: BoardRaw = 0xFFFF;
const NIBBLE_LSB_MASK: BoardRaw = 0x1111_1111_1111_1111;

/// Packed 4x4 2048 board as 16 4-bit ranks in a `u64`.
///
/// Row `i` occupies bits `16i..16i+16`; within a row, cell `k` (column `k`)
/// occupies bits `4k..4k+4`. Cell index `4i + k` is therefore the nibble at
/// bit `4 * (4i + k)`. The encoding is stable and safe to log or snapshot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Sentinel produced by the executor for an out-of-range move code.
    pub const INVALID: Board = Board(!0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub const fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// Consume this `Board`, returning the raw packed `u64`.
    #[inline]
    pub const fn into_raw(self) -> BoardRaw { self.0 }

    /// Borrow the raw packed `u64` for this `Board`.
    #[inline]
    pub const fn raw(&self) -> BoardRaw { self.0 }

    /// Build a board from 16 row-major ranks. Ranks above 15 are clamped.
    ///
    /// ```
    /// use solver_2048::engine::Board;
    /// let b = Board::from_ranks([1, 1, 2, 3, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    /// assert_eq!(b.raw(), 0x3211);
    /// ```
    pub fn from_ranks(ranks: [Rank; 16]) -> Self {
        let raw = ranks
            .iter()
            .enumerate()
            .fold(0, |acc, (idx, &rank)| acc | (BoardRaw::from(rank.min(15)) << (4 * idx)));
        Board(raw)
    }

    /// The 16 row-major ranks of this board.
    pub fn ranks(self) -> [Rank; 16] {
        let mut out = [0; 16];
        for (idx, slot) in out.iter_mut().enumerate() {
            *slot = self.rank(idx);
        }
        out
    }

    /// Rank stored at cell `idx` (0..16, row-major).
    #[inline]
    pub fn rank(self, idx: usize) -> Rank { ((self.0 >> (4 * idx)) & 0xf) as Rank }

    /// Row `idx` as a 16-bit line.
    #[inline]
    pub fn row(self, idx: usize) -> Line { extract_line(self.0, idx) }

    /// Swap rows and columns. Applying it twice yields the original board.
    #[inline]
    pub fn transpose(self) -> Self { Board(transpose(self.0)) }

    /// Count the number of empty cells.
    ///
    /// The board must hold at least one tile; an all-empty board overflows the
    /// nibble counter and reports 0.
    #[inline]
    pub fn count_empty(self) -> u32 { count_empty(self.0) }

    /// Count the number of occupied cells.
    #[inline]
    pub fn count_tiles(self) -> u32 { count_non_empty(self.0) }

    /// Number of distinct nonzero ranks present.
    #[inline]
    pub fn count_distinct_tiles(self) -> u32 { count_distinct_tiles(self.0) }

    /// Highest rank present (0 for the empty board).
    #[inline]
    pub fn max_rank(self) -> Rank { get_max_rank(self.0) }

    /// Return the highest tile value (e.g., 2048) present on the board.
    #[inline]
    pub fn highest_tile(self) -> u32 {
        match self.max_rank() {
            0 => 0,
            rank => 1 << rank,
        }
    }

    /// Insert a random 2 (90%) or 4 (10%) tile into a uniformly chosen empty cell.
    ///
    /// A board with no empty cell is returned unchanged.
    ///
    /// ```
    /// use solver_2048::engine::Board;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let b = Board::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// assert_eq!(b.count_tiles(), 2);
    /// ```
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        let open = 16 - count_non_empty(self.0);
        if open == 0 {
            return self;
        }
        let tile = draw_tile(rng);
        let index = rng.gen_range(0..open);
        insert_tile_at(self, tile, index)
    }

    /// A fresh starting position: one tile anywhere, then a second random tile.
    pub fn initial<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let first = draw_tile(rng) << (4 * rng.gen_range(0..16u32));
        Board(first).with_random_tile(rng)
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..4 {
            if row > 0 {
                writeln!(f, "-----------------------------------")?;
            }
            let cells: Vec<String> = (0..4).map(|col| format_rank(self.rank(4 * row + col))).collect();
            writeln!(f, "{}", cells.join("|"))?;
        }
        Ok(())
    }
}

impl From<BoardRaw> for Board { fn from(v: BoardRaw) -> Self { Board::from_raw(v) } }
impl From<Board> for BoardRaw { fn from(b: Board) -> Self { b.into_raw() } }

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardParseError {
    #[error("invalid hex board encoding: {0}")]
    Hex(#[from] std::num::ParseIntError),
    #[error("expected 16 cells, found {0}")]
    CellCount(usize),
    #[error("invalid tile value `{0}` (expected 0 or a power of two up to 32768)")]
    Tile(String),
}

impl FromStr for Board {
    type Err = BoardParseError;

    /// Parse either the raw encoding as `0x`-prefixed hex, or 16 tile values
    /// (row-major, `0` for empty) separated by commas and/or whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            return Ok(Board(BoardRaw::from_str_radix(hex, 16)?));
        }
        let cells: Vec<&str> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|cell| !cell.is_empty())
            .collect();
        if cells.len() != 16 {
            return Err(BoardParseError::CellCount(cells.len()));
        }
        let mut ranks = [0; 16];
        for (slot, cell) in ranks.iter_mut().zip(cells) {
            *slot = tile_to_rank(cell).ok_or_else(|| BoardParseError::Tile(cell.to_string()))?;
        }
        Ok(Board::from_ranks(ranks))
    }
}

fn tile_to_rank(cell: &str) -> Option<Rank> {
    let value: u32 = cell.parse().ok()?;
    match value {
        0 => Some(0),
        v if v.is_power_of_two() && (2..=1 << 15).contains(&v) => Some(v.trailing_zeros() as Rank),
        _ => None,
    }
}

// Credit to Nneonneo
/// Swap rows and columns with two masked nibble-block exchanges.
#[inline]
pub fn transpose(x: BoardRaw) -> BoardRaw {
    let a1 = x & 0xF0F00F0FF0F00F0F;
    let a2 = x & 0x0000F0F00000F0F0;
    let a3 = x & 0x0F0F00000F0F0000;
    let a = a1 | (a2 << 12) | (a3 >> 12);
    let b1 = a & 0xFF00FF0000FF00FF;
    let b2 = a & 0x00FF00FF00000000;
    let b3 = a & 0x00000000FF00FF00;
    b1 | (b2 >> 24) | (b3 << 24)
}

/// Row `line_idx` (0..4) of a packed board.
#[inline]
pub fn extract_line(board: BoardRaw, line_idx: usize) -> Line {
    ((board >> (16 * line_idx)) & ROW_MASK) as Line
}

// https://stackoverflow.com/questions/38225571/count-number-of-zero-nibbles-in-an-unsigned-64-bit-integer
/// Count the number of zero nibbles. Precondition: the board is not all-empty.
#[inline]
pub fn count_empty(board: BoardRaw) -> u32 {
    let mut x = board;
    x |= (x >> 2) & 0x3333_3333_3333_3333;
    x |= x >> 1;
    x = !x & NIBBLE_LSB_MASK;
    // Each nibble now holds 1 for an empty cell; fold the nibbles together.
    x += x >> 32;
    x += x >> 16;
    x += x >> 8;
    x += x >> 4;
    (x & 0xf) as u32
}

fn count_non_empty(board: BoardRaw) -> u32 {
    let mut x = board;
    x |= x >> 1;
    x |= x >> 2;
    x &= NIBBLE_LSB_MASK;
    x.count_ones()
}

// Credit to Nneonneo
/// Number of distinct nonzero ranks on the board.
pub fn count_distinct_tiles(board: BoardRaw) -> u32 {
    let mut bitset = 0u16;
    let mut x = board;
    while x != 0 {
        bitset |= 1 << (x & 0xf);
        x >>= 4;
    }
    // don't count empty tiles
    bitset >>= 1;
    bitset.count_ones()
}

/// Highest rank present on the board.
pub fn get_max_rank(board: BoardRaw) -> Rank {
    let mut max_rank = 0;
    let mut x = board;
    while x != 0 {
        max_rank = max_rank.max((x & 0xf) as Rank);
        x >>= 4;
    }
    max_rank
}

/// Rank of a freshly spawned tile: 1 (a "2") with probability 0.9, else 2.
pub(crate) fn draw_tile<R: Rng + ?Sized>(rng: &mut R) -> BoardRaw {
    if rng.gen_range(0..10) < 9 { 1 } else { 2 }
}

/// Place `tile` into the `index`-th empty cell (counting from cell 0).
fn insert_tile_at(board: Board, mut tile: BoardRaw, mut index: u32) -> Board {
    let mut tmp = board.0;
    loop {
        while (tmp & 0xf) != 0 {
            tmp >>= 4;
            tile <<= 4;
        }
        if index == 0 { break; }
        index -= 1;
        tmp >>= 4;
        tile <<= 4;
    }
    Board(board.0 | tile)
}

fn format_rank(rank: Rank) -> String {
    match rank {
        0 => format!("{:^8}", ""),
        r => format!("{:^8}", 1u32 << r),
    }
}
