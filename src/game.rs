//! Game state: board, rising rows, group search, group clear and column gravity.

use log::{debug, info};
use rand::Rng;
use rand::rngs::StdRng;
use std::collections::{HashSet, VecDeque};
use thiserror::Error;

pub const DEFAULT_ROWS: usize = 10;
pub const DEFAULT_COLS: usize = 8;
pub const DEFAULT_PALETTE_SIZE: u8 = 5;
pub const DEFAULT_CLEAR_THRESHOLD: usize = 2;

/// Up, down, left, right. Diagonals never connect.
const NEIGHBOURS_4: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Single cell: either empty or a tile of a given colour index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Tile(u8),
}

impl Cell {
    #[inline]
    pub fn color(self) -> Option<u8> {
        match self {
            Self::Empty => None,
            Self::Tile(c) => Some(c),
        }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self == Self::Empty
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("board needs at least one row")]
    ZeroRows,
    #[error("board needs at least one column")]
    ZeroCols,
    #[error("palette needs at least one colour")]
    ZeroPalette,
    #[error("clear threshold must be at least 1")]
    ZeroThreshold,
}

/// Engine options fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub rows: usize,
    pub cols: usize,
    pub palette_size: u8,
    /// Minimum group size a click needs to clear anything.
    pub clear_threshold: usize,
}

impl EngineConfig {
    pub fn new(
        rows: usize,
        cols: usize,
        palette_size: u8,
        clear_threshold: usize,
    ) -> Result<Self, ConfigError> {
        if rows == 0 {
            return Err(ConfigError::ZeroRows);
        }
        if cols == 0 {
            return Err(ConfigError::ZeroCols);
        }
        if palette_size == 0 {
            return Err(ConfigError::ZeroPalette);
        }
        if clear_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        Ok(Self {
            rows,
            cols,
            palette_size,
            clear_threshold,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            palette_size: DEFAULT_PALETTE_SIZE,
            clear_threshold: DEFAULT_CLEAR_THRESHOLD,
        }
    }
}

/// Board: grid of cells. Row 0 is the top; rows are stored [0..height].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    width: usize,
    height: usize,
    /// rows[r][c] = cell. rows[0] is top.
    rows: VecDeque<Vec<Cell>>,
}

impl Board {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            width: cols,
            height: rows,
            rows: (0..rows).map(|_| vec![Cell::Empty; cols]).collect(),
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    #[inline]
    fn set(&mut self, row: usize, col: usize, cell: Cell) {
        if let Some(slot) = self.rows.get_mut(row).and_then(|r| r.get_mut(col)) {
            *slot = cell;
        }
    }

    pub fn is_row_empty(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .is_none_or(|r| r.iter().all(|c| c.is_empty()))
    }

    /// Number of non-empty cells.
    pub fn tile_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|r| r.iter())
            .filter(|c| !c.is_empty())
            .count()
    }

    /// Drop the top row and append `bottom` as the new bottom row.
    fn push_bottom(&mut self, bottom: Vec<Cell>) {
        self.rows.pop_front();
        self.rows.push_back(bottom);
    }

    /// Maximal 4-connected group of same-coloured tiles containing (row, col).
    /// Empty when the cell is out of bounds or empty.
    pub fn find_group(&self, row: usize, col: usize) -> Vec<(usize, usize)> {
        let color = match self.get(row, col) {
            Some(Cell::Tile(c)) => c,
            _ => return Vec::new(),
        };
        let mut group = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![(row, col)];
        visited.insert((row, col));

        while let Some((r, c)) = stack.pop() {
            group.push((r, c));
            for (dr, dc) in NEIGHBOURS_4 {
                let (Some(nr), Some(nc)) = (r.checked_add_signed(dr), c.checked_add_signed(dc))
                else {
                    continue;
                };
                if self.get(nr, nc) == Some(Cell::Tile(color)) && visited.insert((nr, nc)) {
                    stack.push((nr, nc));
                }
            }
        }
        group
    }

    /// Compact every column downward, keeping the top-to-bottom order of its tiles.
    fn apply_gravity(&mut self) {
        for col in 0..self.width {
            let tiles: Vec<Cell> = self
                .rows
                .iter()
                .map(|r| r[col])
                .filter(|c| !c.is_empty())
                .collect();
            let gap = self.height - tiles.len();
            for (row, line) in self.rows.iter_mut().enumerate() {
                line[col] = if row < gap {
                    Cell::Empty
                } else {
                    tiles[row - gap]
                };
            }
        }
    }
}

/// Result of [`GameSession::inject_row`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectOutcome {
    /// Board shifted up and a new bottom row was drawn.
    Injected,
    /// Top row was occupied; nothing moved and the session is now over.
    GameOver,
    /// Session was already over.
    Ignored,
}

/// A successful group clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cleared {
    /// Group cells, in coordinates from before gravity ran.
    pub cells: Vec<(usize, usize)>,
    pub points: u32,
}

/// Game state: board, score, high score and the colour source for new rows.
#[derive(Debug)]
pub struct GameSession {
    config: EngineConfig,
    board: Board,
    score: u32,
    high_score: u32,
    over: bool,
    rng: StdRng,
}

impl GameSession {
    pub fn new(config: EngineConfig, rng: StdRng) -> Self {
        Self {
            board: Board::new(config.rows, config.cols),
            config,
            score: 0,
            high_score: 0,
            over: false,
            rng,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn high_score(&self) -> u32 {
        self.high_score
    }

    pub fn is_over(&self) -> bool {
        self.over
    }

    /// Restore a persisted high score. Never lowers the current value.
    pub fn set_high_score(&mut self, high_score: u32) {
        self.high_score = self.high_score.max(high_score);
    }

    /// Push a new random row in from below.
    ///
    /// Overflow is checked on row 0 before anything moves, so tiles never
    /// leave through the top.
    pub fn inject_row(&mut self) -> InjectOutcome {
        if self.over {
            return InjectOutcome::Ignored;
        }
        if !self.board.is_row_empty(0) {
            self.over = true;
            info!("game over: top row occupied, final score {}", self.score);
            return InjectOutcome::GameOver;
        }
        let palette = self.config.palette_size;
        let bottom = (0..self.config.cols)
            .map(|_| Cell::Tile(self.rng.gen_range(0..palette)))
            .collect();
        self.board.push_bottom(bottom);
        debug!("row injected, {} tiles on board", self.board.tile_count());
        InjectOutcome::Injected
    }

    /// Group the click at (row, col) would clear, if the session is still active.
    pub fn find_group(&self, row: usize, col: usize) -> Vec<(usize, usize)> {
        if self.over {
            return Vec::new();
        }
        self.board.find_group(row, col)
    }

    /// Clear the group at (row, col), apply gravity and score size².
    ///
    /// Out-of-bounds coordinates, empty cells, groups below the clear
    /// threshold and clicks after game over all return `None` and change
    /// nothing.
    pub fn clear_group(&mut self, row: usize, col: usize) -> Option<Cleared> {
        let group = self.find_group(row, col);
        if group.is_empty() || group.len() < self.config.clear_threshold {
            return None;
        }
        for &(r, c) in &group {
            self.board.set(r, c, Cell::Empty);
        }
        self.board.apply_gravity();

        let size = group.len() as u32;
        let points = size.saturating_mul(size);
        self.score = self.score.saturating_add(points);
        if self.score > self.high_score {
            self.high_score = self.score;
        }
        debug!(
            "cleared {} tiles at ({row}, {col}) for {points}, score {}",
            group.len(),
            self.score
        );
        Some(Cleared {
            cells: group,
            points,
        })
    }

    /// Back to an empty board and zero score. The high score is kept.
    pub fn reset(&mut self) {
        self.board = Board::new(self.config.rows, self.config.cols);
        self.score = 0;
        self.over = false;
        info!("session reset, high score {}", self.high_score);
    }
}

#[cfg(test)]
impl Board {
    /// Build a board from text rows: `.` is empty, a digit is a tile colour.
    pub(crate) fn from_text(lines: &[&str]) -> Self {
        let height = lines.len();
        let width = lines.first().map_or(0, |l| l.len());
        let rows = lines
            .iter()
            .map(|line| {
                line.chars()
                    .map(|ch| match ch.to_digit(10) {
                        Some(d) => Cell::Tile(d as u8),
                        None => Cell::Empty,
                    })
                    .collect()
            })
            .collect();
        Self {
            width,
            height,
            rows,
        }
    }
}

#[cfg(test)]
impl GameSession {
    pub(crate) fn with_board(board: Board, palette_size: u8, clear_threshold: usize) -> Self {
        let config = EngineConfig {
            rows: board.rows(),
            cols: board.cols(),
            palette_size,
            clear_threshold,
        };
        let mut session = Self::new(config, rand::SeedableRng::seed_from_u64(7));
        session.board = board;
        session
    }
}
