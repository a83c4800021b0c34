//! Grid geometry and window bounds.

use serde::{Deserialize, Serialize};

use crate::cell::CellIndex;
use crate::error::{LedgerError, Result};

/// Default grid width.
pub const DEFAULT_GRID_WIDTH: u32 = 1_000;

/// Default grid height.
pub const DEFAULT_GRID_HEIGHT: u32 = 1_000;

/// Largest number of indices a single window request may span.
pub const DEFAULT_MAX_WINDOW: u32 = 20_000;

/// Dimensions of the grid and the window cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Columns per row.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
    /// Maximum `end - start` of a window request.
    pub max_window: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_GRID_WIDTH,
            height: DEFAULT_GRID_HEIGHT,
            max_window: DEFAULT_MAX_WINDOW,
        }
    }
}

impl GridConfig {
    /// Build a grid configuration.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidInput` for an empty grid, a grid with more
    /// than `u32::MAX` cells, or a zero window cap.
    pub fn new(width: u32, height: u32, max_window: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(LedgerError::InvalidInput("grid must have at least one cell".into()));
        }
        if width.checked_mul(height).is_none() {
            return Err(LedgerError::InvalidInput(format!(
                "grid of {width}x{height} cells is too large"
            )));
        }
        if max_window == 0 {
            return Err(LedgerError::InvalidInput("max window must be positive".into()));
        }
        Ok(Self {
            width,
            height,
            max_window,
        })
    }

    /// Total number of cells, `N`.
    #[must_use]
    pub const fn cell_count(&self) -> u32 {
        self.width.saturating_mul(self.height)
    }

    /// Flat index of `(row, col)`, or `None` when outside the grid.
    #[must_use]
    pub const fn index_of(&self, row: u32, col: u32) -> Option<CellIndex> {
        if row >= self.height || col >= self.width {
            return None;
        }
        Some(CellIndex::new(row * self.width + col))
    }

    /// Check a caller-supplied index against `[0, N)`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidInput` if the index is negative or past the
    /// last cell.
    pub fn cell(&self, index: i64) -> Result<CellIndex> {
        u32::try_from(index)
            .ok()
            .filter(|i| *i < self.cell_count())
            .map(CellIndex::new)
            .ok_or_else(|| {
                LedgerError::InvalidInput(format!(
                    "cell index must be in [0, {}), got {index}",
                    self.cell_count()
                ))
            })
    }

    /// Check a caller-supplied half-open window `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidRange` unless `0 <= start < end <= N` and
    /// `end - start <= max_window`.
    pub fn window(&self, start: i64, end: i64) -> Result<WindowRange> {
        if start < 0 {
            return Err(LedgerError::InvalidRange(format!(
                "start must not be negative, got {start}"
            )));
        }
        if end <= start {
            return Err(LedgerError::InvalidRange(format!(
                "end ({end}) must be greater than start ({start})"
            )));
        }
        if end - start > i64::from(self.max_window) {
            return Err(LedgerError::InvalidRange(format!(
                "window spans {} cells, maximum is {}",
                end - start,
                self.max_window
            )));
        }
        if end > i64::from(self.cell_count()) {
            return Err(LedgerError::InvalidRange(format!(
                "end ({end}) is past the last cell ({})",
                self.cell_count()
            )));
        }

        // Both bounds are now within [0, cell_count], which fits in u32.
        let start = u32::try_from(start).map_err(|e| LedgerError::InvalidRange(e.to_string()))?;
        let end = u32::try_from(end).map_err(|e| LedgerError::InvalidRange(e.to_string()))?;
        Ok(WindowRange { start, end })
    }
}

/// A validated half-open range of cell indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRange {
    start: u32,
    end: u32,
}

impl WindowRange {
    /// First index in the window.
    #[must_use]
    pub const fn start(&self) -> CellIndex {
        CellIndex::new(self.start)
    }

    /// First index past the window.
    #[must_use]
    pub const fn end(&self) -> CellIndex {
        CellIndex::new(self.end)
    }

    /// Whether `index` falls inside the window.
    #[must_use]
    pub const fn contains(&self, index: CellIndex) -> bool {
        index.get() >= self.start && index.get() < self.end
    }
}
