//! Client-side sparse view of the grid.
//!
//! A view is filled from window reads and then kept current from the
//! caller's own purchase receipts, so a successful purchase never needs a
//! re-fetch. Cells the view has not seen read as unpurchased.

use std::collections::BTreeMap;

use pixel_ledger_core::{
    CellIndex, Color, GridConfig, Intensity, PriceEngine, PurchaseReceipt, WindowEntry,
    WindowRange,
};

use crate::error::ClientError;
use crate::types::{GridInfo, Window};

/// Locally cached purchased cells.
#[derive(Debug, Clone)]
pub struct SparseView {
    grid: GridConfig,
    pricing: PriceEngine,
    cells: BTreeMap<CellIndex, WindowEntry>,
}

impl SparseView {
    /// Create an empty view for a grid.
    #[must_use]
    pub const fn new(grid: GridConfig, pricing: PriceEngine) -> Self {
        Self {
            grid,
            pricing,
            cells: BTreeMap::new(),
        }
    }

    /// Create an empty view from the service's grid description.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Configuration` if the description is not a
    /// usable grid.
    pub fn from_grid_info(info: &GridInfo) -> Result<Self, ClientError> {
        let grid = GridConfig::new(info.width, info.height, info.max_window)
            .map_err(|e| ClientError::Configuration(e.to_string()))?;
        let pricing = PriceEngine::new(info.base_price_cents).ok_or_else(|| {
            ClientError::Configuration(format!(
                "base price must be positive, got {}",
                info.base_price_cents
            ))
        })?;

        Ok(Self::new(grid, pricing))
    }

    /// The grid this view covers.
    #[must_use]
    pub const fn grid(&self) -> &GridConfig {
        &self.grid
    }

    /// Replace everything known about `range` with a fresh window read of
    /// it. Entries of `window` outside `range` are ignored.
    pub fn apply_window(&mut self, range: &WindowRange, window: &Window) {
        self.cells.retain(|index, _| !range.contains(*index));
        self.cells.extend(
            window
                .iter()
                .filter(|(index, _)| range.contains(**index))
                .map(|(index, entry)| (*index, *entry)),
        );
    }

    /// Record a committed purchase.
    ///
    /// Returns `false` and leaves the view alone when it already holds a
    /// newer state of the cell.
    pub fn apply_receipt(&mut self, receipt: &PurchaseReceipt) -> bool {
        let current = self.purchase_count(receipt.cell_index);
        if receipt.purchase_count_after <= current {
            tracing::debug!(
                cell = %receipt.cell_index,
                known = current,
                receipt = receipt.purchase_count_after,
                "Ignoring stale purchase receipt"
            );
            return false;
        }

        self.cells.insert(
            receipt.cell_index,
            WindowEntry(
                receipt.color,
                receipt.intensity,
                receipt.purchase_count_after,
            ),
        );
        true
    }

    /// Current state of a cell; unpurchased cells report the defaults.
    #[must_use]
    pub fn get(&self, index: CellIndex) -> WindowEntry {
        self.cells
            .get(&index)
            .copied()
            .unwrap_or(WindowEntry(Color::DEFAULT, Intensity::default(), 0))
    }

    /// Current state of the cell at `(row, col)`, or `None` off the grid.
    #[must_use]
    pub fn cell_at(&self, row: u32, col: u32) -> Option<WindowEntry> {
        self.grid.index_of(row, col).map(|index| self.get(index))
    }

    /// Known purchase count of a cell.
    #[must_use]
    pub fn purchase_count(&self, index: CellIndex) -> u32 {
        self.cells.get(&index).map_or(0, |entry| entry.2)
    }

    /// Expected price of the next purchase of a cell, `None` once capped.
    ///
    /// This is a prediction from local state; the service re-prices every
    /// purchase when it commits.
    #[must_use]
    pub fn next_price(&self, index: CellIndex) -> Option<i64> {
        self.pricing.price(self.purchase_count(index))
    }

    /// Purchased cells in `[start, end)`, in index order. An inverted range
    /// is empty.
    pub fn range(
        &self,
        start: u32,
        end: u32,
    ) -> impl Iterator<Item = (CellIndex, WindowEntry)> + '_ {
        self.cells
            .range(CellIndex::new(start)..CellIndex::new(end.max(start)))
            .map(|(index, entry)| (*index, *entry))
    }

    /// Number of purchased cells in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the view knows of no purchased cell.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
