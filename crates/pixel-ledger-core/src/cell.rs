//! Grid cells and their owner-visible attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;
use crate::AccountId;

/// Highest intensity a cell may carry.
pub const MAX_INTENSITY: u8 = 30;

/// Flat position of a cell in the grid (`row * width + col`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellIndex(u32);

impl CellIndex {
    /// Wrap a raw index. Bounds are checked by [`crate::GridConfig`].
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The raw index.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Big-endian bytes, so lexicographic key order equals index order.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Inverse of [`CellIndex::to_be_bytes`].
    #[must_use]
    pub const fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Self(u32::from_be_bytes(bytes))
    }
}

impl fmt::Display for CellIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A 24-bit RGB color, written on the wire as `#rrggbb`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(u32);

impl Color {
    /// Color of a never-purchased cell.
    pub const DEFAULT: Self = Self(0);

    /// Build a color from its components.
    #[must_use]
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }
}

impl FromStr for Color {
    type Err = LedgerError;

    /// Accepts exactly `#` followed by six hex digits, either case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::InvalidInput(format!("color must match #rrggbb, got {s:?}"));

        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let rgb = u32::from_str_radix(hex, 16).map_err(|_| invalid())?;
        Ok(Self(rgb))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0)
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Color({self})")
    }
}

impl TryFrom<String> for Color {
    type Error = LedgerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Cosmetic intensity in `[0, 30]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Intensity(u8);

impl Intensity {
    /// Validate an intensity coming off the wire.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InvalidInput` if the value is outside `[0, 30]`.
    pub fn new(value: i64) -> Result<Self, LedgerError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= MAX_INTENSITY)
            .map(Self)
            .ok_or_else(|| {
                LedgerError::InvalidInput(format!(
                    "intensity must be between 0 and {MAX_INTENSITY}, got {value}"
                ))
            })
    }

    /// The raw value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Intensity {
    type Error = LedgerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(i64::from(value))
    }
}

impl From<Intensity> for u8 {
    fn from(intensity: Intensity) -> Self {
        intensity.0
    }
}

/// The stored state of a purchased cell.
///
/// Cells that have never been bought are not stored at all; readers treat a
/// missing cell as `purchase_count = 0` with default color and intensity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    /// Position in the grid.
    pub index: CellIndex,

    /// Color chosen by the most recent buyer.
    pub color: Color,

    /// Intensity chosen by the most recent buyer.
    pub intensity: Intensity,

    /// Number of successful purchases so far.
    pub purchase_count: u32,

    /// Account behind the most recent purchase.
    pub owner: AccountId,

    /// When the most recent purchase committed.
    pub updated_at: DateTime<Utc>,
}

impl Cell {
    /// Compact wire form used by window responses.
    #[must_use]
    pub const fn entry(&self) -> WindowEntry {
        WindowEntry(self.color, self.intensity, self.purchase_count)
    }
}

/// A single cell as shown to readers. Never-purchased cells report their
/// defaults with no owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellView {
    /// Position in the grid.
    pub index: CellIndex,
    /// Current color.
    pub color: Color,
    /// Current intensity.
    pub intensity: Intensity,
    /// Successful purchases so far.
    pub purchase_count: u32,
    /// Most recent buyer.
    pub owner: Option<AccountId>,
    /// Time of the most recent purchase.
    pub updated_at: Option<DateTime<Utc>>,
    /// Price of the next purchase; `None` once the cell is capped.
    pub next_price_cents: Option<i64>,
}

impl CellView {
    /// View of a cell that has never been bought.
    #[must_use]
    pub const fn unpurchased(index: CellIndex, next_price_cents: Option<i64>) -> Self {
        Self {
            index,
            color: Color::DEFAULT,
            intensity: Intensity(0),
            purchase_count: 0,
            owner: None,
            updated_at: None,
            next_price_cents,
        }
    }

    /// View of a stored cell.
    #[must_use]
    pub const fn of(cell: &Cell, next_price_cents: Option<i64>) -> Self {
        Self {
            index: cell.index,
            color: cell.color,
            intensity: cell.intensity,
            purchase_count: cell.purchase_count,
            owner: Some(cell.owner),
            updated_at: Some(cell.updated_at),
            next_price_cents,
        }
    }
}

/// One value of a window response, serialized as `[color, intensity, purchaseCount]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowEntry(pub Color, pub Intensity, pub u32);
