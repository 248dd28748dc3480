//! Grid ⇄ pixel coordinate conversion.
//!
//! [`GridSystem`] holds a single immutable grid-to-pixel factor (`gtp`):
//! the pixel size of one grid cell at 100 % scaling.  Everything placed
//! through a [`Workspace`](crate::workspace::Workspace) goes through it.
//!
//! Two rounding rules coexist on purpose:
//!
//! * grid → pixel **truncates** fractional grid input toward zero, so
//!   `[1.9, 2.1]` lands on cell `(1, 2)`;
//! * pixel → grid **rounds** to the nearest cell, because it is used to
//!   snap a freely dragged position, not to re-derive an exact placement.

use serde::{Deserialize, Serialize};

/// Configuration error raised while building grid types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// The grid-to-pixel factor was zero.
    #[error("grid-to-pixel factor must be positive")]
    ZeroFactor,
    /// A grid extent had a zero (or negative) dimension.
    #[error("grid extent must be positive, got {cols}x{rows}")]
    EmptyExtent { cols: i64, rows: i64 },
    /// A grid position whose pixel offset does not fit in an `i64`.
    #[error("grid position ({col}, {row}) is out of pixel range")]
    OutOfRange { col: i64, row: i64 },
}

/// A cell origin `(col, row)` in grid units.
///
/// Negative values are allowed and map to negative pixel offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridUnit {
    pub col: i64,
    pub row: i64,
}

impl GridUnit {
    pub fn new(col: i64, row: i64) -> Self {
        Self { col, row }
    }

    /// Truncate fractional grid input toward zero.
    pub fn truncate((col, row): (f64, f64)) -> Self {
        Self {
            col: col.trunc() as i64,
            row: row.trunc() as i64,
        }
    }
}

/// A size `(cols, rows)` in grid units.  Both dimensions are at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridExtent {
    pub cols: u32,
    pub rows: u32,
}

impl GridExtent {
    /// Build an extent, rejecting zero dimensions.
    pub fn new(cols: u32, rows: u32) -> Result<Self, GridError> {
        if cols == 0 || rows == 0 {
            return Err(GridError::EmptyExtent {
                cols: cols as i64,
                rows: rows as i64,
            });
        }
        Ok(Self { cols, rows })
    }

    /// Truncate fractional grid input toward zero, then validate.
    pub fn truncate((cols, rows): (f64, f64)) -> Result<Self, GridError> {
        let (c, r) = (cols.trunc() as i64, rows.trunc() as i64);
        if c <= 0 || r <= 0 {
            return Err(GridError::EmptyExtent { cols: c, rows: r });
        }
        Self::new(
            u32::try_from(c).unwrap_or(u32::MAX),
            u32::try_from(r).unwrap_or(u32::MAX),
        )
    }

    /// Number of cells covered.
    pub fn area(&self) -> u64 {
        self.cols as u64 * self.rows as u64
    }
}

/// Integer pixel position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: i64,
    pub y: i64,
}

/// Integer pixel size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PixelExtent {
    pub w: i64,
    pub h: i64,
}

/// A rectangle in pixels, as exchanged with the host toolkit.
///
/// Mid-gesture bounds can be fractional, so the components are `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl PixelRect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Build a rect from an integer origin and size.
    pub fn from_parts(origin: PixelPoint, size: PixelExtent) -> Self {
        Self {
            x: origin.x as f64,
            y: origin.y as f64,
            w: size.w as f64,
            h: size.h as f64,
        }
    }

    /// Divide every component by `factor` (physical → logical).
    pub fn unscaled(&self, factor: f64) -> Self {
        Self {
            x: self.x / factor,
            y: self.y / factor,
            w: self.w / factor,
            h: self.h / factor,
        }
    }
}

/// Converts between grid units and pixels for a fixed factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSystem {
    gtp: u32,
}

impl GridSystem {
    /// Create a grid system.  A `gtp` of zero is a configuration error.
    pub fn new(gtp: u32) -> Result<Self, GridError> {
        if gtp == 0 {
            return Err(GridError::ZeroFactor);
        }
        Ok(Self { gtp })
    }

    /// Pixels per grid unit at 100 % scaling.
    pub fn gtp(&self) -> u32 {
        self.gtp
    }

    /// Grid position → pixel offset.  Fractional input is truncated.
    pub fn to_pixels(&self, pos: (f64, f64)) -> PixelPoint {
        let unit = GridUnit::truncate(pos);
        self.unit_to_pixels(unit)
    }

    /// Exact grid cell → pixel offset, saturating at the `i64` range.
    pub fn unit_to_pixels(&self, unit: GridUnit) -> PixelPoint {
        let gtp = self.gtp as i64;
        PixelPoint {
            x: unit.col.saturating_mul(gtp),
            y: unit.row.saturating_mul(gtp),
        }
    }

    /// Like [`unit_to_pixels`](Self::unit_to_pixels), but a position
    /// whose offset would overflow is an error.
    pub fn checked_unit_to_pixels(&self, unit: GridUnit) -> Result<PixelPoint, GridError> {
        let gtp = self.gtp as i64;
        match (unit.col.checked_mul(gtp), unit.row.checked_mul(gtp)) {
            (Some(x), Some(y)) => Ok(PixelPoint { x, y }),
            _ => Err(GridError::OutOfRange {
                col: unit.col,
                row: unit.row,
            }),
        }
    }

    /// Grid dimensions → pixel size.  Fractional input is truncated.
    pub fn dim_to_pixels(&self, dim: (f64, f64)) -> PixelExtent {
        let gtp = self.gtp as i64;
        PixelExtent {
            w: (dim.0.trunc() as i64).saturating_mul(gtp),
            h: (dim.1.trunc() as i64).saturating_mul(gtp),
        }
    }

    /// Exact grid extent → pixel size.
    pub fn extent_to_pixels(&self, extent: GridExtent) -> PixelExtent {
        self.dim_to_pixels((extent.cols as f64, extent.rows as f64))
    }

    /// Pixel offset → nearest grid cell, independently per axis.
    ///
    /// Halfway values round to the even cell.
    pub fn to_grid(&self, px: (f64, f64)) -> GridUnit {
        let gtp = self.gtp as f64;
        GridUnit {
            col: (px.0 / gtp).round_ties_even() as i64,
            row: (px.1 / gtp).round_ties_even() as i64,
        }
    }

    /// Pixel size → nearest grid extent, never below one cell per axis.
    pub fn to_grid_extent(&self, size: (f64, f64)) -> GridExtent {
        let gtp = self.gtp as f64;
        let snap = |v: f64| -> u32 {
            let cells = (v / gtp).round_ties_even();
            if cells.is_finite() && cells >= 1.0 {
                cells.min(u32::MAX as f64) as u32
            } else {
                1
            }
        };
        GridExtent {
            cols: snap(size.0),
            rows: snap(size.1),
        }
    }

    /// Pixel size of a window spanning `extent`.
    pub fn window_size(&self, extent: GridExtent) -> PixelExtent {
        self.extent_to_pixels(extent)
    }

    /// Logical rect of a placement.
    pub fn placement_rect(&self, pos: GridUnit, size: GridExtent) -> PixelRect {
        PixelRect::from_parts(self.unit_to_pixels(pos), self.extent_to_pixels(size))
    }

    /// Logical rect of a placement, rejecting positions out of pixel range.
    pub fn checked_placement_rect(&self, pos: GridUnit, size: GridExtent) -> Result<PixelRect, GridError> {
        let origin = self.checked_unit_to_pixels(pos)?;
        Ok(PixelRect::from_parts(origin, self.extent_to_pixels(size)))
    }
}

//  Tests
