//! Application configuration.
//!
//! The configuration is loaded from a JSON file whose path is passed on the
//! command line (`--config <path>`).  Every section is optional: a minimal
//! `{}` file is valid and all sections fall back to their compiled-in
//! defaults.  Unknown keys are ignored.
//!
//! # Example
//!
//! ```json
//! {
//!   "title": "Reactor panel",
//!   "grid": { "cols": 12, "rows": 8, "gtp": 50 },
//!   "theme": "light",
//!   "overlay": {
//!     "show_grid": true,
//!     "line_color": "#4d4d4d",
//!     "show_labels": true,
//!     "draw_delay_ms": 150,
//!     "extent": { "cols": 12, "rows": 8 }
//!   },
//!   "gestures": { "drag_threshold": 3.0, "handle_size": 14 }
//! }
//! ```

use crate::grid::{GridError, GridExtent, GridSystem};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Window title handed to the host.
    pub title: String,
    /// Grid dimensions and grid-to-pixel factor.
    pub grid: GridConfig,
    /// Colour theme; decides the default overlay background.
    pub theme: Theme,
    /// Debug overlay appearance and timing.
    pub overlay: OverlayConfig,
    /// Drag and resize tuning.
    pub gestures: GestureConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title: "gridsnap".into(),
            grid: GridConfig::default(),
            theme: Theme::default(),
            overlay: OverlayConfig::default(),
            gestures: GestureConfig::default(),
        }
    }
}

/// Window size in grid cells and the pixel size of one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub cols: u32,
    pub rows: u32,
    /// Grid-to-pixel factor.  Must be positive.
    pub gtp: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cols: 10,
            rows: 10,
            gtp: 50,
        }
    }
}

impl GridConfig {
    pub fn grid_system(&self) -> Result<GridSystem, GridError> {
        GridSystem::new(self.gtp)
    }

    pub fn extent(&self) -> Result<GridExtent, GridError> {
        GridExtent::new(self.cols, self.rows)
    }
}

/// Appearance theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    /// Overlay background used when none is configured.
    pub fn default_background(&self) -> &'static str {
        match self {
            Theme::Dark => "#242424",
            Theme::Light => "#ebebeb",
        }
    }
}

/// Debug overlay appearance and timing.
///
/// Durations are in **milliseconds**.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Draw the overlay when the workspace is created.
    pub show_grid: bool,
    /// Explicit background; `None` follows the theme.
    pub background: Option<String>,
    pub line_color: String,
    pub text_color: String,
    /// Draw `"x,y"` in every cell.
    pub show_labels: bool,
    /// Delay before the first draw, so the window geometry can settle.
    pub draw_delay_ms: u64,
    /// Delay between drawing and pushing the surface to the back.
    pub lower_delay_ms: u64,
    /// Grid drawn by the overlay; `None` uses the workspace grid.
    pub extent: Option<GridExtent>,
    /// Cell size drawn by the overlay; `None` uses the workspace factor.
    pub gtp: Option<u32>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            show_grid: false,
            background: None,
            line_color: "#4d4d4d".into(),
            text_color: "#7f7f7f".into(),
            show_labels: true,
            draw_delay_ms: 150,
            lower_delay_ms: 10,
            extent: None,
            gtp: None,
        }
    }
}

impl OverlayConfig {
    pub fn draw_delay(&self) -> Duration {
        Duration::from_millis(self.draw_delay_ms)
    }

    pub fn lower_delay(&self) -> Duration {
        Duration::from_millis(self.lower_delay_ms)
    }

    /// Resolve the overlay grid against the workspace's own, rejecting
    /// an empty extent, a zero factor or an oversized grid.
    pub fn grid_for(&self, extent: GridExtent, gtp: u32) -> Result<(GridExtent, GridSystem), ConfigError> {
        let extent = self.extent.unwrap_or(extent);
        let extent = GridExtent::new(extent.cols, extent.rows)?;
        check_dimensions(extent.cols, extent.rows)?;
        let grid = GridSystem::new(self.gtp.unwrap_or(gtp))?;
        Ok((extent, grid))
    }
}

/// Largest number of cells allowed along one axis.
pub const MAX_GRID_CELLS: u32 = 10_000;

fn check_dimensions(cols: u32, rows: u32) -> Result<(), ConfigError> {
    if cols > MAX_GRID_CELLS || rows > MAX_GRID_CELLS {
        return Err(ConfigError(format!(
            "grid of {}x{} cells exceeds {} per axis",
            cols, rows, MAX_GRID_CELLS
        )));
    }
    Ok(())
}

/// Drag and resize tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Logical pixels the pointer must travel on one axis before a press
    /// counts as a drag rather than a click.  Default: `3.0`.
    pub drag_threshold: f64,
    /// Side of the resize handle, logical pixels.  Default: `14`.
    pub handle_size: u32,
    /// Distance of the handle from the bottom-right corner.  Default: `2`.
    pub handle_inset: u32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            drag_threshold: 3.0,
            handle_size: 14,
            handle_inset: 2,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file at `path` and validate it.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no workspace can be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let grid = self.grid.grid_system()?;
        let extent = self.grid.extent()?;
        check_dimensions(extent.cols, extent.rows)?;
        self.overlay.grid_for(extent, grid.gtp())?;
        let t = self.gestures.drag_threshold;
        if !t.is_finite() || t < 0.0 {
            return Err(ConfigError(format!("drag_threshold must be >= 0, got {}", t)));
        }
        if self.gestures.handle_size == 0 {
            return Err(ConfigError("handle_size must be positive".into()));
        }
        Ok(())
    }
}

/// Error from loading, parsing or validating a configuration.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

impl From<GridError> for ConfigError {
    fn from(e: GridError) -> Self {
        ConfigError(e.to_string())
    }
}
