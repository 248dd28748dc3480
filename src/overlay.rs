//! Debug grid overlay.
//!
//! The overlay is a non-interactive surface kept behind every element,
//! showing dashed grid lines and optional `"x,y"` labels.  It is laid out
//! in **physical** pixels so that it stays aligned with elements placed in
//! logical pixels at any display scaling.
//!
//! Layout is a pure function, [`compose_scene`]; the
//! [`DebugOverlayRenderer`] owns the surface lifecycle:
//!
//! 1. [`schedule`](DebugOverlayRenderer::schedule) asks the host for a
//!    [`DeferredTask::DrawOverlay`] after a short delay, so the window has
//!    real geometry before it is measured.
//! 2. [`draw`](DebugOverlayRenderer::draw) destroys any previous surface,
//!    creates a fresh one, paints the scene and schedules a
//!    [`DeferredTask::LowerSurface`].
//! 3. [`lower`](DebugOverlayRenderer::lower) pushes the surface to the
//!    bottom of the stacking order once it exists.

use crate::config::{OverlayConfig, Theme};
use crate::element::ElementHandle;
use crate::grid::{GridError, GridExtent, GridSystem};
use crate::traits::{DeferredTask, HostError, ScalingProvider, SurfaceHost};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Dash pattern of grid lines: 2 px on, 4 px off.
pub const LINE_DASH: [f64; 2] = [2.0, 4.0];

/// Label font size at 100 % scaling.
const LABEL_FONT_SIZE: f64 = 8.0;

/// Label offset from the cell's top-left corner at 100 % scaling.
const LABEL_INSET: (f64, f64) = (4.0, 2.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    Vertical,
    Horizontal,
}

/// One dashed grid line, physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridLine {
    pub axis: Axis,
    pub from: (f64, f64),
    pub to: (f64, f64),
}

/// One coordinate label, anchored at its top-left corner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordLabel {
    pub col: u32,
    pub row: u32,
    pub text: String,
    pub x: f64,
    pub y: f64,
}

/// Everything a host needs to paint the overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayScene {
    pub width: f64,
    pub height: f64,
    pub background: String,
    pub line_color: String,
    pub text_color: String,
    pub dash: [f64; 2],
    pub font_size: u32,
    pub lines: Vec<GridLine>,
    pub labels: Vec<CoordLabel>,
}

impl OverlayScene {
    pub fn vertical_lines(&self) -> impl Iterator<Item = &GridLine> {
        self.lines.iter().filter(|l| l.axis == Axis::Vertical)
    }

    pub fn horizontal_lines(&self) -> impl Iterator<Item = &GridLine> {
        self.lines.iter().filter(|l| l.axis == Axis::Horizontal)
    }
}

/// Colours and switches for one overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    /// Explicit background; `None` follows the theme.
    pub background: Option<String>,
    pub line_color: String,
    pub text_color: String,
    pub show_labels: bool,
}

impl From<&OverlayConfig> for OverlayStyle {
    fn from(cfg: &OverlayConfig) -> Self {
        Self {
            background: cfg.background.clone(),
            line_color: cfg.line_color.clone(),
            text_color: cfg.text_color.clone(),
            show_labels: cfg.show_labels,
        }
    }
}

/// Number of lines needed along one axis.
///
/// The `+ 1` covers the closing line of the last cell; the grid-derived
/// minimum keeps the configured grid fully drawn even when the measured
/// surface is still smaller than it should be.
fn line_count(measured: f64, spacing: f64, cells: u32) -> u32 {
    let from_surface = if measured > 0.0 {
        ((measured / spacing).ceil() as u32).saturating_add(1)
    } else {
        1
    };
    from_surface.max(cells.saturating_add(1))
}

/// Lay out the overlay for `extent` at `scaling`.
///
/// `measured` is the surface size reported by the host, in physical
/// pixels; it may lag behind and be smaller than the grid.
pub fn compose_scene(
    grid: &GridSystem,
    extent: GridExtent,
    scaling: f64,
    measured: (f64, f64),
    style: &OverlayStyle,
    background: &str,
) -> OverlayScene {
    let spacing = grid.gtp() as f64 * scaling;
    let width = measured.0.max(extent.cols as f64 * spacing);
    let height = measured.1.max(extent.rows as f64 * spacing);

    let n_vertical = line_count(measured.0, spacing, extent.cols);
    let n_horizontal = line_count(measured.1, spacing, extent.rows);

    let mut lines = Vec::with_capacity((n_vertical + n_horizontal) as usize);
    for i in 0..n_vertical {
        let x = i as f64 * spacing;
        lines.push(GridLine {
            axis: Axis::Vertical,
            from: (x, 0.0),
            to: (x, height),
        });
    }
    for i in 0..n_horizontal {
        let y = i as f64 * spacing;
        lines.push(GridLine {
            axis: Axis::Horizontal,
            from: (0.0, y),
            to: (width, y),
        });
    }

    let mut labels = Vec::new();
    if style.show_labels {
        labels.reserve(extent.area() as usize);
        for col in 0..extent.cols {
            for row in 0..extent.rows {
                labels.push(CoordLabel {
                    col,
                    row,
                    text: format!("{},{}", col, row),
                    x: col as f64 * spacing + LABEL_INSET.0 * scaling,
                    y: row as f64 * spacing + LABEL_INSET.1 * scaling,
                });
            }
        }
    }

    OverlayScene {
        width,
        height,
        background: background.to_string(),
        line_color: style.line_color.clone(),
        text_color: style.text_color.clone(),
        dash: LINE_DASH,
        font_size: ((LABEL_FONT_SIZE * scaling).floor() as u32).max(1),
        lines,
        labels,
    }
}

/// Owns the overlay surface and redraws it on demand.
#[derive(Debug)]
pub struct DebugOverlayRenderer {
    grid: GridSystem,
    extent: GridExtent,
    style: OverlayStyle,
    theme: Theme,
    draw_delay: Duration,
    lower_delay: Duration,
    surface: Option<ElementHandle>,
}

impl DebugOverlayRenderer {
    /// Build a renderer for a `extent` grid at `gtp`.
    ///
    /// Fails on a zero factor or an empty extent.
    pub fn new(
        extent: GridExtent,
        gtp: u32,
        style: OverlayStyle,
        theme: Theme,
        draw_delay: Duration,
        lower_delay: Duration,
    ) -> Result<Self, GridError> {
        Ok(Self {
            grid: GridSystem::new(gtp)?,
            extent: GridExtent::new(extent.cols, extent.rows)?,
            style,
            theme,
            draw_delay,
            lower_delay,
            surface: None,
        })
    }

    pub fn extent(&self) -> GridExtent {
        self.extent
    }

    pub fn gtp(&self) -> u32 {
        self.grid.gtp()
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    /// The live surface, if one has been drawn.
    pub fn surface(&self) -> Option<ElementHandle> {
        self.surface
    }

    /// Background in effect: explicit colour, else the theme default.
    pub fn background(&self) -> &str {
        self.style
            .background
            .as_deref()
            .unwrap_or_else(|| self.theme.default_background())
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    /// Ask the host for a deferred draw.
    pub fn schedule<H: SurfaceHost>(&self, host: &mut H) {
        debug!("overlay draw scheduled in {}ms", self.draw_delay.as_millis());
        host.schedule_after(self.draw_delay, DeferredTask::DrawOverlay);
    }

    /// Redraw from a clean surface.  Failures are logged, never returned.
    pub fn draw<H: SurfaceHost, S: ScalingProvider>(&mut self, host: &mut H, scaling: &S) {
        let factor = scaling.scaling_or_default();
        if let Err(e) = self.try_draw(host, factor) {
            if e.is_stale() {
                debug!("overlay draw hit {}, skipping", e);
            } else {
                warn!("overlay draw failed: {}", e);
            }
        }
    }

    fn try_draw<H: SurfaceHost>(&mut self, host: &mut H, scaling: f64) -> Result<(), HostError> {
        if let Some(old) = self.surface.take() {
            if let Err(e) = host.destroy(old) {
                debug!("previous overlay surface already gone: {}", e);
            }
        }

        let size = self.grid.window_size(self.extent);
        let background = self.background().to_string();
        let surface = host.create_overlay_surface(size, &background)?;
        self.surface = Some(surface);

        let measured = host.surface_size(surface)?;
        let scene = compose_scene(
            &self.grid,
            self.extent,
            scaling,
            measured,
            &self.style,
            &background,
        );
        host.paint_overlay(surface, &scene)?;
        info!(
            "overlay drawn: {}x{} grid, {} lines, {} labels, scaling {}",
            self.extent.cols,
            self.extent.rows,
            scene.lines.len(),
            scene.labels.len(),
            scaling
        );

        host.schedule_after(self.lower_delay, DeferredTask::LowerSurface(surface));
        Ok(())
    }

    /// Push `surface` below everything else.  A surface replaced since the
    /// task was scheduled is ignored.
    pub fn lower<H: SurfaceHost>(&self, host: &mut H, surface: ElementHandle) {
        if self.surface != Some(surface) {
            debug!("overlay surface {} superseded, not lowering", surface);
            return;
        }
        if let Err(e) = host.lower_to_bottom(surface) {
            debug!("overlay lower skipped: {}", e);
        }
    }

    /// Destroy the surface, if any.
    pub fn teardown<H: SurfaceHost>(&mut self, host: &mut H) {
        if let Some(surface) = self.surface.take() {
            if let Err(e) = host.destroy(surface) {
                debug!("overlay surface already gone at teardown: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessHost;
    use crate::element::{ElementKind, PlaceOptions};
    use crate::grid::PixelRect;
    use crate::traits::FixedScaling;

    fn style(labels: bool) -> OverlayStyle {
        OverlayStyle {
            background: None,
            line_color: "#4d4d4d".into(),
            text_color: "#7f7f7f".into(),
            show_labels: labels,
        }
    }

    fn extent(cols: u32, rows: u32) -> GridExtent {
        GridExtent::new(cols, rows).unwrap()
    }

    #[test]
    fn coverage_for_12x8_at_any_scaling() {
        let grid = GridSystem::new(50).unwrap();
        for scaling in [0.75, 1.0, 1.25, 1.5, 2.0, 3.0] {
            for measured in [(0.0, 0.0), (600.0 * scaling, 400.0 * scaling), (123.0, 77.0)] {
                let scene = compose_scene(&grid, extent(12, 8), scaling, measured, &style(true), "#000");
                assert!(scene.vertical_lines().count() >= 13, "scaling {}", scaling);
                assert!(scene.horizontal_lines().count() >= 9, "scaling {}", scaling);
                assert_eq!(scene.labels.len(), 96);
            }
        }
    }

    #[test]
    fn labels_are_zero_based_x_comma_y() {
        let grid = GridSystem::new(50).unwrap();
        let scene = compose_scene(&grid, extent(12, 8), 1.0, (600.0, 400.0), &style(true), "#000");
        let mut texts: Vec<&str> = scene.labels.iter().map(|l| l.text.as_str()).collect();
        texts.sort();
        let mut expected: Vec<String> = Vec::new();
        for x in 0..12 {
            for y in 0..8 {
                expected.push(format!("{},{}", x, y));
            }
        }
        expected.sort();
        assert_eq!(texts, expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert!(!texts.contains(&"12,0"));
        assert!(!texts.contains(&"0,8"));
    }

    #[test]
    fn labels_scale_inset_and_font() {
        let grid = GridSystem::new(50).unwrap();
        let scene = compose_scene(&grid, extent(2, 2), 2.0, (200.0, 200.0), &style(true), "#000");
        let l = scene.labels.iter().find(|l| l.text == "1,1").unwrap();
        assert_eq!((l.x, l.y), (100.0 + 8.0, 100.0 + 4.0));
        assert_eq!(scene.font_size, 16);

        let scene = compose_scene(&grid, extent(2, 2), 1.25, (0.0, 0.0), &style(true), "#000");
        assert_eq!(scene.font_size, 10);
    }

    #[test]
    fn labels_can_be_disabled() {
        let grid = GridSystem::new(50).unwrap();
        let scene = compose_scene(&grid, extent(12, 8), 1.0, (600.0, 400.0), &style(false), "#000");
        assert!(scene.labels.is_empty());
        assert!(!scene.lines.is_empty());
    }

    #[test]
    fn line_spacing_is_physical() {
        let grid = GridSystem::new(50).unwrap();
        let scene = compose_scene(&grid, extent(4, 2), 1.5, (300.0, 150.0), &style(false), "#000");
        let xs: Vec<f64> = scene.vertical_lines().map(|l| l.from.0).collect();
        assert_eq!(xs, vec![0.0, 75.0, 150.0, 225.0, 300.0]);
        assert!(scene.lines.iter().all(|l| l.axis == Axis::Vertical || l.to.0 == 300.0));
        assert_eq!(scene.dash, [2.0, 4.0]);
    }

    #[test]
    fn larger_surface_gets_extra_lines() {
        let grid = GridSystem::new(50).unwrap();
        // Surface wider than the grid: ceil(610 / 50) + 1 = 14.
        let scene = compose_scene(&grid, extent(12, 8), 1.0, (610.0, 400.0), &style(false), "#000");
        assert_eq!(scene.vertical_lines().count(), 14);
        assert_eq!(scene.horizontal_lines().count(), 9);
    }

    #[test]
    fn renderer_rejects_bad_config() {
        let s = style(true);
        let d = Duration::ZERO;
        assert!(DebugOverlayRenderer::new(extent(4, 4), 0, s.clone(), Theme::Dark, d, d).is_err());
        let empty = GridExtent { cols: 0, rows: 4 };
        assert!(DebugOverlayRenderer::new(empty, 50, s, Theme::Dark, d, d).is_err());
    }

    fn renderer() -> DebugOverlayRenderer {
        DebugOverlayRenderer::new(
            extent(12, 8),
            50,
            style(true),
            Theme::Dark,
            Duration::from_millis(150),
            Duration::from_millis(10),
        )
        .unwrap()
    }

    #[test]
    fn background_follows_theme_unless_explicit() {
        let mut r = renderer();
        assert_eq!(r.background(), "#242424");
        r.set_theme(Theme::Light);
        assert_eq!(r.background(), "#ebebeb");
        r.style.background = Some("navy".into());
        assert_eq!(r.background(), "navy");
    }

    #[test]
    fn draw_replaces_surface_and_lowers_it_later() {
        let mut host = HeadlessHost::new();
        let scaling = FixedScaling(1.0);
        let button = host
            .create_element(ElementKind::Button, PixelRect::new(0.0, 0.0, 100.0, 50.0), &PlaceOptions::default())
            .unwrap();

        let mut r = renderer();
        r.draw(&mut host, &scaling);
        let first = r.surface().unwrap();
        assert_eq!(host.scene(first).unwrap().labels.len(), 96);

        r.draw(&mut host, &scaling);
        let second = r.surface().unwrap();
        assert_ne!(first, second);
        assert!(!host.contains(first));
        assert_eq!(host.overlay_surfaces(), vec![second]);
        // Freshly created surfaces sit on top until the lower task runs.
        assert_eq!(host.stack().last(), Some(&second));

        let tasks = host.advance(Duration::from_millis(10));
        assert_eq!(
            tasks,
            vec![DeferredTask::LowerSurface(first), DeferredTask::LowerSurface(second)]
        );
        for task in tasks {
            if let DeferredTask::LowerSurface(s) = task {
                r.lower(&mut host, s);
            }
        }
        assert_eq!(host.stack(), &[second, button]);
    }

    #[test]
    fn draw_uses_fallback_scaling() {
        let mut host = HeadlessHost::new();
        let scaling = host.scaling();
        scaling.set_failing(true);
        let mut r = renderer();
        r.draw(&mut host, &scaling);
        let scene = host.scene(r.surface().unwrap()).unwrap();
        assert_eq!(scene.font_size, 8);
        assert_eq!(scene.vertical_lines().nth(1).map(|l| l.from.0), Some(50.0));
    }

    #[test]
    fn schedule_defers_the_draw() {
        let mut host = HeadlessHost::new();
        let r = renderer();
        r.schedule(&mut host);
        assert!(host.advance(Duration::from_millis(149)).is_empty());
        assert_eq!(host.advance(Duration::from_millis(1)), vec![DeferredTask::DrawOverlay]);
    }

    #[test]
    fn line_count_saturates_on_huge_grids() {
        assert_eq!(line_count(0.0, 50.0, u32::MAX), u32::MAX);
        assert_eq!(line_count(f64::MAX, 1.0, 4), u32::MAX);
        assert_eq!(line_count(100.0, 50.0, 1), 3);
    }

    #[test]
    fn teardown_tolerates_a_surface_destroyed_elsewhere() {
        let mut host = HeadlessHost::new();
        let mut r = renderer();
        r.draw(&mut host, &FixedScaling(1.0));
        let surface = r.surface().unwrap();
        host.destroy(surface).unwrap();

        r.teardown(&mut host);
        assert_eq!(r.surface(), None);
        assert!(host.overlay_surfaces().is_empty());
        r.teardown(&mut host);
    }
}
