//! Drag-to-resize through a corner handle.
//!
//! Works like [`DragController`](crate::drag::DragController) but changes
//! the size instead of the position, never lets the element shrink below
//! one grid unit, and has no click branch.  Its gesture state is its own:
//! a resize never reads or writes the element's drag state.

use crate::element::ElementHandle;
use crate::grid::{GridExtent, GridSystem, PixelRect};
use crate::traits::{HostError, PointerPhase, ScalingProvider, SurfaceHost};
use log::{debug, info};

/// Result of feeding one pointer event to a [`ResizeController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    Pending,
    /// Released; the element now spans this extent.
    Resized(GridExtent),
    Aborted,
}

#[derive(Debug, Clone, Copy)]
struct ResizeGesture {
    pointer: (f64, f64),
    /// Logical size at press.
    size: (f64, f64),
    scaling: f64,
}

/// Resize state machine for one element and its handle.
#[derive(Debug, Clone)]
pub struct ResizeController {
    element: ElementHandle,
    handle: ElementHandle,
    grid: GridSystem,
    gesture: Option<ResizeGesture>,
}

impl ResizeController {
    pub fn new(element: ElementHandle, handle: ElementHandle, grid: GridSystem) -> Self {
        Self {
            element,
            handle,
            grid,
            gesture: None,
        }
    }

    pub fn element(&self) -> ElementHandle {
        self.element
    }

    /// The corner handle the gesture is bound on.
    pub fn handle_element(&self) -> ElementHandle {
        self.handle
    }

    pub fn is_active(&self) -> bool {
        self.gesture.is_some()
    }

    /// Feed one pointer event.
    pub fn handle<H, S>(&mut self, host: &mut H, scaling: &S, phase: PointerPhase, x: f64, y: f64) -> ResizeOutcome
    where
        H: SurfaceHost,
        S: ScalingProvider,
    {
        let result = match phase {
            PointerPhase::Press => self.press(host, scaling, x, y).map(|_| ResizeOutcome::Pending),
            PointerPhase::Move => self.motion(host, scaling, x, y).map(|_| ResizeOutcome::Pending),
            PointerPhase::Release => self.release(host, scaling, x, y),
        };
        result.unwrap_or_else(|e| {
            debug!("resize on {} dropped: {}", self.element, e);
            self.gesture = None;
            ResizeOutcome::Aborted
        })
    }

    fn press<H: SurfaceHost, S: ScalingProvider>(
        &mut self,
        host: &mut H,
        scaling: &S,
        x: f64,
        y: f64,
    ) -> Result<(), HostError> {
        self.gesture = None;
        let s = scaling.scaling_or_default();
        let rect = host.bounds(self.element)?.unscaled(s);
        host.raise_to_top(self.element)?;
        self.gesture = Some(ResizeGesture {
            pointer: (x, y),
            size: (rect.w, rect.h),
            scaling: s,
        });
        debug!("resize press on {} at ({}, {})", self.element, x, y);
        Ok(())
    }

    fn motion<H: SurfaceHost, S: ScalingProvider>(
        &mut self,
        host: &mut H,
        scaling: &S,
        x: f64,
        y: f64,
    ) -> Result<(), HostError> {
        let Some(gesture) = self.gesture else {
            return Ok(());
        };
        let min = self.grid.gtp() as f64;
        let w = (gesture.size.0 + (x - gesture.pointer.0) / gesture.scaling).max(min);
        let h = (gesture.size.1 + (y - gesture.pointer.1) / gesture.scaling).max(min);

        // Position belongs to the drag; read it at the current factor.
        let current = host.bounds(self.element)?.unscaled(scaling.scaling_or_default());
        host.set_bounds(self.element, PixelRect::new(current.x, current.y, w, h))
    }

    fn release<H: SurfaceHost, S: ScalingProvider>(
        &mut self,
        host: &mut H,
        scaling: &S,
        x: f64,
        y: f64,
    ) -> Result<ResizeOutcome, HostError> {
        if self.gesture.is_none() {
            return Ok(ResizeOutcome::Pending);
        }
        self.motion(host, scaling, x, y)?;
        self.gesture = None;

        let s = scaling.scaling_or_default();
        let live = host.bounds(self.element)?.unscaled(s);
        let extent = self.grid.to_grid_extent((live.w, live.h));
        let size = self.grid.extent_to_pixels(extent);
        host.set_bounds(
            self.element,
            PixelRect::new(live.x, live.y, size.w as f64, size.h as f64),
        )?;
        info!("{} resized to {}x{} cells", self.element, extent.cols, extent.rows);
        Ok(ResizeOutcome::Resized(extent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::headless::HeadlessHost;
    use crate::drag::{DragController, DragOutcome, DRAG_THRESHOLD};
    use crate::element::{ElementKind, PlaceOptions};
    use crate::grid::GridUnit;
    use crate::traits::{FixedScaling, HandleSpec};

    fn grid() -> GridSystem {
        GridSystem::new(50).unwrap()
    }

    fn setup(pos: GridUnit, size: GridExtent) -> (HeadlessHost, ResizeController) {
        let mut host = HeadlessHost::new();
        let rect = grid().placement_rect(pos, size);
        let e = host
            .create_element(ElementKind::Frame, rect, &PlaceOptions::default())
            .unwrap();
        let h = host.attach_resize_handle(e, HandleSpec::default()).unwrap();
        (host, ResizeController::new(e, h, grid()))
    }

    fn ext(cols: u32, rows: u32) -> GridExtent {
        GridExtent::new(cols, rows).unwrap()
    }

    #[test]
    fn grows_and_snaps() {
        let (mut host, mut ctl) = setup(GridUnit::new(1, 1), ext(2, 1));
        let s = FixedScaling(1.0);
        let e = ctl.element();
        ctl.handle(&mut host, &s, PointerPhase::Press, 140.0, 90.0);
        ctl.handle(&mut host, &s, PointerPhase::Move, 170.0, 100.0);
        assert_eq!(host.logical_rect(e), Some(PixelRect::new(50.0, 50.0, 130.0, 60.0)));

        let out = ctl.handle(&mut host, &s, PointerPhase::Release, 215.0, 120.0);
        // 175 x 80 logical rounds to 4 x 2 (3.5 ties to even).
        assert_eq!(out, ResizeOutcome::Resized(ext(4, 2)));
        assert_eq!(host.logical_rect(e), Some(PixelRect::new(50.0, 50.0, 200.0, 100.0)));
        assert!(!ctl.is_active());
    }

    #[test]
    fn never_shrinks_below_one_cell() {
        let (mut host, mut ctl) = setup(GridUnit::new(0, 0), ext(2, 2));
        let s = FixedScaling(1.0);
        let e = ctl.element();
        ctl.handle(&mut host, &s, PointerPhase::Press, 100.0, 100.0);
        ctl.handle(&mut host, &s, PointerPhase::Move, -300.0, -300.0);
        assert_eq!(host.logical_rect(e).map(|r| (r.w, r.h)), Some((50.0, 50.0)));
        let out = ctl.handle(&mut host, &s, PointerPhase::Release, -300.0, -300.0);
        assert_eq!(out, ResizeOutcome::Resized(ext(1, 1)));
    }

    #[test]
    fn handle_stays_anchored() {
        let (mut host, mut ctl) = setup(GridUnit::new(0, 0), ext(2, 2));
        let s = FixedScaling(1.0);
        let h = ctl.handle_element();
        ctl.handle(&mut host, &s, PointerPhase::Press, 90.0, 90.0);
        ctl.handle(&mut host, &s, PointerPhase::Release, 140.0, 90.0);
        assert_eq!(host.logical_rect(h), Some(PixelRect::new(134.0, 84.0, 14.0, 14.0)));
    }

    #[test]
    fn scaled_display() {
        let (mut host, mut ctl) = setup(GridUnit::new(1, 1), ext(1, 1));
        let scaling = host.scaling();
        scaling.set(1.5);
        ctl.handle(&mut host, &scaling, PointerPhase::Press, 150.0, 150.0);
        // 150 physical = 100 logical of growth.
        let out = ctl.handle(&mut host, &scaling, PointerPhase::Release, 300.0, 150.0);
        assert_eq!(out, ResizeOutcome::Resized(ext(3, 1)));
        assert_eq!(host.logical_rect(ctl.element()).map(|r| (r.w, r.h)), Some((150.0, 50.0)));
    }

    #[test]
    fn stale_element_aborts() {
        let (mut host, mut ctl) = setup(GridUnit::new(0, 0), ext(1, 1));
        let s = FixedScaling(1.0);
        ctl.handle(&mut host, &s, PointerPhase::Press, 0.0, 0.0);
        host.destroy(ctl.element()).unwrap();
        assert_eq!(ctl.handle(&mut host, &s, PointerPhase::Release, 90.0, 90.0), ResizeOutcome::Aborted);
        assert!(!ctl.is_active());
    }

    #[test]
    fn independent_from_drag() {
        let (mut host, mut resize) = setup(GridUnit::new(1, 1), ext(2, 1));
        let e = resize.element();
        let mut drag = DragController::new(e, ElementKind::Frame, grid(), DRAG_THRESHOLD);
        let s = FixedScaling(1.0);

        drag.handle(&mut host, &s, PointerPhase::Press, 60.0, 60.0);
        resize.handle(&mut host, &s, PointerPhase::Press, 140.0, 90.0);
        resize.handle(&mut host, &s, PointerPhase::Move, 190.0, 90.0);
        drag.handle(&mut host, &s, PointerPhase::Move, 110.0, 60.0);
        assert_eq!(host.logical_rect(e), Some(PixelRect::new(100.0, 50.0, 150.0, 50.0)));

        assert_eq!(
            resize.handle(&mut host, &s, PointerPhase::Release, 190.0, 90.0),
            ResizeOutcome::Resized(ext(3, 1))
        );
        assert_eq!(
            drag.handle(&mut host, &s, PointerPhase::Release, 110.0, 60.0),
            DragOutcome::Moved(GridUnit::new(2, 1))
        );
        assert_eq!(host.logical_rect(e), Some(PixelRect::new(100.0, 50.0, 150.0, 50.0)));
    }

    #[test]
    fn scaling_change_mid_resize_keeps_position() {
        let (mut host, mut ctl) = setup(GridUnit::new(1, 1), ext(2, 2));
        let scaling = host.scaling();
        let e = ctl.element();
        ctl.handle(&mut host, &scaling, PointerPhase::Press, 140.0, 140.0);
        scaling.set(2.0);
        ctl.handle(&mut host, &scaling, PointerPhase::Move, 190.0, 140.0);
        ctl.handle(&mut host, &scaling, PointerPhase::Move, 190.0, 140.0);
        assert_eq!(host.logical_rect(e), Some(PixelRect::new(50.0, 50.0, 150.0, 100.0)));

        let out = ctl.handle(&mut host, &scaling, PointerPhase::Release, 190.0, 140.0);
        assert_eq!(out, ResizeOutcome::Resized(ext(3, 2)));
        assert_eq!(host.logical_rect(e), Some(PixelRect::new(50.0, 50.0, 150.0, 100.0)));
    }
}
