//! Drag-to-move with snap on release.
//!
//! A [`DragController`] belongs to one placement.  It turns the pointer
//! phases routed to [`GestureTarget::Drag`](crate::traits::GestureTarget)
//! into live bounds updates and, on release, either a click or a snapped
//! grid position:
//!
//! ```text
//! Idle --press--> Pressed --move > threshold--> Dragging
//!   ^                |                             |
//!   +-- release -----+ (click)        release -----+ (snap + commit)
//! ```
//!
//! Pointer coordinates are root coordinates in physical pixels.  Deltas
//! are divided by the scaling factor captured at press, so the element
//! follows the pointer even on a scaled display.  Host failures (usually
//! the element being destroyed mid-gesture) reset the controller to idle.

use crate::element::{ElementHandle, ElementKind};
use crate::grid::{GridSystem, GridUnit, PixelRect};
use crate::traits::{HostError, PointerPhase, ScalingProvider, SurfaceHost};
use log::{debug, info};

/// Default travel, in logical pixels, that turns a press into a drag.
pub const DRAG_THRESHOLD: f64 = 3.0;

/// Where a drag gesture currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    /// Pressed, not yet past the threshold.
    Pressed,
    Dragging,
}

/// Result of feeding one pointer event to a [`DragController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragOutcome {
    /// Nothing to commit (press, move, or an event with no gesture).
    Pending,
    /// Released without moving past the threshold.
    Clicked { activated: bool },
    /// Released after a drag; the element now sits on this cell.
    Moved(GridUnit),
    /// The host failed; the gesture was dropped.
    Aborted,
}

/// Bookkeeping for one press → release sequence.
#[derive(Debug, Clone, Copy)]
struct DragGesture {
    /// Pointer at press, root coordinates.
    pointer: (f64, f64),
    /// Element's logical position at press.
    origin: (f64, f64),
    /// Scaling captured at press, used for every move.
    scaling: f64,
    moved: bool,
}

/// Drag state machine for one element.
#[derive(Debug, Clone)]
pub struct DragController {
    element: ElementHandle,
    kind: ElementKind,
    grid: GridSystem,
    threshold: f64,
    gesture: Option<DragGesture>,
}

impl DragController {
    pub fn new(element: ElementHandle, kind: ElementKind, grid: GridSystem, threshold: f64) -> Self {
        Self {
            element,
            kind,
            grid,
            threshold,
            gesture: None,
        }
    }

    pub fn element(&self) -> ElementHandle {
        self.element
    }

    pub fn phase(&self) -> DragPhase {
        match self.gesture {
            None => DragPhase::Idle,
            Some(g) if g.moved => DragPhase::Dragging,
            Some(_) => DragPhase::Pressed,
        }
    }

    /// Feed one pointer event.
    pub fn handle<H, S>(&mut self, host: &mut H, scaling: &S, phase: PointerPhase, x: f64, y: f64) -> DragOutcome
    where
        H: SurfaceHost,
        S: ScalingProvider,
    {
        let result = match phase {
            PointerPhase::Press => self.press(host, scaling, x, y).map(|_| DragOutcome::Pending),
            PointerPhase::Move => self.motion(host, scaling, x, y).map(|_| DragOutcome::Pending),
            PointerPhase::Release => self.release(host, scaling, x, y),
        };
        result.unwrap_or_else(|e| {
            debug!("drag on {} dropped: {}", self.element, e);
            self.gesture = None;
            DragOutcome::Aborted
        })
    }

    fn press<H: SurfaceHost, S: ScalingProvider>(
        &mut self,
        host: &mut H,
        scaling: &S,
        x: f64,
        y: f64,
    ) -> Result<(), HostError> {
        // A press during a pending gesture starts over.
        self.gesture = None;
        let s = scaling.scaling_or_default();
        let rect = host.bounds(self.element)?.unscaled(s);
        host.raise_to_top(self.element)?;
        self.gesture = Some(DragGesture {
            pointer: (x, y),
            origin: (rect.x, rect.y),
            scaling: s,
            moved: false,
        });
        debug!("drag press on {} at ({}, {}), scaling {}", self.element, x, y, s);
        Ok(())
    }

    fn motion<H: SurfaceHost, S: ScalingProvider>(
        &mut self,
        host: &mut H,
        scaling: &S,
        x: f64,
        y: f64,
    ) -> Result<(), HostError> {
        let Some(gesture) = self.gesture.as_mut() else {
            return Ok(());
        };
        let dx = (x - gesture.pointer.0) / gesture.scaling;
        let dy = (y - gesture.pointer.1) / gesture.scaling;
        if dx.abs() > self.threshold || dy.abs() > self.threshold {
            gesture.moved = true;
        }
        let (ox, oy) = gesture.origin;

        // Size belongs to the resize; read it at the current factor.
        let current = host.bounds(self.element)?.unscaled(scaling.scaling_or_default());
        host.set_bounds(self.element, PixelRect::new(ox + dx, oy + dy, current.w, current.h))
    }

    fn release<H: SurfaceHost, S: ScalingProvider>(
        &mut self,
        host: &mut H,
        scaling: &S,
        x: f64,
        y: f64,
    ) -> Result<DragOutcome, HostError> {
        if self.gesture.is_none() {
            return Ok(DragOutcome::Pending);
        }
        self.motion(host, scaling, x, y)?;
        let Some(gesture) = self.gesture.take() else {
            return Ok(DragOutcome::Pending);
        };

        if !gesture.moved {
            let current = host.bounds(self.element)?.unscaled(scaling.scaling_or_default());
            let (ox, oy) = gesture.origin;
            host.set_bounds(self.element, PixelRect::new(ox, oy, current.w, current.h))?;
            let activated = self.kind.supports_activation();
            if activated {
                host.activate(self.element)?;
            }
            debug!("click on {} (activated: {})", self.element, activated);
            return Ok(DragOutcome::Clicked { activated });
        }

        let s = scaling.scaling_or_default();
        let live = host.bounds(self.element)?.unscaled(s);
        let cell = self.grid.to_grid((live.x, live.y));
        let snapped = self.grid.unit_to_pixels(cell);
        host.set_bounds(
            self.element,
            PixelRect::new(snapped.x as f64, snapped.y as f64, live.w, live.h),
        )?;
        info!("{} snapped to grid ({}, {})", self.element, cell.col, cell.row);
        Ok(DragOutcome::Moved(cell))
    }
}
