//! Core traits that decouple gridsnap from any specific UI toolkit.
//!
//! Every concrete backend (GTK4, the in-memory headless host, a test
//! double, …) implements [`SurfaceHost`] and, usually separately,
//! [`ScalingProvider`].  The [`Workspace`](crate::workspace::Workspace)
//! only depends on these abstractions.
//!
//! Pointer callbacks are not closures: a backend remembers the
//! [`GestureTarget`] it was given in [`SurfaceHost::bind_pointer`] and
//! hands it back inside a [`PointerEvent`] when the pointer acts on that
//! element.  Deferred callbacks work the same way with [`DeferredTask`].

use crate::element::{ElementHandle, ElementKind, PlaceOptions};
use crate::grid::{PixelExtent, PixelRect};
use crate::overlay::OverlayScene;
use crate::registry::PlacementId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

//  Events

/// Which gesture a pointer binding feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GestureTarget {
    /// Move the placement (bound on the element and all its descendants).
    Drag(PlacementId),
    /// Resize the placement (bound on its corner handle).
    Resize(PlacementId),
}

/// The three pointer phases of one gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointerPhase {
    Press,
    Move,
    Release,
}

/// A pointer event in root (screen) coordinates, routed to a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub target: GestureTarget,
    pub phase: PointerPhase,
    pub x: f64,
    pub y: f64,
}

impl PointerEvent {
    pub fn new(target: GestureTarget, phase: PointerPhase, x: f64, y: f64) -> Self {
        Self { target, phase, x, y }
    }
}

/// Work the core asks the host to run later on the UI thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeferredTask {
    /// (Re)draw the debug overlay.
    DrawOverlay,
    /// Push an overlay surface below every other element.
    LowerSurface(ElementHandle),
}

/// Everything a backend feeds back into the workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HostEvent {
    Pointer(PointerEvent),
    Deferred(DeferredTask),
    /// The text of an input element changed.
    InputChanged { element: ElementHandle, text: String },
}

//  Errors

/// Failure reported by a [`SurfaceHost`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The element was destroyed or never existed.
    #[error("stale element handle {0}")]
    StaleHandle(ElementHandle),
    /// Any other toolkit failure.
    #[error("host error: {0}")]
    Backend(String),
}

impl HostError {
    pub fn is_stale(&self) -> bool {
        matches!(self, HostError::StaleHandle(_))
    }
}

/// The scaling provider could not answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("scaling query failed: {0}")]
pub struct ScalingError(pub String);

//  Scaling

/// Reports the display scaling factor (physical pixels per logical pixel).
///
/// The answer may change between calls, e.g. when the window moves to
/// another monitor.
pub trait ScalingProvider {
    fn scaling_factor(&self) -> Result<f64, ScalingError>;

    /// The scaling factor, or `1.0` when the query fails or returns a
    /// non-positive or non-finite value.
    fn scaling_or_default(&self) -> f64 {
        match self.scaling_factor() {
            Ok(s) if s.is_finite() && s > 0.0 => s,
            Ok(s) => {
                log::warn!("ignoring invalid scaling factor {}, using 1.0", s);
                1.0
            }
            Err(e) => {
                log::debug!("{}, using 1.0", e);
                1.0
            }
        }
    }
}

/// A scaling provider that always answers the same value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedScaling(pub f64);

impl Default for FixedScaling {
    fn default() -> Self {
        Self(1.0)
    }
}

impl ScalingProvider for FixedScaling {
    fn scaling_factor(&self) -> Result<f64, ScalingError> {
        Ok(self.0)
    }
}

//  Surface host

/// Size and inset of the corner handle used for resizing, in logical
/// pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleSpec {
    pub size: u32,
    pub inset: u32,
}

impl Default for HandleSpec {
    fn default() -> Self {
        Self { size: 14, inset: 2 }
    }
}

/// Abstraction over the UI toolkit that owns the real elements.
///
/// # Units
///
/// [`bounds`](SurfaceHost::bounds) and
/// [`surface_size`](SurfaceHost::surface_size) report **physical** pixels.
/// Everything passed *to* the host ([`create_element`](SurfaceHost::create_element),
/// [`set_bounds`](SurfaceHost::set_bounds), overlay sizes) is in
/// **logical** pixels and the host applies its own scaling, except the
/// [`OverlayScene`], which is already laid out in physical pixels.
///
/// # Contract
///
/// * Every method that addresses a destroyed element returns
///   [`HostError::StaleHandle`].
/// * Nothing may block; all calls happen on the UI thread.
pub trait SurfaceHost {
    /// Create a control of `kind` at `rect`.
    fn create_element(
        &mut self,
        kind: ElementKind,
        rect: PixelRect,
        options: &PlaceOptions,
    ) -> Result<ElementHandle, HostError>;

    /// Destroy an element (and its descendants).
    fn destroy(&mut self, handle: ElementHandle) -> Result<(), HostError>;

    /// Current bounds, in physical pixels.
    fn bounds(&self, handle: ElementHandle) -> Result<PixelRect, HostError>;

    /// Move and resize, in logical pixels.
    fn set_bounds(&mut self, handle: ElementHandle, rect: PixelRect) -> Result<(), HostError>;

    /// Route press/move/release on `handle` to `target`.
    fn bind_pointer(&mut self, handle: ElementHandle, target: GestureTarget) -> Result<(), HostError>;

    /// Direct visual children of `handle`.
    fn children(&self, handle: ElementHandle) -> Result<Vec<ElementHandle>, HostError>;

    fn raise_to_top(&mut self, handle: ElementHandle) -> Result<(), HostError>;

    fn lower_to_bottom(&mut self, handle: ElementHandle) -> Result<(), HostError>;

    /// Fire the element's activation action (button click, checkbox toggle).
    fn activate(&mut self, handle: ElementHandle) -> Result<(), HostError>;

    /// Add a resize handle anchored at the bottom-right corner of `target`,
    /// `spec.inset` pixels inside it.  The host keeps it anchored when the
    /// target's bounds change.
    fn attach_resize_handle(
        &mut self,
        target: ElementHandle,
        spec: HandleSpec,
    ) -> Result<ElementHandle, HostError>;

    /// Run `task` once, `delay` from now, on the UI thread.
    fn schedule_after(&mut self, delay: Duration, task: DeferredTask);

    /// Create a non-interactive drawing surface covering the window.
    fn create_overlay_surface(
        &mut self,
        size: PixelExtent,
        background: &str,
    ) -> Result<ElementHandle, HostError>;

    /// Measured size of a surface, in physical pixels.  May lag behind
    /// (even be zero) until the surface is mapped.
    fn surface_size(&self, surface: ElementHandle) -> Result<(f64, f64), HostError>;

    /// Replace the contents of an overlay surface with `scene`.
    fn paint_overlay(&mut self, surface: ElementHandle, scene: &OverlayScene) -> Result<(), HostError>;

    /// Bind `target` on `root` and, recursively, on every descendant, so
    /// that a gesture anywhere inside a composite control behaves like a
    /// gesture on its root.
    fn attach_gesture_subtree(
        &mut self,
        root: ElementHandle,
        target: GestureTarget,
    ) -> Result<(), HostError> {
        let mut pending = vec![root];
        while let Some(handle) = pending.pop() {
            self.bind_pointer(handle, target)?;
            pending.extend(self.children(handle)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;

    //  Mock host: a fixed element tree, records bindings

    #[derive(Debug, Default)]
    struct TreeHost {
        tree: HashMap<ElementHandle, Vec<ElementHandle>>,
        bound: Vec<(ElementHandle, GestureTarget)>,
    }

    impl SurfaceHost for TreeHost {
        fn create_element(
            &mut self,
            _: ElementKind,
            _: PixelRect,
            _: &PlaceOptions,
        ) -> Result<ElementHandle, HostError> {
            Err(HostError::Backend("unsupported".into()))
        }
        fn destroy(&mut self, _: ElementHandle) -> Result<(), HostError> {
            Ok(())
        }
        fn bounds(&self, h: ElementHandle) -> Result<PixelRect, HostError> {
            Err(HostError::StaleHandle(h))
        }
        fn set_bounds(&mut self, h: ElementHandle, _: PixelRect) -> Result<(), HostError> {
            Err(HostError::StaleHandle(h))
        }
        fn bind_pointer(&mut self, h: ElementHandle, t: GestureTarget) -> Result<(), HostError> {
            if !self.tree.contains_key(&h) {
                return Err(HostError::StaleHandle(h));
            }
            self.bound.push((h, t));
            Ok(())
        }
        fn children(&self, h: ElementHandle) -> Result<Vec<ElementHandle>, HostError> {
            self.tree.get(&h).cloned().ok_or(HostError::StaleHandle(h))
        }
        fn raise_to_top(&mut self, _: ElementHandle) -> Result<(), HostError> {
            Ok(())
        }
        fn lower_to_bottom(&mut self, _: ElementHandle) -> Result<(), HostError> {
            Ok(())
        }
        fn activate(&mut self, _: ElementHandle) -> Result<(), HostError> {
            Ok(())
        }
        fn attach_resize_handle(
            &mut self,
            t: ElementHandle,
            _: HandleSpec,
        ) -> Result<ElementHandle, HostError> {
            Err(HostError::StaleHandle(t))
        }
        fn schedule_after(&mut self, _: Duration, _: DeferredTask) {}
        fn create_overlay_surface(
            &mut self,
            _: PixelExtent,
            _: &str,
        ) -> Result<ElementHandle, HostError> {
            Err(HostError::Backend("unsupported".into()))
        }
        fn surface_size(&self, s: ElementHandle) -> Result<(f64, f64), HostError> {
            Err(HostError::StaleHandle(s))
        }
        fn paint_overlay(&mut self, s: ElementHandle, _: &OverlayScene) -> Result<(), HostError> {
            Err(HostError::StaleHandle(s))
        }
    }

    fn h(n: u64) -> ElementHandle {
        ElementHandle(n)
    }

    #[test]
    fn subtree_binding_reaches_every_descendant() {
        let mut host = TreeHost::default();
        host.tree.insert(h(1), vec![h(2), h(3)]);
        host.tree.insert(h(2), vec![h(4)]);
        host.tree.insert(h(3), vec![]);
        host.tree.insert(h(4), vec![]);

        let target = GestureTarget::Drag(PlacementId(7));
        host.attach_gesture_subtree(h(1), target).unwrap();

        let mut bound: Vec<u64> = host.bound.iter().map(|(e, _)| e.0).collect();
        bound.sort();
        assert_eq!(bound, vec![1, 2, 3, 4]);
        assert!(host.bound.iter().all(|(_, t)| *t == target));
    }

    #[test]
    fn subtree_binding_on_stale_root_fails() {
        let mut host = TreeHost::default();
        let err = host
            .attach_gesture_subtree(h(9), GestureTarget::Drag(PlacementId(1)))
            .unwrap_err();
        assert!(err.is_stale());
    }

    //  Scaling fallback

    struct Flaky(Cell<Option<f64>>);

    impl ScalingProvider for Flaky {
        fn scaling_factor(&self) -> Result<f64, ScalingError> {
            self.0.get().ok_or_else(|| ScalingError("no window".into()))
        }
    }

    #[test]
    fn scaling_falls_back_to_one() {
        let p = Flaky(Cell::new(None));
        assert_eq!(p.scaling_or_default(), 1.0);
        p.0.set(Some(0.0));
        assert_eq!(p.scaling_or_default(), 1.0);
        p.0.set(Some(f64::NAN));
        assert_eq!(p.scaling_or_default(), 1.0);
        p.0.set(Some(1.25));
        assert_eq!(p.scaling_or_default(), 1.25);
    }

    #[test]
    fn pointer_event_wire_format() {
        let json = r#"{"target":{"Resize":3},"phase":"Move","x":1.5,"y":2.0}"#;
        let ev: PointerEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            ev,
            PointerEvent::new(GestureTarget::Resize(PlacementId(3)), PointerPhase::Move, 1.5, 2.0)
        );
    }
}
