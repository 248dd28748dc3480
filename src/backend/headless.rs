//! In-memory [`SurfaceHost`] with a virtual clock.
//!
//! The headless host keeps an element tree, a stacking order, pointer
//! bindings and a deferred-task queue, all in plain collections.  It backs
//! the `gridsnap` replay binary and every test in the crate.
//!
//! Elements are stored in logical pixels; [`bounds`](SurfaceHost::bounds)
//! multiplies by the shared scaling factor the way a real toolkit reports
//! device pixels.  Composite kinds (buttons, checkboxes, dropdowns,
//! tables, plots) get inner parts as children, so binding a gesture on the
//! root must also reach them.

use crate::element::{ElementHandle, ElementKind, PlaceOptions};
use crate::grid::{PixelExtent, PixelRect};
use crate::overlay::OverlayScene;
use crate::traits::{
    DeferredTask, GestureTarget, HandleSpec, HostError, PointerEvent, PointerPhase,
    ScalingError, ScalingProvider, SurfaceHost,
};
use log::debug;
use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::time::Duration;

/// What a node in the headless tree represents.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Control { kind: ElementKind, options: PlaceOptions },
    /// Inner visual part of a composite control.
    Part,
    ResizeHandle { target: ElementHandle, spec: HandleSpec },
    Overlay { background: String, scene: Option<OverlayScene> },
}

/// One element of the headless tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Logical bounds.
    pub rect: PixelRect,
    pub parent: Option<ElementHandle>,
    pub children: Vec<ElementHandle>,
}

#[derive(Debug, Clone)]
struct Scheduled {
    due: Duration,
    seq: u64,
    task: DeferredTask,
}

/// Scaling factor shared between a [`HeadlessHost`] and the provider
/// returned by [`HeadlessHost::scaling`].
#[derive(Debug, Clone)]
pub struct HeadlessScaling {
    factor: Rc<Cell<f64>>,
    failing: Rc<Cell<bool>>,
}

impl HeadlessScaling {
    pub fn set(&self, factor: f64) {
        self.factor.set(factor);
    }

    /// Make every query fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.set(failing);
    }
}

impl ScalingProvider for HeadlessScaling {
    fn scaling_factor(&self) -> Result<f64, ScalingError> {
        if self.failing.get() {
            return Err(ScalingError("headless scaling disabled".into()));
        }
        Ok(self.factor.get())
    }
}

/// In-memory toolkit stand-in.
#[derive(Debug)]
pub struct HeadlessHost {
    nodes: BTreeMap<ElementHandle, Node>,
    next_handle: u64,
    /// Top-level stacking order, bottom first.
    stack: Vec<ElementHandle>,
    bindings: HashMap<ElementHandle, GestureTarget>,
    scaling: HeadlessScaling,
    clock: Duration,
    queue: Vec<Scheduled>,
    next_seq: u64,
    activations: Vec<ElementHandle>,
    /// When `false`, surfaces report a zero size (not mapped yet).
    surfaces_mapped: bool,
}

impl Default for HeadlessHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessHost {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            next_handle: 1,
            stack: Vec::new(),
            bindings: HashMap::new(),
            scaling: HeadlessScaling {
                factor: Rc::new(Cell::new(1.0)),
                failing: Rc::new(Cell::new(false)),
            },
            clock: Duration::ZERO,
            queue: Vec::new(),
            next_seq: 0,
            activations: Vec::new(),
            surfaces_mapped: true,
        }
    }

    /// A scaling provider tied to this host's display.
    pub fn scaling(&self) -> HeadlessScaling {
        self.scaling.clone()
    }

    pub fn set_surfaces_mapped(&mut self, mapped: bool) {
        self.surfaces_mapped = mapped;
    }

    //  Inspection

    pub fn node(&self, handle: ElementHandle) -> Option<&Node> {
        self.nodes.get(&handle)
    }

    pub fn contains(&self, handle: ElementHandle) -> bool {
        self.nodes.contains_key(&handle)
    }

    /// Logical bounds as last set.
    pub fn logical_rect(&self, handle: ElementHandle) -> Option<PixelRect> {
        self.nodes.get(&handle).map(|n| n.rect)
    }

    /// Top-level elements, bottom first.
    pub fn stack(&self) -> &[ElementHandle] {
        &self.stack
    }

    pub fn binding(&self, handle: ElementHandle) -> Option<GestureTarget> {
        self.bindings.get(&handle).copied()
    }

    /// Every element activated so far, in order.
    pub fn activations(&self) -> &[ElementHandle] {
        &self.activations
    }

    /// Scene last painted on `surface`.
    pub fn scene(&self, surface: ElementHandle) -> Option<&OverlayScene> {
        match &self.nodes.get(&surface)?.kind {
            NodeKind::Overlay { scene, .. } => scene.as_ref(),
            _ => None,
        }
    }

    /// All live overlay surfaces.
    pub fn overlay_surfaces(&self) -> Vec<ElementHandle> {
        self.nodes
            .iter()
            .filter(|(_, n)| matches!(n.kind, NodeKind::Overlay { .. }))
            .map(|(h, _)| *h)
            .collect()
    }

    pub fn now(&self) -> Duration {
        self.clock
    }

    pub fn pending_tasks(&self) -> usize {
        self.queue.len()
    }

    //  Driving

    /// Translate a pointer action on `element` into the event its binding
    /// produces, or `None` if nothing is bound there.
    pub fn pointer(
        &self,
        element: ElementHandle,
        phase: PointerPhase,
        x: f64,
        y: f64,
    ) -> Option<PointerEvent> {
        let target = self.bindings.get(&element)?;
        Some(PointerEvent::new(*target, phase, x, y))
    }

    /// Advance the virtual clock and return the tasks that came due, in
    /// the order they were due (ties in scheduling order).
    pub fn advance(&mut self, by: Duration) -> Vec<DeferredTask> {
        let until = self.clock + by;
        let mut due = Vec::new();
        while let Some(task) = self.pop_due(until) {
            due.push(task);
        }
        self.clock = until;
        due
    }

    /// Remove the earliest task due at or before `until` and move the
    /// clock to its due time.  Tasks scheduled by the caller in response
    /// are still picked up by later calls with the same `until`.
    pub fn pop_due(&mut self, until: Duration) -> Option<DeferredTask> {
        let (idx, _) = self
            .queue
            .iter()
            .enumerate()
            .filter(|(_, s)| s.due <= until)
            .min_by_key(|(_, s)| (s.due, s.seq))?;
        let next = self.queue.remove(idx);
        self.clock = self.clock.max(next.due);
        Some(next.task)
    }

    /// Move the clock forward without running anything.
    pub fn set_clock(&mut self, now: Duration) {
        self.clock = self.clock.max(now);
    }

    //  Internal

    fn alloc(&mut self, node: Node) -> ElementHandle {
        let handle = ElementHandle(self.next_handle);
        self.next_handle += 1;
        if let Some(parent) = node.parent {
            if let Some(p) = self.nodes.get_mut(&parent) {
                p.children.push(handle);
            }
        } else {
            self.stack.push(handle);
        }
        self.nodes.insert(handle, node);
        handle
    }

    fn node_mut(&mut self, handle: ElementHandle) -> Result<&mut Node, HostError> {
        self.nodes.get_mut(&handle).ok_or(HostError::StaleHandle(handle))
    }

    fn parts_for(kind: ElementKind) -> usize {
        match kind {
            ElementKind::Button | ElementKind::Dropdown | ElementKind::Plot => 1,
            ElementKind::CheckBox | ElementKind::Table => 2,
            _ => 0,
        }
    }

    fn handle_rect(target: PixelRect, spec: HandleSpec) -> PixelRect {
        let size = spec.size as f64;
        let inset = spec.inset as f64;
        PixelRect::new(
            target.x + target.w - inset - size,
            target.y + target.h - inset - size,
            size,
            size,
        )
    }

    /// Re-anchor parts and resize handles after `handle` changed bounds.
    fn relayout_children(&mut self, handle: ElementHandle) {
        let Some(node) = self.nodes.get(&handle) else {
            return;
        };
        let rect = node.rect;
        let children = node.children.clone();
        for child in children {
            if let Some(c) = self.nodes.get_mut(&child) {
                c.rect = match &c.kind {
                    NodeKind::ResizeHandle { spec, .. } => Self::handle_rect(rect, *spec),
                    _ => rect,
                };
            }
        }
    }
}

impl SurfaceHost for HeadlessHost {
    fn create_element(
        &mut self,
        kind: ElementKind,
        rect: PixelRect,
        options: &PlaceOptions,
    ) -> Result<ElementHandle, HostError> {
        let handle = self.alloc(Node {
            kind: NodeKind::Control {
                kind,
                options: options.clone(),
            },
            rect,
            parent: None,
            children: Vec::new(),
        });
        for _ in 0..Self::parts_for(kind) {
            self.alloc(Node {
                kind: NodeKind::Part,
                rect,
                parent: Some(handle),
                children: Vec::new(),
            });
        }
        debug!("headless: created {} {} at {:?}", kind, handle, rect);
        Ok(handle)
    }

    fn destroy(&mut self, handle: ElementHandle) -> Result<(), HostError> {
        let node = self.nodes.remove(&handle).ok_or(HostError::StaleHandle(handle))?;
        self.bindings.remove(&handle);
        self.stack.retain(|h| *h != handle);
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|h| *h != handle);
        }
        for child in node.children {
            // Children may already be gone if destroyed individually.
            let _ = self.destroy(child);
        }
        Ok(())
    }

    fn bounds(&self, handle: ElementHandle) -> Result<PixelRect, HostError> {
        let node = self.nodes.get(&handle).ok_or(HostError::StaleHandle(handle))?;
        let s = self.scaling.factor.get();
        let r = node.rect;
        Ok(PixelRect::new(r.x * s, r.y * s, r.w * s, r.h * s))
    }

    fn set_bounds(&mut self, handle: ElementHandle, rect: PixelRect) -> Result<(), HostError> {
        self.node_mut(handle)?.rect = rect;
        self.relayout_children(handle);
        Ok(())
    }

    fn bind_pointer(&mut self, handle: ElementHandle, target: GestureTarget) -> Result<(), HostError> {
        if !self.nodes.contains_key(&handle) {
            return Err(HostError::StaleHandle(handle));
        }
        // A later binding replaces an earlier one.
        self.bindings.insert(handle, target);
        Ok(())
    }

    fn children(&self, handle: ElementHandle) -> Result<Vec<ElementHandle>, HostError> {
        self.nodes
            .get(&handle)
            .map(|n| n.children.clone())
            .ok_or(HostError::StaleHandle(handle))
    }

    fn raise_to_top(&mut self, handle: ElementHandle) -> Result<(), HostError> {
        if !self.nodes.contains_key(&handle) {
            return Err(HostError::StaleHandle(handle));
        }
        if let Some(pos) = self.stack.iter().position(|h| *h == handle) {
            let h = self.stack.remove(pos);
            self.stack.push(h);
        }
        Ok(())
    }

    fn lower_to_bottom(&mut self, handle: ElementHandle) -> Result<(), HostError> {
        if !self.nodes.contains_key(&handle) {
            return Err(HostError::StaleHandle(handle));
        }
        if let Some(pos) = self.stack.iter().position(|h| *h == handle) {
            let h = self.stack.remove(pos);
            self.stack.insert(0, h);
        }
        Ok(())
    }

    fn activate(&mut self, handle: ElementHandle) -> Result<(), HostError> {
        if !self.nodes.contains_key(&handle) {
            return Err(HostError::StaleHandle(handle));
        }
        self.activations.push(handle);
        Ok(())
    }

    fn attach_resize_handle(
        &mut self,
        target: ElementHandle,
        spec: HandleSpec,
    ) -> Result<ElementHandle, HostError> {
        let rect = self.nodes.get(&target).ok_or(HostError::StaleHandle(target))?.rect;
        Ok(self.alloc(Node {
            kind: NodeKind::ResizeHandle { target, spec },
            rect: Self::handle_rect(rect, spec),
            parent: Some(target),
            children: Vec::new(),
        }))
    }

    fn schedule_after(&mut self, delay: Duration, task: DeferredTask) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Scheduled {
            due: self.clock + delay,
            seq,
            task,
        });
    }

    fn create_overlay_surface(
        &mut self,
        size: PixelExtent,
        background: &str,
    ) -> Result<ElementHandle, HostError> {
        Ok(self.alloc(Node {
            kind: NodeKind::Overlay {
                background: background.to_string(),
                scene: None,
            },
            rect: PixelRect::new(0.0, 0.0, size.w as f64, size.h as f64),
            parent: None,
            children: Vec::new(),
        }))
    }

    fn surface_size(&self, surface: ElementHandle) -> Result<(f64, f64), HostError> {
        if !self.surfaces_mapped {
            self.nodes.get(&surface).ok_or(HostError::StaleHandle(surface))?;
            return Ok((0.0, 0.0));
        }
        let r = self.bounds(surface)?;
        Ok((r.w, r.h))
    }

    fn paint_overlay(&mut self, surface: ElementHandle, scene: &OverlayScene) -> Result<(), HostError> {
        match &mut self.node_mut(surface)?.kind {
            NodeKind::Overlay { scene: slot, .. } => {
                *slot = Some(scene.clone());
                Ok(())
            }
            _ => Err(HostError::Backend(format!("{} is not an overlay surface", surface))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::PlacementId;

    fn rect(x: f64, y: f64, w: f64, h: f64) -> PixelRect {
        PixelRect::new(x, y, w, h)
    }

    #[test]
    fn composite_controls_get_parts() {
        let mut host = HeadlessHost::new();
        let b = host
            .create_element(ElementKind::Button, rect(0.0, 0.0, 100.0, 50.0), &PlaceOptions::default())
            .unwrap();
        let l = host
            .create_element(ElementKind::Label, rect(0.0, 0.0, 100.0, 50.0), &PlaceOptions::default())
            .unwrap();
        assert_eq!(host.children(b).unwrap().len(), 1);
        assert!(host.children(l).unwrap().is_empty());
        assert_eq!(host.stack(), &[b, l]);
    }

    #[test]
    fn bounds_are_reported_in_physical_pixels() {
        let mut host = HeadlessHost::new();
        let e = host
            .create_element(ElementKind::Label, rect(50.0, 50.0, 100.0, 50.0), &PlaceOptions::default())
            .unwrap();
        host.scaling().set(2.0);
        assert_eq!(host.bounds(e).unwrap(), rect(100.0, 100.0, 200.0, 100.0));
        assert_eq!(host.logical_rect(e), Some(rect(50.0, 50.0, 100.0, 50.0)));
    }

    #[test]
    fn resize_handle_follows_target() {
        let mut host = HeadlessHost::new();
        let e = host
            .create_element(ElementKind::Frame, rect(0.0, 0.0, 100.0, 100.0), &PlaceOptions::default())
            .unwrap();
        let h = host.attach_resize_handle(e, HandleSpec::default()).unwrap();
        assert_eq!(host.logical_rect(h), Some(rect(84.0, 84.0, 14.0, 14.0)));
        host.set_bounds(e, rect(50.0, 0.0, 200.0, 50.0)).unwrap();
        assert_eq!(host.logical_rect(h), Some(rect(234.0, 34.0, 14.0, 14.0)));
    }

    #[test]
    fn destroy_removes_subtree_and_bindings() {
        let mut host = HeadlessHost::new();
        let e = host
            .create_element(ElementKind::Table, rect(0.0, 0.0, 200.0, 200.0), &PlaceOptions::default())
            .unwrap();
        let parts = host.children(e).unwrap();
        host.attach_gesture_subtree(e, GestureTarget::Drag(PlacementId(0))).unwrap();
        host.destroy(e).unwrap();
        assert!(!host.contains(e));
        assert!(parts.iter().all(|p| !host.contains(*p)));
        assert!(host.pointer(parts[0], PointerPhase::Press, 0.0, 0.0).is_none());
        assert_eq!(host.bounds(e), Err(HostError::StaleHandle(e)));
        assert!(host.stack().is_empty());
    }

    #[test]
    fn raise_and_lower_reorder_stack() {
        let mut host = HeadlessHost::new();
        let opts = PlaceOptions::default();
        let a = host.create_element(ElementKind::Label, rect(0.0, 0.0, 1.0, 1.0), &opts).unwrap();
        let b = host.create_element(ElementKind::Label, rect(0.0, 0.0, 1.0, 1.0), &opts).unwrap();
        let c = host.create_element(ElementKind::Label, rect(0.0, 0.0, 1.0, 1.0), &opts).unwrap();
        host.raise_to_top(a).unwrap();
        assert_eq!(host.stack(), &[b, c, a]);
        host.lower_to_bottom(c).unwrap();
        assert_eq!(host.stack(), &[c, b, a]);
    }

    #[test]
    fn advance_returns_due_tasks_in_order() {
        let mut host = HeadlessHost::new();
        host.schedule_after(Duration::from_millis(150), DeferredTask::DrawOverlay);
        host.schedule_after(Duration::from_millis(10), DeferredTask::LowerSurface(ElementHandle(3)));
        assert!(host.advance(Duration::from_millis(5)).is_empty());
        assert_eq!(
            host.advance(Duration::from_millis(10)),
            vec![DeferredTask::LowerSurface(ElementHandle(3))]
        );
        assert_eq!(host.pending_tasks(), 1);
        assert_eq!(host.advance(Duration::from_millis(200)), vec![DeferredTask::DrawOverlay]);
        assert_eq!(host.pending_tasks(), 0);
    }

    #[test]
    fn unmapped_surface_reports_zero_size() {
        let mut host = HeadlessHost::new();
        let s = host.create_overlay_surface(PixelExtent { w: 600, h: 400 }, "#242424").unwrap();
        assert_eq!(host.surface_size(s).unwrap(), (600.0, 400.0));
        host.set_surfaces_mapped(false);
        assert_eq!(host.surface_size(s).unwrap(), (0.0, 0.0));
    }

    #[test]
    fn failing_scaling_provider() {
        let host = HeadlessHost::new();
        let scaling = host.scaling();
        scaling.set_failing(true);
        assert!(scaling.scaling_factor().is_err());
        assert_eq!(scaling.scaling_or_default(), 1.0);
    }
}
