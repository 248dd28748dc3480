//! The [`Workspace`]: the public placement and manipulation API.
//!
//! A workspace owns a [`SurfaceHost`], a [`ScalingProvider`], the
//! [`PlacementRegistry`], one [`DragController`] / [`ResizeController`]
//! per enabled placement, and the optional [`DebugOverlayRenderer`].
//!
//! Hosts feed everything back through [`Workspace::handle_event`] (or the
//! narrower [`handle_pointer`](Workspace::handle_pointer) /
//! [`run_deferred`](Workspace::run_deferred)); gesture outcomes are
//! committed to the registry and reported as [`WorkspaceEvent`]s.

use crate::backend::headless::HeadlessHost;
use crate::config::{Config, ConfigError, GestureConfig, OverlayConfig, Theme};
use crate::drag::{DragController, DragOutcome};
use crate::element::{ElementHandle, ElementKind, PlaceOptions};
use crate::grid::{GridError, GridExtent, GridSystem, GridUnit, PixelExtent};
use crate::overlay::{DebugOverlayRenderer, OverlayStyle};
use crate::registry::{Placement, PlacementId, PlacementRegistry};
use crate::resize::{ResizeController, ResizeOutcome};
use crate::traits::{
    DeferredTask, GestureTarget, HandleSpec, HostError, HostEvent, PointerEvent, PointerPhase,
    ScalingProvider, SurfaceHost,
};
use log::{debug, info};
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Error returned by the synchronous workspace API.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("unknown {0}")]
    UnknownPlacement(PlacementId),
}

/// Accepted content of an input element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InputChange {
    Text(String),
    Number(i64),
}

/// Something a host event changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum WorkspaceEvent {
    /// A drag committed a new grid position.
    Moved { id: PlacementId, position: GridUnit },
    /// A resize committed a new grid size.
    Resized { id: PlacementId, size: GridExtent },
    /// Press and release without a drag.
    Clicked { id: PlacementId, activated: bool },
    /// An input element accepted new text.
    Input { id: PlacementId, change: InputChange },
}

/// Grid-placed elements on top of a toolkit host.
pub struct Workspace<H: SurfaceHost, S: ScalingProvider> {
    host: H,
    scaling: S,
    grid: GridSystem,
    extent: GridExtent,
    theme: Theme,
    gestures: GestureConfig,
    registry: PlacementRegistry,
    drags: HashMap<PlacementId, DragController>,
    resizes: HashMap<PlacementId, ResizeController>,
    overlay: Option<DebugOverlayRenderer>,
}

impl<H: SurfaceHost, S: ScalingProvider> Workspace<H, S> {
    /// Build a workspace from a validated configuration.  When
    /// `config.overlay.show_grid` is set the first overlay draw is
    /// scheduled right away.
    pub fn new(host: H, scaling: S, config: &Config) -> Result<Self, WorkspaceError> {
        config.validate()?;
        let mut ws = Self {
            host,
            scaling,
            grid: config.grid.grid_system()?,
            extent: config.grid.extent()?,
            theme: config.theme,
            gestures: config.gestures,
            registry: PlacementRegistry::new(),
            drags: HashMap::new(),
            resizes: HashMap::new(),
            overlay: None,
        };
        info!(
            "workspace {:?}: {}x{} cells of {}px",
            config.title, ws.extent.cols, ws.extent.rows, ws.grid.gtp()
        );
        if config.overlay.show_grid {
            ws.set_overlay(config.overlay.clone())?;
        }
        Ok(ws)
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn scaling(&self) -> &S {
        &self.scaling
    }

    pub fn grid(&self) -> GridSystem {
        self.grid
    }

    pub fn extent(&self) -> GridExtent {
        self.extent
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn overlay(&self) -> Option<&DebugOverlayRenderer> {
        self.overlay.as_ref()
    }

    /// Pixel size of the window spanning the whole grid.
    pub fn window_size(&self) -> PixelExtent {
        self.grid.window_size(self.extent)
    }

    //  Placement

    /// Create an element of `kind` at `position`.  Without a `size`, the
    /// kind's default extent is used.
    pub fn place(
        &mut self,
        kind: ElementKind,
        position: GridUnit,
        size: Option<GridExtent>,
        options: PlaceOptions,
    ) -> Result<PlacementId, WorkspaceError> {
        let size = size.unwrap_or_else(|| kind.default_extent());
        let size = GridExtent::new(size.cols, size.rows)?;
        let rect = self.grid.checked_placement_rect(position, size)?;
        let handle = self.host.create_element(kind, rect, &options)?;
        let id = self.registry.insert(handle, kind, position, size);
        if let Some(p) = self.registry.get_mut(id) {
            p.numeric = options.numeric;
        }
        info!(
            "placed {} as {} at ({}, {}) size {}x{}",
            kind, id, position.col, position.row, size.cols, size.rows
        );
        Ok(id)
    }

    /// Make a placement draggable.  The binding covers the element and
    /// every descendant; an existing resize handle keeps its own binding.
    pub fn enable_drag(&mut self, id: PlacementId) -> Result<(), WorkspaceError> {
        let placement = self.registry.get(id).ok_or(WorkspaceError::UnknownPlacement(id))?;
        let (handle, kind, resize_handle) = (placement.handle, placement.kind, placement.resize_handle);

        self.host.attach_gesture_subtree(handle, GestureTarget::Drag(id))?;
        if let Some(rh) = resize_handle {
            self.host.bind_pointer(rh, GestureTarget::Resize(id))?;
        }
        self.drags.insert(
            id,
            DragController::new(handle, kind, self.grid, self.gestures.drag_threshold),
        );
        if let Some(p) = self.registry.get_mut(id) {
            p.draggable = true;
        }
        debug!("drag enabled on {}", id);
        Ok(())
    }

    /// Attach a corner handle and make a placement resizable.  Calling it
    /// again only refreshes the handle's binding.
    pub fn enable_resize(&mut self, id: PlacementId) -> Result<(), WorkspaceError> {
        let placement = self.registry.get(id).ok_or(WorkspaceError::UnknownPlacement(id))?;
        let handle = placement.handle;

        let resize_handle = match placement.resize_handle {
            Some(rh) => rh,
            None => {
                let spec = HandleSpec {
                    size: self.gestures.handle_size,
                    inset: self.gestures.handle_inset,
                };
                self.host.attach_resize_handle(handle, spec)?
            }
        };
        self.host.bind_pointer(resize_handle, GestureTarget::Resize(id))?;
        self.resizes
            .entry(id)
            .or_insert_with(|| ResizeController::new(handle, resize_handle, self.grid));
        if let Some(p) = self.registry.get_mut(id) {
            p.resize_handle = Some(resize_handle);
        }
        debug!("resize enabled on {}", id);
        Ok(())
    }

    /// Destroy the element and forget its placement and gesture state.
    pub fn remove(&mut self, id: PlacementId) -> Result<Placement, WorkspaceError> {
        let placement = self.registry.remove(id).ok_or(WorkspaceError::UnknownPlacement(id))?;
        self.drags.remove(&id);
        self.resizes.remove(&id);
        if let Err(e) = self.host.destroy(placement.handle) {
            debug!("destroying {}: {}", id, e);
        }
        info!("removed {}", id);
        Ok(placement)
    }

    pub fn placement(&self, id: PlacementId) -> Option<&Placement> {
        self.registry.get(id)
    }

    pub fn placements(&self) -> impl Iterator<Item = &Placement> {
        self.registry.iter()
    }

    /// Last committed grid position.
    pub fn grid_position(&self, id: PlacementId) -> Result<GridUnit, WorkspaceError> {
        self.registry
            .get(id)
            .map(|p| p.position)
            .ok_or(WorkspaceError::UnknownPlacement(id))
    }

    /// Last committed grid size.
    pub fn grid_size(&self, id: PlacementId) -> Result<GridExtent, WorkspaceError> {
        self.registry
            .get(id)
            .map(|p| p.size)
            .ok_or(WorkspaceError::UnknownPlacement(id))
    }

    //  Overlay

    /// Replace the debug overlay.  With `show_grid` off the current
    /// overlay is removed; otherwise a fresh draw is scheduled.  The
    /// overlay draws the workspace grid unless `config` names its own.
    pub fn set_overlay(&mut self, config: OverlayConfig) -> Result<(), WorkspaceError> {
        let resolved = config
            .show_grid
            .then(|| config.grid_for(self.extent, self.grid.gtp()))
            .transpose()?;
        if let Some(mut old) = self.overlay.take() {
            old.teardown(&mut self.host);
        }
        let Some((extent, grid)) = resolved else {
            debug!("overlay disabled");
            return Ok(());
        };
        let renderer = DebugOverlayRenderer::new(
            extent,
            grid.gtp(),
            OverlayStyle::from(&config),
            self.theme,
            config.draw_delay(),
            config.lower_delay(),
        )?;
        renderer.schedule(&mut self.host);
        self.overlay = Some(renderer);
        Ok(())
    }

    /// Draw the overlay now, if there is one.
    pub fn redraw_overlay(&mut self) {
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.draw(&mut self.host, &self.scaling);
        }
    }

    /// Switch theme; a live overlay is redrawn so a theme-derived
    /// background follows.
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        if let Some(overlay) = self.overlay.as_mut() {
            overlay.set_theme(theme);
        }
        self.redraw_overlay();
    }

    //  Event dispatch

    pub fn handle_event(&mut self, event: HostEvent) -> Option<WorkspaceEvent> {
        match event {
            HostEvent::Pointer(ev) => self.handle_pointer(ev),
            HostEvent::Deferred(task) => {
                self.run_deferred(task);
                None
            }
            HostEvent::InputChanged { element, text } => {
                let id = self.registry.by_handle(element)?.id;
                let change = self.input_changed(id, &text)?;
                Some(WorkspaceEvent::Input { id, change })
            }
        }
    }

    /// Route a pointer event to the controller it is bound to and commit
    /// the outcome.
    pub fn handle_pointer(&mut self, event: PointerEvent) -> Option<WorkspaceEvent> {
        let PointerEvent { target, phase, x, y } = event;
        match target {
            GestureTarget::Drag(id) => {
                let Some(ctl) = self.drags.get_mut(&id) else {
                    debug!("drag event for {} without a controller", id);
                    return None;
                };
                match ctl.handle(&mut self.host, &self.scaling, phase, x, y) {
                    DragOutcome::Moved(position) => {
                        self.registry.commit_position(id, position);
                        Some(WorkspaceEvent::Moved { id, position })
                    }
                    DragOutcome::Clicked { activated } => Some(WorkspaceEvent::Clicked { id, activated }),
                    DragOutcome::Pending | DragOutcome::Aborted => None,
                }
            }
            GestureTarget::Resize(id) => {
                let Some(ctl) = self.resizes.get_mut(&id) else {
                    debug!("resize event for {} without a controller", id);
                    return None;
                };
                match ctl.handle(&mut self.host, &self.scaling, phase, x, y) {
                    ResizeOutcome::Resized(size) => {
                        self.registry.commit_size(id, size);
                        Some(WorkspaceEvent::Resized { id, size })
                    }
                    ResizeOutcome::Pending | ResizeOutcome::Aborted => None,
                }
            }
        }
    }

    /// Run a task the host scheduled earlier.
    pub fn run_deferred(&mut self, task: DeferredTask) {
        let Some(overlay) = self.overlay.as_mut() else {
            debug!("{:?} fired with no overlay", task);
            return;
        };
        match task {
            DeferredTask::DrawOverlay => overlay.draw(&mut self.host, &self.scaling),
            DeferredTask::LowerSurface(surface) => overlay.lower(&mut self.host, surface),
        }
    }

    /// Filter new text typed into an input.  Numeric inputs only accept
    /// an integer within their range; anything else is dropped silently.
    pub fn input_changed(&self, id: PlacementId, text: &str) -> Option<InputChange> {
        let placement = self.registry.get(id)?;
        match placement.numeric {
            Some(range) => range.accept(text).map(InputChange::Number),
            None => Some(InputChange::Text(text.to_string())),
        }
    }
}

/// Helpers for driving a workspace on the in-memory host.
impl<S: ScalingProvider> Workspace<HeadlessHost, S> {
    /// Advance the virtual clock, running every task that comes due,
    /// including tasks scheduled along the way.
    pub fn advance(&mut self, by: Duration) -> Vec<DeferredTask> {
        let until = self.host.now() + by;
        let mut ran = Vec::new();
        while let Some(task) = self.host.pop_due(until) {
            self.run_deferred(task);
            ran.push(task);
        }
        self.host.set_clock(until);
        ran
    }

    /// Act on `element` with the pointer, as if the user pressed, moved
    /// or released there.
    pub fn pointer_on(
        &mut self,
        element: ElementHandle,
        phase: PointerPhase,
        x: f64,
        y: f64,
    ) -> Option<WorkspaceEvent> {
        let event = self.host.pointer(element, phase, x, y)?;
        self.handle_pointer(event)
    }
}
