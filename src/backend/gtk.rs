//! GTK4 [`SurfaceHost`] that runs on the **main thread**.
//!
//! # Widget tree
//!
//! ```text
//! window
//! └ gtk4::Fixed                  (.gridsnap-canvas)
//!     ├ gtk4::DrawingArea        (.grid-overlay, non-targetable)
//!     ├ <control widgets>        (.gridsnap-element)
//!     └ gtk4::Box                (.resize-handle, one per resizable element)
//! ```
//!
//! Widgets are positioned on the `Fixed` in logical pixels; bounds are
//! reported multiplied by the widget scale factor.  Pointer gestures use
//! a capture-phase `GestureDrag` that claims its sequence, so a drag on a
//! button never also clicks it.  GTK callbacks never touch the workspace
//! directly: they push [`HostEvent`]s onto a shared queue that
//! [`run_main_loop`] drains every 16 ms.

use crate::element::{ElementHandle, ElementKind, PlaceOptions};
use crate::grid::{PixelExtent, PixelRect};
use crate::overlay::{Axis, OverlayScene};
use crate::traits::{
    DeferredTask, GestureTarget, HandleSpec, HostError, HostEvent, PointerEvent, PointerPhase,
    ScalingError, ScalingProvider, SurfaceHost,
};
use crate::workspace::Workspace;
use gtk4::prelude::*;
use gtk4::{cairo, gdk, glib};
use log::{debug, info, warn};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

/// Events pushed by GTK callbacks, drained by the main loop.
pub type EventQueue = Rc<RefCell<VecDeque<HostEvent>>>;

//  Default CSS

const DEFAULT_CSS: &str = r#"
.gridsnap-canvas {
    background: none;
}

.resize-handle {
    background-color: rgba(127, 127, 127, 0.6);
    border-radius: 2px;
}

.resize-handle:hover {
    background-color: rgba(200, 200, 200, 0.9);
}
"#;

//  Element bookkeeping

struct Entry {
    widget: gtk4::Widget,
    kind: Option<ElementKind>,
    /// Logical bounds as last placed.
    rect: PixelRect,
    parent: Option<ElementHandle>,
    children: Vec<ElementHandle>,
    /// Set for resize handles: the spec they are anchored with.
    handle_spec: Option<HandleSpec>,
    /// Target of the drag gesture, replaced on rebinding.
    target: Rc<Cell<Option<GestureTarget>>>,
    gesture: Option<gtk4::GestureDrag>,
    /// Scene shown by an overlay surface.
    scene: Option<Rc<RefCell<Option<OverlayScene>>>>,
}

impl Entry {
    fn new(widget: gtk4::Widget, kind: Option<ElementKind>, rect: PixelRect) -> Self {
        Self {
            widget,
            kind,
            rect,
            parent: None,
            children: Vec::new(),
            handle_spec: None,
            target: Rc::new(Cell::new(None)),
            gesture: None,
            scene: None,
        }
    }
}

/// Reports the canvas's scale factor.
#[derive(Clone)]
pub struct GtkScaling {
    widget: gtk4::Widget,
}

impl ScalingProvider for GtkScaling {
    fn scaling_factor(&self) -> Result<f64, ScalingError> {
        if !self.widget.is_realized() {
            return Err(ScalingError("canvas not realized".into()));
        }
        Ok(self.widget.scale_factor() as f64)
    }
}

/// GTK4 implementation of [`SurfaceHost`].
pub struct GtkHost {
    canvas: gtk4::Fixed,
    entries: HashMap<ElementHandle, Entry>,
    next_handle: u64,
    queue: EventQueue,
}

impl GtkHost {
    /// Wrap `canvas`; every element is put on it.
    pub fn new(canvas: gtk4::Fixed) -> Self {
        canvas.add_css_class("gridsnap-canvas");
        Self {
            canvas,
            entries: HashMap::new(),
            next_handle: 1,
            queue: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    pub fn canvas(&self) -> &gtk4::Fixed {
        &self.canvas
    }

    /// A scaling provider tied to the canvas.
    pub fn scaling(&self) -> GtkScaling {
        GtkScaling {
            widget: self.canvas.clone().upcast(),
        }
    }

    /// Queue the main loop drains; shared with every GTK callback.
    pub fn events(&self) -> EventQueue {
        self.queue.clone()
    }

    fn alloc(&mut self) -> ElementHandle {
        let handle = ElementHandle(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn entry(&self, handle: ElementHandle) -> Result<&Entry, HostError> {
        self.entries.get(&handle).ok_or(HostError::StaleHandle(handle))
    }

    fn factor(&self) -> f64 {
        self.canvas.scale_factor().max(1) as f64
    }

    fn put(&self, widget: &gtk4::Widget, rect: PixelRect) {
        widget.set_size_request(rect.w.round() as i32, rect.h.round() as i32);
        self.canvas.put(widget, rect.x, rect.y);
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

    fn build_widget(&self, handle: ElementHandle, kind: ElementKind, options: &PlaceOptions) -> gtk4::Widget {
        let text = options.text.clone().unwrap_or_default();
        match kind {
            ElementKind::Button => {
                let button = gtk4::Button::with_label(&text);
                let value = options.value.clone();
                button.connect_clicked(move |_| {
                    info!("button {} activated (value {:?})", handle, value);
                });
                button.upcast()
            }
            ElementKind::Label => gtk4::Label::new(Some(text.as_str())).upcast(),
            ElementKind::Input => {
                let entry = gtk4::Entry::new();
                entry.set_placeholder_text(Some(text.as_str()));
                let queue = self.queue.clone();
                entry.connect_changed(move |e| {
                    queue.borrow_mut().push_back(HostEvent::InputChanged {
                        element: handle,
                        text: e.text().to_string(),
                    });
                });
                entry.upcast()
            }
            ElementKind::CheckBox => gtk4::CheckButton::with_label(&text).upcast(),
            ElementKind::Dropdown => {
                let items: Vec<&str> = options.items.iter().map(String::as_str).collect();
                gtk4::DropDown::from_strings(&items).upcast()
            }
            ElementKind::Slider => {
                gtk4::Scale::with_range(gtk4::Orientation::Horizontal, 0.0, 100.0, 1.0).upcast()
            }
            ElementKind::Image => match &options.source {
                Some(path) => gtk4::Picture::for_filename(path).upcast(),
                None => gtk4::Picture::new().upcast(),
            },
            ElementKind::Plot => {
                let frame = gtk4::Frame::new(Some(text.as_str()));
                frame.set_child(Some(&gtk4::DrawingArea::new()));
                frame.upcast()
            }
            ElementKind::Table => {
                let grid = gtk4::Grid::new();
                grid.set_column_homogeneous(true);
                for (col, header) in options.items.iter().enumerate() {
                    grid.attach(&gtk4::Label::new(Some(header.as_str())), col as i32, 0, 1, 1);
                }
                grid.upcast()
            }
            ElementKind::Frame => gtk4::Frame::new(None).upcast(),
        }
    }

    /// Re-anchor handles after `handle` moved or resized.
    fn relayout_children(&mut self, handle: ElementHandle) {
        let Some(entry) = self.entries.get(&handle) else {
            return;
        };
        let rect = entry.rect;
        for child in entry.children.clone() {
            let Some(c) = self.entries.get_mut(&child) else {
                continue;
            };
            if let Some(spec) = c.handle_spec {
                c.rect = Self::handle_rect(rect, spec);
                self.canvas.move_(&c.widget, c.rect.x, c.rect.y);
                // Keep the handle above its element.
                c.widget.insert_before(&self.canvas, None::<&gtk4::Widget>);
            }
        }
    }
}

/// Pointer position of the gesture's current event in window coordinates,
/// physical pixels.
fn root_position(gesture: &gtk4::GestureDrag, factor: f64) -> Option<(f64, f64)> {
    let event = gesture.current_event()?;
    let (x, y) = event.position()?;
    Some((x * factor, y * factor))
}

fn push_pointer(
    queue: &EventQueue,
    target: &Cell<Option<GestureTarget>>,
    gesture: &gtk4::GestureDrag,
    canvas: &gtk4::Fixed,
    phase: PointerPhase,
) {
    let Some(target) = target.get() else {
        return;
    };
    let factor = canvas.scale_factor().max(1) as f64;
    let Some((x, y)) = root_position(gesture, factor) else {
        debug!("pointer {:?} without position", phase);
        return;
    };
    queue
        .borrow_mut()
        .push_back(HostEvent::Pointer(PointerEvent::new(target, phase, x, y)));
}

impl SurfaceHost for GtkHost {
    fn create_element(
        &mut self,
        kind: ElementKind,
        rect: PixelRect,
        options: &PlaceOptions,
    ) -> Result<ElementHandle, HostError> {
        let handle = self.alloc();
        let widget = self.build_widget(handle, kind, options);
        widget.add_css_class("gridsnap-element");
        self.put(&widget, rect);
        self.entries.insert(handle, Entry::new(widget, Some(kind), rect));
        debug!("gtk: created {} {} at {:?}", kind, handle, rect);
        Ok(handle)
    }

    fn destroy(&mut self, handle: ElementHandle) -> Result<(), HostError> {
        let entry = self.entries.remove(&handle).ok_or(HostError::StaleHandle(handle))?;
        self.canvas.remove(&entry.widget);
        if let Some(parent) = entry.parent.and_then(|p| self.entries.get_mut(&p)) {
            parent.children.retain(|h| *h != handle);
        }
        for child in entry.children {
            let _ = self.destroy(child);
        }
        Ok(())
    }

    fn bounds(&self, handle: ElementHandle) -> Result<PixelRect, HostError> {
        let r = self.entry(handle)?.rect;
        let s = self.factor();
        Ok(PixelRect::new(r.x * s, r.y * s, r.w * s, r.h * s))
    }

    fn set_bounds(&mut self, handle: ElementHandle, rect: PixelRect) -> Result<(), HostError> {
        let entry = self.entries.get_mut(&handle).ok_or(HostError::StaleHandle(handle))?;
        entry.rect = rect;
        entry
            .widget
            .set_size_request(rect.w.round() as i32, rect.h.round() as i32);
        self.canvas.move_(&entry.widget, rect.x, rect.y);
        self.relayout_children(handle);
        Ok(())
    }

    fn bind_pointer(&mut self, handle: ElementHandle, target: GestureTarget) -> Result<(), HostError> {
        let entry = self.entries.get_mut(&handle).ok_or(HostError::StaleHandle(handle))?;
        entry.target.set(Some(target));
        if entry.gesture.is_some() {
            return Ok(());
        }

        let gesture = gtk4::GestureDrag::new();
        gesture.set_propagation_phase(gtk4::PropagationPhase::Capture);
        {
            let (queue, cell, canvas) = (self.queue.clone(), entry.target.clone(), self.canvas.clone());
            gesture.connect_drag_begin(move |g, _, _| {
                g.set_state(gtk4::EventSequenceState::Claimed);
                push_pointer(&queue, &cell, g, &canvas, PointerPhase::Press);
            });
        }
        {
            let (queue, cell, canvas) = (self.queue.clone(), entry.target.clone(), self.canvas.clone());
            gesture.connect_drag_update(move |g, _, _| {
                push_pointer(&queue, &cell, g, &canvas, PointerPhase::Move);
            });
        }
        {
            let (queue, cell, canvas) = (self.queue.clone(), entry.target.clone(), self.canvas.clone());
            gesture.connect_drag_end(move |g, _, _| {
                push_pointer(&queue, &cell, g, &canvas, PointerPhase::Release);
            });
        }
        entry.widget.add_controller(gesture.clone());
        entry.gesture = Some(gesture);
        Ok(())
    }

    fn children(&self, handle: ElementHandle) -> Result<Vec<ElementHandle>, HostError> {
        Ok(self.entry(handle)?.children.clone())
    }

    fn raise_to_top(&mut self, handle: ElementHandle) -> Result<(), HostError> {
        let widget = self.entry(handle)?.widget.clone();
        widget.insert_before(&self.canvas, None::<&gtk4::Widget>);
        self.relayout_children(handle);
        Ok(())
    }

    fn lower_to_bottom(&mut self, handle: ElementHandle) -> Result<(), HostError> {
        let widget = self.entry(handle)?.widget.clone();
        widget.insert_after(&self.canvas, None::<&gtk4::Widget>);
        Ok(())
    }

    fn activate(&mut self, handle: ElementHandle) -> Result<(), HostError> {
        let entry = self.entry(handle)?;
        match entry.kind {
            Some(ElementKind::Button) => {
                if let Some(button) = entry.widget.downcast_ref::<gtk4::Button>() {
                    button.emit_clicked();
                }
            }
            Some(ElementKind::CheckBox) => {
                if let Some(check) = entry.widget.downcast_ref::<gtk4::CheckButton>() {
                    check.set_active(!check.is_active());
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn attach_resize_handle(
        &mut self,
        target: ElementHandle,
        spec: HandleSpec,
    ) -> Result<ElementHandle, HostError> {
        let rect = Self::handle_rect(self.entry(target)?.rect, spec);
        let handle = self.alloc();
        let widget: gtk4::Widget = gtk4::Box::new(gtk4::Orientation::Vertical, 0).upcast();
        widget.add_css_class("resize-handle");
        if let Some(cursor) = gdk::Cursor::from_name("se-resize", None) {
            widget.set_cursor(Some(&cursor));
        }
        self.put(&widget, rect);

        let mut entry = Entry::new(widget, None, rect);
        entry.parent = Some(target);
        entry.handle_spec = Some(spec);
        self.entries.insert(handle, entry);
        if let Some(t) = self.entries.get_mut(&target) {
            t.children.push(handle);
        }
        Ok(handle)
    }

    fn schedule_after(&mut self, delay: Duration, task: DeferredTask) {
        let queue = self.queue.clone();
        glib::timeout_add_local_once(delay, move || {
            queue.borrow_mut().push_back(HostEvent::Deferred(task));
        });
    }

    fn create_overlay_surface(
        &mut self,
        size: PixelExtent,
        background: &str,
    ) -> Result<ElementHandle, HostError> {
        let handle = self.alloc();
        let area = gtk4::DrawingArea::new();
        area.set_content_width(size.w as i32);
        area.set_content_height(size.h as i32);
        area.set_can_target(false);
        area.add_css_class("grid-overlay");

        let background = gdk::RGBA::parse(background).map_err(|e| HostError::Backend(e.to_string()))?;
        let scene: Rc<RefCell<Option<OverlayScene>>> = Rc::new(RefCell::new(None));
        {
            let scene = scene.clone();
            area.set_draw_func(move |area, cr, _, _| {
                let factor = area.scale_factor().max(1) as f64;
                if let Err(e) = paint(cr, factor, background, scene.borrow().as_ref()) {
                    warn!("overlay paint failed: {}", e);
                }
            });
        }

        let rect = PixelRect::new(0.0, 0.0, size.w as f64, size.h as f64);
        let widget: gtk4::Widget = area.upcast();
        self.canvas.put(&widget, 0.0, 0.0);
        let mut entry = Entry::new(widget, None, rect);
        entry.scene = Some(scene);
        self.entries.insert(handle, entry);
        Ok(handle)
    }

    fn surface_size(&self, surface: ElementHandle) -> Result<(f64, f64), HostError> {
        let entry = self.entry(surface)?;
        let s = self.factor();
        Ok((entry.widget.width() as f64 * s, entry.widget.height() as f64 * s))
    }

    fn paint_overlay(&mut self, surface: ElementHandle, scene: &OverlayScene) -> Result<(), HostError> {
        let entry = self.entry(surface)?;
        let Some(slot) = &entry.scene else {
            return Err(HostError::Backend(format!("{} is not an overlay surface", surface)));
        };
        *slot.borrow_mut() = Some(scene.clone());
        entry.widget.queue_draw();
        Ok(())
    }
}

fn parse_color(s: &str) -> gdk::RGBA {
    gdk::RGBA::parse(s).unwrap_or(gdk::RGBA::BLACK)
}

fn set_color(cr: &cairo::Context, c: &gdk::RGBA) {
    cr.set_source_rgba(c.red() as f64, c.green() as f64, c.blue() as f64, c.alpha() as f64);
}

/// Paint `scene` (physical pixels) onto a logical-pixel cairo context.
fn paint(
    cr: &cairo::Context,
    factor: f64,
    background: gdk::RGBA,
    scene: Option<&OverlayScene>,
) -> Result<(), cairo::Error> {
    set_color(cr, &background);
    cr.paint()?;
    let Some(scene) = scene else {
        return Ok(());
    };
    cr.scale(1.0 / factor, 1.0 / factor);

    set_color(cr, &parse_color(&scene.line_color));
    cr.set_line_width(1.0);
    cr.set_dash(&scene.dash, 0.0);
    for line in &scene.lines {
        // Half-pixel offset keeps 1 px lines crisp.
        let (ox, oy) = match line.axis {
            Axis::Vertical => (0.5, 0.0),
            Axis::Horizontal => (0.0, 0.5),
        };
        cr.move_to(line.from.0 + ox, line.from.1 + oy);
        cr.line_to(line.to.0 + ox, line.to.1 + oy);
    }
    cr.stroke()?;

    if scene.labels.is_empty() {
        return Ok(());
    }
    cr.set_dash(&[], 0.0);
    set_color(cr, &parse_color(&scene.text_color));
    cr.select_font_face("monospace", cairo::FontSlant::Normal, cairo::FontWeight::Normal);
    let size = scene.font_size as f64;
    cr.set_font_size(size);
    for label in &scene.labels {
        // Cairo anchors text at the baseline.
        cr.move_to(label.x, label.y + size);
        cr.show_text(&label.text)?;
    }
    Ok(())
}

//  Main loop

/// Run the GLib main loop on the **current** (main) thread, feeding every
/// queued [`HostEvent`] to `workspace`.
pub fn run_main_loop(workspace: Workspace<GtkHost, GtkScaling>) {
    let queue = workspace.host().events();
    let workspace = Rc::new(RefCell::new(workspace));

    glib::timeout_add_local(Duration::from_millis(16), move || {
        loop {
            // Release the queue borrow before dispatching: handlers
            // schedule new work onto it.
            let next = queue.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            if let Some(ev) = workspace.borrow_mut().handle_event(event) {
                info!("{:?}", ev);
            }
        }
        glib::ControlFlow::Continue
    });

    info!("entering GLib main loop");
    let main_loop = glib::MainLoop::new(None, false);
    main_loop.run();
    info!("GLib main loop exited");
}

//  CSS loading

/// Register the built-in stylesheet, or `css_path` if it exists.
pub fn load_css(css_path: Option<&PathBuf>) {
    let provider = gtk4::CssProvider::new();

    let css_content = match css_path.filter(|p| p.exists()) {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(content) => {
                info!("user CSS: {} ({} bytes)", p.display(), content.len());
                content
            }
            Err(e) => {
                warn!("CSS read failed ({}): {}, using built-in", p.display(), e);
                DEFAULT_CSS.to_string()
            }
        },
        None => DEFAULT_CSS.to_string(),
    };

    #[allow(deprecated)]
    provider.load_from_data(&css_content);

    if let Some(display) = gdk::Display::default() {
        gtk4::style_context_add_provider_for_display(
            &display,
            &provider,
            gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    } else {
        warn!("no GDK display, CSS will not be applied");
    }
}
