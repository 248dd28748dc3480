//! **gridsnap**: grid-based element placement with drag/resize snapping.
//!
//! Elements are placed at integer `(col, row)` cells and sized in whole
//! cells; one cell is `gtp` logical pixels.  Placed elements can be
//! dragged and resized freely with the pointer and snap back onto the
//! grid on release.  A debug overlay draws the grid and `"x,y"` labels
//! behind everything, aligned at any display scaling.
//!
//! # Architecture
//!
//! The crate is organised around two core traits:
//!
//! * [`traits::SurfaceHost`]: the UI toolkit that owns real elements,
//!   pointer bindings, stacking order and deferred callbacks.
//! * [`traits::ScalingProvider`]: reports the current display scaling
//!   factor.
//!
//! [`workspace::Workspace`] ties [`grid`], [`registry`], the [`drag`] and
//! [`resize`] controllers and the [`overlay`] renderer together on top of
//! those traits.  Concrete hosts live in [`backend`].

pub mod backend;
pub mod config;
pub mod drag;
pub mod element;
pub mod grid;
pub mod overlay;
pub mod registry;
pub mod resize;
pub mod script;
pub mod traits;
pub mod workspace;
