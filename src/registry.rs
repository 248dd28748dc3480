//! Authoritative record of where every managed element sits on the grid.
//!
//! The [`PlacementRegistry`] maps a [`PlacementId`] to its last committed
//! [`Placement`].  It is only written when an element is placed and when a
//! drag or resize gesture commits; mid-gesture pixel bounds live in the
//! controllers, never here.

use crate::element::{ElementHandle, ElementKind, NumericRange};
use crate::grid::{GridExtent, GridUnit};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a placement, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlacementId(pub u64);

impl fmt::Display for PlacementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "placement {}", self.0)
    }
}

/// The committed grid position and size of one element.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub id: PlacementId,
    /// Backend element; its live bounds can be queried through the host.
    pub handle: ElementHandle,
    pub kind: ElementKind,
    pub position: GridUnit,
    pub size: GridExtent,
    /// Set for numeric inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericRange>,
    /// Corner handle, once resizing is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_handle: Option<ElementHandle>,
    pub draggable: bool,
}

/// Placement bookkeeping, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct PlacementRegistry {
    entries: BTreeMap<PlacementId, Placement>,
    /// Counter used to allocate the next id.
    next_id: u64,
}

impl PlacementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly created element and return its new id.
    pub fn insert(
        &mut self,
        handle: ElementHandle,
        kind: ElementKind,
        position: GridUnit,
        size: GridExtent,
    ) -> PlacementId {
        let id = PlacementId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            Placement {
                id,
                handle,
                kind,
                position,
                size,
                numeric: None,
                resize_handle: None,
                draggable: false,
            },
        );
        id
    }

    pub fn get(&self, id: PlacementId) -> Option<&Placement> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: PlacementId) -> Option<&mut Placement> {
        self.entries.get_mut(&id)
    }

    /// Find the placement owning a backend element.
    pub fn by_handle(&self, handle: ElementHandle) -> Option<&Placement> {
        self.entries.values().find(|p| p.handle == handle)
    }

    /// Commit a new grid position.  Returns `false` if `id` is unknown.
    pub fn commit_position(&mut self, id: PlacementId, position: GridUnit) -> bool {
        match self.entries.get_mut(&id) {
            Some(p) => {
                p.position = position;
                true
            }
            None => false,
        }
    }

    /// Commit a new grid size.  Returns `false` if `id` is unknown.
    pub fn commit_size(&mut self, id: PlacementId, size: GridExtent) -> bool {
        match self.entries.get_mut(&id) {
            Some(p) => {
                p.size = size;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: PlacementId) -> Option<Placement> {
        self.entries.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Placement> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
