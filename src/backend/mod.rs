//! Host backends.
//!
//! [`headless`] is always available: an in-memory host with a virtual
//! clock, used by the replay binary and the tests.  With the `gtk`
//! feature, [`gtk`] places real GTK4 widgets on a `gtk::Fixed` and runs
//! the workspace from the GLib main loop.

pub mod headless;

#[cfg(feature = "gtk")]
pub mod gtk;
