//! Interactive demo: a 12×8 grid with a handful of draggable, resizable
//! controls and the debug overlay behind them.
//!
//! Run with:
//!     cargo run --features gtk --bin gridsnap-demo [-- --config <path>]
//!
//! Drag any control to move it, drag the grey corner to resize it.
//! Committed moves and resizes are logged (`RUST_LOG=info`).

use gridsnap::backend::gtk::{load_css, run_main_loop, GtkHost, GtkScaling};
use gridsnap::config::Config;
use gridsnap::element::{ElementKind, PlaceOptions};
use gridsnap::grid::{GridExtent, GridUnit};
use gridsnap::workspace::{Workspace, WorkspaceError};
use gtk4::prelude::*;
use log::{error, info};
use std::path::PathBuf;

fn demo_config() -> Config {
    let mut config = Config::default();
    config.title = "gridsnap demo".into();
    config.grid.cols = 12;
    config.grid.rows = 8;
    config.overlay.show_grid = true;
    config
}

fn load_config() -> Config {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return match Config::load(&PathBuf::from(&path)) {
                    Ok(cfg) => cfg,
                    Err(e) => {
                        error!("{}", e);
                        std::process::exit(1);
                    }
                };
            }
        }
    }
    demo_config()
}

fn populate(ws: &mut Workspace<GtkHost, GtkScaling>) -> Result<(), WorkspaceError> {
    let size = |c, r| GridExtent::new(c, r).ok();

    let go = ws.place(
        ElementKind::Button,
        GridUnit::new(1, 1),
        size(2, 1),
        PlaceOptions::text("Go").with_value("go"),
    )?;
    let label = ws.place(ElementKind::Label, GridUnit::new(4, 1), None, PlaceOptions::text("Drag me"))?;
    let check = ws.place(ElementKind::CheckBox, GridUnit::new(1, 3), size(3, 1), PlaceOptions::text("Snap"))?;
    let amount = ws.place(ElementKind::Input, GridUnit::new(5, 3), None, PlaceOptions::numeric(0, 100))?;
    let mut table_opts = PlaceOptions::default();
    table_opts.items = vec!["name".into(), "value".into()];
    let table = ws.place(ElementKind::Table, GridUnit::new(8, 1), size(3, 3), table_opts)?;
    let frame = ws.place(ElementKind::Frame, GridUnit::new(1, 5), size(4, 2), PlaceOptions::default())?;

    for id in [go, label, check, amount, table, frame] {
        ws.enable_drag(id)?;
    }
    for id in [table, frame] {
        ws.enable_resize(id)?;
    }
    Ok(())
}

fn main() {
    env_logger::init();
    if let Err(e) = gtk4::init() {
        error!("failed to initialise GTK4: {}", e);
        std::process::exit(1);
    }

    let config = load_config();
    load_css(None::<&PathBuf>);

    let window = gtk4::Window::new();
    window.set_title(Some(config.title.as_str()));
    let canvas = gtk4::Fixed::new();
    window.set_child(Some(&canvas));

    let host = GtkHost::new(canvas);
    let scaling = host.scaling();
    let mut ws = match Workspace::new(host, scaling, &config) {
        Ok(ws) => ws,
        Err(e) => {
            error!("cannot build workspace: {}", e);
            std::process::exit(1);
        }
    };
    let size = ws.window_size();
    window.set_default_size(size.w as i32, size.h as i32);

    if let Err(e) = populate(&mut ws) {
        error!("cannot place demo elements: {}", e);
        std::process::exit(1);
    }
    window.present();
    info!("demo running: {}x{} px", size.w, size.h);
    run_main_loop(ws);
}
