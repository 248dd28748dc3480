//! Scripted replay of a workspace session on the headless host.
//!
//! A script is newline-delimited JSON, one [`ScriptCommand`] per line:
//!
//! ```json
//! {"Place":{"kind":"button","at":[1,1],"size":[2,1],"options":{"text":"Go"}}}
//! {"EnableDrag":0}
//! {"Press":{"id":0,"x":60,"y":60}}
//! {"Move":{"id":0,"x":52,"y":52}}
//! {"Release":{"id":0,"x":160,"y":160}}
//! {"Type":{"id":1,"text":"42"}}
//! {"Scaling":1.5}
//! {"Advance":200}
//! "Dump"
//! ```
//!
//! Placement ids are handed out from `0` in placement order.  Every
//! [`WorkspaceEvent`] is written out as one JSON line; `"Dump"` writes a
//! [`Snapshot`].  Malformed lines and failing commands are logged and
//! skipped.

use crate::backend::headless::{HeadlessHost, HeadlessScaling};
use crate::config::{Config, OverlayConfig, Theme};
use crate::element::{ElementHandle, ElementKind, PlaceOptions};
use crate::grid::{GridError, GridExtent, GridUnit};
use crate::overlay::OverlayScene;
use crate::registry::{Placement, PlacementId};
use crate::traits::{HostEvent, PointerPhase, SurfaceHost};
use crate::workspace::{Workspace, WorkspaceError, WorkspaceEvent};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::time::Duration;

/// A pointer action on a placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerAction {
    pub id: u64,
    /// Root coordinates, physical pixels.
    pub x: f64,
    pub y: f64,
    /// Act on the resize handle instead of the element.
    #[serde(default)]
    pub handle: bool,
    /// Act on the n-th inner part of a composite element.
    #[serde(default)]
    pub part: Option<usize>,
}

/// One line of a replay script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScriptCommand {
    /// Place an element.  `at` and `size` are grid units; fractions are
    /// truncated.  Without `size` the kind's default is used.
    Place {
        kind: ElementKind,
        at: (f64, f64),
        #[serde(default)]
        size: Option<(f64, f64)>,
        #[serde(default)]
        options: PlaceOptions,
    },
    EnableDrag(u64),
    EnableResize(u64),
    Press(PointerAction),
    Move(PointerAction),
    Release(PointerAction),
    /// Replace the text of an input element.
    Type { id: u64, text: String },
    Remove(u64),
    /// Change the display scaling factor.
    Scaling(f64),
    /// Advance the virtual clock by this many milliseconds.
    Advance(u64),
    Theme(Theme),
    Overlay(OverlayConfig),
    Redraw,
    Dump,
}

/// Error from a single script command.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown placement {0}")]
    UnknownPlacement(u64),
    #[error("placement {0} has no resize handle")]
    NoResizeHandle(u64),
    #[error("placement {id} has no part {part}")]
    NoSuchPart { id: u64, part: usize },
}

/// State of the workspace at a `"Dump"`.
#[derive(Debug, Serialize)]
pub struct Snapshot<'a> {
    pub time_ms: u64,
    pub window: (i64, i64),
    pub placements: Vec<&'a Placement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay: Option<&'a OverlayScene>,
}

/// What a command produced.
#[derive(Debug)]
pub enum Output<'a> {
    Nothing,
    Event(WorkspaceEvent),
    Snapshot(Snapshot<'a>),
}

/// Drives a headless workspace from script commands.
pub struct Replay {
    workspace: Workspace<HeadlessHost, HeadlessScaling>,
}

impl Replay {
    pub fn new(config: &Config) -> Result<Self, ScriptError> {
        let host = HeadlessHost::new();
        let scaling = host.scaling();
        Ok(Self {
            workspace: Workspace::new(host, scaling, config)?,
        })
    }

    pub fn workspace(&self) -> &Workspace<HeadlessHost, HeadlessScaling> {
        &self.workspace
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        let ws = &self.workspace;
        let window = ws.window_size();
        Snapshot {
            time_ms: ws.host().now().as_millis() as u64,
            window: (window.w, window.h),
            placements: ws.placements().collect(),
            overlay: ws
                .overlay()
                .and_then(|o| o.surface())
                .and_then(|s| ws.host().scene(s)),
        }
    }

    fn placement(&self, id: u64) -> Result<&Placement, ScriptError> {
        self.workspace
            .placement(PlacementId(id))
            .ok_or(ScriptError::UnknownPlacement(id))
    }

    /// Element a pointer action lands on.
    fn target(&self, action: &PointerAction) -> Result<ElementHandle, ScriptError> {
        let placement = self.placement(action.id)?;
        if action.handle {
            return placement.resize_handle.ok_or(ScriptError::NoResizeHandle(action.id));
        }
        match action.part {
            None => Ok(placement.handle),
            Some(part) => self
                .workspace
                .host()
                .children(placement.handle)
                .map_err(WorkspaceError::from)?
                .get(part)
                .copied()
                .ok_or(ScriptError::NoSuchPart { id: action.id, part }),
        }
    }

    fn pointer(&mut self, phase: PointerPhase, action: PointerAction) -> Result<Output<'_>, ScriptError> {
        let element = self.target(&action)?;
        match self.workspace.pointer_on(element, phase, action.x, action.y) {
            Some(ev) => Ok(Output::Event(ev)),
            None => Ok(Output::Nothing),
        }
    }

    /// Apply one command.
    pub fn apply(&mut self, command: ScriptCommand) -> Result<Output<'_>, ScriptError> {
        debug!("script: {:?}", command);
        match command {
            ScriptCommand::Place {
                kind,
                at,
                size,
                options,
            } => {
                let size = size.map(GridExtent::truncate).transpose()?;
                let id = self.workspace.place(kind, GridUnit::truncate(at), size, options)?;
                info!("script placed {}", id);
            }
            ScriptCommand::EnableDrag(id) => self.workspace.enable_drag(PlacementId(id))?,
            ScriptCommand::EnableResize(id) => self.workspace.enable_resize(PlacementId(id))?,
            ScriptCommand::Press(a) => return self.pointer(PointerPhase::Press, a),
            ScriptCommand::Move(a) => return self.pointer(PointerPhase::Move, a),
            ScriptCommand::Release(a) => return self.pointer(PointerPhase::Release, a),
            ScriptCommand::Type { id, text } => {
                let element = self.placement(id)?.handle;
                if let Some(ev) = self.workspace.handle_event(HostEvent::InputChanged { element, text }) {
                    return Ok(Output::Event(ev));
                }
            }
            ScriptCommand::Remove(id) => {
                self.workspace.remove(PlacementId(id))?;
            }
            ScriptCommand::Scaling(factor) => self.workspace.scaling().set(factor),
            ScriptCommand::Advance(ms) => {
                self.workspace.advance(Duration::from_millis(ms));
            }
            ScriptCommand::Theme(theme) => self.workspace.set_theme(theme),
            ScriptCommand::Overlay(cfg) => self.workspace.set_overlay(cfg)?,
            ScriptCommand::Redraw => self.workspace.redraw_overlay(),
            ScriptCommand::Dump => return Ok(Output::Snapshot(self.snapshot())),
        }
        Ok(Output::Nothing)
    }

    /// Run every line of `reader`, writing events and snapshots to `out`.
    ///
    /// Only I/O errors on `out` or `reader` abort the run.
    pub fn run<R: BufRead, W: Write>(&mut self, reader: R, out: &mut W) -> Result<(), ScriptError> {
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            let text = line.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            let command = match serde_json::from_str::<ScriptCommand>(text) {
                Ok(c) => c,
                Err(e) => {
                    error!("line {}: bad command: {}: {}", n + 1, text, e);
                    continue;
                }
            };
            let json = match self.apply(command) {
                Ok(Output::Nothing) => continue,
                Ok(Output::Event(ev)) => serde_json::to_string(&ev)?,
                Ok(Output::Snapshot(snap)) => serde_json::to_string(&snap)?,
                Err(e) => {
                    error!("line {}: {}", n + 1, e);
                    continue;
                }
            };
            writeln!(out, "{}", json)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(script: &str) -> (Replay, Vec<serde_json::Value>) {
        run_with(&Config::default(), script)
    }

    fn run_with(config: &Config, script: &str) -> (Replay, Vec<serde_json::Value>) {
        let mut replay = Replay::new(config).unwrap();
        let mut out = Vec::new();
        replay.run(script.as_bytes(), &mut out).unwrap();
        let lines = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        (replay, lines)
    }

    #[test]
    fn parses_commands() {
        let cmd: ScriptCommand =
            serde_json::from_str(r#"{"Place":{"kind":"btn","at":[1.9,2.1]}}"#).unwrap();
        assert_eq!(
            cmd,
            ScriptCommand::Place {
                kind: ElementKind::Button,
                at: (1.9, 2.1),
                size: None,
                options: PlaceOptions::default(),
            }
        );
        let cmd: ScriptCommand =
            serde_json::from_str(r#"{"Release":{"id":3,"x":1,"y":2,"handle":true}}"#).unwrap();
        assert_eq!(
            cmd,
            ScriptCommand::Release(PointerAction { id: 3, x: 1.0, y: 2.0, handle: true, part: None })
        );
        assert_eq!(serde_json::from_str::<ScriptCommand>(r#""Dump""#).unwrap(), ScriptCommand::Dump);
        assert_eq!(
            serde_json::from_str::<ScriptCommand>(r#"{"Theme":"light"}"#).unwrap(),
            ScriptCommand::Theme(Theme::Light)
        );
    }

    #[test]
    fn scenario_script() {
        let script = r#"
            {"Place":{"kind":"button","at":[1,1],"size":[2,1],"options":{"text":"Go"}}}
            {"EnableDrag":0}
            {"Press":{"id":0,"x":60,"y":60}}
            {"Move":{"id":0,"x":52,"y":52}}
            {"Release":{"id":0,"x":160,"y":160}}
            "Dump"
        "#;
        let (replay, lines) = run(script);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "moved");
        assert_eq!(lines[0]["position"]["col"], 3);
        let placement = &lines[1]["placements"][0];
        assert_eq!(placement["kind"], "Button");
        assert_eq!(placement["position"]["row"], 3);
        assert_eq!(placement["size"]["cols"], 2);
        assert_eq!(
            replay.workspace().grid_position(PlacementId(0)).unwrap(),
            GridUnit::new(3, 3)
        );
    }

    #[test]
    fn bad_lines_are_skipped() {
        let script = r#"
            not json
            {"EnableDrag":7}
            # comment
            {"Place":{"kind":"label","at":[0,0]}}
            "Dump"
        "#;
        let (_, lines) = run(script);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["placements"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn resize_through_handle_and_part_drag() {
        let script = r#"
            {"Place":{"kind":"table","at":[0,0],"size":[2,2]}}
            {"EnableResize":0}
            {"EnableDrag":0}
            {"Press":{"id":0,"x":90,"y":90,"handle":true}}
            {"Release":{"id":0,"x":190,"y":90,"handle":true}}
            {"Press":{"id":0,"x":10,"y":10,"part":1}}
            {"Release":{"id":0,"x":60,"y":110,"part":1}}
        "#;
        let (replay, lines) = run(script);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "resized");
        assert_eq!(lines[0]["size"]["cols"], 4);
        assert_eq!(lines[1]["event"], "moved");
        let ws = replay.workspace();
        assert_eq!(ws.grid_size(PlacementId(0)).unwrap(), GridExtent::new(4, 2).unwrap());
        assert_eq!(ws.grid_position(PlacementId(0)).unwrap(), GridUnit::new(1, 2));
    }

    #[test]
    fn numeric_typing() {
        let script = r#"
            {"Place":{"kind":"number","at":[0,0],"options":{"numeric":{"min":1,"max":10}}}}
            {"Type":{"id":0,"text":"11"}}
            {"Type":{"id":0,"text":"7"}}
        "#;
        let (_, lines) = run(script);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["change"]["number"], 7);
    }

    #[test]
    fn overlay_dump_after_advance() {
        let mut cfg = Config::default();
        cfg.grid.cols = 12;
        cfg.grid.rows = 8;
        cfg.overlay.show_grid = true;
        let script = r#"
            {"Scaling":2.0}
            "Dump"
            {"Advance":200}
            "Dump"
        "#;
        let (_, lines) = run_with(&cfg, script);
        assert!(lines[0].get("overlay").is_none());
        let overlay = &lines[1]["overlay"];
        assert_eq!(overlay["labels"].as_array().unwrap().len(), 96);
        assert_eq!(overlay["font_size"], 16);
        assert_eq!(lines[1]["time_ms"], 200);
        assert_eq!(lines[1]["window"], serde_json::json!([600, 400]));
    }

    #[test]
    fn out_of_range_place_and_missing_part_are_skipped() {
        let script = r#"
            {"Place":{"kind":"label","at":[1e18,0]}}
            {"Place":{"kind":"table","at":[0,0]}}
            {"EnableDrag":0}
            {"Press":{"id":0,"x":10,"y":10,"part":9}}
            "Dump"
        "#;
        let (mut replay, lines) = run(script);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["placements"].as_array().unwrap().len(), 1);
        let err = replay
            .apply(ScriptCommand::Press(PointerAction { id: 0, x: 0.0, y: 0.0, handle: false, part: Some(9) }))
            .err();
        assert!(matches!(err, Some(ScriptError::NoSuchPart { id: 0, part: 9 })));
    }
}
