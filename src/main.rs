//! Entry point for the **gridsnap** replay tool.
//!
//! Replays a newline-delimited JSON script (see [`gridsnap::script`])
//! against a headless workspace and prints every committed gesture, every
//! `"Dump"` and a final snapshot as JSON lines on stdout.
//!
//! ```text
//! gridsnap [--config <path>] [<script>]
//! ```
//!
//! Without a script path the script is read from stdin.  Without
//! `--config`, `$XDG_CONFIG_HOME/gridsnap/config.json` is tried before
//! falling back to compiled-in defaults.

use gridsnap::config::Config;
use gridsnap::script::Replay;
use log::{error, info};
use std::io::{self, BufReader, Write};
use std::path::PathBuf;

/// Resolve the config directory (`$XDG_CONFIG_HOME/gridsnap`).
fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        format!("{}/.config", home)
    });
    PathBuf::from(base).join("gridsnap")
}

/// Load the config named on the command line, or try the default
/// location and fall back to compiled-in defaults.
fn load_config(explicit: Option<&PathBuf>) -> Config {
    if let Some(path) = explicit {
        match Config::load(path) {
            Ok(cfg) => {
                info!("loaded config from {}", path.display());
                return cfg;
            }
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    }
    let path = config_dir().join("config.json");
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            Config::default()
        }
    }
}

struct Args {
    config: Option<PathBuf>,
    script: Option<PathBuf>,
}

fn parse_args() -> Args {
    let mut args = Args {
        config: None,
        script: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" | "-c" => match it.next() {
                Some(p) => args.config = Some(PathBuf::from(p)),
                None => {
                    error!("--config needs a path");
                    std::process::exit(2);
                }
            },
            "--help" | "-h" => {
                println!("usage: gridsnap [--config <path>] [<script>]");
                std::process::exit(0);
            }
            _ => args.script = Some(PathBuf::from(arg)),
        }
    }
    args
}

fn main() {
    env_logger::init();

    let args = parse_args();
    let config = load_config(args.config.as_ref());

    let mut replay = match Replay::new(&config) {
        Ok(r) => r,
        Err(e) => {
            error!("cannot build workspace: {}", e);
            std::process::exit(1);
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = match &args.script {
        Some(path) => match std::fs::File::open(path) {
            Ok(file) => replay.run(BufReader::new(file), &mut out),
            Err(e) => {
                error!("cannot open {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => replay.run(io::stdin().lock(), &mut out),
    };
    if let Err(e) = result {
        error!("replay aborted: {}", e);
        std::process::exit(1);
    }

    match serde_json::to_string(&replay.snapshot()) {
        Ok(json) => {
            if let Err(e) = writeln!(out, "{}", json) {
                error!("write failed: {}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("cannot serialize snapshot: {}", e);
            std::process::exit(1);
        }
    }
}
