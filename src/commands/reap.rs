//! Reap command - applies whatever is waiting in the spool once

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use std::path::PathBuf;

use super::common::{acquire_engine_lock, load_config, load_objects};
use super::status::render;
use crate::engine::Engine;

/// Execute one reaper pass. Refuses to run next to a live engine, which
/// would otherwise race it for the same files.
pub fn execute(config_path: Option<PathBuf>, objects_path: PathBuf) -> Result<()> {
    let mut config = load_config(config_path.as_deref())?;
    let (objects, periods) = load_objects(&objects_path, &config)?;
    let _lock = acquire_engine_lock(&config.check_result_path)?;
    // A one-off pass has no history to publish
    config.status_file = None;

    let mut engine = Engine::new(config, objects, periods)?;
    let now = Utc::now();
    let reaped = engine.reap_results(now);
    let applied = engine.process_results(now);
    println!(
        "{} Reaped {} result(s), applied {}",
        "✓".green().bold(),
        reaped,
        applied
    );

    let snapshot = engine.snapshot(now).to_json()?;
    let mut status: serde_json::Value =
        serde_json::from_str(&snapshot).context("Failed to read back status snapshot")?;
    for key in ["hosts", "services"] {
        if let Some(entries) = status[key].as_array_mut() {
            entries.retain(|entry| entry["has_been_checked"].as_bool().unwrap_or(false));
        }
    }
    for line in render(&status, true) {
        println!("  {line}");
    }
    Ok(())
}
