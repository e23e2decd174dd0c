//! Status command - prints the snapshot published by a running engine

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use serde_json::Value;
use std::path::PathBuf;

use super::common::load_config;
use crate::engine::StatusFileWriter;

fn colored_state(state: &str) -> ColoredString {
    match state {
        "ok" | "up" => state.to_uppercase().green(),
        "warning" => state.to_uppercase().yellow(),
        "critical" | "down" => state.to_uppercase().red(),
        "unreachable" => state.to_uppercase().magenta(),
        _ => state.to_uppercase().dimmed(),
    }
}

fn field<'a>(value: &'a Value, key: &str) -> &'a str {
    value[key].as_str().unwrap_or("-")
}

/// One display line per host and service, problems only unless `all`
pub fn render(status: &Value, all: bool) -> Vec<String> {
    let mut lines = Vec::new();
    let is_problem = |state: &str| !matches!(state, "ok" | "up");

    for host in status["hosts"].as_array().into_iter().flatten() {
        let state = field(host, "current_state");
        if all || is_problem(state) {
            lines.push(format!(
                "{:<11} {:<4} {} {}",
                colored_state(state),
                field(host, "state_type"),
                field(host, "name").bold(),
                field(host, "plugin_output").dimmed()
            ));
        }
    }
    for service in status["services"].as_array().into_iter().flatten() {
        let state = field(service, "current_state");
        if all || is_problem(state) {
            lines.push(format!(
                "{:<11} {:<4} {}/{} {}",
                colored_state(state),
                field(service, "state_type"),
                field(service, "host_name"),
                field(service, "description").bold(),
                field(service, "plugin_output").dimmed()
            ));
        }
    }
    lines
}

/// Execute the status command
pub fn execute(config_path: Option<PathBuf>, all: bool) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let path = config
        .status_file
        .context("No status_file configured; the engine is not publishing status")?;
    let status = StatusFileWriter::new(path).read()?;

    println!(
        "{} generated {}, {} scheduled checks, {} running",
        "Status:".bold(),
        field(&status, "generated_at"),
        status["scheduled_checks"].as_u64().unwrap_or(0),
        status["running_service_checks"].as_u64().unwrap_or(0)
            + status["running_host_checks"].as_u64().unwrap_or(0)
    );

    let lines = render(&status, all);
    if lines.is_empty() {
        println!("{} No problems", "✓".green().bold());
    }
    for line in lines {
        println!("  {line}");
    }
    Ok(())
}
