//! Run command - starts the check engine in the foreground

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use tracing::{debug, info};

use super::common::{acquire_engine_lock, load_config, load_objects};
use crate::engine::{Engine, StatusFileWriter};

/// Execute the run command. Blocks until Ctrl+C or SIGTERM.
pub fn execute(config_path: Option<PathBuf>, objects_path: PathBuf) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let (objects, periods) = load_objects(&objects_path, &config)?;
    let _lock = acquire_engine_lock(&config.check_result_path)?;

    let last_seen = config.status_file.as_deref().and_then(previous_run_end);
    let mut engine = Engine::new(config, objects, periods)?;
    engine.set_program_times(Utc::now(), last_seen);
    if let Some(stop) = last_seen {
        info!("Previous engine run last seen at {}", stop);
    }

    let shutdown = engine.shutdown_flag();
    ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    println!(
        "{} Check engine running ({} hosts, {} services), Ctrl+C to stop",
        "→".cyan().bold(),
        engine.objects().hosts.len(),
        engine.objects().services.len()
    );
    engine.run()?;
    println!("{} Check engine stopped", "✓".green().bold());
    Ok(())
}

/// When the previous run last published its status. A clean shutdown
/// writes a final snapshot, so this is its stop time; after a crash it
/// is the last moment the engine was known to be alive.
fn previous_run_end(path: &Path) -> Option<DateTime<Utc>> {
    if !path.exists() {
        return None;
    }
    let status = match StatusFileWriter::new(path.to_path_buf()).read() {
        Ok(status) => status,
        Err(e) => {
            debug!("Ignoring unreadable status file: {:#}", e);
            return None;
        }
    };
    status["generated_at"]
        .as_str()
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|t| t.with_timezone(&Utc))
}
