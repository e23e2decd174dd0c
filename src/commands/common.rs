//! Loading helpers shared by the commands

use anyhow::{bail, Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::Path;

use crate::config::EngineConfig;
use crate::objects::{ObjectDefinitions, ObjectStore};
use crate::timeperiod::TimePeriods;

/// Name of the lock file a running engine holds inside its spool
pub const ENGINE_LOCK_FILE: &str = ".vigil.lock";

pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    EngineConfig::load(path)
}

/// Parse object definitions and resolve them against `config`'s calendar
pub fn load_objects(path: &Path, config: &EngineConfig) -> Result<(ObjectStore, TimePeriods)> {
    let definitions = ObjectDefinitions::load(path)?;
    definitions
        .build(config.calendar)
        .with_context(|| format!("Invalid object definitions in {}", path.display()))
}

/// Take the engine lock for a spool directory. The lock is held for as
/// long as the returned file stays open.
pub fn acquire_engine_lock(spool_dir: &Path) -> Result<File> {
    fs::create_dir_all(spool_dir)
        .with_context(|| format!("Failed to create spool directory: {}", spool_dir.display()))?;
    let path = spool_dir.join(ENGINE_LOCK_FILE);
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("Failed to open lock file: {}", path.display()))?;
    if file.try_lock_exclusive().is_err() {
        bail!(
            "Another engine is already running on {}",
            spool_dir.display()
        );
    }
    Ok(file)
}
