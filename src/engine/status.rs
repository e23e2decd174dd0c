//! JSON status snapshot of the engine
//!
//! The snapshot borrows the object arenas, so producing one costs nothing
//! beyond the serialization. [`StatusFileWriter`] publishes it under an
//! advisory lock so readers never see a half-written file.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use super::Engine;
use crate::models::{Host, Service};
use crate::monitor::CheckStatKind;

/// 1/5/15 minute counts for one kind of check
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckRate {
    pub kind: CheckStatKind,
    pub last_1_min: u32,
    pub last_5_min: u32,
    pub last_15_min: u32,
}

#[derive(Debug, Serialize)]
pub struct StatusSnapshot<'a> {
    pub generated_at: DateTime<Utc>,
    pub program_start: DateTime<Utc>,
    pub last_program_stop: Option<DateTime<Utc>>,
    pub running_service_checks: usize,
    pub running_host_checks: usize,
    pub scheduled_checks: usize,
    pub pending_results: usize,
    pub check_rates: Vec<CheckRate>,
    pub hosts: &'a [Host],
    pub services: &'a [Service],
}

impl<'a> StatusSnapshot<'a> {
    /// Rates come from the last `CheckStats::generate` pass
    pub fn capture(engine: &'a Engine, now: DateTime<Utc>) -> Self {
        let check_rates = CheckStatKind::ALL
            .iter()
            .map(|&kind| {
                let [last_1_min, last_5_min, last_15_min] = engine.stats.rates(kind);
                CheckRate {
                    kind,
                    last_1_min,
                    last_5_min,
                    last_15_min,
                }
            })
            .collect();

        Self {
            generated_at: now,
            program_start: engine.program_start,
            last_program_stop: engine.last_program_stop,
            running_service_checks: engine.running_service_checks,
            running_host_checks: engine.running_host_checks,
            scheduled_checks: engine.events.len(),
            pending_results: engine.results.len(),
            check_rates,
            hosts: &engine.objects.hosts,
            services: &engine.objects.services,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize status snapshot")
    }
}

/// Writes snapshots to a fixed path
#[derive(Debug, Clone)]
pub struct StatusFileWriter {
    path: PathBuf,
}

impl StatusFileWriter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the file's content with `snapshot`.
    ///
    /// The sequence is: open → lock → truncate → write → flush. Truncating
    /// only once the exclusive lock is held keeps a locked reader from
    /// seeing an empty file.
    pub fn write(&self, snapshot: &StatusSnapshot<'_>) -> Result<()> {
        let content = snapshot.to_json()?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        #[allow(clippy::suspicious_open_options)]
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open status file: {}", self.path.display()))?;
        file.lock_exclusive().with_context(|| {
            format!("Failed to acquire exclusive lock: {}", self.path.display())
        })?;
        file.set_len(0)
            .with_context(|| format!("Failed to truncate status file: {}", self.path.display()))?;
        let mut writer = BufWriter::new(&file);
        writer
            .write_all(content.as_bytes())
            .with_context(|| format!("Failed to write status file: {}", self.path.display()))?;
        writer
            .flush()
            .with_context(|| format!("Failed to flush status file: {}", self.path.display()))?;
        Ok(())
    }

    /// Read the published snapshot under a shared lock
    pub fn read(&self) -> Result<serde_json::Value> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open status file: {}", self.path.display()))?;
        file.lock_shared()
            .with_context(|| format!("Failed to acquire shared lock: {}", self.path.display()))?;
        let mut content = String::new();
        BufReader::new(&file)
            .read_to_string(&mut content)
            .with_context(|| format!("Failed to read status file: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid status file: {}", self.path.display()))
    }
}
