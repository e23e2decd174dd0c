//! Crash-safe on-disk check result spool
//!
//! A result becomes visible to the reaper only once its file has been fully
//! written, synced and renamed into place, and its `.ok` marker exists.
//! Writers never hold locks; the marker is the commit point.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, warn};

use super::format::{parse_result_file, write_result_file};
use crate::models::CheckResult;

/// Suffix of the zero-byte marker committed after each result file
pub const MARKER_SUFFIX: &str = ".ok";

/// Prefix of committed result files
const RESULT_PREFIX: char = 'c';

#[derive(Debug, Clone)]
pub struct Spool {
    dir: PathBuf,
    /// Result files older than this many seconds are discarded unread (0 = keep all)
    max_file_age: u64,
}

impl Spool {
    /// Open (creating if needed) a spool directory
    pub fn open(dir: impl Into<PathBuf>, max_file_age: u64) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create spool directory: {}", dir.display()))?;
        Ok(Self { dir, max_file_age })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Durably commit one result and return the path of its file
    pub fn commit(&self, result: &CheckResult, now: DateTime<Utc>) -> Result<PathBuf> {
        let content = write_result_file(result, now);

        let mut temp = tempfile::Builder::new()
            .prefix(".check")
            .tempfile_in(&self.dir)
            .with_context(|| format!("Failed to create temp file in {}", self.dir.display()))?;
        temp.write_all(content.as_bytes())
            .context("Failed to write check result")?;
        temp.flush().context("Failed to flush check result")?;
        temp.as_file()
            .sync_all()
            .context("Failed to sync check result")?;

        let target = self.dir.join(format!(
            "{}{}",
            RESULT_PREFIX,
            uuid::Uuid::new_v4().simple()
        ));
        if let Err(e) = temp.persist_noclobber(&target) {
            // Fall back to copy + unlink when a rename is not possible
            debug!("Rename into spool failed ({}), copying instead", e.error);
            fs::copy(e.file.path(), &target)
                .with_context(|| format!("Failed to copy check result to {}", target.display()))?;
            File::open(&target)
                .and_then(|f| f.sync_all())
                .with_context(|| format!("Failed to sync {}", target.display()))?;
        }

        let marker = marker_path(&target);
        File::create(&marker)
            .and_then(|f| f.sync_all())
            .with_context(|| format!("Failed to create marker {}", marker.display()))?;
        Ok(target)
    }

    /// Collect committed results, deleting their files. Stops early once
    /// `budget` has elapsed or `shutdown` is raised, leaving the rest for the
    /// next pass.
    pub fn reap(
        &self,
        budget: Duration,
        shutdown: &AtomicBool,
        now: DateTime<Utc>,
    ) -> Result<Vec<CheckResult>> {
        let started = Instant::now();
        let mut results = Vec::new();

        let entries = fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read spool directory: {}", self.dir.display()))?;
        let mut candidates: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.starts_with(RESULT_PREFIX) && !name.ends_with(MARKER_SUFFIX)
            })
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        candidates.sort();

        for path in candidates {
            if shutdown.load(Ordering::SeqCst) {
                debug!("Shutdown requested, leaving remaining check results in spool");
                break;
            }
            if started.elapsed() >= budget {
                warn!(
                    "Check result reaper exceeded its {}s budget, continuing next pass",
                    budget.as_secs()
                );
                break;
            }

            if self.is_too_old(&path) {
                warn!("Discarding stale check result file {}", path.display());
                remove_result(&path);
                continue;
            }

            let marker = marker_path(&path);
            if !marker.exists() {
                continue;
            }

            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    error!("Failed to read check result {}: {}", path.display(), e);
                    remove_result(&path);
                    continue;
                }
            };
            let parsed = parse_result_file(&content, now, self.max_file_age);
            if parsed.expired {
                warn!("Discarding expired check result file {}", path.display());
            }
            for mut result in parsed.results {
                result.output_file = Some(path.clone());
                results.push(result);
            }
            remove_result(&path);
        }

        if !results.is_empty() {
            debug!("Reaped {} check result(s)", results.len());
        }
        Ok(results)
    }

    fn is_too_old(&self, path: &Path) -> bool {
        if self.max_file_age == 0 {
            return false;
        }
        let modified = fs::metadata(path).and_then(|m| m.modified());
        match modified {
            Ok(modified) => SystemTime::now()
                .duration_since(modified)
                .map(|age| age.as_secs() > self.max_file_age)
                .unwrap_or(false),
            Err(_) => false,
        }
    }
}

fn marker_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(MARKER_SUFFIX);
    PathBuf::from(name)
}

fn remove_result(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Failed to remove check result {}: {}", path.display(), e);
    }
    let marker = marker_path(path);
    if marker.exists() {
        if let Err(e) = fs::remove_file(&marker) {
            warn!("Failed to remove marker {}: {}", marker.display(), e);
        }
    }
}
