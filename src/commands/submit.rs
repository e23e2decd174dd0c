//! Submit command - queues a passive check result for the engine

use anyhow::{bail, Result};
use chrono::Utc;
use colored::Colorize;
use std::path::PathBuf;

use super::common::load_config;
use crate::models::CheckResult;
use crate::queue::Spool;

/// A passive result as given on the command line
#[derive(Debug, Clone)]
pub struct Submission {
    pub host: String,
    pub service: Option<String>,
    pub return_code: i32,
    pub output: String,
}

impl Submission {
    fn into_result(self) -> Result<CheckResult> {
        let names = std::iter::once(&self.host).chain(self.service.as_ref());
        for name in names {
            if name.contains(['\n', '\r']) {
                bail!("Names may not contain line breaks: {:?}", name);
            }
        }
        let now = Utc::now();
        match self.service {
            Some(service) => {
                if !(0..=3).contains(&self.return_code) {
                    bail!(
                        "Service return code must be 0-3, got {}",
                        self.return_code
                    );
                }
                Ok(CheckResult::passive_service(
                    self.host,
                    service,
                    self.return_code,
                    self.output,
                    now,
                ))
            }
            None => {
                if !(0..=2).contains(&self.return_code) {
                    bail!("Host return code must be 0-2, got {}", self.return_code);
                }
                Ok(CheckResult::passive_host(
                    self.host,
                    self.return_code,
                    self.output,
                    now,
                ))
            }
        }
    }
}

/// Commit `submission` into the spool named by the configuration
pub fn execute(config_path: Option<PathBuf>, submission: Submission) -> Result<()> {
    let config = load_config(config_path.as_deref())?;
    let spool = Spool::open(&config.check_result_path, config.max_check_result_file_age)?;
    let result = submission.into_result()?;
    let target = result.target_name();
    let path = spool.commit(&result, Utc::now())?;

    println!(
        "{} Queued passive result for {} ({})",
        "✓".green().bold(),
        target.bold(),
        path.display().to_string().dimmed()
    );
    Ok(())
}
