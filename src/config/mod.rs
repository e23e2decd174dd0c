//! Engine configuration
//!
//! Loaded from a TOML file. Every key is optional; missing keys take the
//! defaults below. Durations are plain seconds, check and retry intervals
//! on objects are multiples of `interval_length`.


use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::models::ServiceState;
use crate::timeperiod::Calendar;

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "VIGIL_CONFIG";

pub const DEFAULT_INTERVAL_LENGTH: u64 = 60;
pub const DEFAULT_REAPER_FREQUENCY: u64 = 10;
pub const DEFAULT_MAX_REAPER_TIME: u64 = 30;
pub const DEFAULT_MAX_RESULT_FILE_AGE: u64 = 3600;
pub const DEFAULT_SERVICE_CHECK_TIMEOUT: u64 = 60;
pub const DEFAULT_HOST_CHECK_TIMEOUT: u64 = 30;
pub const DEFAULT_FRESHNESS_CHECK_INTERVAL: u64 = 60;
pub const DEFAULT_ADDITIONAL_FRESHNESS_LATENCY: u64 = 15;
pub const DEFAULT_CACHED_CHECK_HORIZON: u64 = 15;
pub const DEFAULT_ORPHAN_CHECK_INTERVAL: u64 = 60;
pub const DEFAULT_LOW_FLAP_THRESHOLD: f64 = 20.0;
pub const DEFAULT_HIGH_FLAP_THRESHOLD: f64 = 30.0;
pub const DEFAULT_MAX_CHECK_SPREAD: u64 = 30;
pub const DEFAULT_CHECK_DEFERRAL: u64 = 5;
pub const DEFAULT_STATUS_UPDATE_INTERVAL: u64 = 10;

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds in one interval unit
    pub interval_length: u64,
    pub check_result_path: PathBuf,
    pub check_result_reaper_frequency: u64,
    pub max_check_result_reaper_time: u64,
    /// Result files older than this are discarded unread (0 = unlimited)
    pub max_check_result_file_age: u64,
    pub service_check_timeout: u64,
    pub host_check_timeout: u64,
    /// State recorded for a service check that timed out
    pub service_check_timeout_state: ServiceState,
    pub execute_service_checks: bool,
    pub execute_host_checks: bool,
    pub accept_passive_service_checks: bool,
    pub accept_passive_host_checks: bool,
    pub check_service_freshness: bool,
    pub check_host_freshness: bool,
    pub service_freshness_check_interval: u64,
    pub host_freshness_check_interval: u64,
    pub additional_freshness_latency: u64,
    pub cached_host_check_horizon: u64,
    pub cached_service_check_horizon: u64,
    /// Let a service state change be judged against a cached host state
    /// instead of forcing a fresh host check
    pub cached_state_on_state_change: bool,
    pub enable_predictive_host_dependency_checks: bool,
    pub enable_predictive_service_dependency_checks: bool,
    pub soft_state_dependencies: bool,
    /// Treat WARNING host check results as DOWN
    pub use_aggressive_host_checking: bool,
    pub passive_host_checks_are_soft: bool,
    /// Re-run reachability on passive DOWN/UNREACHABLE host results
    pub translate_passive_host_checks: bool,
    pub host_down_disable_service_checks: bool,
    pub check_for_orphaned_services: bool,
    pub check_for_orphaned_hosts: bool,
    pub orphan_check_interval: u64,
    pub enable_flap_detection: bool,
    pub low_service_flap_threshold: f64,
    pub high_service_flap_threshold: f64,
    pub low_host_flap_threshold: f64,
    pub high_host_flap_threshold: f64,
    pub obsess_over_services: bool,
    pub obsess_over_hosts: bool,
    /// Initial checks are spread over this many interval units
    pub max_service_check_spread: u64,
    pub max_host_check_spread: u64,
    /// Service checks allowed in flight at once (0 = unlimited)
    pub max_concurrent_checks: usize,
    /// Delay applied to a check deferred by `max_concurrent_checks`
    pub check_deferral: u64,
    pub status_file: Option<PathBuf>,
    pub status_update_interval: u64,
    pub calendar: Calendar,
    pub log_passive_checks: bool,
    pub log_host_retries: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interval_length: DEFAULT_INTERVAL_LENGTH,
            check_result_path: default_check_result_path(),
            check_result_reaper_frequency: DEFAULT_REAPER_FREQUENCY,
            max_check_result_reaper_time: DEFAULT_MAX_REAPER_TIME,
            max_check_result_file_age: DEFAULT_MAX_RESULT_FILE_AGE,
            service_check_timeout: DEFAULT_SERVICE_CHECK_TIMEOUT,
            host_check_timeout: DEFAULT_HOST_CHECK_TIMEOUT,
            service_check_timeout_state: ServiceState::Critical,
            execute_service_checks: true,
            execute_host_checks: true,
            accept_passive_service_checks: true,
            accept_passive_host_checks: true,
            check_service_freshness: true,
            check_host_freshness: false,
            service_freshness_check_interval: DEFAULT_FRESHNESS_CHECK_INTERVAL,
            host_freshness_check_interval: DEFAULT_FRESHNESS_CHECK_INTERVAL,
            additional_freshness_latency: DEFAULT_ADDITIONAL_FRESHNESS_LATENCY,
            cached_host_check_horizon: DEFAULT_CACHED_CHECK_HORIZON,
            cached_service_check_horizon: DEFAULT_CACHED_CHECK_HORIZON,
            cached_state_on_state_change: true,
            enable_predictive_host_dependency_checks: true,
            enable_predictive_service_dependency_checks: true,
            soft_state_dependencies: false,
            use_aggressive_host_checking: false,
            passive_host_checks_are_soft: false,
            translate_passive_host_checks: false,
            host_down_disable_service_checks: false,
            check_for_orphaned_services: true,
            check_for_orphaned_hosts: true,
            orphan_check_interval: DEFAULT_ORPHAN_CHECK_INTERVAL,
            enable_flap_detection: true,
            low_service_flap_threshold: DEFAULT_LOW_FLAP_THRESHOLD,
            high_service_flap_threshold: DEFAULT_HIGH_FLAP_THRESHOLD,
            low_host_flap_threshold: DEFAULT_LOW_FLAP_THRESHOLD,
            high_host_flap_threshold: DEFAULT_HIGH_FLAP_THRESHOLD,
            obsess_over_services: false,
            obsess_over_hosts: false,
            max_service_check_spread: DEFAULT_MAX_CHECK_SPREAD,
            max_host_check_spread: DEFAULT_MAX_CHECK_SPREAD,
            max_concurrent_checks: 0,
            check_deferral: DEFAULT_CHECK_DEFERRAL,
            status_file: None,
            status_update_interval: DEFAULT_STATUS_UPDATE_INTERVAL,
            calendar: Calendar::Local,
            log_passive_checks: true,
            log_host_retries: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration. With no explicit path, `VIGIL_CONFIG` is
    /// consulted, then the per-user default location; a missing default
    /// file yields the built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&env_path));
        }
        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid engine configuration")
    }

    /// Return code recorded for a timed-out service check
    pub fn service_timeout_return_code(&self) -> i32 {
        self.service_check_timeout_state.code()
    }

    pub fn reaper_frequency(&self) -> Duration {
        Duration::from_secs(self.check_result_reaper_frequency.max(1))
    }

    pub fn max_reaper_time(&self) -> Duration {
        Duration::from_secs(self.max_check_result_reaper_time)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("vigil").join("vigil.toml"))
}

fn default_check_result_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("vigil").join("checkresults"))
        .unwrap_or_else(|| PathBuf::from("checkresults"))
}
