//! YAML object definitions and their resolution into the object store

use anyhow::{Context, Result};
use chrono::Weekday;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::ObjectStore;
use crate::dependency::{self, Dependency, DependencyKind, FailureOptions};
use crate::error::VigilError;
use crate::models::{HostState, ServiceState, TimePeriodId};
use crate::timeperiod::parse::{parse_date_range, parse_time_ranges};
use crate::timeperiod::{Calendar, TimePeriod, TimePeriods};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObjectDefinitions {
    /// Command name to command line template, e.g.
    /// `check_ping: "/usr/lib/plugins/check_ping -H $HOSTADDRESS$ -w $ARG1$"`
    pub commands: BTreeMap<String, String>,
    pub timeperiods: Vec<TimePeriodDefinition>,
    pub hosts: Vec<HostDefinition>,
    pub services: Vec<ServiceDefinition>,
    pub host_dependencies: Vec<HostDependencyDefinition>,
    pub service_dependencies: Vec<ServiceDependencyDefinition>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TimePeriodDefinition {
    pub name: String,
    pub alias: Option<String>,
    /// Weekday name to time range list, e.g. `monday: "09:00-17:00"`
    pub weekdays: BTreeMap<String, String>,
    /// Calendar exception lines, e.g. `"december 25 00:00-00:00"`
    pub exceptions: Vec<String>,
    pub exclude: Vec<String>,
}

/// Check settings shared by hosts and services; absent values keep the
/// engine defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CheckSettings {
    pub check_command: Option<String>,
    pub check_interval: Option<f64>,
    pub retry_interval: Option<f64>,
    pub max_attempts: Option<u32>,
    pub check_period: Option<String>,
    pub active_checks: Option<bool>,
    pub passive_checks: Option<bool>,
    pub check_freshness: Option<bool>,
    pub freshness_threshold: Option<u64>,
    pub flap_detection: Option<bool>,
    pub low_flap_threshold: Option<f64>,
    pub high_flap_threshold: Option<f64>,
    pub obsess: Option<bool>,
    pub event_handler: Option<bool>,
    pub notifications: Option<bool>,
    /// Letters of states to stalk, e.g. `"o,d,u"` or `"w,c"`
    pub stalking: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HostDefinition {
    pub name: String,
    pub alias: Option<String>,
    pub address: Option<String>,
    pub parents: Vec<String>,
    #[serde(flatten)]
    pub checks: CheckSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceDefinition {
    pub host: String,
    pub description: String,
    pub is_volatile: bool,
    /// Parent services as `host/description`
    pub parents: Vec<String>,
    #[serde(flatten)]
    pub checks: CheckSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostDependencyDefinition {
    pub host: String,
    pub master: String,
    pub kind: DependencyKind,
    #[serde(default)]
    pub fail_on: String,
    #[serde(default)]
    pub inherits_parent: bool,
    #[serde(default)]
    pub period: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDependencyDefinition {
    pub host: String,
    pub service: String,
    pub master_host: String,
    pub master_service: String,
    pub kind: DependencyKind,
    #[serde(default)]
    pub fail_on: String,
    #[serde(default)]
    pub inherits_parent: bool,
    #[serde(default)]
    pub period: Option<String>,
}

impl ObjectDefinitions {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read object definitions: {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse object definitions: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Invalid object definition YAML")
    }

    /// Resolve names into handles and validate the resulting graph
    pub fn build(&self, calendar: Calendar) -> Result<(ObjectStore, TimePeriods), VigilError> {
        let periods = self.build_timeperiods(calendar)?;
        let mut store = ObjectStore::new();
        store.commands = self
            .commands
            .iter()
            .map(|(name, line)| (name.clone(), line.clone()))
            .collect();

        for def in &self.hosts {
            let id = store.add_host(&def.name)?;
            let host = store.host_mut(id);
            if let Some(alias) = &def.alias {
                host.alias = alias.clone();
            }
            if let Some(address) = &def.address {
                host.address = address.clone();
            }
            let checks = &def.checks;
            host.check_command = checks.check_command.clone();
            host.check_interval = checks.check_interval.unwrap_or(host.check_interval);
            host.retry_interval = checks.retry_interval.unwrap_or(host.retry_interval);
            host.max_attempts = checks.max_attempts.unwrap_or(host.max_attempts).max(1);
            host.check_period = resolve_period(&periods, checks.check_period.as_deref())?;
            host.checks_enabled = checks.active_checks.unwrap_or(host.checks_enabled);
            host.accept_passive_checks = checks.passive_checks.unwrap_or(host.accept_passive_checks);
            host.check_freshness = checks.check_freshness.unwrap_or(host.check_freshness);
            host.freshness_threshold = checks.freshness_threshold.unwrap_or(0);
            host.flap_detection_enabled = checks.flap_detection.unwrap_or(host.flap_detection_enabled);
            host.low_flap_threshold = checks.low_flap_threshold.unwrap_or(0.0);
            host.high_flap_threshold = checks.high_flap_threshold.unwrap_or(0.0);
            host.obsess = checks.obsess.unwrap_or(host.obsess);
            host.event_handler_enabled = checks.event_handler.unwrap_or(host.event_handler_enabled);
            host.notifications_enabled = checks.notifications.unwrap_or(host.notifications_enabled);
            host.stalk_on = checks
                .stalking
                .as_deref()
                .map(parse_host_stalking)
                .unwrap_or_default();
        }

        for def in &self.hosts {
            let child = store
                .find_host(&def.name)
                .ok_or_else(|| VigilError::UnknownHost(def.name.clone()))?;
            for parent_name in &def.parents {
                let parent = store
                    .find_host(parent_name)
                    .ok_or_else(|| VigilError::UnknownHost(parent_name.clone()))?;
                store.add_parent(child, parent);
            }
        }

        for def in &self.services {
            let host = store
                .find_host(&def.host)
                .ok_or_else(|| VigilError::UnknownHost(def.host.clone()))?;
            let id = store.add_service(host, &def.description)?;
            let service = store.service_mut(id);
            let checks = &def.checks;
            service.is_volatile = def.is_volatile;
            service.check_command = checks.check_command.clone();
            service.check_interval = checks.check_interval.unwrap_or(service.check_interval);
            service.retry_interval = checks.retry_interval.unwrap_or(service.retry_interval);
            service.max_attempts = checks.max_attempts.unwrap_or(service.max_attempts).max(1);
            service.check_period = resolve_period(&periods, checks.check_period.as_deref())?;
            service.checks_enabled = checks.active_checks.unwrap_or(service.checks_enabled);
            service.accept_passive_checks =
                checks.passive_checks.unwrap_or(service.accept_passive_checks);
            service.check_freshness = checks.check_freshness.unwrap_or(service.check_freshness);
            service.freshness_threshold = checks.freshness_threshold.unwrap_or(0);
            service.flap_detection_enabled =
                checks.flap_detection.unwrap_or(service.flap_detection_enabled);
            service.low_flap_threshold = checks.low_flap_threshold.unwrap_or(0.0);
            service.high_flap_threshold = checks.high_flap_threshold.unwrap_or(0.0);
            service.obsess = checks.obsess.unwrap_or(service.obsess);
            service.event_handler_enabled =
                checks.event_handler.unwrap_or(service.event_handler_enabled);
            service.notifications_enabled =
                checks.notifications.unwrap_or(service.notifications_enabled);
            service.stalk_on = checks
                .stalking
                .as_deref()
                .map(parse_service_stalking)
                .unwrap_or_default();
        }

        for def in &self.services {
            let child = find_service(&store, &def.host, &def.description)?;
            for parent in &def.parents {
                let (host, description) = parent
                    .split_once('/')
                    .ok_or_else(|| VigilError::UnknownService {
                        host: def.host.clone(),
                        service: parent.clone(),
                    })?;
                let parent = find_service(&store, host, description)?;
                store.add_service_parent(child, parent);
            }
        }

        for def in &self.host_dependencies {
            let dependent = store
                .find_host(&def.host)
                .ok_or_else(|| VigilError::UnknownHost(def.host.clone()))?;
            let master = store
                .find_host(&def.master)
                .ok_or_else(|| VigilError::UnknownHost(def.master.clone()))?;
            let mut edge = Dependency::new(dependent, master, def.kind);
            edge.failure_options = FailureOptions::parse(&def.fail_on, true)
                .ok_or_else(|| invalid_failure_options(&def.fail_on))?;
            edge.inherits_parent = def.inherits_parent;
            edge.period = resolve_period(&periods, def.period.as_deref())?;
            store.add_host_dependency(edge);
        }

        for def in &self.service_dependencies {
            let dependent = find_service(&store, &def.host, &def.service)?;
            let master = find_service(&store, &def.master_host, &def.master_service)?;
            let mut edge = Dependency::new(dependent, master, def.kind);
            edge.failure_options = FailureOptions::parse(&def.fail_on, false)
                .ok_or_else(|| invalid_failure_options(&def.fail_on))?;
            edge.inherits_parent = def.inherits_parent;
            edge.period = resolve_period(&periods, def.period.as_deref())?;
            store.add_service_dependency(edge);
        }

        dependency::validate_graph(&store, &periods)?;
        Ok((store, periods))
    }

    fn build_timeperiods(&self, calendar: Calendar) -> Result<TimePeriods, VigilError> {
        let mut periods = TimePeriods::new(calendar);
        for def in &self.timeperiods {
            let mut period = TimePeriod::new(&def.name);
            if let Some(alias) = &def.alias {
                period.alias = alias.clone();
            }
            for (day, ranges) in &def.weekdays {
                let weekday: Weekday = day
                    .parse()
                    .map_err(|_| VigilError::InvalidDateRange(day.clone()))?;
                period.set_day(weekday, parse_time_ranges(ranges)?);
            }
            for line in &def.exceptions {
                period.add_exception(parse_date_range(line)?);
            }
            periods.add(period)?;
        }
        for def in &self.timeperiods {
            let Some(id) = periods.find(&def.name) else {
                continue;
            };
            for name in &def.exclude {
                let excluded = periods
                    .find(name)
                    .ok_or_else(|| VigilError::UnknownTimePeriod(name.clone()))?;
                periods.add_exclusion(id, excluded)?;
            }
        }
        Ok(periods)
    }
}

fn resolve_period(periods: &TimePeriods, name: Option<&str>) -> Result<Option<TimePeriodId>, VigilError> {
    match name {
        None => Ok(None),
        Some(name) => periods
            .find(name)
            .map(Some)
            .ok_or_else(|| VigilError::UnknownTimePeriod(name.to_string())),
    }
}

fn find_service(
    store: &ObjectStore,
    host: &str,
    description: &str,
) -> Result<crate::models::ServiceId, VigilError> {
    store
        .find_service(host, description)
        .ok_or_else(|| VigilError::UnknownService {
            host: host.to_string(),
            service: description.to_string(),
        })
}

fn invalid_failure_options(input: &str) -> VigilError {
    VigilError::InvalidDependency(format!("unknown failure options '{input}'"))
}

fn parse_host_stalking(input: &str) -> Vec<HostState> {
    input
        .split(',')
        .filter_map(|letter| match letter.trim() {
            "o" | "u" => Some(HostState::Up),
            "d" => Some(HostState::Down),
            "r" => Some(HostState::Unreachable),
            _ => None,
        })
        .collect()
}

fn parse_service_stalking(input: &str) -> Vec<ServiceState> {
    input
        .split(',')
        .filter_map(|letter| match letter.trim() {
            "o" => Some(ServiceState::Ok),
            "w" => Some(ServiceState::Warning),
            "c" => Some(ServiceState::Critical),
            "u" => Some(ServiceState::Unknown),
            _ => None,
        })
        .collect()
}
