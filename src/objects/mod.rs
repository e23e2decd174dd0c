//! Index arenas of hosts, services and dependency edges
//!
//! Handles (`HostId`, `ServiceId`, `DependencyId`) are minted only by this
//! store and objects are never removed, so a handle obtained from it always
//! addresses a live record.

pub mod definitions;


pub use definitions::ObjectDefinitions;

use std::collections::HashMap;

use crate::dependency::{DependencyKind, HostDependency, ServiceDependency};
use crate::error::VigilError;
use crate::models::{DependencyId, Host, HostId, Service, ServiceId};

#[derive(Debug, Clone, Default)]
pub struct ObjectStore {
    pub hosts: Vec<Host>,
    pub services: Vec<Service>,
    pub host_dependencies: Vec<HostDependency>,
    pub service_dependencies: Vec<ServiceDependency>,
    /// Command definitions referenced by `check_command`
    pub commands: HashMap<String, String>,
    host_index: HashMap<String, HostId>,
    service_index: HashMap<(String, String), ServiceId>,
}

impl ObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_host(&mut self, name: &str) -> Result<HostId, VigilError> {
        if self.host_index.contains_key(name) {
            return Err(VigilError::DuplicateName(name.to_string()));
        }
        let id = HostId(self.hosts.len());
        self.hosts.push(Host::new(id, name));
        self.host_index.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn add_service(&mut self, host: HostId, description: &str) -> Result<ServiceId, VigilError> {
        let host_name = self
            .hosts
            .get(host.index())
            .map(|h| h.name.clone())
            .ok_or_else(|| VigilError::UnknownHost(host.to_string()))?;
        let key = (host_name.clone(), description.to_string());
        if self.service_index.contains_key(&key) {
            return Err(VigilError::DuplicateName(format!("{host_name}/{description}")));
        }
        let id = ServiceId(self.services.len());
        self.services
            .push(Service::new(id, host, host_name, description));
        self.service_index.insert(key, id);
        self.hosts[host.index()].services.push(id);
        Ok(id)
    }

    /// Link `child` below `parent`, keeping both sides of the relation
    pub fn add_parent(&mut self, child: HostId, parent: HostId) {
        if !self.hosts[child.index()].parents.contains(&parent) {
            self.hosts[child.index()].parents.push(parent);
            self.hosts[parent.index()].children.push(child);
        }
    }

    pub fn add_service_parent(&mut self, child: ServiceId, parent: ServiceId) {
        if !self.services[child.index()].parents.contains(&parent) {
            self.services[child.index()].parents.push(parent);
        }
    }

    pub fn add_host_dependency(&mut self, dependency: HostDependency) -> DependencyId {
        let id = DependencyId(self.host_dependencies.len());
        let dependent = &mut self.hosts[dependency.dependent.index()];
        match dependency.kind {
            DependencyKind::Execution => dependent.exec_dependencies.push(id),
            DependencyKind::Notification => dependent.notify_dependencies.push(id),
        }
        self.host_dependencies.push(dependency);
        id
    }

    pub fn add_service_dependency(&mut self, dependency: ServiceDependency) -> DependencyId {
        let id = DependencyId(self.service_dependencies.len());
        let dependent = &mut self.services[dependency.dependent.index()];
        match dependency.kind {
            DependencyKind::Execution => dependent.exec_dependencies.push(id),
            DependencyKind::Notification => dependent.notify_dependencies.push(id),
        }
        self.service_dependencies.push(dependency);
        id
    }

    pub fn find_host(&self, name: &str) -> Option<HostId> {
        self.host_index.get(name).copied()
    }

    pub fn find_service(&self, host_name: &str, description: &str) -> Option<ServiceId> {
        self.service_index
            .get(&(host_name.to_string(), description.to_string()))
            .copied()
    }

    pub fn host(&self, id: HostId) -> &Host {
        &self.hosts[id.index()]
    }

    pub fn host_mut(&mut self, id: HostId) -> &mut Host {
        &mut self.hosts[id.index()]
    }

    pub fn service(&self, id: ServiceId) -> &Service {
        &self.services[id.index()]
    }

    pub fn service_mut(&mut self, id: ServiceId) -> &mut Service {
        &mut self.services[id.index()]
    }

    pub fn host_ids(&self) -> impl Iterator<Item = HostId> {
        (0..self.hosts.len()).map(HostId)
    }

    pub fn service_ids(&self) -> impl Iterator<Item = ServiceId> {
        (0..self.services.len()).map(ServiceId)
    }

    /// Masters of the dependencies `service` has of the given kind
    pub fn service_masters(&self, service: ServiceId, kind: DependencyKind) -> Vec<ServiceId> {
        let svc = self.service(service);
        let edges = match kind {
            DependencyKind::Execution => &svc.exec_dependencies,
            DependencyKind::Notification => &svc.notify_dependencies,
        };
        edges
            .iter()
            .filter_map(|id| self.service_dependencies.get(id.index()))
            .map(|dependency| dependency.master)
            .collect()
    }

    pub fn host_masters(&self, host: HostId, kind: DependencyKind) -> Vec<HostId> {
        let h = self.host(host);
        let edges = match kind {
            DependencyKind::Execution => &h.exec_dependencies,
            DependencyKind::Notification => &h.notify_dependencies,
        };
        edges
            .iter()
            .filter_map(|id| self.host_dependencies.get(id.index()))
            .map(|dependency| dependency.master)
            .collect()
    }
}
