//! Dependency evaluation against live entity state

use chrono::{DateTime, Utc};
use tracing::warn;

use super::{Dependency, DependencyKind, DependencyResult, MasterState};
use crate::models::{DependencyId, HostId, ServiceId, ServiceState, StateType};
use crate::objects::ObjectStore;
use crate::timeperiod::TimePeriods;

/// Recursion limit for inherited dependency chains and service parents.
/// Cycles are rejected when the object graph is built; this only bounds
/// the walk if one slipped through.
pub const MAX_DEPENDENCY_DEPTH: usize = 64;

/// View over one dependency arena
trait DependencyGraph {
    type Id: Copy;

    fn edges(&self, entity: Self::Id, kind: DependencyKind) -> &[DependencyId];
    fn edge(&self, id: DependencyId) -> Option<&Dependency<Self::Id>>;
    fn master_state(&self, master: Self::Id, soft_state_dependencies: bool) -> MasterState;
    fn describe(&self, entity: Self::Id) -> String;
}

struct HostGraph<'a>(&'a ObjectStore);
struct ServiceGraph<'a>(&'a ObjectStore);

impl DependencyGraph for HostGraph<'_> {
    type Id = HostId;

    fn edges(&self, entity: HostId, kind: DependencyKind) -> &[DependencyId] {
        let host = self.0.host(entity);
        match kind {
            DependencyKind::Execution => &host.exec_dependencies,
            DependencyKind::Notification => &host.notify_dependencies,
        }
    }

    fn edge(&self, id: DependencyId) -> Option<&Dependency<HostId>> {
        self.0.host_dependencies.get(id.index())
    }

    fn master_state(&self, master: HostId, soft_state_dependencies: bool) -> MasterState {
        let host = self.0.host(master);
        if !host.has_been_checked {
            return MasterState::Pending;
        }
        if host.state_type == StateType::Soft && !soft_state_dependencies {
            MasterState::Code(host.last_hard_state.code())
        } else {
            MasterState::Code(host.current_state.code())
        }
    }

    fn describe(&self, entity: HostId) -> String {
        self.0.host(entity).name.clone()
    }
}

impl DependencyGraph for ServiceGraph<'_> {
    type Id = ServiceId;

    fn edges(&self, entity: ServiceId, kind: DependencyKind) -> &[DependencyId] {
        let service = self.0.service(entity);
        match kind {
            DependencyKind::Execution => &service.exec_dependencies,
            DependencyKind::Notification => &service.notify_dependencies,
        }
    }

    fn edge(&self, id: DependencyId) -> Option<&Dependency<ServiceId>> {
        self.0.service_dependencies.get(id.index())
    }

    fn master_state(&self, master: ServiceId, soft_state_dependencies: bool) -> MasterState {
        let service = self.0.service(master);
        if !service.has_been_checked {
            return MasterState::Pending;
        }
        if service.state_type == StateType::Soft && !soft_state_dependencies {
            MasterState::Code(service.last_hard_state.code())
        } else {
            MasterState::Code(service.current_state.code())
        }
    }

    fn describe(&self, entity: ServiceId) -> String {
        self.0.service(entity).display_name()
    }
}

/// Evaluates dependencies at a fixed instant. Pure with respect to the
/// object store: the same inputs always give the same verdict.
pub struct DependencyResolver<'a> {
    objects: &'a ObjectStore,
    periods: &'a TimePeriods,
    soft_state_dependencies: bool,
    now: DateTime<Utc>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(
        objects: &'a ObjectStore,
        periods: &'a TimePeriods,
        soft_state_dependencies: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            objects,
            periods,
            soft_state_dependencies,
            now,
        }
    }

    pub fn check_host(&self, host: HostId, kind: DependencyKind) -> DependencyResult {
        self.resolve(&HostGraph(self.objects), host, kind, 0)
    }

    pub fn check_service(&self, service: ServiceId, kind: DependencyKind) -> DependencyResult {
        self.resolve(&ServiceGraph(self.objects), service, kind, 0)
    }

    /// A service parent in a hard CRITICAL or UNKNOWN state blocks the
    /// child's execution, as does any failing ancestor.
    pub fn check_service_parents(&self, service: ServiceId) -> DependencyResult {
        self.service_parents(service, 0)
    }

    fn service_parents(&self, service: ServiceId, depth: usize) -> DependencyResult {
        if depth > MAX_DEPENDENCY_DEPTH {
            warn!(
                "Service parent chain of '{}' exceeds {} levels, ignoring the rest",
                self.objects.service(service).display_name(),
                MAX_DEPENDENCY_DEPTH
            );
            return DependencyResult::Ok;
        }
        for &parent in &self.objects.service(service).parents {
            let state = self.objects.service(parent).last_hard_state;
            if matches!(state, ServiceState::Critical | ServiceState::Unknown) {
                return DependencyResult::Failed;
            }
            if self.service_parents(parent, depth + 1) == DependencyResult::Failed {
                return DependencyResult::Failed;
            }
        }
        DependencyResult::Ok
    }

    fn resolve<G: DependencyGraph>(
        &self,
        graph: &G,
        entity: G::Id,
        kind: DependencyKind,
        depth: usize,
    ) -> DependencyResult {
        if depth > MAX_DEPENDENCY_DEPTH {
            warn!(
                "Dependency chain of '{}' exceeds {} levels, ignoring the rest",
                graph.describe(entity),
                MAX_DEPENDENCY_DEPTH
            );
            return DependencyResult::Ok;
        }

        for &id in graph.edges(entity, kind) {
            let Some(dependency) = graph.edge(id) else {
                continue;
            };

            // An inactive dependency period blocks rather than skips
            if !self
                .periods
                .is_time_in_period(self.now, dependency.period)
            {
                return DependencyResult::Failed;
            }

            let state = graph.master_state(dependency.master, self.soft_state_dependencies);
            if dependency.failure_options.fails_on(state) {
                return DependencyResult::Failed;
            }

            if dependency.inherits_parent
                && self.resolve(graph, dependency.master, kind, depth + 1)
                    == DependencyResult::Failed
            {
                return DependencyResult::Failed;
            }
        }
        DependencyResult::Ok
    }
}
