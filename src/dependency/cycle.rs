//! Build-time cycle detection for the object graph

use std::collections::HashSet;

use super::{Dependency, DependencyKind};
use crate::error::VigilError;
use crate::models::TimePeriodId;
use crate::objects::ObjectStore;
use crate::timeperiod::TimePeriods;

/// Reject every loop the runtime walks would otherwise have to guard
/// against: inheriting dependency chains, host parents, service parents
/// and time period exclusions.
pub fn validate_graph(objects: &ObjectStore, periods: &TimePeriods) -> Result<(), VigilError> {
    for kind in [DependencyKind::Execution, DependencyKind::Notification] {
        let hosts = inheriting_edges(&objects.host_dependencies, objects.hosts.len(), kind, |id| {
            id.index()
        });
        if let Some(cycle) = detect_cycle(&hosts) {
            return Err(VigilError::DependencyCycle(join(cycle, |i| {
                objects.hosts[i].name.clone()
            })));
        }

        let services = inheriting_edges(
            &objects.service_dependencies,
            objects.services.len(),
            kind,
            |id| id.index(),
        );
        if let Some(cycle) = detect_cycle(&services) {
            return Err(VigilError::DependencyCycle(join(cycle, |i| {
                objects.services[i].display_name()
            })));
        }
    }

    let host_parents: Vec<Vec<usize>> = objects
        .hosts
        .iter()
        .map(|host| host.parents.iter().map(|p| p.index()).collect())
        .collect();
    if let Some(cycle) = detect_cycle(&host_parents) {
        return Err(VigilError::ParentCycle(join(cycle, |i| {
            objects.hosts[i].name.clone()
        })));
    }

    let service_parents: Vec<Vec<usize>> = objects
        .services
        .iter()
        .map(|service| service.parents.iter().map(|p| p.index()).collect())
        .collect();
    if let Some(cycle) = detect_cycle(&service_parents) {
        return Err(VigilError::ParentCycle(join(cycle, |i| {
            objects.services[i].display_name()
        })));
    }

    let exclusions: Vec<Vec<usize>> = periods
        .iter()
        .map(|(_, period)| period.exclusions.iter().map(|e| e.index()).collect())
        .collect();
    if let Some(cycle) = detect_cycle(&exclusions) {
        return Err(VigilError::ExclusionCycle(join(cycle, |i| {
            periods
                .get(TimePeriodId(i))
                .map(|p| p.name.clone())
                .unwrap_or_default()
        })));
    }

    Ok(())
}

fn inheriting_edges<Id: Copy>(
    dependencies: &[Dependency<Id>],
    node_count: usize,
    kind: DependencyKind,
    index: impl Fn(Id) -> usize,
) -> Vec<Vec<usize>> {
    let mut adjacency = vec![Vec::new(); node_count];
    for dependency in dependencies
        .iter()
        .filter(|d| d.kind == kind && d.inherits_parent)
    {
        let from = index(dependency.dependent);
        if let Some(edges) = adjacency.get_mut(from) {
            edges.push(index(dependency.master));
        }
    }
    adjacency
}

fn join(cycle: Vec<usize>, name: impl Fn(usize) -> String) -> String {
    cycle.into_iter().map(name).collect::<Vec<_>>().join(" -> ")
}

/// Find a cycle in a graph given as adjacency lists over `0..len`; the
/// returned path starts and ends at the same node.
pub fn detect_cycle(adjacency: &[Vec<usize>]) -> Option<Vec<usize>> {
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for node in 0..adjacency.len() {
        if !visited.contains(&node) {
            if let Some(cycle) = dfs_detect_cycle(adjacency, node, &mut visited, &mut rec_stack, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

fn dfs_detect_cycle(
    adjacency: &[Vec<usize>],
    node: usize,
    visited: &mut HashSet<usize>,
    rec_stack: &mut HashSet<usize>,
    path: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    for &next in adjacency.get(node).map(Vec::as_slice).unwrap_or_default() {
        if !visited.contains(&next) {
            if let Some(cycle) = dfs_detect_cycle(adjacency, next, visited, rec_stack, path) {
                return Some(cycle);
            }
        } else if rec_stack.contains(&next) {
            let mut cycle = vec![next];
            for &p in path.iter().rev() {
                cycle.push(p);
                if p == next {
                    break;
                }
            }
            cycle.reverse();
            return Some(cycle);
        }
    }

    path.pop();
    rec_stack.remove(&node);
    None
}
