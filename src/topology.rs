// src/topology.rs
//
// =============================================================================
// WORKSHOPNET: TOPOLOGY DEFINITION (v 0.3 )
// =============================================================================
//
// The static catalog of places, transitions and arcs for one workshop.
//
// Responsibilities:
// 1. Author the workshop catalog (12 places, 9 transitions, 12 arcs).
// 2. Validate any topology as a bipartite weighted digraph before the
//    builder persists a single record.
//
// Arcs reference places and transitions by name; the builder swaps names
// for generated identities.

use crate::core::{ArcDirection, PlaceKind, TransitionKind};
use crate::error::{NetError, NetResult};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

// ============================================================================
// 1. CATALOG NAMES
// ============================================================================

pub const WORKERS_AVAILABLE: &str = "workers:available";
pub const WORKERS_BUSY: &str = "workers:busy";
pub const WORKERS_ABSENT: &str = "workers:absent";
pub const MACHINES_ACTIVE: &str = "machines:active";
pub const MACHINES_BROKEN: &str = "machines:broken";
pub const MACHINES_IN_MAINTENANCE: &str = "machines:in-maintenance";
pub const WORKSHOPS_ACTIVE: &str = "workshops:active";
pub const WORKSHOPS_CLOSED: &str = "workshops:closed";
pub const WORKSHOPS_IN_MAINTENANCE: &str = "workshops:in-maintenance";
pub const TASKS_PENDING: &str = "tasks:pending";
pub const TASKS_IN_PROGRESS: &str = "tasks:in-progress";
pub const TASKS_DONE: &str = "tasks:done";

pub const ASSIGN_WORKER: &str = "assign-worker";
pub const RELEASE_WORKER: &str = "release-worker";
pub const MARK_WORKER_ABSENT: &str = "mark-worker-absent";
pub const RETURN_WORKER_AVAILABLE: &str = "return-worker-available";
pub const START_MACHINE: &str = "start-machine";
pub const STOP_MACHINE: &str = "stop-machine";
pub const REPAIR_MACHINE: &str = "repair-machine";
pub const START_TASK: &str = "start-task";
pub const FINISH_TASK: &str = "finish-task";

// ============================================================================
// 2. SPECS
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceSpec {
    pub name: String,
    pub kind: PlaceKind,
    pub capacity: Option<u32>,
    pub usage: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransitionSpec {
    pub name: String,
    pub kind: TransitionKind,
    pub enabled: bool,
    pub conditions: Vec<String>,
    pub duration_min: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArcSpec {
    pub from: String,
    pub to: String,
    pub weight: u32,
    pub direction: ArcDirection,
}

impl PlaceSpec {
    pub fn new(name: &str, kind: PlaceKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            capacity: None,
            usage: None,
        }
    }
}

impl TransitionSpec {
    pub fn new(name: &str, kind: TransitionKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            enabled: true,
            conditions: Vec::new(),
            duration_min: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl ArcSpec {
    /// place -> transition
    pub fn input(place: &str, transition: &str, weight: u32) -> Self {
        Self {
            from: place.to_string(),
            to: transition.to_string(),
            weight,
            direction: ArcDirection::PlaceToTransition,
        }
    }

    /// transition -> place
    pub fn output(transition: &str, place: &str, weight: u32) -> Self {
        Self {
            from: transition.to_string(),
            to: place.to_string(),
            weight,
            direction: ArcDirection::TransitionToPlace,
        }
    }
}

/// Nodes of the validation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef<'a> {
    Place(&'a str),
    Transition(&'a str),
}

// ============================================================================
// 3. TOPOLOGY
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    pub places: Vec<PlaceSpec>,
    pub transitions: Vec<TransitionSpec>,
    pub arcs: Vec<ArcSpec>,
}

impl Topology {
    /// The single-workshop catalog.
    ///
    /// Machine transitions are deliberately left without arcs: a transition
    /// with no input arc is enabled whenever its administrative flag is set.
    pub fn workshop() -> Self {
        use PlaceKind::*;
        use TransitionKind::*;

        let places = [
            (WORKERS_AVAILABLE, Worker),
            (WORKERS_BUSY, Worker),
            (WORKERS_ABSENT, Worker),
            (MACHINES_ACTIVE, Machine),
            (MACHINES_BROKEN, Machine),
            (MACHINES_IN_MAINTENANCE, Machine),
            (WORKSHOPS_ACTIVE, Workshop),
            (WORKSHOPS_CLOSED, Workshop),
            (WORKSHOPS_IN_MAINTENANCE, Workshop),
            (TASKS_PENDING, Task),
            (TASKS_IN_PROGRESS, Task),
            (TASKS_DONE, Task),
        ]
        .into_iter()
        .map(|(name, kind)| PlaceSpec::new(name, kind))
        .collect();

        let transitions = [
            (ASSIGN_WORKER, Assign),
            (RELEASE_WORKER, Release),
            (MARK_WORKER_ABSENT, Assign),
            (RETURN_WORKER_AVAILABLE, Release),
            (START_MACHINE, Production),
            (STOP_MACHINE, Maintenance),
            (REPAIR_MACHINE, Maintenance),
            (START_TASK, Production),
            (FINISH_TASK, Production),
        ]
        .into_iter()
        .map(|(name, kind)| TransitionSpec::new(name, kind))
        .collect();

        let arcs = vec![
            // Workers
            ArcSpec::input(WORKERS_AVAILABLE, ASSIGN_WORKER, 1),
            ArcSpec::output(ASSIGN_WORKER, WORKERS_BUSY, 1),
            ArcSpec::input(WORKERS_BUSY, RELEASE_WORKER, 1),
            ArcSpec::output(RELEASE_WORKER, WORKERS_AVAILABLE, 1),
            ArcSpec::input(WORKERS_AVAILABLE, MARK_WORKER_ABSENT, 1),
            ArcSpec::output(MARK_WORKER_ABSENT, WORKERS_ABSENT, 1),
            ArcSpec::input(WORKERS_ABSENT, RETURN_WORKER_AVAILABLE, 1),
            ArcSpec::output(RETURN_WORKER_AVAILABLE, WORKERS_AVAILABLE, 1),
            // Tasks
            ArcSpec::input(TASKS_PENDING, START_TASK, 1),
            ArcSpec::output(START_TASK, TASKS_IN_PROGRESS, 1),
            ArcSpec::input(TASKS_IN_PROGRESS, FINISH_TASK, 1),
            ArcSpec::output(FINISH_TASK, TASKS_DONE, 1),
        ];

        Self {
            places,
            transitions,
            arcs,
        }
    }

    /// Builds the bipartite digraph, rejecting duplicate names, dangling
    /// endpoints, same-kind arcs and zero weights.
    pub fn graph(&self) -> NetResult<DiGraph<NodeRef<'_>, u32>> {
        let mut graph = DiGraph::new();
        let mut index: HashMap<&str, NodeIndex> = HashMap::new();

        for p in &self.places {
            let idx = graph.add_node(NodeRef::Place(&p.name));
            if index.insert(p.name.as_str(), idx).is_some() {
                return Err(NetError::Topology(format!("duplicate name '{}'", p.name)));
            }
        }
        for t in &self.transitions {
            let idx = graph.add_node(NodeRef::Transition(&t.name));
            if index.insert(t.name.as_str(), idx).is_some() {
                return Err(NetError::Topology(format!("duplicate name '{}'", t.name)));
            }
        }

        for arc in &self.arcs {
            if arc.weight == 0 {
                return Err(NetError::Topology(format!(
                    "arc {} -> {} has zero weight",
                    arc.from, arc.to
                )));
            }
            let resolve = |name: &str| {
                index.get(name).copied().ok_or_else(|| {
                    NetError::Topology(format!("arc references unknown node '{}'", name))
                })
            };
            let from = resolve(&arc.from)?;
            let to = resolve(&arc.to)?;

            let shape_ok = match (arc.direction, graph[from], graph[to]) {
                (ArcDirection::PlaceToTransition, NodeRef::Place(_), NodeRef::Transition(_)) => {
                    true
                }
                (ArcDirection::TransitionToPlace, NodeRef::Transition(_), NodeRef::Place(_)) => {
                    true
                }
                _ => false,
            };
            if !shape_ok {
                return Err(NetError::Topology(format!(
                    "arc {} -> {} does not match direction {}",
                    arc.from,
                    arc.to,
                    arc.direction.as_str()
                )));
            }
            graph.add_edge(from, to, arc.weight);
        }

        Ok(graph)
    }

    pub fn validate(&self) -> NetResult<()> {
        self.graph().map(|_| ())
    }

    /// Transitions with no input arc (vacuously enabled).
    pub fn sourceless_transitions(&self) -> NetResult<Vec<String>> {
        let graph = self.graph()?;
        Ok(graph
            .node_indices()
            .filter_map(|idx| match graph[idx] {
                NodeRef::Transition(name)
                    if graph
                        .neighbors_directed(idx, Direction::Incoming)
                        .next()
                        .is_none() =>
                {
                    Some(name.to_string())
                }
                _ => None,
            })
            .collect())
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::workshop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workshop_catalog_shape() {
        let topo = Topology::workshop();
        assert_eq!(topo.places.len(), 12);
        assert_eq!(topo.transitions.len(), 9);
        assert_eq!(topo.arcs.len(), 12);
        let graph = topo.graph().expect("catalog must validate");
        assert_eq!(graph.node_count(), 21);
        assert_eq!(graph.edge_count(), 12);
    }

    #[test]
    fn wired_transitions_have_one_input_and_one_output() {
        let topo = Topology::workshop();
        for name in [
            ASSIGN_WORKER,
            RELEASE_WORKER,
            MARK_WORKER_ABSENT,
            RETURN_WORKER_AVAILABLE,
            START_TASK,
            FINISH_TASK,
        ] {
            let inputs = topo.arcs.iter().filter(|a| a.to == name).count();
            let outputs = topo.arcs.iter().filter(|a| a.from == name).count();
            assert_eq!((inputs, outputs), (1, 1), "{}", name);
        }
    }

    #[test]
    fn machine_transitions_are_sourceless() {
        let mut names = Topology::workshop().sourceless_transitions().unwrap();
        names.sort();
        assert_eq!(names, vec![REPAIR_MACHINE, START_MACHINE, STOP_MACHINE]);
    }

    #[test]
    fn rejects_unknown_endpoint() {
        let mut topo = Topology::workshop();
        topo.arcs.push(ArcSpec::input("workers:ghost", ASSIGN_WORKER, 1));
        let err = topo.validate().unwrap_err();
        assert!(matches!(err, NetError::Topology(ref m) if m.contains("workers:ghost")));
    }

    #[test]
    fn rejects_place_to_place_arc() {
        let mut topo = Topology::workshop();
        topo.arcs.push(ArcSpec {
            from: WORKERS_AVAILABLE.into(),
            to: WORKERS_BUSY.into(),
            weight: 1,
            direction: ArcDirection::PlaceToTransition,
        });
        assert!(matches!(topo.validate(), Err(NetError::Topology(_))));
    }

    #[test]
    fn rejects_reversed_direction() {
        let mut topo = Topology::workshop();
        topo.arcs.push(ArcSpec {
            from: WORKERS_AVAILABLE.into(),
            to: ASSIGN_WORKER.into(),
            weight: 1,
            direction: ArcDirection::TransitionToPlace,
        });
        assert!(matches!(topo.validate(), Err(NetError::Topology(_))));
    }

    #[test]
    fn rejects_zero_weight_and_duplicates() {
        let mut topo = Topology::workshop();
        topo.arcs[0].weight = 0;
        assert!(matches!(topo.validate(), Err(NetError::Topology(_))));

        let mut topo = Topology::workshop();
        topo.places.push(PlaceSpec::new(WORKERS_BUSY, PlaceKind::Worker));
        assert!(matches!(topo.validate(), Err(NetError::Topology(_))));
    }
}
