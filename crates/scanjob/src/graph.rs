/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Task dependency graphs.
//!
//! [`TaskPlan`] is the pure shape of a job's tasks, computed from the job's
//! scan type and ordered sources before anything is written:
//!
//! ```text
//! connect(1) ... connect(N)          sequence 1..N
//!    |              |
//! inspect(N+1) ... inspect(2N)       INSPECT jobs only, one per connect task
//!     \      |       /
//!      fingerprint(2N+1)             depends on every connect and inspect task
//! ```
//!
//! [`TaskGraph`] is built from persisted tasks. It guarantees that every
//! prerequisite belongs to the same job and that the graph is acyclic, and
//! answers ordering and readiness queries for the runner.

use crate::database::universal_types::UniversalUuid;
use crate::error::ScanJobError;
use crate::models::scan::ScanType;
use crate::models::scan_task::ScanTask;
use crate::models::status::ScanStatus;
use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// A task to be created by queueing a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTask {
    pub sequence_number: i32,
    pub scan_type: ScanType,
    pub source_id: Option<UniversalUuid>,
    /// Sequence numbers of the planned tasks this one depends on
    pub prerequisites: Vec<i32>,
}

/// The complete set of tasks for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskPlan {
    scan_type: ScanType,
    tasks: Vec<PlannedTask>,
}

impl TaskPlan {
    /// Plans the tasks for a job of `scan_type` over `source_ids`, in the
    /// order given.
    pub fn build(scan_type: ScanType, source_ids: &[UniversalUuid]) -> Self {
        let mut tasks = Vec::new();

        if matches!(scan_type, ScanType::Connect | ScanType::Inspect) {
            for source_id in source_ids {
                tasks.push(PlannedTask {
                    sequence_number: tasks.len() as i32 + 1,
                    scan_type: ScanType::Connect,
                    source_id: Some(*source_id),
                    prerequisites: Vec::new(),
                });
            }
        }
        let connect_count = tasks.len();

        if connect_count > 0 && scan_type == ScanType::Inspect {
            for i in 0..connect_count {
                let connect = tasks[i].clone();
                tasks.push(PlannedTask {
                    sequence_number: tasks.len() as i32 + 1,
                    scan_type: ScanType::Inspect,
                    source_id: connect.source_id,
                    prerequisites: vec![connect.sequence_number],
                });
            }
        }
        let has_inspect = tasks.len() > connect_count;

        if scan_type == ScanType::Fingerprint || has_inspect {
            let prerequisites = tasks.iter().map(|t| t.sequence_number).collect();
            tasks.push(PlannedTask {
                sequence_number: tasks.len() as i32 + 1,
                scan_type: ScanType::Fingerprint,
                source_id: None,
                prerequisites,
            });
        }

        Self { scan_type, tasks }
    }

    pub fn tasks(&self) -> &[PlannedTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn count_of(&self, scan_type: ScanType) -> usize {
        self.tasks.iter().filter(|t| t.scan_type == scan_type).count()
    }

    /// True when the job scans real sources, i.e. it is not fingerprint-only
    /// and has at least one connect or inspect task.
    pub fn runs_scan(&self) -> bool {
        self.scan_type != ScanType::Fingerprint
            && self
                .tasks
                .iter()
                .any(|t| matches!(t.scan_type, ScanType::Connect | ScanType::Inspect))
    }
}

/// Acyclic dependency graph over the tasks of one job.
///
/// Edges point from a prerequisite to the task that depends on it.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    graph: DiGraph<UniversalUuid, ()>,
    indices: HashMap<UniversalUuid, NodeIndex>,
    sequence: HashMap<UniversalUuid, i32>,
    status: HashMap<UniversalUuid, ScanStatus>,
}

impl TaskGraph {
    /// Builds the graph, rejecting prerequisites that are not among `tasks`
    /// or belong to another job, and rejecting cycles.
    pub fn from_tasks(tasks: &[ScanTask]) -> Result<Self, ScanJobError> {
        let mut graph = DiGraph::new();
        let mut indices = HashMap::new();
        let mut sequence = HashMap::new();
        let mut status = HashMap::new();
        let mut jobs = HashMap::new();

        for task in tasks {
            indices.insert(task.id, graph.add_node(task.id));
            sequence.insert(task.id, task.sequence_number);
            status.insert(task.id, task.status);
            jobs.insert(task.id, task.job_id);
        }

        for task in tasks {
            for prerequisite in &task.prerequisites {
                let same_job = jobs.get(prerequisite) == Some(&task.job_id);
                match indices.get(prerequisite) {
                    Some(&from) if same_job => {
                        graph.add_edge(from, indices[&task.id], ());
                    }
                    _ => {
                        return Err(ScanJobError::ForeignPrerequisite {
                            task: task.id.to_string(),
                            prerequisite: prerequisite.to_string(),
                        })
                    }
                }
            }
        }

        let task_graph = Self {
            graph,
            indices,
            sequence,
            status,
        };

        if is_cyclic_directed(&task_graph.graph) {
            return Err(ScanJobError::CyclicDependency {
                tasks: task_graph.find_cycle(),
            });
        }

        Ok(task_graph)
    }

    fn find_cycle(&self) -> Vec<String> {
        tarjan_scc(&self.graph)
            .into_iter()
            .find(|component| {
                component.len() > 1
                    || component
                        .first()
                        .map(|n| self.graph.contains_edge(*n, *n))
                        .unwrap_or(false)
            })
            .map(|component| {
                let mut ids: Vec<UniversalUuid> =
                    component.into_iter().map(|n| self.graph[n]).collect();
                ids.sort_by_key(|id| self.sequence_of(id));
                ids.into_iter().map(|id| id.to_string()).collect()
            })
            .unwrap_or_default()
    }

    fn sequence_of(&self, id: &UniversalUuid) -> i32 {
        self.sequence.get(id).copied().unwrap_or(i32::MAX)
    }

    fn neighbors(&self, id: &UniversalUuid, direction: Direction) -> Vec<UniversalUuid> {
        let Some(&index) = self.indices.get(id) else {
            return Vec::new();
        };
        let mut ids: Vec<UniversalUuid> = self
            .graph
            .neighbors_directed(index, direction)
            .map(|n| self.graph[n])
            .collect();
        ids.sort_by_key(|id| self.sequence_of(id));
        ids.dedup();
        ids
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, id: &UniversalUuid) -> bool {
        self.indices.contains_key(id)
    }

    /// Direct prerequisites of `id`, in sequence order.
    pub fn prerequisites_of(&self, id: &UniversalUuid) -> Vec<UniversalUuid> {
        self.neighbors(id, Direction::Incoming)
    }

    /// Tasks that directly depend on `id`, in sequence order.
    pub fn dependents_of(&self, id: &UniversalUuid) -> Vec<UniversalUuid> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Topological order; among tasks that are ready at the same point the
    /// lower sequence number comes first.
    pub fn execution_order(&self) -> Vec<UniversalUuid> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|n| {
                let degree = self.graph.neighbors_directed(n, Direction::Incoming).count();
                (n, degree)
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<(i32, NodeIndex)>> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(n, _)| Reverse((self.sequence_of(&self.graph[*n]), *n)))
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse((_, node))) = ready.pop() {
            order.push(self.graph[node]);
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                if let Some(degree) = in_degree.get_mut(&next) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.push(Reverse((self.sequence_of(&self.graph[next]), next)));
                    }
                }
            }
        }
        order
    }

    /// PENDING tasks whose prerequisites are all COMPLETED, in sequence
    /// order.
    pub fn ready_tasks(&self) -> Vec<UniversalUuid> {
        let mut ready: Vec<UniversalUuid> = self
            .status
            .iter()
            .filter(|(_, status)| **status == ScanStatus::Pending)
            .map(|(id, _)| *id)
            .filter(|id| {
                self.prerequisites_of(id)
                    .iter()
                    .all(|p| self.status.get(p) == Some(&ScanStatus::Completed))
            })
            .collect();
        ready.sort_by_key(|id| self.sequence_of(id));
        ready
    }
}
