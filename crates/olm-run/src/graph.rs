use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use olm_core::errors::{ErrorInfo, OlmError};
use olm_space::{CaseId, CaseSet};
use serde::{Deserialize, Serialize};

/// Index of a job inside its [`JobGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub usize);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// What a job does when dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    /// Advance case `case` to burnup step `step`.
    Step {
        /// Case index in expansion order.
        case: usize,
        /// Step index within the case schedule.
        step: usize,
    },
    /// Collect the step outputs of case `case` once every step succeeded.
    Aggregate {
        /// Case index in expansion order.
        case: usize,
    },
}

impl JobKind {
    /// Case the job belongs to.
    pub fn case(&self) -> usize {
        match self {
            JobKind::Step { case, .. } | JobKind::Aggregate { case } => *case,
        }
    }
}

/// Node of the job graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobNode {
    /// Position in the arena.
    pub id: JobId,
    /// Work performed by the job.
    pub kind: JobKind,
    /// Identifier of the owning case.
    pub case_id: CaseId,
    /// Jobs that must succeed before this one may run.
    pub deps: Vec<JobId>,
}

/// Directed acyclic graph of step and aggregate jobs.
///
/// Jobs live in an arena indexed by [`JobId`]; dependencies are stored as
/// indices so the graph owns no references into the case set.
#[derive(Debug, Clone, PartialEq)]
pub struct JobGraph {
    nodes: Vec<JobNode>,
}

impl JobGraph {
    /// Builds one chain per case: steps in order, then the aggregate.
    pub fn build(cases: &CaseSet) -> Self {
        let mut nodes = Vec::new();
        for case in cases.cases() {
            let case_index = case.index();
            let mut previous: Option<JobId> = None;
            for step in 0..case.schedule.len() {
                let id = JobId(nodes.len());
                nodes.push(JobNode {
                    id,
                    kind: JobKind::Step {
                        case: case_index,
                        step,
                    },
                    case_id: case.id.clone(),
                    deps: previous.into_iter().collect(),
                });
                previous = Some(id);
            }
            let id = JobId(nodes.len());
            nodes.push(JobNode {
                id,
                kind: JobKind::Aggregate { case: case_index },
                case_id: case.id.clone(),
                deps: previous.into_iter().collect(),
            });
        }
        Self { nodes }
    }

    /// Wraps externally constructed nodes; call [`JobGraph::validate`] before use.
    pub fn from_nodes(nodes: Vec<JobNode>) -> Self {
        Self { nodes }
    }

    /// All nodes in arena order.
    pub fn nodes(&self) -> &[JobNode] {
        &self.nodes
    }

    /// Node lookup.
    pub fn node(&self, id: JobId) -> Option<&JobNode> {
        self.nodes.get(id.0)
    }

    /// Number of jobs.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the graph has no jobs.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Reverse adjacency: for each job, the jobs that depend on it.
    pub fn dependents(&self) -> Vec<Vec<JobId>> {
        let mut out = vec![Vec::new(); self.nodes.len()];
        for node in &self.nodes {
            for dep in &node.deps {
                if let Some(list) = out.get_mut(dep.0) {
                    list.push(node.id);
                }
            }
        }
        out
    }

    /// Checks arena consistency, step chains and acyclicity.
    pub fn validate(&self) -> Result<(), OlmError> {
        for (position, node) in self.nodes.iter().enumerate() {
            if node.id.0 != position {
                return Err(graph_error(
                    "graph_bad_index",
                    format!("node at position {position} carries id {}", node.id),
                    node,
                ));
            }
            for dep in &node.deps {
                let Some(target) = self.nodes.get(dep.0) else {
                    return Err(graph_error(
                        "graph_dangling_dependency",
                        format!("{} depends on missing {dep}", node.id),
                        node,
                    ));
                };
                if target.case_id != node.case_id {
                    return Err(graph_error(
                        "graph_cross_case_dependency",
                        format!("{} depends on {dep} of case {}", node.id, target.case_id),
                        node,
                    ));
                }
            }
            if let JobKind::Step { step: 0, .. } = node.kind {
                if !node.deps.is_empty() {
                    return Err(graph_error(
                        "graph_broken_chain",
                        "step 0 must not have dependencies".to_string(),
                        node,
                    ));
                }
            }
            if let JobKind::Step { step, .. } = node.kind {
                let chained = node.deps.iter().any(|dep| {
                    matches!(
                        self.nodes[dep.0].kind,
                        JobKind::Step { step: prior, .. } if prior + 1 == step
                    )
                });
                if step > 0 && !chained {
                    return Err(graph_error(
                        "graph_broken_chain",
                        format!("step {step} does not depend on step {}", step - 1),
                        node,
                    ));
                }
            }
        }
        self.validate_aggregates()?;
        self.topological_order().map(|_| ())
    }

    fn validate_aggregates(&self) -> Result<(), OlmError> {
        let dependents = self.dependents();
        let mut per_case: BTreeMap<&CaseId, usize> = BTreeMap::new();
        for node in &self.nodes {
            per_case.entry(&node.case_id).or_default();
            if !matches!(node.kind, JobKind::Aggregate { .. }) {
                continue;
            }
            *per_case.entry(&node.case_id).or_default() += 1;
            let last_step = match node.deps.as_slice() {
                [dep] if matches!(self.nodes[dep.0].kind, JobKind::Step { .. }) => *dep,
                _ => {
                    return Err(graph_error(
                        "graph_bad_aggregate",
                        format!("{} must depend on exactly one step", node.id),
                        node,
                    ))
                }
            };
            let followed = dependents[last_step.0]
                .iter()
                .any(|child| matches!(self.nodes[child.0].kind, JobKind::Step { .. }));
            if followed {
                return Err(graph_error(
                    "graph_bad_aggregate",
                    format!("{} does not follow the last step of its case", node.id),
                    node,
                ));
            }
        }
        if let Some((case, count)) = per_case.into_iter().find(|(_, count)| *count != 1) {
            return Err(OlmError::Configuration(
                ErrorInfo::new(
                    "graph_aggregate_count",
                    format!("case {case} has {count} aggregate jobs, expected 1"),
                )
                .with_context("case", case.to_string()),
            ));
        }
        Ok(())
    }

    /// Kahn ordering; fails when a cycle is present.
    pub fn topological_order(&self) -> Result<Vec<JobId>, OlmError> {
        Ok(self.waves()?.into_iter().flatten().collect())
    }

    /// Groups jobs into waves whose members only depend on earlier waves.
    pub fn waves(&self) -> Result<Vec<Vec<JobId>>, OlmError> {
        let dependents = self.dependents();
        let mut indegree: Vec<usize> = self.nodes.iter().map(|node| node.deps.len()).collect();
        let mut current: VecDeque<JobId> = self
            .nodes
            .iter()
            .filter(|node| node.deps.is_empty())
            .map(|node| node.id)
            .collect();
        let mut waves = Vec::new();
        let mut visited = 0usize;
        while !current.is_empty() {
            let mut next = VecDeque::new();
            let mut wave = Vec::with_capacity(current.len());
            while let Some(id) = current.pop_front() {
                visited += 1;
                for child in &dependents[id.0] {
                    indegree[child.0] -= 1;
                    if indegree[child.0] == 0 {
                        next.push_back(*child);
                    }
                }
                wave.push(id);
            }
            waves.push(wave);
            current = next;
        }
        if visited != self.nodes.len() {
            let stuck = self
                .nodes
                .iter()
                .find(|node| indegree[node.id.0] > 0)
                .map(|node| node.id.to_string())
                .unwrap_or_default();
            return Err(OlmError::Configuration(
                ErrorInfo::new(
                    "graph_cycle",
                    format!(
                        "job graph contains a cycle; {} of {} jobs are unreachable",
                        self.nodes.len() - visited,
                        self.nodes.len()
                    ),
                )
                .with_context("job", stuck),
            ));
        }
        Ok(waves)
    }

    /// Validates the graph and describes what a run would dispatch.
    pub fn plan(&self, concurrency: usize) -> Result<DryRunPlan, OlmError> {
        self.validate()?;
        let waves = self.waves()?;
        let cases = self
            .nodes
            .iter()
            .filter(|node| matches!(node.kind, JobKind::Aggregate { .. }))
            .count();
        let steps = self.nodes.len() - cases;
        Ok(DryRunPlan {
            cases,
            steps,
            concurrency: concurrency.max(1),
            critical_path: waves.len(),
            jobs: self.nodes.clone(),
            waves,
        })
    }
}

fn graph_error(code: &str, message: String, node: &JobNode) -> OlmError {
    OlmError::Configuration(
        ErrorInfo::new(code, message)
            .with_context("job", node.id.to_string())
            .with_context("case", node.case_id.to_string()),
    )
}

/// Validated graph description returned instead of executing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DryRunPlan {
    /// Number of cases.
    pub cases: usize,
    /// Number of step jobs.
    pub steps: usize,
    /// Worker count a real run would use.
    pub concurrency: usize,
    /// Number of waves, i.e. the longest dependency chain.
    pub critical_path: usize,
    /// Every job with its dependencies.
    pub jobs: Vec<JobNode>,
    /// Jobs grouped by dependency depth.
    pub waves: Vec<Vec<JobId>>,
}
