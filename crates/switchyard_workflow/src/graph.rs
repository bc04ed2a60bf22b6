//! Phase dependency graph.
//!
//! Built once per template before any instance is created. Building rejects
//! duplicate phases, unknown dependencies and cycles, so every graph that
//! exists has a topological order.

use crate::error::WorkflowError;
use crate::template::WorkflowTemplate;
use indexmap::{IndexMap, IndexSet};

/// Validated dependency graph of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseGraph {
    template: String,
    dependencies: IndexMap<String, Vec<String>>,
    order: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

impl PhaseGraph {
    /// Validate a template and compute its topological order
    ///
    /// # Errors
    ///
    /// Returns `InvalidTemplate` for duplicate phase names or unknown
    /// dependencies, and `CyclicWorkflow` naming the phases of a cycle.
    pub fn build(template: &WorkflowTemplate) -> Result<Self, WorkflowError> {
        let invalid = |reason: String| WorkflowError::InvalidTemplate {
            template: template.name.clone(),
            reason,
        };

        let mut dependencies: IndexMap<String, Vec<String>> = IndexMap::new();
        for phase in &template.phases {
            if phase.name.trim().is_empty() {
                return Err(invalid("phase name is empty".to_string()));
            }
            if dependencies.contains_key(&phase.name) {
                return Err(invalid(format!("duplicate phase '{}'", phase.name)));
            }
            let mut deps: Vec<String> = Vec::new();
            for dep in &phase.depends_on {
                if !deps.contains(dep) {
                    deps.push(dep.clone());
                }
            }
            dependencies.insert(phase.name.clone(), deps);
        }

        for (phase, deps) in &dependencies {
            if let Some(unknown) = deps.iter().find(|d| !dependencies.contains_key(*d)) {
                return Err(invalid(format!(
                    "phase '{}' depends on unknown phase '{}'",
                    phase, unknown
                )));
            }
        }

        if let Some(cycle) = find_cycle(&dependencies) {
            return Err(WorkflowError::CyclicWorkflow {
                template: template.name.clone(),
                cycle,
            });
        }

        let order = stable_order(&dependencies);
        Ok(Self {
            template: template.name.clone(),
            dependencies,
            order,
        })
    }

    /// Template name
    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Topological order; among ready phases, declaration order wins
    #[must_use]
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Direct dependencies of a phase
    #[must_use]
    pub fn dependencies(&self, phase: &str) -> &[String] {
        self.dependencies.get(phase).map_or(&[], Vec::as_slice)
    }

    /// Phases grouped into waves that could run concurrently
    #[must_use]
    pub fn waves(&self) -> Vec<Vec<String>> {
        waves_of(&self.dependencies)
    }

    /// Every phase that depends on `phase`, directly or transitively
    #[must_use]
    pub fn transitive_dependents(&self, phase: &str) -> IndexSet<String> {
        let mut found: IndexSet<String> = IndexSet::new();
        let mut frontier = vec![phase.to_string()];
        while let Some(current) = frontier.pop() {
            for (candidate, deps) in &self.dependencies {
                if deps.contains(&current) && found.insert(candidate.clone()) {
                    frontier.push(candidate.clone());
                }
            }
        }
        found
    }

    /// Number of phases
    #[must_use]
    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    /// Check if the template has no phases
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// First cycle found by depth-first search, closed by repeating its start
fn find_cycle(dependencies: &IndexMap<String, Vec<String>>) -> Option<Vec<String>> {
    fn visit<'a>(
        phase: &'a str,
        dependencies: &'a IndexMap<String, Vec<String>>,
        marks: &mut IndexMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        marks.insert(phase, Mark::InProgress);
        path.push(phase);
        for dep in dependencies.get(phase).into_iter().flatten() {
            match marks.get(dep.as_str()).copied().unwrap_or(Mark::Unvisited) {
                Mark::InProgress => {
                    let start = path.iter().position(|p| *p == dep.as_str()).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..].iter().map(|p| (*p).to_string()).collect();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = visit(dep, dependencies, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
        path.pop();
        marks.insert(phase, Mark::Done);
        None
    }

    let mut marks: IndexMap<&str, Mark> = IndexMap::new();
    for phase in dependencies.keys() {
        if marks.get(phase.as_str()).copied().unwrap_or(Mark::Unvisited) == Mark::Unvisited {
            let mut path = Vec::new();
            if let Some(cycle) = visit(phase, dependencies, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

/// Kahn layering over an acyclic graph, each layer in declaration order
fn waves_of(dependencies: &IndexMap<String, Vec<String>>) -> Vec<Vec<String>> {
    let mut placed: IndexSet<&str> = IndexSet::new();
    let mut waves = Vec::new();
    while placed.len() < dependencies.len() {
        let wave: Vec<&str> = dependencies
            .iter()
            .filter(|(phase, deps)| {
                !placed.contains(phase.as_str()) && deps.iter().all(|d| placed.contains(d.as_str()))
            })
            .map(|(phase, _)| phase.as_str())
            .collect();
        if wave.is_empty() {
            break;
        }
        placed.extend(wave.iter().copied());
        waves.push(wave.into_iter().map(str::to_string).collect());
    }
    waves
}

/// Sequential order: repeatedly take the first declared phase that is ready
fn stable_order(dependencies: &IndexMap<String, Vec<String>>) -> Vec<String> {
    let mut placed: IndexSet<String> = IndexSet::new();
    while let Some((phase, _)) = dependencies.iter().find(|(phase, deps)| {
        !placed.contains(*phase) && deps.iter().all(|d| placed.contains(d))
    }) {
        placed.insert(phase.clone());
    }
    placed.into_iter().collect()
}
