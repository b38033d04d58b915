//! Topological synthesizer - orders resources into provisioning batches
//!
//! Batches are produced by Kahn-style layering: each batch holds every node
//! whose dependencies were all placed in earlier batches. Within a batch,
//! identities are sorted lexicographically so output is reproducible.

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use std::collections::{BTreeMap, BTreeSet};

/// A set of resources with no dependency among them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningBatch {
    /// 0-indexed position in the plan
    pub index: usize,
    /// Identities, sorted
    pub resources: Vec<String>,
}

/// An ordered sequence of batches covering every node exactly once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    batches: Vec<ProvisioningBatch>,
}

impl ExecutionPlan {
    /// Layer a validated graph into batches.
    ///
    /// Returns [`Error::SynthesisStalled`] if some nodes can never become
    /// unblocked, which only happens when the graph holds a cycle that
    /// validation missed.
    pub fn synthesize(graph: &DependencyGraph) -> Result<Self> {
        let mut remaining: BTreeMap<&str, usize> = graph
            .nodes()
            .map(|id| (id, graph.dependencies(id).count()))
            .collect();
        let mut batches = Vec::new();

        while !remaining.is_empty() {
            let ready: Vec<&str> = remaining
                .iter()
                .filter(|(_, deps)| **deps == 0)
                .map(|(id, _)| *id)
                .collect();

            if ready.is_empty() {
                let stuck: Vec<String> = remaining.keys().map(ToString::to_string).collect();
                log::error!(
                    "Synthesis stalled with {} unbatched resources; graph:\n{}",
                    stuck.len(),
                    graph.dump()
                );
                return Err(Error::SynthesisStalled { remaining: stuck });
            }

            for id in &ready {
                remaining.remove(id);
                for dependent in graph.dependents(id) {
                    if let Some(count) = remaining.get_mut(&dependent) {
                        *count = count.saturating_sub(1);
                    }
                }
            }

            batches.push(ProvisioningBatch {
                index: batches.len(),
                resources: ready.into_iter().map(ToString::to_string).collect(),
            });
        }

        log::debug!(
            "Synthesized {} batches for {} resources",
            batches.len(),
            graph.len()
        );
        Ok(Self { batches })
    }

    /// Plan only the given targets and everything they depend on.
    pub fn synthesize_for_targets(graph: &DependencyGraph, targets: &[String]) -> Result<Self> {
        let mut keep = BTreeSet::new();
        for target in targets {
            if !graph.contains(target) {
                return Err(Error::UnresolvedReference {
                    missing: target.clone(),
                    referenced_by: "--target".to_string(),
                });
            }
            keep.insert(target.clone());
            keep.extend(graph.transitive_dependencies(target));
        }
        Self::synthesize(&graph.subgraph(&keep))
    }

    /// Batches in execution order
    pub fn batches(&self) -> &[ProvisioningBatch] {
        &self.batches
    }

    /// Number of batches
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.batches.iter().map(|b| b.resources.len()).sum()
    }

    /// Batch index holding `identity`
    pub fn batch_of(&self, identity: &str) -> Option<usize> {
        self.batches
            .iter()
            .find(|b| b.resources.iter().any(|r| r == identity))
            .map(|b| b.index)
    }

    /// Every identity in execution order
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.batches
            .iter()
            .flat_map(|b| b.resources.iter().map(String::as_str))
    }

    /// Every identity in teardown order (reverse of execution order)
    pub fn teardown_order(&self) -> Vec<String> {
        let mut order: Vec<String> = self.identities().map(ToString::to_string).collect();
        order.reverse();
        order
    }
}
