//! State reconciliation and the side-effect-free plan report
//!
//! The reconciler compares a resource's desired spec against its persisted
//! [`StateEntry`] and decides the verb. It never touches state; the executor
//! commits only after the backend confirms.

use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::planner::ExecutionPlan;
use crate::registry::Registry;
use crate::resolve::resolve_properties;
use crate::resource::{ProviderRegistry, ResourceProvider};
use crate::state::{DeploymentState, StateEntry};
use crate::types::{Properties, ResourceKind, Verb};
use serde::Serialize;
use serde_json::{Value, json};
use std::cell::Cell;
use std::collections::BTreeSet;

/// Placeholder for values that only exist after an upstream change lands.
pub const UNKNOWN_VALUE: &str = "(known after apply)";

/// Content hash of a resource's kind and resolved properties.
pub fn spec_hash(kind: ResourceKind, properties: &Properties) -> Result<String> {
    let body = serde_json::to_vec(&json!({ "kind": kind, "properties": properties }))?;
    Ok(blake3::hash(&body).to_hex().to_string())
}

/// Decide the verb for one resource.
///
/// - no prior entry: `Create`
/// - same hash: `NoOp`
/// - different hash: `Replace` when the kind changed or the provider says
///   the change cannot be applied in place, otherwise `Update`
pub fn reconcile(
    kind: ResourceKind,
    prior: Option<&StateEntry>,
    desired_hash: &str,
    desired: &Properties,
    provider: &dyn ResourceProvider,
) -> Verb {
    match prior {
        None => Verb::Create,
        Some(entry) if entry.spec_hash == desired_hash && entry.kind == kind => Verb::NoOp,
        Some(entry) if entry.kind != kind => Verb::Replace,
        Some(entry) if provider.requires_replacement(&entry.properties, desired) => Verb::Replace,
        Some(_) => Verb::Update,
    }
}

/// A single property-level change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyChange {
    pub name: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

/// Planned change for one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceDiff {
    pub identity: String,
    pub kind: ResourceKind,
    pub batch: usize,
    pub verb: Verb,
    /// Some inputs reference resources that change in this plan
    pub inputs_pending: bool,
    /// A replacement that disturbs DNS or TLS bindings
    pub affects_bindings: bool,
    /// Property-level changes against the recorded properties
    pub changes: Vec<PropertyChange>,
}

impl ResourceDiff {
    pub fn is_change(&self) -> bool {
        self.verb.is_change()
    }
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub creates: usize,
    pub updates: usize,
    pub replaces: usize,
    pub no_ops: usize,
    pub orphans: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff], orphans: usize) -> Self {
        let mut summary = Self {
            orphans,
            ..Self::default()
        };
        for diff in diffs {
            match diff.verb {
                Verb::Create => summary.creates += 1,
                Verb::Update => summary.updates += 1,
                Verb::Replace => summary.replaces += 1,
                Verb::NoOp | Verb::Delete => summary.no_ops += 1,
            }
        }
        summary
    }

    pub fn total_changes(&self) -> usize {
        self.creates + self.updates + self.replaces
    }
}

/// Everything `plan` reports.
#[derive(Debug, Clone)]
pub struct PlanReport {
    pub plan: ExecutionPlan,
    /// One diff per planned resource, in batch order
    pub diffs: Vec<ResourceDiff>,
    /// Recorded identities no longer declared
    pub orphans: Vec<String>,
}

impl PlanReport {
    pub fn summary(&self) -> DiffSummary {
        DiffSummary::from_diffs(&self.diffs, self.orphans.len())
    }

    pub fn has_changes(&self) -> bool {
        self.diffs.iter().any(ResourceDiff::is_change)
    }

    pub fn diff(&self, identity: &str) -> Option<&ResourceDiff> {
        self.diffs.iter().find(|d| d.identity == identity)
    }

    /// Human-readable warnings for replacements touching DNS/TLS bindings
    pub fn warnings(&self) -> Vec<String> {
        self.diffs
            .iter()
            .filter(|d| d.affects_bindings)
            .map(|d| {
                format!(
                    "replacing {} ({}) affects DNS/TLS bindings downstream",
                    d.identity, d.kind
                )
            })
            .collect()
    }
}

/// Whether replacing `identity` disturbs a certificate, custom domain or record.
pub fn affects_bindings(graph: &DependencyGraph, identity: &str) -> bool {
    graph.kind(identity).is_some_and(|k| k.is_binding())
        || graph
            .transitive_dependents(identity)
            .iter()
            .any(|id| graph.kind(id).is_some_and(|k| k.is_binding()))
}

/// Compute property-level changes between recorded and desired properties.
pub fn property_changes(before: &Properties, after: &Properties) -> Vec<PropertyChange> {
    let names: BTreeSet<&String> = before.keys().chain(after.keys()).collect();
    names
        .into_iter()
        .filter(|name| before.get(*name) != after.get(*name))
        .map(|name| PropertyChange {
            name: name.clone(),
            before: before.get(name).cloned(),
            after: after.get(name).cloned(),
        })
        .collect()
}

/// Reconcile every planned resource without calling the backend.
///
/// References to resources that change in this plan resolve to
/// [`UNKNOWN_VALUE`] and mark the dependent `inputs_pending`.
pub fn plan_changes(
    registry: &Registry,
    graph: &DependencyGraph,
    plan: &ExecutionPlan,
    state: &DeploymentState,
    providers: &ProviderRegistry,
) -> Result<PlanReport> {
    let mut changing: BTreeSet<String> = BTreeSet::new();
    let mut diffs = Vec::with_capacity(plan.total_resources());

    for batch in plan.batches() {
        for identity in &batch.resources {
            let Some(definition) = registry.get(identity) else {
                continue;
            };
            let provider = providers.get(definition.kind)?;
            let prior = state.get(identity);

            let pending = Cell::new(false);
            let lookup = |r: &crate::types::Reference| {
                if changing.contains(&r.target) {
                    pending.set(true);
                    Some(UNKNOWN_VALUE.to_string())
                } else {
                    state.output(r)
                }
            };
            let desired = match resolve_properties(definition, lookup) {
                Ok(props) => props,
                Err(missing) => {
                    log::debug!(
                        "{identity}: {} references without recorded outputs",
                        missing.len()
                    );
                    pending.set(true);
                    resolve_properties(definition, |_| Some(UNKNOWN_VALUE.to_string()))
                        .unwrap_or_default()
                }
            };
            let inputs_pending = pending.get();

            let verb = if inputs_pending {
                match prior {
                    None => Verb::Create,
                    Some(entry)
                        if entry.kind != definition.kind
                            || provider.requires_replacement(&entry.properties, &desired) =>
                    {
                        Verb::Replace
                    }
                    Some(_) => Verb::Update,
                }
            } else {
                let hash = spec_hash(definition.kind, &desired)?;
                reconcile(definition.kind, prior, &hash, &desired, provider)
            };

            let changes = match prior {
                Some(entry) if verb.is_change() => property_changes(&entry.properties, &desired),
                None => property_changes(&Properties::new(), &desired),
                Some(_) => Vec::new(),
            };

            if verb.is_change() {
                changing.insert(identity.clone());
            }

            diffs.push(ResourceDiff {
                identity: identity.clone(),
                kind: definition.kind,
                batch: batch.index,
                verb,
                inputs_pending,
                affects_bindings: verb == Verb::Replace && affects_bindings(graph, identity),
                changes,
            });
        }
    }

    Ok(PlanReport {
        plan: plan.clone(),
        diffs,
        orphans: state.orphans(registry.identities()),
    })
}
