//! Execution engine - walks provisioning batches with per-batch parallelism
//!
//! Batches run strictly in order. Resources inside a batch are dispatched on
//! a rayon pool of `jobs` threads. Every state write goes through one mutex,
//! so concurrent completions are persisted one at a time.

use crate::context::{CancelToken, ConfirmCallback, ProgressCallback};
use crate::diff::{PlanReport, affects_bindings, plan_changes, reconcile, spec_hash};
use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::planner::ExecutionPlan;
use crate::registry::Registry;
use crate::resolve::resolve_properties;
use crate::resource::{ProviderRegistry, ResourceProvider};
use crate::retry::{LogCallback, with_retry};
use crate::state::{DeploymentState, RunEntry, RunRecord, StateEntry, StateStore};
use crate::types::{
    ExecuteOptions, Outputs, Properties, ResourceDefinition, ResourceOperationResult,
    ResourceStatus, RunOperation, RunReport, RunStatus, Verb,
};
use chrono::Utc;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Instant;

/// Drives apply, resume, rollback and destroy against one state store.
pub struct Executor<'a> {
    providers: &'a ProviderRegistry,
    store: &'a dyn StateStore,
    options: ExecuteOptions,
    cancel: CancelToken,
}

impl<'a> Executor<'a> {
    pub fn new(
        providers: &'a ProviderRegistry,
        store: &'a dyn StateStore,
        options: ExecuteOptions,
    ) -> Self {
        Self {
            providers,
            store,
            options,
            cancel: CancelToken::new(),
        }
    }

    /// Use an externally controlled cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &ExecuteOptions {
        &self.options
    }

    /// Validate, layer and reconcile without side effects.
    pub fn plan(&self, registry: &Registry, targets: &[String]) -> Result<PlanReport> {
        let graph = self.validate(registry)?;
        let plan = if targets.is_empty() {
            ExecutionPlan::synthesize(&graph)?
        } else {
            ExecutionPlan::synthesize_for_targets(&graph, targets)?
        };
        let state = self.store.load()?;
        plan_changes(registry, &graph, &plan, &state, self.providers)
    }

    fn validate(&self, registry: &Registry) -> Result<DependencyGraph> {
        let graph = DependencyGraph::build(registry)?;
        self.providers
            .ensure_supported(registry.iter().map(|d| d.kind))?;
        Ok(graph)
    }

    /// Converge the backend on the declared resources.
    ///
    /// Build-time errors return before any backend call.
    pub fn apply<P, C>(
        &self,
        registry: &Registry,
        progress: &mut P,
        confirm: &mut C,
    ) -> Result<RunReport>
    where
        P: ProgressCallback,
        C: ConfirmCallback,
    {
        let graph = self.validate(registry)?;
        let plan = ExecutionPlan::synthesize(&graph)?;
        let state = self.store.load()?;
        let report = plan_changes(registry, &graph, &plan, &state, self.providers)?;

        for orphan in &report.orphans {
            log::warn!("{orphan} is recorded in state but no longer declared (use destroy)");
        }

        let summary = report.summary();
        if summary.total_changes() > 0
            && !confirm.confirm(&format!(
                "Apply {} changes ({} create, {} update, {} replace)?",
                summary.total_changes(),
                summary.creates,
                summary.updates,
                summary.replaces
            ))?
        {
            return Ok(declined(RunOperation::Apply));
        }

        let record = RunRecord::new(new_run_id(), RunOperation::Apply);
        self.run(registry, &graph, &plan, state, record, progress)
    }

    /// Continue a run that ended partially failed or cancelled.
    ///
    /// Only resources the interrupted run did not finish are planned;
    /// references to finished ones resolve from persisted outputs.
    pub fn resume<P, C>(
        &self,
        registry: &Registry,
        progress: &mut P,
        confirm: &mut C,
    ) -> Result<RunReport>
    where
        P: ProgressCallback,
        C: ConfirmCallback,
    {
        let graph = self.validate(registry)?;
        let state = self.store.load()?;

        let Some(previous) = state.last_run.clone() else {
            return Err(Error::NothingToResume {
                reason: "no run has been recorded".to_string(),
            });
        };
        if previous.operation.is_teardown() {
            return Err(Error::NothingToResume {
                reason: format!(
                    "last run {} was a {}; re-run {}",
                    previous.run_id, previous.operation, previous.operation
                ),
            });
        }
        if !previous.status.is_resumable() {
            return Err(Error::NothingToResume {
                reason: format!("last run {} is {}", previous.run_id, previous.status),
            });
        }

        let done: BTreeSet<&str> = previous.done().collect();
        let remaining: BTreeSet<String> = graph
            .nodes()
            .filter(|id| !done.contains(id))
            .map(ToString::to_string)
            .collect();
        let plan = ExecutionPlan::synthesize(&graph.subgraph(&remaining))?;

        if !plan.is_empty()
            && !confirm.confirm(&format!(
                "Resume run {} with {} remaining resources?",
                previous.run_id,
                plan.total_resources()
            ))?
        {
            return Ok(declined(RunOperation::Resume));
        }

        let mut record = RunRecord::new(previous.run_id.clone(), RunOperation::Resume);
        record.started_at = previous.started_at;
        record.resources = previous
            .resources
            .into_iter()
            .filter(|(_, entry)| entry.status == ResourceStatus::Done)
            .collect();

        log::info!(
            "Resuming run {} ({} done, {} remaining)",
            record.run_id,
            record.resources.len(),
            plan.total_resources()
        );
        self.run(registry, &graph, &plan, state, record, progress)
    }

    // ------------------------------------------------------------------------
    // Forward execution
    // ------------------------------------------------------------------------

    fn run<P: ProgressCallback>(
        &self,
        registry: &Registry,
        graph: &DependencyGraph,
        plan: &ExecutionPlan,
        mut state: DeploymentState,
        mut record: RunRecord,
        progress: &mut P,
    ) -> Result<RunReport> {
        for identity in plan.identities() {
            record.resources.insert(
                identity.to_string(),
                RunEntry {
                    status: ResourceStatus::Pending,
                    verb: Verb::NoOp,
                    error: None,
                },
            );
        }
        record.status = RunStatus::Running;
        let run_id = record.run_id.clone();
        let operation = record.operation;
        state.last_run = Some(record);
        self.store.save(&state)?;

        let shared = Mutex::new(state);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs.max(1))
            .build()?;

        let mut results: Vec<ResourceOperationResult> = Vec::with_capacity(plan.total_resources());
        let mut blocked: BTreeSet<String> = BTreeSet::new();
        let mut any_failed = false;
        let mut cancelled = false;

        for batch in plan.batches() {
            let halt_reason = if self.cancel.is_cancelled() {
                cancelled = true;
                Some("cancelled before dispatch")
            } else if self.options.fail_fast && any_failed {
                Some("not dispatched after an earlier failure (fail-fast)")
            } else {
                None
            };

            let definitions: Vec<&ResourceDefinition> = batch
                .resources
                .iter()
                .filter_map(|id| registry.get(id))
                .collect();

            if let Some(reason) = halt_reason {
                for definition in &definitions {
                    let result = skipped(definition, reason.to_string());
                    self.record_outcome(&shared, &result, None);
                    progress.on_resource_complete(&result);
                    results.push(result);
                }
                continue;
            }

            progress.on_batch_start(batch.index, plan.len(), &batch.resources);

            let mut dispatch = Vec::with_capacity(definitions.len());
            let mut batch_results = Vec::new();
            for definition in definitions {
                let failed_upstream: Vec<&str> = graph
                    .dependencies(&definition.identity)
                    .filter(|dep| blocked.contains(*dep))
                    .collect();
                if failed_upstream.is_empty() {
                    dispatch.push(definition);
                } else {
                    let result = skipped(
                        definition,
                        format!("dependency not done: {}", failed_upstream.join(", ")),
                    );
                    self.record_outcome(&shared, &result, None);
                    batch_results.push(result);
                }
            }

            for definition in &dispatch {
                progress.on_resource_start(&definition.identity, definition.kind.as_str());
            }

            // Progress callbacks are not thread-safe; results are reported after the batch.
            let collected = Mutex::new(Vec::with_capacity(dispatch.len()));
            pool.install(|| {
                dispatch.par_iter().for_each(|definition| {
                    let result = if self.cancel.is_cancelled() {
                        let result = skipped(definition, "cancelled before dispatch".into());
                        self.record_outcome(&shared, &result, None);
                        result
                    } else {
                        self.provision(graph, definition, &shared)
                    };
                    lock(&collected).push(result);
                });
            });
            batch_results.extend(match collected.into_inner() {
                Ok(results) => results,
                Err(poisoned) => poisoned.into_inner(),
            });
            batch_results.sort_by(|a, b| a.identity.cmp(&b.identity));

            for result in &batch_results {
                match result.status {
                    ResourceStatus::Failed => {
                        any_failed = true;
                        blocked.insert(result.identity.clone());
                    }
                    ResourceStatus::Skipped => {
                        blocked.insert(result.identity.clone());
                    }
                    _ => {}
                }
                progress.on_resource_complete(result);
            }
            results.extend(batch_results);
            progress.on_batch_complete(batch.index);
        }

        if self.cancel.is_cancelled() {
            cancelled = true;
        }
        let status = if cancelled {
            RunStatus::Cancelled
        } else if results.iter().all(ResourceOperationResult::is_success) {
            RunStatus::Completed
        } else {
            RunStatus::PartiallyFailed
        };

        self.finish(&shared, status)?;
        log::info!("Run {run_id} finished: {status}");
        Ok(RunReport {
            run_id,
            operation,
            status,
            results,
        })
    }

    /// Reconcile and provision one resource. Never panics the batch: every
    /// error becomes a `Failed` result.
    fn provision(
        &self,
        graph: &DependencyGraph,
        definition: &ResourceDefinition,
        shared: &Mutex<DeploymentState>,
    ) -> ResourceOperationResult {
        let identity = definition.identity.as_str();
        let (resolved, prior) = {
            let state = lock(shared);
            (
                resolve_properties(definition, |r| state.output(r)),
                state.get(identity).cloned(),
            )
        };

        let outcome = match resolved {
            Ok(desired) => self.converge(graph, definition, desired, prior.as_ref(), shared),
            Err(missing) => {
                let names: Vec<String> = missing.iter().map(ToString::to_string).collect();
                Err((
                    Verb::NoOp,
                    Error::permanent(format!("outputs not available: {}", names.join(", "))),
                ))
            }
        };

        let result = match outcome {
            Ok(result) => result,
            Err((verb, e)) => {
                log::error!("{identity}: {verb} failed: {e}");
                ResourceOperationResult::failed(identity, definition.kind, verb, e.to_string())
            }
        };
        if result.status != ResourceStatus::Done {
            self.record_outcome(shared, &result, None);
        }
        result
    }

    fn converge(
        &self,
        graph: &DependencyGraph,
        definition: &ResourceDefinition,
        desired: Properties,
        prior: Option<&StateEntry>,
        shared: &Mutex<DeploymentState>,
    ) -> std::result::Result<ResourceOperationResult, (Verb, Error)> {
        let identity = definition.identity.as_str();
        let kind = definition.kind;
        let provider = self.providers.get(kind).map_err(|e| (Verb::NoOp, e))?;
        let hash = spec_hash(kind, &desired).map_err(|e| (Verb::NoOp, e))?;
        let mut verb = reconcile(kind, prior, &hash, &desired, provider);
        let mut prior = prior;
        let retry_log = LogCallback { identity };

        if verb == Verb::NoOp
            && self.options.refresh
            && let Some(entry) = prior
        {
            let description = with_retry(&self.options.retry, Some(&retry_log), || {
                provider.describe(&entry.identifier)
            })
            .map_err(|e| (Verb::NoOp, e))?;
            if !description.exists {
                log::warn!(
                    "{identity}: {} no longer exists in the backend, re-creating",
                    entry.identifier
                );
                verb = Verb::Create;
                prior = None;
            } else if description.outputs != entry.outputs && !description.outputs.is_empty() {
                log::info!("{identity}: outputs drifted, refreshing recorded values");
                let mut refreshed = entry.clone();
                refreshed.outputs = description.outputs.clone();
                let result = ResourceOperationResult::done(
                    identity,
                    kind,
                    Verb::NoOp,
                    description.outputs,
                );
                self.record_outcome(shared, &result, Some(refreshed));
                return Ok(result);
            }
        }

        log::info!("{identity}: {verb}");
        let outputs = match (verb, prior) {
            (Verb::NoOp, Some(entry)) => {
                let result =
                    ResourceOperationResult::done(identity, kind, Verb::NoOp, entry.outputs.clone());
                self.record_outcome(shared, &result, None);
                return Ok(result);
            }
            (Verb::Update, Some(entry)) => {
                let outputs = with_retry(&self.options.retry, Some(&retry_log), || {
                    provider.update(&entry.identifier, &desired)
                })
                .map_err(|e| (verb, e))?;
                let ready = self
                    .wait_ready(provider, identity, &entry.identifier)
                    .map_err(|e| (verb, e))?;
                (entry.identifier.clone(), merge(outputs, ready))
            }
            (Verb::Replace, Some(_)) => {
                if affects_bindings(graph, identity) {
                    log::warn!("{identity}: replacement affects DNS/TLS bindings downstream");
                }
                self.create(provider, identity, &desired)
                    .map_err(|e| (verb, e))?
            }
            _ => {
                verb = Verb::Create;
                self.create(provider, identity, &desired)
                    .map_err(|e| (verb, e))?
            }
        };
        let (identifier, outputs) = outputs;

        let entry = StateEntry {
            kind,
            spec_hash: hash,
            identifier,
            properties: desired,
            outputs: outputs.clone(),
            depends_on: definition.dependencies(),
            last_applied: Utc::now(),
        };
        let result = ResourceOperationResult::done(identity, kind, verb, outputs);
        if let Err(e) = self.commit(shared, &result, Some(entry)) {
            return Err((verb, e));
        }

        if verb == Verb::Replace
            && let Some(old) = prior
        {
            let deleted = with_retry(&self.options.retry, Some(&retry_log), || {
                provider.delete(&old.identifier)
            });
            if let Err(e) = deleted {
                log::warn!(
                    "{identity}: replaced, but deleting previous {} failed: {e}",
                    old.identifier
                );
            }
        }

        Ok(result)
    }

    fn create(
        &self,
        provider: &dyn ResourceProvider,
        identity: &str,
        desired: &Properties,
    ) -> Result<(String, Outputs)> {
        let retry_log = LogCallback { identity };
        let provisioned = with_retry(&self.options.retry, Some(&retry_log), || {
            provider.create(identity, desired)
        })?;
        let ready = self.wait_ready(provider, identity, &provisioned.identifier)?;
        Ok((provisioned.identifier, merge(provisioned.outputs, ready)))
    }

    /// Poll `describe` until the resource reports ready.
    ///
    /// Bounded by `resource_timeout`; a timeout fails only this resource.
    fn wait_ready(
        &self,
        provider: &dyn ResourceProvider,
        identity: &str,
        identifier: &str,
    ) -> Result<Outputs> {
        let started = Instant::now();
        let retry_log = LogCallback { identity };
        loop {
            let description = with_retry(&self.options.retry, Some(&retry_log), || {
                provider.describe(identifier)
            })?;
            if !description.exists {
                return Err(Error::permanent(format!(
                    "{identifier} disappeared while waiting for it to become ready"
                )));
            }
            if description.ready {
                return Ok(description.outputs);
            }

            let elapsed = started.elapsed();
            if elapsed >= self.options.resource_timeout {
                return Err(Error::Timeout {
                    identity: identity.to_string(),
                    seconds: elapsed.as_secs(),
                });
            }
            log::debug!("{identity}: waiting for {identifier} to become ready");
            thread::sleep(
                self.options
                    .poll_interval
                    .min(self.options.resource_timeout - elapsed),
            );
        }
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Delete everything the last run left `Done`, in reverse topological order.
    pub fn rollback<P, C>(&self, progress: &mut P, confirm: &mut C) -> Result<RunReport>
    where
        P: ProgressCallback,
        C: ConfirmCallback,
    {
        let state = self.store.load()?;
        let Some(previous) = state.last_run.as_ref() else {
            return Err(Error::NothingToResume {
                reason: "no run has been recorded, nothing to roll back".to_string(),
            });
        };
        if previous.status == RunStatus::RolledBack {
            return Err(Error::NothingToResume {
                reason: format!("run {} is already rolled back", previous.run_id),
            });
        }

        let targets: BTreeSet<String> = match previous.operation {
            RunOperation::Destroy => {
                return Err(Error::NothingToResume {
                    reason: format!("last run {} was a destroy; re-run destroy", previous.run_id),
                });
            }
            // An interrupted rollback still owes whatever it did not delete.
            RunOperation::Rollback => previous
                .resources
                .iter()
                .filter(|(id, entry)| {
                    entry.status != ResourceStatus::Done && state.get(id).is_some()
                })
                .map(|(id, _)| id.clone())
                .collect(),
            RunOperation::Apply | RunOperation::Resume => previous
                .done()
                .filter(|id| state.get(id).is_some())
                .map(ToString::to_string)
                .collect(),
        };
        let order = teardown_order(&state, &targets)?;
        if !order.is_empty()
            && !confirm.confirm(&format!(
                "Roll back run {} by deleting {} resources?",
                previous.run_id,
                order.len()
            ))?
        {
            return Ok(declined(RunOperation::Rollback));
        }

        let record = RunRecord::new(previous.run_id.clone(), RunOperation::Rollback);
        self.teardown(state, record, &order, RunStatus::RolledBack, progress)
    }

    /// Delete recorded resources: all of them, or `targets` when given.
    ///
    /// Works from state alone, so it also removes resources no longer
    /// declared. Refuses to strand recorded dependents of a target.
    pub fn destroy<P, C>(
        &self,
        targets: &[String],
        progress: &mut P,
        confirm: &mut C,
    ) -> Result<RunReport>
    where
        P: ProgressCallback,
        C: ConfirmCallback,
    {
        let state = self.store.load()?;
        let selected: BTreeSet<String> = if targets.is_empty() {
            state.resources.keys().cloned().collect()
        } else {
            targets.iter().cloned().collect()
        };

        for identity in &selected {
            if state.get(identity).is_none() {
                return Err(Error::UnresolvedReference {
                    missing: identity.clone(),
                    referenced_by: "--target".to_string(),
                });
            }
            let stranded: Vec<String> = state
                .dependents_of(identity)
                .into_iter()
                .filter(|d| !selected.contains(d))
                .collect();
            if !stranded.is_empty() {
                return Err(Error::DependentsRemain {
                    identity: identity.clone(),
                    dependents: stranded,
                });
            }
        }

        let order = teardown_order(&state, &selected)?;
        if !order.is_empty()
            && !confirm.confirm(&format!("Destroy {} resources?", order.len()))?
        {
            return Ok(declined(RunOperation::Destroy));
        }

        let record = RunRecord::new(new_run_id(), RunOperation::Destroy);
        self.teardown(state, record, &order, RunStatus::Completed, progress)
    }

    /// Delete `order` one resource at a time. Failures are reported and the
    /// rest are still attempted.
    fn teardown<P: ProgressCallback>(
        &self,
        mut state: DeploymentState,
        mut record: RunRecord,
        order: &[String],
        success: RunStatus,
        progress: &mut P,
    ) -> Result<RunReport> {
        let run_id = record.run_id.clone();
        let operation = record.operation;
        record.status = RunStatus::Running;
        for identity in order {
            record.resources.insert(
                identity.clone(),
                RunEntry {
                    status: ResourceStatus::Pending,
                    verb: Verb::Delete,
                    error: None,
                },
            );
        }
        state.last_run = Some(record);
        self.store.save(&state)?;
        let shared = Mutex::new(state);

        progress.on_batch_start(0, 1, order);
        let mut results = Vec::with_capacity(order.len());
        let mut cancelled = false;

        for identity in order {
            let Some(entry) = lock(&shared).get(identity).cloned() else {
                continue;
            };

            if self.cancel.is_cancelled() {
                cancelled = true;
                let result = ResourceOperationResult::skipped(
                    identity,
                    entry.kind,
                    Verb::Delete,
                    "cancelled before dispatch".to_string(),
                );
                self.record_outcome(&shared, &result, None);
                progress.on_resource_complete(&result);
                results.push(result);
                continue;
            }

            progress.on_resource_start(identity, entry.kind.as_str());
            log::info!("{identity}: delete {}", entry.identifier);
            let retry_log = LogCallback { identity };
            let deleted = self.providers.get(entry.kind).and_then(|provider| {
                with_retry(&self.options.retry, Some(&retry_log), || {
                    provider.delete(&entry.identifier)
                })
            });

            let result = match deleted {
                Ok(()) => {
                    let result = ResourceOperationResult::done(
                        identity,
                        entry.kind,
                        Verb::Delete,
                        Outputs::new(),
                    );
                    match self.remove(&shared, &result) {
                        Ok(()) => result,
                        Err(e) => ResourceOperationResult::failed(
                            identity,
                            entry.kind,
                            Verb::Delete,
                            format!("deleted, but state write failed: {e}"),
                        ),
                    }
                }
                Err(e) => {
                    log::warn!("{identity}: delete failed: {e}");
                    let result = ResourceOperationResult::failed(
                        identity,
                        entry.kind,
                        Verb::Delete,
                        e.to_string(),
                    );
                    self.record_outcome(&shared, &result, None);
                    result
                }
            };
            progress.on_resource_complete(&result);
            results.push(result);
        }
        progress.on_batch_complete(0);

        let status = if cancelled {
            RunStatus::Cancelled
        } else if results.iter().all(ResourceOperationResult::is_success) {
            success
        } else {
            RunStatus::PartiallyFailed
        };
        self.finish(&shared, status)?;
        log::info!("{operation} {run_id} finished: {status}");
        Ok(RunReport {
            run_id,
            operation,
            status,
            results,
        })
    }

    // ------------------------------------------------------------------------
    // Single-writer state updates
    // ------------------------------------------------------------------------

    fn commit(
        &self,
        shared: &Mutex<DeploymentState>,
        result: &ResourceOperationResult,
        entry: Option<StateEntry>,
    ) -> Result<()> {
        let mut state = lock(shared);
        if let Some(entry) = entry {
            state.upsert(&result.identity, entry);
        }
        note(&mut state, result);
        self.store.save(&state)
    }

    fn remove(
        &self,
        shared: &Mutex<DeploymentState>,
        result: &ResourceOperationResult,
    ) -> Result<()> {
        let mut state = lock(shared);
        state.remove(&result.identity);
        note(&mut state, result);
        self.store.save(&state)
    }

    /// Commit, logging instead of failing when the store cannot be written.
    fn record_outcome(
        &self,
        shared: &Mutex<DeploymentState>,
        result: &ResourceOperationResult,
        entry: Option<StateEntry>,
    ) {
        if let Err(e) = self.commit(shared, result, entry) {
            log::error!(
                "{}: failed to persist state at {}: {e}",
                result.identity,
                self.store.location()
            );
        }
    }

    fn finish(&self, shared: &Mutex<DeploymentState>, status: RunStatus) -> Result<()> {
        let mut state = lock(shared);
        if let Some(run) = state.last_run.as_mut() {
            run.status = status;
            run.finished_at = Some(Utc::now());
        }
        self.store.save(&state)
    }
}

fn note(state: &mut DeploymentState, result: &ResourceOperationResult) {
    if let Some(run) = state.last_run.as_mut() {
        run.resources.insert(
            result.identity.clone(),
            RunEntry {
                status: result.status,
                verb: result.verb,
                error: result.error.clone(),
            },
        );
    }
}

/// Reverse topological order over recorded entries, restricted to `targets`.
fn teardown_order(state: &DeploymentState, targets: &BTreeSet<String>) -> Result<Vec<String>> {
    let graph = DependencyGraph::from_parts(
        state
            .resources
            .iter()
            .map(|(id, e)| (id.clone(), e.kind, e.depends_on.clone())),
    );
    let plan = ExecutionPlan::synthesize(&graph)?;
    Ok(plan
        .teardown_order()
        .into_iter()
        .filter(|id| targets.contains(id))
        .collect())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn merge(mut base: Outputs, overlay: Outputs) -> Outputs {
    base.extend(overlay);
    base
}

fn skipped(definition: &ResourceDefinition, reason: String) -> ResourceOperationResult {
    ResourceOperationResult::skipped(&definition.identity, definition.kind, Verb::NoOp, reason)
}

fn declined(operation: RunOperation) -> RunReport {
    RunReport {
        run_id: String::new(),
        operation,
        status: RunStatus::NotStarted,
        results: Vec::new(),
    }
}

fn new_run_id() -> String {
    format!("run-{}", Utc::now().format("%Y%m%dT%H%M%S%3fZ"))
}
