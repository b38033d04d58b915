//! # Declarative
//!
//! A dependency-resolution and provisioning engine for declared cloud resources.
//!
//! Resources reference each other's outputs (`${ApiCertificate.arn}`); the
//! engine turns those references into a dependency graph, layers it into
//! batches, reconciles each resource against persisted state and drives a
//! provisioning backend until the declared topology exists.
//!
//! ## Core Concepts
//!
//! - **Registry**: the declared resources, keyed by identity
//! - **DependencyGraph**: edges inferred from references, validated acyclic
//! - **ExecutionPlan**: ordered batches; a batch only depends on earlier ones
//! - **Reconciler**: create / update / replace / no-op per resource, by spec hash
//! - **Executor**: apply, resume, rollback and destroy with per-batch parallelism
//! - **StateStore**: where confirmed backend state is persisted
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     AutoConfirm, ExecuteOptions, Executor, FileStateStore, NoProgress,
//!     ProviderRegistry, Registry, ResourceDefinition, ResourceKind,
//! };
//!
//! let registry = Registry::from_definitions([
//!     ResourceDefinition::new("Role", ResourceKind::Role).with("assumed_by", "lambda"),
//!     ResourceDefinition::new("Function", ResourceKind::Function)
//!         .with("handler", "hello.handler")
//!         .with_ref("role", "Role", "arn"),
//! ])?;
//!
//! let providers = ProviderRegistry::new().with(RoleProvider).with(FunctionProvider);
//! let store = FileStateStore::new("demo.state.json");
//! let report = Executor::new(&providers, &store, ExecuteOptions::default())
//!     .apply(&registry, &mut NoProgress, &mut AutoConfirm)?;
//! ```
//!
//! ## Provider Traits
//!
//! - [`ResourceProvider`]: backend operations for one resource kind
//! - [`StateStore`]: persisted deployment state
//! - [`ProgressCallback`]: receives progress updates
//! - [`ConfirmCallback`]: handles user confirmations

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod graph;
pub mod planner;
pub mod registry;
pub mod resolve;
pub mod resource;
pub mod retry;
pub mod state;
pub mod types;

// Re-export main types at crate root
pub use context::{
    AutoConfirm, AutoDecline, CancelToken, ConfirmCallback, NoProgress, ProgressCallback,
};
pub use diff::{
    DiffSummary, PlanReport, PropertyChange, ResourceDiff, UNKNOWN_VALUE, plan_changes,
    reconcile, spec_hash,
};
pub use error::{Error, ErrorCategory, Result};
pub use executor::Executor;
pub use graph::{DependencyEdge, DependencyGraph};
pub use planner::{ExecutionPlan, ProvisioningBatch};
pub use registry::{Registry, is_valid_identity};
pub use resolve::{
    collect_references, parse_properties, parse_reference, parse_value, resolve, resolve_properties,
};
pub use resource::{Description, ProviderRegistry, Provisioned, ResourceProvider};
pub use retry::{NoCallback, RetryCallback, with_retry};
pub use state::{
    DeploymentState, FileStateStore, MemoryStateStore, RunEntry, RunRecord, StateEntry,
    StateStore,
};
pub use types::{
    ExecuteOptions, ExecuteSummary, Outputs, Properties, PropertyValue, Reference,
    ResourceDefinition, ResourceKind, ResourceOperationResult, ResourceStatus, RetryConfig,
    RunOperation, RunReport, RunStatus, Segment, Verb,
};

/// Recording in-memory backend shared by the engine tests.
#[cfg(test)]
pub(crate) mod test_support {
    use crate::error::{Error, Result};
    use crate::registry::Registry;
    use crate::resource::{Description, ProviderRegistry, Provisioned, ResourceProvider};
    use crate::types::{Outputs, Properties, ResourceDefinition, ResourceKind};
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::{Arc, Mutex, MutexGuard};

    /// Cert, Role, Function(Role), Gateway(Cert), Deployment(Gateway, Function)
    pub fn scenario_registry() -> Registry {
        Registry::from_definitions([
            ResourceDefinition::new("Cert", ResourceKind::Certificate)
                .with("domain_name", "example.com"),
            ResourceDefinition::new("Role", ResourceKind::Role).with("assumed_by", "lambda"),
            ResourceDefinition::new("Function", ResourceKind::Function)
                .with("handler", "hello.handler")
                .with_ref("role", "Role", "arn"),
            ResourceDefinition::new("Gateway", ResourceKind::GatewayApi)
                .with("name", "DemoApi")
                .with_ref("certificate", "Cert", "arn"),
            ResourceDefinition::new("Deployment", ResourceKind::Deployment)
                .with_ref("rest_api_id", "Gateway", "rest_api_id")
                .with_ref("function", "Function", "arn"),
        ])
        .unwrap()
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Call {
        pub op: &'static str,
        pub identity: String,
    }

    #[derive(Default)]
    struct Inner {
        next_id: u64,
        /// identifier -> (identity, outputs)
        live: BTreeMap<String, (String, Outputs)>,
        calls: Vec<Call>,
        created: Vec<String>,
        deleted: Vec<(String, String)>,
        permanent: BTreeSet<String>,
        transient: BTreeMap<String, u32>,
        not_ready: BTreeMap<String, u32>,
    }

    impl Inner {
        fn identity_of(&self, identifier: &str) -> String {
            self.live
                .get(identifier)
                .map_or_else(|| identifier.to_string(), |(id, _)| id.clone())
        }

        fn inject(&mut self, identity: &str) -> Result<()> {
            if self.permanent.contains(identity) {
                return Err(Error::permanent(format!("{identity} rejected")));
            }
            if let Some(remaining) = self.transient.get_mut(identity)
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(Error::transient(format!("{identity} throttled")));
            }
            Ok(())
        }
    }

    /// Shared fake cloud account; every provider it hands out records into it.
    #[derive(Clone, Default)]
    pub struct MockBackend {
        inner: Arc<Mutex<Inner>>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        fn inner(&self) -> MutexGuard<'_, Inner> {
            self.inner.lock().unwrap()
        }

        pub fn provider(&self, kind: ResourceKind) -> MockProvider {
            MockProvider {
                kind,
                backend: self.clone(),
            }
        }

        /// A registry with a mock provider for every kind.
        pub fn providers(&self) -> ProviderRegistry {
            let mut registry = ProviderRegistry::new();
            for kind in ResourceKind::ALL {
                registry.register(Box::new(self.provider(kind)));
            }
            registry
        }

        pub fn fail_permanent(&self, identity: &str) {
            self.inner().permanent.insert(identity.to_string());
        }

        pub fn heal(&self, identity: &str) {
            let mut inner = self.inner();
            inner.permanent.remove(identity);
            inner.transient.remove(identity);
        }

        /// Fail the next `times` mutating calls for `identity` transiently.
        pub fn fail_transient(&self, identity: &str, times: u32) {
            self.inner().transient.insert(identity.to_string(), times);
        }

        /// Report `identity` as not ready for the next `polls` describes.
        pub fn not_ready(&self, identity: &str, polls: u32) {
            self.inner().not_ready.insert(identity.to_string(), polls);
        }

        /// Delete a resource behind the engine's back.
        pub fn remove_out_of_band(&self, identity: &str) {
            self.inner().live.retain(|_, (id, _)| id != identity);
        }

        pub fn calls(&self) -> Vec<Call> {
            self.inner().calls.clone()
        }

        pub fn mutations(&self) -> Vec<Call> {
            self.calls()
                .into_iter()
                .filter(|c| c.op != "describe")
                .collect()
        }

        /// Identities successfully created, in order
        pub fn creates(&self) -> Vec<String> {
            self.inner().created.clone()
        }

        pub fn create_attempts(&self, identity: &str) -> usize {
            self.count("create", identity)
        }

        pub fn describe_count(&self, identity: &str) -> usize {
            self.count("describe", identity)
        }

        fn count(&self, op: &str, identity: &str) -> usize {
            self.inner()
                .calls
                .iter()
                .filter(|c| c.op == op && c.identity == identity)
                .count()
        }

        /// Identities successfully deleted, in order
        pub fn deleted_identities(&self) -> Vec<String> {
            self.inner().deleted.iter().map(|(id, _)| id.clone()).collect()
        }

        pub fn deleted_identifiers(&self) -> Vec<String> {
            self.inner()
                .deleted
                .iter()
                .map(|(_, identifier)| identifier.clone())
                .collect()
        }
    }

    pub struct MockProvider {
        kind: ResourceKind,
        backend: MockBackend,
    }

    impl ResourceProvider for MockProvider {
        fn kind(&self) -> ResourceKind {
            self.kind
        }

        fn create(&self, identity: &str, _properties: &Properties) -> Result<Provisioned> {
            let mut inner = self.backend.inner();
            inner.calls.push(Call {
                op: "create",
                identity: identity.to_string(),
            });
            inner.inject(identity)?;

            inner.next_id += 1;
            let identifier = format!("{}-{identity}-{}", self.kind, inner.next_id);
            let outputs: Outputs = self
                .kind
                .output_attributes()
                .iter()
                .map(|attr| (attr.to_string(), format!("{identifier}/{attr}")))
                .collect();
            inner
                .live
                .insert(identifier.clone(), (identity.to_string(), outputs.clone()));
            inner.created.push(identity.to_string());
            Ok(Provisioned {
                identifier,
                outputs,
            })
        }

        fn update(&self, identifier: &str, _properties: &Properties) -> Result<Outputs> {
            let mut inner = self.backend.inner();
            let identity = inner.identity_of(identifier);
            inner.calls.push(Call {
                op: "update",
                identity: identity.clone(),
            });
            inner.inject(&identity)?;
            match inner.live.get(identifier) {
                Some((_, outputs)) => Ok(outputs.clone()),
                None => Err(Error::permanent(format!("{identifier} does not exist"))),
            }
        }

        fn delete(&self, identifier: &str) -> Result<()> {
            let mut inner = self.backend.inner();
            let identity = inner.identity_of(identifier);
            inner.calls.push(Call {
                op: "delete",
                identity: identity.clone(),
            });
            inner.inject(&identity)?;
            inner.live.remove(identifier);
            inner.deleted.push((identity, identifier.to_string()));
            Ok(())
        }

        fn describe(&self, identifier: &str) -> Result<Description> {
            let mut inner = self.backend.inner();
            let identity = inner.identity_of(identifier);
            inner.calls.push(Call {
                op: "describe",
                identity: identity.clone(),
            });
            let Some((_, outputs)) = inner.live.get(identifier).cloned() else {
                return Ok(Description::absent());
            };
            if let Some(polls) = inner.not_ready.get_mut(&identity)
                && *polls > 0
            {
                *polls = polls.saturating_sub(1);
                return Ok(Description::pending(outputs));
            }
            Ok(Description::ready(outputs))
        }

        fn replacement_properties(&self) -> &'static [&'static str] {
            &["immutable"]
        }
    }
}
