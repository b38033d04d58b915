//! Core types for declarative resource provisioning

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Output attributes reported by a backend, keyed by attribute name.
pub type Outputs = BTreeMap<String, String>;

/// Fully resolved property values handed to a provider.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// The closed set of resource kinds this engine knows how to provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// DNS hosted zone (looked up, not owned)
    HostedZone,
    /// TLS certificate validated through DNS
    Certificate,
    /// IAM-style role a principal may assume
    Role,
    /// Serverless compute function
    Function,
    /// REST API gateway
    GatewayApi,
    /// Method on a gateway path, integrated with a function
    GatewayMethod,
    /// Immutable snapshot of a gateway's configuration
    Deployment,
    /// Named stage pointing at a deployment
    Stage,
    /// Custom domain bound to a certificate and stage
    DomainName,
    /// DNS alias record
    Record,
}

impl ResourceKind {
    /// Every kind, in declaration order.
    pub const ALL: [ResourceKind; 10] = [
        ResourceKind::HostedZone,
        ResourceKind::Certificate,
        ResourceKind::Role,
        ResourceKind::Function,
        ResourceKind::GatewayApi,
        ResourceKind::GatewayMethod,
        ResourceKind::Deployment,
        ResourceKind::Stage,
        ResourceKind::DomainName,
        ResourceKind::Record,
    ];

    /// Type tag used in stack files and state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::HostedZone => "hosted_zone",
            ResourceKind::Certificate => "certificate",
            ResourceKind::Role => "role",
            ResourceKind::Function => "function",
            ResourceKind::GatewayApi => "gateway_api",
            ResourceKind::GatewayMethod => "gateway_method",
            ResourceKind::Deployment => "deployment",
            ResourceKind::Stage => "stage",
            ResourceKind::DomainName => "domain_name",
            ResourceKind::Record => "record",
        }
    }

    /// Output attributes a resource of this kind exposes to references.
    pub fn output_attributes(&self) -> &'static [&'static str] {
        match self {
            ResourceKind::HostedZone => &["zone_id", "name"],
            ResourceKind::Certificate => &["arn", "domain_name"],
            ResourceKind::Role => &["arn", "name"],
            ResourceKind::Function => &["arn", "name", "version"],
            ResourceKind::GatewayApi => &["rest_api_id", "root_resource_id", "arn"],
            ResourceKind::GatewayMethod => &["method_id", "path"],
            ResourceKind::Deployment => &["deployment_id"],
            ResourceKind::Stage => &["stage_name", "invoke_url"],
            ResourceKind::DomainName => &["domain_name", "target_domain_name", "hosted_zone_id"],
            ResourceKind::Record => &["fqdn"],
        }
    }

    /// Whether a replacement of this kind disturbs DNS or TLS bindings.
    pub fn is_binding(&self) -> bool {
        matches!(
            self,
            ResourceKind::Certificate | ResourceKind::DomainName | ResourceKind::Record
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .iter()
            .find(|k| k.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown resource kind '{s}'"))
    }
}

/// "Use output `attribute` of resource `target`"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Reference {
    /// Identity of the referenced resource
    pub target: String,
    /// Output attribute name
    pub attribute: String,
}

impl Reference {
    pub fn new(target: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            attribute: attribute.into(),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.attribute)
    }
}

/// A piece of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    Reference(Reference),
}

/// A declared property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Plain value with no references (string, number, bool, null)
    Literal(serde_json::Value),
    /// The whole value is another resource's output
    Reference(Reference),
    /// String with embedded references
    Template(Vec<Segment>),
    /// Ordered list
    List(Vec<PropertyValue>),
    /// Nested table
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Literal string value.
    pub fn text(value: impl Into<String>) -> Self {
        PropertyValue::Literal(serde_json::Value::String(value.into()))
    }

    /// Reference to `target.attribute`.
    pub fn reference(target: impl Into<String>, attribute: impl Into<String>) -> Self {
        PropertyValue::Reference(Reference::new(target, attribute))
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::text(value)
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Literal(serde_json::Value::from(value))
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Literal(serde_json::Value::Bool(value))
    }
}

/// A declared resource: identity, type tag and properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDefinition {
    /// Stable key, unique within a deployment
    pub identity: String,
    /// Type tag
    pub kind: ResourceKind,
    /// Property name to declared value
    pub properties: BTreeMap<String, PropertyValue>,
}

impl ResourceDefinition {
    pub fn new(identity: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            identity: identity.into(),
            kind,
            properties: BTreeMap::new(),
        }
    }

    /// Builder-style property setter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Builder-style reference setter.
    pub fn with_ref(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        self.properties
            .insert(name.into(), PropertyValue::reference(target, attribute));
        self
    }
}

/// The operation the reconciler decided for a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verb {
    /// No prior state: create
    Create,
    /// Spec changed: update in place
    Update,
    /// Spec changed in a way the backend cannot apply in place: create a new one, then delete the old
    Replace,
    /// Remove from the backend
    Delete,
    /// Spec unchanged: reuse cached outputs
    NoOp,
}

impl Verb {
    /// Whether this verb calls a mutating backend operation.
    pub fn is_change(&self) -> bool {
        !matches!(self, Verb::NoOp)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Update => "update",
            Verb::Replace => "replace",
            Verb::Delete => "delete",
            Verb::NoOp => "no-op",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-resource execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Pending,
    InProgress,
    Done,
    Failed,
    /// Never dispatched (upstream failure, fail-fast or cancellation)
    Skipped,
}

/// Whole-run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    Running,
    Completed,
    PartiallyFailed,
    Cancelled,
    RolledBack,
}

impl RunStatus {
    /// Whether `resume` can continue a run that ended in this state.
    pub fn is_resumable(&self) -> bool {
        matches!(self, RunStatus::PartiallyFailed | RunStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::NotStarted => "not started",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::PartiallyFailed => "partially failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::RolledBack => "rolled back",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of invoking the backend for one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceOperationResult {
    pub identity: String,
    pub kind: ResourceKind,
    pub verb: Verb,
    pub status: ResourceStatus,
    /// Resolved outputs (empty unless `Done`)
    #[serde(default)]
    pub outputs: Outputs,
    /// Error detail for `Failed`, reason for `Skipped`
    #[serde(default)]
    pub error: Option<String>,
}

impl ResourceOperationResult {
    pub fn done(identity: &str, kind: ResourceKind, verb: Verb, outputs: Outputs) -> Self {
        Self {
            identity: identity.to_string(),
            kind,
            verb,
            status: ResourceStatus::Done,
            outputs,
            error: None,
        }
    }

    pub fn failed(identity: &str, kind: ResourceKind, verb: Verb, error: String) -> Self {
        Self {
            identity: identity.to_string(),
            kind,
            verb,
            status: ResourceStatus::Failed,
            outputs: Outputs::new(),
            error: Some(error),
        }
    }

    pub fn skipped(identity: &str, kind: ResourceKind, verb: Verb, reason: String) -> Self {
        Self {
            identity: identity.to_string(),
            kind,
            verb,
            status: ResourceStatus::Skipped,
            outputs: Outputs::new(),
            error: Some(reason),
        }
    }

    /// Check if the result represents success (no failure)
    pub fn is_success(&self) -> bool {
        self.status == ResourceStatus::Done
    }
}

/// Summary of execution results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteSummary {
    pub created: usize,
    pub updated: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub no_change: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ExecuteSummary {
    /// Total number of actual changes made
    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.replaced + self.deleted
    }

    /// Check if execution was fully successful (no failures)
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    /// Total number of resources processed
    pub fn total(&self) -> usize {
        self.total_changes() + self.no_change + self.failed + self.skipped
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ResourceOperationResult) {
        match result.status {
            ResourceStatus::Failed => self.failed += 1,
            ResourceStatus::Skipped | ResourceStatus::Pending | ResourceStatus::InProgress => {
                self.skipped += 1;
            }
            ResourceStatus::Done => match result.verb {
                Verb::Create => self.created += 1,
                Verb::Update => self.updated += 1,
                Verb::Replace => self.replaced += 1,
                Verb::Delete => self.deleted += 1,
                Verb::NoOp => self.no_change += 1,
            },
        }
    }
}

/// Retry policy for transient backend errors.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, first one included
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Retries with no waiting, for tests and simulations.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            backoff_factor: 1.0,
            max_delay: Duration::ZERO,
        }
    }
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Maximum concurrent dispatches within a batch
    pub jobs: usize,
    /// Stop dispatching later batches after the first failure
    pub fail_fast: bool,
    /// Ask the backend whether recorded resources still exist before skipping them
    pub refresh: bool,
    /// Retry policy for transient backend errors
    pub retry: RetryConfig,
    /// Interval between readiness polls
    pub poll_interval: Duration,
    /// Upper bound on one resource's readiness wait
    pub resource_timeout: Duration,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            jobs: 4,
            fail_fast: false,
            refresh: false,
            retry: RetryConfig::default(),
            poll_interval: Duration::from_secs(2),
            resource_timeout: Duration::from_secs(15 * 60),
        }
    }
}

/// Which engine entry point produced a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOperation {
    Apply,
    Resume,
    Rollback,
    Destroy,
}

impl RunOperation {
    /// Rollback and destroy only delete; they are re-run, never resumed.
    pub fn is_teardown(&self) -> bool {
        matches!(self, RunOperation::Rollback | RunOperation::Destroy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunOperation::Apply => "apply",
            RunOperation::Resume => "resume",
            RunOperation::Rollback => "rollback",
            RunOperation::Destroy => "destroy",
        }
    }
}

impl fmt::Display for RunOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything a finished run reports back.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    /// What the run did
    pub operation: RunOperation,
    pub status: RunStatus,
    /// Results in batch order
    pub results: Vec<ResourceOperationResult>,
}

impl RunReport {
    pub fn summary(&self) -> ExecuteSummary {
        let mut summary = ExecuteSummary::default();
        for result in &self.results {
            summary.add_result(result);
        }
        summary
    }

    pub fn result(&self, identity: &str) -> Option<&ResourceOperationResult> {
        self.results.iter().find(|r| r.identity == identity)
    }

    /// Completed, rolled back, or declined before anything was dispatched
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            RunStatus::Completed | RunStatus::RolledBack | RunStatus::NotStarted
        )
    }

    /// Process exit code: 0 success, 2 partial failure or cancellation.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 2 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_tag() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
        }
        assert!("bucket".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_delay_for_attempt() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(5));
    }

    #[test]
    fn test_summary_counts_by_verb() {
        let mut summary = ExecuteSummary::default();
        summary.add_result(&ResourceOperationResult::done(
            "A",
            ResourceKind::Role,
            Verb::Create,
            Outputs::new(),
        ));
        summary.add_result(&ResourceOperationResult::done(
            "B",
            ResourceKind::Role,
            Verb::NoOp,
            Outputs::new(),
        ));
        summary.add_result(&ResourceOperationResult::failed(
            "C",
            ResourceKind::Role,
            Verb::Update,
            "boom".into(),
        ));
        assert_eq!(summary.created, 1);
        assert_eq!(summary.no_change, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_changes(), 1);
        assert!(!summary.is_success());
    }
}
