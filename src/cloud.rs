//! File-backed simulated cloud account
//!
//! Stands in for the certificate, IAM, function, API gateway and DNS
//! services. Every resource the bundled providers create is recorded in a
//! JSON ledger (`cloud.json`) so that separate CLI invocations see the same
//! account. The ledger can also carry injected faults, keyed by declared
//! identity, which is how failure, retry and resume are exercised by hand:
//!
//! ```json
//! "faults": {
//!   "Function1": { "transient": { "remaining": 2 } },
//!   "ApiRecord": { "permanent": { "message": "quota exceeded" } }
//! }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use declarative::{Description, Outputs, Properties, Provisioned, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tempfile::NamedTempFile;

const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_ACCOUNT_ID: &str = "123456789012";
const DEFAULT_VALIDATION_DELAY_SECS: u64 = 3;

/// One resource the account knows about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudResource {
    pub kind: ResourceKind,
    /// Declared identity it was created for
    pub name: String,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub outputs: Outputs,
    pub created_at: DateTime<Utc>,
    /// When asynchronous work (DNS validation) finishes
    pub ready_at: DateTime<Utc>,
}

/// Failure injected for every mutating call on an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fault {
    /// Reject the request
    Permanent { message: String },
    /// Throttle the next `remaining` requests
    Transient { remaining: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Ledger {
    #[serde(default = "default_region")]
    region: String,
    #[serde(default = "default_account_id")]
    account_id: String,
    /// Seconds a new certificate stays pending validation
    #[serde(default = "default_validation_delay")]
    validation_delay_secs: u64,
    #[serde(default)]
    next_serial: u64,
    /// identifier -> resource
    #[serde(default)]
    resources: BTreeMap<String, CloudResource>,
    /// identity -> fault
    #[serde(default)]
    faults: BTreeMap<String, Fault>,
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_account_id() -> String {
    DEFAULT_ACCOUNT_ID.to_string()
}

fn default_validation_delay() -> u64 {
    DEFAULT_VALIDATION_DELAY_SECS
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            region: default_region(),
            account_id: default_account_id(),
            validation_delay_secs: DEFAULT_VALIDATION_DELAY_SECS,
            next_serial: 0,
            resources: BTreeMap::new(),
            faults: BTreeMap::new(),
        }
    }
}

impl Ledger {
    /// Apply the injected fault for `identity`, if any.
    fn inject(&mut self, identity: &str) -> declarative::Result<()> {
        match self.faults.get_mut(identity) {
            Some(Fault::Permanent { message }) => {
                Err(declarative::Error::permanent(format!("{identity}: {message}")))
            }
            Some(Fault::Transient { remaining }) if *remaining > 0 => {
                *remaining -= 1;
                Err(declarative::Error::transient(format!(
                    "{identity}: rate exceeded"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// What a provider hands the account when creating a resource.
#[derive(Debug, Clone)]
pub struct NewResource {
    pub identifier: String,
    pub outputs: Outputs,
    /// Time until the resource reports ready
    pub settle: Duration,
}

/// A simulated account, optionally persisted to a file.
#[derive(Debug)]
pub struct CloudAccount {
    path: Option<PathBuf>,
    ledger: Mutex<Ledger>,
}

impl CloudAccount {
    /// Open (or start) the account stored at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let ledger = if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read cloud account {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse cloud account {}", path.display()))?
        } else {
            log::debug!("Starting new cloud account at {}", path.display());
            Ledger::default()
        };
        Ok(Self {
            path: Some(path),
            ledger: Mutex::new(ledger),
        })
    }

    /// An account that lives only as long as the value.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Builder-style override of the certificate validation delay.
    #[cfg(test)]
    pub fn with_validation_delay(self, delay: Duration) -> Self {
        self.lock().validation_delay_secs = delay.as_secs();
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        match self.ledger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn region(&self) -> String {
        self.lock().region.clone()
    }

    pub fn account_id(&self) -> String {
        self.lock().account_id.clone()
    }

    pub fn validation_delay(&self) -> Duration {
        Duration::from_secs(self.lock().validation_delay_secs)
    }

    /// A fresh lowercase token, unique within the account.
    pub fn token(&self, kind: ResourceKind, len: usize) -> String {
        let mut ledger = self.lock();
        ledger.next_serial += 1;
        let seed = format!("{}/{kind}/{}", ledger.account_id, ledger.next_serial);
        let hex = blake3::hash(seed.as_bytes()).to_hex();
        hex[..len.min(hex.len())].to_string()
    }

    /// Inject a fault for every mutating call on `identity`.
    #[cfg(test)]
    pub fn inject(&self, identity: &str, fault: Fault) -> declarative::Result<()> {
        let mut ledger = self.lock();
        ledger.faults.insert(identity.to_string(), fault);
        self.persist(&ledger)
    }

    /// Drop every injected fault.
    #[cfg(test)]
    pub fn clear_faults(&self) -> declarative::Result<()> {
        let mut ledger = self.lock();
        ledger.faults.clear();
        self.persist(&ledger)
    }

    /// Record a new resource.
    pub fn insert(
        &self,
        kind: ResourceKind,
        identity: &str,
        properties: &Properties,
        resource: NewResource,
    ) -> declarative::Result<Provisioned> {
        let mut ledger = self.lock();
        let outcome = ledger.inject(identity);
        if let Err(e) = outcome {
            self.persist(&ledger)?;
            return Err(e);
        }

        let now = Utc::now();
        let settle = chrono::Duration::from_std(resource.settle).unwrap_or_default();
        ledger.resources.insert(
            resource.identifier.clone(),
            CloudResource {
                kind,
                name: identity.to_string(),
                properties: properties.clone(),
                outputs: resource.outputs.clone(),
                created_at: now,
                ready_at: now + settle,
            },
        );
        self.persist(&ledger)?;
        log::debug!("cloud: created {kind} {}", resource.identifier);
        Ok(Provisioned {
            identifier: resource.identifier,
            outputs: resource.outputs,
        })
    }

    /// Update a resource in place; `outputs` maps the current outputs to the new ones.
    pub fn update<F>(
        &self,
        identifier: &str,
        properties: &Properties,
        outputs: F,
    ) -> declarative::Result<Outputs>
    where
        F: FnOnce(&Outputs) -> Outputs,
    {
        let mut ledger = self.lock();
        let Some(name) = ledger.resources.get(identifier).map(|r| r.name.clone()) else {
            return Err(declarative::Error::permanent(format!(
                "{identifier} does not exist"
            )));
        };
        if let Err(e) = ledger.inject(&name) {
            self.persist(&ledger)?;
            return Err(e);
        }

        let updated = match ledger.resources.get_mut(identifier) {
            Some(resource) => {
                resource.properties = properties.clone();
                resource.outputs = outputs(&resource.outputs);
                resource.outputs.clone()
            }
            None => Outputs::new(),
        };
        self.persist(&ledger)?;
        log::debug!("cloud: updated {identifier}");
        Ok(updated)
    }

    /// Delete a resource. Unknown identifiers succeed.
    pub fn delete(&self, identifier: &str) -> declarative::Result<()> {
        let mut ledger = self.lock();
        let Some(name) = ledger.resources.get(identifier).map(|r| r.name.clone()) else {
            return Ok(());
        };
        if let Err(e) = ledger.inject(&name) {
            self.persist(&ledger)?;
            return Err(e);
        }
        ledger.resources.remove(identifier);
        self.persist(&ledger)?;
        log::debug!("cloud: deleted {identifier}");
        Ok(())
    }

    pub fn describe(&self, identifier: &str) -> declarative::Result<Description> {
        let ledger = self.lock();
        Ok(match ledger.resources.get(identifier) {
            Some(resource) if resource.ready_at <= Utc::now() => {
                Description::ready(resource.outputs.clone())
            }
            Some(resource) => Description::pending(resource.outputs.clone()),
            None => Description::absent(),
        })
    }

    /// Look a resource up by identifier.
    pub fn get(&self, identifier: &str) -> Option<CloudResource> {
        self.lock().resources.get(identifier).cloned()
    }

    /// Find a resource of `kind` whose output `attribute` equals `value`.
    pub fn find(&self, kind: ResourceKind, attribute: &str, value: &str) -> Option<CloudResource> {
        self.lock()
            .resources
            .values()
            .find(|r| r.kind == kind && r.outputs.get(attribute).is_some_and(|v| v == value))
            .cloned()
    }

    /// How many resources of `kind` were created with `property` set to `value`.
    pub fn count_where(&self, kind: ResourceKind, property: &str, value: &str) -> usize {
        self.lock()
            .resources
            .values()
            .filter(|r| {
                r.kind == kind
                    && r.properties
                        .get(property)
                        .and_then(serde_json::Value::as_str)
                        .is_some_and(|v| v == value)
            })
            .count()
    }

    /// Identifiers currently recorded, with their kinds.
    pub fn inventory(&self) -> Vec<(String, ResourceKind)> {
        self.lock()
            .resources
            .iter()
            .map(|(identifier, r)| (identifier.clone(), r.kind))
            .collect()
    }

    fn persist(&self, ledger: &Ledger) -> declarative::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let content = serde_json::to_string_pretty(ledger)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_resource(identifier: &str) -> NewResource {
        NewResource {
            identifier: identifier.to_string(),
            outputs: Outputs::from([("arn".to_string(), format!("arn:{identifier}"))]),
            settle: Duration::ZERO,
        }
    }

    #[test]
    fn test_insert_describe_delete() {
        let cloud = CloudAccount::in_memory();
        let props = Properties::new();
        cloud
            .insert(ResourceKind::Role, "Role", &props, new_resource("role-1"))
            .unwrap();

        let description = cloud.describe("role-1").unwrap();
        assert!(description.exists && description.ready);
        assert_eq!(description.outputs["arn"], "arn:role-1");

        cloud.delete("role-1").unwrap();
        assert!(!cloud.describe("role-1").unwrap().exists);
        // deleting again is fine
        cloud.delete("role-1").unwrap();
    }

    #[test]
    fn test_settling_resource_is_pending() {
        let cloud = CloudAccount::in_memory();
        let mut resource = new_resource("cert-1");
        resource.settle = Duration::from_secs(3600);
        cloud
            .insert(ResourceKind::Certificate, "Cert", &Properties::new(), resource)
            .unwrap();
        let description = cloud.describe("cert-1").unwrap();
        assert!(description.exists);
        assert!(!description.ready);
    }

    #[test]
    fn test_tokens_are_unique() {
        let cloud = CloudAccount::in_memory();
        let a = cloud.token(ResourceKind::GatewayApi, 10);
        let b = cloud.token(ResourceKind::GatewayApi, 10);
        assert_eq!(a.len(), 10);
        assert_ne!(a, b);
    }

    #[test]
    fn test_transient_fault_counts_down() {
        let cloud = CloudAccount::in_memory();
        cloud
            .inject("Role", Fault::Transient { remaining: 1 })
            .unwrap();
        let props = Properties::new();

        let err = cloud
            .insert(ResourceKind::Role, "Role", &props, new_resource("role-1"))
            .unwrap_err();
        assert!(err.is_retryable());
        cloud
            .insert(ResourceKind::Role, "Role", &props, new_resource("role-1"))
            .unwrap();
    }

    #[test]
    fn test_permanent_fault_rejects_delete() {
        let cloud = CloudAccount::in_memory();
        cloud
            .insert(ResourceKind::Role, "Role", &Properties::new(), new_resource("role-1"))
            .unwrap();
        cloud
            .inject(
                "Role",
                Fault::Permanent {
                    message: "access denied".to_string(),
                },
            )
            .unwrap();
        let err = cloud.delete("role-1").unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_find_by_output() {
        let cloud = CloudAccount::in_memory();
        cloud
            .insert(ResourceKind::Role, "Role", &Properties::new(), new_resource("role-1"))
            .unwrap();
        assert!(cloud.find(ResourceKind::Role, "arn", "arn:role-1").is_some());
        assert!(cloud.find(ResourceKind::Function, "arn", "arn:role-1").is_none());
    }

    #[test]
    fn test_ledger_survives_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cloud.json");
        {
            let cloud = CloudAccount::open(&path).unwrap();
            cloud
                .insert(ResourceKind::Role, "Role", &Properties::new(), new_resource("role-1"))
                .unwrap();
        }
        let cloud = CloudAccount::open(&path).unwrap();
        assert_eq!(cloud.get("role-1").unwrap().name, "Role");
        assert_eq!(cloud.region(), DEFAULT_REGION);
    }
}
