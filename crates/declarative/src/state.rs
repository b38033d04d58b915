//! Persisted deployment state
//!
//! The state maps each resource identity to what the backend last confirmed
//! for it. It is loaded at the start of every run and written after every
//! successful resource operation. Files carry a blake3 checksum of their
//! body and are replaced atomically (write temp file, then rename).

use crate::error::{Error, Result};
use crate::types::{
    Outputs, Properties, Reference, ResourceKind, ResourceStatus, RunOperation, RunStatus, Verb,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::NamedTempFile;

/// Current on-disk format version
pub const STATE_VERSION: u32 = 1;

// ============================================================================
// State Structures
// ============================================================================

/// What the backend last confirmed for one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub kind: ResourceKind,
    /// Hash of kind + resolved properties at last successful apply
    pub spec_hash: String,
    /// Backend-assigned identifier
    pub identifier: String,
    /// Resolved properties at last successful apply
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub outputs: Outputs,
    /// Identities this resource referenced, for teardown ordering
    #[serde(default)]
    pub depends_on: Vec<String>,
    pub last_applied: DateTime<Utc>,
}

/// Per-resource line of a run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub status: ResourceStatus,
    pub verb: Verb,
    #[serde(default)]
    pub error: Option<String>,
}

/// The last apply, resume or teardown, kept so a run can be resumed or
/// rolled back after the process exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub operation: RunOperation,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    #[serde(default)]
    pub resources: BTreeMap<String, RunEntry>,
}

impl RunRecord {
    pub fn new(run_id: impl Into<String>, operation: RunOperation) -> Self {
        Self {
            run_id: run_id.into(),
            operation,
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running,
            resources: BTreeMap::new(),
        }
    }

    /// Identities that finished `Done` in this run
    pub fn done(&self) -> impl Iterator<Item = &str> {
        self.resources
            .iter()
            .filter(|(_, e)| e.status == ResourceStatus::Done)
            .map(|(id, _)| id.as_str())
    }
}

/// Persisted mapping from identity to confirmed backend state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentState {
    pub version: u32,
    #[serde(default)]
    pub resources: BTreeMap<String, StateEntry>,
    #[serde(default)]
    pub last_run: Option<RunRecord>,
    pub last_updated: DateTime<Utc>,
}

impl Default for DeploymentState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            resources: BTreeMap::new(),
            last_run: None,
            last_updated: Utc::now(),
        }
    }
}

impl DeploymentState {
    pub fn get(&self, identity: &str) -> Option<&StateEntry> {
        self.resources.get(identity)
    }

    pub fn upsert(&mut self, identity: &str, entry: StateEntry) {
        self.resources.insert(identity.to_string(), entry);
        self.last_updated = Utc::now();
    }

    /// Explicit removal, only used after a confirmed delete.
    pub fn remove(&mut self, identity: &str) -> Option<StateEntry> {
        let removed = self.resources.remove(identity);
        self.last_updated = Utc::now();
        removed
    }

    /// Output recorded for a reference, if any
    pub fn output(&self, reference: &Reference) -> Option<String> {
        self.resources
            .get(&reference.target)
            .and_then(|e| e.outputs.get(&reference.attribute))
            .cloned()
    }

    /// Recorded identities not present in `declared`
    pub fn orphans<'a, I>(&self, declared: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let declared: std::collections::BTreeSet<&str> = declared.into_iter().collect();
        self.resources
            .keys()
            .filter(|id| !declared.contains(id.as_str()))
            .cloned()
            .collect()
    }

    /// Recorded identities that depend on `identity`
    pub fn dependents_of(&self, identity: &str) -> Vec<String> {
        self.resources
            .iter()
            .filter(|(_, e)| e.depends_on.iter().any(|d| d == identity))
            .map(|(id, _)| id.clone())
            .collect()
    }
}

// ============================================================================
// Stores
// ============================================================================

/// Where deployment state lives.
pub trait StateStore: Send + Sync {
    /// Load the state, or an empty one if none exists yet.
    fn load(&self) -> Result<DeploymentState>;

    /// Persist the state, replacing the previous version atomically.
    fn save(&self, state: &DeploymentState) -> Result<()>;

    /// Human-readable location, for messages
    fn location(&self) -> String;
}

#[derive(Serialize, Deserialize)]
struct StateFile {
    checksum: String,
    state: DeploymentState,
}

/// Compute the checksum of a state body.
pub fn checksum(state: &DeploymentState) -> Result<String> {
    let body = serde_json::to_vec(state)?;
    Ok(blake3::hash(&body).to_hex().to_string())
}

/// JSON file store with checksum verification.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
    force: bool,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            force: false,
        }
    }

    /// Accept a checksum mismatch, and set an unparsable file aside instead
    /// of refusing to proceed.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn corruption(&self, message: impl Into<String>) -> Error {
        Error::StateCorruption {
            path: self.path.clone(),
            message: message.into(),
        }
    }

    fn set_aside(&self) -> Result<PathBuf> {
        let aside = self.path.with_extension(format!(
            "corrupt-{}.json",
            Utc::now().format("%Y%m%d%H%M%S")
        ));
        fs::rename(&self.path, &aside)?;
        Ok(aside)
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<DeploymentState> {
        if !self.path.exists() {
            log::debug!("State file does not exist, using empty state");
            return Ok(DeploymentState::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let file: StateFile = match serde_json::from_str(&content) {
            Ok(file) => file,
            Err(e) if self.force => {
                let aside = self.set_aside()?;
                log::warn!(
                    "State file unparsable ({e}); moved to {} and starting empty",
                    aside.display()
                );
                return Ok(DeploymentState::default());
            }
            Err(e) => return Err(self.corruption(format!("failed to parse: {e}"))),
        };

        if file.state.version > STATE_VERSION {
            return Err(self.corruption(format!(
                "state version {} is newer than supported version {STATE_VERSION}",
                file.state.version
            )));
        }

        let actual = checksum(&file.state)?;
        if actual != file.checksum {
            if self.force {
                log::warn!(
                    "State checksum mismatch in {} ignored (forced)",
                    self.path.display()
                );
            } else {
                return Err(self.corruption(format!(
                    "checksum mismatch (recorded {}, computed {actual})",
                    file.checksum
                )));
            }
        }

        log::debug!(
            "Loaded state from {} ({} resources)",
            self.path.display(),
            file.state.resources.len()
        );
        Ok(file.state)
    }

    fn save(&self, state: &DeploymentState) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let file = StateFile {
            checksum: checksum(state)?,
            state: state.clone(),
        };
        let content = serde_json::to_vec_pretty(&file)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        log::debug!("Saved state to {}", self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory store for isolated runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<DeploymentState>,
    saves: AtomicUsize,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing state.
    pub fn with_state(state: DeploymentState) -> Self {
        Self {
            state: Mutex::new(state),
            saves: AtomicUsize::new(0),
        }
    }

    /// Snapshot of the last saved state
    pub fn snapshot(&self) -> DeploymentState {
        match self.state.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// How many times `save` was called
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<DeploymentState> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &DeploymentState) -> Result<()> {
        match self.state.lock() {
            Ok(mut guard) => *guard = state.clone(),
            Err(poisoned) => *poisoned.into_inner() = state.clone(),
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: ResourceKind, depends_on: &[&str]) -> StateEntry {
        StateEntry {
            kind,
            spec_hash: "abc".into(),
            identifier: "id-1".into(),
            properties: Properties::new(),
            outputs: Outputs::from([("arn".to_string(), "arn:cert".to_string())]),
            depends_on: depends_on.iter().map(ToString::to_string).collect(),
            last_applied: Utc::now(),
        }
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state.json"));
        let state = store.load().unwrap();
        assert!(state.resources.is_empty());
        assert_eq!(state.version, STATE_VERSION);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("nested").join("state.json"));
        let mut state = DeploymentState::default();
        state.upsert("Cert", entry(ResourceKind::Certificate, &[]));
        store.save(&state).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(
            loaded.output(&Reference::new("Cert", "arn")),
            Some("arn:cert".to_string())
        );
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state.json"));
        store.save(&DeploymentState::default()).unwrap();
        store.save(&DeploymentState::default()).unwrap();
        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_checksum_mismatch_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = FileStateStore::new(&path);
        let mut state = DeploymentState::default();
        state.upsert("Cert", entry(ResourceKind::Certificate, &[]));
        store.save(&state).unwrap();

        let tampered = fs::read_to_string(&path)
            .unwrap()
            .replace("arn:cert", "arn:other");
        fs::write(&path, tampered).unwrap();

        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::StateCorruption { .. }));

        let forced = FileStateStore::new(&path).force(true).load().unwrap();
        assert_eq!(
            forced.output(&Reference::new("Cert", "arn")),
            Some("arn:other".to_string())
        );
    }

    #[test]
    fn test_unparsable_file_is_corruption_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let err = FileStateStore::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::StateCorruption { .. }));
        assert_eq!(err.exit_code(), 1);

        let state = FileStateStore::new(&path).force(true).load().unwrap();
        assert!(state.resources.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_orphans_and_dependents() {
        let mut state = DeploymentState::default();
        state.upsert("Cert", entry(ResourceKind::Certificate, &[]));
        state.upsert("Domain", entry(ResourceKind::DomainName, &["Cert"]));
        assert_eq!(state.orphans(["Cert"]), vec!["Domain"]);
        assert_eq!(state.dependents_of("Cert"), vec!["Domain"]);
    }

    #[test]
    fn test_memory_store_counts_saves() {
        let store = MemoryStateStore::new();
        let mut state = store.load().unwrap();
        state.upsert("Role", entry(ResourceKind::Role, &[]));
        store.save(&state).unwrap();
        assert_eq!(store.save_count(), 1);
        assert!(store.snapshot().get("Role").is_some());
    }
}
