//! Command implementations
//!
//! Each command returns the process exit code on success; errors are mapped
//! to exit codes in `main`.

pub mod apply;
pub mod graph;
pub mod init;
pub mod outputs;
pub mod plan;
pub mod teardown;

use anyhow::{Context as _, Result};
use declarative::{ConfirmCallback, FileStateStore, ProviderRegistry, Registry, RunReport};
use std::path::Path;
use std::sync::Arc;

use crate::Context;
use crate::cloud::CloudAccount;
use crate::paths;
use crate::resource;
use crate::schema::StackFile;

/// Everything a command needs to talk to the engine.
pub struct Session {
    pub stack: StackFile,
    pub store: FileStateStore,
    pub cloud: Arc<CloudAccount>,
    pub providers: ProviderRegistry,
}

impl Session {
    /// Load the stack file and open its state and the cloud account.
    pub fn open(ctx: &Context, force_state: bool) -> Result<Self> {
        let stack = StackFile::load(&ctx.stack)?;
        let state_file = paths::state_file(stack.name())?;
        let cloud_file = paths::cloud_file()?;
        Self::from_parts(stack, &state_file, &cloud_file, force_state)
    }

    pub fn from_parts(
        stack: StackFile,
        state_file: &Path,
        cloud_file: &Path,
        force_state: bool,
    ) -> Result<Self> {
        log::debug!("State file: {}", state_file.display());
        let cloud = Arc::new(
            CloudAccount::open(cloud_file)
                .with_context(|| format!("Failed to open cloud account {}", cloud_file.display()))?,
        );
        if let Some(path) = cloud.path() {
            log::debug!("Cloud account: {}", path.display());
        }
        let providers = resource::providers(&cloud);
        Ok(Self {
            stack,
            store: FileStateStore::new(state_file).force(force_state),
            cloud,
            providers,
        })
    }

    /// The declared resources, validated.
    pub fn registry(&self) -> Result<Registry> {
        Ok(self.stack.registry()?)
    }
}

/// What to run next after a run that stopped short.
///
/// Apply and resume continue with `resume`; rollback and destroy are
/// simply run again.
pub fn retry_hint(report: &RunReport) -> Option<String> {
    if !report.status.is_resumable() {
        return None;
    }
    let command = if report.operation.is_teardown() {
        report.operation.as_str()
    } else {
        "resume"
    };
    Some(format!(
        "Run `apistack {command}` to continue from where this run stopped"
    ))
}

/// Confirmation through a terminal prompt, or unconditional with `--yes`.
pub struct Prompt {
    yes: bool,
    default: bool,
}

impl Prompt {
    /// Prompt defaulting to yes, for converging operations.
    pub fn proceed(yes: bool) -> Self {
        Self { yes, default: true }
    }

    /// Prompt defaulting to no, for destructive operations.
    pub fn destructive(yes: bool) -> Self {
        Self {
            yes,
            default: false,
        }
    }
}

impl ConfirmCallback for Prompt {
    fn confirm(&mut self, prompt: &str) -> declarative::Result<bool> {
        if self.yes {
            return Ok(true);
        }
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(self.default)
            .interact()
            .map_err(|e| declarative::Error::Io(std::io::Error::other(e.to_string())))
    }
}
