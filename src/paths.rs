//! Centralized path resolution for apistack
//!
//! # Environment Variables
//!
//! - `APISTACK_STACK` - Stack file to load (default `./stack.toml`)
//! - `APISTACK_STATE_DIR` - Override state directory
//! - `APISTACK_CLOUD_DIR` - Override where the simulated cloud account lives
//!
//! # Path Resolution Priority
//!
//! For state_dir():
//! 1. `APISTACK_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/apistack` (if set)
//! 3. Platform default:
//!    - Windows: `%LOCALAPPDATA%\apistack`
//!    - macOS/Linux: `~/.local/state/apistack`
//!
//! For cloud_dir():
//! 1. `APISTACK_CLOUD_DIR` environment variable
//! 2. state_dir()

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for the stack file
pub const ENV_STACK: &str = "APISTACK_STACK";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "APISTACK_STATE_DIR";

/// Environment variable for the simulated cloud directory override
pub const ENV_CLOUD_DIR: &str = "APISTACK_CLOUD_DIR";

/// Default stack file name, relative to the working directory
pub const DEFAULT_STACK_FILE: &str = "stack.toml";

const APP: &str = "apistack";

/// Get the apistack state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join(APP);
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            let path = local_app_data.join(APP);
            log::debug!("Using Windows state dir: {}", path.display());
            return Ok(path);
        }
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join(APP);
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Directory holding the simulated cloud account
pub fn cloud_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CLOUD_DIR) {
        let path = expand(&dir);
        log::debug!("Using cloud dir from {}: {}", ENV_CLOUD_DIR, path.display());
        return Ok(path);
    }
    state_dir()
}

/// State file for a named stack: `<state_dir>/<name>.state.json`
pub fn state_file(stack_name: &str) -> Result<PathBuf> {
    Ok(state_dir()?.join(format!("{stack_name}.state.json")))
}

/// The simulated cloud account file
pub fn cloud_file() -> Result<PathBuf> {
    Ok(cloud_dir()?.join("cloud.json"))
}

/// Expand ~ and environment variables in a path string.
///
/// # Examples
///
/// ```ignore
/// let stack = paths::expand("~/infra/stack.toml");
/// let state = paths::expand("$XDG_STATE_HOME/apistack");
/// ```
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

// ============================================================================
// Tests
// ============================================================================
