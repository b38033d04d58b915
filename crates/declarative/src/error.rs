//! Error types for graph construction, synthesis and provisioning.
//!
//! Errors are categorized so the executor can decide between retrying,
//! isolating a failure to one resource, or aborting the whole run, and so
//! the CLI can map them onto process exit codes.

use std::path::PathBuf;
use thiserror::Error;

/// Categories of errors for retry and exit-code logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Build-time problem with the declared resources (never retried)
    Validation,
    /// Backend hiccup worth retrying (network, throttling, timeout)
    Transient,
    /// Backend rejected the request as invalid
    Permanent,
    /// Persisted state cannot be trusted
    State,
    /// Internal invariant violation
    Internal,
    /// Local I/O or serialization failure
    Io,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Whether errors of this category are detected before any backend call.
    pub fn is_build_time(&self) -> bool {
        matches!(self, Self::Validation)
    }

    /// Process exit code for a run aborted by an error of this category.
    ///
    /// 1 validation (and untrusted state), 2 runtime failure, 3 internal.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation | Self::State => 1,
            Self::Transient | Self::Permanent | Self::Io => 2,
            Self::Internal => 3,
        }
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Validation => "Invalid resource declarations",
            Self::Transient => "Transient backend failure",
            Self::Permanent => "Backend rejected the request",
            Self::State => "Deployment state is corrupt",
            Self::Internal => "Internal invariant violation",
            Self::Io => "Local I/O failure",
        }
    }
}

/// Errors produced by the engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The dependency graph contains a cycle (a self-reference is a cycle of one)
    #[error("dependency cycle detected: {}", format_cycle(.cycle))]
    CycleDetected {
        /// Member identities in encounter order
        cycle: Vec<String>,
    },

    /// A property references an identity that is not registered
    #[error("unresolved reference: '{referenced_by}' references missing resource '{missing}'")]
    UnresolvedReference {
        /// The identity that does not exist
        missing: String,
        /// The resource holding the reference
        referenced_by: String,
    },

    /// A reference names an output attribute the target kind does not expose
    #[error(
        "unknown attribute: '{referenced_by}' references '{target}.{attribute}', but {kind} exposes [{}]",
        .available.join(", ")
    )]
    UnknownAttribute {
        /// Resource holding the reference
        referenced_by: String,
        /// Referenced identity
        target: String,
        /// Referenced attribute
        attribute: String,
        /// Type tag of the referenced resource
        kind: String,
        /// Attributes that kind does expose
        available: Vec<String>,
    },

    /// Two definitions share an identity
    #[error("duplicate resource identity: '{identity}'")]
    DuplicateIdentity {
        /// The repeated identity
        identity: String,
    },

    /// An identity contains characters outside `[A-Za-z0-9_-]`
    #[error("invalid resource identity: '{identity}'")]
    InvalidIdentity {
        /// The rejected identity
        identity: String,
    },

    /// A `${...}` expression that is not `Identity.attribute`
    #[error("invalid reference '{expression}' in '{referenced_by}'")]
    InvalidReference {
        /// The raw expression between the braces
        expression: String,
        /// Resource holding the expression
        referenced_by: String,
    },

    /// No provider is registered for a declared resource kind
    #[error("no provider registered for resource kind '{kind}'")]
    MissingProvider {
        /// Type tag without an implementation
        kind: String,
    },

    /// A targeted destroy would strand resources that depend on the target
    #[error("cannot destroy '{identity}': still required by {}", .dependents.join(", "))]
    DependentsRemain {
        /// Resource requested for deletion
        identity: String,
        /// Recorded dependents that are not part of the request
        dependents: Vec<String>,
    },

    /// Transient backend error (network, throttling)
    #[error("backend transient error: {message}")]
    BackendTransient {
        /// Detail reported by the backend
        message: String,
    },

    /// Backend rejected the request as invalid
    #[error("backend permanent error: {message}")]
    BackendPermanent {
        /// Detail reported by the backend
        message: String,
    },

    /// A resource did not become ready within its timeout
    #[error("timed out after {seconds}s waiting for '{identity}' to become ready")]
    Timeout {
        /// Resource being waited on
        identity: String,
        /// Elapsed seconds before giving up
        seconds: u64,
    },

    /// Layering could not place every node (should be unreachable after validation)
    #[error("synthesis stalled: {} resources could not be batched: {}", .remaining.len(), .remaining.join(", "))]
    SynthesisStalled {
        /// Identities left unbatched
        remaining: Vec<String>,
    },

    /// Persisted state failed to parse or its checksum does not match
    #[error("state corruption in {}: {message}", .path.display())]
    StateCorruption {
        /// State file location
        path: PathBuf,
        /// What was wrong
        message: String,
    },

    /// `resume` was requested but the last run does not need resuming
    #[error("nothing to resume: {reason}")]
    NothingToResume {
        /// Why there is nothing to do
        reason: String,
    },

    /// Worker pool for a batch could not be started
    #[error("failed to create thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Get the error category for retry and exit-code logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::CycleDetected { .. }
            | Error::UnresolvedReference { .. }
            | Error::UnknownAttribute { .. }
            | Error::DuplicateIdentity { .. }
            | Error::InvalidIdentity { .. }
            | Error::InvalidReference { .. }
            | Error::MissingProvider { .. }
            | Error::DependentsRemain { .. }
            | Error::NothingToResume { .. } => ErrorCategory::Validation,
            Error::BackendTransient { .. } => ErrorCategory::Transient,
            Error::BackendPermanent { .. } | Error::Timeout { .. } => ErrorCategory::Permanent,
            Error::SynthesisStalled { .. } | Error::ThreadPool(_) => ErrorCategory::Internal,
            Error::StateCorruption { .. } => ErrorCategory::State,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Process exit code for a run aborted by this error.
    pub fn exit_code(&self) -> i32 {
        self.category().exit_code()
    }

    /// Shorthand for a transient backend error.
    pub fn transient(message: impl Into<String>) -> Self {
        Error::BackendTransient {
            message: message.into(),
        }
    }

    /// Shorthand for a permanent backend error.
    pub fn permanent(message: impl Into<String>) -> Self {
        Error::BackendPermanent {
            message: message.into(),
        }
    }
}

fn format_cycle(cycle: &[String]) -> String {
    match cycle.first() {
        Some(first) => format!("{} -> {}", cycle.join(" -> "), first),
        None => String::new(),
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Transient.is_retryable());
        assert!(!ErrorCategory::Permanent.is_retryable());
        assert!(!ErrorCategory::Validation.is_retryable());
    }

    #[test]
    fn test_exit_codes() {
        let cycle = Error::CycleDetected {
            cycle: vec!["A".into()],
        };
        assert_eq!(cycle.exit_code(), 1);
        assert_eq!(Error::permanent("bad").exit_code(), 2);
        let stalled = Error::SynthesisStalled {
            remaining: vec!["A".into()],
        };
        assert_eq!(stalled.exit_code(), 3);
    }

    #[test]
    fn test_cycle_message_closes_loop() {
        let err = Error::CycleDetected {
            cycle: vec!["A".into(), "B".into()],
        };
        assert_eq!(err.to_string(), "dependency cycle detected: A -> B -> A");
    }

    #[test]
    fn test_timeout_is_not_retried() {
        let err = Error::Timeout {
            identity: "Cert".into(),
            seconds: 5,
        };
        assert!(!err.is_retryable());
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }
}
