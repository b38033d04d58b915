//! Run context: progress, confirmation and cancellation
//!
//! These traits let the engine be driven from a terminal, a test or a
//! service without depending on any particular UI crate.

use crate::error::Result;
use crate::types::ResourceOperationResult;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during a run.
pub trait ProgressCallback: Send {
    /// Called when a batch starts
    fn on_batch_start(&mut self, index: usize, total_batches: usize, resources: &[String]);

    /// Called when a resource is dispatched to the backend
    fn on_resource_start(&mut self, identity: &str, description: &str);

    /// Called when a resource reaches a terminal status
    fn on_resource_complete(&mut self, result: &ResourceOperationResult);

    /// Called when a batch completes
    fn on_batch_complete(&mut self, index: usize);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback: Send {
    /// Ask the user to confirm an action
    ///
    /// # Returns
    /// `true` if the user confirmed, `false` otherwise
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _index: usize, _total: usize, _resources: &[String]) {}
    fn on_resource_start(&mut self, _identity: &str, _description: &str) {}
    fn on_resource_complete(&mut self, _result: &ResourceOperationResult) {}
    fn on_batch_complete(&mut self, _index: usize) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

/// Cooperative cancellation signal shared between the caller and a run.
///
/// In-flight operations are allowed to finish; nothing new is dispatched
/// once the token is cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let handle = token.clone();
        assert!(!token.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_auto_callbacks() {
        assert!(AutoConfirm.confirm("go?").unwrap());
        assert!(!AutoDecline.confirm("go?").unwrap());
    }
}
