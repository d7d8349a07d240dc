//! Integer completion tokens over [`dispatch`](crate::dispatch()).
//!
//! The token interface takes raw thread-count and mode integers and never
//! fails at dispatch time: a rejected dispatch yields
//! [`CompletionToken::FAILED`], and joining that token errors immediately.
//! The bundle of a rejected dispatch is dropped.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use elemjit_core::{ArgumentBundle, CoreError, PartitionMode};
use parking_lot::Mutex;

use crate::config::DispatchConfig;
use crate::dispatch::{dispatch, DispatchHandle};
use crate::error::DispatchError;
use crate::kernel::CompiledKernel;

/// Handle to a pending dispatch, as a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompletionToken(i64);

impl CompletionToken {
    /// Returned when a dispatch could not be started.
    pub const FAILED: Self = Self(-1);

    /// Wrap a raw token value.
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw token value.
    pub const fn as_raw(&self) -> i64 {
        self.0
    }

    /// Whether this is the failure sentinel.
    pub const fn is_failed(&self) -> bool {
        self.0 == Self::FAILED.0
    }
}

impl fmt::Display for CompletionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry of pending dispatches keyed by token.
#[derive(Debug)]
pub struct Dispatcher {
    config: DispatchConfig,
    pending: Mutex<HashMap<i64, DispatchHandle>>,
    next_token: AtomicI64,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(DispatchConfig::default())
    }
}

impl Dispatcher {
    /// Create a dispatcher.
    pub fn new(config: DispatchConfig) -> Self {
        Self {
            config,
            pending: Mutex::new(HashMap::new()),
            next_token: AtomicI64::new(1),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Start a dispatch from raw flags.
    ///
    /// `mode` is `1` (interleaved) or `2` (chunked). Returns
    /// [`CompletionToken::FAILED`] if anything is rejected.
    pub fn dispatch(
        &self,
        kernel: &CompiledKernel,
        bundle: ArgumentBundle,
        start: i32,
        end: i32,
        thread_count: i64,
        mode: i64,
    ) -> CompletionToken {
        let parsed = PartitionMode::from_raw(mode).and_then(|mode| {
            usize::try_from(thread_count)
                .map(|threads| (threads, mode))
                .map_err(|_| CoreError::InvalidThreadCount(thread_count))
        });

        let (threads, mode) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(kernel_id = kernel.id(), error = %e, "Dispatch rejected");
                return CompletionToken::FAILED;
            }
        };

        match dispatch(kernel, bundle, start, end, threads, mode, &self.config) {
            Ok(handle) => {
                let token = self.next_token.fetch_add(1, Ordering::Relaxed);
                self.pending.lock().insert(token, handle);
                CompletionToken(token)
            }
            Err(e) => {
                tracing::warn!(kernel_id = kernel.id(), error = %e, "Dispatch rejected");
                CompletionToken::FAILED
            }
        }
    }

    /// Wait for the dispatch behind `token` and take its bundle back.
    ///
    /// The failure sentinel, unknown tokens and tokens already joined
    /// return [`DispatchError::InvalidToken`] without blocking.
    pub fn join(&self, token: CompletionToken) -> Result<ArgumentBundle, DispatchError> {
        if token.is_failed() {
            return Err(DispatchError::InvalidToken(token.0));
        }

        let handle = self
            .pending
            .lock()
            .remove(&token.0)
            .ok_or(DispatchError::InvalidToken(token.0))?;

        handle.join()
    }

    /// Whether the dispatch behind `token` has finished. `None` for unknown tokens.
    pub fn is_finished(&self, token: CompletionToken) -> Option<bool> {
        self.pending.lock().get(&token.0).map(DispatchHandle::is_finished)
    }

    /// Number of dispatches not yet joined.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let pending: Vec<_> = self.pending.get_mut().drain().collect();
        if pending.is_empty() {
            return;
        }

        tracing::debug!(count = pending.len(), "Joining unclaimed dispatches");
        for (token, handle) in pending {
            if let Err(e) = handle.join() {
                tracing::warn!(token, error = %e, "Unclaimed dispatch failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_token() {
        assert!(CompletionToken::FAILED.is_failed());
        assert_eq!(CompletionToken::FAILED.as_raw(), -1);
        assert!(!CompletionToken::from_raw(1).is_failed());
        assert_eq!(CompletionToken::from_raw(42).to_string(), "42");
    }

    #[test]
    fn test_join_failed_token_does_not_block() {
        let dispatcher = Dispatcher::default();
        let err = dispatcher.join(CompletionToken::FAILED).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidToken(-1)));
    }

    #[test]
    fn test_join_unknown_token() {
        let dispatcher = Dispatcher::default();
        let err = dispatcher.join(CompletionToken::from_raw(99)).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidToken(99)));
        assert_eq!(dispatcher.is_finished(CompletionToken::from_raw(99)), None);
        assert_eq!(dispatcher.pending(), 0);
    }
}
