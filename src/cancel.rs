//! Cooperative cancellation with a typed cause
//!
//! A [`CancelScope`] is handed to every operation that may suspend on
//! network I/O. Cancelling a scope aborts whatever is in flight under it
//! and every child scope, and records why, so callers can tell a closed
//! reader from a deadline or an explicit abort.

use crate::error::{RangeError, Result};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a scope was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The reader owning the scope was closed
    ReaderClosed,
    /// The scope's deadline passed
    DeadlineExceeded,
    /// Cancelled explicitly by the caller
    Aborted,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelReason::ReaderClosed => write!(f, "reader was closed"),
            CancelReason::DeadlineExceeded => write!(f, "deadline exceeded"),
            CancelReason::Aborted => write!(f, "aborted"),
        }
    }
}

struct ScopeState {
    reason: Mutex<Option<CancelReason>>,
    deadline: Option<Instant>,
    parent: Option<CancelScope>,
}

/// Cancellation scope, cheap to clone; clones share state
#[derive(Clone)]
pub struct CancelScope {
    token: CancellationToken,
    state: Arc<ScopeState>,
}

impl CancelScope {
    /// Create a root scope that is only cancelled explicitly
    pub fn new() -> Self {
        Self::root(None)
    }

    /// Create a root scope that expires at `deadline`
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::root(Some(deadline))
    }

    fn root(deadline: Option<Instant>) -> Self {
        CancelScope {
            token: CancellationToken::new(),
            state: Arc::new(ScopeState {
                reason: Mutex::new(None),
                deadline,
                parent: None,
            }),
        }
    }

    /// Create a scope cancelled whenever this one is, which can also be
    /// cancelled on its own without affecting this one.
    pub fn child(&self) -> Self {
        CancelScope {
            token: self.token.child_token(),
            state: Arc::new(ScopeState {
                reason: Mutex::new(None),
                deadline: self.deadline(),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Cancel the scope with the given cause. The first cause wins.
    pub fn cancel(&self, reason: CancelReason) {
        if let Ok(mut slot) = self.state.reason.lock() {
            slot.get_or_insert(reason);
        }
        self.token.cancel();
    }

    /// Cancellation cause, if the scope has been cancelled or has expired
    pub fn reason(&self) -> Option<CancelReason> {
        if let Some(reason) = self.state.reason.lock().ok().and_then(|slot| *slot) {
            return Some(reason);
        }
        if self.token.is_cancelled() {
            return Some(
                self.state
                    .parent
                    .as_ref()
                    .and_then(|parent| parent.reason())
                    .unwrap_or(CancelReason::Aborted),
            );
        }
        match self.state.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.state.deadline
    }

    /// Fail immediately if the scope is no longer live
    pub fn check(&self) -> Result<()> {
        match self.reason() {
            Some(reason) => Err(RangeError::Cancelled(reason)),
            None => Ok(()),
        }
    }

    /// Drive `fut` to completion unless the scope is cancelled or its
    /// deadline passes first.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        let deadline = async {
            match self.state.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(RangeError::Cancelled(
                self.reason().unwrap_or(CancelReason::Aborted),
            )),
            _ = deadline => Err(RangeError::Cancelled(CancelReason::DeadlineExceeded)),
            result = fut => result,
        }
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelScope")
            .field("reason", &self.reason())
            .field("deadline", &self.state.deadline)
            .finish()
    }
}
