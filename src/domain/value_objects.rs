//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared. [`CancelToken`] is the one
//! shared-state handle here; ports take it to learn when to stop.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Failover predicate applied by the proxy when none is configured.
///
/// Retries idempotent requests on a network error or a 503, up to two attempts.
pub const DEFAULT_FAILOVER_PREDICATE: &str =
    "(IsNetworkError() || ResponseCode() == 503) && Attempts() <= 2";

/// Handle for a TTL-bound grant issued by the coordination store.
///
/// Keys written under a lease disappear when the lease expires or is revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeaseId(i64);

impl LeaseId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl From<i64> for LeaseId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for LeaseId {
    // etcdctl prints lease IDs in hex, keep logs comparable
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

/// Failover policy attached to a frontend.
///
/// Serialized under the `Settings` key of the frontend document. The predicate
/// is emitted verbatim: `&&` and `<`/`>` must reach the proxy unescaped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendOptions {
    #[serde(rename = "FailoverPredicate")]
    pub failover_predicate: String,
}

impl FrontendOptions {
    pub fn new(failover_predicate: impl Into<String>) -> Self {
        Self {
            failover_predicate: failover_predicate.into(),
        }
    }
}

impl Default for FrontendOptions {
    fn default() -> Self {
        Self::new(DEFAULT_FAILOVER_PREDICATE)
    }
}

impl fmt::Display for FrontendOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrontendOptions(FailoverPredicate={})", self.failover_predicate)
    }
}

/// Cloneable cancellation signal.
///
/// Cancellation is sticky: tasks that start waiting after [`cancel`] was
/// called observe it immediately.
///
/// [`cancel`]: CancelToken::cancel
#[derive(Clone)]
pub struct CancelToken {
    state: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    /// Cancel the token. Returns `true` only for the call that flipped it.
    pub fn cancel(&self) -> bool {
        self.state.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        })
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Wait until the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        // the sender lives in `self`, so wait_for cannot observe a closed channel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
