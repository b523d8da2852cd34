//! Lifecycle Coordinator
//!
//! Cancellation plumbing and a join barrier so shutdown is deterministic:
//! background work is spawned through a [`Lifecycle`], observes its
//! [`CancelToken`], and is joined by [`Lifecycle::shutdown`].

pub use crate::domain::value_objects::CancelToken;

use parking_lot::Mutex;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Scope owning a cancellation token and the tasks spawned under it.
pub struct Lifecycle {
    token: CancelToken,
    tasks: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
    // held for the whole join so a concurrent shutdown waits on the first
    joining: tokio::sync::Mutex<()>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            token: CancelToken::new(),
            tasks: Mutex::new(Vec::new()),
            joining: tokio::sync::Mutex::new(()),
        }
    }

    /// Token observed by every task in this scope.
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Spawn a task tracked by this scope.
    ///
    /// The task is expected to watch [`Lifecycle::token`] and return once it
    /// is cancelled. It runs inside the caller's current span.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task.instrument(tracing::Span::current()));
        tracing::debug!("spawned background task {}", name);
        self.tasks.lock().push((name, handle));
    }

    /// Number of tasks spawned and not yet joined.
    pub fn pending_tasks(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Signal cancellation without waiting.
    pub fn cancel(&self) {
        if self.token.cancel() {
            tracing::debug!("lifecycle cancelled");
        }
    }

    /// Cancel and wait for every tracked task to exit.
    ///
    /// Each handle is joined once. Concurrent callers wait until the first
    /// one has joined everything; later calls find nothing to join and
    /// return immediately.
    pub async fn shutdown(&self) {
        self.cancel();

        let _joining = self.joining.lock().await;
        loop {
            let next = self.tasks.lock().pop();
            let Some((name, handle)) = next else {
                break;
            };
            if let Err(e) = handle.await {
                tracing::warn!("background task {} did not exit cleanly: {}", name, e);
            }
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for Ctrl+C or SIGTERM and cancel `token`.
///
/// Meant for the outermost boundary (the binary); library code takes a
/// [`CancelToken`] instead of listening for signals itself.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn shutdown_signal(token: CancelToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating shutdown");
        }
        _ = token.cancelled() => {}
    }

    token.cancel();
}
