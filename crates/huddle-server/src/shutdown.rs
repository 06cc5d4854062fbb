//! Relay shutdown: stop accepting, close sessions, drain background tasks.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How long [`ShutdownCoordinator::drain`] waits when no timeout is given.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of draining background tasks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Tasks that finished before the deadline.
    pub completed: usize,
    /// Tasks still running at the deadline, now aborted.
    pub aborted: usize,
}

impl DrainReport {
    /// Every task finished on its own.
    pub fn is_clean(&self) -> bool {
        self.aborted == 0
    }
}

/// Owns the relay's root cancellation token.
///
/// The listener waits on [`token`](Self::token) and each session runs under a
/// [`session_token`](Self::session_token), so [`begin`](Self::begin) stops the
/// accept loop and closes every session at once.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    root: CancellationToken,
}

impl ShutdownCoordinator {
    /// Coordinator in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// The root token.
    pub fn token(&self) -> CancellationToken {
        self.root.clone()
    }

    /// Token for one session. Cancelling it closes only that session.
    pub fn session_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Start shutting down. Idempotent.
    pub fn begin(&self) {
        if !self.root.is_cancelled() {
            info!("relay shutdown started");
        }
        self.root.cancel();
    }

    /// Whether [`begin`](Self::begin) has been called; new upgrades are refused.
    pub fn is_draining(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Begin shutdown, then wait until `timeout` for `handles` to finish.
    /// Tasks still running at the deadline are aborted.
    pub async fn drain(
        &self,
        handles: Vec<JoinHandle<()>>,
        timeout: Option<Duration>,
    ) -> DrainReport {
        self.begin();
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);
        let deadline = tokio::time::Instant::now() + timeout;
        let mut report = DrainReport::default();

        for handle in handles {
            let abort = handle.abort_handle();
            if tokio::time::timeout_at(deadline, handle).await.is_ok() {
                report.completed += 1;
            } else {
                abort.abort();
                report.aborted += 1;
            }
        }

        if report.is_clean() {
            info!(completed = report.completed, "relay drained");
        } else {
            warn!(
                completed = report.completed,
                aborted = report.aborted,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "drain deadline passed, aborted remaining tasks"
            );
        }
        report
    }
}
