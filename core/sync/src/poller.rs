//! Self-rescheduling remote change polling.

use std::sync::{Arc, RwLock as StdRwLock};
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use prefsync_common::Result;
use prefsync_drive::AppDataApi;

use crate::listener::SyncListener;
use crate::state::FolderState;

/// Interval until the next check after a successful poll.
const OK_INTERVAL: Duration = Duration::from_secs(60);
/// Interval until the next check after a failed poll.
const ERROR_INTERVAL: Duration = Duration::from_secs(300);

/// Poll timing configuration.
///
/// The back-off is a fixed two-tier value, not exponential; there is no
/// retry cap. Polling runs until cancelled.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub ok_interval: Duration,
    pub error_interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            ok_interval: OK_INTERVAL,
            error_interval: ERROR_INTERVAL,
        }
    }
}

/// Poll loop position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    /// Not started, or stopped.
    Idle,
    /// Waiting for the next check.
    Scheduled,
    /// A check is in flight.
    Running,
}

/// Spawns and owns the change-polling loop.
pub struct Poller;

impl Poller {
    /// Spawn the poll loop on the current runtime.
    ///
    /// The first check runs immediately; each subsequent check is
    /// scheduled only after the previous one settles, so checks never
    /// overlap.
    pub fn spawn(
        api: Arc<dyn AppDataApi>,
        state: Arc<RwLock<FolderState>>,
        listener: Arc<dyn SyncListener>,
        config: PollerConfig,
    ) -> PollerHandle {
        let cancel = CancellationToken::new();
        let poll_state = Arc::new(StdRwLock::new(PollState::Scheduled));

        let task = tokio::spawn({
            let cancel = cancel.clone();
            let poll_state = poll_state.clone();
            async move {
                info!("Change poller started");

                loop {
                    *poll_state.write().unwrap() = PollState::Running;

                    let delay = match Self::tick(api.as_ref(), &state, listener.as_ref()).await {
                        Ok(changed) => {
                            debug!("Change check completed, changes detected: {}", changed);
                            config.ok_interval
                        }
                        Err(e) => {
                            warn!("Change check failed: {}", e);
                            config.error_interval
                        }
                    };

                    *poll_state.write().unwrap() = PollState::Scheduled;

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }

                *poll_state.write().unwrap() = PollState::Idle;
                info!("Change poller stopped");
            }
        });

        PollerHandle {
            cancel,
            state: poll_state,
            task,
        }
    }

    /// One change check: resolve the cursor, fetch changes, store the
    /// next cursor, and notify the listener when a re-sync is needed.
    ///
    /// The listener fires for a non-empty change list, and also while
    /// the file map has never been listed (the very first check after
    /// startup), so the orchestrator performs an initial full sync.
    async fn tick(
        api: &dyn AppDataApi,
        state: &RwLock<FolderState>,
        listener: &dyn SyncListener,
    ) -> Result<bool> {
        let existing_cursor = state.read().await.change_cursor.clone();
        let cursor = match existing_cursor {
            Some(cursor) => cursor,
            None => {
                let token = api.get_start_page_token().await?;
                state.write().await.change_cursor = Some(token.clone());
                token
            }
        };

        let changes = api.list_changes(&cursor).await?;

        let mut guard = state.write().await;
        if let Some(next) = changes.next_cursor() {
            guard.change_cursor = Some(next.to_string());
        }
        let never_listed = guard.is_unlisted();
        drop(guard);

        let sync_required = never_listed || !changes.changes.is_empty();
        if sync_required {
            listener.sync_required();
        }

        Ok(sync_required)
    }
}

/// Handle to a spawned poll loop.
pub struct PollerHandle {
    cancel: CancellationToken,
    state: Arc<StdRwLock<PollState>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop scheduling further checks. An in-flight check is not
    /// aborted; it settles and the loop then exits.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Current loop position.
    pub fn state(&self) -> PollState {
        *self.state.read().unwrap()
    }

    /// True once the loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
