//! # Sync Orchestrator
//!
//! Turns a burst of `SyncSignal`s into one upload. The first signal opens the
//! debounce window, every further signal restarts it, and when it elapses
//! quietly one upload runs with the local document as of that moment.
//!
//! Uploads are fire-and-forget. Their results are published as `SyncNotice`s
//! for the dashboard to show as transient messages; a slow upload never holds
//! back the next burst.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::reconcile::{PullOutcome, Reconciler, SkipReason, SyncSignal, UploadOutcome};
use crate::traits::RemoteDocumentClient;

/// How many notices the board remembers for late readers.
const RECENT_NOTICES: usize = 20;

/// Outcome of one background upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncNotice {
    Uploaded { created_at: i64 },
    Skipped {
        #[serde(flatten)]
        reason: SkipReason,
    },
    Failed { message: String },
}

/// Fan-out of sync notices: live subscribers plus a short history.
pub struct NoticeBoard {
    tx: broadcast::Sender<SyncNotice>,
    recent: Mutex<VecDeque<SyncNotice>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            tx,
            recent: Mutex::new(VecDeque::with_capacity(RECENT_NOTICES)),
        }
    }

    pub fn publish(&self, notice: SyncNotice) {
        match &notice {
            SyncNotice::Uploaded { created_at } => info!(created_at, "settings uploaded"),
            SyncNotice::Skipped { reason } => debug!(?reason, "upload skipped"),
            SyncNotice::Failed { message } => warn!(%message, "upload failed"),
        }

        {
            let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
            if recent.len() == RECENT_NOTICES {
                recent.pop_front();
            }
            recent.push_back(notice.clone());
        }

        // no live subscribers is fine
        let _ = self.tx.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.tx.subscribe()
    }

    /// Most recent notices, oldest first.
    pub fn recent(&self) -> Vec<SyncNotice> {
        self.recent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SyncOrchestrator {
    reconciler: Arc<Reconciler>,
    remote: Arc<dyn RemoteDocumentClient>,
    debounce: Duration,
    notices: Arc<NoticeBoard>,
}

/// Handle to a running orchestrator task.
pub struct SyncHandle {
    notices: Arc<NoticeBoard>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    pub fn notices(&self) -> Arc<NoticeBoard> {
        Arc::clone(&self.notices)
    }

    pub fn abort(&self) {
        self.task.abort();
    }
}

impl SyncOrchestrator {
    pub fn new(
        reconciler: Arc<Reconciler>,
        remote: Arc<dyn RemoteDocumentClient>,
        debounce: Duration,
    ) -> Self {
        Self {
            reconciler,
            remote,
            debounce,
            notices: Arc::new(NoticeBoard::new()),
        }
    }

    /// Registers as the reconciler's sync listener and starts the loop.
    pub fn spawn(self) -> SyncHandle {
        let requests = self.reconciler.sync_requests();
        let notices = Arc::clone(&self.notices);
        let task = tokio::spawn(self.run(requests));
        SyncHandle { notices, task }
    }

    async fn run(self, mut requests: mpsc::UnboundedReceiver<SyncSignal>) {
        while requests.recv().await.is_some() {
            let closed = self.settle(&mut requests).await;
            self.fire();
            if closed {
                break;
            }
        }
        debug!("sync orchestrator stopped");
    }

    /// Waits until no signal arrives for a full window. Returns true if the
    /// channel closed meanwhile.
    async fn settle(&self, requests: &mut mpsc::UnboundedReceiver<SyncSignal>) -> bool {
        let mut coalesced = 1usize;
        loop {
            match tokio::time::timeout(self.debounce, requests.recv()).await {
                Ok(Some(SyncSignal)) => coalesced += 1,
                Ok(None) => return true,
                Err(_) => {
                    debug!(coalesced, "debounce window elapsed");
                    return false;
                }
            }
        }
    }

    fn fire(&self) {
        let reconciler = Arc::clone(&self.reconciler);
        let remote = Arc::clone(&self.remote);
        let notices = Arc::clone(&self.notices);

        tokio::spawn(async move {
            let notice = match reconciler.upload(remote.as_ref()).await {
                Ok(UploadOutcome::Uploaded { created_at }) => SyncNotice::Uploaded { created_at },
                Ok(UploadOutcome::Skipped(reason)) => SyncNotice::Skipped { reason },
                Err(err) => SyncNotice::Failed {
                    message: err.to_string(),
                },
            };
            notices.publish(notice);
        });
    }
}

/// Startup pull, off the request path. Failures only get logged; the
/// dashboard keeps working on the local document.
pub fn spawn_initial_pull(
    reconciler: Arc<Reconciler>,
    remote: Arc<dyn RemoteDocumentClient>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match reconciler.pull(remote.as_ref()).await {
            Ok(PullOutcome::RemoteAdopted(setting)) => {
                info!(created_at = setting.created_at, "startup pull adopted remote settings")
            }
            Ok(outcome) => debug!(?outcome, "startup pull finished"),
            Err(err) => warn!(error = %err, "startup pull failed"),
        }
    })
}
