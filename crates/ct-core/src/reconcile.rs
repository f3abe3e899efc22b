//! # Settings Reconciler
//!
//! Owns the local settings document for the session and decides, by
//! `created_at`, whether a fetched remote document replaces it.
//!
//! ```text
//!  mutation ──► apply on copy ──► stamp created_at ──► store.save ──► SyncSignal
//!                                                                        │
//!  remote fetch ──► reconcile(L, R) ──► adopt R / keep L         upload (guarded)
//! ```
//!
//! Last write wins. The upload guard compares against the last remote
//! snapshot seen this session, which can be stale; two editors racing on the
//! same gist can still drop a write.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::error::{AppError, Result};
use crate::models::Setting;
use crate::mutation::Mutation;
use crate::traits::{DocumentUpdate, RemoteDocument, RemoteDocumentClient, SettingsStore};
use crate::transfer::{self, EXPORT_FILE_NAME};

/// Which side of a reconciliation is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    KeepLocal,
    AdoptRemote,
}

/// Remote wins only when strictly newer. Ties keep local.
pub fn reconcile(local: Option<&Setting>, remote: &Setting) -> Resolution {
    match local {
        Some(local) if local.created_at >= remote.created_at => Resolution::KeepLocal,
        _ => Resolution::AdoptRemote,
    }
}

/// Payload-less "please upload" signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSignal;

/// Why a pull or an upload did nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// First-run state, nothing to upload.
    NoSettings,
    /// The document has no gist id.
    NotLinked,
    /// No access token configured.
    NoCredential,
    /// The last remote snapshot is newer than the local document.
    RemoteNewer { remote: i64, local: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum PullOutcome {
    RemoteAdopted(Setting),
    LocalKept,
    /// The remote content is not a settings document.
    Unparseable,
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Uploaded { created_at: i64 },
    Skipped(SkipReason),
}

/// What we last learned about the remote document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub created_at: i64,
    pub file_name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    /// Layout changes inside this window after bootstrap, or after a page
    /// render restarts it, are ignored.
    pub startup_grace: Duration,
    /// File name used when no remote snapshot has been fetched yet.
    pub file_name: String,
    pub description: Option<String>,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            startup_grace: Duration::from_millis(1000),
            file_name: EXPORT_FILE_NAME.to_string(),
            description: Some("candi-tab settings".to_string()),
        }
    }
}

#[derive(Debug, Default)]
struct Session {
    local: Option<Setting>,
    remote: Option<RemoteSnapshot>,
}

pub struct Reconciler {
    store: Arc<dyn SettingsStore>,
    session: Mutex<Session>,
    sync_listener: StdMutex<Option<mpsc::UnboundedSender<SyncSignal>>>,
    grace_from: StdMutex<Instant>,
    options: ReconcilerOptions,
}

impl Reconciler {
    /// Loads the stored document and starts the session clock.
    pub async fn bootstrap(store: Arc<dyn SettingsStore>, options: ReconcilerOptions) -> Self {
        let local = store.load().await;
        match &local {
            Some(setting) => info!(
                created_at = setting.created_at,
                blocks = setting.links.len(),
                "local settings loaded"
            ),
            None => info!("no local settings yet"),
        }

        Self {
            store,
            session: Mutex::new(Session { local, remote: None }),
            sync_listener: StdMutex::new(None),
            grace_from: StdMutex::new(Instant::now()),
            options,
        }
    }

    /// The current local document, `None` before the first block exists.
    pub async fn current(&self) -> Option<Setting> {
        self.session.lock().await.local.clone()
    }

    pub async fn remote_snapshot(&self) -> Option<RemoteSnapshot> {
        self.session.lock().await.remote.clone()
    }

    /// Watches every document the store persists.
    pub fn subscribe(&self) -> watch::Receiver<Option<Setting>> {
        self.store.subscribe()
    }

    /// Registers the single sync listener. A previous listener stops receiving.
    pub fn sync_requests(&self) -> mpsc::UnboundedReceiver<SyncSignal> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self
            .sync_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    pub fn in_startup_grace(&self) -> bool {
        let since = *self.grace_from.lock().unwrap_or_else(PoisonError::into_inner);
        since.elapsed() < self.options.startup_grace
    }

    /// Opens a fresh grace window. Called on every dashboard render: the grid
    /// reports its normalized layout right after mounting.
    pub fn restart_startup_grace(&self) {
        *self.grace_from.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Applies a user edit, persists it and requests one upload.
    ///
    /// Returns `None` when nothing changed, or for layout changes inside the
    /// startup grace window.
    pub async fn mutate(&self, mutation: Mutation) -> Result<Option<Setting>> {
        if mutation.is_layout() && self.in_startup_grace() {
            debug!("ignoring layout normalization during startup");
            return Ok(None);
        }

        let mut session = self.session.lock().await;
        let base = session.local.clone().unwrap_or_default();
        let mut next = base.apply(mutation)?;
        if next == base {
            trace!("mutation left the document unchanged");
            return Ok(None);
        }

        next.created_at = next_stamp(base.created_at);
        self.persist(&mut session, next.clone()).await?;
        drop(session);

        self.request_sync();
        Ok(Some(next))
    }

    /// Replaces the document with an imported one.
    ///
    /// The existing gist id survives and `created_at` is restamped. Malformed
    /// JSON is ignored and yields `None`.
    pub async fn import_json(&self, raw: &str) -> Result<Option<Setting>> {
        let Some(imported) = transfer::parse_document(raw) else {
            return Ok(None);
        };

        let mut session = self.session.lock().await;
        let (gist_id, previous) = session
            .local
            .as_ref()
            .map_or((None, 0), |local| (local.gist_id.clone(), local.created_at));

        let mut next = Setting {
            gist_id,
            created_at: next_stamp(previous),
            ..imported
        };
        next.normalize_layout_ids();

        self.persist(&mut session, next.clone()).await?;
        drop(session);

        info!(blocks = next.links.len(), "settings imported");
        self.request_sync();
        Ok(Some(next))
    }

    /// Serialized current document, `None` in the first-run state.
    pub async fn export_json(&self) -> Result<Option<String>> {
        match self.current().await {
            Some(setting) => Ok(Some(transfer::export_document(&setting)?)),
            None => Ok(None),
        }
    }

    /// Points the document at a gist. Sync metadata only: `created_at` is
    /// kept and no upload is requested, so the next pull decides.
    pub async fn link_remote(&self, gist_id: Option<String>) -> Result<Setting> {
        let mut session = self.session.lock().await;
        let mut next = session.local.clone().unwrap_or_default();
        if next.gist_id == gist_id {
            return Ok(next);
        }

        next.gist_id = gist_id;
        session.remote = None;
        self.persist(&mut session, next.clone()).await?;
        info!(gist_id = ?next.gist_id, "remote link updated");
        Ok(next)
    }

    /// Creates a gist holding the current document when none is linked yet.
    pub async fn create_remote(&self, remote: &dyn RemoteDocumentClient) -> Result<Option<String>> {
        let local = self.current().await.unwrap_or_default();
        if let Some(existing) = local.gist_id.clone() {
            return Ok(Some(existing));
        }

        let document = DocumentUpdate {
            description: self.options.description.clone(),
            file_name: self.options.file_name.clone(),
            content: transfer::export_document(&local)?,
        };
        let created = remote
            .create(&document)
            .await
            .map_err(|err| AppError::Remote(err.to_string()))?;

        if let Some(id) = &created {
            self.link_remote(Some(id.clone())).await?;
            let mut session = self.session.lock().await;
            session.remote = Some(RemoteSnapshot {
                created_at: local.created_at,
                file_name: document.file_name,
                description: document.description,
            });
        }
        Ok(created)
    }

    /// Fetches the linked gist and reconciles it with the local document.
    pub async fn pull(&self, remote: &dyn RemoteDocumentClient) -> Result<PullOutcome> {
        let gist_id = self
            .session
            .lock()
            .await
            .local
            .as_ref()
            .and_then(|local| local.gist_id.clone());
        let Some(gist_id) = gist_id else {
            return Ok(PullOutcome::Skipped(SkipReason::NotLinked));
        };
        if !remote.is_enabled() {
            return Ok(PullOutcome::Skipped(SkipReason::NoCredential));
        }

        let fetched = remote
            .fetch(&gist_id)
            .await
            .map_err(|err| AppError::Remote(err.to_string()))?;
        match fetched {
            Some(document) => self.on_remote_fetched(document).await,
            None => Ok(PullOutcome::Skipped(SkipReason::NoCredential)),
        }
    }

    /// Reconciles a fetched remote document with the local one.
    pub async fn on_remote_fetched(&self, document: RemoteDocument) -> Result<PullOutcome> {
        let Some(mut remote) = document.settings() else {
            warn!(file_name = %document.file_name, "remote document is not a settings file");
            return Ok(PullOutcome::Unparseable);
        };

        let mut session = self.session.lock().await;
        session.remote = Some(RemoteSnapshot {
            created_at: remote.created_at,
            file_name: document.file_name,
            description: document.description,
        });

        match reconcile(session.local.as_ref(), &remote) {
            Resolution::KeepLocal => {
                debug!(remote = remote.created_at, "local settings are current");
                Ok(PullOutcome::LocalKept)
            }
            Resolution::AdoptRemote => {
                if remote.gist_id.is_none() {
                    remote.gist_id = session.local.as_ref().and_then(|local| local.gist_id.clone());
                }
                remote.normalize_layout_ids();
                self.persist(&mut session, remote.clone()).await?;
                info!(created_at = remote.created_at, "remote settings adopted");
                Ok(PullOutcome::RemoteAdopted(remote))
            }
        }
    }

    /// Pushes the local document unless the guard says the remote is newer.
    pub async fn upload(&self, remote: &dyn RemoteDocumentClient) -> Result<UploadOutcome> {
        let (local, snapshot) = {
            let session = self.session.lock().await;
            (session.local.clone(), session.remote.clone())
        };

        let Some(local) = local else {
            return Ok(UploadOutcome::Skipped(SkipReason::NoSettings));
        };
        let Some(gist_id) = local.gist_id.clone() else {
            return Ok(UploadOutcome::Skipped(SkipReason::NotLinked));
        };
        if let Some(snapshot) = &snapshot {
            if snapshot.created_at > local.created_at {
                return Ok(UploadOutcome::Skipped(SkipReason::RemoteNewer {
                    remote: snapshot.created_at,
                    local: local.created_at,
                }));
            }
        }
        if !remote.is_enabled() {
            return Ok(UploadOutcome::Skipped(SkipReason::NoCredential));
        }

        let update = DocumentUpdate {
            description: snapshot
                .as_ref()
                .map_or_else(|| self.options.description.clone(), |s| s.description.clone()),
            file_name: snapshot
                .as_ref()
                .map_or_else(|| self.options.file_name.clone(), |s| s.file_name.clone()),
            content: transfer::export_document(&local)?,
        };

        let written = remote
            .update(&gist_id, &update)
            .await
            .map_err(|err| AppError::Remote(err.to_string()))?;
        if !written {
            return Ok(UploadOutcome::Skipped(SkipReason::NoCredential));
        }

        let mut session = self.session.lock().await;
        let stale = session
            .remote
            .as_ref()
            .map_or(true, |known| known.created_at <= local.created_at);
        if stale {
            session.remote = Some(RemoteSnapshot {
                created_at: local.created_at,
                file_name: update.file_name,
                description: update.description,
            });
        }

        Ok(UploadOutcome::Uploaded {
            created_at: local.created_at,
        })
    }

    async fn persist(&self, session: &mut Session, next: Setting) -> Result<()> {
        self.store
            .save(&next)
            .await
            .map_err(|err| AppError::Storage(err.to_string()))?;
        session.local = Some(next);
        Ok(())
    }

    fn request_sync(&self) {
        let mut listener = self
            .sync_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match listener.as_ref() {
            Some(tx) if tx.send(SyncSignal).is_ok() => trace!("sync requested"),
            Some(_) => {
                debug!("sync listener gone");
                *listener = None;
            }
            None => trace!("no sync listener registered"),
        }
    }
}

/// Next `created_at`: wall clock, but always past the previous stamp.
fn next_stamp(previous: i64) -> i64 {
    Utc::now().timestamp_millis().max(previous.saturating_add(1))
}
