//! # Core Traits (Ports)
//!
//! Implemented by the store and remote plugins the binary wires in.

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::watch;

use crate::models::Setting;
use crate::transfer;

/// Local persistence contract for the settings document and the access credential.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Returns the stored document. Missing or corrupt data yields `None`.
    async fn load(&self) -> Option<Setting>;

    /// Replaces the whole stored document and notifies subscribers.
    async fn save(&self, setting: &Setting) -> anyhow::Result<()>;

    /// Watches the latest saved document.
    fn subscribe(&self) -> watch::Receiver<Option<Setting>>;

    // Credential entry, kept under its own key
    async fn load_access_token(&self) -> Option<SecretString>;
    async fn save_access_token(&self, token: Option<SecretString>) -> anyhow::Result<()>;
}

/// A document as returned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDocument {
    /// JSON-encoded `Setting`.
    pub content: String,
    pub description: Option<String>,
    pub file_name: String,
}

impl RemoteDocument {
    /// Parses the carried settings; `None` when the content is not a valid document.
    pub fn settings(&self) -> Option<Setting> {
        transfer::parse_document(&self.content)
    }
}

/// Full-content write of a remote document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpdate {
    pub description: Option<String>,
    pub file_name: String,
    pub content: String,
}

/// Remote document contract (a gist addressed by an opaque id).
///
/// Without a bearer credential every call is a no-op: `fetch` and `create`
/// return `None`, `update` returns `false`.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RemoteDocumentClient: Send + Sync {
    /// True when a credential is configured.
    fn is_enabled(&self) -> bool;

    /// Swaps the bearer credential at runtime. Clients without one ignore it.
    fn set_access_token(&self, _token: Option<SecretString>) {}

    async fn fetch(&self, document_id: &str) -> anyhow::Result<Option<RemoteDocument>>;

    /// Overwrites the document. Returns `false` when disabled.
    async fn update(&self, document_id: &str, update: &DocumentUpdate) -> anyhow::Result<bool>;

    /// Creates a new private document and returns its id.
    async fn create(&self, document: &DocumentUpdate) -> anyhow::Result<Option<String>>;
}

/// Remote client used when no remote plugin is compiled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineRemote;

#[async_trait]
impl RemoteDocumentClient for OfflineRemote {
    fn is_enabled(&self) -> bool {
        false
    }

    async fn fetch(&self, _document_id: &str) -> anyhow::Result<Option<RemoteDocument>> {
        Ok(None)
    }

    async fn update(&self, _document_id: &str, _update: &DocumentUpdate) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn create(&self, _document: &DocumentUpdate) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}
