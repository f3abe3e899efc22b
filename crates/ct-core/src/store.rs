//! In-process `SettingsStore`, used by tests and by builds without a
//! persistent store plugin.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::watch;

use crate::models::Setting;
use crate::traits::SettingsStore;

pub struct MemorySettingsStore {
    setting: Mutex<Option<Setting>>,
    access_token: Mutex<Option<SecretString>>,
    changes: watch::Sender<Option<Setting>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::with_setting(None)
    }

    /// Starts with an already persisted document.
    pub fn with_setting(setting: Option<Setting>) -> Self {
        let (changes, _) = watch::channel(setting.clone());
        Self {
            setting: Mutex::new(setting),
            access_token: Mutex::new(None),
            changes,
        }
    }

    /// Synchronous peek at the stored document.
    pub fn snapshot(&self) -> Option<Setting> {
        self.setting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for MemorySettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self) -> Option<Setting> {
        self.snapshot()
    }

    async fn save(&self, setting: &Setting) -> anyhow::Result<()> {
        *self.setting.lock().unwrap_or_else(PoisonError::into_inner) = Some(setting.clone());
        self.changes.send_replace(Some(setting.clone()));
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Setting>> {
        self.changes.subscribe()
    }

    async fn load_access_token(&self) -> Option<SecretString> {
        self.access_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn save_access_token(&self, token: Option<SecretString>) -> anyhow::Result<()> {
        *self.access_token.lock().unwrap_or_else(PoisonError::into_inner) = token;
        Ok(())
    }
}
