//! # ct-store-local
//! candi-tab/crates/ct-plugins/ct-store-local/src/lib.rs
//! Local filesystem implementation of `SettingsStore`.
//! Features: one JSON file per key, atomic whole-document replacement.

use async_trait::async_trait;
use ct_core::models::Setting;
use ct_core::traits::SettingsStore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Key of the settings document.
pub const SETTINGS_KEY: &str = "settings";
/// Key of the access credential, independent of the document.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

pub struct FileSettingsStore {
    /// Root directory for all keys (e.g., "./data")
    root_path: PathBuf,
    changes: watch::Sender<Option<Setting>>,
}

#[derive(Serialize, Deserialize)]
struct StoredToken {
    token: String,
}

impl FileSettingsStore {
    /// Opens the store, creating the directory if needed, and primes the
    /// change channel with whatever document is already there.
    pub async fn open(root: PathBuf) -> anyhow::Result<Self> {
        fs::create_dir_all(&root).await?;
        let (changes, _) = watch::channel(None);
        let store = Self {
            root_path: root,
            changes,
        };
        let existing = store.load().await;
        store.changes.send_replace(existing);
        Ok(store)
    }

    /// Generates the file path of a key: "<root>/<key>.json"
    fn key_path(&self, key: &str) -> PathBuf {
        self.root_path.join(format!("{key}.json"))
    }

    async fn read_key<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        let path = self.key_path(key);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unreadable store entry");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "corrupt store entry, treating as absent");
                None
            }
        }
    }

    /// Writes next to the target, then renames over it, so readers never see
    /// a half-written document.
    async fn write_key(&self, key: &str, contents: &[u8]) -> anyhow::Result<()> {
        let target = self.key_path(key);
        let staging = staging_path(&target);
        fs::write(&staging, contents).await?;
        fs::rename(&staging, &target).await?;
        debug!(path = %target.display(), bytes = contents.len(), "store entry written");
        Ok(())
    }
}

fn staging_path(target: &Path) -> PathBuf {
    let mut staging = target.as_os_str().to_owned();
    staging.push(".tmp");
    PathBuf::from(staging)
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Option<Setting> {
        self.read_key(SETTINGS_KEY).await
    }

    async fn save(&self, setting: &Setting) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec(setting)?;
        self.write_key(SETTINGS_KEY, &bytes).await?;
        self.changes.send_replace(Some(setting.clone()));
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<Setting>> {
        self.changes.subscribe()
    }

    async fn load_access_token(&self) -> Option<SecretString> {
        self.read_key::<StoredToken>(ACCESS_TOKEN_KEY)
            .await
            .filter(|stored| !stored.token.is_empty())
            .map(|stored| SecretString::from(stored.token))
    }

    async fn save_access_token(&self, token: Option<SecretString>) -> anyhow::Result<()> {
        match token {
            Some(token) => {
                let stored = StoredToken {
                    token: token.expose_secret().to_string(),
                };
                self.write_key(ACCESS_TOKEN_KEY, &serde_json::to_vec(&stored)?)
                    .await
            }
            None => match fs::remove_file(self.key_path(ACCESS_TOKEN_KEY)).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(err) => Err(err.into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ct_core::models::{Block, Layout};

    fn sample(created_at: i64) -> Setting {
        Setting {
            created_at,
            links: vec![Block::new("b1".into(), "Home", Layout::default())],
            ..Setting::default()
        }
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::open(dir.path().to_path_buf()).await.unwrap();
        assert!(store.load().await.is_none());

        store.save(&sample(1)).await.unwrap();
        store.save(&sample(2)).await.unwrap();
        assert_eq!(store.load().await, Some(sample(2)));
        assert!(!dir.path().join("settings.json.tmp").exists());

        let reopened = FileSettingsStore::open(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(*reopened.subscribe().borrow(), Some(sample(2)));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("settings.json"), b"{\"links\": [oops").unwrap();

        let store = FileSettingsStore::open(dir.path().to_path_buf()).await.unwrap();
        assert!(store.load().await.is_none());
    }

    #[tokio::test]
    async fn test_save_notifies_subscribers() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::open(dir.path().to_path_buf()).await.unwrap();
        let mut rx = store.subscribe();

        store.save(&sample(5)).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().as_ref().map(|s| s.created_at), Some(5));
    }

    #[tokio::test]
    async fn test_token_is_independent_of_settings() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::open(dir.path().to_path_buf()).await.unwrap();

        store
            .save_access_token(Some(SecretString::from("ghp_example".to_string())))
            .await
            .unwrap();
        assert!(store.load().await.is_none());
        let token = store.load_access_token().await.unwrap();
        assert_eq!(token.expose_secret(), "ghp_example");

        store.save(&sample(1)).await.unwrap();
        store.save_access_token(None).await.unwrap();
        assert!(store.load_access_token().await.is_none());
        assert_eq!(store.load().await, Some(sample(1)));
        // clearing twice is fine
        store.save_access_token(None).await.unwrap();
    }
}
