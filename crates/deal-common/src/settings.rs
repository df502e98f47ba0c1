/// Persistent provider selection and API keys.
///
/// Two backends share the `SettingsStore` contract:
/// - `FileSettingsStore`: one JSON document on disk
/// - `RedisSettingsStore`: flat keys `deal_finder:aiProvider` and
///   `deal_finder:apiKeys.<provider>`
///
/// `load` never fails; unreadable state loads as defaults with a warning.
/// `save` merges the update into the stored settings and returns the result.
/// Saves on one store are serialized, so concurrent updates never drop each
/// other's keys.
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::CommonError;
use crate::model::{ProviderKind, Settings, SettingsUpdate};
use crate::redis::RedisKv;

const KEY_PREFIX: &str = "deal_finder:";

#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn load(&self) -> Settings;

    async fn save(&self, update: SettingsUpdate) -> Result<Settings, CommonError>;
}

pub struct FileSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self) -> Settings {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no settings file, using defaults");
                return Settings::default();
            }
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "failed to read settings");
                return Settings::default();
            }
        };
        serde_json::from_str(&raw)
            .inspect_err(|e| {
                warn!(error = %e, path = %self.path.display(), "corrupt settings file, using defaults")
            })
            .unwrap_or_default()
    }

    async fn save(&self, update: SettingsUpdate) -> Result<Settings, CommonError> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.load().await;
        settings.apply(update);

        let json = serde_json::to_string_pretty(&settings)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&path, json.as_bytes()))
            .await
            .map_err(|e| CommonError::SettingsSave(e.to_string()))??;

        info!(
            path = %self.path.display(),
            provider = %settings.active_provider,
            "settings saved"
        );
        Ok(settings)
    }
}

/// Write through a uniquely named sibling temp file, then rename over `path`.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), CommonError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub struct RedisSettingsStore {
    redis: RedisKv,
    write_lock: Mutex<()>,
}

impl RedisSettingsStore {
    pub fn new(redis: RedisKv) -> Self {
        Self {
            redis,
            write_lock: Mutex::new(()),
        }
    }

    /// Read the stored settings, failing on any Redis error.
    async fn read(&self) -> Result<Settings, CommonError> {
        let mut settings = Settings::default();
        if let Some(raw) = self.redis.get(&provider_key()).await? {
            match raw.parse::<ProviderKind>() {
                Ok(kind) => settings.active_provider = kind,
                Err(e) => warn!(error = %e, "stored provider not recognized, using default"),
            }
        }
        for kind in ProviderKind::LIVE {
            if let Some(key) = self.redis.get(&api_key_key(kind)).await? {
                settings.api_keys.insert(kind, key);
            }
        }
        Ok(settings)
    }
}

#[async_trait]
impl SettingsStore for RedisSettingsStore {
    async fn load(&self) -> Settings {
        self.read()
            .await
            .inspect_err(|e| warn!(error = %e, "failed to read settings from redis, using defaults"))
            .unwrap_or_default()
    }

    async fn save(&self, update: SettingsUpdate) -> Result<Settings, CommonError> {
        let _guard = self.write_lock.lock().await;
        let mut settings = self.read().await?;
        settings.apply(update);

        self.redis.set_all(&redis_entries(&settings)).await?;

        info!(provider = %settings.active_provider, "settings saved to redis");
        Ok(settings)
    }
}

fn provider_key() -> String {
    format!("{KEY_PREFIX}aiProvider")
}

fn api_key_key(kind: ProviderKind) -> String {
    format!("{KEY_PREFIX}apiKeys.{kind}")
}

/// Flat key/value pairs for one settings snapshot.
fn redis_entries(settings: &Settings) -> Vec<(String, String)> {
    let mut entries = vec![(provider_key(), settings.active_provider.as_str().to_string())];
    entries.extend(
        settings
            .api_keys
            .iter()
            .map(|(kind, key)| (api_key_key(*kind), key.clone())),
    );
    entries
}
