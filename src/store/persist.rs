use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::batch::driver::SessionLog;
use crate::foundation::error::{FiligraneError, FiligraneResult};
use crate::settings::model::WatermarkSettings;

/// Key of the current settings snapshot.
pub const SETTINGS_KEY: &str = "watermark-settings";
/// Key of the recent-session list.
pub const SESSIONS_KEY: &str = "recent-sessions";
/// Key of the named presets.
pub const PRESETS_KEY: &str = "presets";
/// Sessions kept, newest first.
pub const MAX_RECENT_SESSIONS: usize = 5;

/// Summary of one packaged batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentSession {
    /// Random id.
    pub id: Uuid,
    /// When the batch finished.
    pub date: DateTime<Utc>,
    /// Images in the batch.
    pub image_count: usize,
    /// Settings the batch was rendered with.
    pub settings: WatermarkSettings,
}

impl RecentSession {
    /// A session stamped now.
    pub fn new(image_count: usize, settings: WatermarkSettings) -> Self {
        Self {
            id: Uuid::new_v4(),
            date: Utc::now(),
            image_count,
            settings,
        }
    }
}

/// A named settings snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    /// Display name, unique within the store.
    pub name: String,
    /// Stored settings.
    pub settings: WatermarkSettings,
    /// When the preset was saved.
    pub created_at: DateTime<Utc>,
}

/// Key-value store of JSON documents, one file per key.
///
/// Unreadable or corrupt documents load as their default so a damaged store never blocks
/// startup.
#[derive(Clone, Debug)]
pub struct JsonStore {
    root: PathBuf,
}

impl JsonStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> FiligraneResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("create store dir '{}'", root.display()))?;
        Ok(Self { root })
    }

    /// Store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    fn load<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let path = self.key_path(key);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
            Err(e) => {
                tracing::warn!(key, error = %e, "store read failed, using default");
                return T::default();
            }
        };
        match serde_json::from_str(&text) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key, error = %e, "store document corrupt, using default");
                T::default()
            }
        }
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> FiligraneResult<()> {
        let json =
            serde_json::to_vec_pretty(value).map_err(|e| FiligraneError::serde(e.to_string()))?;
        let path = self.key_path(key);
        let tmp = self.root.join(format!(".{key}.json.tmp"));
        std::fs::write(&tmp, json).with_context(|| format!("write '{}'", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("replace '{}'", path.display()))?;
        tracing::debug!(key, "stored");
        Ok(())
    }

    /// Last saved settings, or the defaults.
    pub fn load_settings(&self) -> WatermarkSettings {
        self.load::<WatermarkSettings>(SETTINGS_KEY).clamped()
    }

    /// Replace the settings snapshot.
    pub fn save_settings(&self, settings: &WatermarkSettings) -> FiligraneResult<()> {
        self.save(SETTINGS_KEY, settings)
    }

    /// Recent sessions, newest first.
    pub fn recent_sessions(&self) -> Vec<RecentSession> {
        self.load(SESSIONS_KEY)
    }

    /// Prepend `session`, keeping at most [`MAX_RECENT_SESSIONS`].
    pub fn add_session(&self, session: RecentSession) -> FiligraneResult<()> {
        let mut sessions = self.recent_sessions();
        sessions.insert(0, session);
        sessions.truncate(MAX_RECENT_SESSIONS);
        self.save(SESSIONS_KEY, &sessions)
    }

    /// Forget every session.
    pub fn clear_sessions(&self) -> FiligraneResult<()> {
        self.save::<[RecentSession]>(SESSIONS_KEY, &[])
    }

    /// Saved presets, oldest first.
    pub fn presets(&self) -> Vec<Preset> {
        self.load(PRESETS_KEY)
    }

    /// Save `settings` under `name`, replacing a preset with the same name.
    pub fn save_preset(&self, name: &str, settings: &WatermarkSettings) -> FiligraneResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(FiligraneError::validation("preset name must not be empty"));
        }
        let mut presets = self.presets();
        presets.retain(|p| p.name != name);
        presets.push(Preset {
            name: name.to_owned(),
            settings: settings.clone(),
            created_at: Utc::now(),
        });
        self.save(PRESETS_KEY, &presets)
    }

    /// Look up a preset by name.
    pub fn preset(&self, name: &str) -> Option<Preset> {
        self.presets().into_iter().find(|p| p.name == name)
    }

    /// Remove a preset. Returns whether it existed.
    pub fn delete_preset(&self, name: &str) -> FiligraneResult<bool> {
        let mut presets = self.presets();
        let before = presets.len();
        presets.retain(|p| p.name != name);
        if presets.len() == before {
            return Ok(false);
        }
        self.save(PRESETS_KEY, &presets)?;
        Ok(true)
    }
}

impl SessionLog for JsonStore {
    fn record_session(
        &mut self,
        image_count: usize,
        settings: &WatermarkSettings,
    ) -> FiligraneResult<()> {
        self.add_session(RecentSession::new(image_count, settings.clone()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/store/persist.rs"]
mod tests;
