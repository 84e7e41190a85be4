//! Persistent form state.
//!
//! Four string fields mirrored to a key-value store so the next launch
//! picks up where the last one left off. Each setter writes its field
//! through immediately; there is no batching and no schema version.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;

pub const API_KEY: &str = "tts_api_key";
pub const TEXT: &str = "tts_text";
pub const SELECTED_VOICE: &str = "tts_selected_voice";
pub const AUDIO_URL: &str = "tts_audio_url";

/// Durable string storage keyed by fixed names.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}

/// JSON object on disk, rewritten on every `set`.
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    /// Open the store, starting empty when the file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Ignoring malformed session file {}: {e}", path.display());
                    BTreeMap::new()
                }
            },
            Err(_) => {
                debug!("No session file at {}", path.display());
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub api_key: String,
    pub text: String,
    pub selected_voice: String,
    pub audio_url: String,
}

/// Session state bound to the store it mirrors.
pub struct Session<S: KeyValueStore> {
    state: SessionState,
    store: S,
}

impl<S: KeyValueStore> Session<S> {
    /// Restore all four fields; absent entries read as empty strings.
    pub fn load(store: S) -> Self {
        let read = |key: &str| store.get(key).unwrap_or_default();
        let state = SessionState {
            api_key: read(API_KEY),
            text: read(TEXT),
            selected_voice: read(SELECTED_VOICE),
            audio_url: read(AUDIO_URL),
        };
        Self { state, store }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn set_api_key(&mut self, value: &str) {
        self.state.api_key = value.to_string();
        self.persist(API_KEY, value);
    }

    pub fn set_text(&mut self, value: &str) {
        self.state.text = value.to_string();
        self.persist(TEXT, value);
    }

    pub fn set_selected_voice(&mut self, value: &str) {
        self.state.selected_voice = value.to_string();
        self.persist(SELECTED_VOICE, value);
    }

    pub fn set_audio_url(&mut self, value: &str) {
        self.state.audio_url = value.to_string();
        self.persist(AUDIO_URL, value);
    }

    fn persist(&mut self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!("Failed to persist {key}: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("verbatik-studio-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn empty_store_loads_empty_state() {
        let session = Session::load(MemoryStore::default());
        assert_eq!(session.state(), &SessionState::default());
    }

    #[test]
    fn setters_write_through_including_empty_values() {
        let mut session = Session::load(MemoryStore::default());
        session.set_text("hello");
        session.set_text("");
        assert_eq!(session.store().get(TEXT), Some(String::new()));

        session.set_selected_voice("en-US-AriaNeural");
        assert_eq!(
            session.store().get(SELECTED_VOICE).as_deref(),
            Some("en-US-AriaNeural")
        );
    }

    #[test]
    fn file_store_restores_all_fields_after_reload() {
        let path = temp_path("restore.json");
        let _ = fs::remove_file(&path);

        let mut session = Session::load(FileStore::open(&path));
        session.set_api_key("key-123");
        session.set_text("Hello there");
        session.set_selected_voice("en-GB-SoniaNeural");
        session.set_audio_url("https://x/a.mp3");
        drop(session);

        let reloaded = Session::load(FileStore::open(&path));
        assert_eq!(
            reloaded.state(),
            &SessionState {
                api_key: "key-123".into(),
                text: "Hello there".into(),
                selected_voice: "en-GB-SoniaNeural".into(),
                audio_url: "https://x/a.mp3".into(),
            }
        );
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn malformed_file_starts_empty() {
        let path = temp_path("malformed.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "not json").unwrap();

        let session = Session::load(FileStore::open(&path));
        assert_eq!(session.state(), &SessionState::default());
        let _ = fs::remove_file(&path);
    }
}
