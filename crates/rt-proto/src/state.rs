use crate::protocol::Episode;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, warn};

pub const IS_PLAYING_KEY: &str = "rt-playing:playing";
pub const PLAYING_TYPE_KEY: &str = "rt-playing";
pub const EPISODE_KEY: &str = "rt-playing:episode";
pub const STREAM_ID_KEY: &str = "rt-episode-name";

/// Durable key-value storage for playback state.
pub trait Storage {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// JSON object on disk, rewritten on every change.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl FileStore {
    pub fn open(path: PathBuf) -> Self {
        let entries = Self::load(&path);
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn load(path: &PathBuf) -> Map<String, Value> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Map::new(),
        };
        match serde_json::from_str::<Map<String, Value>>(&content) {
            Ok(map) => map,
            Err(e) => {
                warn!("state file {:?} unreadable, starting empty: {}", path, e);
                Map::new()
            }
        }
    }

    fn flush(&self, entries: &Map<String, Value>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl Storage for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
        self.flush(&entries)
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }
}

/// Process-local storage, used by tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayingType {
    #[default]
    Nothing,
    Episode,
    Live,
}

impl PlayingType {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Nothing => "rt-playing:nothing",
            Self::Episode => "rt-playing:episode",
            Self::Live => "rt-playing:live",
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "rt-playing:episode" => Self::Episode,
            "rt-playing:live" => Self::Live,
            _ => Self::Nothing,
        }
    }
}

/// What is loaded in the player and whether it is running.
///
/// `episode` is only set for `PlayingType::Episode`, and `stream_id` is
/// always set while `is_playing`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackState {
    pub playing_type: PlayingType,
    pub is_playing: bool,
    pub stream_id: Option<String>,
    pub episode: Option<Episode>,
}

impl PlaybackState {
    pub fn load(store: &impl Storage) -> Self {
        let is_playing = store
            .get(IS_PLAYING_KEY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let playing_type = store
            .get(PLAYING_TYPE_KEY)
            .and_then(|v| v.as_str().map(PlayingType::from_tag))
            .unwrap_or_default();
        let stream_id = store
            .get(STREAM_ID_KEY)
            .and_then(|v| v.as_str().map(str::to_string))
            .filter(|s| !s.is_empty());
        let episode = store
            .get(EPISODE_KEY)
            .and_then(|v| v.as_str().map(str::to_string))
            .and_then(|raw| match serde_json::from_str::<Episode>(&raw) {
                Ok(e) => Some(e),
                Err(e) => {
                    debug!("stored episode unreadable: {}", e);
                    None
                }
            })
            .filter(|_| playing_type == PlayingType::Episode);

        Self {
            playing_type,
            is_playing: is_playing && stream_id.is_some(),
            stream_id,
            episode,
        }
    }

    pub fn save(&self, store: &impl Storage) -> anyhow::Result<()> {
        store.set(IS_PLAYING_KEY, Value::Bool(self.is_playing))?;
        store.set(PLAYING_TYPE_KEY, Value::String(self.playing_type.tag().to_string()))?;
        match &self.stream_id {
            Some(id) => store.set(STREAM_ID_KEY, Value::String(id.clone()))?,
            None => store.remove(STREAM_ID_KEY)?,
        }
        match &self.episode {
            Some(e) => store.set(EPISODE_KEY, Value::String(serde_json::to_string(e)?))?,
            None => store.remove(EPISODE_KEY)?,
        }
        Ok(())
    }

    /// Short human-readable description for status output.
    pub fn describe(&self) -> String {
        let what = match (self.playing_type, &self.episode) {
            (PlayingType::Episode, Some(e)) => e.title.clone(),
            (PlayingType::Episode, None) => "episode".to_string(),
            (PlayingType::Live, _) => "live stream".to_string(),
            (PlayingType::Nothing, _) => return "Nothing playing".to_string(),
        };
        if self.is_playing {
            format!("Playing: {}", what)
        } else {
            format!("Paused: {}", what)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode() -> Episode {
        Episode {
            title: "Радио-Т 901".to_string(),
            file_name: "rt_podcast901".to_string(),
            audio_url: "https://cdn.radio-t.com/rt_podcast901.mp3".to_string(),
            ..Episode::default()
        }
    }

    #[test]
    fn test_empty_store_is_nothing() {
        let store = MemoryStore::new();
        assert_eq!(PlaybackState::load(&store), PlaybackState::default());
    }

    #[test]
    fn test_save_load_episode_state() {
        let store = MemoryStore::new();
        let state = PlaybackState {
            playing_type: PlayingType::Episode,
            is_playing: true,
            stream_id: Some("7".to_string()),
            episode: Some(episode()),
        };
        state.save(&store).unwrap();

        assert_eq!(store.get(PLAYING_TYPE_KEY).unwrap(), "rt-playing:episode");
        assert_eq!(store.get(IS_PLAYING_KEY).unwrap(), true);
        assert_eq!(store.get(STREAM_ID_KEY).unwrap(), "7");
        assert!(store.get(EPISODE_KEY).unwrap().is_string());
        assert_eq!(PlaybackState::load(&store), state);
    }

    #[test]
    fn test_save_clears_absent_fields() {
        let store = MemoryStore::new();
        PlaybackState {
            playing_type: PlayingType::Episode,
            is_playing: true,
            stream_id: Some("7".to_string()),
            episode: Some(episode()),
        }
        .save(&store)
        .unwrap();
        PlaybackState::default().save(&store).unwrap();

        assert!(store.get(STREAM_ID_KEY).is_none());
        assert!(store.get(EPISODE_KEY).is_none());
        assert_eq!(store.get(PLAYING_TYPE_KEY).unwrap(), "rt-playing:nothing");
    }

    #[test]
    fn test_load_enforces_invariants() {
        let store = MemoryStore::new();
        store.set(IS_PLAYING_KEY, Value::Bool(true)).unwrap();
        store
            .set(PLAYING_TYPE_KEY, Value::String("rt-playing:live".into()))
            .unwrap();
        store
            .set(EPISODE_KEY, Value::String(serde_json::to_string(&episode()).unwrap()))
            .unwrap();

        let state = PlaybackState::load(&store);
        assert_eq!(state.playing_type, PlayingType::Live);
        // no stream id -> cannot be playing; live -> no episode
        assert!(!state.is_playing);
        assert!(state.episode.is_none());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        {
            let store = FileStore::open(path.clone());
            PlaybackState {
                playing_type: PlayingType::Live,
                is_playing: true,
                stream_id: Some("3".to_string()),
                episode: None,
            }
            .save(&store)
            .unwrap();
        }

        let reopened = FileStore::open(path);
        let state = PlaybackState::load(&reopened);
        assert_eq!(state.playing_type, PlayingType::Live);
        assert_eq!(state.stream_id.as_deref(), Some("3"));
        assert!(state.is_playing);
    }

    #[test]
    fn test_file_store_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = FileStore::open(path);
        assert!(store.get(IS_PLAYING_KEY).is_none());
    }

    #[test]
    fn test_describe() {
        let mut state = PlaybackState::default();
        assert_eq!(state.describe(), "Nothing playing");
        state.playing_type = PlayingType::Live;
        state.stream_id = Some("1".into());
        state.is_playing = true;
        assert_eq!(state.describe(), "Playing: live stream");
        state.is_playing = false;
        assert_eq!(state.describe(), "Paused: live stream");
    }
}
