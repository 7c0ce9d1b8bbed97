use crate::models::chat::ConversationHistory;
use chrono::Utc;
use log::warn;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{ Path, PathBuf };
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

/// Key the conversation is saved under.
pub const STORAGE_KEY: &str = "chatbot_conversation";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation store IO error: {0}")]
    Io(#[from] io::Error),

    #[error("could not serialize conversation: {0}")]
    Json(#[from] serde_json::Error),
}

/// String-valued key/value storage, the shape browser local storage has.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes beside the target and renames over it, so a reader never sees half a record.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let target = self.path_for(key);
        let tmp = self.dir.join(format!(".{}.json.tmp", key));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &target)?;
        Ok(())
    }
}

pub fn new_conversation(model: &str) -> ConversationHistory {
    ConversationHistory {
        id: generate_id("conv"),
        messages: Vec::new(),
        model: model.to_string(),
        timestamp: Utc::now(),
    }
}

/// Reads the saved conversation. Anything missing or unreadable yields a fresh one.
pub fn load_conversation(store: &dyn KeyValueStore, default_model: &str) -> ConversationHistory {
    let raw = match store.get(STORAGE_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return new_conversation(default_model),
        Err(e) => {
            warn!("Error loading conversation history: {}", e);
            return new_conversation(default_model);
        }
    };

    match serde_json::from_str::<ConversationHistory>(&raw) {
        Ok(mut history) => {
            if history.id.is_empty() {
                history.id = generate_id("conv");
            }
            if history.model.is_empty() {
                history.model = default_model.to_string();
            }
            history
        }
        Err(e) => {
            warn!("Saved conversation is corrupt, starting over: {}", e);
            new_conversation(default_model)
        }
    }
}

/// Replaces the whole saved record; nothing is appended.
pub fn save_conversation(
    store: &dyn KeyValueStore,
    history: &ConversationHistory
) -> Result<(), StoreError> {
    let mut snapshot = history.clone();
    snapshot.timestamp = Utc::now();
    let json = serde_json::to_string(&snapshot)?;
    store.set(STORAGE_KEY, &json)
}

/// `<prefix>_<unix millis>_<9 base36 chars>`.
pub fn generate_id(prefix: &str) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut bits = Uuid::new_v4().as_u128();
    let suffix: String = (0..9)
        .map(|_| {
            let c = ALPHABET[(bits % 36) as usize] as char;
            bits /= 36;
            c
        })
        .collect();
    format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), suffix)
}
