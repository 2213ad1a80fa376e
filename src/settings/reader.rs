//! SettingsReader: NG preferences straight from storage
//!
//! Every call reads storage again; nothing is cached between cycles, so a
//! settings change applies to the next intercepted response.

use serde_json::Value;
use std::collections::HashSet;

use super::storage::KeyValueStore;
use crate::comments::{NgSettings, ShareThreshold};
use crate::config::StorageKeys;

const SHARE_THRESHOLD_PATH: &str = "/data/ngScoreThreshold/data";
const BLOCKED_WORDS_PATH: &str = "/data/lastMatchedTimeMap/data/word";
const BLOCKED_USERS_PATH: &str = "/data/lastMatchedTimeMap/data/id";

// =============================================================================
// Types
// =============================================================================

/// Result of a full settings read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsSnapshot {
    pub settings: NgSettings,
    /// Keys whose stored value was present but not valid JSON
    pub malformed_keys: Vec<String>,
}

/// What a storage key held
#[derive(Debug, Clone, PartialEq)]
enum Stored {
    Absent,
    Malformed,
    Json(Value),
}

impl Stored {
    fn at(&self, path: &str) -> Option<&Value> {
        match self {
            Self::Json(value) => value.pointer(path),
            _ => None,
        }
    }
}

// =============================================================================
// SettingsReader
// =============================================================================

pub struct SettingsReader<'a, S: KeyValueStore + ?Sized> {
    store: &'a S,
    keys: &'a StorageKeys,
}

impl<'a, S: KeyValueStore + ?Sized> SettingsReader<'a, S> {
    pub fn new(store: &'a S, keys: &'a StorageKeys) -> Self {
        Self { store, keys }
    }

    /// Read all three settings in one go
    pub fn read(&self) -> SettingsSnapshot {
        let share = self.load(&self.keys.share_ng_key);
        let user_ng = self.load(&self.keys.user_ng_key);

        let mut malformed_keys = Vec::new();
        if share == Stored::Malformed {
            malformed_keys.push(self.keys.share_ng_key.clone());
        }
        if user_ng == Stored::Malformed {
            malformed_keys.push(self.keys.user_ng_key.clone());
        }

        SettingsSnapshot {
            settings: NgSettings {
                share_threshold: threshold_from(&share),
                blocked_user_ids: object_keys(&user_ng, BLOCKED_USERS_PATH).into_iter().collect(),
                blocked_words: object_keys(&user_ng, BLOCKED_WORDS_PATH),
            },
            malformed_keys,
        }
    }

    pub fn share_threshold(&self) -> ShareThreshold {
        threshold_from(&self.load(&self.keys.share_ng_key))
    }

    pub fn blocked_user_ids(&self) -> HashSet<String> {
        object_keys(&self.load(&self.keys.user_ng_key), BLOCKED_USERS_PATH)
            .into_iter()
            .collect()
    }

    pub fn blocked_words(&self) -> Vec<String> {
        object_keys(&self.load(&self.keys.user_ng_key), BLOCKED_WORDS_PATH)
    }

    fn load(&self, key: &str) -> Stored {
        match self.store.get_item(key) {
            None => Stored::Absent,
            Some(raw) if raw.is_empty() => Stored::Absent,
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Stored::Json(value),
                Err(_) => Stored::Malformed,
            },
        }
    }
}

fn threshold_from(stored: &Stored) -> ShareThreshold {
    stored
        .at(SHARE_THRESHOLD_PATH)
        .and_then(Value::as_str)
        .map(ShareThreshold::from_setting)
        .unwrap_or_default()
}

/// Keys of the object at `path`
fn object_keys(stored: &Stored, path: &str) -> Vec<String> {
    stored
        .at(path)
        .and_then(Value::as_object)
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}
