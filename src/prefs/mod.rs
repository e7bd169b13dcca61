//! User preferences behind an injected key-value repository.
//!
//! The core only ever needs `get`/`set` over named keys, so tests run
//! against `MemoryStore` and the binary can plug in the SQLite adapter.

pub mod sqlite;

pub use sqlite::SqliteStore;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::warn;

pub const PINNED_LEAGUES_KEY: &str = "pinned_leagues";
pub const THEME_KEY: &str = "theme";
pub const SOUND_KEY: &str = "sound_enabled";
pub const NOTIFICATIONS_KEY: &str = "notifications_enabled";

/// Hard cap on pinned leagues, insertion-ordered.
pub const MAX_PINNED_LEAGUES: usize = 3;

/// Narrow persistence contract: a value per named key, or absent.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThemeMode {
    #[default]
    System,
    Light,
    Dark,
}

impl ThemeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::System => "system",
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "system" => Some(ThemeMode::System),
            "light" => Some(ThemeMode::Light),
            "dark" => Some(ThemeMode::Dark),
            _ => None,
        }
    }
}

/// Typed access to the preference keys the engine cares about.
#[derive(Clone)]
pub struct Preferences {
    store: Arc<dyn KeyValueStore>,
}

impl Preferences {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Preferences { store }
    }

    /// Pinned league ids in insertion order.
    pub fn pinned_leagues(&self) -> Vec<String> {
        let Some(raw) = self.store.get(PINNED_LEAGUES_KEY) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|_| {
            warn!("pinned league list unreadable, treating as empty");
            Vec::new()
        })
    }

    /// Pin a league. Returns false when it is already pinned or the cap of
    /// `MAX_PINNED_LEAGUES` is reached.
    pub fn pin_league(&self, league_id: &str) -> bool {
        let mut pinned = self.pinned_leagues();
        if pinned.iter().any(|id| id == league_id) {
            return false;
        }
        if pinned.len() >= MAX_PINNED_LEAGUES {
            return false;
        }
        pinned.push(league_id.to_string());
        self.write_pinned(&pinned);
        true
    }

    pub fn unpin_league(&self, league_id: &str) {
        let mut pinned = self.pinned_leagues();
        pinned.retain(|id| id != league_id);
        self.write_pinned(&pinned);
    }

    fn write_pinned(&self, pinned: &[String]) {
        match serde_json::to_string(pinned) {
            Ok(raw) => self.store.set(PINNED_LEAGUES_KEY, &raw),
            Err(e) => warn!("failed to encode pinned league list: {}", e),
        }
    }

    pub fn sound_enabled(&self) -> bool {
        self.flag(SOUND_KEY)
    }

    pub fn set_sound_enabled(&self, enabled: bool) {
        self.set_flag(SOUND_KEY, enabled);
    }

    pub fn notifications_enabled(&self) -> bool {
        self.flag(NOTIFICATIONS_KEY)
    }

    pub fn set_notifications_enabled(&self, enabled: bool) {
        self.set_flag(NOTIFICATIONS_KEY, enabled);
    }

    pub fn theme(&self) -> ThemeMode {
        self.store
            .get(THEME_KEY)
            .and_then(|raw| ThemeMode::parse(&raw))
            .unwrap_or_default()
    }

    pub fn set_theme(&self, theme: ThemeMode) {
        self.store.set(THEME_KEY, theme.as_str());
    }

    fn flag(&self, key: &str) -> bool {
        self.store.get(key).as_deref() == Some("true")
    }

    fn set_flag(&self, key: &str, enabled: bool) {
        self.store.set(key, if enabled { "true" } else { "false" });
    }
}
