use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::error::KeeperError;

/// "Network was reachable at last probe"
pub const PREFS_KEY_WIFI_STATUS: &str = "wifiStatus";
/// Absolute instant at which the remaining media time elapses, ms since epoch
pub const PREFS_KEY_MEDIA_END: &str = "mediaEndDeadline";

/// Process-durable key/value persistence. Reads may be called from any thread
/// and must tolerate a value written concurrently by a task body.
pub trait PreferenceStore: Send + Sync {
    fn load(&self, key: &str) -> Option<Value>;
    fn save(&self, key: &str, value: Value) -> Result<(), KeeperError>;
    fn remove(&self, key: &str) -> Result<(), KeeperError>;
}

/// Volatile store, for hosts that persist elsewhere and for tests.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn load(&self, key: &str) -> Option<Value> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn save(&self, key: &str, value: Value) -> Result<(), KeeperError> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), KeeperError> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
        Ok(())
    }
}

/// Flat JSON object on disk, rewritten whole on every change.
pub struct JsonFileStore {
    path: PathBuf,
    values: RwLock<HashMap<String, Value>>,
}

impl JsonFileStore {
    /// Opens `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, KeeperError> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read(&path) {
            Ok(bytes) if bytes.is_empty() => HashMap::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Preference file missing, starting empty");
                HashMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    fn flush(&self, values: &HashMap<String, Value>) -> Result<(), KeeperError> {
        let body = serde_json::to_vec_pretty(values)?;
        // Write-then-rename so a crash never leaves a torn file behind
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl PreferenceStore for JsonFileStore {
    fn load(&self, key: &str) -> Option<Value> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn save(&self, key: &str, value: Value) -> Result<(), KeeperError> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value);
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> Result<(), KeeperError> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        if values.remove(key).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }
}

/// Typed access to the two keys this crate owns.
#[derive(Clone)]
pub struct PersistedState {
    store: Arc<dyn PreferenceStore>,
}

impl PersistedState {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    pub fn wifi_status(&self) -> Option<bool> {
        self.store.load(PREFS_KEY_WIFI_STATUS)?.as_bool()
    }

    pub fn set_wifi_status(&self, has_identity: bool) -> Result<(), KeeperError> {
        self.store.save(PREFS_KEY_WIFI_STATUS, Value::Bool(has_identity))
    }

    pub fn media_end_deadline(&self) -> Option<SystemTime> {
        let millis = self.store.load(PREFS_KEY_MEDIA_END)?.as_u64()?;
        Some(UNIX_EPOCH + Duration::from_millis(millis))
    }

    pub fn set_media_end_deadline(&self, deadline: SystemTime) -> Result<(), KeeperError> {
        let millis = deadline
            .duration_since(UNIX_EPOCH)
            .map_err(|e| KeeperError::Store(format!("deadline before epoch: {}", e)))?
            .as_millis();
        let millis = u64::try_from(millis)
            .map_err(|_| KeeperError::Store("deadline out of range".to_string()))?;
        self.store.save(PREFS_KEY_MEDIA_END, Value::from(millis))
    }

    /// Time left until the persisted deadline, zero when it has passed.
    pub fn remaining_until_deadline(&self) -> Option<Duration> {
        let deadline = self.media_end_deadline()?;
        Some(
            deadline
                .duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO),
        )
    }

    /// Drops everything persisted about the session. Both keys are attempted
    /// even when the first removal fails.
    pub fn clear_all(&self) -> Result<(), KeeperError> {
        let wifi = self.store.remove(PREFS_KEY_WIFI_STATUS);
        let deadline = self.store.remove(PREFS_KEY_MEDIA_END);
        if let Err(ref e) = wifi {
            warn!(error = %e, "Failed to clear persisted wifi status");
        }
        wifi.and(deadline)
    }
}

impl std::fmt::Debug for PersistedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistedState")
            .field("wifi_status", &self.wifi_status())
            .field("media_end_deadline", &self.media_end_deadline())
            .finish()
    }
}
