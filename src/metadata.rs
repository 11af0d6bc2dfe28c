//! Refresh ledger: per-list record of the last successful download.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use crate::error::Result;

/// Update information for one filter list.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ListMetadata {
    #[serde(with = "system_time_serde")]
    pub last_updated: Option<SystemTime>,
    pub etag: Option<String>,
}

mod system_time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => {
                let duration = t.duration_since(UNIX_EPOCH).unwrap_or_default();
                Some(duration.as_secs()).serialize(serializer)
            }
            None => None::<u64>.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs: Option<u64> = Option::deserialize(deserializer)?;
        Ok(secs.map(|s| UNIX_EPOCH + Duration::from_secs(s)))
    }
}

impl ListMetadata {
    /// Metadata stamped with the current time.
    pub fn now_with_etag(etag: Option<String>) -> Self {
        Self {
            last_updated: Some(SystemTime::now()),
            etag,
        }
    }

    /// Check if an update is needed based on the given interval.
    ///
    /// Returns `true` if:
    /// - No last_updated time is recorded
    /// - The elapsed time since last_updated exceeds the interval
    pub fn needs_update(&self, interval: Duration) -> bool {
        match self.last_updated {
            None => true,
            Some(last) => {
                let elapsed = SystemTime::now().duration_since(last).unwrap_or(Duration::MAX);
                elapsed >= interval
            }
        }
    }
}

/// Small key-value record keyed by list name, persisted as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RefreshLedger {
    lists: BTreeMap<String, ListMetadata>,
}

impl RefreshLedger {
    /// Load the ledger from a file.
    ///
    /// Returns an empty ledger if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save the ledger to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ListMetadata> {
        self.lists.get(name)
    }

    /// Stamp a successful refresh of `name`.
    pub fn record(&mut self, name: &str, etag: Option<String>) {
        self.lists
            .insert(name.to_string(), ListMetadata::now_with_etag(etag));
    }

    /// Drop a stored ETag so the next download is unconditional.
    pub fn forget_etag(&mut self, name: &str) {
        if let Some(meta) = self.lists.get_mut(name) {
            meta.etag = None;
        }
    }

    pub fn etag(&self, name: &str) -> Option<&str> {
        self.lists.get(name).and_then(|m| m.etag.as_deref())
    }

    pub fn last_updated(&self, name: &str) -> Option<SystemTime> {
        self.lists.get(name).and_then(|m| m.last_updated)
    }

    /// True if `name` was never refreshed or its interval elapsed.
    pub fn needs_update(&self, name: &str, interval: Duration) -> bool {
        self.lists
            .get(name)
            .map_or(true, |m| m.needs_update(interval))
    }
}
