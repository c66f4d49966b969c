use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::persistence::KeyValueStore;

pub const RECENT_KEY: &str = "recent";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentDocument {
    pub identity: String,
    /// Where the document was last opened from, when it came from a path.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Most-recently-used list keyed by identity, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentDocuments {
    entries: Vec<RecentDocument>,
    capacity: usize,
}

impl RecentDocuments {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn entries(&self) -> &[RecentDocument] {
        &self.entries
    }

    pub fn identities(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.identity.clone()).collect()
    }

    pub fn most_recent(&self) -> Option<&RecentDocument> {
        self.entries.first()
    }

    /// Moves `document` to the front, replacing an older entry with the same
    /// identity. Returns the entries that fell off the end.
    pub fn record(&mut self, document: RecentDocument) -> Vec<RecentDocument> {
        self.entries.retain(|entry| entry.identity != document.identity);
        self.entries.insert(0, document);
        if self.entries.len() > self.capacity {
            self.entries.split_off(self.capacity)
        } else {
            Vec::new()
        }
    }

    pub fn load(store: &dyn KeyValueStore, capacity: usize) -> Result<Self> {
        let mut recent = Self::new(capacity);
        if let Some(value) = store.get(RECENT_KEY)? {
            let mut entries: Vec<RecentDocument> =
                serde_json::from_value(value).context("failed to decode recent documents")?;
            entries.truncate(recent.capacity);
            recent.entries = entries;
        }
        Ok(recent)
    }

    pub fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set(RECENT_KEY, serde_json::to_value(&self.entries)?)
    }
}
