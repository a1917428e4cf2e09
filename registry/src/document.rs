use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::RegistryEntry;

pub const SCHEMA: &str = "v1";

fn default_schema() -> String {
    SCHEMA.to_string()
}

/// The registry document: an ordered list of published zines, at most one
/// per key (see [RegistryEntry::resolve_key]).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default = "default_schema")]
    pub schema: String,

    #[serde(default, deserialize_with = "lenient_entries")]
    pub entries: Vec<RegistryEntry>,

    /// Top-level fields written by other tools.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for RegistryDocument {
    fn default() -> Self {
        Self {
            schema: default_schema(),
            entries: vec![],
            extra: Map::new(),
        }
    }
}

/// Entries which aren't objects at all are dropped.
fn lenient_entries<'de, D>(deserializer: D) -> Result<Vec<RegistryEntry>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .filter_map(|v| match serde_json::from_value(v) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(err = %e, "dropping malformed registry entry");
                None
            }
        })
        .collect())
}

impl RegistryDocument {
    pub fn from_slice(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Collapses entries sharing a key. A later entry replaces the earlier
    /// one, but keeps its position. Entries without a key are left alone.
    fn normalize(&mut self) {
        let mut out: Vec<RegistryEntry> = Vec::with_capacity(self.entries.len());
        let mut index: HashMap<String, usize> = HashMap::new();

        for entry in self.entries.drain(..) {
            match entry.resolve_key().map(str::to_string) {
                Some(key) => match index.get(&key) {
                    Some(&i) => out[i] = entry,
                    None => {
                        index.insert(key, out.len());
                        out.push(entry);
                    }
                },
                None => out.push(entry),
            }
        }

        self.entries = out;
    }

    /// Inserts `entry`, removing any entry with the same key first, and
    /// appends it at the end. Returns whether an existing entry was replaced.
    pub fn upsert(&mut self, entry: RegistryEntry) -> bool {
        self.normalize();

        let mut replaced = false;
        if let Some(key) = entry.resolve_key() {
            let before = self.entries.len();
            self.entries.retain(|e| e.resolve_key() != Some(key));
            replaced = self.entries.len() != before;
        }

        self.entries.push(entry);
        replaced
    }

    /// Drops the entries keyed by `remove`, then sets each of `add` by key,
    /// replacing in place or appending.
    pub fn apply(&mut self, add: Vec<RegistryEntry>, remove: &[String]) {
        self.normalize();

        let remove: HashSet<&str> = remove.iter().map(String::as_str).collect();
        self.entries
            .retain(|e| !e.resolve_key().is_some_and(|k| remove.contains(k)));

        for entry in add {
            let existing = entry.resolve_key().and_then(|key| {
                self.entries
                    .iter()
                    .position(|e| e.resolve_key() == Some(key))
            });
            match existing {
                Some(i) => self.entries[i] = entry,
                None => self.entries.push(entry),
            }
        }
    }
}
