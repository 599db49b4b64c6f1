use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a content expander; callers keep the existing content.
#[derive(Debug, Error)]
#[error("content expansion failed: {0}")]
pub struct ExpandError(pub String);

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Produces additional values for a content list (for example a text service).
pub trait ContentExpander: Send + Sync {
    fn expand(
        &self,
        column_id: &str,
        existing: &[String],
        count: usize,
    ) -> Result<Vec<String>, ExpandError>;
}

/// Named content lists plus the values already handed out from each list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentStore {
    #[serde(default)]
    lists: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    used: BTreeMap<String, BTreeSet<String>>,
}

impl ContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from JSON; a missing file yields an empty store.
    pub fn load(path: &Path) -> Result<Self, ContentError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ContentError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Append values to a list, skipping duplicates. Returns how many were added.
    pub fn insert_values<I, S>(&mut self, list: &str, values: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.lists.entry(list.to_string()).or_default();
        let mut added = 0;
        for value in values {
            let value = value.into();
            if !entry.contains(&value) {
                entry.push(value);
                added += 1;
            }
        }
        added
    }

    pub fn list(&self, list: &str) -> Option<&[String]> {
        self.lists.get(list).map(Vec::as_slice)
    }

    pub fn contains_list(&self, list: &str) -> bool {
        self.lists.contains_key(list)
    }

    pub fn used_count(&self, list: &str) -> usize {
        self.used.get(list).map(BTreeSet::len).unwrap_or(0)
    }

    /// Ask `expander` for `count` more values. Expansion failures are logged and
    /// leave the list unchanged.
    pub fn extend_with(
        &mut self,
        expander: &dyn ContentExpander,
        list: &str,
        count: usize,
    ) -> usize {
        if count == 0 {
            return 0;
        }
        let existing = self.list(list).map(<[String]>::to_vec).unwrap_or_default();
        match expander.expand(list, &existing, count) {
            Ok(values) => {
                let added = self.insert_values(list, values);
                tracing::debug!(list, requested = count, added, "content list expanded");
                added
            }
            Err(err) => {
                tracing::warn!(
                    list,
                    error = %err,
                    "content expansion failed; using existing values"
                );
                0
            }
        }
    }

    /// Pick a value not handed out yet; once every value was used, any value.
    pub fn draw_unique(&mut self, list: &str, rng: &mut dyn RngCore) -> Option<String> {
        let values = self.lists.get(list)?;
        if values.is_empty() {
            return None;
        }
        let used = self.used.entry(list.to_string()).or_default();
        let unused: Vec<&String> = values.iter().filter(|value| !used.contains(*value)).collect();

        let picked = if unused.is_empty() {
            values[rng.random_range(0..values.len())].clone()
        } else {
            unused[rng.random_range(0..unused.len())].clone()
        };
        used.insert(picked.clone());
        Some(picked)
    }
}
