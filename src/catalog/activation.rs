//! Persistence of the ordered list of enabled pack ids (`active_packs.json`).

use super::error::CatalogError;
use camino::{Utf8Path, Utf8PathBuf};
use std::collections::HashSet;
use std::fs;

#[derive(Debug, Clone)]
pub struct ActivationStore {
    path: Utf8PathBuf,
}

impl ActivationStore {
    pub fn new<P: AsRef<Utf8Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Read the persisted selection. Missing, unreadable or corrupt files yield `None`.
    pub fn load(&self) -> Option<Vec<String>> {
        if !self.path.exists() {
            tracing::info!("No active pack file at {}", self.path);
            return None;
        }

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::warn!("Failed to read active pack file {}: {}", self.path, e);
                return None;
            }
        };

        match serde_json::from_str::<Vec<String>>(&contents) {
            Ok(ids) => Some(ids),
            Err(e) => {
                tracing::warn!(
                    "Active pack file {} is corrupt, treating as absent: {}",
                    self.path,
                    e
                );
                None
            }
        }
    }

    pub fn save(&self, ids: &[String]) -> Result<(), CatalogError> {
        let to_error = |message: String| CatalogError::Activation {
            path: self.path.to_string(),
            message,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| to_error(e.to_string()))?;
            }
        }

        let json = serde_json::to_string_pretty(ids).map_err(|e| to_error(e.to_string()))?;
        fs::write(&self.path, json).map_err(|e| to_error(e.to_string()))?;

        tracing::info!("Saved {} active pack(s) to {}", ids.len(), self.path);
        Ok(())
    }
}

/// Drop duplicates, keeping the first occurrence.
pub fn dedupe(ids: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

/// Reconcile a persisted selection against the packs discovered in this run.
///
/// Returns the effective selection and whether it must be written back.
pub fn reconcile(persisted: Option<Vec<String>>, discovered: &[String]) -> (Vec<String>, bool) {
    match persisted {
        None => (discovered.to_vec(), true),
        Some(ids) => {
            let known: HashSet<&str> = discovered.iter().map(String::as_str).collect();
            let original_len = ids.len();
            let kept = dedupe(ids.into_iter().filter(|id| known.contains(id.as_str())));
            let changed = kept.len() != original_len;
            (kept, changed)
        }
    }
}
