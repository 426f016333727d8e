//! The generated virtual pack the host loads sounds from.
//!
//! Everything lives in the reserved namespace:
//!
//! - `sounds.json`: manifest of one sound event per active track
//! - `sounds/<track_key>.<ext>`: the track audio, served from its owning pack
//! - `icons/<pack_id>.png`: pack icons
//!
//! Regeneration is lazy. The cached index remembers the catalog revision it was
//! built from and is rebuilt on the first request after the catalog moves past
//! it. [`CatalogChange`] events are drained and logged along the way.

use crate::catalog::{CatalogView, EntryReader, PackCatalog};
use crate::events::CatalogChange;
use crate::models::ResourceKey;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::{self, error::TryRecvError};

pub const MANIFEST_PATH: &str = "sounds.json";

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("resource {0} not found")]
    NotFound(String),

    #[error("failed to read {id} from pack '{pack}': {source}")]
    Io {
        id: String,
        pack: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {0}: {1}")]
    Serialize(&'static str, String),
}

#[derive(Serialize)]
struct SoundFile {
    name: String,
    stream: bool,
}

#[derive(Serialize)]
struct SoundEventEntry {
    sounds: Vec<SoundFile>,
}

#[derive(Debug, Clone)]
enum VirtualEntry {
    Manifest,
    Audio { pack_id: String, entry_path: String },
    Icon { pack_id: String, entry_path: String },
}

/// One built generation of the virtual pack.
#[derive(Debug)]
pub struct ProviderIndex {
    revision: u64,
    view: CatalogView,
    manifest: Arc<[u8]>,
    /// Path within the reserved namespace → where its bytes come from.
    entries: BTreeMap<String, VirtualEntry>,
}

impl ProviderIndex {
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn manifest(&self) -> &[u8] {
        &self.manifest
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Catalog view captured by [`VirtualResourceProvider::prepare`].
#[derive(Debug, Clone)]
pub struct PreparedReload {
    view: CatalogView,
}

impl PreparedReload {
    pub fn revision(&self) -> u64 {
        self.view.revision
    }
}

pub struct VirtualResourceProvider {
    catalog: Arc<PackCatalog>,
    namespace: String,
    pack_format: u32,
    description: String,
    index: RwLock<Option<Arc<ProviderIndex>>>,
    changes: Mutex<broadcast::Receiver<CatalogChange>>,
}

impl VirtualResourceProvider {
    pub fn new(catalog: Arc<PackCatalog>, pack_format: u32, description: &str) -> Self {
        let changes = Mutex::new(catalog.subscribe());
        Self {
            namespace: catalog.reserved_namespace().to_string(),
            catalog,
            pack_format,
            description: description.to_string(),
            index: RwLock::new(None),
            changes,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// First reload phase: capture the catalog state. No heavy work.
    pub fn prepare(&self) -> PreparedReload {
        PreparedReload {
            view: self.catalog.view(),
        }
    }

    /// Second reload phase: build the index and swap it in.
    ///
    /// An index built from an older catalog revision never replaces a newer
    /// one; the newer cached index is returned instead.
    pub fn apply(&self, prepared: PreparedReload) -> Result<Arc<ProviderIndex>, ProviderError> {
        let built = Arc::new(self.build(prepared.view)?);

        let mut slot = self.index.write();
        if let Some(existing) = slot.as_ref().filter(|i| i.revision > built.revision) {
            tracing::debug!(
                "Discarding index for revision {}; revision {} is already installed",
                built.revision,
                existing.revision
            );
            return Ok(Arc::clone(existing));
        }
        *slot = Some(Arc::clone(&built));
        drop(slot);

        tracing::info!(
            "Virtual pack rebuilt at revision {}: {} resource(s)",
            built.revision,
            built.entries.len()
        );
        Ok(built)
    }

    /// Current index, rebuilt first if the catalog moved past the cached revision.
    pub fn current(&self) -> Result<Arc<ProviderIndex>, ProviderError> {
        {
            let mut changes = self.changes.lock();
            loop {
                match changes.try_recv() {
                    Ok(change) => {
                        tracing::debug!("Catalog change at revision {}", change.revision());
                    }
                    Err(TryRecvError::Lagged(skipped)) => {
                        tracing::debug!("Missed {} catalog change(s)", skipped);
                    }
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                }
            }
        }

        let cached = self.index.read().clone();
        match cached {
            Some(index) if index.revision >= self.catalog.revision() => Ok(index),
            _ => self.apply(self.prepare()),
        }
    }

    /// The generated `sounds.json`.
    pub fn manifest_json(&self) -> Result<Vec<u8>, ProviderError> {
        Ok(self.current()?.manifest.to_vec())
    }

    /// Open a resource in the reserved namespace.
    pub fn resolve(&self, id: &ResourceKey) -> Result<EntryReader, ProviderError> {
        let not_found = || ProviderError::NotFound(id.to_string());
        if id.namespace() != self.namespace {
            return Err(not_found());
        }

        let index = self.current()?;
        let entry = index.entries.get(id.path()).ok_or_else(not_found)?;

        let (pack_id, entry_path) = match entry {
            VirtualEntry::Manifest => {
                return Ok(Box::new(Cursor::new(index.manifest.to_vec())));
            }
            VirtualEntry::Audio {
                pack_id,
                entry_path,
            }
            | VirtualEntry::Icon {
                pack_id,
                entry_path,
            } => (pack_id, entry_path),
        };

        let pack = index.view.generation.pack(pack_id).ok_or_else(not_found)?;
        pack.storage
            .open_entry(entry_path)
            .map_err(|source| ProviderError::Io {
                id: id.to_string(),
                pack: pack_id.clone(),
                source,
            })
    }

    /// Read a whole resource into memory.
    pub fn read(&self, id: &ResourceKey) -> Result<Vec<u8>, ProviderError> {
        let mut reader = self.resolve(id)?;
        let mut buf = Vec::new();
        std::io::Read::read_to_end(&mut reader, &mut buf).map_err(|source| ProviderError::Io {
            id: id.to_string(),
            pack: self.namespace.clone(),
            source,
        })?;
        Ok(buf)
    }

    /// Resource ids in `namespace` whose path starts with `prefix`, sorted.
    pub fn list(&self, namespace: &str, prefix: &str) -> Result<Vec<ResourceKey>, ProviderError> {
        if namespace != self.namespace {
            return Ok(Vec::new());
        }
        let index = self.current()?;
        Ok(index
            .entries
            .range(prefix.to_string()..)
            .take_while(|(path, _)| path.starts_with(prefix))
            .filter_map(|(path, _)| ResourceKey::new(&self.namespace, path).ok())
            .collect())
    }

    /// `pack.mcmeta` of the virtual pack.
    pub fn root_metadata(&self) -> Result<Vec<u8>, ProviderError> {
        let metadata = serde_json::json!({
            "pack": {
                "description": self.description,
                "pack_format": self.pack_format,
            }
        });
        serde_json::to_vec_pretty(&metadata)
            .map_err(|e| ProviderError::Serialize("pack.mcmeta", e.to_string()))
    }

    fn build(&self, view: CatalogView) -> Result<ProviderIndex, ProviderError> {
        let mut manifest: IndexMap<String, SoundEventEntry> = IndexMap::new();
        let mut entries = BTreeMap::new();
        entries.insert(MANIFEST_PATH.to_string(), VirtualEntry::Manifest);

        for track in view.active_tracks() {
            manifest.insert(
                track.track_key.clone(),
                SoundEventEntry {
                    sounds: vec![SoundFile {
                        name: track.resource_id.to_string(),
                        stream: true,
                    }],
                },
            );
            if let Some((_, entry_path)) = view.resolve_resource(&track.resource_id) {
                entries.insert(
                    track.resource_id.path().to_string(),
                    VirtualEntry::Audio {
                        pack_id: track.owner_pack_id.clone(),
                        entry_path,
                    },
                );
            }
        }

        // Icons are served for every discovered pack so selection screens can show them.
        for pack in view.generation.packs() {
            if let Some(icon) = &pack.icon_entry {
                entries.insert(
                    format!("icons/{}.png", pack.id),
                    VirtualEntry::Icon {
                        pack_id: pack.id.clone(),
                        entry_path: icon.clone(),
                    },
                );
            }
        }

        let manifest = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| ProviderError::Serialize(MANIFEST_PATH, e.to_string()))?;

        Ok(ProviderIndex {
            revision: view.revision,
            view,
            manifest: manifest.into(),
            entries,
        })
    }
}
