//! Pack discovery and the track / resource index built from it.
//!
//! A discovery run builds a complete [`CatalogGeneration`] off to the side and
//! swaps it in, together with the reconciled active selection and a new
//! revision, under a single write lock. Readers clone the current
//! [`CatalogView`], so a reload never exposes partial state and archive bytes held
//! by the previous generation are released once the last reader drops it.
//!
//! # Related Types
//!
//! - [`storage::PackStorage`]: directory and zip archive access
//! - [`activation::ActivationStore`]: persisted enabled-pack list
//! - [`crate::events::CatalogChange`]: emitted after every reload and activation change

pub mod activation;
pub mod error;
pub mod loader;
pub mod storage;

pub use activation::ActivationStore;
pub use error::{CatalogError, DiscoveryReport};
pub use storage::{ArchiveStorage, DirectoryStorage, EntryReader, PackStorage};

use crate::events::CatalogChange;
use crate::models::{ResourceKey, TrackDefinition, pack_id_from_file_name};
use camino::{Utf8Path, Utf8PathBuf};
use loader::{LoadedPack, PackIdentity};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::sync::Arc;
use tokio::sync::broadcast;

/// One discovered pack, valid for the lifetime of its generation.
#[derive(Debug)]
pub struct PackSource {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub namespace: String,
    pub pack_format: i64,
    pub is_archive: bool,
    pub icon_entry: Option<String>,
    pub storage: Arc<dyn PackStorage>,
}

impl PackSource {
    /// Pack-relative entry path for a path under `assets/<namespace>/`.
    pub fn asset_path(&self, relative: &str) -> String {
        format!("assets/{}/{}", self.namespace, relative)
    }
}

/// Where a registered resource id's bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEntry {
    pub pack_id: String,
    pub entry_path: String,
}

/// Immutable result of one discovery run.
#[derive(Debug, Default)]
pub struct CatalogGeneration {
    packs: Vec<Arc<PackSource>>,
    /// Sorted by priority descending, ties in discovery order.
    tracks: Vec<Arc<TrackDefinition>>,
    resources: HashMap<ResourceKey, ResourceEntry>,
    track_keys: HashMap<String, usize>,
}

impl CatalogGeneration {
    pub fn packs(&self) -> &[Arc<PackSource>] {
        &self.packs
    }

    pub fn pack(&self, id: &str) -> Option<&Arc<PackSource>> {
        self.packs.iter().find(|p| p.id == id)
    }

    pub fn tracks(&self) -> &[Arc<TrackDefinition>] {
        &self.tracks
    }

    pub fn track_by_key(&self, key: &str) -> Option<&Arc<TrackDefinition>> {
        self.track_keys.get(key).map(|&i| &self.tracks[i])
    }

    pub fn resource(&self, id: &ResourceKey) -> Option<&ResourceEntry> {
        self.resources.get(id)
    }

    pub fn pack_ids(&self) -> Vec<String> {
        self.packs.iter().map(|p| p.id.clone()).collect()
    }
}

/// A consistent pairing of one generation with one activation selection.
#[derive(Debug, Clone)]
pub struct CatalogView {
    pub revision: u64,
    pub generation: Arc<CatalogGeneration>,
    pub active_pack_ids: Arc<Vec<String>>,
}

impl CatalogView {
    pub fn is_active(&self, pack_id: &str) -> bool {
        self.active_pack_ids.iter().any(|id| id == pack_id)
    }

    /// Tracks of active packs in priority order.
    pub fn active_tracks(&self) -> impl Iterator<Item = &Arc<TrackDefinition>> {
        self.generation
            .tracks
            .iter()
            .filter(|t| self.is_active(&t.owner_pack_id))
    }

    /// Active packs in discovery order.
    pub fn active_packs(&self) -> impl Iterator<Item = &Arc<PackSource>> {
        self.generation.packs.iter().filter(|p| self.is_active(&p.id))
    }

    /// Look up a registered resource id in the active packs.
    pub fn resolve_resource(&self, id: &ResourceKey) -> Option<(Arc<PackSource>, String)> {
        let entry = self.generation.resource(id)?;
        if !self.is_active(&entry.pack_id) {
            return None;
        }
        let pack = self.generation.pack(&entry.pack_id)?;
        Some((Arc::clone(pack), entry.entry_path.clone()))
    }
}

/// Catalog of all packs under the pack root.
pub struct PackCatalog {
    pack_root: Utf8PathBuf,
    reserved_namespace: String,
    activation: ActivationStore,
    /// Generation, selection and revision are always swapped together.
    state: RwLock<CatalogView>,
    /// Serializes discovery and activation changes.
    update_lock: Mutex<()>,
    change_tx: broadcast::Sender<CatalogChange>,
}

impl PackCatalog {
    /// Create an empty catalog. Nothing is scanned until [`discover`](Self::discover).
    pub fn new<P: AsRef<Utf8Path>>(
        pack_root: P,
        activation: ActivationStore,
        reserved_namespace: &str,
    ) -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            pack_root: pack_root.as_ref().to_path_buf(),
            reserved_namespace: reserved_namespace.to_string(),
            activation,
            state: RwLock::new(CatalogView {
                revision: 0,
                generation: Arc::new(CatalogGeneration::default()),
                active_pack_ids: Arc::new(Vec::new()),
            }),
            update_lock: Mutex::new(()),
            change_tx,
        }
    }

    pub fn pack_root(&self) -> &Utf8Path {
        &self.pack_root
    }

    pub fn reserved_namespace(&self) -> &str {
        &self.reserved_namespace
    }

    /// Scan the pack root and replace the current generation.
    ///
    /// Problems with individual packs or rule files are collected into the
    /// report; only a pack root that cannot be created or listed fails the run.
    pub fn discover(&self) -> Result<DiscoveryReport, CatalogError> {
        let _guard = self.update_lock.lock();

        tracing::info!("Discovering packs in {}", self.pack_root);
        let root_error = |e: io::Error| CatalogError::Io {
            pack: self.pack_root.to_string(),
            message: e.to_string(),
        };

        if !self.pack_root.exists() {
            fs::create_dir_all(&self.pack_root).map_err(root_error)?;
            tracing::info!("Created pack root {}", self.pack_root);
        }

        let mut diagnostics = Vec::new();
        let mut loaded = Vec::new();
        let mut seen_ids = HashSet::new();

        for identity in self.scan_root().map_err(root_error)? {
            if !seen_ids.insert(identity.id.clone()) {
                let diagnostic = CatalogError::Config {
                    pack: identity.id.clone(),
                    message: format!(
                        "'{}' maps to an id already used by another pack",
                        identity.display_name
                    ),
                };
                tracing::warn!("{}", diagnostic);
                diagnostics.push(diagnostic);
                continue;
            }

            match self.load_identity(identity) {
                Ok(pack) => loaded.push(pack),
                Err(diagnostic) => {
                    tracing::warn!("{}", diagnostic);
                    diagnostics.push(diagnostic);
                }
            }
        }

        let generation = build_generation(loaded, &mut diagnostics);
        let packs_loaded = generation.packs.len();
        let tracks_loaded = generation.tracks.len();
        let discovered_ids = generation.pack_ids();

        let (active, persist) = activation::reconcile(self.activation.load(), &discovered_ids);
        if persist {
            if let Err(e) = self.activation.save(&active) {
                tracing::warn!("{}", e);
                diagnostics.push(e);
            }
        }

        let revision = self.install(Some(Arc::new(generation)), active);
        let _ = self.change_tx.send(CatalogChange::Reloaded {
            revision,
            packs: packs_loaded,
            tracks: tracks_loaded,
        });

        tracing::info!(
            "Discovery complete: revision {}, {} pack(s), {} track(s), {} diagnostic(s)",
            revision,
            packs_loaded,
            tracks_loaded,
            diagnostics.len()
        );

        Ok(DiscoveryReport {
            revision,
            packs_loaded,
            tracks_loaded,
            diagnostics,
        })
    }

    /// Immediate subdirectories and `*.zip` files of the pack root, by file name.
    ///
    /// Entries that cannot be read or typed are skipped with a warning.
    fn scan_root(&self) -> io::Result<Vec<PackIdentity>> {
        let mut identities = Vec::new();
        for entry in self.pack_root.read_dir_utf8()? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry in {}: {}", self.pack_root, e);
                    continue;
                }
            };
            let name = entry.file_name().to_string();
            // Follows symlinks, so linked pack folders count and dangling links are skipped
            let file_type = match entry.path().metadata() {
                Ok(metadata) => metadata.file_type(),
                Err(e) => {
                    tracing::warn!("Skipping '{}' in {}: {}", name, self.pack_root, e);
                    continue;
                }
            };
            let is_archive = file_type.is_file()
                && Utf8Path::new(&name)
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));

            if file_type.is_dir() || is_archive {
                identities.push(PackIdentity {
                    id: pack_id_from_file_name(&name, is_archive),
                    display_name: name,
                    is_archive,
                });
            }
        }
        identities.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(identities)
    }

    fn load_identity(&self, identity: PackIdentity) -> Result<LoadedPack, CatalogError> {
        let location = self.pack_root.join(&identity.display_name);
        let storage: Arc<dyn PackStorage> = if identity.is_archive {
            let archive = ArchiveStorage::open(&location).map_err(|e| CatalogError::Io {
                pack: identity.id.clone(),
                message: format!("cannot open archive {}: {}", location, e),
            })?;
            Arc::new(archive)
        } else {
            Arc::new(DirectoryStorage::new(&location))
        };
        loader::load_pack(identity, storage, &self.reserved_namespace)
    }

    /// Replace the active selection (deduplicated, order kept) and persist it.
    ///
    /// The in-memory selection is updated even when persisting fails.
    pub fn set_active_pack_ids(&self, ids: Vec<String>) -> Result<(), CatalogError> {
        let _guard = self.update_lock.lock();
        let ids = activation::dedupe(ids);
        let result = self.activation.save(&ids);
        let revision = self.install(None, ids.clone());
        let _ = self.change_tx.send(CatalogChange::ActivationChanged {
            revision,
            active: ids,
        });

        if let Err(e) = &result {
            tracing::warn!("{}", e);
        }
        result
    }

    /// Swap in a new selection, and optionally a new generation, under the
    /// next revision. Callers hold `update_lock`.
    fn install(&self, generation: Option<Arc<CatalogGeneration>>, active: Vec<String>) -> u64 {
        let mut state = self.state.write();
        let next = CatalogView {
            revision: state.revision + 1,
            generation: generation.unwrap_or_else(|| Arc::clone(&state.generation)),
            active_pack_ids: Arc::new(active),
        };
        *state = next;
        state.revision
    }

    /// Consistent snapshot of the current generation and active selection.
    pub fn view(&self) -> CatalogView {
        self.state.read().clone()
    }

    pub fn generation(&self) -> Arc<CatalogGeneration> {
        Arc::clone(&self.state.read().generation)
    }

    pub fn packs(&self) -> Vec<Arc<PackSource>> {
        self.state.read().generation.packs.clone()
    }

    pub fn tracks(&self) -> Vec<Arc<TrackDefinition>> {
        self.state.read().generation.tracks.clone()
    }

    pub fn active_tracks(&self) -> Vec<Arc<TrackDefinition>> {
        self.view().active_tracks().cloned().collect()
    }

    pub fn track_by_key(&self, key: &str) -> Option<Arc<TrackDefinition>> {
        self.state.read().generation.track_by_key(key).cloned()
    }

    pub fn resolve_resource(&self, id: &ResourceKey) -> Option<(Arc<PackSource>, String)> {
        self.view().resolve_resource(id)
    }

    pub fn active_pack_ids(&self) -> Vec<String> {
        self.state.read().active_pack_ids.as_ref().clone()
    }

    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CatalogChange> {
        self.change_tx.subscribe()
    }
}

/// Register loaded packs in discovery order and sort tracks by priority.
///
/// The first definition to claim a track key keeps it; later ones are rejected.
fn build_generation(
    loaded: Vec<LoadedPack>,
    diagnostics: &mut Vec<CatalogError>,
) -> CatalogGeneration {
    let mut packs = Vec::with_capacity(loaded.len());
    let mut tracks: Vec<Arc<TrackDefinition>> = Vec::new();
    let mut resources = HashMap::new();
    let mut owners: HashMap<String, String> = HashMap::new();

    for pack in loaded {
        diagnostics.extend(pack.diagnostics);

        for track in pack.tracks {
            if let Some(existing_pack) = owners.get(&track.track_key) {
                let diagnostic = CatalogError::ResourceIdCollision {
                    pack: track.owner_pack_id.clone(),
                    file: track.source_file.clone(),
                    track_key: track.track_key.clone(),
                    existing_pack: existing_pack.clone(),
                };
                tracing::warn!("{}", diagnostic);
                diagnostics.push(diagnostic);
                continue;
            }

            owners.insert(track.track_key.clone(), track.owner_pack_id.clone());
            resources.insert(
                track.resource_id.clone(),
                ResourceEntry {
                    pack_id: track.owner_pack_id.clone(),
                    entry_path: pack.source.asset_path(&track.audio_rel_path),
                },
            );
            tracks.push(Arc::new(track));
        }

        packs.push(pack.source);
    }

    // Stable: equal priorities keep discovery order.
    tracks.sort_by(|a, b| b.priority.cmp(&a.priority));

    let track_keys = tracks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.track_key.clone(), i))
        .collect();

    CatalogGeneration {
        packs,
        tracks,
        resources,
        track_keys,
    }
}
