//! Loading of a single pack: metadata, namespace detection and rule files.

use super::PackSource;
use super::error::CatalogError;
use super::storage::PackStorage;
use crate::models::resource_key::is_valid_namespace;
use crate::models::track::{derive_resource_id, derive_track_key};
use crate::models::{
    PACK_ICON_FILE, PACK_METADATA_FILE, PackMetadata, RuleDocument, TrackDefinition,
};
use std::sync::Arc;

/// Result of loading one pack, before cross-pack registration.
#[derive(Debug)]
pub struct LoadedPack {
    pub source: Arc<PackSource>,
    pub tracks: Vec<TrackDefinition>,
    pub diagnostics: Vec<CatalogError>,
}

/// Identity of a pack root entry, resolved before its storage is opened.
#[derive(Debug, Clone)]
pub struct PackIdentity {
    pub id: String,
    pub display_name: String,
    pub is_archive: bool,
}

/// Load one pack. An `Err` means the whole pack is skipped; per-rule
/// problems end up in [`LoadedPack::diagnostics`].
pub fn load_pack(
    identity: PackIdentity,
    storage: Arc<dyn PackStorage>,
    reserved_namespace: &str,
) -> Result<LoadedPack, CatalogError> {
    let pack = identity.id.clone();
    let config_error = |message: String| CatalogError::Config {
        pack: pack.clone(),
        message,
    };

    if !storage.exists(PACK_METADATA_FILE) {
        return Err(config_error(format!("missing {}", PACK_METADATA_FILE)));
    }
    let metadata_bytes = storage
        .read_entry(PACK_METADATA_FILE)
        .map_err(|e| CatalogError::Io {
            pack: pack.clone(),
            message: format!("reading {}: {}", PACK_METADATA_FILE, e),
        })?;
    let metadata = PackMetadata::parse(&metadata_bytes, &pack)
        .map_err(|e| config_error(format!("invalid {}: {}", PACK_METADATA_FILE, e)))?;

    let namespace = detect_namespace(storage.as_ref(), &pack)?;

    let icon_entry = storage
        .exists(PACK_ICON_FILE)
        .then(|| PACK_ICON_FILE.to_string());

    let source = Arc::new(PackSource {
        id: identity.id,
        display_name: identity.display_name,
        description: metadata.description,
        namespace,
        pack_format: metadata.pack_format,
        is_archive: identity.is_archive,
        icon_entry,
        storage,
    });

    let (tracks, diagnostics) = load_rules(&source, reserved_namespace)?;

    tracing::info!(
        "Loaded pack '{}' ({}): namespace={}, format={}, {} track(s), {} skipped",
        source.id,
        source.storage.label(),
        source.namespace,
        source.pack_format,
        tracks.len(),
        diagnostics.len()
    );

    Ok(LoadedPack {
        source,
        tracks,
        diagnostics,
    })
}

fn detect_namespace(storage: &dyn PackStorage, pack: &str) -> Result<String, CatalogError> {
    let candidates = storage
        .child_directories("assets")
        .map_err(|e| CatalogError::Io {
            pack: pack.to_string(),
            message: format!("listing assets/: {}", e),
        })?;

    match candidates.as_slice() {
        [namespace] if is_valid_namespace(namespace) => Ok(namespace.clone()),
        [namespace] => Err(CatalogError::Config {
            pack: pack.to_string(),
            message: format!(
                "asset namespace '{}' is invalid (allowed: a-z 0-9 _ . -)",
                namespace
            ),
        }),
        [] => Err(CatalogError::Config {
            pack: pack.to_string(),
            message: "no namespace directory under assets/".to_string(),
        }),
        many => Err(CatalogError::Config {
            pack: pack.to_string(),
            message: format!(
                "expected exactly one namespace under assets/, found {}",
                many.join(", ")
            ),
        }),
    }
}

fn load_rules(
    source: &PackSource,
    reserved_namespace: &str,
) -> Result<(Vec<TrackDefinition>, Vec<CatalogError>), CatalogError> {
    let conditions_dir = format!("assets/{}/conditions", source.namespace);
    let rule_files = source
        .storage
        .list_entries(&conditions_dir)
        .map_err(|e| CatalogError::Io {
            pack: source.id.clone(),
            message: format!("listing {}: {}", conditions_dir, e),
        })?;

    let mut tracks = Vec::new();
    let mut diagnostics = Vec::new();

    for file in rule_files.iter().filter(|f| is_json(f)) {
        match load_rule(source, file, reserved_namespace) {
            Ok(track) => {
                tracing::debug!(
                    "  {} -> {} (priority {})",
                    file,
                    track.track_key,
                    track.priority
                );
                tracks.push(track);
            }
            Err(diagnostic) => {
                tracing::warn!("{}", diagnostic);
                diagnostics.push(diagnostic);
            }
        }
    }

    if rule_files.is_empty() {
        tracing::warn!("Pack '{}' has no rule files under {}", source.id, conditions_dir);
    }

    Ok((tracks, diagnostics))
}

fn load_rule(
    source: &PackSource,
    file: &str,
    reserved_namespace: &str,
) -> Result<TrackDefinition, CatalogError> {
    let definition_error = |reason: String| CatalogError::Definition {
        pack: source.id.clone(),
        file: file.to_string(),
        reason,
    };

    let bytes = source
        .storage
        .read_entry(file)
        .map_err(|e| definition_error(format!("read failed: {}", e)))?;
    let document: RuleDocument = serde_json::from_slice(&bytes)
        .map_err(|e| definition_error(format!("invalid JSON: {}", e)))?;
    let rule = document
        .validate()
        .map_err(|e| definition_error(e.to_string()))?;

    let audio_entry = source.asset_path(&rule.music_path);
    if !source.storage.exists(&audio_entry) {
        return Err(CatalogError::ResourceMissing {
            pack: source.id.clone(),
            file: file.to_string(),
            audio: audio_entry,
        });
    }

    let track_key = derive_track_key(&source.namespace, &rule.music_path);
    let resource_id = derive_resource_id(reserved_namespace, &track_key, &rule.music_path)
        .map_err(|e| definition_error(format!("cannot derive resource id: {}", e)))?;

    Ok(TrackDefinition {
        priority: rule.priority,
        audio_rel_path: rule.music_path,
        predicates: rule.predicates,
        track_key,
        resource_id,
        owner_pack_id: source.id.clone(),
        source_file: file.to_string(),
    })
}

fn is_json(path: &str) -> bool {
    path.rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("json"))
}
