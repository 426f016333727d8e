//! Shared fixtures for integration tests: pack builders (directory and zip),
//! a scriptable world and a recording audio host.

#![allow(dead_code)]

use camino::{Utf8Path, Utf8PathBuf};
use soundscape::catalog::{ActivationStore, PackCatalog};
use soundscape::evaluator::{Position, WorldView};
use soundscape::models::{
    BiomeSample, EntityId, EntityObservation, OpenScreen, ResourceKey,
};
use soundscape::selector::{AudioHost, AudioHostError, PlaybackHandle};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use tempfile::TempDir;

pub const NAMESPACE: &str = "soundscape";

pub fn key(raw: &str) -> ResourceKey {
    ResourceKey::parse(raw).unwrap()
}

/// Temp directory with a UTF-8 path. Keep the `TempDir` alive for the test.
pub fn utf8_temp() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, path)
}

/// Pack root + activation file inside one temp dir.
pub struct Workspace {
    _temp: TempDir,
    pub root: Utf8PathBuf,
    pub pack_root: Utf8PathBuf,
    pub activation_path: Utf8PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let (temp, root) = utf8_temp();
        let pack_root = root.join("soundpacks");
        fs::create_dir_all(&pack_root).unwrap();
        Self {
            _temp: temp,
            activation_path: root.join("active_packs.json"),
            pack_root,
            root,
        }
    }

    pub fn catalog(&self) -> PackCatalog {
        PackCatalog::new(
            &self.pack_root,
            ActivationStore::new(&self.activation_path),
            NAMESPACE,
        )
    }

    pub fn read_activation(&self) -> Vec<String> {
        serde_json::from_str(&fs::read_to_string(&self.activation_path).unwrap()).unwrap()
    }

    pub fn write_activation(&self, ids: &[&str]) {
        fs::write(&self.activation_path, serde_json::to_string(ids).unwrap()).unwrap();
    }
}

/// In-memory pack description written out as a directory or a zip archive.
#[derive(Clone)]
pub struct PackBuilder {
    files: Vec<(String, Vec<u8>)>,
}

impl PackBuilder {
    /// A pack with a valid `pack.mcmeta` and an empty `assets/<namespace>/` tree.
    pub fn new(namespace: &str) -> Self {
        Self::bare()
            .metadata(r#"{"pack": {"description": "Test pack", "pack_format": 15}}"#)
            .file(&format!("assets/{}/.keep", namespace), b"")
    }

    /// No files at all.
    pub fn bare() -> Self {
        Self { files: Vec::new() }
    }

    pub fn file(mut self, path: &str, bytes: &[u8]) -> Self {
        self.files.retain(|(p, _)| p != path);
        self.files.push((path.to_string(), bytes.to_vec()));
        self
    }

    pub fn metadata(self, json: &str) -> Self {
        self.file("pack.mcmeta", json.as_bytes())
    }

    pub fn rule(self, namespace: &str, name: &str, json: &str) -> Self {
        self.file(
            &format!("assets/{}/conditions/{}", namespace, name),
            json.as_bytes(),
        )
    }

    /// Audio file whose content is its own path, so tests can check which bytes came back.
    pub fn audio(self, namespace: &str, relative: &str) -> Self {
        let path = format!("assets/{}/{}", namespace, relative);
        let bytes = format!("audio:{}", path).into_bytes();
        self.file(&path, &bytes)
    }

    pub fn icon(self, bytes: &[u8]) -> Self {
        self.file("pack.png", bytes)
    }

    pub fn write_dir(&self, pack_root: &Utf8Path, name: &str) -> Utf8PathBuf {
        let dir = pack_root.join(name);
        for (path, bytes) in &self.files {
            let full = dir.join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(&full, bytes).unwrap();
        }
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub fn write_zip(&self, pack_root: &Utf8Path, file_name: &str) -> Utf8PathBuf {
        let path = pack_root.join(file_name);
        fs::write(&path, stored_zip(&self.files)).unwrap();
        path
    }
}

/// Minimal STORE-method zip archive.
pub fn stored_zip(files: &[(String, Vec<u8>)]) -> Vec<u8> {
    const DOS_DATE_1980_01_01: u16 = 33;

    let mut out = Vec::new();
    let mut central = Vec::new();

    for (name, data) in files {
        let mut crc = flate2::Crc::new();
        crc.update(data);
        let crc = crc.sum();
        let offset = out.len() as u32;

        out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes()); // version needed
        out.extend_from_slice(&0u16.to_le_bytes()); // flags
        out.extend_from_slice(&0u16.to_le_bytes()); // stored
        out.extend_from_slice(&0u16.to_le_bytes()); // time
        out.extend_from_slice(&DOS_DATE_1980_01_01.to_le_bytes());
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes()); // extra
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(data);

        central.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes()); // made by
        central.extend_from_slice(&20u16.to_le_bytes()); // needed
        central.extend_from_slice(&0u16.to_le_bytes()); // flags
        central.extend_from_slice(&0u16.to_le_bytes()); // stored
        central.extend_from_slice(&0u16.to_le_bytes()); // time
        central.extend_from_slice(&DOS_DATE_1980_01_01.to_le_bytes());
        central.extend_from_slice(&crc.to_le_bytes());
        central.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes()); // extra
        central.extend_from_slice(&0u16.to_le_bytes()); // comment
        central.extend_from_slice(&0u16.to_le_bytes()); // disk
        central.extend_from_slice(&0u16.to_le_bytes()); // internal attrs
        central.extend_from_slice(&0u32.to_le_bytes()); // external attrs
        central.extend_from_slice(&offset.to_le_bytes());
        central.extend_from_slice(name.as_bytes());
    }

    let central_offset = out.len() as u32;
    let central_size = central.len() as u32;
    out.extend_from_slice(&central);

    out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // disk
    out.extend_from_slice(&0u16.to_le_bytes()); // central directory disk
    out.extend_from_slice(&(files.len() as u16).to_le_bytes());
    out.extend_from_slice(&(files.len() as u16).to_le_bytes());
    out.extend_from_slice(&central_size.to_le_bytes());
    out.extend_from_slice(&central_offset.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes()); // comment
    out
}

/// Scriptable [`WorldView`].
#[derive(Debug, Clone)]
pub struct FakeWorld {
    pub present: bool,
    pub y: f64,
    pub day_time: i64,
    pub raining: bool,
    pub thundering: bool,
    pub biome: Option<BiomeSample>,
    pub dimension: Option<ResourceKey>,
    pub screen: Option<OpenScreen>,
    pub entities: HashMap<EntityId, EntityObservation>,
    pub blocks: BTreeSet<ResourceKey>,
}

impl Default for FakeWorld {
    fn default() -> Self {
        Self {
            present: true,
            y: 64.0,
            day_time: 1000,
            raining: false,
            thundering: false,
            biome: Some(BiomeSample::new(key("minecraft:plains"))),
            dimension: Some(key("minecraft:overworld")),
            screen: None,
            entities: HashMap::new(),
            blocks: BTreeSet::new(),
        }
    }
}

impl FakeWorld {
    pub fn add_entity(&mut self, entity: EntityObservation) {
        self.entities.insert(entity.id, entity);
    }

    pub fn hostile(id: EntityId, distance: f64) -> EntityObservation {
        let mut entity = EntityObservation::new(id, key("minecraft:zombie"), distance);
        entity.aggressive = true;
        entity
    }
}

impl WorldView for FakeWorld {
    fn player_position(&self) -> Option<Position> {
        self.present.then_some(Position {
            x: 0.0,
            y: self.y,
            z: 0.0,
        })
    }

    fn day_time(&self) -> i64 {
        self.day_time
    }

    fn is_raining(&self) -> bool {
        self.raining
    }

    fn is_thundering(&self) -> bool {
        self.thundering
    }

    fn biome(&self) -> Option<BiomeSample> {
        self.biome.clone()
    }

    fn dimension(&self) -> Option<ResourceKey> {
        self.dimension.clone()
    }

    fn open_screen(&self) -> Option<OpenScreen> {
        self.screen.clone()
    }

    fn entities_within(&self, radius: f64) -> Vec<EntityObservation> {
        let mut found: Vec<_> = self
            .entities
            .values()
            .filter(|e| e.distance <= radius)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.id);
        found
    }

    fn entity(&self, id: EntityId) -> Option<EntityObservation> {
        self.entities.get(&id).cloned()
    }

    fn find_block(&self, block: &ResourceKey, _horizontal: f64, _vertical: f64) -> bool {
        self.blocks.contains(block)
    }
}

/// [`AudioHost`] that records every call. Started sounds stay active until
/// stopped or [`finish`](Self::finish)ed.
#[derive(Debug, Default)]
pub struct RecordingHost {
    next_handle: u64,
    pub active: HashMap<PlaybackHandle, ResourceKey>,
    pub started: Vec<ResourceKey>,
    pub stopped: Vec<PlaybackHandle>,
    pub fail_starts: bool,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            next_handle: 100,
            ..Default::default()
        }
    }

    /// Simulate a sound reaching its end.
    pub fn finish(&mut self, handle: PlaybackHandle) {
        self.active.remove(&handle);
    }

    /// Simulate an externally started sound.
    pub fn external(&mut self, location: &str) -> PlaybackHandle {
        self.next_handle += 1;
        let handle = PlaybackHandle(self.next_handle);
        self.active.insert(handle, key(location));
        handle
    }

    pub fn playing(&self) -> Vec<String> {
        let mut playing: Vec<String> = self.active.values().map(|k| k.to_string()).collect();
        playing.sort();
        playing
    }

    pub fn started_paths(&self) -> Vec<String> {
        self.started.iter().map(|k| k.path().to_string()).collect()
    }
}

impl AudioHost for RecordingHost {
    fn start(&mut self, resource: &ResourceKey) -> Result<PlaybackHandle, AudioHostError> {
        if self.fail_starts {
            return Err(AudioHostError::Unavailable("test host refuses".to_string()));
        }
        self.next_handle += 1;
        let handle = PlaybackHandle(self.next_handle);
        self.active.insert(handle, resource.clone());
        self.started.push(resource.clone());
        Ok(handle)
    }

    fn stop(&mut self, handle: PlaybackHandle) {
        self.active.remove(&handle);
        self.stopped.push(handle);
    }

    fn is_active(&self, handle: PlaybackHandle) -> bool {
        self.active.contains_key(&handle)
    }
}
