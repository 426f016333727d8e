use serde::{Deserialize, Serialize};

/// User settings loaded from `soundscape.yaml`.
///
/// Every field has a default so a partial file (or no file at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory scanned for packs. Relative paths resolve against the config directory.
    pub pack_root: String,

    /// Yield to other music (e.g. another mod's soundtrack) instead of vetoing it.
    pub override_other_music: bool,

    /// Interval between selector ticks.
    pub tick_interval_ms: u64,

    /// Namespace reserved for the generated virtual pack.
    pub resource_namespace: String,

    /// `pack_format` reported in the virtual pack's root metadata.
    pub pack_format: u32,

    /// Description reported in the virtual pack's root metadata.
    pub pack_description: String,

    pub debug_mode: bool,

    pub heuristics: HeuristicSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pack_root: "soundpacks".to_string(),
            override_other_music: false,
            tick_interval_ms: 1000,
            resource_namespace: "soundscape".to_string(),
            pack_format: 15,
            pack_description: "Soundscape generated music".to_string(),
            debug_mode: false,
            heuristics: HeuristicSettings::default(),
        }
    }
}

/// Thresholds for the derived world flags (night, combat, village).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicSettings {
    pub day_length: i64,
    pub night_start: i64,
    pub night_end: i64,

    pub combat_radius: f64,
    /// Entities riding one of these are never counted as engaged.
    pub excluded_vehicles: Vec<String>,

    pub village_landmark_block: String,
    pub village_radius: f64,
    pub village_height: f64,
    pub village_entity_type: String,
    pub village_entity_threshold: usize,
}

impl Default for HeuristicSettings {
    fn default() -> Self {
        Self {
            day_length: 24000,
            night_start: 13000,
            night_end: 23000,
            combat_radius: 24.0,
            excluded_vehicles: [
                "minecraft:boat",
                "minecraft:chest_boat",
                "minecraft:minecart",
                "minecraft:chest_minecart",
                "minecraft:furnace_minecart",
                "minecraft:hopper_minecart",
                "minecraft:tnt_minecart",
                "minecraft:spawner_minecart",
                "minecraft:command_block_minecart",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            village_landmark_block: "minecraft:bell".to_string(),
            village_radius: 48.0,
            village_height: 10.0,
            village_entity_type: "minecraft:villager".to_string(),
            village_entity_threshold: 2,
        }
    }
}
