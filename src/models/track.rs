use crate::models::resource_key::{ResourceKey, ResourceKeyError, sanitize_id, sanitize_key};
use crate::models::world::WeatherClass;
use serde::Deserialize;
use std::collections::BTreeSet;
use thiserror::Error;

/// Extension assumed when a music path has none.
pub const DEFAULT_AUDIO_EXTENSION: &str = "ogg";

/// Reasons a rule file is rejected at load time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("'music' is missing or empty")]
    MissingMusic,

    #[error("invalid music path '{0}'")]
    InvalidMusicPath(String),

    #[error("invalid identifier in '{field}': {source}")]
    InvalidIdentifier {
        field: &'static str,
        source: ResourceKeyError,
    },

    #[error("min_y ({min}) is greater than max_y ({max})")]
    AltitudeBounds { min: f64, max: f64 },

    #[error("altitude bound in '{0}' is not a finite number")]
    NonFiniteAltitude(&'static str),

    #[error("unknown weather '{0}' (expected clear, rain or thunder)")]
    UnknownWeather(String),

    #[error("'gui_screen' is empty")]
    EmptyGuiScreen,

    #[error("entity conditions need a finite radius greater than 0")]
    InvalidEntityRadius,

    #[error("'{0}' must not be negative")]
    NegativeCount(&'static str),

    #[error("min_count ({min}) is greater than max_count ({max})")]
    CountBounds { min: u32, max: u32 },
}

/// A rule file exactly as written in `assets/<ns>/conditions/**/*.json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RuleDocument {
    pub priority: i32,
    pub music: Option<String>,
    pub biomes: Option<Vec<String>>,
    pub min_y: Option<f64>,
    pub max_y: Option<f64>,
    pub is_night: Option<bool>,
    pub is_combat: Option<bool>,
    pub is_village: Option<bool>,
    pub gui_screen: Option<String>,
    pub weather: Option<Vec<String>>,
    pub dimensions: Option<Vec<String>>,
    pub entity_conditions: Option<Vec<String>>,
    pub radius: Option<f64>,
    pub min_count: Option<i64>,
    pub max_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BiomeMatcher {
    Id(ResourceKey),
    Tag(ResourceKey),
}

/// Inclusive altitude bounds; either side may be open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AltitudeRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl AltitudeRange {
    pub fn contains(&self, y: f64) -> bool {
        self.min.is_none_or(|min| y >= min) && self.max.is_none_or(|max| y <= max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuiCategory {
    Crafting,
    Inventory,
    Furnace,
    BrewingStand,
    /// Plain containers and shulker boxes.
    Chest,
    Creative,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuiRequirement {
    NoScreen,
    Category(GuiCategory),
    /// Exact class name or case-insensitive simple name of an unrecognized screen.
    Named(String),
}

impl GuiRequirement {
    pub fn parse(raw: &str) -> Result<Self, RuleError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RuleError::EmptyGuiScreen);
        }
        let requirement = match trimmed.to_ascii_lowercase().as_str() {
            "none" | "null" => Self::NoScreen,
            "crafting" => Self::Category(GuiCategory::Crafting),
            "inventory" => Self::Category(GuiCategory::Inventory),
            "furnace" => Self::Category(GuiCategory::Furnace),
            "brewing_stand" => Self::Category(GuiCategory::BrewingStand),
            "chest" => Self::Category(GuiCategory::Chest),
            "creative" => Self::Category(GuiCategory::Creative),
            _ => Self::Named(trimmed.to_string()),
        };
        Ok(requirement)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityMatcher {
    Type(ResourceKey),
    Tag(ResourceKey),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityPredicate {
    pub includes: Vec<EntityMatcher>,
    pub excludes: Vec<EntityMatcher>,
    pub radius: f64,
    pub min_count: u32,
    pub max_count: Option<u32>,
}

/// Validated predicates of one track. `None` / empty means "not constrained".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicates {
    pub biomes: Vec<BiomeMatcher>,
    pub altitude: Option<AltitudeRange>,
    pub is_night: Option<bool>,
    pub is_combat: Option<bool>,
    pub is_village: Option<bool>,
    pub gui: Option<GuiRequirement>,
    pub weather: BTreeSet<WeatherClass>,
    pub dimensions: Vec<ResourceKey>,
    pub entity: Option<EntityPredicate>,
}

/// One loaded, validated rule bound to its audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackDefinition {
    pub priority: i32,
    /// Audio path relative to `assets/<ns>/`.
    pub audio_rel_path: String,
    pub predicates: Predicates,
    pub track_key: String,
    pub resource_id: ResourceKey,
    pub owner_pack_id: String,
    /// Rule file path inside the pack, for diagnostics.
    pub source_file: String,
}

impl TrackDefinition {
    /// Radius the entity scan must cover for this definition, if it has an entity predicate.
    pub fn required_entity_radius(&self) -> Option<f64> {
        self.predicates.entity.as_ref().map(|e| e.radius)
    }
}

/// A rule document after validation, before it is bound to a pack.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRule {
    pub priority: i32,
    pub music_path: String,
    pub predicates: Predicates,
}

impl RuleDocument {
    pub fn validate(self) -> Result<ValidatedRule, RuleError> {
        let music = self
            .music
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .ok_or(RuleError::MissingMusic)?;
        let music_path = normalize_music_path(music)?;

        let biomes = self
            .biomes
            .unwrap_or_default()
            .iter()
            .map(|raw| match raw.trim().strip_prefix('#') {
                Some(tag) => parse_key("biomes", tag).map(BiomeMatcher::Tag),
                None => parse_key("biomes", raw).map(BiomeMatcher::Id),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let altitude = validate_altitude(self.min_y, self.max_y)?;

        let gui = self
            .gui_screen
            .as_deref()
            .map(GuiRequirement::parse)
            .transpose()?;

        let weather = self
            .weather
            .unwrap_or_default()
            .iter()
            .map(|raw| {
                raw.parse::<WeatherClass>()
                    .map_err(|_| RuleError::UnknownWeather(raw.clone()))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        let dimensions = self
            .dimensions
            .unwrap_or_default()
            .iter()
            .map(|raw| parse_key("dimensions", raw))
            .collect::<Result<Vec<_>, _>>()?;

        let entity = validate_entity(
            self.entity_conditions,
            self.radius,
            self.min_count,
            self.max_count,
        )?;

        Ok(ValidatedRule {
            priority: self.priority,
            music_path,
            predicates: Predicates {
                biomes,
                altitude,
                is_night: self.is_night,
                is_combat: self.is_combat,
                is_village: self.is_village,
                gui,
                weather,
                dimensions,
                entity,
            },
        })
    }
}

fn parse_key(field: &'static str, raw: &str) -> Result<ResourceKey, RuleError> {
    ResourceKey::parse(raw).map_err(|source| RuleError::InvalidIdentifier { field, source })
}

fn validate_altitude(
    min_y: Option<f64>,
    max_y: Option<f64>,
) -> Result<Option<AltitudeRange>, RuleError> {
    if min_y.is_some_and(|v| !v.is_finite()) {
        return Err(RuleError::NonFiniteAltitude("min_y"));
    }
    if max_y.is_some_and(|v| !v.is_finite()) {
        return Err(RuleError::NonFiniteAltitude("max_y"));
    }
    match (min_y, max_y) {
        (None, None) => Ok(None),
        (Some(min), Some(max)) if min > max => Err(RuleError::AltitudeBounds { min, max }),
        (min, max) => Ok(Some(AltitudeRange { min, max })),
    }
}

fn validate_entity(
    conditions: Option<Vec<String>>,
    radius: Option<f64>,
    min_count: Option<i64>,
    max_count: Option<i64>,
) -> Result<Option<EntityPredicate>, RuleError> {
    if conditions.is_none() && radius.is_none() && min_count.is_none() && max_count.is_none() {
        return Ok(None);
    }

    let radius = radius
        .filter(|r| r.is_finite() && *r > 0.0)
        .ok_or(RuleError::InvalidEntityRadius)?;

    let min_count = match min_count {
        Some(v) if v < 0 => return Err(RuleError::NegativeCount("min_count")),
        Some(v) => u32::try_from(v).unwrap_or(u32::MAX),
        None => 0,
    };
    let max_count = match max_count {
        Some(v) if v < 0 => return Err(RuleError::NegativeCount("max_count")),
        Some(v) => Some(u32::try_from(v).unwrap_or(u32::MAX)),
        None => None,
    };
    if let Some(max) = max_count {
        if min_count > max {
            return Err(RuleError::CountBounds {
                min: min_count,
                max,
            });
        }
    }

    let mut includes = Vec::new();
    let mut excludes = Vec::new();
    for raw in conditions.unwrap_or_default() {
        let trimmed = raw.trim();
        let (negated, rest) = match trimmed.strip_prefix('!') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, trimmed),
        };
        let matcher = match rest.strip_prefix('#') {
            Some(tag) => EntityMatcher::Tag(parse_key("entity_conditions", tag)?),
            None => EntityMatcher::Type(parse_key("entity_conditions", rest)?),
        };
        if negated {
            excludes.push(matcher);
        } else {
            includes.push(matcher);
        }
    }

    Ok(Some(EntityPredicate {
        includes,
        excludes,
        radius,
        min_count,
        max_count,
    }))
}

/// Normalize a pack-relative music path: strip one leading separator, use `/`,
/// and refuse empty, `.` or `..` segments.
pub fn normalize_music_path(raw: &str) -> Result<String, RuleError> {
    let unified = raw.trim().replace('\\', "/");
    let stripped = unified.strip_prefix('/').unwrap_or(&unified);
    if stripped.is_empty() {
        return Err(RuleError::InvalidMusicPath(raw.to_string()));
    }
    for segment in stripped.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(RuleError::InvalidMusicPath(raw.to_string()));
        }
    }
    Ok(stripped.to_string())
}

/// `sanitize(namespace + "/" + path-without-extension)`.
pub fn derive_track_key(namespace: &str, music_path: &str) -> String {
    let (stem, _) = split_extension(music_path);
    sanitize_key(&format!("{}/{}", namespace, stem))
}

/// `<reserved>:sounds/<track_key>.<ext>`.
pub fn derive_resource_id(
    reserved_namespace: &str,
    track_key: &str,
    music_path: &str,
) -> Result<ResourceKey, ResourceKeyError> {
    let extension = match split_extension(music_path).1 {
        Some(ext) => sanitize_id(ext),
        None => DEFAULT_AUDIO_EXTENSION.to_string(),
    };
    ResourceKey::new(
        reserved_namespace,
        &format!("sounds/{}.{}", track_key, extension),
    )
}

/// Split the extension off the last path segment. Dotfiles have no extension.
fn split_extension(path: &str) -> (&str, Option<&str>) {
    let segment_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[segment_start..].rfind('.') {
        Some(dot) if dot > 0 && segment_start + dot + 1 < path.len() => {
            let split = segment_start + dot;
            (&path[..split], Some(&path[split + 1..]))
        }
        _ => (path, None),
    }
}
