//! Data models shared by the catalog, evaluator, selector and provider.
//!
//! - [`ResourceKey`]: `namespace:path` identifiers for biomes, dimensions, entity types and tags
//! - [`TrackDefinition`]: one validated rule file bound to its audio resource
//! - [`WorldStateSnapshot`]: the per-tick view of the world the evaluator matches against
//! - [`PackMetadata`]: parsed `pack.mcmeta`
//! - [`Settings`]: user settings from `soundscape.yaml`
//!
//! Rule documents are deserialized into [`RuleDocument`] and validated into
//! [`Predicates`] before any evaluation happens, so the evaluator never sees a
//! malformed identifier or an inverted range.

pub mod config;
pub mod pack;
pub mod resource_key;
pub mod track;
pub mod world;

pub use config::{HeuristicSettings, Settings};
pub use pack::{PACK_ICON_FILE, PACK_METADATA_FILE, PackMetadata, pack_id_from_file_name};
pub use resource_key::{DEFAULT_NAMESPACE, ResourceKey, ResourceKeyError};
pub use track::{
    AltitudeRange, BiomeMatcher, EntityMatcher, EntityPredicate, GuiCategory, GuiRequirement,
    Predicates, RuleDocument, RuleError, TrackDefinition, ValidatedRule,
};
pub use world::{
    BiomeSample, EntityId, EntityObservation, EntityScan, OpenScreen, ScreenKind, WeatherClass,
    WorldStateSnapshot,
};
