use crate::models::ResourceKey;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Host-assigned runtime id of an entity.
pub type EntityId = i32;

/// Current biome and the biome tags it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BiomeSample {
    pub id: ResourceKey,
    pub tags: BTreeSet<ResourceKey>,
}

impl BiomeSample {
    pub fn new(id: ResourceKey) -> Self {
        Self {
            id,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_tag(mut self, tag: ResourceKey) -> Self {
        self.tags.insert(tag);
        self
    }

    /// The placeholder biome reported while chunks are still loading.
    pub fn is_empty_placeholder(&self) -> bool {
        self.id.namespace() == "minecraft" && self.id.path() == "empty"
    }
}

/// Screen categories with dedicated rule names.
///
/// Anything else is [`ScreenKind::Other`] and is matched by name only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenKind {
    Crafting,
    Inventory,
    Furnace,
    BrewingStand,
    Container,
    ShulkerBox,
    Creative,
    Other,
}

impl ScreenKind {
    /// Resolve a host screen's simple class name to a category.
    pub fn from_simple_name(simple_name: &str) -> Self {
        match simple_name {
            "CraftingScreen" => Self::Crafting,
            "InventoryScreen" => Self::Inventory,
            "FurnaceScreen" => Self::Furnace,
            "BrewingStandScreen" => Self::BrewingStand,
            "ContainerScreen" => Self::Container,
            "ShulkerBoxScreen" => Self::ShulkerBox,
            "CreativeModeInventoryScreen" => Self::Creative,
            _ => Self::Other,
        }
    }
}

/// The GUI screen the player currently has open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenScreen {
    pub kind: ScreenKind,
    pub class_name: String,
    pub simple_name: String,
}

impl OpenScreen {
    /// Build from a fully qualified host class name such as
    /// `net.minecraft.client.gui.screens.inventory.CraftingScreen`.
    pub fn from_class_name(class_name: &str) -> Self {
        let simple_name = class_name
            .rsplit(['.', '$'])
            .next()
            .unwrap_or(class_name)
            .to_string();
        Self {
            kind: ScreenKind::from_simple_name(&simple_name),
            class_name: class_name.to_string(),
            simple_name,
        }
    }
}

/// Exactly one of these describes the weather at any moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WeatherClass {
    Clear,
    Rain,
    Thunder,
}

impl WeatherClass {
    /// Thunder wins over rain; no rain and no thunder is clear.
    pub fn classify(is_raining: bool, is_thundering: bool) -> Self {
        if is_thundering {
            Self::Thunder
        } else if is_raining {
            Self::Rain
        } else {
            Self::Clear
        }
    }
}

impl FromStr for WeatherClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clear" => Ok(Self::Clear),
            "rain" => Ok(Self::Rain),
            "thunder" => Ok(Self::Thunder),
            other => Err(format!("unknown weather '{}'", other)),
        }
    }
}

impl fmt::Display for WeatherClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Clear => "clear",
            Self::Rain => "rain",
            Self::Thunder => "thunder",
        };
        f.write_str(name)
    }
}

/// One entity as reported by the host, relative to the player.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityObservation {
    pub id: EntityId,
    pub type_id: ResourceKey,
    pub type_tags: BTreeSet<ResourceKey>,
    /// Distance to the player in blocks.
    pub distance: f64,
    pub alive: bool,
    pub aggressive: bool,
    pub has_custom_name: bool,
    /// Type of the vehicle the entity is riding, if any.
    pub vehicle: Option<ResourceKey>,
}

impl EntityObservation {
    pub fn new(id: EntityId, type_id: ResourceKey, distance: f64) -> Self {
        Self {
            id,
            type_id,
            type_tags: BTreeSet::new(),
            distance,
            alive: true,
            aggressive: false,
            has_custom_name: false,
            vehicle: None,
        }
    }
}

/// Living entities gathered once per tick within `radius` of the player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityScan {
    pub radius: f64,
    pub entities: Vec<EntityObservation>,
}

/// Everything the condition evaluator looks at, sampled once per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldStateSnapshot {
    pub biome: Option<BiomeSample>,
    pub day_time: i64,
    pub is_night: bool,
    pub is_raining: bool,
    pub is_thundering: bool,
    pub altitude: f64,
    pub in_combat: bool,
    pub in_village: bool,
    pub screen: Option<OpenScreen>,
    pub dimension: Option<ResourceKey>,
    pub entity_scan: Option<EntityScan>,
}

impl WorldStateSnapshot {
    pub fn weather(&self) -> WeatherClass {
        WeatherClass::classify(self.is_raining, self.is_thundering)
    }
}

impl Default for WorldStateSnapshot {
    fn default() -> Self {
        Self {
            biome: None,
            day_time: 0,
            is_night: false,
            is_raining: false,
            is_thundering: false,
            altitude: 64.0,
            in_combat: false,
            in_village: false,
            screen: None,
            dimension: None,
            entity_scan: None,
        }
    }
}
