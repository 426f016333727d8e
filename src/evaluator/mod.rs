//! Predicate matching of one [`TrackDefinition`] against one [`WorldStateSnapshot`].
//!
//! Every present predicate must hold; absent predicates are vacuously true.
//! Evaluation is stateless. The stateful parts of building a snapshot (the
//! combat tracker, entity scanning) live in [`world`].

pub mod world;

pub use world::{CombatTracker, Position, WorldSampler, WorldView, is_night};

use crate::metrics::Metrics;
use crate::models::{
    BiomeMatcher, EntityMatcher, EntityObservation, EntityPredicate, GuiCategory, GuiRequirement,
    OpenScreen, ScreenKind, TrackDefinition, WorldStateSnapshot,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("altitude {0} is not a finite number")]
    NonFiniteAltitude(f64),

    #[error("no entity scan available ({required} block radius required)")]
    MissingEntityScan { required: f64 },

    #[error("entity scan covers {scanned} blocks, {required} required")]
    EntityScanTooSmall { scanned: f64, required: f64 },
}

/// Match with error reporting.
pub fn try_matches(
    definition: &TrackDefinition,
    state: &WorldStateSnapshot,
) -> Result<bool, EvaluationError> {
    let p = &definition.predicates;

    if !p.biomes.is_empty() && !biome_matches(&p.biomes, state) {
        return Ok(false);
    }

    if let Some(range) = &p.altitude {
        if !state.altitude.is_finite() {
            return Err(EvaluationError::NonFiniteAltitude(state.altitude));
        }
        if !range.contains(state.altitude) {
            return Ok(false);
        }
    }

    if p.is_night.is_some_and(|want| want != state.is_night)
        || p.is_combat.is_some_and(|want| want != state.in_combat)
        || p.is_village.is_some_and(|want| want != state.in_village)
    {
        return Ok(false);
    }

    if let Some(requirement) = &p.gui {
        if !gui_matches(requirement, state.screen.as_ref()) {
            return Ok(false);
        }
    }

    if !p.weather.is_empty() && !p.weather.contains(&state.weather()) {
        return Ok(false);
    }

    if !p.dimensions.is_empty()
        && !state
            .dimension
            .as_ref()
            .is_some_and(|d| p.dimensions.contains(d))
    {
        return Ok(false);
    }

    if let Some(entity) = &p.entity {
        return entity_matches(entity, state);
    }

    Ok(true)
}

/// Fail-safe match: an evaluation error is logged and counts as no match.
pub fn matches(definition: &TrackDefinition, state: &WorldStateSnapshot) -> bool {
    fail_safe(definition, state, None)
}

/// [`matches`], additionally counting evaluation errors in `metrics`.
pub fn matches_recorded(
    definition: &TrackDefinition,
    state: &WorldStateSnapshot,
    metrics: &Metrics,
) -> bool {
    fail_safe(definition, state, Some(metrics))
}

fn fail_safe(
    definition: &TrackDefinition,
    state: &WorldStateSnapshot,
    metrics: Option<&Metrics>,
) -> bool {
    match try_matches(definition, state) {
        Ok(matched) => matched,
        Err(e) => {
            if let Some(metrics) = metrics {
                metrics.record_evaluation_error();
            }
            tracing::warn!(
                "Evaluation of '{}' ({}) failed, treating as no match: {}",
                definition.track_key,
                definition.source_file,
                e
            );
            false
        }
    }
}

fn biome_matches(matchers: &[BiomeMatcher], state: &WorldStateSnapshot) -> bool {
    let Some(biome) = state.biome.as_ref().filter(|b| !b.is_empty_placeholder()) else {
        return false;
    };
    matchers.iter().any(|m| match m {
        BiomeMatcher::Id(id) => *id == biome.id,
        BiomeMatcher::Tag(tag) => biome.tags.contains(tag),
    })
}

fn gui_matches(requirement: &GuiRequirement, screen: Option<&OpenScreen>) -> bool {
    match (requirement, screen) {
        (GuiRequirement::NoScreen, screen) => screen.is_none(),
        (_, None) => false,
        (GuiRequirement::Category(category), Some(screen)) => matches!(
            (category, screen.kind),
            (GuiCategory::Crafting, ScreenKind::Crafting)
                | (GuiCategory::Inventory, ScreenKind::Inventory)
                | (GuiCategory::Furnace, ScreenKind::Furnace)
                | (GuiCategory::BrewingStand, ScreenKind::BrewingStand)
                | (GuiCategory::Chest, ScreenKind::Container)
                | (GuiCategory::Chest, ScreenKind::ShulkerBox)
                | (GuiCategory::Creative, ScreenKind::Creative)
        ),
        (GuiRequirement::Named(name), Some(screen)) => {
            screen.class_name == *name || screen.simple_name.eq_ignore_ascii_case(name)
        }
    }
}

fn entity_matcher_hits(matcher: &EntityMatcher, entity: &EntityObservation) -> bool {
    match matcher {
        EntityMatcher::Type(id) => entity.type_id == *id,
        EntityMatcher::Tag(tag) => entity.type_tags.contains(tag),
    }
}

fn entity_matches(
    predicate: &EntityPredicate,
    state: &WorldStateSnapshot,
) -> Result<bool, EvaluationError> {
    let scan = state
        .entity_scan
        .as_ref()
        .ok_or(EvaluationError::MissingEntityScan {
            required: predicate.radius,
        })?;
    if scan.radius < predicate.radius {
        return Err(EvaluationError::EntityScanTooSmall {
            scanned: scan.radius,
            required: predicate.radius,
        });
    }

    let count = scan
        .entities
        .iter()
        .filter(|e| e.alive && e.distance <= predicate.radius)
        .filter(|e| {
            predicate.includes.is_empty()
                || predicate.includes.iter().any(|m| entity_matcher_hits(m, e))
        })
        .filter(|e| !predicate.excludes.iter().any(|m| entity_matcher_hits(m, e)))
        .count();

    let count = u32::try_from(count).unwrap_or(u32::MAX);
    Ok(count >= predicate.min_count && predicate.max_count.is_none_or(|max| count <= max))
}
