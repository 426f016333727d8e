//! The host world boundary and the per-tick snapshot builder.

use crate::models::{
    BiomeSample, EntityId, EntityObservation, EntityScan, HeuristicSettings, OpenScreen,
    ResourceKey, ResourceKeyError, WorldStateSnapshot,
};
use std::collections::{BTreeSet, HashSet};

/// Player position in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Read-only queries the host answers about the current world.
///
/// Entity distances are measured from the player.
pub trait WorldView {
    /// `None` while no world is loaded or the player does not exist.
    fn player_position(&self) -> Option<Position>;
    fn day_time(&self) -> i64;
    fn is_raining(&self) -> bool;
    fn is_thundering(&self) -> bool;
    fn biome(&self) -> Option<BiomeSample>;
    fn dimension(&self) -> Option<ResourceKey>;
    fn open_screen(&self) -> Option<OpenScreen>;
    /// Living entities within `radius` of the player, excluding the player.
    fn entities_within(&self, radius: f64) -> Vec<EntityObservation>;
    /// Current state of a specific entity; `None` once it has despawned.
    fn entity(&self, id: EntityId) -> Option<EntityObservation>;
    /// Whether `block` exists within `±horizontal` / `±vertical` of the player.
    fn find_block(&self, block: &ResourceKey, horizontal: f64, vertical: f64) -> bool;
}

/// `day_time mod day_length ∈ [night_start, night_end)`.
pub fn is_night(day_time: i64, heuristics: &HeuristicSettings) -> bool {
    if heuristics.day_length <= 0 {
        return false;
    }
    let time_of_day = day_time.rem_euclid(heuristics.day_length);
    time_of_day >= heuristics.night_start && time_of_day < heuristics.night_end
}

/// Set of hostile entities currently engaging the player.
///
/// An entity joins the set while it is alive, aggressive, unnamed, not riding
/// an excluded vehicle and within the combat radius. It stays in the set
/// (even if it stops being aggressive) until it dies, despawns, gets a
/// custom name, boards an excluded vehicle or leaves the radius.
#[derive(Debug, Clone)]
pub struct CombatTracker {
    radius: f64,
    excluded_vehicles: HashSet<ResourceKey>,
    engaged: BTreeSet<EntityId>,
}

impl CombatTracker {
    pub fn new(radius: f64, excluded_vehicles: HashSet<ResourceKey>) -> Self {
        Self {
            radius,
            excluded_vehicles,
            engaged: BTreeSet::new(),
        }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn in_combat(&self) -> bool {
        !self.engaged.is_empty()
    }

    pub fn engaged(&self) -> &BTreeSet<EntityId> {
        &self.engaged
    }

    pub fn clear(&mut self) {
        if !self.engaged.is_empty() {
            tracing::debug!("Combat tracker cleared ({} entities)", self.engaged.len());
        }
        self.engaged.clear();
    }

    fn rides_excluded_vehicle(&self, entity: &EntityObservation) -> bool {
        entity
            .vehicle
            .as_ref()
            .is_some_and(|v| self.excluded_vehicles.contains(v))
    }

    fn still_engaged(&self, entity: &EntityObservation) -> bool {
        entity.alive
            && !entity.has_custom_name
            && entity.distance <= self.radius
            && !self.rides_excluded_vehicle(entity)
    }

    /// Add newly engaged entities from `nearby`, then prune stale ids.
    pub fn update(&mut self, world: &dyn WorldView, nearby: &[EntityObservation]) {
        let was_in_combat = self.in_combat();

        for entity in nearby {
            if entity.aggressive && self.still_engaged(entity) {
                self.engaged.insert(entity.id);
            }
        }

        let stale: Vec<EntityId> = self
            .engaged
            .iter()
            .copied()
            .filter(|&id| !world.entity(id).is_some_and(|e| self.still_engaged(&e)))
            .collect();
        for id in stale {
            self.engaged.remove(&id);
        }

        if was_in_combat != self.in_combat() {
            tracing::debug!(
                "Combat state changed: in_combat={} ({} engaged)",
                self.in_combat(),
                self.engaged.len()
            );
        }
    }
}

/// Builds one [`WorldStateSnapshot`] per tick and owns the combat tracker.
#[derive(Debug, Clone)]
pub struct WorldSampler {
    heuristics: HeuristicSettings,
    landmark_block: ResourceKey,
    social_entity: ResourceKey,
    combat: CombatTracker,
}

impl WorldSampler {
    pub fn new(heuristics: &HeuristicSettings) -> Result<Self, ResourceKeyError> {
        let landmark_block = ResourceKey::parse(&heuristics.village_landmark_block)?;
        let social_entity = ResourceKey::parse(&heuristics.village_entity_type)?;
        let excluded_vehicles = heuristics
            .excluded_vehicles
            .iter()
            .map(|raw| ResourceKey::parse(raw))
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(Self {
            heuristics: heuristics.clone(),
            landmark_block,
            social_entity,
            combat: CombatTracker::new(heuristics.combat_radius, excluded_vehicles),
        })
    }

    pub fn combat(&self) -> &CombatTracker {
        &self.combat
    }

    /// Sample the world. Returns `None` (and clears the combat tracker) when
    /// the player is unavailable.
    ///
    /// `scan_radius` is the largest entity radius any active definition
    /// needs; without one the snapshot carries no entity scan.
    pub fn sample(
        &mut self,
        world: &dyn WorldView,
        scan_radius: Option<f64>,
    ) -> Option<WorldStateSnapshot> {
        let Some(position) = world.player_position() else {
            self.combat.clear();
            return None;
        };

        let query_radius = [
            scan_radius.unwrap_or(0.0),
            self.heuristics.combat_radius,
            self.heuristics.village_radius,
        ]
        .into_iter()
        .fold(0.0_f64, f64::max);
        let nearby = world.entities_within(query_radius);

        self.combat.update(world, &nearby);
        let in_village = self.village_heuristic(world, &nearby);

        let entity_scan = scan_radius.map(|radius| EntityScan {
            radius,
            entities: nearby
                .iter()
                .filter(|e| e.distance <= radius)
                .cloned()
                .collect(),
        });

        let day_time = world.day_time();
        Some(WorldStateSnapshot {
            biome: world.biome(),
            day_time,
            is_night: is_night(day_time, &self.heuristics),
            is_raining: world.is_raining(),
            is_thundering: world.is_thundering(),
            altitude: position.y,
            in_combat: self.combat.in_combat(),
            in_village,
            screen: world.open_screen(),
            dimension: world.dimension(),
            entity_scan,
        })
    }

    /// A landmark block nearby, or enough living social entities within the radius.
    /// The block search runs first.
    pub fn village_heuristic(&self, world: &dyn WorldView, nearby: &[EntityObservation]) -> bool {
        if world.find_block(
            &self.landmark_block,
            self.heuristics.village_radius,
            self.heuristics.village_height,
        ) {
            return true;
        }

        let residents = nearby
            .iter()
            .filter(|e| {
                e.alive
                    && e.type_id == self.social_entity
                    && e.distance <= self.heuristics.village_radius
            })
            .count();
        residents >= self.heuristics.village_entity_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashMap;

    fn key(raw: &str) -> ResourceKey {
        ResourceKey::parse(raw).unwrap()
    }

    #[derive(Default)]
    struct StubWorld {
        present: bool,
        entities: HashMap<EntityId, EntityObservation>,
        bell: bool,
        block_queries: Cell<usize>,
    }

    impl StubWorld {
        fn with(entities: Vec<EntityObservation>) -> Self {
            Self {
                present: true,
                entities: entities.into_iter().map(|e| (e.id, e)).collect(),
                ..Default::default()
            }
        }
    }

    impl WorldView for StubWorld {
        fn player_position(&self) -> Option<Position> {
            self.present.then_some(Position {
                x: 0.0,
                y: 70.0,
                z: 0.0,
            })
        }
        fn day_time(&self) -> i64 {
            14000
        }
        fn is_raining(&self) -> bool {
            false
        }
        fn is_thundering(&self) -> bool {
            false
        }
        fn biome(&self) -> Option<BiomeSample> {
            None
        }
        fn dimension(&self) -> Option<ResourceKey> {
            Some(key("minecraft:overworld"))
        }
        fn open_screen(&self) -> Option<OpenScreen> {
            None
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
        fn find_block(&self, _block: &ResourceKey, _h: f64, _v: f64) -> bool {
            self.block_queries.set(self.block_queries.get() + 1);
            self.bell
        }
    }

    fn hostile(id: EntityId, distance: f64) -> EntityObservation {
        let mut e = EntityObservation::new(id, key("minecraft:zombie"), distance);
        e.aggressive = true;
        e
    }

    fn sampler() -> WorldSampler {
        WorldSampler::new(&HeuristicSettings::default()).unwrap()
    }

    #[test]
    fn test_is_night_window() {
        let h = HeuristicSettings::default();
        assert!(!is_night(12999, &h));
        assert!(is_night(13000, &h));
        assert!(is_night(22999, &h));
        assert!(!is_night(23000, &h));
        assert!(is_night(24000 * 5 + 15000, &h));
        assert!(is_night(-10000, &h));
    }

    #[test]
    fn test_combat_hysteresis() {
        let mut sampler = sampler();
        let mut world = StubWorld::with(vec![hostile(1, 10.0)]);
        let snapshot = sampler.sample(&world, None).unwrap();
        assert!(snapshot.in_combat);

        // No longer aggressive but still close: stays engaged.
        world.entities.get_mut(&1).unwrap().aggressive = false;
        assert!(sampler.sample(&world, None).unwrap().in_combat);

        // Out of radius: pruned.
        world.entities.get_mut(&1).unwrap().distance = 30.0;
        assert!(!sampler.sample(&world, None).unwrap().in_combat);
    }

    #[test]
    fn test_combat_prunes_named_and_riding() {
        let mut sampler = sampler();
        let mut world = StubWorld::with(vec![hostile(1, 5.0), hostile(2, 6.0)]);
        sampler.sample(&world, None);
        assert_eq!(sampler.combat().engaged().len(), 2);

        world.entities.get_mut(&1).unwrap().has_custom_name = true;
        world.entities.get_mut(&2).unwrap().vehicle = Some(key("minecraft:chest_boat"));
        sampler.sample(&world, None);
        assert!(!sampler.combat().in_combat());
    }

    #[test]
    fn test_combat_prunes_despawned_and_clears_without_player() {
        let mut sampler = sampler();
        let mut world = StubWorld::with(vec![hostile(7, 5.0)]);
        sampler.sample(&world, None);
        assert!(sampler.combat().in_combat());

        world.entities.clear();
        sampler.sample(&world, None);
        assert!(!sampler.combat().in_combat());

        world.entities.insert(7, hostile(7, 5.0));
        sampler.sample(&world, None);
        world.present = false;
        assert!(sampler.sample(&world, None).is_none());
        assert!(!sampler.combat().in_combat());
    }

    #[test]
    fn test_village_bell_checked_first() {
        let sampler = sampler();
        let world = StubWorld {
            present: true,
            bell: true,
            ..Default::default()
        };
        assert!(sampler.village_heuristic(&world, &[]));
        assert_eq!(world.block_queries.get(), 1);
    }

    #[test]
    fn test_village_by_villager_count() {
        let sampler = sampler();
        let villager = |id, d| EntityObservation::new(id, key("minecraft:villager"), d);
        let world = StubWorld::with(Vec::new());
        assert!(!sampler.village_heuristic(&world, &[villager(1, 10.0)]));
        assert!(sampler.village_heuristic(&world, &[villager(1, 10.0), villager(2, 47.0)]));
        assert!(!sampler.village_heuristic(&world, &[villager(1, 10.0), villager(2, 49.0)]));
    }

    #[test]
    fn test_entity_scan_limited_to_requested_radius() {
        let mut sampler = sampler();
        let world = StubWorld::with(vec![hostile(1, 5.0), hostile(2, 40.0)]);
        let snapshot = sampler.sample(&world, Some(16.0)).unwrap();
        let scan = snapshot.entity_scan.unwrap();
        assert_eq!(scan.radius, 16.0);
        assert_eq!(scan.entities.len(), 1);
        assert!(snapshot.is_night);
        assert_eq!(snapshot.altitude, 70.0);

        let snapshot = sampler.sample(&world, None).unwrap();
        assert!(snapshot.entity_scan.is_none());
    }
}
