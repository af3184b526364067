//! The arena root: every session, every player binding, and the operations
//! that mutate them. A `World` is driven by exactly one owner at a time.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::dog::{DogId, LootId, LostObject};
use crate::loader::GameConfig;
use crate::loot::{LootGenerator, LootGeneratorConfig};
use crate::map::{Direction, MapCatalog, MapId, Position, Velocity};
use crate::ranking::RankingStore;
use crate::registry::{Player, PlayerRegistry, RegistryError, Token};
use crate::retirement::{RetiredDog, flag_idle_dogs, record_retirees};
use crate::session::{Session, SpawnMode};
use crate::snapshot::{DogRecord, SessionSnapshot, SnapshotError, WorldSnapshot};

#[derive(Debug, Clone, PartialEq)]
pub struct WorldSettings {
    pub spawn_mode: SpawnMode,
    /// Spawn one loot item in the session every time a player joins.
    pub spawn_loot_on_join: bool,
    pub retirement_time: Duration,
    pub loot_generator: LootGeneratorConfig,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            spawn_mode: SpawnMode::FirstRoad,
            spawn_loot_on_join: true,
            retirement_time: Duration::from_secs(60),
            loot_generator: LootGeneratorConfig::default(),
        }
    }
}

impl WorldSettings {
    pub fn from_game(game: &GameConfig) -> Self {
        Self {
            retirement_time: game.retirement_time,
            loot_generator: game.loot_generator,
            ..Self::default()
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("player name must not be empty")]
    InvalidName,
    #[error("map {0} not found")]
    MapNotFound(MapId),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("token is not bound to a player")]
    UnknownToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    pub token: Token,
    pub dog_id: DogId,
}

/// Read-only copy of one dog as seen by a client.
#[derive(Debug, Clone, PartialEq)]
pub struct DogView {
    pub id: DogId,
    pub name: String,
    pub position: Position,
    pub velocity: Velocity,
    pub direction: Direction,
    /// Carried items as `(loot id, loot type)`.
    pub bag: Vec<(LootId, usize)>,
    pub score: i64,
}

/// Everything a player can see in its own session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub dogs: Vec<DogView>,
    pub lost_objects: Vec<(LootId, LostObject)>,
}

/// What one tick changed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    pub retired: Vec<RetiredDog>,
    pub spawned: usize,
    pub picked_up: usize,
    pub delivered: usize,
}

/// Hook run by the scheduler after every tick.
pub trait TickListener: Send {
    fn on_tick(&mut self, world: &World, elapsed: Duration);

    /// Called once when the scheduler stops.
    fn on_shutdown(&mut self, _world: &World) {}
}

pub struct World {
    maps: Arc<MapCatalog>,
    sessions: BTreeMap<MapId, Session>,
    registry: PlayerRegistry,
    rng: StdRng,
    settings: WorldSettings,
    ranking: Arc<dyn RankingStore>,
}

impl World {
    /// Create an empty world. Without a seed the random source is seeded
    /// from the OS.
    pub fn new(
        maps: Arc<MapCatalog>,
        settings: WorldSettings,
        ranking: Arc<dyn RankingStore>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            maps,
            sessions: BTreeMap::new(),
            registry: PlayerRegistry::new(),
            rng,
            settings,
            ranking,
        }
    }

    pub fn maps(&self) -> &Arc<MapCatalog> {
        &self.maps
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn session(&self, map_id: &MapId) -> Option<&Session> {
        self.sessions.get(map_id)
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn dog_count(&self) -> usize {
        self.sessions.values().map(Session::dog_count).sum()
    }

    fn new_session(&self, map_id: &MapId) -> Option<Session> {
        let map = self.maps.get(map_id)?;
        let generator = LootGenerator::new(self.settings.loot_generator);
        Some(Session::new(Arc::clone(map), Box::new(generator)))
    }

    /// Add a dog named `name` to the session of `map_id`, creating the
    /// session on first use.
    pub fn join(&mut self, name: &str, map_id: &MapId) -> Result<JoinOutcome, JoinError> {
        if name.is_empty() {
            return Err(JoinError::InvalidName);
        }
        if !self.sessions.contains_key(map_id) {
            let session = self
                .new_session(map_id)
                .ok_or_else(|| JoinError::MapNotFound(map_id.clone()))?;
            tracing::info!(map = %map_id, "Created session");
            self.sessions.insert(map_id.clone(), session);
        }

        let dog_id = self.registry.alloc_dog_id()?;
        let token = self.registry.issue_token();
        self.registry.bind(Player {
            token: token.clone(),
            dog_id,
            map_id: map_id.clone(),
            retire_after: self.settings.retirement_time,
        })?;

        let session = self
            .sessions
            .get_mut(map_id)
            .ok_or_else(|| JoinError::MapNotFound(map_id.clone()))?;
        session.add_dog(dog_id, name, self.settings.spawn_mode, &mut self.rng);
        if self.settings.spawn_loot_on_join {
            session.spawn_one(&mut self.rng);
        }

        tracing::info!(dog_id, map = %map_id, name, "Player joined");
        Ok(JoinOutcome { token, dog_id })
    }

    fn player(&self, token: &Token) -> Result<&Player, ActionError> {
        self.registry
            .find_by_token(token)
            .ok_or(ActionError::UnknownToken)
    }

    /// Point the caller's dog in `direction`, or stop it with `None`.
    pub fn set_direction(
        &mut self,
        token: &Token,
        direction: Option<Direction>,
    ) -> Result<(), ActionError> {
        let player = self.player(token)?;
        let (dog_id, map_id) = (player.dog_id, player.map_id.clone());
        let session = self
            .sessions
            .get_mut(&map_id)
            .ok_or(ActionError::UnknownToken)?;
        let speed = session.map().dog_speed;
        let dog = session.dog_mut(dog_id).ok_or(ActionError::UnknownToken)?;
        dog.set_direction(direction, speed);
        Ok(())
    }

    fn session_of(&self, token: &Token) -> Result<&Session, ActionError> {
        let player = self.player(token)?;
        self.sessions
            .get(&player.map_id)
            .ok_or(ActionError::UnknownToken)
    }

    /// Names of every dog in the caller's session.
    pub fn players(&self, token: &Token) -> Result<Vec<(DogId, String)>, ActionError> {
        let session = self.session_of(token)?;
        Ok(session.dogs().map(|d| (d.id, d.name.clone())).collect())
    }

    /// Full live state of the caller's session.
    pub fn state(&self, token: &Token) -> Result<SessionView, ActionError> {
        let session = self.session_of(token)?;
        let dogs = session
            .dogs()
            .map(|d| DogView {
                id: d.id,
                name: d.name.clone(),
                position: d.position,
                velocity: d.velocity,
                direction: d.direction,
                bag: d.bag.items().map(|(id, item)| (id, item.loot_type)).collect(),
                score: d.score,
            })
            .collect();
        let lost_objects = session
            .lost_objects()
            .map(|(id, obj)| (id, obj.clone()))
            .collect();
        Ok(SessionView { dogs, lost_objects })
    }

    /// Advance the whole world by `dt`.
    pub fn tick(&mut self, dt: Duration) -> TickReport {
        let mut report = TickReport::default();

        for session in self.sessions.values_mut() {
            session.move_dogs(dt);
        }

        for (map_id, session) in &self.sessions {
            report
                .retired
                .extend(flag_idle_dogs(map_id, session, &self.registry));
        }
        if !report.retired.is_empty() {
            record_retirees(self.ranking.as_ref(), &report.retired);
            for retiree in &report.retired {
                if let Some(session) = self.sessions.get_mut(&retiree.map_id) {
                    session.remove_dog(retiree.dog_id);
                }
                self.registry.unbind_dog(retiree.dog_id, &retiree.map_id);
                tracing::info!(
                    dog_id = retiree.dog_id,
                    map = %retiree.map_id,
                    score = retiree.score,
                    play_time_secs = retiree.play_time.as_secs_f64(),
                    "Dog retired"
                );
            }
        }

        for session in self.sessions.values_mut() {
            report.spawned += session.spawn_loot(dt, &mut self.rng);
        }

        for session in self.sessions.values_mut() {
            report.picked_up += session.resolve_pickups().len();
            report.delivered += session.resolve_deliveries().len();
        }

        report
    }

    /// Capture every session and player binding.
    pub fn snapshot(&self) -> WorldSnapshot {
        let sessions = self
            .sessions
            .iter()
            .map(|(map_id, session)| SessionSnapshot {
                map_id: map_id.clone(),
                next_loot_id: session.next_loot_id(),
                time_without_loot: session.time_without_loot(),
                dogs: session
                    .dogs()
                    .filter_map(|dog| {
                        let player = self.registry.find_by_dog(dog.id, map_id)?;
                        Some(DogRecord {
                            dog: dog.clone(),
                            token: player.token.clone(),
                            retire_after: player.retire_after,
                        })
                    })
                    .collect(),
                lost_objects: session
                    .lost_objects()
                    .map(|(id, obj)| (id, obj.clone()))
                    .collect(),
            })
            .collect();
        WorldSnapshot {
            next_dog_id: self.registry.next_dog_id(),
            sessions,
        }
    }

    /// Replace all live state with `snapshot`.
    ///
    /// Either the whole snapshot is applied or the world is left as it was.
    pub fn restore(&mut self, snapshot: WorldSnapshot) -> Result<(), SnapshotError> {
        let mut sessions = BTreeMap::new();
        let mut registry = PlayerRegistry::new();
        let mut seen_dogs = HashSet::new();
        if let Some(last) = snapshot.next_dog_id.checked_sub(1) {
            registry
                .reserve_dog_id(last)
                .map_err(|_| SnapshotError::IdOverflow(last))?;
        }

        for saved in snapshot.sessions {
            if sessions.contains_key(&saved.map_id) {
                return Err(SnapshotError::DuplicateSession(saved.map_id));
            }
            let mut session = self
                .new_session(&saved.map_id)
                .ok_or_else(|| SnapshotError::UnknownMap(saved.map_id.clone()))?;

            for record in saved.dogs {
                let dog_id = record.dog.id;
                if !seen_dogs.insert(dog_id) {
                    return Err(SnapshotError::DuplicateDog(dog_id));
                }
                registry
                    .reserve_dog_id(dog_id)
                    .map_err(|_| SnapshotError::IdOverflow(dog_id))?;
                registry
                    .bind(Player {
                        token: record.token,
                        dog_id,
                        map_id: saved.map_id.clone(),
                        retire_after: record.retire_after,
                    })
                    .map_err(|e| match e {
                        RegistryError::DuplicateToken => SnapshotError::DuplicateToken,
                        RegistryError::DuplicateDog { dog, .. } => SnapshotError::DuplicateDog(dog),
                        RegistryError::IdsExhausted => SnapshotError::IdOverflow(dog_id),
                    })?;
                session
                    .regain_dog(record.dog)
                    .map_err(|dog| SnapshotError::DuplicateDog(dog.id))?;
            }
            session
                .restore_lost_objects(saved.next_loot_id, saved.lost_objects)
                .map_err(SnapshotError::IdOverflow)?;
            session.set_time_without_loot(saved.time_without_loot);
            sessions.insert(saved.map_id, session);
        }

        tracing::info!(
            sessions = sessions.len(),
            players = registry.len(),
            "Restored world snapshot"
        );
        self.sessions = sessions;
        self.registry = registry;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranking::MemoryRankingStore;
    use crate::test_helpers::{sample_catalog, test_world};

    fn quiet_settings() -> WorldSettings {
        WorldSettings {
            spawn_loot_on_join: false,
            loot_generator: LootGeneratorConfig {
                period: Duration::from_secs(1),
                probability: 0.0,
            },
            ..WorldSettings::default()
        }
    }

    fn map1() -> MapId {
        MapId::new("map1")
    }

    #[test]
    fn join_validates_name_and_map() {
        let (mut world, _) = test_world(quiet_settings());
        assert_eq!(world.join("", &map1()), Err(JoinError::InvalidName));
        assert_eq!(
            world.join("Rex", &MapId::new("nowhere")),
            Err(JoinError::MapNotFound(MapId::new("nowhere")))
        );
        assert_eq!(world.session_count(), 0);
    }

    #[test]
    fn joins_share_one_session_per_map() {
        let (mut world, _) = test_world(quiet_settings());
        let a = world.join("Rex", &map1()).unwrap();
        let b = world.join("Fido", &map1()).unwrap();
        assert_ne!(a.token, b.token);
        assert!(b.dog_id > a.dog_id);
        assert_eq!(world.session_count(), 1);
        assert_eq!(world.dog_count(), 2);

        let players = world.players(&a.token).unwrap();
        assert_eq!(
            players,
            vec![(a.dog_id, "Rex".to_string()), (b.dog_id, "Fido".to_string())]
        );
    }

    #[test]
    fn join_spawns_one_loot_item_when_enabled() {
        let settings = WorldSettings {
            spawn_loot_on_join: true,
            ..quiet_settings()
        };
        let (mut world, _) = test_world(settings);
        let joined = world.join("Rex", &map1()).unwrap();
        assert_eq!(world.state(&joined.token).unwrap().lost_objects.len(), 1);
    }

    #[test]
    fn unknown_token_is_rejected() {
        let (mut world, _) = test_world(quiet_settings());
        world.join("Rex", &map1()).unwrap();
        let stranger = PlayerRegistry::new().issue_token();
        assert_eq!(
            world.set_direction(&stranger, Some(Direction::East)),
            Err(ActionError::UnknownToken)
        );
        assert!(world.state(&stranger).is_err());
    }

    #[test]
    fn moving_dog_follows_road_and_stops_at_its_end() {
        let (mut world, _) = test_world(quiet_settings());
        let joined = world.join("Rex", &map1()).unwrap();
        world
            .set_direction(&joined.token, Some(Direction::East))
            .unwrap();

        world.tick(Duration::from_secs(3));
        let dog = &world.state(&joined.token).unwrap().dogs[0];
        assert_eq!(dog.position, Position::new(3.0, 0.0));
        assert_eq!(dog.velocity, Velocity::new(1.0, 0.0));

        world.tick(Duration::from_secs(100));
        let dog = &world.state(&joined.token).unwrap().dogs[0];
        assert!((dog.position.x - 40.4).abs() < 1e-9);
        assert_eq!(dog.velocity, Velocity::ZERO);
    }

    #[test]
    fn idle_time_resets_once_moving() {
        let (mut world, _) = test_world(quiet_settings());
        let joined = world.join("Rex", &map1()).unwrap();
        let dt = Duration::from_millis(500);
        let idle = |world: &World| {
            world
                .session(&map1())
                .and_then(|s| s.dog(joined.dog_id))
                .map(|d| d.idle_time)
                .unwrap()
        };

        world.tick(dt);
        world.tick(dt);
        assert_eq!(idle(&world), Duration::from_secs(1));

        world
            .set_direction(&joined.token, Some(Direction::East))
            .unwrap();
        world.tick(dt);
        assert_eq!(idle(&world), Duration::ZERO);
    }

    #[test]
    fn idle_dog_retires_with_exactly_one_record() {
        let settings = WorldSettings {
            retirement_time: Duration::from_secs(2),
            ..quiet_settings()
        };
        let (mut world, ranking) = test_world(settings);
        let joined = world.join("Rex", &map1()).unwrap();

        let report = world.tick(Duration::from_millis(1500));
        assert!(report.retired.is_empty());

        let report = world.tick(Duration::from_millis(500));
        assert_eq!(report.retired.len(), 1);
        assert_eq!(world.dog_count(), 0);
        assert!(world.registry().find_by_token(&joined.token).is_none());

        world.tick(Duration::from_secs(5));
        let records = ranking.list(0, 100).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Rex");
        assert_eq!(records[0].play_time, Duration::from_secs(2));
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let (mut world, _) = test_world(WorldSettings {
            spawn_loot_on_join: true,
            ..quiet_settings()
        });
        let rex = world.join("Rex", &map1()).unwrap();
        let fido = world.join("Fido", &MapId::new("town")).unwrap();
        world.set_direction(&rex.token, Some(Direction::East)).unwrap();
        world.tick(Duration::from_millis(2500));

        let snapshot = world.snapshot();
        let bytes = crate::snapshot::encode(&snapshot).unwrap();

        let (mut restored, _) = test_world(quiet_settings());
        restored
            .restore(crate::snapshot::decode(&bytes).unwrap())
            .unwrap();

        for token in [&rex.token, &fido.token] {
            assert_eq!(restored.state(token).unwrap(), world.state(token).unwrap());
        }
        let before = world.session(&map1()).unwrap().dog(rex.dog_id).unwrap();
        let after = restored.session(&map1()).unwrap().dog(rex.dog_id).unwrap();
        assert_eq!(before, after);

        // Counters continue past restored ids.
        let next = restored.join("Spot", &map1()).unwrap();
        assert!(next.dog_id > fido.dog_id);
        assert_eq!(
            restored.session(&map1()).unwrap().next_loot_id(),
            world.session(&map1()).unwrap().next_loot_id()
        );
    }

    #[test]
    fn failed_restore_leaves_world_untouched() {
        let (mut world, _) = test_world(quiet_settings());
        let rex = world.join("Rex", &map1()).unwrap();

        let mut snapshot = world.snapshot();
        snapshot.sessions[0].map_id = MapId::new("atlantis");

        let (mut other, _) = test_world(quiet_settings());
        let spot = other.join("Spot", &map1()).unwrap();
        assert!(matches!(
            other.restore(snapshot),
            Err(SnapshotError::UnknownMap(_))
        ));
        assert!(other.state(&spot.token).is_ok());
        assert!(other.state(&rex.token).is_err());
    }

    #[test]
    fn restore_rejects_duplicate_tokens() {
        let (mut world, _) = test_world(quiet_settings());
        world.join("Rex", &map1()).unwrap();
        world.join("Fido", &map1()).unwrap();

        let mut snapshot = world.snapshot();
        let token = snapshot.sessions[0].dogs[0].token.clone();
        snapshot.sessions[0].dogs[1].token = token;

        let (mut other, _) = test_world(quiet_settings());
        assert!(matches!(
            other.restore(snapshot),
            Err(SnapshotError::DuplicateToken)
        ));
    }

    #[test]
    fn loot_spawned_during_a_tick_is_collectable_in_that_tick() {
        let mut map = crate::test_helpers::sample_map();
        map.roads = vec![crate::map::Road::horizontal(Position::new(0.0, 0.0), 10.0)];
        map.offices.clear();
        map.dog_speed = 20.0;
        let mut catalog = MapCatalog::new();
        assert!(catalog.insert(map).is_ok());

        let settings = WorldSettings {
            loot_generator: LootGeneratorConfig {
                period: Duration::from_secs(1),
                probability: 1.0,
            },
            ..quiet_settings()
        };
        let mut world = World::new(
            Arc::new(catalog),
            settings,
            Arc::new(MemoryRankingStore::new()),
            Some(5),
        );
        let rex = world.join("Rex", &map1()).unwrap();
        world.set_direction(&rex.token, Some(Direction::East)).unwrap();

        // The dog sweeps the whole road, so wherever the item lands it is
        // on the path.
        let report = world.tick(Duration::from_secs(1));
        assert_eq!(report.spawned, 1);
        assert_eq!(report.picked_up, 1);

        let view = world.state(&rex.token).unwrap();
        assert!(view.lost_objects.is_empty());
        assert_eq!(view.dogs[0].bag.len(), 1);
    }

    #[test]
    fn restore_keeps_loot_admission_clock() {
        let (mut world, _) = test_world(quiet_settings());
        world.join("Rex", &map1()).unwrap();
        world.tick(Duration::from_secs(3));

        let snapshot = world.snapshot();
        assert_eq!(snapshot.sessions[0].time_without_loot, Duration::from_secs(3));

        let (mut restored, _) = test_world(quiet_settings());
        restored.restore(snapshot).unwrap();
        assert_eq!(
            restored.session(&map1()).unwrap().time_without_loot(),
            Duration::from_secs(3)
        );
    }

    #[test]
    fn restore_rejects_ids_without_successor() {
        let (mut world, _) = test_world(quiet_settings());
        let rex = world.join("Rex", &map1()).unwrap();

        let mut snapshot = world.snapshot();
        snapshot.sessions[0].dogs[0].dog.id = u64::MAX;
        let (mut other, _) = test_world(quiet_settings());
        assert!(matches!(
            other.restore(snapshot),
            Err(SnapshotError::IdOverflow(u64::MAX))
        ));

        let mut snapshot = world.snapshot();
        let item = LostObject {
            loot_type: 0,
            position: Position::new(1.0, 0.0),
            value: 10,
        };
        snapshot.sessions[0].lost_objects.push((u64::MAX, item));
        let (mut other, _) = test_world(quiet_settings());
        assert!(matches!(
            other.restore(snapshot),
            Err(SnapshotError::IdOverflow(u64::MAX))
        ));
        assert!(other.state(&rex.token).is_err());
    }

    #[test]
    fn seeded_worlds_are_deterministic() {
        let settings = WorldSettings {
            spawn_mode: SpawnMode::Random,
            spawn_loot_on_join: true,
            ..quiet_settings()
        };
        let make = || {
            World::new(
                Arc::new(sample_catalog()),
                settings.clone(),
                Arc::new(MemoryRankingStore::new()),
                Some(99),
            )
        };
        let (mut a, mut b) = (make(), make());
        let ja = a.join("Rex", &map1()).unwrap();
        let jb = b.join("Rex", &map1()).unwrap();
        assert_eq!(a.state(&ja.token).unwrap(), b.state(&jb.token).unwrap());
    }
}
