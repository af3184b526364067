//! Live state of one map: its dogs, the loot lying around, and the per-tick
//! simulation steps that act on them.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::collision::try_collect_point;
use crate::dog::{Dog, DogId, LootId, LostObject};
use crate::loot::LootAdmission;
use crate::map::{DOG_RADIUS, Map, OFFICE_RADIUS, Position, Road, Velocity};
use crate::movement::clamp_to_roads;

/// Where a newly joined dog appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnMode {
    /// Start of the first road of the map.
    #[default]
    FirstRoad,
    /// A uniformly random point on a uniformly random road.
    Random,
}

/// Start and end of a dog's movement during the current tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DogPath {
    pub start: Position,
    pub end: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pickup {
    pub dog: DogId,
    pub loot: LootId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub dog: DogId,
    pub office: String,
    pub value: i64,
}

pub struct Session {
    map: Arc<Map>,
    dogs: BTreeMap<DogId, Dog>,
    lost_objects: BTreeMap<LootId, LostObject>,
    next_loot_id: LootId,
    paths: BTreeMap<DogId, DogPath>,
    generator: Box<dyn LootAdmission>,
}

impl Session {
    pub fn new(map: Arc<Map>, generator: Box<dyn LootAdmission>) -> Self {
        Self {
            map,
            dogs: BTreeMap::new(),
            lost_objects: BTreeMap::new(),
            next_loot_id: 0,
            paths: BTreeMap::new(),
            generator,
        }
    }

    pub fn map(&self) -> &Arc<Map> {
        &self.map
    }

    pub fn dogs(&self) -> impl Iterator<Item = &Dog> {
        self.dogs.values()
    }

    pub fn dog(&self, id: DogId) -> Option<&Dog> {
        self.dogs.get(&id)
    }

    pub fn dog_mut(&mut self, id: DogId) -> Option<&mut Dog> {
        self.dogs.get_mut(&id)
    }

    pub fn dog_count(&self) -> usize {
        self.dogs.len()
    }

    pub fn lost_objects(&self) -> impl Iterator<Item = (LootId, &LostObject)> {
        self.lost_objects.iter().map(|(&id, obj)| (id, obj))
    }

    pub fn lost_object_count(&self) -> usize {
        self.lost_objects.len()
    }

    /// Id the next spawned lost object will receive.
    pub fn next_loot_id(&self) -> LootId {
        self.next_loot_id
    }

    pub fn path(&self, id: DogId) -> Option<DogPath> {
        self.paths.get(&id).copied()
    }

    /// Create a dog and place it according to `mode`.
    pub fn add_dog<R: Rng + ?Sized>(
        &mut self,
        id: DogId,
        name: impl Into<String>,
        mode: SpawnMode,
        rng: &mut R,
    ) -> &Dog {
        let position = match mode {
            SpawnMode::FirstRoad => self.map.roads.first().map(|r| r.start).unwrap_or_default(),
            SpawnMode::Random => random_road_point(&self.map.roads, rng),
        };
        let dog = Dog::new(id, name, position, self.map.bag_capacity);
        self.dogs.entry(id).or_insert(dog)
    }

    /// Reattach a dog restored from a snapshot without moving it.
    ///
    /// Returns the dog back if its id is already present.
    pub fn regain_dog(&mut self, dog: Dog) -> Result<(), Dog> {
        if self.dogs.contains_key(&dog.id) {
            return Err(dog);
        }
        self.dogs.insert(dog.id, dog);
        Ok(())
    }

    pub fn remove_dog(&mut self, id: DogId) -> Option<Dog> {
        self.paths.remove(&id);
        self.dogs.remove(&id)
    }

    /// Put a lost object on the map under the next free id. Returns `None`
    /// once the id space is used up.
    pub fn add_lost_object(&mut self, item: LostObject) -> Option<LootId> {
        let id = self.next_loot_id;
        self.next_loot_id = id.checked_add(1)?;
        self.lost_objects.insert(id, item);
        Some(id)
    }

    /// Reinstate lost objects from a snapshot. The id counter never moves
    /// backwards and always ends past every reinstated id.
    ///
    /// Fails with the offending id if it leaves no room for a successor.
    pub fn restore_lost_objects(
        &mut self,
        next_loot_id: LootId,
        objects: impl IntoIterator<Item = (LootId, LostObject)>,
    ) -> Result<(), LootId> {
        let mut next = self.next_loot_id.max(next_loot_id);
        for (id, obj) in objects {
            next = next.max(id.checked_add(1).ok_or(id)?);
            self.lost_objects.insert(id, obj);
        }
        self.next_loot_id = next;
        Ok(())
    }

    /// Accumulated time since loot was last admitted in this session.
    pub fn time_without_loot(&self) -> Duration {
        self.generator.time_without_loot()
    }

    pub fn set_time_without_loot(&mut self, elapsed: Duration) {
        self.generator.set_time_without_loot(elapsed);
    }

    /// Advance every dog by `dt`, keeping it on the roads.
    pub fn move_dogs(&mut self, dt: Duration) {
        self.paths.clear();
        for dog in self.dogs.values_mut() {
            dog.account_time(dt);

            let start = dog.position;
            let proposed = dog.proposed_position(dt);
            let outcome = clamp_to_roads(start, proposed, dog.direction, &self.map.roads);
            dog.position = outcome.position;
            if outcome.clamped {
                dog.velocity = Velocity::ZERO;
            }

            self.paths.insert(
                dog.id,
                DogPath {
                    start,
                    end: dog.position,
                },
            );
        }
    }

    /// Ask the admission policy how much loot to add and spawn it.
    pub fn spawn_loot<R: Rng + ?Sized>(&mut self, dt: Duration, rng: &mut R) -> usize {
        let count = self
            .generator
            .generate(dt, self.lost_objects.len(), self.dogs.len());
        let mut spawned = 0;
        for _ in 0..count {
            if self.spawn_one(rng).is_some() {
                spawned += 1;
            }
        }
        spawned
    }

    /// Spawn a single random loot item. Maps without loot types spawn nothing.
    pub fn spawn_one<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<LootId> {
        let types = self.map.loot_type_count();
        if types == 0 {
            return None;
        }
        let loot_type = rng.random_range(0..types);
        let value = self.map.loot_price(loot_type)?;
        let position = random_road_point(&self.map.roads, rng);
        let id = self.add_lost_object(LostObject {
            loot_type,
            position,
            value,
        });
        if id.is_none() {
            tracing::warn!(map = %self.map.id, "Loot id space exhausted, item dropped");
        }
        id
    }

    /// Hand each lost object to the dog that reached it first this tick.
    pub fn resolve_pickups(&mut self) -> Vec<Pickup> {
        let ids: Vec<LootId> = self.lost_objects.keys().copied().collect();
        let mut pickups = Vec::new();

        for loot_id in ids {
            let Some(item) = self.lost_objects.get(&loot_id) else {
                continue;
            };

            let mut winner: Option<(f64, DogId)> = None;
            for dog in self.dogs.values() {
                if dog.bag.is_full() {
                    continue;
                }
                let path = self.paths.get(&dog.id).copied().unwrap_or(DogPath {
                    start: dog.position,
                    end: dog.position,
                });
                let hit = try_collect_point(path.start, path.end, item.position);
                if !hit.is_collected(DOG_RADIUS) {
                    continue;
                }
                if winner.is_none_or(|(best, _)| hit.proj_ratio < best) {
                    winner = Some((hit.proj_ratio, dog.id));
                }
            }

            let Some((_, dog_id)) = winner else {
                continue;
            };
            if let (Some(item), Some(dog)) = (
                self.lost_objects.remove(&loot_id),
                self.dogs.get_mut(&dog_id),
            ) {
                dog.bag.add(loot_id, item);
                pickups.push(Pickup {
                    dog: dog_id,
                    loot: loot_id,
                });
            }
        }
        pickups
    }

    /// Bank the bag of every dog that passed an office this tick.
    pub fn resolve_deliveries(&mut self) -> Vec<Delivery> {
        let radius = DOG_RADIUS + OFFICE_RADIUS;
        let mut deliveries = Vec::new();

        for dog in self.dogs.values_mut() {
            let path = self.paths.get(&dog.id).copied().unwrap_or(DogPath {
                start: dog.position,
                end: dog.position,
            });
            let reached = self.map.offices.iter().find(|office| {
                try_collect_point(path.start, path.end, office.position).is_collected(radius)
            });
            if let Some(office) = reached {
                let value = dog.deliver();
                deliveries.push(Delivery {
                    dog: dog.id,
                    office: office.id.clone(),
                    value,
                });
            }
        }
        deliveries
    }
}

fn random_road_point<R: Rng + ?Sized>(roads: &[Road], rng: &mut R) -> Position {
    if roads.is_empty() {
        return Position::default();
    }
    let road = &roads[rng.random_range(0..roads.len())];
    road.point_at(rng.random::<f64>())
}
