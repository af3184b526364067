use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::map::{Direction, Position, Velocity};

pub type DogId = u64;
pub type LootId = u64;

/// A loot item lying on a map or carried in a bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LostObject {
    pub loot_type: usize,
    pub position: Position,
    pub value: i64,
}

/// Fixed-capacity collection of carried loot, keyed by loot id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bag {
    capacity: usize,
    items: BTreeMap<LootId, LostObject>,
}

impl Bag {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.capacity
    }

    /// Put an item in the bag. Returns false when the bag is full.
    pub fn add(&mut self, id: LootId, item: LostObject) -> bool {
        if self.is_full() {
            return false;
        }
        self.items.insert(id, item);
        true
    }

    pub fn total_value(&self) -> i64 {
        self.items.values().map(|item| item.value).sum()
    }

    /// Empty the bag, returning its total value.
    pub fn clear(&mut self) -> i64 {
        let total = self.total_value();
        self.items.clear();
        total
    }

    pub fn items(&self) -> impl Iterator<Item = (LootId, &LostObject)> {
        self.items.iter().map(|(&id, item)| (id, item))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dog {
    pub id: DogId,
    pub name: String,
    pub position: Position,
    pub velocity: Velocity,
    pub direction: Direction,
    pub bag: Bag,
    pub score: i64,
    pub idle_time: Duration,
    pub play_time: Duration,
}

impl Dog {
    pub fn new(id: DogId, name: impl Into<String>, position: Position, bag_capacity: usize) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            velocity: Velocity::ZERO,
            direction: Direction::North,
            bag: Bag::new(bag_capacity),
            score: 0,
            idle_time: Duration::ZERO,
            play_time: Duration::ZERO,
        }
    }

    /// Start moving `direction` at `speed`, or stop when `None`.
    ///
    /// Stopping keeps the dog facing north.
    pub fn set_direction(&mut self, direction: Option<Direction>, speed: f64) {
        match direction {
            Some(dir) => {
                self.direction = dir;
                self.velocity = dir.velocity(speed);
            },
            None => {
                self.direction = Direction::North;
                self.velocity = Velocity::ZERO;
            },
        }
    }

    /// Advance idle and play time by `dt` according to the current velocity.
    pub fn account_time(&mut self, dt: Duration) {
        if self.velocity.is_zero() {
            self.idle_time += dt;
        } else {
            self.idle_time = Duration::ZERO;
        }
        self.play_time += dt;
    }

    /// Position reached after `dt` at the current velocity, ignoring roads.
    pub fn proposed_position(&self, dt: Duration) -> Position {
        let secs = dt.as_secs_f64();
        Position::new(
            self.position.x + self.velocity.vx * secs,
            self.position.y + self.velocity.vy * secs,
        )
    }

    /// Bank the bag's contents into the score.
    pub fn deliver(&mut self) -> i64 {
        let delivered = self.bag.clear();
        self.score += delivered;
        delivered
    }
}
