use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Half-width of every road: a road occupies its centerline segment extended
/// by this distance on all sides.
pub const ROAD_HALF_WIDTH: f64 = 0.4;

/// Pickup radius of a dog.
pub const DOG_RADIUS: f64 = 0.3;

/// Delivery radius of an office.
pub const OFFICE_RADIUS: f64 = 0.25;

/// Identifier of a map as written in the game config document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MapId(pub String);

impl MapId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A point in continuous map coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Velocity in map units per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f64,
    pub vy: f64,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity { vx: 0.0, vy: 0.0 };

    pub const fn new(vx: f64, vy: f64) -> Self {
        Self { vx, vy }
    }

    pub fn is_zero(&self) -> bool {
        self.vx == 0.0 && self.vy == 0.0
    }
}

/// Facing of a dog. North is towards negative y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    North,
    South,
    West,
    East,
}

impl Direction {
    /// Single-letter code used on the wire (`U`, `D`, `L`, `R`).
    pub fn as_letter(self) -> &'static str {
        match self {
            Direction::North => "U",
            Direction::South => "D",
            Direction::West => "L",
            Direction::East => "R",
        }
    }

    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "U" => Some(Direction::North),
            "D" => Some(Direction::South),
            "L" => Some(Direction::West),
            "R" => Some(Direction::East),
            _ => None,
        }
    }

    /// Velocity of a dog moving this way at `speed`.
    pub fn velocity(self, speed: f64) -> Velocity {
        match self {
            Direction::North => Velocity::new(0.0, -speed),
            Direction::South => Velocity::new(0.0, speed),
            Direction::West => Velocity::new(-speed, 0.0),
            Direction::East => Velocity::new(speed, 0.0),
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::West | Direction::East)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// Axis-aligned road segment. `start` may lie after `end` on the long axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub start: Position,
    pub end: Position,
}

impl Road {
    pub fn horizontal(start: Position, end_x: f64) -> Self {
        Self {
            start,
            end: Position::new(end_x, start.y),
        }
    }

    pub fn vertical(start: Position, end_y: f64) -> Self {
        Self {
            start,
            end: Position::new(start.x, end_y),
        }
    }

    /// A zero-length road counts as horizontal.
    pub fn orientation(&self) -> Orientation {
        if self.start.y == self.end.y {
            Orientation::Horizontal
        } else {
            Orientation::Vertical
        }
    }

    pub fn is_horizontal(&self) -> bool {
        self.orientation() == Orientation::Horizontal
    }

    /// Whether this road runs along the axis a dog facing `facing` moves on.
    pub fn is_aligned_with(&self, facing: Direction) -> bool {
        self.is_horizontal() == facing.is_horizontal()
    }

    /// Bounds of the extended rectangle: `(min_x, max_x, min_y, max_y)`.
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        (
            self.start.x.min(self.end.x) - ROAD_HALF_WIDTH,
            self.start.x.max(self.end.x) + ROAD_HALF_WIDTH,
            self.start.y.min(self.end.y) - ROAD_HALF_WIDTH,
            self.start.y.max(self.end.y) + ROAD_HALF_WIDTH,
        )
    }

    pub fn contains(&self, pos: Position) -> bool {
        let (min_x, max_x, min_y, max_y) = self.bounds();
        pos.x >= min_x && pos.x <= max_x && pos.y >= min_y && pos.y <= max_y
    }

    /// Clip `pos` into the extended rectangle of this road.
    pub fn clip(&self, pos: Position) -> Position {
        let (min_x, max_x, min_y, max_y) = self.bounds();
        Position::new(pos.x.clamp(min_x, max_x), pos.y.clamp(min_y, max_y))
    }

    /// Point on the centerline at fraction `t` in `[0, 1]` from start to end.
    pub fn point_at(&self, t: f64) -> Position {
        Position::new(
            self.start.x + (self.end.x - self.start.x) * t,
            self.start.y + (self.end.y - self.start.y) * t,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Office {
    pub id: String,
    pub position: Position,
    pub offset_x: i64,
    pub offset_y: i64,
}

/// Static description of one map. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Map {
    pub id: MapId,
    pub name: String,
    pub roads: Vec<Road>,
    pub buildings: Vec<Building>,
    pub offices: Vec<Office>,
    /// Dog speed in units per second.
    pub dog_speed: f64,
    pub bag_capacity: usize,
    /// Price of each loot type, indexed by type.
    pub loot_prices: Vec<i64>,
    /// Loot type descriptors exactly as they appeared in the config document.
    pub loot_types: Vec<serde_json::Value>,
}

impl Map {
    pub fn loot_type_count(&self) -> usize {
        self.loot_prices.len()
    }

    pub fn loot_price(&self, loot_type: usize) -> Option<i64> {
        self.loot_prices.get(loot_type).copied()
    }
}

/// All maps of a running game, shared read-only between the world and the
/// HTTP handlers.
#[derive(Debug, Default)]
pub struct MapCatalog {
    maps: Vec<Arc<Map>>,
    index: HashMap<MapId, usize>,
}

impl MapCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a map. Returns the map back if its id is already taken.
    pub fn insert(&mut self, map: Map) -> Result<(), Map> {
        if self.index.contains_key(&map.id) {
            return Err(map);
        }
        self.index.insert(map.id.clone(), self.maps.len());
        self.maps.push(Arc::new(map));
        Ok(())
    }

    pub fn get(&self, id: &MapId) -> Option<&Arc<Map>> {
        self.index.get(id).map(|&i| &self.maps[i])
    }

    /// Maps in config-document order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Map>> {
        self.maps.iter()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn road_bounds_extend_by_half_width() {
        let road = Road::horizontal(Position::new(0.0, 0.0), 10.0);
        let (min_x, max_x, min_y, max_y) = road.bounds();
        assert!((min_x + 0.4).abs() < 1e-12);
        assert!((max_x - 10.4).abs() < 1e-12);
        assert!((min_y + 0.4).abs() < 1e-12);
        assert!((max_y - 0.4).abs() < 1e-12);
    }

    #[test]
    fn reversed_road_has_same_bounds() {
        let forward = Road::vertical(Position::new(5.0, 0.0), 20.0);
        let backward = Road::vertical(Position::new(5.0, 20.0), 0.0);
        assert_eq!(forward.bounds(), backward.bounds());
        assert!(!backward.is_horizontal());
    }

    #[test]
    fn contains_includes_edges() {
        let road = Road::horizontal(Position::new(0.0, 0.0), 10.0);
        assert!(road.contains(Position::new(10.4, 0.4)));
        assert!(!road.contains(Position::new(10.41, 0.0)));
    }

    #[test]
    fn direction_letters_round_trip() {
        for dir in [
            Direction::North,
            Direction::South,
            Direction::West,
            Direction::East,
        ] {
            assert_eq!(Direction::from_letter(dir.as_letter()), Some(dir));
        }
        assert_eq!(Direction::from_letter("X"), None);
    }

    #[test]
    fn north_velocity_points_up() {
        let v = Direction::North.velocity(2.5);
        assert_eq!(v, Velocity::new(0.0, -2.5));
    }

    #[test]
    fn catalog_rejects_duplicate_ids() {
        let map = Map {
            id: MapId::new("m1"),
            name: "Map 1".into(),
            roads: vec![Road::horizontal(Position::default(), 10.0)],
            buildings: vec![],
            offices: vec![],
            dog_speed: 1.0,
            bag_capacity: 3,
            loot_prices: vec![],
            loot_types: vec![],
        };
        let mut catalog = MapCatalog::new();
        assert!(catalog.insert(map.clone()).is_ok());
        assert!(catalog.insert(map).is_err());
        assert_eq!(catalog.len(), 1);
    }
}
