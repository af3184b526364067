//! Loading of the JSON game document that describes every map.
//!
//! Any problem here is fatal: the server must not start serving with a
//! partially loaded game.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::loot::LootGeneratorConfig;
use crate::map::{Building, Map, MapCatalog, MapId, Office, Position, Road};

const DEFAULT_DOG_SPEED: f64 = 1.0;
const DEFAULT_BAG_CAPACITY: usize = 3;
const DEFAULT_RETIREMENT_SECS: f64 = 60.0;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read game config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse game config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("map {0} is defined more than once")]
    DuplicateMap(MapId),
    #[error("map {map} has duplicate office {office}")]
    DuplicateOffice { map: MapId, office: String },
    #[error("map {0} has no roads")]
    NoRoads(MapId),
    #[error("road {index} on map {map} needs exactly one of x1 or y1")]
    BadRoad { map: MapId, index: usize },
    #[error("{field} must be positive (got {value})")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} is too large to be a duration (got {value})")]
    OutOfRange { field: &'static str, value: f64 },
}

/// Everything the game document configures.
#[derive(Debug)]
pub struct GameConfig {
    pub maps: MapCatalog,
    pub retirement_time: Duration,
    pub loot_generator: LootGeneratorConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GameDoc {
    default_dog_speed: Option<f64>,
    default_bag_capacity: Option<usize>,
    dog_retirement_time: Option<f64>,
    loot_generator_config: LootGeneratorDoc,
    maps: Vec<MapDoc>,
}

#[derive(Debug, Deserialize)]
struct LootGeneratorDoc {
    period: f64,
    probability: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MapDoc {
    id: String,
    name: String,
    dog_speed: Option<f64>,
    bag_capacity: Option<usize>,
    roads: Vec<RoadDoc>,
    buildings: Vec<Building>,
    offices: Vec<OfficeDoc>,
    loot_types: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RoadDoc {
    x0: i64,
    y0: i64,
    x1: Option<i64>,
    y1: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OfficeDoc {
    id: String,
    x: i64,
    y: i64,
    offset_x: i64,
    offset_y: i64,
}

#[derive(Debug, Deserialize)]
struct LootTypeDoc {
    value: i64,
}

/// Read and parse the game document at `path`.
pub fn load_game(path: &Path) -> Result<GameConfig, LoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_game(&content)?;
    tracing::info!(
        path = %path.display(),
        maps = config.maps.len(),
        "Loaded game config"
    );
    Ok(config)
}

/// Parse a game document from a JSON string.
pub fn parse_game(json: &str) -> Result<GameConfig, LoadError> {
    let doc: GameDoc = serde_json::from_str(json)?;

    let default_speed = doc.default_dog_speed.unwrap_or(DEFAULT_DOG_SPEED);
    let default_bag = doc.default_bag_capacity.unwrap_or(DEFAULT_BAG_CAPACITY);

    let retirement_time = seconds(
        "dogRetirementTime",
        doc.dog_retirement_time.unwrap_or(DEFAULT_RETIREMENT_SECS),
    )?;
    let loot_period = seconds("lootGeneratorConfig.period", doc.loot_generator_config.period)?;

    let mut maps = MapCatalog::new();
    for map_doc in doc.maps {
        let map = build_map(map_doc, default_speed, default_bag)?;
        if let Err(dup) = maps.insert(map) {
            return Err(LoadError::DuplicateMap(dup.id));
        }
    }

    Ok(GameConfig {
        maps,
        retirement_time,
        loot_generator: LootGeneratorConfig {
            period: loot_period,
            probability: doc.loot_generator_config.probability.clamp(0.0, 1.0),
        },
    })
}

/// A strictly positive number of seconds that fits in a `Duration`.
fn seconds(field: &'static str, value: f64) -> Result<Duration, LoadError> {
    if !(value > 0.0) {
        return Err(LoadError::NotPositive { field, value });
    }
    Duration::try_from_secs_f64(value).map_err(|_| LoadError::OutOfRange { field, value })
}

fn build_map(doc: MapDoc, default_speed: f64, default_bag: usize) -> Result<Map, LoadError> {
    let id = MapId::new(doc.id);

    if doc.roads.is_empty() {
        return Err(LoadError::NoRoads(id));
    }
    let mut roads = Vec::with_capacity(doc.roads.len());
    for (index, road) in doc.roads.iter().enumerate() {
        let start = Position::new(road.x0 as f64, road.y0 as f64);
        let road = match (road.x1, road.y1) {
            (Some(x1), None) => Road::horizontal(start, x1 as f64),
            (None, Some(y1)) => Road::vertical(start, y1 as f64),
            _ => {
                return Err(LoadError::BadRoad {
                    map: id.clone(),
                    index,
                });
            },
        };
        roads.push(road);
    }

    let mut seen = HashSet::new();
    let mut offices = Vec::with_capacity(doc.offices.len());
    for office in doc.offices {
        if !seen.insert(office.id.clone()) {
            return Err(LoadError::DuplicateOffice {
                map: id,
                office: office.id,
            });
        }
        offices.push(Office {
            id: office.id,
            position: Position::new(office.x as f64, office.y as f64),
            offset_x: office.offset_x,
            offset_y: office.offset_y,
        });
    }

    let mut loot_prices = Vec::with_capacity(doc.loot_types.len());
    for loot in &doc.loot_types {
        let parsed = LootTypeDoc::deserialize(loot)?;
        loot_prices.push(parsed.value);
    }

    Ok(Map {
        id,
        name: doc.name,
        roads,
        buildings: doc.buildings,
        offices,
        dog_speed: doc.dog_speed.unwrap_or(default_speed),
        bag_capacity: doc.bag_capacity.unwrap_or(default_bag),
        loot_prices,
        loot_types: doc.loot_types,
    })
}
