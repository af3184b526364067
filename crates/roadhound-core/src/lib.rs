pub mod collision;
pub mod dog;
pub mod loader;
pub mod loot;
pub mod map;
pub mod movement;
pub mod ranking;
pub mod registry;
pub mod retirement;
pub mod session;
pub mod snapshot;
pub mod world;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::loot::LootAdmission;
    use crate::map::{Map, MapCatalog, MapId, Office, Position, Road};
    use crate::ranking::MemoryRankingStore;
    use crate::world::{World, WorldSettings};

    /// Game document describing the same maps as [`sample_catalog`].
    pub const SAMPLE_GAME_JSON: &str = r#"{
        "defaultDogSpeed": 1.0,
        "defaultBagCapacity": 3,
        "dogRetirementTime": 60.0,
        "lootGeneratorConfig": { "period": 5.0, "probability": 0.5 },
        "maps": [
            {
                "id": "map1",
                "name": "Map 1",
                "roads": [
                    { "x0": 0, "y0": 0, "x1": 40 },
                    { "x0": 40, "y0": 0, "y1": 30 }
                ],
                "buildings": [ { "x": 5, "y": 5, "w": 30, "h": 20 } ],
                "offices": [ { "id": "o0", "x": 40, "y": 30, "offsetX": 5, "offsetY": 0 } ],
                "lootTypes": [
                    { "name": "key", "file": "assets/key.obj", "type": "obj", "value": 10 },
                    { "name": "wallet", "file": "assets/wallet.obj", "type": "obj", "value": 30 }
                ]
            },
            {
                "id": "town",
                "name": "Town",
                "roads": [ { "x0": 0, "y0": 0, "y1": 10 } ],
                "buildings": [],
                "offices": [],
                "lootTypes": []
            }
        ]
    }"#;

    /// An L-shaped map: east along y=0 to x=40, then south to y=30 where
    /// office `o0` sits. Two loot types worth 10 and 30.
    pub fn sample_map() -> Map {
        Map {
            id: MapId::new("map1"),
            name: "Map 1".into(),
            roads: vec![
                Road::horizontal(Position::new(0.0, 0.0), 40.0),
                Road::vertical(Position::new(40.0, 0.0), 30.0),
            ],
            buildings: vec![],
            offices: vec![Office {
                id: "o0".into(),
                position: Position::new(40.0, 30.0),
                offset_x: 5,
                offset_y: 0,
            }],
            dog_speed: 1.0,
            bag_capacity: 3,
            loot_prices: vec![10, 30],
            loot_types: vec![
                serde_json::json!({ "name": "key", "value": 10 }),
                serde_json::json!({ "name": "wallet", "value": 30 }),
            ],
        }
    }

    /// `map1` plus a one-road map `town` without loot.
    pub fn sample_catalog() -> MapCatalog {
        let town = Map {
            id: MapId::new("town"),
            name: "Town".into(),
            roads: vec![Road::vertical(Position::new(0.0, 0.0), 10.0)],
            buildings: vec![],
            offices: vec![],
            dog_speed: 1.0,
            bag_capacity: 3,
            loot_prices: vec![],
            loot_types: vec![],
        };
        let mut catalog = MapCatalog::new();
        for map in [sample_map(), town] {
            catalog.insert(map).expect("sample map ids are distinct");
        }
        catalog
    }

    /// Admission policy that never spawns anything.
    pub struct NoLoot;

    impl LootAdmission for NoLoot {
        fn generate(&mut self, _elapsed: Duration, _active_loot: usize, _dogs: usize) -> usize {
            0
        }
    }

    /// A seeded world over [`sample_catalog`] with an in-memory ranking.
    pub fn test_world(settings: WorldSettings) -> (World, Arc<MemoryRankingStore>) {
        let ranking = Arc::new(MemoryRankingStore::new());
        let world = World::new(
            Arc::new(sample_catalog()),
            settings,
            Arc::clone(&ranking) as _,
            Some(42),
        );
        (world, ranking)
    }
}
