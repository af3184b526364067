use std::sync::Arc;

use roadhound_core::map::MapCatalog;
use roadhound_core::ranking::RankingStore;

use crate::config::ServerConfig;
use crate::world_loop::WorldHandle;

/// Shared handler state. Maps and rankings are read directly; everything
/// live goes through the world loop.
#[derive(Clone)]
pub struct AppState {
    pub world: WorldHandle,
    pub maps: Arc<MapCatalog>,
    pub ranking: Arc<dyn RankingStore>,
    pub config: Arc<ServerConfig>,
}
