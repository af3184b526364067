pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod health;
pub mod persistence;
pub mod records_db;
pub mod request_log;
pub mod state;
pub mod world_loop;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, header};
use axum::middleware;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use roadhound_core::loader::GameConfig;
use roadhound_core::ranking::{MemoryRankingStore, RankingError, RankingStore};
use roadhound_core::session::SpawnMode;
use roadhound_core::snapshot::{SnapshotError, WorldSnapshot};
use roadhound_core::world::{TickListener, World, WorldSettings};

use config::ServerConfig;
use persistence::SnapshotListener;
use records_db::SqliteRankingStore;
use state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to open records database: {0}")]
    Records(#[from] RankingError),
    #[error("failed to restore world snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Build the world, start its loop and assemble the router.
///
/// A `snapshot` replaces the fresh world state before the loop starts.
/// Records go to the configured SQLite file, or stay in memory without one.
/// The returned task finishes after [`world_loop::WorldHandle::stop`].
pub fn build_app(
    config: ServerConfig,
    game: GameConfig,
    snapshot: Option<WorldSnapshot>,
) -> Result<(Router<()>, AppState, JoinHandle<()>), StartupError> {
    let mut settings = WorldSettings::from_game(&game);
    if config.world.randomize_spawn_points {
        settings.spawn_mode = SpawnMode::Random;
    }
    settings.spawn_loot_on_join = config.world.spawn_loot_on_join;

    let maps = Arc::new(game.maps);
    let ranking: Arc<dyn RankingStore> = match config.records_db() {
        Some(path) => {
            tracing::info!(path = %path.display(), "Opening records database");
            Arc::new(SqliteRankingStore::open(path)?)
        },
        None => Arc::new(MemoryRankingStore::new()),
    };
    let mut world = World::new(
        Arc::clone(&maps),
        settings,
        Arc::clone(&ranking),
        config.world.rng_seed,
    );
    if let Some(snapshot) = snapshot {
        world.restore(snapshot)?;
    }

    let listener = config.state_file().map(|path| {
        Box::new(SnapshotListener::new(path.to_path_buf(), config.save_period()))
            as Box<dyn TickListener>
    });
    let (world, world_task) = world_loop::spawn_world_loop(world, config.tick_period(), listener);

    let web_root = config.web_root.clone();
    let state = AppState {
        world,
        maps,
        ranking,
        config: Arc::new(config),
    };

    let api_routes = api::router().layer(SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache"),
    ));

    let app = Router::new()
        .route("/health", axum::routing::get(health::health_check))
        .nest("/api/v1", api_routes)
        .fallback_service(ServeDir::new(&web_root))
        .layer(middleware::from_fn(request_log::log_requests))
        .with_state(state.clone());

    Ok((app, state, world_task))
}
