use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub auto_tick: bool,
    pub world: WorldInfo,
}

#[derive(Serialize)]
pub struct WorldInfo {
    pub maps: usize,
    pub sessions: usize,
    pub dogs: usize,
    pub players: usize,
}

/// Server status plus live world counters. Fails with 500 once the world
/// loop has stopped.
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let stats = state.world.stats().await?;
    Ok(Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        auto_tick: state.world.auto_tick(),
        world: WorldInfo {
            maps: state.maps.len(),
            sessions: stats.sessions,
            dogs: stats.dogs,
            players: stats.players,
        },
    }))
}
