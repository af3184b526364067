use std::collections::BTreeMap;
use std::time::Duration;

use axum::Router;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};

use roadhound_core::dog::{DogId, LootId};
use roadhound_core::map::{Direction, Map, MapId};
use roadhound_core::ranking::MAX_RECORDS_PER_QUERY;

use crate::auth::AuthToken;
use crate::error::AppError;
use crate::state::AppState;

/// Routes mounted under `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/maps", get(list_maps))
        .route("/maps/{id}", get(get_map))
        .route("/game/join", post(join))
        .route("/game/players", get(players))
        .route("/game/state", get(game_state))
        .route("/game/player/action", post(action))
        .route("/game/tick", post(tick))
        .route("/game/records", get(records))
        .method_not_allowed_fallback(invalid_method)
        .fallback(bad_request)
}

async fn invalid_method() -> AppError {
    AppError::InvalidMethod("Invalid method".into())
}

async fn bad_request() -> AppError {
    AppError::BadRequest("Bad request".into())
}

#[derive(Debug, Serialize)]
pub struct MapSummary {
    pub id: String,
    pub name: String,
}

/// GET /api/v1/maps
pub async fn list_maps(State(state): State<AppState>) -> Json<Vec<MapSummary>> {
    Json(
        state
            .maps
            .iter()
            .map(|m| MapSummary {
                id: m.id.to_string(),
                name: m.name.clone(),
            })
            .collect(),
    )
}

#[derive(Debug, Serialize)]
pub struct RoadBody {
    x0: i64,
    y0: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    x1: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y1: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficeBody {
    id: String,
    x: i64,
    y: i64,
    offset_x: i64,
    offset_y: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MapBody {
    id: String,
    name: String,
    roads: Vec<RoadBody>,
    buildings: Vec<roadhound_core::map::Building>,
    offices: Vec<OfficeBody>,
    loot_types: Vec<serde_json::Value>,
}

impl From<&Map> for MapBody {
    fn from(map: &Map) -> Self {
        let roads = map
            .roads
            .iter()
            .map(|r| {
                let (x1, y1) = if r.is_horizontal() {
                    (Some(r.end.x as i64), None)
                } else {
                    (None, Some(r.end.y as i64))
                };
                RoadBody {
                    x0: r.start.x as i64,
                    y0: r.start.y as i64,
                    x1,
                    y1,
                }
            })
            .collect();
        let offices = map
            .offices
            .iter()
            .map(|o| OfficeBody {
                id: o.id.clone(),
                x: o.position.x as i64,
                y: o.position.y as i64,
                offset_x: o.offset_x,
                offset_y: o.offset_y,
            })
            .collect();
        Self {
            id: map.id.to_string(),
            name: map.name.clone(),
            roads,
            buildings: map.buildings.clone(),
            offices,
            loot_types: map.loot_types.clone(),
        }
    }
}

/// GET /api/v1/maps/{id}
pub async fn get_map(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MapBody>, AppError> {
    state
        .maps
        .get(&MapId::new(id))
        .map(|m| Json(MapBody::from(m.as_ref())))
        .ok_or_else(|| AppError::MapNotFound("Map not found".into()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub user_name: String,
    pub map_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub auth_token: String,
    pub player_id: DogId,
}

/// POST /api/v1/game/join
pub async fn join(
    State(state): State<AppState>,
    body: Result<Json<JoinRequest>, JsonRejection>,
) -> Result<Json<JoinResponse>, AppError> {
    let Json(req) =
        body.map_err(|e| AppError::InvalidArgument(format!("Join game request parse error: {e}")))?;
    let joined = state
        .world
        .join(req.user_name, MapId::new(req.map_id))
        .await?;
    Ok(Json(JoinResponse {
        auth_token: joined.token.as_str().to_string(),
        player_id: joined.dog_id,
    }))
}

#[derive(Debug, Serialize)]
pub struct PlayerName {
    pub name: String,
}

/// GET /api/v1/game/players
pub async fn players(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
) -> Result<Json<BTreeMap<DogId, PlayerName>>, AppError> {
    let players = state.world.players(token).await?;
    Ok(Json(
        players
            .into_iter()
            .map(|(id, name)| (id, PlayerName { name }))
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
pub struct BagItem {
    pub id: LootId,
    #[serde(rename = "type")]
    pub loot_type: usize,
}

#[derive(Debug, Serialize)]
pub struct PlayerState {
    pub pos: [f64; 2],
    pub speed: [f64; 2],
    pub dir: &'static str,
    pub bag: Vec<BagItem>,
    pub score: i64,
}

#[derive(Debug, Serialize)]
pub struct LostObjectState {
    #[serde(rename = "type")]
    pub loot_type: usize,
    pub pos: [f64; 2],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub players: BTreeMap<DogId, PlayerState>,
    pub lost_objects: BTreeMap<LootId, LostObjectState>,
}

/// GET /api/v1/game/state
pub async fn game_state(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
) -> Result<Json<GameState>, AppError> {
    let view = state.world.state(token).await?;
    let players = view
        .dogs
        .into_iter()
        .map(|d| {
            let player = PlayerState {
                pos: [d.position.x, d.position.y],
                speed: [d.velocity.vx, d.velocity.vy],
                dir: d.direction.as_letter(),
                bag: d
                    .bag
                    .into_iter()
                    .map(|(id, loot_type)| BagItem { id, loot_type })
                    .collect(),
                score: d.score,
            };
            (d.id, player)
        })
        .collect();
    let lost_objects = view
        .lost_objects
        .into_iter()
        .map(|(id, item)| {
            (
                id,
                LostObjectState {
                    loot_type: item.loot_type,
                    pos: [item.position.x, item.position.y],
                },
            )
        })
        .collect();
    Ok(Json(GameState {
        players,
        lost_objects,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    #[serde(rename = "move")]
    pub movement: String,
}

/// POST /api/v1/game/player/action
pub async fn action(
    State(state): State<AppState>,
    AuthToken(token): AuthToken,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(req) =
        body.map_err(|_| AppError::InvalidArgument("Failed to parse action".into()))?;
    let direction = if req.movement.is_empty() {
        None
    } else {
        Some(
            Direction::from_letter(&req.movement)
                .ok_or_else(|| AppError::InvalidArgument("Failed to parse action".into()))?,
        )
    };
    state.world.set_direction(token, direction).await?;
    Ok(Json(serde_json::json!({})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickRequest {
    pub time_delta: u64,
}

/// POST /api/v1/game/tick
pub async fn tick(
    State(state): State<AppState>,
    body: Result<Json<TickRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AppError> {
    if state.world.auto_tick() {
        return Err(AppError::BadRequest("Invalid endpoint".into()));
    }
    let Json(req) =
        body.map_err(|_| AppError::BadRequest("Failed to parse tick request JSON".into()))?;
    state
        .world
        .tick(Duration::from_millis(req.time_delta))
        .await?;
    Ok(Json(serde_json::json!({})))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordsQuery {
    #[serde(default)]
    pub start: usize,
    #[serde(default = "default_max_items")]
    pub max_items: usize,
}

fn default_max_items() -> usize {
    MAX_RECORDS_PER_QUERY
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordBody {
    pub name: String,
    pub score: i64,
    /// Seconds.
    pub play_time: f64,
}

/// GET /api/v1/game/records
pub async fn records(
    State(state): State<AppState>,
    query: Result<Query<RecordsQuery>, QueryRejection>,
) -> Result<Json<Vec<RecordBody>>, AppError> {
    let Query(q) = query.map_err(|e| AppError::InvalidArgument(e.body_text()))?;
    if q.max_items > MAX_RECORDS_PER_QUERY {
        return Err(AppError::InvalidArgument(format!(
            "maxItems must not exceed {MAX_RECORDS_PER_QUERY}"
        )));
    }

    // Store reads can block on a lock; keep them off the async workers.
    let ranking = std::sync::Arc::clone(&state.ranking);
    let rows = tokio::task::spawn_blocking(move || ranking.list(q.start, q.max_items))
        .await
        .map_err(|e| AppError::Internal(format!("ranking query task failed: {e}")))?
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(
        rows.into_iter()
            .map(|r| RecordBody {
                name: r.name,
                score: r.score,
                play_time: r.play_time.as_secs_f64(),
            })
            .collect(),
    ))
}
