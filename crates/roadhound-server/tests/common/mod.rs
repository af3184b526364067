use std::net::SocketAddr;
use std::time::Duration;

use roadhound_core::loader::parse_game;
use roadhound_core::snapshot;
use roadhound_core::test_helpers::SAMPLE_GAME_JSON;

use roadhound_server::build_app;
use roadhound_server::config::ServerConfig;
use roadhound_server::state::AppState;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    world_task: tokio::task::JoinHandle<()>,
    _serve: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Manual ticks, no persistence.
    pub async fn new() -> Self {
        Self::with_config(ServerConfig::default()).await
    }

    /// Start a server over the sample maps, restoring from the config's
    /// state file when one exists.
    pub async fn with_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let game = parse_game(SAMPLE_GAME_JSON).unwrap();
        let saved = config
            .state_file()
            .and_then(|path| snapshot::load_from_file(path).unwrap());
        let (app, state, world_task) = build_app(config, game, saved).unwrap();

        let serve = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            state,
            world_task,
            _serve: serve,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn api(&self, path: &str) -> String {
        format!("http://{}/api/v1{path}", self.addr)
    }

    /// Stop the world loop and wait for its shutdown hook to finish.
    pub async fn stop_world(self) {
        self.state.world.stop();
        self.world_task.await.unwrap();
    }
}

/// Join `map_id` as `name`, returning `(token, player_id)`.
pub async fn join(server: &TestServer, name: &str, map_id: &str) -> (String, u64) {
    let resp = reqwest::Client::new()
        .post(server.api("/game/join"))
        .json(&serde_json::json!({ "userName": name, "mapId": map_id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    (
        body["authToken"].as_str().unwrap().to_string(),
        body["playerId"].as_u64().unwrap(),
    )
}

pub async fn tick(server: &TestServer, ms: u64) -> reqwest::Response {
    reqwest::Client::new()
        .post(server.api("/game/tick"))
        .json(&serde_json::json!({ "timeDelta": ms }))
        .send()
        .await
        .unwrap()
}

pub async fn game_state(server: &TestServer, token: &str) -> serde_json::Value {
    let resp = reqwest::Client::new()
        .get(server.api("/game/state"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    resp.json().await.unwrap()
}

pub fn temp_state_file(tag: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!(
        "roadhound-it-{tag}-{}-{}.bin",
        std::process::id(),
        rand::random::<u32>()
    ))
}

pub fn temp_db_file(tag: &str) -> std::path::PathBuf {
    temp_state_file(tag).with_extension("db")
}

/// Remove a SQLite file together with its WAL side files.
pub fn remove_db_files(path: &std::path::Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}
