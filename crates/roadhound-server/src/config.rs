use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Default location of the server config file.
pub const DEFAULT_CONFIG_PATH: &str = "roadhound.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level server configuration, loaded from `roadhound.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub web_root: String,
    /// Path of the JSON game document with the map definitions.
    pub game_config: String,
    pub world: WorldConfig,
    pub persistence: PersistenceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            web_root: "static".to_string(),
            game_config: "data/config.json".to_string(),
            world: WorldConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

/// Simulation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Period of the internal tick timer. Without it the world only advances
    /// through `POST /api/v1/game/tick`.
    pub tick_period_ms: Option<u64>,
    pub randomize_spawn_points: bool,
    pub spawn_loot_on_join: bool,
    /// Fixed seed for the world's random source, for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: None,
            randomize_spawn_points: false,
            spawn_loot_on_join: true,
            rng_seed: None,
        }
    }
}

/// Snapshot persistence settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// File the world is restored from at startup and saved to.
    pub state_file: Option<String>,
    /// Save every this many milliseconds of game time. Without it the world
    /// is saved only on shutdown.
    pub save_state_period_ms: Option<u64>,
    /// SQLite file holding the retirement records. Without it records are
    /// kept in memory and lost on restart.
    pub records_db: Option<String>,
}

impl ServerConfig {
    pub fn tick_period(&self) -> Option<Duration> {
        self.world.tick_period_ms.map(Duration::from_millis)
    }

    pub fn save_period(&self) -> Option<Duration> {
        self.persistence.save_state_period_ms.map(Duration::from_millis)
    }

    pub fn state_file(&self) -> Option<&Path> {
        self.persistence.state_file.as_deref().map(Path::new)
    }

    pub fn records_db(&self) -> Option<&Path> {
        self.persistence.records_db.as_deref().map(Path::new)
    }

    /// Check for settings the server cannot start with, logging warnings for
    /// merely suspicious ones.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "listen_addr {:?} is not a valid socket address",
                self.listen_addr
            )));
        }
        if self.game_config.is_empty() {
            return Err(ConfigError::Invalid("game_config must be set".into()));
        }
        if self.world.tick_period_ms == Some(0) {
            return Err(ConfigError::Invalid("world.tick_period_ms must be > 0".into()));
        }
        if self.persistence.save_state_period_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "persistence.save_state_period_ms must be > 0".into(),
            ));
        }
        if self.persistence.save_state_period_ms.is_some() && self.persistence.state_file.is_none() {
            tracing::warn!("save_state_period_ms is set without state_file; nothing will be saved");
        }
        Ok(())
    }

    /// Load config from `path` if it exists, then apply env var overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg = toml::from_str::<ServerConfig>(&content).map_err(|source| {
                    ConfigError::Parse {
                        path: path.to_path_buf(),
                        source,
                    }
                })?;
                tracing::info!(path = %path.display(), "Loaded configuration");
                cfg
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file found, using defaults");
                ServerConfig::default()
            },
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `ROADHOUND_*` overrides looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = var("ROADHOUND_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Some(root) = var("ROADHOUND_WEB_ROOT")
            && !root.is_empty()
        {
            self.web_root = root;
        }
        if let Some(game) = var("ROADHOUND_GAME_CONFIG")
            && !game.is_empty()
        {
            self.game_config = game;
        }
        if let Some(val) = var("ROADHOUND_TICK_PERIOD_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            self.world.tick_period_ms = Some(ms);
        }
        if let Some(val) = var("ROADHOUND_RANDOMIZE_SPAWN_POINTS")
            && let Ok(flag) = val.parse::<bool>()
        {
            self.world.randomize_spawn_points = flag;
        }
        if let Some(val) = var("ROADHOUND_RNG_SEED")
            && let Ok(seed) = val.parse::<u64>()
        {
            self.world.rng_seed = Some(seed);
        }
        if let Some(file) = var("ROADHOUND_STATE_FILE")
            && !file.is_empty()
        {
            self.persistence.state_file = Some(file);
        }
        if let Some(val) = var("ROADHOUND_SAVE_STATE_PERIOD_MS")
            && let Ok(ms) = val.parse::<u64>()
        {
            self.persistence.save_state_period_ms = Some(ms);
        }
        if let Some(db) = var("ROADHOUND_RECORDS_DB")
            && !db.is_empty()
        {
            self.persistence.records_db = Some(db);
        }
    }
}
