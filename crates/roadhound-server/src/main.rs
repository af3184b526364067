use std::path::PathBuf;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use roadhound_core::{loader, snapshot};
use roadhound_server::build_app;
use roadhound_server::config::{DEFAULT_CONFIG_PATH, ServerConfig};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var_os("ROADHOUND_LOG_JSON").is_some() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let config_path = std::env::args()
        .skip(1)
        .find_map(|a| a.strip_prefix("--config=").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = match ServerConfig::load(&config_path).and_then(|c| c.validate().map(|()| c)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid server configuration");
            return ExitCode::FAILURE;
        },
    };

    let game = match loader::load_game(std::path::Path::new(&config.game_config)) {
        Ok(game) => game,
        Err(e) => {
            tracing::error!(path = %config.game_config, error = %e, "Failed to load game config");
            return ExitCode::FAILURE;
        },
    };

    let saved = match config.state_file().map(snapshot::load_from_file).transpose() {
        Ok(saved) => saved.flatten(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to read world snapshot");
            return ExitCode::FAILURE;
        },
    };

    let listen_addr = config.listen_addr.clone();
    let (app, state, world_task) = match build_app(config, game, saved) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start the world");
            return ExitCode::FAILURE;
        },
    };

    let listener = match tokio::net::TcpListener::bind(&listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(addr = %listen_addr, error = %e, "Failed to bind");
            state.world.stop();
            let _ = world_task.await;
            return ExitCode::FAILURE;
        },
    };
    tracing::info!(addr = %listen_addr, maps = state.maps.len(), "Roadhound server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    state.world.stop();
    if let Err(e) = world_task.await {
        tracing::error!(error = %e, "World loop task failed");
    }

    match served {
        Ok(()) => {
            tracing::info!("Server stopped");
            ExitCode::SUCCESS
        },
        Err(e) => {
            tracing::error!(error = %e, "Server error");
            ExitCode::FAILURE
        },
    }
}
