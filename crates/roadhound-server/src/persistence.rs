use std::path::PathBuf;
use std::time::Duration;

use roadhound_core::snapshot;
use roadhound_core::world::{TickListener, World};

/// Saves the world to a snapshot file every `period` of game time and once
/// more when the world loop stops.
pub struct SnapshotListener {
    path: PathBuf,
    period: Option<Duration>,
    since_save: Duration,
}

impl SnapshotListener {
    pub fn new(path: PathBuf, period: Option<Duration>) -> Self {
        Self {
            path,
            period,
            since_save: Duration::ZERO,
        }
    }

    fn save(&mut self, world: &World) -> bool {
        self.since_save = Duration::ZERO;
        match snapshot::save_to_file(&self.path, &world.snapshot()) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(path = %self.path.display(), error = %e, "Failed to save world snapshot");
                false
            },
        }
    }
}

impl TickListener for SnapshotListener {
    fn on_tick(&mut self, world: &World, elapsed: Duration) {
        let Some(period) = self.period else {
            return;
        };
        self.since_save += elapsed;
        if self.since_save >= period {
            self.save(world);
        }
    }

    fn on_shutdown(&mut self, world: &World) {
        if self.save(world) {
            tracing::info!(path = %self.path.display(), "Saved world snapshot on shutdown");
        }
    }
}
