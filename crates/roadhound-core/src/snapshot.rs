//! Crash-recoverable snapshots of the live world.
//!
//! Wire format: one version byte followed by a MessagePack payload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dog::{Dog, DogId, LootId, LostObject};
use crate::map::MapId;
use crate::registry::Token;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 2;

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("failed to decode snapshot: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("snapshot is empty")]
    Empty,
    #[error("unsupported snapshot version {0} (expected {SNAPSHOT_VERSION})")]
    UnsupportedVersion(u8),
    #[error("snapshot references unknown map {0}")]
    UnknownMap(MapId),
    #[error("snapshot contains map {0} more than once")]
    DuplicateSession(MapId),
    #[error("snapshot contains dog {0} more than once")]
    DuplicateDog(DogId),
    #[error("snapshot binds one token to several dogs")]
    DuplicateToken,
    #[error("snapshot id {0} leaves no room for new ids")]
    IdOverflow(u64),
}

/// A dog together with the player binding that owns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DogRecord {
    pub dog: Dog,
    pub token: Token,
    pub retire_after: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub map_id: MapId,
    pub next_loot_id: LootId,
    /// Loot admission accumulator.
    pub time_without_loot: Duration,
    pub dogs: Vec<DogRecord>,
    pub lost_objects: Vec<(LootId, LostObject)>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub next_dog_id: DogId,
    pub sessions: Vec<SessionSnapshot>,
}

impl WorldSnapshot {
    pub fn dog_count(&self) -> usize {
        self.sessions.iter().map(|s| s.dogs.len()).sum()
    }
}

pub fn encode(snapshot: &WorldSnapshot) -> Result<Vec<u8>, SnapshotError> {
    let payload = rmp_serde::to_vec(snapshot)?;
    let mut buf = Vec::with_capacity(1 + payload.len());
    buf.push(SNAPSHOT_VERSION);
    buf.extend_from_slice(&payload);
    Ok(buf)
}

pub fn decode(data: &[u8]) -> Result<WorldSnapshot, SnapshotError> {
    let (&version, payload) = data.split_first().ok_or(SnapshotError::Empty)?;
    if version != SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(version));
    }
    Ok(rmp_serde::from_slice(payload)?)
}

/// Write `snapshot` to `path` through a sibling temp file, so a crash
/// mid-write leaves the previous file intact.
pub fn save_to_file(path: &Path, snapshot: &WorldSnapshot) -> Result<(), SnapshotError> {
    let bytes = encode(snapshot)?;
    let tmp = temp_path(path);
    std::fs::write(&tmp, &bytes).map_err(|source| SnapshotError::Io {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(
        path = %path.display(),
        bytes = bytes.len(),
        dogs = snapshot.dog_count(),
        "Saved world snapshot"
    );
    Ok(())
}

/// Read a snapshot from `path`. A missing file means a fresh start.
pub fn load_from_file(path: &Path) -> Result<Option<WorldSnapshot>, SnapshotError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            });
        },
    };
    decode(&bytes).map(Some)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
