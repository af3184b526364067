use std::time::Duration;

use crate::dog::{Dog, DogId};
use crate::map::MapId;
use crate::ranking::RankingStore;
use crate::registry::PlayerRegistry;
use crate::session::Session;

/// A dog leaving the game after idling past its player's threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct RetiredDog {
    pub dog_id: DogId,
    pub map_id: MapId,
    pub name: String,
    pub score: i64,
    pub play_time: Duration,
}

impl RetiredDog {
    fn from_dog(map_id: &MapId, dog: &Dog) -> Self {
        Self {
            dog_id: dog.id,
            map_id: map_id.clone(),
            name: dog.name.clone(),
            score: dog.score,
            play_time: dog.play_time,
        }
    }
}

/// Dogs of `session` whose idle time has reached their retirement threshold.
///
/// A dog with no bound player is never flagged.
pub fn flag_idle_dogs(map_id: &MapId, session: &Session, registry: &PlayerRegistry) -> Vec<RetiredDog> {
    session
        .dogs()
        .filter(|dog| {
            registry
                .find_by_dog(dog.id, map_id)
                .is_some_and(|player| dog.idle_time >= player.retire_after)
        })
        .map(|dog| RetiredDog::from_dog(map_id, dog))
        .collect()
}

/// Write one ranking record per retiree. Failures are logged and skipped.
/// Returns the number of records written.
pub fn record_retirees(store: &dyn RankingStore, retirees: &[RetiredDog]) -> usize {
    let mut written = 0;
    for dog in retirees {
        match store.append(&dog.name, dog.score, dog.play_time) {
            Ok(()) => written += 1,
            Err(e) => {
                tracing::warn!(
                    dog_id = dog.dog_id,
                    map = %dog.map_id,
                    error = %e,
                    "Failed to record retired dog"
                );
            },
        }
    }
    written
}
