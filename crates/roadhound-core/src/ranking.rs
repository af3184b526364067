use std::cmp::Ordering;
use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Upper bound on the rows returned by one ranking query.
pub const MAX_RECORDS_PER_QUERY: usize = 100;

/// Final result of a retired dog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRecord {
    pub name: String,
    pub score: i64,
    pub play_time: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum RankingError {
    #[error("ranking store lock poisoned")]
    Poisoned,
    #[error("ranking store unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of retirement records.
pub trait RankingStore: Send + Sync {
    fn append(&self, name: &str, score: i64, play_time: Duration) -> Result<(), RankingError>;

    /// Records ordered by score descending, then play time ascending, then
    /// name. `limit` is capped at [`MAX_RECORDS_PER_QUERY`].
    fn list(&self, offset: usize, limit: usize) -> Result<Vec<RankingRecord>, RankingError>;
}

fn rank_order(a: &RankingRecord, b: &RankingRecord) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| a.play_time.cmp(&b.play_time))
        .then_with(|| a.name.cmp(&b.name))
}

/// In-process ranking store. Records live as long as the process.
#[derive(Debug, Default)]
pub struct MemoryRankingStore {
    records: RwLock<Vec<RankingRecord>>,
}

impl MemoryRankingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RankingStore for MemoryRankingStore {
    fn append(&self, name: &str, score: i64, play_time: Duration) -> Result<(), RankingError> {
        let mut records = self.records.write().map_err(|_| RankingError::Poisoned)?;
        let record = RankingRecord {
            name: name.to_owned(),
            score,
            play_time,
        };
        // Keep the vector sorted so reads are a plain slice.
        let at = records.partition_point(|r| rank_order(r, &record) != Ordering::Greater);
        records.insert(at, record);
        Ok(())
    }

    fn list(&self, offset: usize, limit: usize) -> Result<Vec<RankingRecord>, RankingError> {
        let records = self.records.read().map_err(|_| RankingError::Poisoned)?;
        Ok(records
            .iter()
            .skip(offset)
            .take(limit.min(MAX_RECORDS_PER_QUERY))
            .cloned()
            .collect())
    }
}
