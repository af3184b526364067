use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, params};

use roadhound_core::ranking::{MAX_RECORDS_PER_QUERY, RankingError, RankingRecord, RankingStore};

/// Ranking store kept in a SQLite file so records outlive the process.
#[derive(Debug)]
pub struct SqliteRankingStore {
    conn: Mutex<Connection>,
}

fn unavailable(err: rusqlite::Error) -> RankingError {
    RankingError::Unavailable(err.to_string())
}

fn to_sql_int(value: u128) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl SqliteRankingStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RankingError> {
        let conn = Connection::open(path).map_err(unavailable)?;
        Self::from_connection(conn)
    }

    /// Store backed by a private in-memory database.
    pub fn open_in_memory() -> Result<Self, RankingError> {
        Self::from_connection(Connection::open_in_memory().map_err(unavailable)?)
    }

    fn from_connection(conn: Connection) -> Result<Self, RankingError> {
        // In-memory databases answer "memory" here; only files switch to WAL.
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(unavailable)?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS retired_players (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                score INTEGER NOT NULL,
                play_time_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_retired_players_rank
                ON retired_players (score DESC, play_time_ms ASC, name ASC);
            ",
        )
        .map_err(unavailable)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl RankingStore for SqliteRankingStore {
    fn append(&self, name: &str, score: i64, play_time: Duration) -> Result<(), RankingError> {
        let conn = self.conn.lock().map_err(|_| RankingError::Poisoned)?;
        conn.execute(
            "INSERT INTO retired_players (name, score, play_time_ms) VALUES (?1, ?2, ?3)",
            params![name, score, to_sql_int(play_time.as_millis())],
        )
        .map_err(unavailable)?;
        Ok(())
    }

    fn list(&self, offset: usize, limit: usize) -> Result<Vec<RankingRecord>, RankingError> {
        let conn = self.conn.lock().map_err(|_| RankingError::Poisoned)?;
        let mut stmt = conn
            .prepare(
                "SELECT name, score, play_time_ms
                 FROM retired_players
                 ORDER BY score DESC, play_time_ms ASC, name ASC
                 LIMIT ?1 OFFSET ?2",
            )
            .map_err(unavailable)?;

        let rows = stmt
            .query_map(
                params![
                    to_sql_int(limit.min(MAX_RECORDS_PER_QUERY) as u128),
                    to_sql_int(offset as u128)
                ],
                |row| {
                    let play_time_ms: i64 = row.get(2)?;
                    Ok(RankingRecord {
                        name: row.get(0)?,
                        score: row.get(1)?,
                        play_time: Duration::from_millis(u64::try_from(play_time_ms).unwrap_or(0)),
                    })
                },
            )
            .map_err(unavailable)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(records: &[RankingRecord]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    fn temp_db(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "roadhound-records-{tag}-{}-{}.db",
            std::process::id(),
            rand::random::<u32>()
        ))
    }

    fn remove_db(path: &Path) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.as_os_str().to_owned();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }

    #[test]
    fn orders_by_score_then_time_then_name() {
        let store = SqliteRankingStore::open_in_memory().unwrap();
        store.append("slow", 10, Duration::from_secs(50)).unwrap();
        store.append("best", 30, Duration::from_secs(90)).unwrap();
        store.append("fast", 10, Duration::from_secs(20)).unwrap();
        store.append("bob", 10, Duration::from_secs(50)).unwrap();
        store.append("none", 0, Duration::from_secs(1)).unwrap();

        let all = store.list(0, 100).unwrap();
        assert_eq!(names(&all), vec!["best", "fast", "bob", "slow", "none"]);
        assert_eq!(all[1].play_time, Duration::from_secs(20));
    }

    #[test]
    fn pagination_skips_and_caps() {
        let store = SqliteRankingStore::open_in_memory().unwrap();
        for i in 0..150 {
            store
                .append(&format!("dog{i:03}"), i, Duration::from_secs(1))
                .unwrap();
        }
        assert_eq!(store.list(0, 1000).unwrap().len(), MAX_RECORDS_PER_QUERY);

        let page = store.list(10, 5).unwrap();
        assert_eq!(page.len(), 5);
        assert_eq!(page[0].score, 139);

        assert!(store.list(200, 10).unwrap().is_empty());
        assert!(store.list(usize::MAX, usize::MAX).unwrap().is_empty());
    }

    #[test]
    fn records_survive_reopening_the_file() {
        let path = temp_db("reopen");
        {
            let store = SqliteRankingStore::open(&path).unwrap();
            store.append("Rex", 20, Duration::from_millis(61_500)).unwrap();
        }

        let store = SqliteRankingStore::open(&path).unwrap();
        store.append("Fido", 30, Duration::from_secs(10)).unwrap();
        let all = store.list(0, 10).unwrap();
        drop(store);
        remove_db(&path);

        assert_eq!(names(&all), vec!["Fido", "Rex"]);
        assert_eq!(all[1].play_time, Duration::from_millis(61_500));
    }

    #[test]
    fn unwritable_path_is_unavailable() {
        let err = SqliteRankingStore::open("/definitely/not/a/dir/records.db").unwrap_err();
        assert!(matches!(err, RankingError::Unavailable(_)));
    }
}
