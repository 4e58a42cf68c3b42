use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;
use crate::types::{format_timestamp, parse_timestamp, IdentifierRecord, MetricsEntry};

pub const DEFAULT_DB_PATH: &str = "data/scout.sqlite";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

type Result<T> = std::result::Result<T, StoreError>;

/// Append-only identifier and run-metrics store on SQLite.
///
/// Uniqueness lives in the schema, so separate `Store` handles on the same
/// file (threads or processes) can insert concurrently. One handle may also
/// be shared across tasks; each statement locks the connection for its
/// duration only.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
                path: dir.display().to_string(),
                source,
            })?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Store {
            conn: Mutex::new(conn),
        })
    }

    // A panic mid-statement leaves no partial state behind in SQLite.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `true` if a record was created, `false` if `id` was already stored.
    pub fn insert_if_absent(&self, id: &str, seen_at: &DateTime<Utc>) -> Result<bool> {
        let changed = self.conn().execute(
            "INSERT INTO identifiers (id, first_seen) VALUES (?1, ?2)
             ON CONFLICT(id) DO NOTHING",
            params![id, format_timestamp(seen_at)],
        )?;
        Ok(changed == 1)
    }

    /// `false` when an entry for the same `run_time` already exists.
    pub fn record_metrics(&self, entry: &MetricsEntry) -> Result<bool> {
        let changed = self.conn().execute(
            "INSERT INTO run_metrics (run_time, found, added) VALUES (?1, ?2, ?3)
             ON CONFLICT(run_time) DO NOTHING",
            params![format_timestamp(&entry.run_time), entry.found, entry.added],
        )?;
        Ok(changed == 1)
    }

    /// Full metrics history, oldest first.
    pub fn query_metrics(&self) -> Result<Vec<MetricsEntry>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT run_time, found, added FROM run_metrics ORDER BY run_time ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?, row.get::<_, u64>(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(ts, found, added)| to_entry(ts, found, added))
            .collect()
    }

    pub fn latest_metrics(&self) -> Result<Option<MetricsEntry>> {
        let row = self
            .conn()
            .query_row(
                "SELECT run_time, found, added FROM run_metrics ORDER BY run_time DESC LIMIT 1",
                [],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, u64>(1)?, row.get::<_, u64>(2)?)),
            )
            .optional()?;
        row.map(|(ts, found, added)| to_entry(ts, found, added))
            .transpose()
    }

    pub fn count_records(&self) -> Result<u64> {
        let n: u64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM identifiers", [], |r| r.get(0))?;
        Ok(n)
    }

    /// Identifiers first seen within `[start, end]`, sorted.
    pub fn query_records_in_range(
        &self,
        start: &DateTime<Utc>,
        end: &DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id FROM identifiers
             WHERE first_seen >= ?1 AND first_seen <= ?2
             ORDER BY id",
        )?;
        let ids = stmt
            .query_map(params![format_timestamp(start), format_timestamp(end)], |row| {
                row.get(0)
            })?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    pub fn get_record(&self, id: &str) -> Result<Option<IdentifierRecord>> {
        let ts: Option<String> = self
            .conn()
            .query_row(
                "SELECT first_seen FROM identifiers WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()?;
        ts.map(|s| {
            let first_seen = parse_timestamp(&s).ok_or(StoreError::BadTimestamp(s))?;
            Ok(IdentifierRecord {
                id: id.to_string(),
                first_seen,
            })
        })
        .transpose()
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS identifiers (
            id         TEXT PRIMARY KEY,
            first_seen TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_identifiers_first_seen ON identifiers(first_seen);

        CREATE TABLE IF NOT EXISTS run_metrics (
            run_time TEXT PRIMARY KEY,
            found    INTEGER NOT NULL CHECK(found >= 0),
            added    INTEGER NOT NULL CHECK(added >= 0 AND added <= found)
        );
        ",
    )?;
    Ok(())
}

fn to_entry(ts: String, found: u64, added: u64) -> Result<MetricsEntry> {
    let run_time = parse_timestamp(&ts).ok_or(StoreError::BadTimestamp(ts))?;
    Ok(MetricsEntry {
        run_time,
        found,
        added,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::sync::{Arc, Barrier};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap()
    }

    #[test]
    fn insert_is_idempotent_and_keeps_first_timestamp() {
        let store = Store::open_in_memory().unwrap();
        let later = t0() + ChronoDuration::hours(1);
        assert!(store.insert_if_absent("2401.00001", &t0()).unwrap());
        assert!(!store.insert_if_absent("2401.00001", &later).unwrap());
        assert_eq!(store.count_records().unwrap(), 1);
        assert_eq!(store.get_record("2401.00001").unwrap().map(|r| r.first_seen), Some(t0()));
        assert_eq!(store.get_record("missing").unwrap(), None);
    }

    #[test]
    fn concurrent_inserts_of_same_id_yield_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scout.sqlite");
        Store::open(&path).unwrap();

        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));
        let handles: Vec<_> = (0..workers)
            .map(|i| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let store = Store::open(&path).unwrap();
                    let ts = t0() + ChronoDuration::seconds(i as i64);
                    barrier.wait();
                    store.insert_if_absent("1111.22222", &ts).unwrap()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(Store::open(&path).unwrap().count_records().unwrap(), 1);
    }

    #[test]
    fn concurrent_metrics_for_same_run_time_yield_one_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scout.sqlite");
        Store::open(&path).unwrap();

        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));
        let handles: Vec<_> = (0..workers)
            .map(|i| {
                let path = path.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    let store = Store::open(&path).unwrap();
                    let entry = MetricsEntry {
                        run_time: t0(),
                        found: 10 + i as u64,
                        added: i as u64,
                    };
                    barrier.wait();
                    store.record_metrics(&entry).unwrap()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(wins, 1);
        assert_eq!(Store::open(&path).unwrap().query_metrics().unwrap().len(), 1);
    }

    #[test]
    fn one_handle_shared_across_threads() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let mut added = 0u64;
                    for n in 0..10 {
                        // ids overlap between neighbouring threads
                        let id = format!("2401.{:05}", i * 5 + n);
                        if store.insert_if_absent(&id, &t0()).unwrap() {
                            added += 1;
                        }
                    }
                    added
                })
            })
            .collect();

        let added: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(added, 25);
        assert_eq!(store.count_records().unwrap(), 25);
    }

    #[test]
    fn metrics_collision_is_reported_not_raised() {
        let store = Store::open_in_memory().unwrap();
        let entry = MetricsEntry {
            run_time: t0(),
            found: 5,
            added: 3,
        };
        assert!(store.record_metrics(&entry).unwrap());
        let again = MetricsEntry { found: 9, added: 9, ..entry };
        assert!(!store.record_metrics(&again).unwrap());
        assert_eq!(store.query_metrics().unwrap(), vec![entry]);
    }

    #[test]
    fn metrics_history_is_ascending() {
        let store = Store::open_in_memory().unwrap();
        for (h, found) in [(3, 30u64), (1, 10), (2, 20)] {
            let entry = MetricsEntry {
                run_time: t0() + ChronoDuration::hours(h),
                found,
                added: found / 2,
            };
            store.record_metrics(&entry).unwrap();
        }
        let found: Vec<u64> = store.query_metrics().unwrap().iter().map(|e| e.found).collect();
        assert_eq!(found, vec![10, 20, 30]);
        assert_eq!(store.latest_metrics().unwrap().map(|e| e.found), Some(30));
    }

    #[test]
    fn added_above_found_is_rejected_by_schema() {
        let store = Store::open_in_memory().unwrap();
        let bad = MetricsEntry {
            run_time: t0(),
            found: 1,
            added: 2,
        };
        assert!(store.record_metrics(&bad).is_err());
    }

    #[test]
    fn range_query_bounds_are_inclusive() {
        let store = Store::open_in_memory().unwrap();
        let start = t0();
        let end = t0() + ChronoDuration::days(1);
        let tick = ChronoDuration::microseconds(1);

        store.insert_if_absent("c-at-start", &start).unwrap();
        store.insert_if_absent("a-at-end", &end).unwrap();
        store.insert_if_absent("b-inside", &(start + ChronoDuration::hours(5))).unwrap();
        store.insert_if_absent("before", &(start - tick)).unwrap();
        store.insert_if_absent("after", &(end + tick)).unwrap();

        assert_eq!(
            store.query_records_in_range(&start, &end).unwrap(),
            vec!["a-at-end", "b-inside", "c-at-start"]
        );
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/scout.sqlite");
        let store = Store::open(&path).unwrap();
        assert_eq!(store.count_records().unwrap(), 0);
        assert!(path.exists());
    }
}
