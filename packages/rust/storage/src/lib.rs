//! libSQL storage layer for the airport status history.
//!
//! The [`Storage`] struct wraps a libSQL database holding the airport
//! registry, the status event log, the processed-entry ledger, and poll run
//! history. The poller opens it read-write (sole writer); reporting commands
//! may use [`Storage::open_readonly`].

mod migrations;

use std::path::Path;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};
use uuid::Uuid;

use skywatch_shared::{
    AirportRecord, Icao, Result, SkywatchError, Status, StatusEvent, StatusSnapshot,
};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SkywatchError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SkywatchError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| SkywatchError::Storage(e.to_string()))?;

        let storage = Self {
            db,
            conn,
            readonly: false,
        };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open a database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| SkywatchError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| SkywatchError::Storage(e.to_string()))?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    SkywatchError::Storage(format!(
                        "migration v{} failed: {e}",
                        migration.version
                    ))
                })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(SkywatchError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Airport operations
    // -----------------------------------------------------------------------

    /// Insert an airport or update its display name.
    pub async fn upsert_airport(&self, icao: &Icao, name: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO airports (icao, name, current_status, updated_at)
                 VALUES (?1, ?2, NULL, ?3)
                 ON CONFLICT(icao) DO UPDATE SET
                   name = excluded.name,
                   updated_at = excluded.updated_at",
                params![icao.as_str(), name, now.as_str()],
            )
            .await
            .map_err(|e| SkywatchError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Get an airport with its full event history.
    pub async fn get_airport(&self, icao: &Icao) -> Result<Option<AirportRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT icao, name, current_status FROM airports WHERE icao = ?1",
                params![icao.as_str()],
            )
            .await
            .map_err(|e| SkywatchError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let mut record = row_to_airport(&row)?;
                record.events = self.list_events(icao).await?;
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(SkywatchError::Storage(e.to_string())),
        }
    }

    /// Load the full tracked state: all airports with their event histories.
    pub async fn load_snapshot(&self) -> Result<StatusSnapshot> {
        let mut snapshot = StatusSnapshot::default();

        let mut rows = self
            .conn
            .query(
                "SELECT icao, name, current_status FROM airports ORDER BY icao",
                params![],
            )
            .await
            .map_err(|e| SkywatchError::Storage(e.to_string()))?;

        while let Ok(Some(row)) = rows.next().await {
            let record = row_to_airport(&row)?;
            snapshot.airports.insert(record.icao.clone(), record);
        }

        let mut rows = self
            .conn
            .query(
                "SELECT icao, ts, status, entry_id FROM events ORDER BY icao, ts",
                params![],
            )
            .await
            .map_err(|e| SkywatchError::Storage(e.to_string()))?;

        while let Ok(Some(row)) = rows.next().await {
            let icao_str: String = row
                .get(0)
                .map_err(|e| SkywatchError::Storage(e.to_string()))?;
            let icao: Icao = icao_str.parse()?;
            let event = StatusEvent {
                ts: parse_ts(&row.get::<String>(1).map_err(storage_err)?)?,
                status: row.get::<String>(2).map_err(storage_err)?.parse()?,
                entry_id: row.get::<String>(3).ok(),
            };
            if let Some(record) = snapshot.airports.get_mut(&icao) {
                record.events.push(event);
            }
        }

        Ok(snapshot)
    }

    // -----------------------------------------------------------------------
    // Event operations
    // -----------------------------------------------------------------------

    /// Insert a status event. Returns `false` if this feed entry already
    /// produced an event for this airport.
    pub async fn insert_event(
        &self,
        icao: &Icao,
        ts: DateTime<Utc>,
        status: Status,
        entry_id: &str,
    ) -> Result<bool> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        let affected = self
            .conn
            .execute(
                "INSERT INTO events (id, icao, ts, status, entry_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(icao, entry_id) DO NOTHING",
                params![
                    id.as_str(),
                    icao.as_str(),
                    ts.to_rfc3339(),
                    status.as_str(),
                    entry_id,
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| SkywatchError::Storage(e.to_string()))?;
        Ok(affected > 0)
    }

    /// List an airport's events, ascending by timestamp.
    pub async fn list_events(&self, icao: &Icao) -> Result<Vec<StatusEvent>> {
        let mut rows = self
            .conn
            .query(
                "SELECT ts, status, entry_id FROM events WHERE icao = ?1 ORDER BY ts",
                params![icao.as_str()],
            )
            .await
            .map_err(|e| SkywatchError::Storage(e.to_string()))?;

        let mut events = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            events.push(StatusEvent {
                ts: parse_ts(&row.get::<String>(0).map_err(storage_err)?)?,
                status: row.get::<String>(1).map_err(storage_err)?.parse()?,
                entry_id: row.get::<String>(2).ok(),
            });
        }
        Ok(events)
    }

    /// Recompute an airport's `current_status` from its latest event.
    pub async fn refresh_current_status(&self, icao: &Icao) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE airports SET
                   current_status = (
                     SELECT status FROM events
                     WHERE icao = ?1 ORDER BY ts DESC LIMIT 1
                   ),
                   updated_at = ?2
                 WHERE icao = ?1",
                params![icao.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| SkywatchError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Feed entry ledger
    // -----------------------------------------------------------------------

    /// Whether a feed entry has already been processed.
    pub async fn has_seen_entry(&self, entry_id: &str) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM feed_entries WHERE id = ?1",
                params![entry_id],
            )
            .await
            .map_err(|e| SkywatchError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(_)) => Ok(true),
            Ok(None) => Ok(false),
            Err(e) => Err(SkywatchError::Storage(e.to_string())),
        }
    }

    /// Record a feed entry as processed (idempotent).
    pub async fn mark_entry_seen(
        &self,
        entry_id: &str,
        content_hash: &str,
        published: DateTime<Utc>,
    ) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO feed_entries (id, content_hash, published, seen_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO NOTHING",
                params![
                    entry_id,
                    content_hash,
                    published.to_rfc3339(),
                    now.as_str()
                ],
            )
            .await
            .map_err(|e| SkywatchError::Storage(e.to_string()))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Poll run operations
    // -----------------------------------------------------------------------

    /// Insert a new poll run. Returns the generated run ID.
    pub async fn insert_poll_run(&self) -> Result<String> {
        self.check_writable()?;
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO poll_runs (id, started_at) VALUES (?1, ?2)",
                params![id.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| SkywatchError::Storage(e.to_string()))?;
        Ok(id)
    }

    /// Update a poll run with completion data.
    pub async fn finish_poll_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE poll_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(|e| SkywatchError::Storage(e.to_string()))?;
        Ok(())
    }
}

fn storage_err(e: libsql::Error) -> SkywatchError {
    SkywatchError::Storage(e.to_string())
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SkywatchError::Storage(format!("invalid timestamp '{s}': {e}")))
}

/// Convert an `airports` row to an [`AirportRecord`] (events not populated).
fn row_to_airport(row: &libsql::Row) -> Result<AirportRecord> {
    let icao_str: String = row.get(0).map_err(storage_err)?;
    let current: Option<Status> = match row.get::<String>(2) {
        Ok(s) => Some(s.parse()?),
        Err(_) => None,
    };
    Ok(AirportRecord {
        icao: icao_str.parse()?,
        name: row.get::<String>(1).map_err(storage_err)?,
        current,
        events: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("skywatch_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn icao(code: &str) -> Icao {
        code.parse().unwrap()
    }

    fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 17, hour, minute, 0).unwrap()
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("skywatch_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn airport_upsert_and_get() {
        let storage = test_storage().await;
        let uuww = icao("UUWW");

        storage
            .upsert_airport(&uuww, "Внуково")
            .await
            .expect("insert airport");

        let record = storage.get_airport(&uuww).await.expect("get").unwrap();
        assert_eq!(record.name, "Внуково");
        assert_eq!(record.current, None);
        assert!(record.events.is_empty());

        // Upsert updates the display name.
        storage
            .upsert_airport(&uuww, "Внуково (Москва)")
            .await
            .expect("upsert again");
        let record = storage.get_airport(&uuww).await.unwrap().unwrap();
        assert_eq!(record.name, "Внуково (Москва)");

        assert!(storage.get_airport(&icao("ZZZZ")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn event_insert_is_idempotent_per_entry() {
        let storage = test_storage().await;
        let uuww = icao("UUWW");
        storage.upsert_airport(&uuww, "Внуково").await.unwrap();

        let inserted = storage
            .insert_event(&uuww, ts(10, 0), Status::Closed, "urn:post:1")
            .await
            .expect("insert event");
        assert!(inserted);

        // Same entry again: ignored.
        let inserted = storage
            .insert_event(&uuww, ts(10, 0), Status::Closed, "urn:post:1")
            .await
            .expect("insert duplicate");
        assert!(!inserted);

        let events = storage.list_events(&uuww).await.expect("list events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, Status::Closed);
        assert_eq!(events[0].entry_id.as_deref(), Some("urn:post:1"));
    }

    #[tokio::test]
    async fn current_status_follows_latest_event() {
        let storage = test_storage().await;
        let uuww = icao("UUWW");
        storage.upsert_airport(&uuww, "Внуково").await.unwrap();

        storage
            .insert_event(&uuww, ts(10, 0), Status::Closed, "urn:post:1")
            .await
            .unwrap();
        storage
            .insert_event(&uuww, ts(11, 30), Status::Open, "urn:post:2")
            .await
            .unwrap();
        storage.refresh_current_status(&uuww).await.unwrap();

        let record = storage.get_airport(&uuww).await.unwrap().unwrap();
        assert_eq!(record.current, Some(Status::Open));

        // A backfilled earlier event must not change the current status.
        storage
            .insert_event(&uuww, ts(9, 0), Status::Closed, "urn:post:0")
            .await
            .unwrap();
        storage.refresh_current_status(&uuww).await.unwrap();
        let record = storage.get_airport(&uuww).await.unwrap().unwrap();
        assert_eq!(record.current, Some(Status::Open));
        assert_eq!(record.events.len(), 3);
        // Events come back in ascending order.
        assert!(record.events.windows(2).all(|w| w[0].ts <= w[1].ts));
    }

    #[tokio::test]
    async fn snapshot_contains_all_airports_and_events() {
        let storage = test_storage().await;
        let uuww = icao("UUWW");
        let ulli = icao("ULLI");
        storage.upsert_airport(&uuww, "Внуково").await.unwrap();
        storage.upsert_airport(&ulli, "Пулково").await.unwrap();

        storage
            .insert_event(&uuww, ts(10, 0), Status::Closed, "urn:post:1")
            .await
            .unwrap();
        storage
            .insert_event(&ulli, ts(10, 5), Status::Closed, "urn:post:1")
            .await
            .unwrap();
        storage
            .insert_event(&ulli, ts(11, 0), Status::Open, "urn:post:2")
            .await
            .unwrap();
        storage.refresh_current_status(&uuww).await.unwrap();
        storage.refresh_current_status(&ulli).await.unwrap();

        let snapshot = storage.load_snapshot().await.expect("snapshot");
        assert_eq!(snapshot.len(), 2);

        let pulkovo = &snapshot.airports[&ulli];
        assert_eq!(pulkovo.current, Some(Status::Open));
        assert_eq!(pulkovo.events.len(), 2);

        let vnukovo = &snapshot.airports[&uuww];
        assert_eq!(vnukovo.current, Some(Status::Closed));
        assert_eq!(vnukovo.events.len(), 1);
    }

    #[tokio::test]
    async fn feed_entry_ledger() {
        let storage = test_storage().await;

        assert!(!storage.has_seen_entry("urn:post:1").await.unwrap());

        storage
            .mark_entry_seen("urn:post:1", "abc123", ts(10, 0))
            .await
            .expect("mark seen");
        assert!(storage.has_seen_entry("urn:post:1").await.unwrap());

        // Marking again is a no-op.
        storage
            .mark_entry_seen("urn:post:1", "abc123", ts(10, 0))
            .await
            .expect("mark seen again");
    }

    #[tokio::test]
    async fn poll_run_lifecycle() {
        let storage = test_storage().await;

        let run_id = storage.insert_poll_run().await.expect("insert poll run");
        assert!(!run_id.is_empty());

        storage
            .finish_poll_run(&run_id, r#"{"entries_new": 4}"#)
            .await
            .expect("finish poll run");
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("skywatch_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.upsert_airport(&icao("UUWW"), "Внуково").await.unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        let result = ro.upsert_airport(&icao("ULLI"), "Пулково").await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));

        // Reads still work.
        let record = ro.get_airport(&icao("UUWW")).await.unwrap();
        assert!(record.is_some());
    }
}
