//! `SQLite`-backed implementation of [`CustodyStore`].

use crate::models::{
    ArtifactId, CustodyAction, CustodyEvent, DumpArtifact, EvidenceId, EvidenceItem, EvidenceKind,
    EvidenceState, EventRequest, JobId,
};
use crate::storage::sqlite::{acquire_lock, configure_connection};
use crate::storage::traits::CustodyStore;
use crate::{Error, Result, current_timestamp_millis};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::PathBuf;
use std::sync::Mutex;

/// `SQLite` custody store.
///
/// # Concurrency Model
///
/// A `Mutex<Connection>` serializes all writes. That is deliberately stronger
/// than the required per-evidence-id single-writer discipline: two appends
/// for the same id can never interleave, and appends for different ids do not
/// need ordering anyway. WAL mode plus `busy_timeout` keep readers responsive
/// under write load.
///
/// # Schema
///
/// - `evidence`: one row per item, tombstoned on delete, never removed
/// - `custody_events`: append-only, `(evidence_id, seq)` primary key
/// - `artifacts`: one row per dump-store call, content hash + payload path
pub struct SqliteStore {
    /// Connection to the `SQLite` database.
    ///
    /// Protected by Mutex because `rusqlite::Connection` is not `Sync`.
    conn: Mutex<Connection>,
    /// Path to the database file (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens (or creates) a custody store at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn =
            Connection::open(&db_path).map_err(|e| Error::storage("open_custody_store", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory custody store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::storage("open_custody_store_in_memory", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub const fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    /// Initializes the schema.
    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS evidence (
                id            TEXT PRIMARY KEY,
                kind          TEXT NOT NULL,
                content_hash  TEXT NOT NULL,
                size_bytes    INTEGER NOT NULL,
                uploaded_at   INTEGER NOT NULL,
                state         TEXT NOT NULL,
                flagged       INTEGER,
                analysis      TEXT,
                source        TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_evidence_hash ON evidence(content_hash);

            CREATE TABLE IF NOT EXISTS custody_events (
                evidence_id   TEXT NOT NULL REFERENCES evidence(id),
                seq           INTEGER NOT NULL,
                action        TEXT NOT NULL,
                handler       TEXT NOT NULL,
                location      TEXT NOT NULL,
                timestamp     INTEGER NOT NULL,
                notes         TEXT,
                PRIMARY KEY (evidence_id, seq)
            );

            CREATE TABLE IF NOT EXISTS artifacts (
                id            TEXT PRIMARY KEY,
                content_hash  TEXT NOT NULL,
                size_bytes    INTEGER NOT NULL,
                path          TEXT NOT NULL,
                job_id        TEXT NOT NULL,
                created_at    INTEGER NOT NULL
            );",
        )
        .map_err(|e| Error::storage("initialize_schema", e))
    }

    /// Fetches an evidence item inside an open connection/transaction.
    fn get_evidence_on(conn: &Connection, id: &EvidenceId) -> Result<Option<EvidenceItem>> {
        conn.query_row(
            "SELECT id, kind, content_hash, size_bytes, uploaded_at, state, flagged, analysis, source
             FROM evidence WHERE id = ?1",
            params![id.as_str()],
            evidence_from_row,
        )
        .optional()
        .map_err(|e| Error::storage("get_evidence", e))
    }

    /// Appends a custody event inside an open transaction.
    ///
    /// The caller has already verified the evidence exists. Reads the last
    /// `(timestamp, seq)` for the id, rejects clock regressions, and inserts
    /// with the next sequence number.
    fn append_event_on(
        conn: &Connection,
        id: &EvidenceId,
        request: &EventRequest,
    ) -> Result<CustodyEvent> {
        let last: Option<(i64, i64)> = conn
            .query_row(
                "SELECT timestamp, seq FROM custody_events
                 WHERE evidence_id = ?1 ORDER BY seq DESC LIMIT 1",
                params![id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| Error::storage("read_last_event", e))?;

        let timestamp = request.timestamp.unwrap_or_else(current_timestamp_millis);
        let seq = match last {
            Some((last_ts, last_seq)) => {
                #[allow(clippy::cast_sign_loss)]
                let last_ts = last_ts as u64;
                if timestamp < last_ts {
                    return Err(Error::ClockRegression {
                        id: id.as_str().to_string(),
                        last: last_ts,
                        attempted: timestamp,
                    });
                }
                #[allow(clippy::cast_sign_loss)]
                let next = (last_seq as u64) + 1;
                next
            },
            None => 1,
        };

        conn.execute(
            "INSERT INTO custody_events (evidence_id, seq, action, handler, location, timestamp, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.as_str(),
                i64_from(seq),
                request.action.as_str(),
                request.handler,
                request.location,
                i64_from(timestamp),
                request.notes,
            ],
        )
        .map_err(|e| Error::storage("append_event", e))?;

        metrics::counter!("custody_events_appended_total").increment(1);

        Ok(CustodyEvent {
            evidence_id: id.clone(),
            seq,
            action: request.action,
            handler: request.handler.clone(),
            location: request.location.clone(),
            timestamp,
            notes: request.notes.clone(),
        })
    }
}

impl CustodyStore for SqliteStore {
    fn insert_evidence(&self, item: &EvidenceItem, event: &EventRequest) -> Result<CustodyEvent> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| Error::storage("begin_insert_evidence", e))?;

        tx.execute(
            "INSERT INTO evidence (id, kind, content_hash, size_bytes, uploaded_at, state, flagged, analysis, source)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                item.id.as_str(),
                item.kind.as_str(),
                item.content_hash,
                i64_from(item.size_bytes),
                i64_from(item.uploaded_at),
                item.state.as_str(),
                item.flagged.map(i64::from),
                item.analysis.as_ref().map(serde_json::Value::to_string),
                item.source,
            ],
        )
        .map_err(|e| Error::storage("insert_evidence", e))?;

        let recorded = Self::append_event_on(&tx, &item.id, event)?;

        tx.commit()
            .map_err(|e| Error::storage("commit_insert_evidence", e))?;

        metrics::counter!("evidence_registered_total").increment(1);
        Ok(recorded)
    }

    fn transition_evidence(
        &self,
        id: &EvidenceId,
        to: EvidenceState,
        analysis: Option<(&serde_json::Value, bool)>,
        event: &EventRequest,
    ) -> Result<(EvidenceItem, CustodyEvent)> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| Error::storage("begin_transition", e))?;

        let mut item = Self::get_evidence_on(&tx, id)?.ok_or_else(|| Error::UnknownEvidence {
            id: id.as_str().to_string(),
        })?;

        if !item.state.can_transition_to(to) {
            // Rejected before anything is written; no event is appended.
            return Err(Error::InvalidTransition {
                id: id.as_str().to_string(),
                from: item.state.as_str().to_string(),
                attempted: to.as_str().to_string(),
            });
        }

        if let Some((result, flagged)) = analysis {
            tx.execute(
                "UPDATE evidence SET state = ?1, analysis = ?2, flagged = ?3 WHERE id = ?4",
                params![
                    to.as_str(),
                    result.to_string(),
                    i64::from(flagged),
                    id.as_str()
                ],
            )
            .map_err(|e| Error::storage("transition_evidence", e))?;
            item.analysis = Some(result.clone());
            item.flagged = Some(flagged);
        } else {
            tx.execute(
                "UPDATE evidence SET state = ?1 WHERE id = ?2",
                params![to.as_str(), id.as_str()],
            )
            .map_err(|e| Error::storage("transition_evidence", e))?;
        }
        item.state = to;

        let recorded = Self::append_event_on(&tx, id, event)?;

        // A failed append never reaches this point: the transaction is
        // dropped uncommitted and the state change rolls back with it.
        tx.commit()
            .map_err(|e| Error::storage("commit_transition", e))?;

        Ok((item, recorded))
    }

    fn append_event(&self, id: &EvidenceId, event: &EventRequest) -> Result<CustodyEvent> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| Error::storage("begin_append", e))?;

        if Self::get_evidence_on(&tx, id)?.is_none() {
            return Err(Error::UnknownEvidence {
                id: id.as_str().to_string(),
            });
        }

        let recorded = Self::append_event_on(&tx, id, event)?;
        tx.commit()
            .map_err(|e| Error::storage("commit_append", e))?;
        Ok(recorded)
    }

    fn get_evidence(&self, id: &EvidenceId) -> Result<Option<EvidenceItem>> {
        let conn = acquire_lock(&self.conn);
        Self::get_evidence_on(&conn, id)
    }

    fn list_evidence(&self) -> Result<Vec<EvidenceItem>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT id, kind, content_hash, size_bytes, uploaded_at, state, flagged, analysis, source
                 FROM evidence",
            )
            .map_err(|e| Error::storage("prepare_list_evidence", e))?;

        let rows = stmt
            .query_map([], evidence_from_row)
            .map_err(|e| Error::storage("list_evidence", e))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::storage("list_evidence", e))
    }

    fn find_live_by_hash(&self, hash: &str) -> Result<Option<EvidenceItem>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT id, kind, content_hash, size_bytes, uploaded_at, state, flagged, analysis, source
             FROM evidence WHERE content_hash = ?1 AND state != 'deleted' LIMIT 1",
            params![hash],
            evidence_from_row,
        )
        .optional()
        .map_err(|e| Error::storage("find_by_hash", e))
    }

    fn events_for(&self, id: &EvidenceId) -> Result<Vec<CustodyEvent>> {
        let conn = acquire_lock(&self.conn);

        if Self::get_evidence_on(&conn, id)?.is_none() {
            return Err(Error::UnknownEvidence {
                id: id.as_str().to_string(),
            });
        }

        let mut stmt = conn
            .prepare(
                "SELECT evidence_id, seq, action, handler, location, timestamp, notes
                 FROM custody_events WHERE evidence_id = ?1 ORDER BY seq ASC",
            )
            .map_err(|e| Error::storage("prepare_events_for", e))?;

        let rows = stmt
            .query_map(params![id.as_str()], event_from_row)
            .map_err(|e| Error::storage("events_for", e))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::storage("events_for", e))
    }

    fn insert_artifact(&self, artifact: &DumpArtifact) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "INSERT INTO artifacts (id, content_hash, size_bytes, path, job_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                artifact.id.as_str(),
                artifact.content_hash,
                i64_from(artifact.size_bytes),
                artifact.path.to_string_lossy(),
                artifact.job_id.as_str(),
                i64_from(artifact.created_at),
            ],
        )
        .map_err(|e| Error::storage("insert_artifact", e))?;
        Ok(())
    }

    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<DumpArtifact>> {
        let conn = acquire_lock(&self.conn);
        conn.query_row(
            "SELECT id, content_hash, size_bytes, path, job_id, created_at
             FROM artifacts WHERE id = ?1",
            params![id.as_str()],
            artifact_from_row,
        )
        .optional()
        .map_err(|e| Error::storage("get_artifact", e))
    }

    fn list_artifacts(&self) -> Result<Vec<DumpArtifact>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT id, content_hash, size_bytes, path, job_id, created_at
                 FROM artifacts ORDER BY created_at DESC",
            )
            .map_err(|e| Error::storage("prepare_list_artifacts", e))?;

        let rows = stmt
            .query_map([], artifact_from_row)
            .map_err(|e| Error::storage("list_artifacts", e))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::storage("list_artifacts", e))
    }

    fn purge_artifacts(&self) -> Result<Vec<DumpArtifact>> {
        let mut conn = acquire_lock(&self.conn);
        let tx = conn
            .transaction()
            .map_err(|e| Error::storage("begin_purge", e))?;

        let purged = {
            let mut stmt = tx
                .prepare(
                    "SELECT id, content_hash, size_bytes, path, job_id, created_at FROM artifacts",
                )
                .map_err(|e| Error::storage("prepare_purge", e))?;
            let rows = stmt
                .query_map([], artifact_from_row)
                .map_err(|e| Error::storage("purge_artifacts", e))?;
            rows.collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::storage("purge_artifacts", e))?
        };

        tx.execute("DELETE FROM artifacts", [])
            .map_err(|e| Error::storage("purge_artifacts", e))?;
        tx.commit().map_err(|e| Error::storage("commit_purge", e))?;

        Ok(purged)
    }
}

/// Converts a `u64` to the `i64` column representation.
#[allow(clippy::cast_possible_wrap)]
const fn i64_from(value: u64) -> i64 {
    value as i64
}

/// Maps an evidence row to an [`EvidenceItem`].
#[allow(clippy::cast_sign_loss)]
fn evidence_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EvidenceItem> {
    let size_bytes: i64 = row.get(3)?;
    let uploaded_at: i64 = row.get(4)?;
    let kind: String = row.get(1)?;
    let state: String = row.get(5)?;
    let flagged: Option<i64> = row.get(6)?;
    let analysis: Option<String> = row.get(7)?;

    Ok(EvidenceItem {
        id: EvidenceId::new(row.get::<_, String>(0)?),
        kind: EvidenceKind::parse(&kind).unwrap_or(EvidenceKind::File),
        content_hash: row.get(2)?,
        size_bytes: size_bytes as u64,
        uploaded_at: uploaded_at as u64,
        state: EvidenceState::parse(&state).unwrap_or_default(),
        flagged: flagged.map(|f| f != 0),
        analysis: analysis.and_then(|a| serde_json::from_str(&a).ok()),
        source: row.get(8)?,
    })
}

/// Maps a custody event row to a [`CustodyEvent`].
#[allow(clippy::cast_sign_loss)]
fn event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CustodyEvent> {
    let seq: i64 = row.get(1)?;
    let action: String = row.get(2)?;
    let timestamp: i64 = row.get(5)?;

    Ok(CustodyEvent {
        evidence_id: EvidenceId::new(row.get::<_, String>(0)?),
        seq: seq as u64,
        action: CustodyAction::parse(&action).unwrap_or(CustodyAction::View),
        handler: row.get(3)?,
        location: row.get(4)?,
        timestamp: timestamp as u64,
        notes: row.get(6)?,
    })
}

/// Maps an artifact row to a [`DumpArtifact`].
#[allow(clippy::cast_sign_loss)]
fn artifact_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DumpArtifact> {
    let size_bytes: i64 = row.get(2)?;
    let created_at: i64 = row.get(5)?;
    let path: String = row.get(3)?;

    Ok(DumpArtifact {
        id: ArtifactId::new(row.get::<_, String>(0)?),
        content_hash: row.get(1)?,
        size_bytes: size_bytes as u64,
        path: PathBuf::from(path),
        job_id: JobId::new(row.get::<_, String>(4)?),
        created_at: created_at as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CustodyAction;

    fn test_item(id: &str, hash: &str) -> EvidenceItem {
        EvidenceItem {
            id: EvidenceId::new(id),
            kind: EvidenceKind::File,
            content_hash: hash.to_string(),
            size_bytes: 64,
            uploaded_at: 1_000,
            state: EvidenceState::Registered,
            flagged: None,
            analysis: None,
            source: Some("intake.bin".to_string()),
        }
    }

    fn collect_event() -> EventRequest {
        EventRequest::new(CustodyAction::Collect, "agent.voss", "intake-desk-2")
    }

    #[test]
    fn test_insert_and_get_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let item = test_item("ev_1", "aa11");

        let event = store.insert_evidence(&item, &collect_event()).unwrap();
        assert_eq!(event.seq, 1);
        assert_eq!(event.action, CustodyAction::Collect);

        let fetched = store.get_evidence(&item.id).unwrap().unwrap();
        assert_eq!(fetched.content_hash, "aa11");
        assert_eq!(fetched.state, EvidenceState::Registered);
        assert_eq!(fetched.source.as_deref(), Some("intake.bin"));
    }

    #[test]
    fn test_append_requires_known_evidence() {
        let store = SqliteStore::in_memory().unwrap();
        let result = store.append_event(&EvidenceId::new("ev_missing"), &collect_event());
        assert!(matches!(result, Err(Error::UnknownEvidence { .. })));
    }

    #[test]
    fn test_events_are_sequenced() {
        let store = SqliteStore::in_memory().unwrap();
        let item = test_item("ev_1", "aa11");
        store.insert_evidence(&item, &collect_event()).unwrap();

        let view = EventRequest::new(CustodyAction::View, "agent.okafor", "lab-3");
        store.append_event(&item.id, &view).unwrap();
        store.append_event(&item.id, &view).unwrap();

        let events = store.events_for(&item.id).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(
            events.iter().map(|e| e.seq).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_clock_regression_is_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        let item = test_item("ev_1", "aa11");
        store
            .insert_evidence(&item, &collect_event().with_timestamp(5_000))
            .unwrap();

        let stale = EventRequest::new(CustodyAction::View, "agent.okafor", "lab-3")
            .with_timestamp(4_999);
        let result = store.append_event(&item.id, &stale);
        assert!(matches!(
            result,
            Err(Error::ClockRegression {
                last: 5_000,
                attempted: 4_999,
                ..
            })
        ));

        // Equal timestamps are fine: the ordering is non-decreasing.
        let same = EventRequest::new(CustodyAction::View, "agent.okafor", "lab-3")
            .with_timestamp(5_000);
        assert!(store.append_event(&item.id, &same).is_ok());
    }

    #[test]
    fn test_invalid_transition_appends_nothing() {
        let store = SqliteStore::in_memory().unwrap();
        let item = test_item("ev_1", "aa11");
        store.insert_evidence(&item, &collect_event()).unwrap();

        let analyze = EventRequest::new(CustodyAction::Analyze, "agent.voss", "lab-1");
        let result =
            store.transition_evidence(&item.id, EvidenceState::Analyzed, None, &analyze);
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));

        // Only the COLLECT event is present.
        assert_eq!(store.events_for(&item.id).unwrap().len(), 1);
        let fetched = store.get_evidence(&item.id).unwrap().unwrap();
        assert_eq!(fetched.state, EvidenceState::Registered);
    }

    #[test]
    fn test_transition_stores_analysis_result() {
        let store = SqliteStore::in_memory().unwrap();
        let item = test_item("ev_1", "aa11");
        store.insert_evidence(&item, &collect_event()).unwrap();

        let analyze = EventRequest::new(CustodyAction::Analyze, "agent.voss", "lab-1");
        store
            .transition_evidence(&item.id, EvidenceState::Analyzing, None, &analyze)
            .unwrap();

        let verdict = serde_json::json!({"score": 0.93, "verdict": "manipulated"});
        let (updated, _) = store
            .transition_evidence(
                &item.id,
                EvidenceState::Analyzed,
                Some((&verdict, true)),
                &analyze,
            )
            .unwrap();

        assert_eq!(updated.state, EvidenceState::Analyzed);
        assert_eq!(updated.flagged, Some(true));
        assert_eq!(updated.analysis, Some(verdict.clone()));

        let fetched = store.get_evidence(&item.id).unwrap().unwrap();
        assert_eq!(fetched.analysis, Some(verdict));
    }

    #[test]
    fn test_find_live_by_hash_skips_tombstones() {
        let store = SqliteStore::in_memory().unwrap();
        let item = test_item("ev_1", "aa11");
        store.insert_evidence(&item, &collect_event()).unwrap();

        assert!(store.find_live_by_hash("aa11").unwrap().is_some());

        let delete = EventRequest::new(CustodyAction::Delete, "agent.voss", "intake-desk-2");
        store
            .transition_evidence(&item.id, EvidenceState::Deleted, None, &delete)
            .unwrap();

        assert!(store.find_live_by_hash("aa11").unwrap().is_none());
    }

    #[test]
    fn test_artifact_round_trip_and_purge() {
        let store = SqliteStore::in_memory().unwrap();
        let artifact = DumpArtifact {
            id: ArtifactId::new("art_1"),
            content_hash: "bb22".to_string(),
            size_bytes: 128,
            path: PathBuf::from("/tmp/dumps/bb22.bin"),
            job_id: JobId::new("job_1"),
            created_at: 2_000,
        };

        store.insert_artifact(&artifact).unwrap();
        let fetched = store.get_artifact(&artifact.id).unwrap().unwrap();
        assert_eq!(fetched, artifact);

        let purged = store.purge_artifacts().unwrap();
        assert_eq!(purged.len(), 1);
        assert!(store.get_artifact(&artifact.id).unwrap().is_none());
    }
}
