// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared file catalog, queue and pagination ledger backed by SQLite.
//
// Every worker process opens the same database file. Status transitions run
// inside IMMEDIATE transactions so the check against the current record and
// the write cannot interleave with another worker. Ledger tables are guarded
// by triggers that reject UPDATE and DELETE.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior, params};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use folio_core::error::{FolioError, Result};
use folio_core::traits::check_transition;
use folio_core::{
    FileCatalog, FileId, FileQueueRecord, FileStatus, LedgerEntry, LedgerStore, PageKey,
    QueueControl, SessionId, TransitionFlags,
};

/// Schema for the catalog, ledger and queue control tables.
const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_name TEXT NOT NULL UNIQUE,
        file_size INTEGER NOT NULL DEFAULT 0,
        page_count INTEGER NOT NULL DEFAULT 0,
        priority INTEGER NOT NULL DEFAULT 0,
        workflow_id TEXT NOT NULL,
        current_action TEXT,
        status TEXT,
        added_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_files_queue
        ON files (current_action, status, priority);

    CREATE TABLE IF NOT EXISTS ledger_entries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        destination_file_id INTEGER,
        session_id TEXT NOT NULL,
        output_hash TEXT,
        recorded_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS ledger_pages (
        entry_id INTEGER NOT NULL REFERENCES ledger_entries (id),
        position INTEGER NOT NULL,
        document_name TEXT NOT NULL,
        page_number INTEGER NOT NULL,
        PRIMARY KEY (entry_id, position)
    );

    CREATE INDEX IF NOT EXISTS idx_ledger_pages_document
        ON ledger_pages (document_name, page_number);

    CREATE TRIGGER IF NOT EXISTS ledger_entries_no_update
        BEFORE UPDATE ON ledger_entries
        BEGIN SELECT RAISE(ABORT, 'ledger is append-only'); END;

    CREATE TRIGGER IF NOT EXISTS ledger_entries_no_delete
        BEFORE DELETE ON ledger_entries
        BEGIN SELECT RAISE(ABORT, 'ledger is append-only'); END;

    CREATE TRIGGER IF NOT EXISTS ledger_pages_no_update
        BEFORE UPDATE ON ledger_pages
        BEGIN SELECT RAISE(ABORT, 'ledger is append-only'); END;

    CREATE TRIGGER IF NOT EXISTS ledger_pages_no_delete
        BEFORE DELETE ON ledger_pages
        BEGIN SELECT RAISE(ABORT, 'ledger is append-only'); END;

    CREATE TABLE IF NOT EXISTS queue_control (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        pause_count INTEGER NOT NULL DEFAULT 0
    );

    INSERT OR IGNORE INTO queue_control (id, pause_count) VALUES (1, 0);
"#;

const SELECT_FILE_COLUMNS: &str = "SELECT id, file_name, current_action, status, priority,
        workflow_id, file_size, page_count FROM files";

/// SQLite implementation of [`FileCatalog`], [`LedgerStore`] and
/// [`QueueControl`].
///
/// All methods are synchronous. In an async context wrap calls in
/// `tokio::task::spawn_blocking`.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open (or create) the catalog database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| FolioError::Database(format!("open: {e}")))?;

        // Several workers share the file.
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| FolioError::Database(format!("WAL pragma: {e}")))?;
        conn.busy_timeout(Duration::from_secs(30))
            .map_err(|e| FolioError::Database(format!("busy timeout: {e}")))?;

        Self::init(conn).inspect(|_| info!("catalog database opened"))
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| FolioError::Database(format!("open in-memory: {e}")))?;
        Self::init(conn).inspect(|_| debug!("in-memory catalog database opened"))
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| FolioError::Database(format!("foreign_keys pragma: {e}")))?;
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(|e| FolioError::Database(format!("create tables: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| FolioError::Database("catalog connection mutex poisoned".into()))
    }

    /// Claim the highest-priority pending file of `action`, marking it
    /// Processing. Returns `None` while the queue is paused or empty.
    #[instrument(skip(self))]
    pub fn claim_next(&self, action: &str) -> Result<Option<FileQueueRecord>> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| FolioError::Database(format!("begin claim: {e}")))?;

        let paused: i64 = tx
            .query_row("SELECT pause_count FROM queue_control WHERE id = 1", [], |r| r.get(0))
            .map_err(|e| FolioError::Database(format!("read pause count: {e}")))?;
        if paused > 0 {
            debug!(paused, "queue paused, nothing claimed");
            return Ok(None);
        }

        let claimed = tx
            .query_row(
                "UPDATE files SET status = ?1, updated_at = ?2
                 WHERE id = (
                     SELECT id FROM files
                     WHERE current_action = ?3 AND status = ?4
                     ORDER BY priority DESC, id ASC
                     LIMIT 1
                 )
                 RETURNING id, file_name, current_action, status, priority,
                           workflow_id, file_size, page_count",
                params![
                    FileStatus::Processing.as_str(),
                    Utc::now().to_rfc3339(),
                    action,
                    FileStatus::Pending.as_str(),
                ],
                row_to_record,
            )
            .optional()
            .map_err(|e| FolioError::Database(format!("claim: {e}")))?;

        tx.commit()
            .map_err(|e| FolioError::Database(format!("commit claim: {e}")))?;

        if let Some(record) = &claimed {
            info!(file_id = %record.file_id, file = %record.file_name, "file claimed");
        }
        Ok(claimed)
    }

    /// Current nesting depth of queue pauses.
    pub fn pause_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        conn.query_row("SELECT pause_count FROM queue_control WHERE id = 1", [], |r| r.get(0))
            .map_err(|e| FolioError::Database(format!("read pause count: {e}")))
    }

    fn adjust_pause(&self, delta: i64) -> Result<i64> {
        let conn = self.lock()?;
        conn.query_row(
            "UPDATE queue_control SET pause_count = MAX(pause_count + ?1, 0)
             WHERE id = 1 RETURNING pause_count",
            params![delta],
            |r| r.get(0),
        )
        .map_err(|e| FolioError::Database(format!("update pause count: {e}")))
    }
}

impl FileCatalog for SqliteCatalog {
    #[instrument(skip(self))]
    fn add_file_no_queue(
        &self,
        file_name: &str,
        file_size: u64,
        page_count: u32,
        priority: i32,
        workflow_id: &str,
    ) -> Result<FileId> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();

        let inserted = conn.execute(
            "INSERT INTO files (file_name, file_size, page_count, priority, workflow_id,
                                current_action, status, added_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, ?6, ?6)",
            params![file_name, file_size as i64, page_count, priority, workflow_id, now],
        );

        match inserted {
            Ok(_) => {
                let id = FileId(conn.last_insert_rowid());
                info!(file_id = %id, "file registered");
                Ok(id)
            }
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                warn!("file name already registered");
                Err(FolioError::Collision(file_name.to_owned()))
            }
            Err(e) => Err(FolioError::Database(format!("insert file: {e}"))),
        }
    }

    #[instrument(skip(self))]
    fn set_status_for_file(
        &self,
        file_id: FileId,
        action: &str,
        workflow_id: &str,
        status: FileStatus,
        flags: TransitionFlags,
    ) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| FolioError::Database(format!("begin transition: {e}")))?;

        let record = tx
            .query_row(
                &format!("{SELECT_FILE_COLUMNS} WHERE id = ?1"),
                params![file_id.0],
                row_to_record,
            )
            .optional()
            .map_err(|e| FolioError::Database(format!("read file: {e}")))?
            .ok_or(FolioError::FileNotFound(file_id.0))?;

        check_transition(&record, action, status, flags)?;

        tx.execute(
            "UPDATE files SET current_action = ?1, status = ?2, workflow_id = ?3, updated_at = ?4
             WHERE id = ?5",
            params![action, status.as_str(), workflow_id, Utc::now().to_rfc3339(), file_id.0],
        )
        .map_err(|e| FolioError::Database(format!("update status: {e}")))?;

        tx.commit()
            .map_err(|e| FolioError::Database(format!("commit transition: {e}")))?;

        debug!(from = ?record.status, to = %status, "status updated");
        Ok(())
    }

    fn get_file_id(&self, file_name: &str) -> Result<Option<FileId>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id FROM files WHERE file_name = ?1",
            params![file_name],
            |r| r.get(0).map(FileId),
        )
        .optional()
        .map_err(|e| FolioError::Database(format!("get file id: {e}")))
    }

    fn get_file(&self, file_id: FileId) -> Result<Option<FileQueueRecord>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("{SELECT_FILE_COLUMNS} WHERE id = ?1"),
            params![file_id.0],
            row_to_record,
        )
        .optional()
        .map_err(|e| FolioError::Database(format!("get file: {e}")))
    }

    fn max_priority(&self, file_names: &[String]) -> Result<Option<i32>> {
        if file_names.is_empty() {
            return Ok(None);
        }
        let conn = self.lock()?;
        let placeholders = vec!["?"; file_names.len()].join(", ");
        let sql = format!("SELECT MAX(priority) FROM files WHERE file_name IN ({placeholders})");
        conn.query_row(&sql, rusqlite::params_from_iter(file_names.iter()), |r| r.get(0))
            .map_err(|e| FolioError::Database(format!("max priority: {e}")))
    }
}

impl LedgerStore for SqliteCatalog {
    #[instrument(skip(self, entry), fields(pages = entry.source_pages.len(), destination = ?entry.destination_file_id))]
    fn insert_ledger_entry(&self, entry: &LedgerEntry) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| FolioError::Database(format!("begin ledger insert: {e}")))?;

        tx.execute(
            "INSERT INTO ledger_entries (destination_file_id, session_id, output_hash, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.destination_file_id.map(|id| id.0),
                entry.session_id.to_string(),
                entry.output_hash,
                entry.recorded_at.to_rfc3339(),
            ],
        )
        .map_err(|e| FolioError::Database(format!("insert ledger entry: {e}")))?;
        let entry_id = tx.last_insert_rowid();

        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO ledger_pages (entry_id, position, document_name, page_number)
                     VALUES (?1, ?2, ?3, ?4)",
                )
                .map_err(|e| FolioError::Database(format!("prepare ledger pages: {e}")))?;
            for (position, page) in entry.source_pages.iter().enumerate() {
                stmt.execute(params![entry_id, position as i64, page.document_name, page.page_number])
                    .map_err(|e| FolioError::Database(format!("insert ledger page: {e}")))?;
            }
        }

        tx.commit()
            .map_err(|e| FolioError::Database(format!("commit ledger insert: {e}")))?;
        debug!(entry_id, "ledger entry recorded");
        Ok(())
    }

    #[instrument(skip(self))]
    fn ledger_entries_for(&self, document_name: &str) -> Result<Vec<LedgerEntry>> {
        let conn = self.lock()?;
        let mut entry_stmt = conn
            .prepare(
                "SELECT id, destination_file_id, session_id, output_hash, recorded_at
                 FROM ledger_entries
                 WHERE id IN (SELECT entry_id FROM ledger_pages WHERE document_name = ?1)
                 ORDER BY id ASC",
            )
            .map_err(|e| FolioError::Database(format!("prepare ledger query: {e}")))?;
        let mut page_stmt = conn
            .prepare(
                "SELECT document_name, page_number FROM ledger_pages
                 WHERE entry_id = ?1 ORDER BY position ASC",
            )
            .map_err(|e| FolioError::Database(format!("prepare ledger pages query: {e}")))?;

        let heads = entry_stmt
            .query_map(params![document_name], row_to_ledger_head)
            .map_err(|e| FolioError::Database(format!("query ledger: {e}")))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| FolioError::Database(format!("collect rows: {e}")))?;

        let mut entries = Vec::with_capacity(heads.len());
        for (entry_id, mut entry) in heads {
            entry.source_pages = page_stmt
                .query_map(params![entry_id], |r| {
                    Ok(PageKey::new(r.get::<_, String>(0)?, r.get(1)?))
                })
                .map_err(|e| FolioError::Database(format!("query ledger pages: {e}")))?
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| FolioError::Database(format!("collect rows: {e}")))?;
            entries.push(entry);
        }

        debug!(count = entries.len(), "ledger entries loaded");
        Ok(entries)
    }
}

impl QueueControl for SqliteCatalog {
    #[instrument(skip(self))]
    fn pause_queue(&self) -> Result<()> {
        let depth = self.adjust_pause(1)?;
        debug!(depth, "queue paused");
        Ok(())
    }

    #[instrument(skip(self))]
    fn resume_queue(&self) -> Result<()> {
        let depth = self.adjust_pause(-1)?;
        debug!(depth, "queue resumed");
        Ok(())
    }

    fn is_queue_paused(&self) -> Result<bool> {
        Ok(self.pause_count()? > 0)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Map a row selected with [`SELECT_FILE_COLUMNS`] to a record.
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileQueueRecord> {
    let status: Option<String> = row.get(3)?;
    let status = match status {
        Some(s) => Some(FileStatus::parse(&s).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown status '{s}'").into(),
            )
        })?),
        None => None,
    };

    Ok(FileQueueRecord {
        file_id: FileId(row.get(0)?),
        file_name: row.get(1)?,
        current_action: row.get(2)?,
        status,
        priority: row.get(4)?,
        workflow_id: row.get(5)?,
        file_size: row.get::<_, i64>(6)? as u64,
        page_count: row.get(7)?,
    })
}

/// Map a ledger_entries row to `(entry id, entry without pages)`.
fn row_to_ledger_head(row: &rusqlite::Row<'_>) -> rusqlite::Result<(i64, LedgerEntry)> {
    let entry_id: i64 = row.get(0)?;
    let destination: Option<i64> = row.get(1)?;
    let session_str: String = row.get(2)?;
    let output_hash: Option<String> = row.get(3)?;
    let recorded_str: String = row.get(4)?;

    let session = Uuid::parse_str(&session_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let recorded_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&recorded_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok((
        entry_id,
        LedgerEntry {
            source_pages: Vec::new(),
            destination_file_id: destination.map(FileId),
            session_id: SessionId(session),
            recorded_at,
            output_hash,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> SqliteCatalog {
        SqliteCatalog::open_in_memory().expect("open in-memory db")
    }

    fn queue(cat: &SqliteCatalog, name: &str, action: &str, priority: i32) -> FileId {
        let id = cat
            .add_file_no_queue(name, 100, 3, priority, "wf")
            .expect("add file");
        cat.set_status_for_file(id, action, "wf", FileStatus::Pending, TransitionFlags::strict())
            .expect("queue");
        id
    }

    #[test]
    fn add_and_lookup_file() {
        let cat = catalog();
        let id = cat.add_file_no_queue("/scans/a.pdf", 1024, 4, 5, "wf").expect("add");

        assert_eq!(cat.get_file_id("/scans/a.pdf").expect("lookup"), Some(id));
        let rec = cat.get_file(id).expect("get").expect("found");
        assert_eq!(rec.file_size, 1024);
        assert_eq!(rec.page_count, 4);
        assert_eq!(rec.status, None);
        assert_eq!(rec.current_action, None);
    }

    #[test]
    fn duplicate_name_is_a_collision_and_keeps_original() {
        let cat = catalog();
        let id = cat.add_file_no_queue("X.tif", 10, 1, 0, "wf").expect("add");
        let err = cat.add_file_no_queue("X.tif", 99, 9, 9, "other").unwrap_err();
        assert!(matches!(err, FolioError::Collision(name) if name == "X.tif"));

        let rec = cat.get_file(id).expect("get").expect("found");
        assert_eq!(rec.file_size, 10);
        assert_eq!(rec.workflow_id, "wf");
    }

    #[test]
    fn transitions_follow_state_machine() {
        let cat = catalog();
        let id = queue(&cat, "a.pdf", "Paginate", 0);

        let bad = cat.set_status_for_file(id, "Paginate", "wf", FileStatus::Completed, TransitionFlags::strict());
        assert!(matches!(bad, Err(FolioError::InvalidTransition { .. })));

        cat.set_status_for_file(id, "Paginate", "wf", FileStatus::Processing, TransitionFlags::strict())
            .expect("processing");
        cat.set_status_for_file(id, "Paginate", "wf", FileStatus::Completed, TransitionFlags::strict())
            .expect("completed");

        let rec = cat.get_file(id).expect("get").expect("found");
        assert_eq!(rec.status, Some(FileStatus::Completed));
    }

    #[test]
    fn unknown_file_transition_is_not_found() {
        let cat = catalog();
        let err = cat
            .set_status_for_file(FileId(42), "Index", "wf", FileStatus::Pending, TransitionFlags::strict())
            .unwrap_err();
        assert!(matches!(err, FolioError::FileNotFound(42)));
    }

    #[test]
    fn claim_takes_highest_priority_and_honours_pause() {
        let cat = catalog();
        queue(&cat, "low.pdf", "Paginate", 1);
        let high = queue(&cat, "high.pdf", "Paginate", 9);
        queue(&cat, "other.pdf", "Index", 50);

        cat.pause_queue().expect("pause");
        assert!(cat.claim_next("Paginate").expect("claim").is_none());
        cat.resume_queue().expect("resume");

        let claimed = cat.claim_next("Paginate").expect("claim").expect("some");
        assert_eq!(claimed.file_id, high);
        assert_eq!(claimed.status, Some(FileStatus::Processing));

        let next = cat.claim_next("Paginate").expect("claim").expect("some");
        assert_eq!(next.file_name, "low.pdf");
        assert!(cat.claim_next("Paginate").expect("claim").is_none());
    }

    #[test]
    fn pauses_nest_and_never_go_negative() {
        let cat = catalog();
        cat.pause_queue().expect("pause");
        cat.pause_queue().expect("pause");
        cat.resume_queue().expect("resume");
        assert!(cat.is_queue_paused().expect("paused"));
        cat.resume_queue().expect("resume");
        cat.resume_queue().expect("resume");
        assert_eq!(cat.pause_count().expect("count"), 0);
    }

    #[test]
    fn max_priority_over_named_files() {
        let cat = catalog();
        cat.add_file_no_queue("a.pdf", 1, 1, 3, "wf").expect("add");
        cat.add_file_no_queue("b.pdf", 1, 1, 7, "wf").expect("add");

        let names = vec!["a.pdf".to_string(), "b.pdf".to_string(), "c.pdf".to_string()];
        assert_eq!(cat.max_priority(&names).expect("max"), Some(7));
        assert_eq!(cat.max_priority(&["c.pdf".to_string()]).expect("max"), None);
        assert_eq!(cat.max_priority(&[]).expect("max"), None);
    }

    #[test]
    fn ledger_round_trip_and_append_only() {
        let cat = catalog();
        let session = SessionId::new();
        let entry = LedgerEntry::new(
            vec![PageKey::new("a.pdf", 3), PageKey::new("a.pdf", 1)],
            Some(FileId(7)),
            session,
        )
        .with_output_hash("abc123");
        cat.insert_ledger_entry(&entry).expect("insert");
        cat.insert_ledger_entry(&LedgerEntry::new(vec![PageKey::new("b.pdf", 1)], None, session))
            .expect("insert");

        let loaded = cat.ledger_entries_for("a.pdf").expect("load");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].source_pages, entry.source_pages);
        assert_eq!(loaded[0].destination_file_id, Some(FileId(7)));
        assert_eq!(loaded[0].session_id, session);
        assert_eq!(loaded[0].output_hash.as_deref(), Some("abc123"));

        let conn = cat.lock().expect("lock");
        assert!(conn.execute("DELETE FROM ledger_entries", []).is_err());
        assert!(conn.execute("UPDATE ledger_pages SET page_number = 9", []).is_err());
    }

    #[test]
    fn reopening_a_file_database_keeps_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("catalog.db");
        {
            let cat = SqliteCatalog::open(&path).expect("open");
            cat.add_file_no_queue("a.pdf", 1, 1, 0, "wf").expect("add");
        }
        let cat = SqliteCatalog::open(&path).expect("reopen");
        assert!(cat.get_file_id("a.pdf").expect("lookup").is_some());
    }
}
