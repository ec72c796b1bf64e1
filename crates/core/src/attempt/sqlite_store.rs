//! SQLite-backed attempt store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use crate::catalog::{MediaKind, MediaRef};

use super::{
    AttemptError, AttemptStatus, AttemptStore, BlacklistEntry, BlacklistReason, DownloadAttempt,
    NewAttempt, NewBlacklistEntry, PostProcessStatus,
};

const ATTEMPT_COLUMNS: &str = "id, media_kind, media_id, indexer, indexer_id, release_title,
    download_url, file_size, seeders, leechers, status, error_type, error_reason,
    download_client, download_client_job_id, raw_file_path, post_processed_file_path,
    post_process_status, post_process_error_type, post_process_error_reason,
    attempted_at, updated_at";

const BLACKLIST_COLUMNS: &str = "id, media_kind, media_id, indexer, indexer_id, release_title,
    download_url, reason, reason_details, blacklisted_at";

/// SQLite-backed attempt store.
pub struct SqliteAttemptStore {
    conn: Mutex<Connection>,
}

impl SqliteAttemptStore {
    /// Create a new SQLite attempt store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, AttemptError> {
        let conn = Connection::open(path).map_err(|e| AttemptError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite attempt store (useful for testing).
    pub fn in_memory() -> Result<Self, AttemptError> {
        let conn =
            Connection::open_in_memory().map_err(|e| AttemptError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), AttemptError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS download_attempts (
                id TEXT PRIMARY KEY,
                media_kind TEXT NOT NULL,
                media_id TEXT NOT NULL,
                indexer TEXT NOT NULL,
                indexer_id TEXT NOT NULL,
                release_title TEXT NOT NULL,
                download_url TEXT NOT NULL,
                file_size INTEGER,
                seeders INTEGER,
                leechers INTEGER,
                status TEXT NOT NULL,
                error_type TEXT,
                error_reason TEXT,
                download_client TEXT,
                download_client_job_id TEXT,
                raw_file_path TEXT,
                post_processed_file_path TEXT,
                post_process_status TEXT,
                post_process_error_type TEXT,
                post_process_error_reason TEXT,
                attempted_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_attempts_media_status
                ON download_attempts(media_kind, media_id, status);
            CREATE INDEX IF NOT EXISTS idx_attempts_status ON download_attempts(status);
            CREATE INDEX IF NOT EXISTS idx_attempts_attempted_at ON download_attempts(attempted_at);

            -- At most one SENT/DOWNLOADING attempt per media item
            CREATE UNIQUE INDEX IF NOT EXISTS idx_attempts_single_active
                ON download_attempts(media_kind, media_id)
                WHERE status IN ('sent', 'downloading');

            CREATE TABLE IF NOT EXISTS download_blacklist (
                id TEXT PRIMARY KEY,
                media_kind TEXT NOT NULL,
                media_id TEXT NOT NULL,
                indexer TEXT NOT NULL,
                indexer_id TEXT NOT NULL,
                release_title TEXT NOT NULL,
                download_url TEXT NOT NULL,
                reason TEXT NOT NULL,
                reason_details TEXT NOT NULL DEFAULT '',
                blacklisted_at TEXT NOT NULL,
                UNIQUE(media_kind, media_id, indexer, indexer_id)
            );

            CREATE INDEX IF NOT EXISTS idx_blacklist_media
                ON download_blacklist(media_kind, media_id);
            "#,
        )
        .map_err(|e| AttemptError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, AttemptError> {
        self.conn
            .lock()
            .map_err(|_| AttemptError::Internal("attempt store lock poisoned".to_string()))
    }

    fn load(conn: &Connection, id: &str) -> Result<Option<DownloadAttempt>, AttemptError> {
        conn.query_row(
            &format!(
                "SELECT {} FROM download_attempts WHERE id = ?1",
                ATTEMPT_COLUMNS
            ),
            params![id],
            Self::row_to_attempt,
        )
        .optional()
        .map_err(|e| AttemptError::Database(e.to_string()))
    }

    fn row_to_attempt(row: &rusqlite::Row) -> rusqlite::Result<DownloadAttempt> {
        let media_kind: String = row.get(1)?;
        let status: String = row.get(10)?;
        let post_process_status: Option<String> = row.get(17)?;
        let attempted_at_str: String = row.get(20)?;
        let updated_at_str: String = row.get(21)?;

        let kind = media_kind.parse::<MediaKind>().map_err(|e| conversion_error(1, e))?;
        let status = status
            .parse::<AttemptStatus>()
            .map_err(|e| conversion_error(10, e))?;
        let post_process_status = post_process_status
            .map(|s| s.parse::<PostProcessStatus>())
            .transpose()
            .map_err(|e| conversion_error(17, e))?;

        Ok(DownloadAttempt {
            id: row.get(0)?,
            media: MediaRef::new(kind, row.get::<_, String>(2)?),
            indexer: row.get(3)?,
            indexer_id: row.get(4)?,
            release_title: row.get(5)?,
            download_url: row.get(6)?,
            file_size: row.get::<_, Option<i64>>(7)?.map(|v| v.max(0) as u64),
            seeders: row.get(8)?,
            leechers: row.get(9)?,
            status,
            error_type: row.get(11)?,
            error_reason: row.get(12)?,
            download_client: row.get(13)?,
            download_client_job_id: row.get(14)?,
            raw_file_path: row.get(15)?,
            post_processed_file_path: row.get(16)?,
            post_process_status,
            post_process_error_type: row.get(18)?,
            post_process_error_reason: row.get(19)?,
            attempted_at: parse_timestamp(&attempted_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }

    fn row_to_blacklist(row: &rusqlite::Row) -> rusqlite::Result<BlacklistEntry> {
        let media_kind: String = row.get(1)?;
        let reason: String = row.get(7)?;
        let blacklisted_at_str: String = row.get(9)?;

        let kind = media_kind.parse::<MediaKind>().map_err(|e| conversion_error(1, e))?;
        let reason = reason
            .parse::<BlacklistReason>()
            .map_err(|e| conversion_error(7, e))?;

        Ok(BlacklistEntry {
            id: row.get(0)?,
            media: MediaRef::new(kind, row.get::<_, String>(2)?),
            indexer: row.get(3)?,
            indexer_id: row.get(4)?,
            release_title: row.get(5)?,
            download_url: row.get(6)?,
            reason,
            reason_details: row.get(8)?,
            blacklisted_at: parse_timestamp(&blacklisted_at_str),
        })
    }
}

fn conversion_error<E>(column: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Map a write error, turning a partial-unique-index violation into `ActiveExists`.
fn map_write_error(e: rusqlite::Error, media: &MediaRef) -> AttemptError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            AttemptError::ActiveExists(media.to_string())
        }
        _ => AttemptError::Database(e.to_string()),
    }
}

impl AttemptStore for SqliteAttemptStore {
    fn create(&self, request: NewAttempt) -> Result<DownloadAttempt, AttemptError> {
        let conn = self.conn()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now_str = Utc::now().to_rfc3339();

        conn.execute(
            r#"
            INSERT INTO download_attempts (
                id, media_kind, media_id, indexer, indexer_id, release_title, download_url,
                file_size, seeders, leechers, status, download_client, attempted_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
            "#,
            params![
                id,
                request.media.kind.as_str(),
                request.media.id,
                request.indexer,
                request.indexer_id,
                request.release_title,
                request.download_url,
                request.file_size.map(|v| v as i64),
                request.seeders,
                request.leechers,
                AttemptStatus::Pending.as_str(),
                request.download_client,
                now_str,
            ],
        )
        .map_err(|e| map_write_error(e, &request.media))?;

        Self::load(&conn, &id)?
            .ok_or_else(|| AttemptError::Internal(format!("attempt {} vanished after insert", id)))
    }

    fn get(&self, id: &str) -> Result<Option<DownloadAttempt>, AttemptError> {
        let conn = self.conn()?;
        Self::load(&conn, id)
    }

    fn list_for_media(&self, media: &MediaRef) -> Result<Vec<DownloadAttempt>, AttemptError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM download_attempts
                 WHERE media_kind = ?1 AND media_id = ?2
                 ORDER BY attempted_at DESC, rowid DESC",
                ATTEMPT_COLUMNS
            ))
            .map_err(|e| AttemptError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![media.kind.as_str(), media.id],
                Self::row_to_attempt,
            )
            .map_err(|e| AttemptError::Database(e.to_string()))?;

        let mut attempts = Vec::new();
        for row in rows {
            attempts.push(row.map_err(|e| AttemptError::Database(e.to_string()))?);
        }
        Ok(attempts)
    }

    fn exists_with_status(
        &self,
        media: &MediaRef,
        statuses: &[AttemptStatus],
        excluding: Option<&str>,
    ) -> Result<bool, AttemptError> {
        if statuses.is_empty() {
            return Ok(false);
        }

        let conn = self.conn()?;
        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM download_attempts
             WHERE media_kind = ? AND media_id = ? AND id != ? AND status IN ({}))",
            placeholders
        );

        let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![
            Box::new(media.kind.as_str()),
            Box::new(media.id.clone()),
            Box::new(excluding.unwrap_or("").to_string()),
        ];
        for status in statuses {
            values.push(Box::new(status.as_str()));
        }

        let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
        conn.query_row(&sql, params.as_slice(), |row| row.get::<_, bool>(0))
            .map_err(|e| AttemptError::Database(e.to_string()))
    }

    fn save(&self, attempt: &DownloadAttempt) -> Result<DownloadAttempt, AttemptError> {
        let conn = self.conn()?;
        let rows = conn
            .execute(
                r#"
                UPDATE download_attempts SET
                    status = ?1,
                    error_type = ?2,
                    error_reason = ?3,
                    download_client = ?4,
                    download_client_job_id = ?5,
                    raw_file_path = ?6,
                    post_processed_file_path = ?7,
                    post_process_status = ?8,
                    post_process_error_type = ?9,
                    post_process_error_reason = ?10,
                    updated_at = ?11
                WHERE id = ?12
                "#,
                params![
                    attempt.status.as_str(),
                    attempt.error_type,
                    attempt.error_reason,
                    attempt.download_client,
                    attempt.download_client_job_id,
                    attempt.raw_file_path,
                    attempt.post_processed_file_path,
                    attempt.post_process_status.map(|s| s.as_str()),
                    attempt.post_process_error_type,
                    attempt.post_process_error_reason,
                    Utc::now().to_rfc3339(),
                    attempt.id,
                ],
            )
            .map_err(|e| map_write_error(e, &attempt.media))?;

        if rows == 0 {
            return Err(AttemptError::NotFound(attempt.id.clone()));
        }

        Self::load(&conn, &attempt.id)?.ok_or_else(|| AttemptError::NotFound(attempt.id.clone()))
    }

    fn delete(&self, id: &str) -> Result<DownloadAttempt, AttemptError> {
        let conn = self.conn()?;
        let attempt = Self::load(&conn, id)?.ok_or_else(|| AttemptError::NotFound(id.to_string()))?;

        conn.execute("DELETE FROM download_attempts WHERE id = ?1", params![id])
            .map_err(|e| AttemptError::Database(e.to_string()))?;

        Ok(attempt)
    }

    fn blacklist(&self, entry: NewBlacklistEntry) -> Result<(BlacklistEntry, bool), AttemptError> {
        let conn = self.conn()?;
        let id = uuid::Uuid::new_v4().to_string();

        let inserted = conn
            .execute(
                r#"
                INSERT OR IGNORE INTO download_blacklist (
                    id, media_kind, media_id, indexer, indexer_id, release_title,
                    download_url, reason, reason_details, blacklisted_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
                params![
                    id,
                    entry.media.kind.as_str(),
                    entry.media.id,
                    entry.indexer,
                    entry.indexer_id,
                    entry.release_title,
                    entry.download_url,
                    entry.reason.as_str(),
                    entry.reason_details,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| AttemptError::Database(e.to_string()))?;

        let stored = conn
            .query_row(
                &format!(
                    "SELECT {} FROM download_blacklist
                     WHERE media_kind = ?1 AND media_id = ?2 AND indexer = ?3 AND indexer_id = ?4",
                    BLACKLIST_COLUMNS
                ),
                params![
                    entry.media.kind.as_str(),
                    entry.media.id,
                    entry.indexer,
                    entry.indexer_id
                ],
                Self::row_to_blacklist,
            )
            .map_err(|e| AttemptError::Database(e.to_string()))?;

        Ok((stored, inserted > 0))
    }

    fn is_blacklisted(
        &self,
        media: &MediaRef,
        indexer: &str,
        indexer_id: &str,
    ) -> Result<bool, AttemptError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM download_blacklist
             WHERE media_kind = ?1 AND media_id = ?2 AND indexer = ?3 AND indexer_id = ?4)",
            params![media.kind.as_str(), media.id, indexer, indexer_id],
            |row| row.get::<_, bool>(0),
        )
        .map_err(|e| AttemptError::Database(e.to_string()))
    }

    fn blacklist_for_media(&self, media: &MediaRef) -> Result<Vec<BlacklistEntry>, AttemptError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM download_blacklist
                 WHERE media_kind = ?1 AND media_id = ?2
                 ORDER BY blacklisted_at DESC, rowid DESC",
                BLACKLIST_COLUMNS
            ))
            .map_err(|e| AttemptError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![media.kind.as_str(), media.id],
                Self::row_to_blacklist,
            )
            .map_err(|e| AttemptError::Database(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row.map_err(|e| AttemptError::Database(e.to_string()))?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteAttemptStore {
        SqliteAttemptStore::in_memory().unwrap()
    }

    fn book(id: &str) -> MediaRef {
        MediaRef::new(MediaKind::Book, id)
    }

    fn new_attempt(media: &MediaRef, indexer_id: &str) -> NewAttempt {
        NewAttempt {
            media: media.clone(),
            indexer: "NZBgeek".to_string(),
            indexer_id: indexer_id.to_string(),
            release_title: "Dune - Frank Herbert (EPUB)".to_string(),
            download_url: "https://example.com/get/1".to_string(),
            file_size: Some(1024),
            seeders: None,
            leechers: None,
            download_client: Some("sab".to_string()),
        }
    }

    fn blacklist_request(media: &MediaRef, reason: BlacklistReason) -> NewBlacklistEntry {
        NewBlacklistEntry {
            media: media.clone(),
            indexer: "NZBgeek".to_string(),
            indexer_id: "5".to_string(),
            release_title: "Dune".to_string(),
            download_url: "https://example.com/get/1".to_string(),
            reason,
            reason_details: String::new(),
        }
    }

    #[test]
    fn test_create_attempt_is_pending() {
        let store = create_test_store();
        let attempt = store.create(new_attempt(&book("m1"), "5")).unwrap();

        assert_eq!(attempt.status, AttemptStatus::Pending);
        assert_eq!(attempt.media, book("m1"));
        assert_eq!(attempt.file_size, Some(1024));
        assert_eq!(attempt.download_client.as_deref(), Some("sab"));
        assert!(attempt.error_type.is_none());
    }

    #[test]
    fn test_get_nonexistent() {
        let store = create_test_store();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn test_save_updates_fields() {
        let store = create_test_store();
        let mut attempt = store.create(new_attempt(&book("m1"), "5")).unwrap();

        attempt.status = AttemptStatus::Downloading;
        attempt.download_client_job_id = Some("SABnzbd_nzo_1".to_string());
        attempt.post_process_status = Some(PostProcessStatus::Pending);
        store.save(&attempt).unwrap();

        let loaded = store.get(&attempt.id).unwrap().unwrap();
        assert_eq!(loaded.status, AttemptStatus::Downloading);
        assert_eq!(loaded.download_client_job_id.as_deref(), Some("SABnzbd_nzo_1"));
        assert_eq!(loaded.post_process_status, Some(PostProcessStatus::Pending));
    }

    #[test]
    fn test_second_active_attempt_rejected_by_index() {
        let store = create_test_store();
        let media = book("m1");

        let mut first = store.create(new_attempt(&media, "1")).unwrap();
        first.status = AttemptStatus::Downloading;
        store.save(&first).unwrap();

        let mut second = store.create(new_attempt(&media, "2")).unwrap();
        second.status = AttemptStatus::Sent;
        let result = store.save(&second);
        assert!(matches!(result, Err(AttemptError::ActiveExists(_))));

        // Other media are unaffected
        let mut other = store.create(new_attempt(&book("m2"), "1")).unwrap();
        other.status = AttemptStatus::Downloading;
        assert!(store.save(&other).is_ok());
    }

    #[test]
    fn test_exists_with_status() {
        let store = create_test_store();
        let media = book("m1");
        let mut attempt = store.create(new_attempt(&media, "1")).unwrap();

        let active = [AttemptStatus::Sent, AttemptStatus::Downloading];
        assert!(!store.exists_with_status(&media, &active, None).unwrap());

        attempt.status = AttemptStatus::Downloading;
        store.save(&attempt).unwrap();
        assert!(store.exists_with_status(&media, &active, None).unwrap());
        assert!(!store
            .exists_with_status(&media, &active, Some(&attempt.id))
            .unwrap());
        assert!(!store.exists_with_status(&media, &[], None).unwrap());
    }

    #[test]
    fn test_list_for_media_scoped_to_kind() {
        let store = create_test_store();
        store.create(new_attempt(&book("m1"), "1")).unwrap();
        store.create(new_attempt(&book("m1"), "2")).unwrap();
        store
            .create(new_attempt(&MediaRef::new(MediaKind::Audiobook, "m1"), "3"))
            .unwrap();

        let attempts = store.list_for_media(&book("m1")).unwrap();
        assert_eq!(attempts.len(), 2);
        // Newest first
        assert_eq!(attempts[0].indexer_id, "2");
    }

    #[test]
    fn test_delete() {
        let store = create_test_store();
        let attempt = store.create(new_attempt(&book("m1"), "1")).unwrap();

        let deleted = store.delete(&attempt.id).unwrap();
        assert_eq!(deleted.id, attempt.id);
        assert!(store.get(&attempt.id).unwrap().is_none());
        assert!(matches!(
            store.delete(&attempt.id),
            Err(AttemptError::NotFound(_))
        ));
    }

    #[test]
    fn test_blacklist_is_idempotent() {
        let store = create_test_store();
        let media = book("m1");

        let (first, created) = store
            .blacklist(blacklist_request(&media, BlacklistReason::WrongFile))
            .unwrap();
        assert!(created);
        assert_eq!(first.reason, BlacklistReason::WrongFile);

        let (second, created) = store
            .blacklist(blacklist_request(&media, BlacklistReason::Corrupted))
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        // Existing entry is kept as-is
        assert_eq!(second.reason, BlacklistReason::WrongFile);

        assert_eq!(store.blacklist_for_media(&media).unwrap().len(), 1);
    }

    #[test]
    fn test_is_blacklisted_is_per_media() {
        let store = create_test_store();
        store
            .blacklist(blacklist_request(&book("m1"), BlacklistReason::Manual))
            .unwrap();

        assert!(store.is_blacklisted(&book("m1"), "NZBgeek", "5").unwrap());
        assert!(!store.is_blacklisted(&book("m2"), "NZBgeek", "5").unwrap());
        assert!(!store.is_blacklisted(&book("m1"), "NZBgeek", "6").unwrap());
    }
}
