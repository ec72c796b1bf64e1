//! SQLite-backed media catalog implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};

use super::{
    CatalogError, CreateMediaRequest, MediaCatalog, MediaItem, MediaKind, MediaRef, MediaStatus,
};

const SELECT_COLUMNS: &str = "id, kind, title, authors, series, series_index, status, isbn, isbn13,
    language, description, publication_date, publisher, genres, cover_url, cover_path,
    library_path, created_at, updated_at, provider, external_id";

/// SQLite-backed media catalog.
pub struct SqliteMediaCatalog {
    conn: Mutex<Connection>,
}

impl SqliteMediaCatalog {
    /// Create a new SQLite catalog, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite catalog (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS media (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                authors TEXT NOT NULL,
                series TEXT,
                series_index REAL,
                status TEXT NOT NULL,
                isbn TEXT,
                isbn13 TEXT,
                language TEXT,
                description TEXT,
                publication_date TEXT,
                publisher TEXT,
                genres TEXT NOT NULL DEFAULT '[]',
                cover_url TEXT,
                cover_path TEXT,
                library_path TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_media_kind ON media(kind);
            CREATE INDEX IF NOT EXISTS idx_media_status ON media(status);
            "#,
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        // Migration: provider record the item was added from
        let _ = conn.execute("ALTER TABLE media ADD COLUMN provider TEXT", []);
        let _ = conn.execute("ALTER TABLE media ADD COLUMN external_id TEXT", []);

        conn.execute_batch(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_media_external
                ON media(kind, provider, external_id)
                WHERE provider IS NOT NULL AND external_id IS NOT NULL;
            "#,
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Internal("catalog connection lock poisoned".to_string()))
    }

    fn row_to_media(row: &rusqlite::Row) -> rusqlite::Result<MediaItem> {
        let kind_str: String = row.get(1)?;
        let authors_json: String = row.get(3)?;
        let status_str: String = row.get(6)?;
        let genres_json: String = row.get(13)?;
        let created_at_str: String = row.get(17)?;
        let updated_at_str: String = row.get(18)?;

        let kind = kind_str.parse::<MediaKind>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
        })?;
        let status = status_str.parse::<MediaStatus>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(MediaItem {
            id: row.get(0)?,
            kind,
            title: row.get(2)?,
            authors: serde_json::from_str(&authors_json).unwrap_or_default(),
            series: row.get(4)?,
            series_index: row.get(5)?,
            status,
            isbn: row.get(7)?,
            isbn13: row.get(8)?,
            language: row.get(9)?,
            description: row.get(10)?,
            publication_date: row.get(11)?,
            publisher: row.get(12)?,
            genres: serde_json::from_str(&genres_json).unwrap_or_default(),
            cover_url: row.get(14)?,
            cover_path: row.get(15)?,
            library_path: row.get(16)?,
            provider: row.get(19)?,
            external_id: row.get(20)?,
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl MediaCatalog for SqliteMediaCatalog {
    fn create(
        &self,
        kind: MediaKind,
        request: &CreateMediaRequest,
    ) -> Result<MediaItem, CatalogError> {
        let conn = self.conn()?;
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let authors_json = serde_json::to_string(&request.authors)
            .map_err(|e| CatalogError::Internal(e.to_string()))?;
        let genres_json = serde_json::to_string(&request.genres)
            .map_err(|e| CatalogError::Internal(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO media (
                id, kind, title, authors, series, series_index, status, isbn, isbn13,
                language, description, publication_date, publisher, genres, cover_url,
                created_at, updated_at, provider, external_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16,
                ?17, ?18)
            "#,
            params![
                id,
                kind.as_str(),
                request.title,
                authors_json,
                request.series,
                request.series_index,
                MediaStatus::Wanted.as_str(),
                request.isbn,
                request.isbn13,
                request.language,
                request.description,
                request.publication_date,
                request.publisher,
                genres_json,
                request.cover_url,
                now_str,
                request.provider,
                request.external_id,
            ],
        )
        .map_err(|e| match &e {
            rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                CatalogError::AlreadyExists(format!(
                    "{} {}:{}",
                    kind.as_str(),
                    request.provider.as_deref().unwrap_or_default(),
                    request.external_id.as_deref().unwrap_or_default()
                ))
            }
            _ => CatalogError::Database(e.to_string()),
        })?;

        Ok(MediaItem {
            id,
            kind,
            title: request.title.clone(),
            authors: request.authors.clone(),
            series: request.series.clone(),
            series_index: request.series_index,
            status: MediaStatus::Wanted,
            isbn: request.isbn.clone(),
            isbn13: request.isbn13.clone(),
            language: request.language.clone(),
            description: request.description.clone(),
            publication_date: request.publication_date.clone(),
            publisher: request.publisher.clone(),
            genres: request.genres.clone(),
            cover_url: request.cover_url.clone(),
            cover_path: None,
            library_path: None,
            provider: request.provider.clone(),
            external_id: request.external_id.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, media: &MediaRef) -> Result<MediaItem, CatalogError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM media WHERE id = ?1 AND kind = ?2", SELECT_COLUMNS),
            params![media.id, media.kind.as_str()],
            Self::row_to_media,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound(media.to_string()),
            e => CatalogError::Database(e.to_string()),
        })
    }

    fn find(&self, id: &str) -> Result<Option<MediaItem>, CatalogError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {} FROM media WHERE id = ?1", SELECT_COLUMNS),
            params![id],
            Self::row_to_media,
        )
        .optional()
        .map_err(|e| CatalogError::Database(e.to_string()))
    }

    fn find_by_external_id(
        &self,
        kind: MediaKind,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<MediaItem>, CatalogError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM media WHERE kind = ?1 AND provider = ?2 AND external_id = ?3",
                SELECT_COLUMNS
            ),
            params![kind.as_str(), provider, external_id],
            Self::row_to_media,
        )
        .optional()
        .map_err(|e| CatalogError::Database(e.to_string()))
    }

    fn list(&self, kind: Option<MediaKind>) -> Result<Vec<MediaItem>, CatalogError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM media WHERE (?1 IS NULL OR kind = ?1) ORDER BY created_at DESC",
                SELECT_COLUMNS
            ))
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![kind.map(|k| k.as_str())], Self::row_to_media)
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row.map_err(|e| CatalogError::Database(e.to_string()))?);
        }
        Ok(items)
    }

    fn update_status(&self, media: &MediaRef, status: MediaStatus) -> Result<(), CatalogError> {
        let conn = self.conn()?;
        let rows = conn
            .execute(
                "UPDATE media SET status = ?1, updated_at = ?2 WHERE id = ?3 AND kind = ?4",
                params![
                    status.as_str(),
                    Utc::now().to_rfc3339(),
                    media.id,
                    media.kind.as_str()
                ],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if rows == 0 {
            return Err(CatalogError::NotFound(media.to_string()));
        }
        Ok(())
    }

    fn update_library_paths(
        &self,
        media: &MediaRef,
        library_path: &str,
        cover_path: Option<&str>,
    ) -> Result<(), CatalogError> {
        let conn = self.conn()?;
        let rows = conn
            .execute(
                r#"
                UPDATE media
                SET library_path = ?1, cover_path = COALESCE(?2, cover_path), updated_at = ?3
                WHERE id = ?4 AND kind = ?5
                "#,
                params![
                    library_path,
                    cover_path,
                    Utc::now().to_rfc3339(),
                    media.id,
                    media.kind.as_str()
                ],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if rows == 0 {
            return Err(CatalogError::NotFound(media.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_catalog() -> SqliteMediaCatalog {
        SqliteMediaCatalog::in_memory().unwrap()
    }

    fn dune() -> CreateMediaRequest {
        CreateMediaRequest {
            title: "Dune".to_string(),
            authors: vec!["Frank Herbert".to_string()],
            isbn13: Some("9780441013593".to_string()),
            genres: vec!["Science Fiction".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_create_and_get() {
        let catalog = create_test_catalog();
        let created = catalog.create(MediaKind::Book, &dune()).unwrap();
        assert_eq!(created.status, MediaStatus::Wanted);

        let loaded = catalog.get(&created.media_ref()).unwrap();
        assert_eq!(loaded.title, "Dune");
        assert_eq!(loaded.authors, vec!["Frank Herbert"]);
        assert_eq!(loaded.isbn13.as_deref(), Some("9780441013593"));
        assert_eq!(loaded.genres, vec!["Science Fiction"]);
    }

    #[test]
    fn test_get_with_wrong_kind_is_not_found() {
        let catalog = create_test_catalog();
        let created = catalog.create(MediaKind::Book, &dune()).unwrap();

        let wrong = MediaRef::new(MediaKind::Audiobook, created.id);
        assert!(matches!(catalog.get(&wrong), Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn test_find_across_kinds() {
        let catalog = create_test_catalog();
        let created = catalog.create(MediaKind::Audiobook, &dune()).unwrap();

        let found = catalog.find(&created.id).unwrap().unwrap();
        assert_eq!(found.kind, MediaKind::Audiobook);
        assert!(catalog.find("missing").unwrap().is_none());
    }

    #[test]
    fn test_list_filters_by_kind() {
        let catalog = create_test_catalog();
        catalog.create(MediaKind::Book, &dune()).unwrap();
        catalog.create(MediaKind::Audiobook, &dune()).unwrap();

        assert_eq!(catalog.list(None).unwrap().len(), 2);
        assert_eq!(catalog.list(Some(MediaKind::Book)).unwrap().len(), 1);
    }

    #[test]
    fn test_update_status() {
        let catalog = create_test_catalog();
        let created = catalog.create(MediaKind::Book, &dune()).unwrap();

        catalog
            .update_status(&created.media_ref(), MediaStatus::Downloading)
            .unwrap();
        let loaded = catalog.get(&created.media_ref()).unwrap();
        assert_eq!(loaded.status, MediaStatus::Downloading);
    }

    #[test]
    fn test_update_status_nonexistent() {
        let catalog = create_test_catalog();
        let result = catalog.update_status(
            &MediaRef::new(MediaKind::Book, "nope"),
            MediaStatus::Wanted,
        );
        assert!(matches!(result, Err(CatalogError::NotFound(_))));
    }

    #[test]
    fn test_update_library_paths_keeps_cover_when_none() {
        let catalog = create_test_catalog();
        let created = catalog.create(MediaKind::Book, &dune()).unwrap();
        let media = created.media_ref();

        catalog
            .update_library_paths(&media, "/lib/a.epub", Some("/lib/a.jpg"))
            .unwrap();
        catalog
            .update_library_paths(&media, "/lib/b.epub", None)
            .unwrap();

        let loaded = catalog.get(&media).unwrap();
        assert_eq!(loaded.library_path.as_deref(), Some("/lib/b.epub"));
        assert_eq!(loaded.cover_path.as_deref(), Some("/lib/a.jpg"));
    }

    fn from_openlibrary(id: &str) -> CreateMediaRequest {
        CreateMediaRequest {
            provider: Some("openlibrary".to_string()),
            external_id: Some(id.to_string()),
            ..dune()
        }
    }

    #[test]
    fn test_find_by_external_id() {
        let catalog = create_test_catalog();
        let created = catalog
            .create(MediaKind::Book, &from_openlibrary("OL893415W"))
            .unwrap();

        let found = catalog
            .find_by_external_id(MediaKind::Book, "openlibrary", "OL893415W")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.external_id.as_deref(), Some("OL893415W"));
        assert!(catalog
            .find_by_external_id(MediaKind::Audiobook, "openlibrary", "OL893415W")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_external_id_unique_per_kind() {
        let catalog = create_test_catalog();
        catalog
            .create(MediaKind::Book, &from_openlibrary("OL893415W"))
            .unwrap();

        let duplicate = catalog.create(MediaKind::Book, &from_openlibrary("OL893415W"));
        assert!(matches!(duplicate, Err(CatalogError::AlreadyExists(_))));

        // Same record as an audiobook, and items without a provider, are fine.
        catalog
            .create(MediaKind::Audiobook, &from_openlibrary("OL893415W"))
            .unwrap();
        catalog.create(MediaKind::Book, &dune()).unwrap();
        catalog.create(MediaKind::Book, &dune()).unwrap();
    }
}
