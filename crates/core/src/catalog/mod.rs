//! Media catalog - the wanted books and audiobooks that downloads are attached to.

mod sqlite;
mod types;

pub use sqlite::SqliteMediaCatalog;
pub use types::*;

/// Trait for media catalog storage.
pub trait MediaCatalog: Send + Sync {
    /// Add a media item with status `wanted`.
    ///
    /// Fails with `AlreadyExists` when another item of the same kind carries
    /// the same provider and external id.
    fn create(&self, kind: MediaKind, request: &CreateMediaRequest)
        -> Result<MediaItem, CatalogError>;

    /// Get a media item by its tagged reference.
    fn get(&self, media: &MediaRef) -> Result<MediaItem, CatalogError>;

    /// Find a media item by id across all kinds.
    fn find(&self, id: &str) -> Result<Option<MediaItem>, CatalogError>;

    /// Find the item of `kind` added from a provider record.
    fn find_by_external_id(
        &self,
        kind: MediaKind,
        provider: &str,
        external_id: &str,
    ) -> Result<Option<MediaItem>, CatalogError>;

    /// List media items, optionally filtered by kind.
    fn list(&self, kind: Option<MediaKind>) -> Result<Vec<MediaItem>, CatalogError>;

    /// Set the lifecycle status of a media item.
    fn update_status(&self, media: &MediaRef, status: MediaStatus) -> Result<(), CatalogError>;

    /// Record where the organized file and its cover ended up.
    fn update_library_paths(
        &self,
        media: &MediaRef,
        library_path: &str,
        cover_path: Option<&str>,
    ) -> Result<(), CatalogError>;
}
