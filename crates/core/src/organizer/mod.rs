//! Organizer module for placing finished downloads into the library tree.
//!
//! Layout is `{library}/{author}/{title}/{title}.{ext}` for single files; a
//! multi-file audiobook gets its audio files copied into `{library}/{author}/{title}/`.
//! Sources are copied, never moved, so the download client keeps its files.

mod error;
mod formats;
mod fs_organizer;
mod sanitize;

pub use error::OrganizerError;
pub use formats::{is_audio_file, is_ebook_file, AUDIO_EXTENSIONS, EBOOK_EXTENSIONS};
pub use fs_organizer::{FsOrganizer, OrganizedFile};
pub use sanitize::{library_dir, library_file, sanitize_component};
