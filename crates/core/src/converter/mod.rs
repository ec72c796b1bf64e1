//! Converter module for turning downloaded ebooks into the canonical format.
//!
//! Provides the `EbookConverter` trait and an implementation that shells out
//! to Calibre's `ebook-convert` with a bounded timeout.
//!
//! # Example
//!
//! ```ignore
//! use tomehound_core::converter::{ConversionJob, EbookConvertConverter, EbookConverter};
//!
//! let converter = EbookConvertConverter::new("ebook-convert", 300);
//! converter.validate().await?;
//!
//! let job = ConversionJob {
//!     job_id: attempt.id.clone(),
//!     input_path: PathBuf::from("/downloads/Dune/Dune.mobi"),
//!     output_path: PathBuf::from("/downloads/Dune/Dune.epub"),
//! };
//! let result = converter.convert(&job).await?;
//! ```

mod ebook_convert;
mod error;
mod traits;
mod types;

pub use ebook_convert::EbookConvertConverter;
pub use error::ConverterError;
pub use traits::EbookConverter;
pub use types::{
    canonical_output_path, is_canonical, ConversionJob, ConversionResult, CANONICAL_EXTENSION,
};
