//! Static-export ingestion: CSV import with metadata enrichment.

pub mod importer;
pub mod metadata;

pub use importer::{CsvImporter, ImportError, ImportResult, MAX_ERROR_MESSAGES};
pub use metadata::{ContentInfo, MediaType, MetadataError, MetadataLookup, TmdbClient};
