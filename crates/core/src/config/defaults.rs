//! Default values and functions for configuration

use std::path::PathBuf;

// Default constants
pub(crate) const DEFAULT_FILE_PATTERN: &str = "*.json";
pub(crate) const DEFAULT_MAX_FILES: usize = 2000;
pub(crate) const DEFAULT_MAX_SCRIPT_SIZE: usize = 50_000;
pub(crate) const DEFAULT_DATABASE_ID: &str = "bulkdb";
pub(crate) const DEFAULT_COLLECTION_ID: &str = "bulkcoll";
pub(crate) const DEFAULT_BULK_IMPORT_PROCEDURE: &str = "BulkImport";
pub(crate) const DEFAULT_OFFER_TYPE: &str = "S1";

pub(crate) fn default_source_dir() -> PathBuf {
    PathBuf::from(".")
}

pub(crate) fn default_file_pattern() -> String {
    DEFAULT_FILE_PATTERN.to_string()
}

pub(crate) fn default_max_files() -> usize {
    DEFAULT_MAX_FILES
}

pub(crate) fn default_max_script_size() -> usize {
    DEFAULT_MAX_SCRIPT_SIZE
}

pub(crate) fn default_database_id() -> String {
    DEFAULT_DATABASE_ID.to_string()
}

pub(crate) fn default_collection_id() -> String {
    DEFAULT_COLLECTION_ID.to_string()
}

pub(crate) fn default_bulk_import_procedure() -> String {
    DEFAULT_BULK_IMPORT_PROCEDURE.to_string()
}

pub(crate) fn default_offer_type() -> String {
    DEFAULT_OFFER_TYPE.to_string()
}

pub(crate) fn default_throttle_retry_after_ms() -> u64 {
    10
}
