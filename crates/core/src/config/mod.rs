//! Configuration module for the docbulk system
//!
//! This module provides configuration structures and loading mechanisms for the
//! provisioning and bulk-load flows. Configuration can be loaded from TOML files
//! and/or environment variables.

mod defaults;
mod loading;


use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use defaults::*;

/// Returns the path to the global configuration file
///
/// The global config is stored at `~/.docbulk/config.toml`.
pub fn global_config_path() -> Result<PathBuf> {
    let home_dir = dirs::home_dir()
        .ok_or_else(|| Error::config("Unable to determine home directory".to_string()))?;
    Ok(home_dir.join(".docbulk").join("config.toml"))
}

/// Main configuration structure for the docbulk system
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Corpus and batching configuration
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Remote resource provisioning configuration
    #[serde(default)]
    pub provisioning: ProvisioningConfig,

    /// In-process emulator configuration
    #[serde(default)]
    pub emulator: EmulatorConfig,
}

/// What to do with a single document larger than `max_script_size`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversizedPolicy {
    /// Send the document alone in its own batch
    #[default]
    Submit,
    /// Fail the load before the document is sent
    Reject,
}

/// Corpus and batching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Directory holding one document per file
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,

    /// Filename glob matched inside `source_dir`
    #[serde(default = "default_file_pattern")]
    pub file_pattern: String,

    /// Maximum number of files considered for one load
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Byte ceiling for one serialized batch argument
    #[serde(default = "default_max_script_size")]
    pub max_script_size: usize,

    /// Handling of single documents above `max_script_size`
    #[serde(default)]
    pub oversized_documents: OversizedPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            file_pattern: default_file_pattern(),
            max_files: default_max_files(),
            max_script_size: default_max_script_size(),
            oversized_documents: OversizedPolicy::default(),
        }
    }
}

/// Remote resource provisioning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Target database id
    #[serde(default = "default_database_id")]
    pub database_id: String,

    /// Target collection id
    #[serde(default = "default_collection_id")]
    pub collection_id: String,

    /// Optional JSON collection template applied when the collection is created
    #[serde(default)]
    pub collection_spec: Option<PathBuf>,

    /// Id of the server-side batch-insert procedure
    #[serde(default = "default_bulk_import_procedure")]
    pub bulk_import_procedure: String,

    /// Optional script file overriding the bundled batch-insert body
    #[serde(default)]
    pub bulk_import_script: Option<PathBuf>,

    /// Delete and recreate the database before provisioning
    #[serde(default)]
    pub recreate_database: bool,

    /// Offer type used when no collection template names one
    #[serde(default = "default_offer_type")]
    pub offer_type: String,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            database_id: default_database_id(),
            collection_id: default_collection_id(),
            collection_spec: None,
            bulk_import_procedure: default_bulk_import_procedure(),
            bulk_import_script: None,
            recreate_database: false,
            offer_type: default_offer_type(),
        }
    }
}

/// Configuration for the in-process document service emulator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorConfig {
    /// Throttle every Nth request (0 disables throttling)
    #[serde(default)]
    pub throttle_every: u64,

    /// Retry-after hint attached to throttled responses
    #[serde(default = "default_throttle_retry_after_ms")]
    pub throttle_retry_after_ms: u64,

    /// Documents committed per procedure execution (0 means unlimited)
    #[serde(default)]
    pub max_documents_per_execution: usize,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            throttle_every: 0,
            throttle_retry_after_ms: default_throttle_retry_after_ms(),
            max_documents_per_execution: 0,
        }
    }
}

impl Config {
    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.loader.max_files == 0 {
            return Err(Error::config("Invalid max_files: must be at least 1"));
        }
        if self.loader.max_script_size == 0 {
            return Err(Error::config("Invalid max_script_size: must be at least 1"));
        }
        if self.loader.file_pattern.trim().is_empty() {
            return Err(Error::config("Invalid file_pattern: must not be empty"));
        }
        if self.provisioning.database_id.trim().is_empty() {
            return Err(Error::config("Invalid database_id: must not be empty"));
        }
        if self.provisioning.collection_id.trim().is_empty() {
            return Err(Error::config("Invalid collection_id: must not be empty"));
        }
        if self.provisioning.bulk_import_procedure.trim().is_empty() {
            return Err(Error::config(
                "Invalid bulk_import_procedure: must not be empty",
            ));
        }
        Ok(())
    }
}
