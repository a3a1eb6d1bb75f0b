//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;

use super::defaults::*;
use super::{global_config_path, Config};

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: LibConfigBuilder<config::builder::DefaultState>,
    key: &str,
    value: T,
) -> Result<LibConfigBuilder<config::builder::DefaultState>> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

impl Config {
    /// Loads configuration from a TOML file with environment variable overrides
    ///
    /// Environment variables are prefixed with `DOCBULK_` and use double underscores
    /// for nested values. For example:
    /// - `DOCBULK_LOADER__MAX_SCRIPT_SIZE=100000`
    /// - `DOCBULK_PROVISIONING__DATABASE_ID=bench`
    pub fn from_file(path: &Path) -> Result<Self> {
        let builder = ConfigLib::builder();

        // Loader defaults (config crate doesn't apply serde defaults for missing sections)
        let builder = set_config_default(
            builder,
            "loader.source_dir",
            default_source_dir().to_string_lossy().into_owned(),
        )?;
        let builder = set_config_default(builder, "loader.file_pattern", default_file_pattern())?;
        let builder =
            set_config_default(builder, "loader.max_files", default_max_files() as i64)?;
        let builder = set_config_default(
            builder,
            "loader.max_script_size",
            default_max_script_size() as i64,
        )?;
        let builder = set_config_default(builder, "loader.oversized_documents", "submit")?;

        // Provisioning defaults
        let builder =
            set_config_default(builder, "provisioning.database_id", default_database_id())?;
        let builder = set_config_default(
            builder,
            "provisioning.collection_id",
            default_collection_id(),
        )?;
        let builder = set_config_default(
            builder,
            "provisioning.bulk_import_procedure",
            default_bulk_import_procedure(),
        )?;
        let builder = set_config_default(builder, "provisioning.recreate_database", false)?;
        let builder =
            set_config_default(builder, "provisioning.offer_type", default_offer_type())?;

        // Emulator defaults
        let builder = set_config_default(builder, "emulator.throttle_every", 0i64)?;
        let builder = set_config_default(
            builder,
            "emulator.throttle_retry_after_ms",
            default_throttle_retry_after_ms() as i64,
        )?;
        let mut builder =
            set_config_default(builder, "emulator.max_documents_per_execution", 0i64)?;

        // Add the config file if it exists
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        // Add environment variables with DOCBULK_ prefix
        builder = builder.add_source(
            Environment::with_prefix("DOCBULK")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from a single file
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (~/.docbulk/config.toml or custom --config path)
    /// 3. Environment variables (DOCBULK_*)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => global_config_path()?,
        };
        Self::from_file(&path)
    }
}
