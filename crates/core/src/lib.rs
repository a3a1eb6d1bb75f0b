//! Core types for the docbulk provisioning and bulk-load driver
//!
//! This crate provides the foundational pieces used throughout the
//! docbulk system:
//!
//! - **Configuration**: layered configuration for the loader, provisioning and emulator
//! - **Error handling**: Unified error types
//!

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod config;
pub mod error;

// Re-export main types for convenience
pub use config::{Config, EmulatorConfig, LoaderConfig, OversizedPolicy, ProvisioningConfig};
pub use error::{Error, Result, ResultExt};
