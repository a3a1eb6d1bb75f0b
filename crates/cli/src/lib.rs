//! Library interface for the docbulk CLI
//!
//! The binary drives an in-process emulator of the document service; the
//! provisioning and load flows are exposed here for integration testing.

pub mod init;
pub mod load;
pub mod logging;

pub use anyhow::Result;
pub use docbulk_core::config::Config;
pub use init::{connect, ensure_target_provisioned, Connection, ProvisionedTarget};
pub use load::{run_load, LoadSummary};
