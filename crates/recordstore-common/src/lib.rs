//! RecordStore Common - Shared types and utilities
//!
//! This crate provides the record data model, error definitions, naming
//! rules and hashing utilities used across all RecordStore components.

pub mod checksum;
pub mod config;
pub mod error;
pub mod naming;
pub mod types;
pub mod version;

pub use checksum::record_hash;
pub use config::ServiceConfig;
pub use error::{Error, Result};
pub use types::*;
pub use version::{VersionGenerator, current_time_millis};
