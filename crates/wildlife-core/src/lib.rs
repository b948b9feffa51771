//! Core types for the wildlife browser.
//!
//! This crate contains shared data structures that are used across all wildlife crates:
//! - Record and partition identifiers for loaded creatures
//! - Sort columns and directions
//! - Outbound events
//! - Configuration types
//! - Error types

mod config;
mod error;
mod event;
mod record;
mod sort_key;

pub use config::{config_dir, config_path, BrowserConfig, FilterSettings};
pub use error::{ConfigError, FetchError, QueryError};
pub use event::WildlifeEvent;
pub use record::{PartitionId, Record, RecordId};
pub use sort_key::{SortColumn, SortDirection, SortKey};
