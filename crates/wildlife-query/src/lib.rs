//! Filter and sort engine for the wildlife browser.
//!
//! This crate provides:
//! - `FilterSpec` / `FilterPipeline` - exclusion, search, level and wishlist stages
//! - `SortKeys` - tri-state multi-column sorting
//! - `RecordSource` / `NameResolver` - the external seams
//! - `QueryController` - load orchestration with superseding requests

pub mod controller;
pub mod filter;
pub mod sort;
pub mod source;

// Re-export commonly used types
pub use controller::{LoadOutcome, LoadStatus, QueryController, Refresh, ResultSet};
pub use filter::{FilterPipeline, FilterSpec, LevelFilter};
pub use sort::SortKeys;
pub use source::{
    resolve_rows, ClassNameResolver, NameResolver, RecordSource, RecordView, Row, TableResolver,
};

// Re-export wildlife_core types for convenience
pub use wildlife_core::{
    FetchError, FilterSettings, PartitionId, QueryError, Record, RecordId, SortColumn,
    SortDirection, SortKey, WildlifeEvent,
};
