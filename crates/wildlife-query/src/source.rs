//! Record sources and name resolution.
//!
//! The `RecordSource` trait is the only suspending seam of the engine and is
//! mockable for testing. Names are resolved once per pass into `Row`s so the
//! filter and sort stages never call the resolver themselves.

use std::collections::HashMap;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use wildlife_core::{FetchError, PartitionId, Record};

// =============================================================================
// Record Source
// =============================================================================

/// Supplies the unfiltered record set of a partition.
///
/// Returns futures so the caller decides how to drive them.
pub trait RecordSource: Send + Sync {
    /// Fetch all records of a partition.
    ///
    /// With `force_refresh = false` the source may answer from its own cache.
    fn fetch(
        &self,
        partition: &PartitionId,
        force_refresh: bool,
    ) -> BoxFuture<'static, Result<Vec<Record>, FetchError>>;
}

// =============================================================================
// Name Resolution
// =============================================================================

/// Resolves the display name of a record from an external lookup table.
#[cfg_attr(test, mockall::automock)]
pub trait NameResolver: Send + Sync {
    /// Resolve a display name, or `None` on a lookup miss.
    fn resolve(&self, record: &Record) -> Option<String>;
}

/// Resolver without a lookup table. Every record falls back to its class.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassNameResolver;

impl NameResolver for ClassNameResolver {
    fn resolve(&self, _record: &Record) -> Option<String> {
        None
    }
}

/// Resolver backed by a class → name table.
///
/// A name saved with the instance wins over the table entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableResolver {
    names: HashMap<String, String>,
}

impl TableResolver {
    pub fn new(names: HashMap<String, String>) -> Self {
        Self { names }
    }

    /// Add a class → name entry.
    pub fn with_name(mut self, class_name: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(class_name.into(), name.into());
        self
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl NameResolver for TableResolver {
    fn resolve(&self, record: &Record) -> Option<String> {
        if let Some(custom) = record.custom_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return Some(custom.to_string());
        }
        self.names.get(&record.class_name).cloned()
    }
}

// =============================================================================
// Rows
// =============================================================================

/// A record as seen by the filter and sort stages.
pub trait RecordView {
    fn record(&self) -> &Record;

    /// Display name, already resolved.
    fn display_name(&self) -> &str;
}

impl<T: RecordView + ?Sized> RecordView for &T {
    fn record(&self) -> &Record {
        (**self).record()
    }

    fn display_name(&self) -> &str {
        (**self).display_name()
    }
}

/// A record paired with the name resolved for the current pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub record: Record,
    pub name: String,
}

impl Row {
    pub fn new(record: Record, name: impl Into<String>) -> Self {
        Self {
            record,
            name: name.into(),
        }
    }

    /// Resolve the display name, falling back to the class identifier.
    pub fn resolve(record: &Record, resolver: &dyn NameResolver) -> Self {
        let name = match resolver.resolve(record) {
            Some(name) => name,
            None => {
                tracing::trace!("No name for class {}, using class", record.class_name);
                record.class_name.clone()
            }
        };
        Self::new(record.clone(), name)
    }
}

impl RecordView for Row {
    fn record(&self) -> &Record {
        &self.record
    }

    fn display_name(&self) -> &str {
        &self.name
    }
}

/// Resolve every record exactly once.
pub fn resolve_rows<'a, I>(records: I, resolver: &dyn NameResolver) -> Vec<Row>
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .map(|record| Row::resolve(record, resolver))
        .collect()
}

// =============================================================================
// Mock Source for Testing
// =============================================================================


// =============================================================================
// Tests
// =============================================================================
