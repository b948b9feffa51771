//! Record and partition types for loaded save data.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Stable record identifier within a partition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub i64);

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name of a partition ("map") whose records are loaded together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionId(pub String);

impl From<String> for PartitionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PartitionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for PartitionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A creature record extracted from a save file.
///
/// Records are read-only once loaded. The display name is not stored here:
/// it depends on an external lookup table and is resolved per pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier, unique within the partition.
    pub id: RecordId,

    /// Game class identifier, e.g. `Raptor_Character_BP_C`.
    pub class_name: String,

    /// Level the creature spawned with.
    #[serde(default)]
    pub base_level: u32,

    /// Whether the object is a creature at all.
    #[serde(default)]
    pub is_creature: bool,

    /// Whether the creature is untamed.
    #[serde(default)]
    pub is_wild: bool,

    /// Name saved with the instance, if the player assigned one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
}

impl Record {
    /// Create a wild creature record.
    pub fn new(id: impl Into<RecordId>, class_name: impl Into<String>, base_level: u32) -> Self {
        Self {
            id: id.into(),
            class_name: class_name.into(),
            base_level,
            is_creature: true,
            is_wild: true,
            custom_name: None,
        }
    }

    /// Set the name saved with the instance.
    pub fn with_custom_name(mut self, name: impl Into<String>) -> Self {
        self.custom_name = Some(name.into());
        self
    }

    /// Mark the record as tamed.
    pub fn tamed(mut self) -> Self {
        self.is_wild = false;
        self
    }

    /// Check whether the record passes the wildlife pre-filter.
    pub fn is_wild_creature(&self) -> bool {
        self.is_creature && self.is_wild
    }
}
