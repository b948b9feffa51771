//! Sort column and direction types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A sortable column of the wildlife table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SortColumn {
    Id,
    Class,
    Name,
    Level,
}

impl SortColumn {
    /// All columns in table order.
    pub const ALL: [SortColumn; 4] = [
        SortColumn::Id,
        SortColumn::Class,
        SortColumn::Name,
        SortColumn::Level,
    ];

    /// Lowercase column name.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::Class => "class",
            SortColumn::Name => "name",
            SortColumn::Level => "level",
        }
    }
}

impl fmt::Display for SortColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortColumn::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown sort column: {}", s))
    }
}

/// Direction of an active sort key.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// An active sort key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(column: SortColumn, direction: SortDirection) -> Self {
        Self { column, direction }
    }
}
