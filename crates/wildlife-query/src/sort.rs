//! Multi-column sort state.
//!
//! Each column cycles unsorted → ascending → descending → unsorted. Active
//! keys are kept in precedence order: a newly activated column becomes the
//! primary key, a column whose direction flips keeps its place, and a
//! deactivated column leaves the sequence.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use wildlife_core::{SortColumn, SortDirection, SortKey};

use crate::source::RecordView;

/// Active sort keys, primary first. No column appears twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortKeys {
    keys: Vec<SortKey>,
}

impl SortKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance a column through the three-state cycle.
    ///
    /// Returns the column's new direction, `None` once it is unsorted.
    pub fn toggle(&mut self, column: SortColumn) -> Option<SortDirection> {
        match self.keys.iter().position(|key| key.column == column) {
            None => {
                self.keys
                    .insert(0, SortKey::new(column, SortDirection::Ascending));
                Some(SortDirection::Ascending)
            }
            Some(index) => match self.keys[index].direction {
                SortDirection::Ascending => {
                    self.keys[index].direction = SortDirection::Descending;
                    Some(SortDirection::Descending)
                }
                SortDirection::Descending => {
                    self.keys.remove(index);
                    None
                }
            },
        }
    }

    /// Current direction of a column.
    pub fn direction(&self, column: SortColumn) -> Option<SortDirection> {
        self.keys
            .iter()
            .find(|key| key.column == column)
            .map(|key| key.direction)
    }

    /// The key consulted first.
    pub fn primary(&self) -> Option<SortKey> {
        self.keys.first().copied()
    }

    /// Active keys in precedence order.
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    /// Build a comparator over the current keys.
    ///
    /// Keys are compared lexicographically; rows tied on every key compare
    /// `Equal`, so a stable sort preserves their relative order.
    pub fn comparator<R: RecordView>(&self) -> impl Fn(&R, &R) -> Ordering {
        let keys = self.keys.clone();
        move |a: &R, b: &R| {
            keys.iter()
                .map(|key| {
                    let ord = compare_column(key.column, a, b);
                    match key.direction {
                        SortDirection::Ascending => ord,
                        SortDirection::Descending => ord.reverse(),
                    }
                })
                .find(|ord| ord.is_ne())
                .unwrap_or(Ordering::Equal)
        }
    }

    /// Stable-sort rows in place. No-op without active keys.
    pub fn sort<R: RecordView>(&self, rows: &mut [R]) {
        if self.keys.is_empty() {
            return;
        }
        rows.sort_by(self.comparator());
    }
}

/// Ascending order of a single column.
fn compare_column<R: RecordView>(column: SortColumn, a: &R, b: &R) -> Ordering {
    let (ra, rb) = (a.record(), b.record());
    match column {
        SortColumn::Id => ra.id.cmp(&rb.id),
        SortColumn::Class => ra.class_name.cmp(&rb.class_name),
        SortColumn::Name => a.display_name().cmp(b.display_name()),
        SortColumn::Level => ra.base_level.cmp(&rb.base_level),
    }
}

// =============================================================================
// Tests
// =============================================================================
