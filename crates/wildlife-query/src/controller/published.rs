//! Observable load status and published results.
//!
//! Publishing and status changes go through this type only, so every change
//! reaches subscribers.

use std::sync::Arc;

use tokio::sync::watch;
use wildlife_core::PartitionId;

use crate::source::Row;

/// Lifecycle of a controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadStatus {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// A fetch is in flight. Commands are disabled.
    Loading,
    /// The latest request was published.
    Ready,
    /// The latest fetch failed; carries the message shown to the user.
    Failed(String),
}

impl LoadStatus {
    pub fn is_busy(&self) -> bool {
        matches!(self, LoadStatus::Loading)
    }
}

/// An ordered, filtered result published by a controller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    /// Sequence number of the request that produced it. 0 before any publish.
    pub sequence: u64,

    /// Partition the rows belong to.
    pub partition: Option<PartitionId>,

    /// Rows in display order.
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Watch channels for the results and status of one controller.
pub struct Published {
    results_tx: watch::Sender<Arc<ResultSet>>,
    results_rx: watch::Receiver<Arc<ResultSet>>,
    status_tx: watch::Sender<LoadStatus>,
    status_rx: watch::Receiver<LoadStatus>,
}

impl Published {
    pub fn new() -> Self {
        let (results_tx, results_rx) = watch::channel(Arc::new(ResultSet::default()));
        let (status_tx, status_rx) = watch::channel(LoadStatus::Idle);
        Self {
            results_tx,
            results_rx,
            status_tx,
            status_rx,
        }
    }

    /// Replace the published results.
    pub fn publish(&self, results: ResultSet) {
        tracing::debug!(
            "Publishing {} rows for request {}",
            results.rows.len(),
            results.sequence
        );
        let _ = self.results_tx.send(Arc::new(results));
    }

    /// Broadcast a status change. Unchanged statuses are not re-sent.
    pub fn set_status(&self, status: LoadStatus) {
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                tracing::debug!("Status {:?} -> {:?}", current, status);
                *current = status;
                true
            }
        });
    }

    pub fn results(&self) -> Arc<ResultSet> {
        self.results_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<ResultSet>> {
        self.results_rx.clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<LoadStatus> {
        self.status_rx.clone()
    }
}

impl Default for Published {
    fn default() -> Self {
        Self::new()
    }
}
