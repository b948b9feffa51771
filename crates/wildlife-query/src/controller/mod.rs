//! Query Controller
//!
//! The QueryController orchestrates one partition selector:
//! - Fetching records from the `RecordSource` (cache-aware)
//! - Running the filter pipeline and the sort keys
//! - Publishing the ordered result and the load status
//! - Emitting outbound events for the selected record
//!
//! ## Load Flow
//!
//! ```text
//! request_load(partition)
//!        │
//!        ▼
//! ┌───────────────────────┐
//! │ sequence += 1         │
//! │ status = Loading      │
//! └──────────┬────────────┘
//!            │
//!       ┌────┴────┐
//!       │         │
//!       ▼         ▼
//!    Cached     fetch()
//!    records    (may suspend)
//!       │         │
//!       └────┬────┘
//!            ▼
//! sequence still latest? ── no ──▶ Superseded (dropped)
//!            │ yes
//!            ▼
//! wild creatures → resolve names → filter → sort
//! (current filter/sort state, not the state at request time)
//!            │
//!            ▼
//! publish, status = Ready
//! ```
//!
//! Filter and sort changes made while a load is in flight are recorded
//! and picked up when that load completes. Changes made while idle start
//! a load of the current partition right away.
//!
//! A load whose future is dropped before it finishes leaves `Loading` for
//! `Failed(Cancelled)` if it was still the latest request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use wildlife_core::{
    FetchError, FilterSettings, PartitionId, QueryError, Record, RecordId, SortColumn,
    WildlifeEvent,
};

use crate::filter::FilterSpec;
use crate::sort::SortKeys;
use crate::source::{resolve_rows, NameResolver, RecordSource, Row};

mod published;

pub use published::{LoadStatus, Published, ResultSet};

/// Default upper bound for a single fetch.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Events kept per lagging subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 256;

// =============================================================================
// Outcomes
// =============================================================================

/// What happened to a load request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The result was published.
    Published { sequence: u64, count: usize },
    /// A newer request started first; the result was dropped.
    Superseded,
}

/// Handle to a load started by a state change.
///
/// Dropping it leaves the load running.
#[derive(Debug, Default)]
pub struct Refresh {
    handle: Option<JoinHandle<Result<LoadOutcome, QueryError>>>,
}

impl Refresh {
    /// No load was started.
    pub fn none() -> Self {
        Self { handle: None }
    }

    pub fn is_scheduled(&self) -> bool {
        self.handle.is_some()
    }

    /// Wait for the load, if one was started.
    pub async fn wait(self) -> Option<Result<LoadOutcome, QueryError>> {
        match self.handle {
            Some(handle) => match handle.await {
                Ok(result) => Some(result),
                Err(e) => {
                    tracing::error!("Reload task failed: {}", e);
                    None
                }
            },
            None => None,
        }
    }
}

// =============================================================================
// Controller State
// =============================================================================

/// Mutable state guarded by the controller lock.
struct ControllerState {
    status: LoadStatus,
    partition: Option<PartitionId>,
    filter: FilterSpec,
    sort: SortKeys,
    selected: Option<RecordId>,
    /// Latest request sequence number.
    sequence: u64,
    cache: HashMap<PartitionId, Arc<Vec<Record>>>,
    timeout: Duration,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            status: LoadStatus::Idle,
            partition: None,
            filter: FilterSpec::default(),
            sort: SortKeys::default(),
            selected: None,
            sequence: 0,
            cache: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Pre-filter, resolve each name once, filter, then sort.
    fn run_pass(&self, records: &[Record], resolver: &dyn NameResolver) -> Vec<Row> {
        let pipeline = self.filter.compile();
        let rows = resolve_rows(records.iter().filter(|r| r.is_wild_creature()), resolver);
        let mut rows = pipeline.apply(rows);
        self.sort.sort(&mut rows);
        rows
    }
}

/// A started request, waiting for its records.
struct LoadTicket {
    sequence: u64,
    partition: PartitionId,
    force_refresh: bool,
    cached: Option<Arc<Vec<Record>>>,
    timeout: Duration,
}

/// Leaves `Loading` when a load is dropped mid-fetch.
struct LoadGuard<'a> {
    controller: &'a QueryController,
    sequence: u64,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.controller.inner.state.lock();
        if state.sequence == self.sequence && state.status.is_busy() {
            tracing::debug!("Request {} dropped before completing", self.sequence);
            let status = LoadStatus::Failed(FetchError::Cancelled.to_string());
            self.controller.set_status(&mut state, status);
        }
    }
}

// =============================================================================
// Query Controller
// =============================================================================

struct Inner {
    source: Arc<dyn RecordSource>,
    resolver: Arc<dyn NameResolver>,
    state: Mutex<ControllerState>,
    published: Published,
    events: broadcast::Sender<WildlifeEvent>,
}

/// Loads, filters, sorts and publishes the records of one partition selector.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct QueryController {
    inner: Arc<Inner>,
}

impl QueryController {
    /// Create a controller over a record source and a name resolver.
    pub fn new(source: Arc<dyn RecordSource>, resolver: Arc<dyn NameResolver>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                source,
                resolver,
                state: Mutex::new(ControllerState::new()),
                published: Published::new(),
                events,
            }),
        }
    }

    /// Create with a custom fetch timeout.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.inner.state.lock().timeout = timeout;
        self
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Subscribe to published results.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ResultSet>> {
        self.inner.published.subscribe()
    }

    /// Subscribe to status changes.
    pub fn subscribe_status(&self) -> watch::Receiver<LoadStatus> {
        self.inner.published.subscribe_status()
    }

    /// Subscribe to outbound events.
    ///
    /// A subscriber more than `EVENT_CAPACITY` events behind receives
    /// `RecvError::Lagged` and skips the oldest ones.
    pub fn events(&self) -> broadcast::Receiver<WildlifeEvent> {
        self.inner.events.subscribe()
    }

    /// Latest published results.
    pub fn results(&self) -> Arc<ResultSet> {
        self.inner.published.results()
    }

    pub fn status(&self) -> LoadStatus {
        self.inner.state.lock().status.clone()
    }

    /// Whether mutating commands are currently allowed.
    pub fn commands_enabled(&self) -> bool {
        !self.inner.state.lock().status.is_busy()
    }

    pub fn current_partition(&self) -> Option<PartitionId> {
        self.inner.state.lock().partition.clone()
    }

    pub fn filter_spec(&self) -> FilterSpec {
        self.inner.state.lock().filter.clone()
    }

    pub fn sort_keys(&self) -> SortKeys {
        self.inner.state.lock().sort.clone()
    }

    // =========================================================================
    // Load Flow
    // =========================================================================

    /// Load a partition and publish its filtered, sorted records.
    ///
    /// With `force_refresh = false` a set fetched earlier for the same
    /// partition is reused. Returns `Superseded` when a newer request
    /// started before this one finished.
    pub async fn request_load(
        &self,
        partition: impl Into<PartitionId>,
        force_refresh: bool,
    ) -> Result<LoadOutcome, QueryError> {
        let ticket = {
            let mut state = self.inner.state.lock();
            self.begin_load(&mut state, partition.into(), force_refresh)
        };
        self.run_load(ticket).await
    }

    /// Load the current partition again.
    pub async fn reload(&self, force_refresh: bool) -> Result<LoadOutcome, QueryError> {
        let ticket = {
            let mut state = self.inner.state.lock();
            let partition = state.partition.clone().ok_or(QueryError::NoPartition)?;
            self.begin_load(&mut state, partition, force_refresh)
        };
        self.run_load(ticket).await
    }

    /// Start a request: bump the sequence and enter `Loading`.
    fn begin_load(
        &self,
        state: &mut ControllerState,
        partition: PartitionId,
        force_refresh: bool,
    ) -> LoadTicket {
        state.sequence += 1;
        state.partition = Some(partition.clone());
        let cached = if force_refresh {
            None
        } else {
            state.cache.get(&partition).cloned()
        };
        self.set_status(state, LoadStatus::Loading);

        tracing::debug!(
            "Request {} for {} (force_refresh: {}, cached: {})",
            state.sequence,
            partition,
            force_refresh,
            cached.is_some()
        );

        LoadTicket {
            sequence: state.sequence,
            partition,
            force_refresh,
            cached,
            timeout: state.timeout,
        }
    }

    async fn run_load(&self, ticket: LoadTicket) -> Result<LoadOutcome, QueryError> {
        let _guard = LoadGuard {
            controller: self,
            sequence: ticket.sequence,
        };
        let records = match ticket.cached.clone() {
            Some(records) => records,
            None => {
                let fetch = self
                    .inner
                    .source
                    .fetch(&ticket.partition, ticket.force_refresh);
                match tokio::time::timeout(ticket.timeout, fetch).await {
                    Ok(Ok(records)) => Arc::new(records),
                    Ok(Err(e)) => return self.fail_load(&ticket, e),
                    Err(_) => {
                        let e = FetchError::Timeout {
                            duration: ticket.timeout,
                        };
                        return self.fail_load(&ticket, e);
                    }
                }
            }
        };
        Ok(self.complete_load(&ticket, records))
    }

    /// Apply the current filter and sort state and publish, unless superseded.
    fn complete_load(&self, ticket: &LoadTicket, records: Arc<Vec<Record>>) -> LoadOutcome {
        let mut state = self.inner.state.lock();
        if state.sequence != ticket.sequence {
            tracing::debug!(
                "Dropping request {} for {}: superseded by {}",
                ticket.sequence,
                ticket.partition,
                state.sequence
            );
            return LoadOutcome::Superseded;
        }

        state
            .cache
            .insert(ticket.partition.clone(), records.clone());
        let rows = state.run_pass(&records, self.inner.resolver.as_ref());
        let count = rows.len();

        self.inner.published.publish(ResultSet {
            sequence: ticket.sequence,
            partition: Some(ticket.partition.clone()),
            rows,
        });
        self.set_status(&mut state, LoadStatus::Ready);

        LoadOutcome::Published {
            sequence: ticket.sequence,
            count,
        }
    }

    fn fail_load(&self, ticket: &LoadTicket, error: FetchError) -> Result<LoadOutcome, QueryError> {
        let mut state = self.inner.state.lock();
        if state.sequence != ticket.sequence {
            tracing::debug!(
                "Dropping failed request {} for {}: superseded",
                ticket.sequence,
                ticket.partition
            );
            return Ok(LoadOutcome::Superseded);
        }

        tracing::warn!("Loading {} failed: {}", ticket.partition, error);
        self.set_status(&mut state, LoadStatus::Failed(error.to_string()));
        Err(QueryError::Fetch(error))
    }

    fn set_status(&self, state: &mut ControllerState, status: LoadStatus) {
        state.status = status.clone();
        self.inner.published.set_status(status);
    }

    /// Drop the cached records of a partition.
    pub fn invalidate(&self, partition: &PartitionId) {
        if self.inner.state.lock().cache.remove(partition).is_some() {
            tracing::debug!("Invalidated cached records for {}", partition);
        }
    }

    // =========================================================================
    // Filter and Sort State
    // =========================================================================

    /// Advance a column through unsorted → ascending → descending.
    pub fn toggle_sort(&self, column: SortColumn) -> Refresh {
        self.mutate(|state| {
            let direction = state.sort.toggle(column);
            tracing::debug!("Sort {} -> {:?}", column, direction);
            true
        })
    }

    pub fn set_search_text(&self, text: Option<String>) -> Refresh {
        self.mutate(|state| replace(&mut state.filter.search_text, text))
    }

    pub fn set_level_expr(&self, expr: Option<String>) -> Refresh {
        self.mutate(|state| replace(&mut state.filter.level_expr, expr))
    }

    pub fn set_wishlist_active(&self, active: bool) -> Refresh {
        self.mutate(|state| replace(&mut state.filter.wishlist_active, active))
    }

    /// Replace the whole filter state.
    pub fn set_filter_spec(&self, spec: FilterSpec) -> Refresh {
        self.mutate(|state| replace(&mut state.filter, spec))
    }

    /// Pick up pattern lists changed elsewhere.
    pub fn apply_settings(&self, settings: &FilterSettings) -> Refresh {
        self.mutate(|state| {
            let mut filter = state.filter.clone();
            filter.apply_settings(settings);
            replace(&mut state.filter, filter)
        })
    }

    /// Run a state change. While idle, a change starts a load of the
    /// current partition; while loading, it waits for the in-flight load.
    fn mutate<F>(&self, change: F) -> Refresh
    where
        F: FnOnce(&mut ControllerState) -> bool,
    {
        let mut state = self.inner.state.lock();
        if !change(&mut state) {
            return Refresh::none();
        }
        if state.status.is_busy() {
            tracing::debug!("Load in flight, change applies when it completes");
            return Refresh::none();
        }
        let Some(partition) = state.partition.clone() else {
            return Refresh::none();
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!("No async runtime, not reloading {}", partition);
                return Refresh::none();
            }
        };

        let ticket = self.begin_load(&mut state, partition, false);
        drop(state);

        let this = self.clone();
        Refresh {
            handle: Some(runtime.spawn(async move { this.run_load(ticket).await })),
        }
    }

    // =========================================================================
    // Selection and Commands
    // =========================================================================

    /// Set the record the commands act on.
    pub fn select(&self, id: Option<RecordId>) {
        self.inner.state.lock().selected = id;
    }

    /// The selected row in the current results.
    pub fn selected(&self) -> Option<Row> {
        let id = self.inner.state.lock().selected?;
        self.results()
            .rows
            .iter()
            .find(|row| row.record.id == id)
            .cloned()
    }

    /// Open the detail view for the selected record.
    ///
    /// Returns `false` when nothing is selected.
    pub fn show_selected(&self) -> Result<bool, QueryError> {
        self.ensure_enabled()?;
        let Some(row) = self.selected() else {
            return Ok(false);
        };
        self.emit(WildlifeEvent::ShowDetail { record: row.record });
        Ok(true)
    }

    /// Hide every creature sharing the selected record's name.
    pub fn exclude_selected(&self) -> Result<Refresh, QueryError> {
        self.ensure_enabled()?;
        let Some(row) = self.selected() else {
            return Ok(Refresh::none());
        };
        self.emit(WildlifeEvent::Exclude {
            name: row.name.clone(),
        });
        let pattern = regex::escape(&row.name);
        Ok(self.mutate(|state| push_unique(&mut state.filter.exclude_patterns, pattern)))
    }

    /// Add the selected record's name to the wishlist.
    pub fn wishlist_selected(&self) -> Result<Refresh, QueryError> {
        self.ensure_enabled()?;
        let Some(row) = self.selected() else {
            return Ok(Refresh::none());
        };
        self.emit(WildlifeEvent::WishList {
            name: row.name.clone(),
        });
        let pattern = regex::escape(&row.name);
        Ok(self.mutate(|state| push_unique(&mut state.filter.wishlist_patterns, pattern)))
    }

    fn ensure_enabled(&self) -> Result<(), QueryError> {
        if self.commands_enabled() {
            Ok(())
        } else {
            Err(QueryError::Busy)
        }
    }

    fn emit(&self, event: WildlifeEvent) {
        if self.inner.events.send(event).is_err() {
            tracing::debug!("No event subscribers");
        }
    }
}

/// Store `value`, reporting whether it differed.
fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

fn push_unique(list: &mut Vec<String>, value: String) -> bool {
    if list.contains(&value) {
        false
    } else {
        list.push(value);
        true
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::MockSource;
    use crate::source::{ClassNameResolver, TableResolver};
    use wildlife_core::SortDirection;

    fn island() -> Vec<Record> {
        vec![
            Record::new(1, "Rex", 10),
            Record::new(2, "Rex", 5),
            Record::new(3, "Trike", 20),
            Record::new(4, "Dodo", 2),
            Record::new(5, "Rex", 30).tamed(),
        ]
    }

    fn controller(source: Arc<MockSource>) -> QueryController {
        QueryController::new(source, Arc::new(ClassNameResolver))
    }

    fn ids(results: &ResultSet) -> Vec<i64> {
        results.rows.iter().map(|r| r.record.id.0).collect()
    }

    #[tokio::test]
    async fn test_end_to_end_filter_and_sort() {
        let source = Arc::new(MockSource::new().with_partition(
            "Island",
            vec![
                Record::new(1, "Rex", 10),
                Record::new(2, "Rex", 5),
                Record::new(3, "Trike", 20),
            ],
        ));
        let controller = controller(source);

        // No partition yet: changes are only recorded
        assert!(!controller.toggle_sort(SortColumn::Level).is_scheduled());
        assert!(!controller.toggle_sort(SortColumn::Level).is_scheduled());
        assert!(!controller.toggle_sort(SortColumn::Class).is_scheduled());
        assert!(!controller
            .set_level_expr(Some(">4".to_string()))
            .is_scheduled());

        let outcome = controller.request_load("Island", false).await.unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Published {
                sequence: 1,
                count: 3
            }
        );
        assert_eq!(ids(&controller.results()), vec![1, 2, 3]);
        assert_eq!(controller.status(), LoadStatus::Ready);
    }

    #[tokio::test]
    async fn test_prefilter_keeps_wild_creatures() {
        let source = Arc::new(MockSource::new().with_partition("Island", island()));
        let controller = controller(source);

        controller.request_load("Island", false).await.unwrap();
        assert_eq!(ids(&controller.results()), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_superseded_request_is_not_published() {
        let source = Arc::new(
            MockSource::new()
                .with_partition("Slow", vec![Record::new(1, "Rex", 1)])
                .with_delay("Slow", Duration::from_millis(50))
                .with_partition("Fast", vec![Record::new(2, "Dodo", 1)]),
        );
        let controller = controller(source);
        let mut rx = controller.subscribe();

        let (slow, fast) = tokio::join!(
            controller.request_load("Slow", false),
            controller.request_load("Fast", false),
        );

        assert_eq!(slow.unwrap(), LoadOutcome::Superseded);
        assert_eq!(
            fast.unwrap(),
            LoadOutcome::Published {
                sequence: 2,
                count: 1
            }
        );

        let results = rx.borrow_and_update().clone();
        assert_eq!(results.sequence, 2);
        assert_eq!(results.partition, Some(PartitionId::from("Fast")));
        assert_eq!(ids(&results), vec![2]);
        assert_eq!(controller.status(), LoadStatus::Ready);
    }

    #[tokio::test]
    async fn test_changes_while_loading_apply_on_completion() {
        let source = Arc::new(
            MockSource::new()
                .with_partition("Island", island())
                .with_delay("Island", Duration::from_millis(50)),
        );
        let controller = controller(source);

        let (outcome, ()) = tokio::join!(controller.request_load("Island", false), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert!(!controller.commands_enabled());

            let sort = controller.toggle_sort(SortColumn::Level);
            let level = controller.set_level_expr(Some("<25".to_string()));
            assert!(!sort.is_scheduled());
            assert!(!level.is_scheduled());
        });

        assert!(matches!(outcome.unwrap(), LoadOutcome::Published { .. }));
        assert_eq!(ids(&controller.results()), vec![4, 2, 1, 3]);
        assert!(controller.commands_enabled());
    }

    #[tokio::test]
    async fn test_change_while_ready_reloads_current_partition() {
        let source = Arc::new(MockSource::new().with_partition("Island", island()));
        let controller = controller(source.clone());
        controller.request_load("Island", false).await.unwrap();

        let refresh = controller.toggle_sort(SortColumn::Level);
        assert!(refresh.is_scheduled());
        assert!(!controller.commands_enabled());
        refresh.wait().await.unwrap().unwrap();

        let refresh = controller.toggle_sort(SortColumn::Level);
        refresh.wait().await.unwrap().unwrap();

        assert_eq!(ids(&controller.results()), vec![3, 1, 2, 4]);
        assert_eq!(
            controller.sort_keys().direction(SortColumn::Level),
            Some(SortDirection::Descending)
        );
        // Reloads reuse the cached fetch
        assert_eq!(source.fetches(), 1);
    }

    #[tokio::test]
    async fn test_change_while_failed_reloads_current_partition() {
        let source = Arc::new(MockSource::new().with_partition("Island", island()));
        let controller = controller(source.clone());

        source.fail_with(FetchError::Source("save busy".to_string()));
        assert!(controller.request_load("Island", false).await.is_err());
        assert!(matches!(controller.status(), LoadStatus::Failed(_)));

        *source.failure.lock() = None;
        let refresh = controller.set_search_text(Some("rex".to_string()));
        assert!(refresh.is_scheduled());
        refresh.wait().await.unwrap().unwrap();

        assert_eq!(controller.status(), LoadStatus::Ready);
        assert_eq!(ids(&controller.results()), vec![1, 2]);
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_dropped_load_leaves_loading() {
        let source = Arc::new(
            MockSource::new()
                .with_partition("Island", island())
                .with_delay("Island", Duration::from_millis(100)),
        );
        let controller = controller(source);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            controller.request_load("Island", false),
        )
        .await;
        assert!(abandoned.is_err());

        assert_eq!(
            controller.status(),
            LoadStatus::Failed(FetchError::Cancelled.to_string())
        );
        assert!(controller.commands_enabled());

        let refresh = controller.toggle_sort(SortColumn::Level);
        assert!(refresh.is_scheduled());
        assert!(matches!(
            refresh.wait().await.unwrap().unwrap(),
            LoadOutcome::Published { count: 4, .. }
        ));
        assert_eq!(controller.status(), LoadStatus::Ready);
    }

    #[tokio::test]
    async fn test_dropped_superseded_load_keeps_newer_status() {
        let source = Arc::new(
            MockSource::new()
                .with_partition("Slow", vec![Record::new(1, "Rex", 1)])
                .with_delay("Slow", Duration::from_millis(100))
                .with_partition("Fast", vec![Record::new(2, "Dodo", 1)]),
        );
        let controller = controller(source);

        let (abandoned, fast) = tokio::join!(
            tokio::time::timeout(
                Duration::from_millis(10),
                controller.request_load("Slow", false)
            ),
            controller.request_load("Fast", false),
        );
        assert!(abandoned.is_err());
        fast.unwrap();

        assert_eq!(controller.status(), LoadStatus::Ready);
        assert_eq!(ids(&controller.results()), vec![2]);
    }

    #[tokio::test]
    async fn test_reload_current_partition() {
        let source = Arc::new(MockSource::new().with_partition("Island", island()));
        let controller = controller(source.clone());

        assert_eq!(controller.reload(false).await, Err(QueryError::NoPartition));
        assert_eq!(controller.status(), LoadStatus::Idle);

        controller.request_load("Island", false).await.unwrap();
        source.set_partition("Island", vec![Record::new(9, "Giga", 150)]);

        controller.reload(false).await.unwrap();
        assert_eq!(controller.results().len(), 4);

        controller.reload(true).await.unwrap();
        assert_eq!(ids(&controller.results()), vec![9]);
        assert_eq!(source.fetches(), 2);
    }

    #[tokio::test]
    async fn test_unchanged_filter_does_not_reload() {
        let source = Arc::new(MockSource::new().with_partition("Island", island()));
        let controller = controller(source);
        controller.request_load("Island", false).await.unwrap();

        let refresh = controller.set_search_text(Some("rex".to_string()));
        refresh.wait().await.unwrap().unwrap();
        assert_eq!(ids(&controller.results()), vec![1, 2]);

        assert!(!controller
            .set_search_text(Some("rex".to_string()))
            .is_scheduled());
        assert!(!controller.set_wishlist_active(false).is_scheduled());
    }

    #[tokio::test]
    async fn test_fetch_cache_and_force_refresh() {
        let source = Arc::new(MockSource::new().with_partition("Island", island()));
        let controller = controller(source.clone());

        controller.request_load("Island", false).await.unwrap();
        controller.request_load("Island", false).await.unwrap();
        assert_eq!(source.fetches(), 1);

        source.set_partition("Island", vec![Record::new(9, "Giga", 150)]);
        controller.request_load("Island", true).await.unwrap();
        assert_eq!(source.fetches(), 2);
        assert_eq!(ids(&controller.results()), vec![9]);

        controller.invalidate(&PartitionId::from("Island"));
        controller.request_load("Island", false).await.unwrap();
        assert_eq!(source.fetches(), 3);
    }

    #[tokio::test]
    async fn test_fetch_failure_sets_failed_status() {
        let source = Arc::new(MockSource::new().with_partition("Island", island()));
        let controller = controller(source.clone());
        let mut status_rx = controller.subscribe_status();

        source.fail_with(FetchError::Io("save file locked".to_string()));
        let result = controller.request_load("Island", false).await;

        assert_eq!(
            result,
            Err(QueryError::Fetch(FetchError::Io(
                "save file locked".to_string()
            )))
        );
        assert_eq!(
            *status_rx.borrow_and_update(),
            LoadStatus::Failed("IO error: save file locked".to_string())
        );
        assert!(controller.commands_enabled());
        assert!(controller.results().is_empty());

        // The session keeps working once the source recovers
        *source.failure.lock() = None;
        controller.request_load("Island", false).await.unwrap();
        assert_eq!(controller.status(), LoadStatus::Ready);
        assert_eq!(controller.results().len(), 4);
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let source = Arc::new(
            MockSource::new()
                .with_partition("Island", island())
                .with_delay("Island", Duration::from_millis(200)),
        );
        let controller = controller(source).with_timeout(Duration::from_millis(10));

        let result = controller.request_load("Island", false).await;
        assert_eq!(
            result,
            Err(QueryError::Fetch(FetchError::Timeout {
                duration: Duration::from_millis(10)
            }))
        );
        assert!(matches!(controller.status(), LoadStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_commands_refused_while_loading() {
        let source = Arc::new(
            MockSource::new()
                .with_partition("Island", island())
                .with_delay("Island", Duration::from_millis(50)),
        );
        let controller = controller(source);
        controller.select(Some(RecordId(1)));

        let (outcome, ()) = tokio::join!(controller.request_load("Island", false), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert_eq!(controller.show_selected(), Err(QueryError::Busy));
            assert!(matches!(
                controller.exclude_selected(),
                Err(QueryError::Busy)
            ));
        });
        outcome.unwrap();

        assert_eq!(controller.show_selected(), Ok(true));
    }

    #[tokio::test]
    async fn test_exclude_selected_emits_event_and_reloads() {
        let resolver = TableResolver::default().with_name("Rex", "Tyrannosaurus");
        let source = Arc::new(MockSource::new().with_partition("Island", island()));
        let controller = QueryController::new(source, Arc::new(resolver));
        let mut events = controller.events();
        controller.request_load("Island", false).await.unwrap();

        controller.select(Some(RecordId(2)));
        assert_eq!(controller.selected().map(|r| r.name), Some("Tyrannosaurus".to_string()));

        let refresh = controller.exclude_selected().unwrap();
        refresh.wait().await.unwrap().unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            WildlifeEvent::Exclude {
                name: "Tyrannosaurus".to_string()
            }
        );
        assert_eq!(ids(&controller.results()), vec![3, 4]);
        assert!(controller.selected().is_none());
    }

    #[tokio::test]
    async fn test_exclude_selected_matches_name_literally() {
        let resolver = TableResolver::default().with_name("Rex", "Rex (Alpha)");
        let source = Arc::new(MockSource::new().with_partition("Island", island()));
        let controller = QueryController::new(source, Arc::new(resolver));
        let mut events = controller.events();
        controller.request_load("Island", false).await.unwrap();

        controller.select(Some(RecordId(1)));
        controller.exclude_selected().unwrap().wait().await.unwrap().unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            WildlifeEvent::Exclude {
                name: "Rex (Alpha)".to_string()
            }
        );
        assert_eq!(
            controller.filter_spec().exclude_patterns,
            vec![r"Rex \(Alpha\)"]
        );
        assert_eq!(ids(&controller.results()), vec![3, 4]);
    }

    #[tokio::test]
    async fn test_wishlist_selected_and_show_detail() {
        let source = Arc::new(MockSource::new().with_partition("Island", island()));
        let controller = controller(source);
        let mut events = controller.events();
        controller.request_load("Island", false).await.unwrap();

        assert_eq!(controller.show_selected(), Ok(false));

        controller.select(Some(RecordId(3)));
        assert_eq!(controller.show_selected(), Ok(true));
        assert_eq!(
            events.try_recv().unwrap(),
            WildlifeEvent::ShowDetail {
                record: Record::new(3, "Trike", 20)
            }
        );

        controller.wishlist_selected().unwrap().wait().await;
        assert_eq!(
            events.try_recv().unwrap(),
            WildlifeEvent::WishList {
                name: "Trike".to_string()
            }
        );

        // Wishlist patterns only narrow once the wishlist is on
        assert_eq!(controller.results().len(), 4);
        controller.set_wishlist_active(true).wait().await;
        assert_eq!(ids(&controller.results()), vec![3]);
    }

    #[tokio::test]
    async fn test_events_reach_every_subscriber() {
        let source = Arc::new(MockSource::new().with_partition("Island", island()));
        let controller = controller(source);
        let mut settings_owner = controller.events();
        let mut detail_view = controller.events();
        controller.request_load("Island", false).await.unwrap();

        controller.select(Some(RecordId(4)));
        assert_eq!(controller.show_selected(), Ok(true));

        let expected = WildlifeEvent::ShowDetail {
            record: Record::new(4, "Dodo", 2),
        };
        assert_eq!(settings_owner.try_recv().unwrap(), expected);
        assert_eq!(detail_view.try_recv().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_settings_changed_externally() {
        let source = Arc::new(MockSource::new().with_partition("Island", island()));
        let controller = controller(source);
        controller.request_load("Island", false).await.unwrap();

        let settings = FilterSettings::from_lines("^rex$\n([", "");
        controller.apply_settings(&settings).wait().await;

        assert_eq!(controller.filter_spec().exclude_patterns, vec!["^rex$", "(["]);
        assert_eq!(ids(&controller.results()), vec![3, 4]);

        // Same settings again: nothing to do
        assert!(!controller.apply_settings(&settings).is_scheduled());
    }

    #[tokio::test]
    async fn test_partitions_cache_independently() {
        let source = Arc::new(
            MockSource::new()
                .with_partition("Island", island())
                .with_partition("Scorched", vec![Record::new(7, "Wyvern", 140)]),
        );
        let controller = controller(source.clone());

        controller.request_load("Island", false).await.unwrap();
        controller.request_load("Scorched", false).await.unwrap();
        assert_eq!(ids(&controller.results()), vec![7]);
        assert_eq!(
            controller.current_partition(),
            Some(PartitionId::from("Scorched"))
        );

        controller.request_load("Island", false).await.unwrap();
        assert_eq!(source.fetches(), 2);
        assert_eq!(controller.results().len(), 4);
    }
}
