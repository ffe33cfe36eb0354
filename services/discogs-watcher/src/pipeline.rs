//!
//! src/pipeline.rs  Andrew Belles  Oct 16th, 2026
//!
//! Fan-out/fan-in refresh of every tracked release, the filter and sort
//! applied before display, and the session that owns both
//!

use std::{cmp::Ordering, collections::HashMap, sync::Arc};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use chrono::{DateTime, Local};
use tokio::{sync::Mutex, task::{self, JoinSet}};
use tracing::{debug, info, warn};

use crate::errors::FetchError;
use crate::fetch::SummaryFetcher;
use crate::persistent::IdentifierStore;
use crate::types::{ReleaseSummary, SortDirection, SortKey, SortSpec, ViewFilter};

///
/// One lookup per id, all in flight at once. Any failure fails the whole
/// refresh and no partial rows are returned. Output follows `ids` order
///
pub async fn refresh(
    fetcher: Arc<dyn SummaryFetcher>,
    ids: &[u64]
) -> Result<Vec<ReleaseSummary>, FetchError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut set = JoinSet::new();
    let mut slots_by_task: HashMap<task::Id, (usize, u64)> = HashMap::with_capacity(ids.len());
    for (idx, &id) in ids.iter().enumerate() {
        let fetcher = Arc::clone(&fetcher);
        let handle = set.spawn(async move { fetcher.fetch_summary(id).await });
        slots_by_task.insert(handle.id(), (idx, id));
    }

    let mut slots: Vec<Option<ReleaseSummary>> = vec![None; ids.len()];
    while let Some(joined) = set.join_next_with_id().await {
        let (task_id, result) = match joined {
            Ok((task_id, result)) => (task_id, result),
            Err(e) => {
                let id = slots_by_task.get(&e.id()).map_or(0, |&(_, id)| id);
                (e.id(), Err(FetchError::transport(id, format!("lookup task failed: {e}"))))
            }
        };
        let Some(&(idx, _)) = slots_by_task.get(&task_id) else { continue };
        // returning early drops the set, which aborts the lookups still running
        slots[idx] = Some(result?);
    }

    slots.into_iter()
        .zip(ids)
        .map(|(slot, &id)| slot.ok_or_else(||
            FetchError::transport(id, "lookup did not complete")
        ))
        .collect()
}

fn compare(key: SortKey, a: &ReleaseSummary, b: &ReleaseSummary) -> Ordering {
    match key {
        SortKey::Lowest => {
            let pa = a.lowest_price.as_ref().map(|p| p.amount());
            let pb = b.lowest_price.as_ref().map(|p| p.amount());
            match (pa, pb) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less
            }
        },
        SortKey::ForSale => a.num_for_sale.unwrap_or(0).cmp(&b.num_for_sale.unwrap_or(0)),
        SortKey::Artist  => a.artists.to_lowercase().cmp(&b.artists.to_lowercase()),
        SortKey::Id      => a.id.cmp(&b.id)
    }
}

///
/// Filter then stable sort ascending. Descending reverses the sorted
/// sequence, so tie groups come out reversed as well. Rows without a price
/// stay last in both directions when sorting by price
///
pub fn apply_filter_and_sort(
    rows: &[ReleaseSummary],
    filter: ViewFilter,
    sort: SortSpec
) -> Vec<ReleaseSummary> {
    let kept = rows.iter()
        .filter(|r| !filter.only_in_stock || r.num_for_sale.unwrap_or(0) > 0)
        .cloned();

    let (mut ranked, unpriced): (Vec<_>, Vec<_>) = kept
        .partition(|r| sort.key != SortKey::Lowest || r.lowest_price.is_some());

    ranked.sort_by(|a, b| compare(sort.key, a, b));
    if sort.direction == SortDirection::Desc {
        ranked.reverse();
    }
    ranked.extend(unpriced);
    ranked
}

/// What is currently on screen. Only replaced by a newer refresh
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub rows: Vec<ReleaseSummary>,
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Local>>,
    pub generation: u64
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Applied { generation: u64, rows: usize },
    Failed { generation: u64, error: FetchError },
    Superseded { generation: u64 }
}

/// Generation and id snapshot taken when a refresh begins
#[derive(Debug, Clone)]
pub struct RefreshTicket {
    pub generation: u64,
    pub ids: Vec<u64>
}

///
/// Session container: the single-writer id store, the fetcher, and the
/// displayed view. Refreshes may overlap; each is tagged with a generation
/// and results older than what is displayed are discarded
///
pub struct Watcher {
    store: Mutex<IdentifierStore>,
    fetcher: Arc<dyn SummaryFetcher>,
    generation: AtomicU64,
    view: Mutex<ViewState>
}

impl Watcher {
    pub fn new(store: IdentifierStore, fetcher: Arc<dyn SummaryFetcher>) -> Self {
        Self {
            store: Mutex::new(store),
            fetcher,
            generation: AtomicU64::new(0),
            view: Mutex::new(ViewState::default())
        }
    }

    pub async fn ids(&self) -> Vec<u64> {
        self.store.lock().await.ids().to_vec()
    }

    pub async fn add(&self, id: u64) -> bool {
        let changed = self.store.lock().await.add(id);
        info!(release = id, changed, "watch.add");
        changed
    }

    pub async fn remove(&self, id: u64) -> bool {
        let changed = self.store.lock().await.remove(id);
        info!(release = id, changed, "watch.remove");
        changed
    }

    pub async fn begin_refresh(&self) -> RefreshTicket {
        // generation is taken under the store lock so ids and tag agree
        let store = self.store.lock().await;
        let generation = self.generation.fetch_add(1, AtomicOrdering::SeqCst) + 1;
        RefreshTicket { generation, ids: store.ids().to_vec() }
    }

    pub async fn run_refresh(&self, ticket: RefreshTicket) -> RefreshOutcome {
        let RefreshTicket { generation, ids } = ticket;
        info!(generation, ids = ids.len(), "view.refresh.start");

        let result = refresh(Arc::clone(&self.fetcher), &ids).await;

        let mut view = self.view.lock().await;
        if generation <= view.generation {
            debug!(generation, shown = view.generation, "view.refresh.superseded");
            return RefreshOutcome::Superseded { generation };
        }
        view.generation = generation;

        match result {
            Ok(rows) => {
                let count = rows.len();
                view.rows = rows;
                view.last_error = None;
                view.updated_at = Some(Local::now());
                info!(generation, rows = count, "view.refresh.done");
                RefreshOutcome::Applied { generation, rows: count }
            },
            Err(error) => {
                warn!(generation, release = error.id, error = %error, "view.refresh.failed");
                view.last_error = Some(error.message.clone());
                RefreshOutcome::Failed { generation, error }
            }
        }
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        let ticket = self.begin_refresh().await;
        self.run_refresh(ticket).await
    }

    pub async fn snapshot(&self) -> ViewState {
        self.view.lock().await.clone()
    }

    pub async fn display_rows(&self, filter: ViewFilter, sort: SortSpec) -> Vec<ReleaseSummary> {
        let view = self.view.lock().await;
        apply_filter_and_sort(&view.rows, filter, sort)
    }
}
