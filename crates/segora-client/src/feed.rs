//! The explore feed: re-runs the listing query whenever the facets change.
//!
//! Facet changes are debounced, and every fetch is tagged with a sequence
//! number. A response is applied only if it is newer than the last one
//! applied, so a slow request can never overwrite the results of a later one.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

use segora_types::filters::ListingFilters;
use segora_types::models::Listing;

use crate::error::ClientError;
use crate::store::ListingStore;

/// Quiet period after the last facet change before a query is sent.
pub const DEBOUNCE: Duration = Duration::from_millis(500);

#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_listings(&self, filters: &ListingFilters) -> Result<Vec<Listing>, ClientError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeedState {
    /// Nothing has loaded yet.
    Loading,
    /// The store holds the results of request `seq`.
    Ready { seq: u64, count: usize },
    /// The first load failed and there is nothing to show.
    Unavailable(String),
}

#[derive(Default)]
struct Applied {
    last_seq: u64,
    loaded: bool,
}

pub struct ListingFeed {
    trigger: mpsc::UnboundedSender<ListingFilters>,
    state: watch::Receiver<FeedState>,
    store: ListingStore,
    task: JoinHandle<()>,
}

impl ListingFeed {
    /// Start the feed. The initial filters are fetched right away; later
    /// changes wait for `debounce` of quiet.
    pub fn spawn(
        source: Arc<dyn ListingSource>,
        store: ListingStore,
        initial: ListingFilters,
        debounce: Duration,
    ) -> Self {
        let (trigger, rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(FeedState::Loading);
        let task = tokio::spawn(run(source, store.clone(), state_tx, rx, initial, debounce));
        Self {
            trigger,
            state,
            store,
            task,
        }
    }

    pub fn set_filters(&self, filters: ListingFilters) {
        if self.trigger.send(filters).is_err() {
            warn!("Listing feed stopped; facet change ignored");
        }
    }

    pub fn state(&self) -> FeedState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedState> {
        self.state.clone()
    }

    pub fn store(&self) -> &ListingStore {
        &self.store
    }
}

impl Drop for ListingFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run(
    source: Arc<dyn ListingSource>,
    store: ListingStore,
    state: watch::Sender<FeedState>,
    mut rx: mpsc::UnboundedReceiver<ListingFilters>,
    initial: ListingFilters,
    debounce: Duration,
) {
    let state = Arc::new(state);
    let applied = Arc::new(Mutex::new(Applied::default()));
    // Dropping the set aborts in-flight fetches, so none outlives the feed.
    let mut fetches = JoinSet::new();
    let mut seq = 1;
    spawn_fetch(&mut fetches, &source, &store, &state, &applied, seq, initial);

    while let Some(mut filters) = rx.recv().await {
        // Keep taking newer facets until the user pauses.
        loop {
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(Some(newer)) => filters = newer,
                Ok(None) | Err(_) => break,
            }
        }
        while fetches.try_join_next().is_some() {}
        seq += 1;
        spawn_fetch(&mut fetches, &source, &store, &state, &applied, seq, filters);
    }
}

fn spawn_fetch(
    fetches: &mut JoinSet<()>,
    source: &Arc<dyn ListingSource>,
    store: &ListingStore,
    state: &Arc<watch::Sender<FeedState>>,
    applied: &Arc<Mutex<Applied>>,
    seq: u64,
    filters: ListingFilters,
) {
    let source = source.clone();
    let store = store.clone();
    let state = state.clone();
    let applied = applied.clone();

    fetches.spawn(async move {
        let result = source.fetch_listings(&filters).await;

        let mut applied = applied.lock().unwrap_or_else(PoisonError::into_inner);
        if seq <= applied.last_seq {
            debug!("Dropping stale listing response {} (have {})", seq, applied.last_seq);
            return;
        }
        applied.last_seq = seq;

        match result {
            Ok(listings) => {
                let count = listings.len();
                store.replace(listings);
                applied.loaded = true;
                state.send_replace(FeedState::Ready { seq, count });
            }
            Err(e) => {
                warn!("Listing query {} failed: {}", seq, e);
                // Keep whatever is already on screen.
                if !applied.loaded {
                    state.send_replace(FeedState::Unavailable(e.to_string()));
                }
            }
        }
    });
}
