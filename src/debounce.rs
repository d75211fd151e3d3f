use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use tracing::debug;

use crate::{error::AppResult, models::SearchHit, tmdb::MovieSource};

#[derive(Clone, Debug, PartialEq)]
pub enum SearchOutcome {
    Results(Vec<SearchHit>),
    /// A newer search started before this one finished; show nothing new.
    Superseded,
}

/// Debounced metadata search for the add-film page.
///
/// Every call takes a new generation. A call only reaches the network if no
/// newer call arrived during the debounce delay, and its response is only
/// returned if no newer call arrived while it was in flight.
pub struct SearchDebouncer {
    source: Arc<dyn MovieSource>,
    delay: Duration,
    generation: AtomicU64,
}

impl SearchDebouncer {
    pub fn new(source: Arc<dyn MovieSource>, delay: Duration) -> Self {
        Self { source, delay, generation: AtomicU64::new(0) }
    }

    pub async fn search(&self, query: &str) -> AppResult<SearchOutcome> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let query = query.trim();
        if query.is_empty() {
            return Ok(SearchOutcome::Results(Vec::new()));
        }

        tokio::time::sleep(self.delay).await;
        if !self.is_current(generation) {
            debug!(generation, query = %query, "search superseded before request");
            return Ok(SearchOutcome::Superseded);
        }

        let hits = self.source.search(query).await?;
        if !self.is_current(generation) {
            debug!(generation, query = %query, "dropping stale search response");
            return Ok(SearchOutcome::Superseded);
        }

        debug!(generation, query = %query, results = hits.len(), "search complete");
        Ok(SearchOutcome::Results(hits))
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}
