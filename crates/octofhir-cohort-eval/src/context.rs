//! Request-scoped query context
//!
//! A [`QueryContext`] lives for one top-level request (a cohort fetch, a report
//! or a correlation). It pins the calendar date used for age filtering and
//! caches concept resolution so each distinct selector is expanded at most
//! once, even when sibling report groups resolve concurrently.

use chrono::{Datelike, NaiveDate, Utc};
use octofhir_cohort_model::{ConceptResolver, ConceptSelector, ConceptSet, ResolutionError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

type CacheSlot = Arc<OnceCell<Arc<ConceptSet>>>;

/// Selector to concept set cache with single-flight resolution
#[derive(Debug, Default)]
pub struct ConceptCache {
    slots: Mutex<HashMap<ConceptSelector, CacheSlot>>,
}

impl ConceptCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve through the cache.
    ///
    /// Concurrent callers for the same selector wait on one resolver call.
    /// Failures are not cached, a later call retries.
    pub async fn resolve(
        &self,
        resolver: &dyn ConceptResolver,
        selector: &ConceptSelector,
    ) -> Result<Arc<ConceptSet>, ResolutionError> {
        let slot = self.slots.lock().entry(selector.clone()).or_default().clone();
        slot.get_or_try_init(|| async {
            log::debug!("Resolving {}", selector);
            resolver.resolve(selector).await.map(Arc::new)
        })
        .await
        .cloned()
    }

    /// Number of selectors resolved so far
    pub fn resolved_count(&self) -> usize {
        self.slots
            .lock()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }
}

/// Shared state for one top-level request
#[derive(Debug)]
pub struct QueryContext {
    concepts: ConceptCache,
    today: NaiveDate,
}

impl Default for QueryContext {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryContext {
    pub fn new() -> Self {
        Self::at(Utc::now().date_naive())
    }

    /// Context with a fixed "today"
    pub fn at(today: NaiveDate) -> Self {
        Self {
            concepts: ConceptCache::new(),
            today,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn current_year(&self) -> i32 {
        self.today.year()
    }

    pub fn concepts(&self) -> &ConceptCache {
        &self.concepts
    }
}
