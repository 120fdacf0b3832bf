//! Cohort query executor
//!
//! Orchestrates one cohort query: validation and concept resolution (through
//! [`QueryPlan`]), the demographic scan of the store, per-patient matching in
//! parallel chunks, pagination and cost aggregation.

use crate::config::ExecutorConfig;
use crate::context::QueryContext;
use crate::cost::{concept_event_counts, cpt_totals, CptTotals};
use crate::error::{EvalError, EvalResult};
use crate::plan::QueryPlan;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use octofhir_cohort_model::{CohortCriteria, ConceptId, ConceptResolver, CptCatalog, Patient, PatientStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Zero-based page request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub size: usize,
}

impl PageRequest {
    pub fn new(page: usize, size: usize) -> Self {
        Self { page, size }
    }

    pub fn first(size: usize) -> Self {
        Self::new(0, size)
    }

    fn offset(&self) -> usize {
        self.page.saturating_mul(self.size)
    }
}

/// One page of a cohort plus whole-cohort aggregates
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortPage {
    pub patients: Vec<Patient>,
    pub page: usize,
    pub size: usize,
    /// Size of the whole cohort, not of this page
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concept_counts: Option<BTreeMap<ConceptId, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpt_totals: Option<IndexMap<String, CptTotals>>,
}

impl CohortPage {
    pub fn total_pages(&self) -> usize {
        if self.size == 0 {
            0
        } else {
            self.total.div_ceil(self.size)
        }
    }
}

/// Store-wide statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub date: DateTime<Utc>,
    pub patient_count: usize,
}

/// Runs cohort queries against a patient store
#[derive(Clone)]
pub struct CohortExecutor {
    store: Arc<dyn PatientStore>,
    resolver: Arc<dyn ConceptResolver>,
    cpt: Arc<CptCatalog>,
    config: ExecutorConfig,
}

impl CohortExecutor {
    pub fn new(store: Arc<dyn PatientStore>, resolver: Arc<dyn ConceptResolver>) -> Self {
        Self {
            store,
            resolver,
            cpt: Arc::new(CptCatalog::new()),
            config: ExecutorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cpt_catalog(mut self, catalog: Arc<CptCatalog>) -> Self {
        self.cpt = catalog;
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn cpt_catalog(&self) -> &CptCatalog {
        &self.cpt
    }

    /// Fetch one page of a cohort in a fresh request context.
    ///
    /// `None` asks for the first page at the configured default size.
    pub async fn fetch_cohort(
        &self,
        criteria: &CohortCriteria,
        page: Option<PageRequest>,
    ) -> EvalResult<CohortPage> {
        self.config
            .deadline(async {
                let ctx = QueryContext::new();
                self.fetch_cohort_in(&ctx, criteria, page).await
            })
            .await
    }

    /// Count a cohort in a fresh request context
    pub async fn count_cohort(&self, criteria: &CohortCriteria) -> EvalResult<usize> {
        self.config
            .deadline(async {
                let ctx = QueryContext::new();
                self.count_cohort_in(&ctx, criteria).await
            })
            .await
    }

    /// Fetch within an existing request context, sharing its concept cache
    pub async fn fetch_cohort_in(
        &self,
        ctx: &QueryContext,
        criteria: &CohortCriteria,
        page: Option<PageRequest>,
    ) -> EvalResult<CohortPage> {
        let page = page.unwrap_or_else(|| PageRequest::first(self.config.default_page_size));
        let (plan, matched) = self.select(ctx, criteria).await?;

        let (concept_counts, cpt_totals) = match &plan.cost_concepts {
            Some(concepts) => {
                let start = Instant::now();
                let counts = concept_event_counts(concepts, matched.iter().map(|p| p.as_ref()));
                let totals = cpt_totals(&self.cpt, &counts);
                log::debug!(
                    "Aggregated {} concepts into {} CPT codes in {:?}",
                    counts.len(),
                    totals.len(),
                    start.elapsed()
                );
                (Some(counts), Some(totals))
            }
            None => (None, None),
        };

        let total = matched.len();
        let patients = matched
            .iter()
            .skip(page.offset())
            .take(page.size)
            .map(|p| Patient::clone(p))
            .collect();

        Ok(CohortPage {
            patients,
            page: page.page,
            size: page.size,
            total,
            concept_counts,
            cpt_totals,
        })
    }

    /// Count within an existing request context
    pub async fn count_cohort_in(&self, ctx: &QueryContext, criteria: &CohortCriteria) -> EvalResult<usize> {
        let (_, matched) = self.select(ctx, criteria).await?;
        Ok(matched.len())
    }

    pub async fn stats(&self) -> EvalResult<Stats> {
        Ok(Stats {
            date: Utc::now(),
            patient_count: self.store.count().await?,
        })
    }

    /// Matching patients ordered by id
    async fn select(
        &self,
        ctx: &QueryContext,
        criteria: &CohortCriteria,
    ) -> EvalResult<(Arc<QueryPlan>, Vec<Arc<Patient>>)> {
        let start = Instant::now();
        let plan = Arc::new(QueryPlan::build(ctx, self.resolver.as_ref(), criteria, self.config.strategy).await?);
        log::debug!("Validated and resolved criteria in {:?}", start.elapsed());

        let scan_start = Instant::now();
        let candidates = self.store.scan(&plan.filter).await?;
        let candidate_count = candidates.len();
        log::debug!("Store returned {} candidates in {:?}", candidate_count, scan_start.elapsed());

        let match_start = Instant::now();
        let mut matched = self.match_candidates(&plan, candidates).await?;
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        log::debug!("Matched candidates in {:?}", match_start.elapsed());

        log::info!(
            "Cohort query matched {} of {} candidates in {:?}",
            matched.len(),
            candidate_count,
            start.elapsed()
        );
        Ok((plan, matched))
    }

    async fn match_candidates(
        &self,
        plan: &Arc<QueryPlan>,
        candidates: Vec<Arc<Patient>>,
    ) -> EvalResult<Vec<Arc<Patient>>> {
        let chunk_size = self.config.scan_chunk_size.max(1);
        if candidates.len() <= chunk_size {
            return Ok(candidates.into_iter().filter(|p| plan.matches(p)).collect());
        }

        let max_parallel = self.config.max_parallel_chunks.max(1);
        let mut chunks = candidates.chunks(chunk_size).map(<[Arc<Patient>]>::to_vec).enumerate();
        let mut tasks = JoinSet::new();
        let mut results = Vec::new();
        loop {
            while tasks.len() < max_parallel {
                let Some((index, chunk)) = chunks.next() else {
                    break;
                };
                let plan = Arc::clone(plan);
                tasks.spawn_blocking(move || {
                    let matched: Vec<_> = chunk.into_iter().filter(|p| plan.matches(p)).collect();
                    (index, matched)
                });
            }
            match tasks.join_next().await {
                Some(joined) => results.push(
                    joined.map_err(|e| EvalError::internal(format!("Scan task failed: {}", e)))?,
                ),
                None => break,
            }
        }

        results.sort_unstable_by_key(|(index, _)| *index);
        Ok(results.into_iter().flat_map(|(_, matched)| matched).collect())
    }
}
