//! Hierarchical reports
//!
//! Each report level lists sibling groups. A group's criteria are its
//! ancestors' merged criteria combined with its own, and its children are
//! evaluated against that combination. Siblings run concurrently, children
//! start once their parent's count is known.

use crate::context::QueryContext;
use crate::cost::CptTotals;
use crate::error::{EvalError, EvalResult};
use crate::executor::{CohortExecutor, PageRequest};
use futures::future::{try_join_all, BoxFuture, FutureExt};
use indexmap::IndexMap;
use octofhir_cohort_model::{CohortCriteria, ReportDefinition, SubReportDefinition};
use serde::Serialize;
use std::time::Instant;

/// Named node of a report tree
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportNode {
    pub name: String,
    pub patient_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub criteria: Option<CohortCriteria>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpt_totals: Option<IndexMap<String, CptTotals>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<ReportNode>,
}

impl ReportNode {
    /// Depth-first search by name
    pub fn find(&self, name: &str) -> Option<&ReportNode> {
        if self.name == name {
            return Some(self);
        }
        self.groups.iter().find_map(|group| group.find(name))
    }
}

impl CohortExecutor {
    /// Build a report tree.
    ///
    /// The root count is the cohort size of the top-level criteria, or the
    /// whole store when the definition has none.
    pub async fn run_report(&self, definition: &ReportDefinition) -> EvalResult<ReportNode> {
        self.config()
            .deadline(async {
                let start = Instant::now();
                let ctx = QueryContext::new();
                let patient_count = match &definition.criteria {
                    Some(criteria) => self.count_cohort_in(&ctx, criteria).await?,
                    None => self.stats().await?.patient_count,
                };
                let groups = self
                    .report_level(&ctx, &definition.groups, definition.criteria.as_ref())
                    .await?;
                log::info!(
                    "Report '{}' built in {:?} ({} selectors resolved)",
                    definition.name,
                    start.elapsed(),
                    ctx.concepts().resolved_count()
                );
                Ok(ReportNode {
                    name: definition.name.clone(),
                    patient_count,
                    criteria: definition.criteria.clone(),
                    cpt_totals: None,
                    groups,
                })
            })
            .await
    }

    fn report_level<'a>(
        &'a self,
        ctx: &'a QueryContext,
        levels: &'a [Vec<SubReportDefinition>],
        inherited: Option<&'a CohortCriteria>,
    ) -> BoxFuture<'a, EvalResult<Vec<ReportNode>>> {
        async move {
            let Some((siblings, deeper)) = levels.split_first() else {
                return Ok(Vec::new());
            };
            // cost totals of a group reflect only its own flagged criteria
            let cleared = inherited.map(CohortCriteria::without_cpt_analysis);
            let cleared = cleared.as_ref();

            try_join_all(siblings.iter().map(|group| async move {
                let combined = CohortCriteria::combine(cleared, Some(&group.criteria));
                let page = self
                    .fetch_cohort_in(ctx, &combined, Some(PageRequest::first(0)))
                    .await?;
                let groups = self.report_level(ctx, deeper, Some(&combined)).await?;
                Ok::<_, EvalError>(ReportNode {
                    name: group.name.clone(),
                    patient_count: page.total,
                    criteria: Some(combined),
                    cpt_totals: page.cpt_totals,
                    groups,
                })
            }))
            .await
        }
        .boxed()
    }
}
