//! Compiled query plans
//!
//! A plan is criteria after validation and concept resolution: demographic
//! filter, compiled main chain, compiled exclusions and the concept set used
//! for cost aggregation. Plans are immutable and shared by scan tasks.

use crate::config::MatchStrategy;
use crate::context::QueryContext;
use crate::error::{EvalError, EvalResult};
use crate::exclusion::{is_excluded, CompiledExclusion};
use crate::matcher::{CompiledChain, CompiledCriterion};
use futures::future::try_join_all;
use octofhir_cohort_model::{
    CohortCriteria, ConceptResolver, ConceptSelector, ConceptSet, DemographicFilter,
    EventCriterion, Patient,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

type Resolved = HashMap<ConceptSelector, Arc<ConceptSet>>;

/// Criteria ready to be evaluated per patient
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub filter: DemographicFilter,
    pub chain: CompiledChain,
    pub exclusions: Vec<CompiledExclusion>,
    /// Union of the concept sets of main-chain criteria flagged for cost analysis
    pub cost_concepts: Option<ConceptSet>,
    pub strategy: MatchStrategy,
}

impl QueryPlan {
    /// Validate criteria and resolve every distinct selector through the context cache
    pub async fn build(
        ctx: &QueryContext,
        resolver: &dyn ConceptResolver,
        criteria: &CohortCriteria,
        strategy: MatchStrategy,
    ) -> EvalResult<Self> {
        criteria.validate()?;

        let selectors: BTreeSet<&ConceptSelector> = criteria
            .event_criteria
            .iter()
            .chain(criteria.exclusion_criteria.iter().flat_map(|e| &e.event_criteria))
            .map(|c| &c.concept)
            .collect();
        let resolved: Resolved = try_join_all(selectors.into_iter().map(|selector| async move {
            let concepts = ctx.concepts().resolve(resolver, selector).await?;
            Ok::<_, EvalError>((selector.clone(), concepts))
        }))
        .await?
        .into_iter()
        .collect();

        let current_year = ctx.current_year();
        let exclusions = criteria
            .exclusion_criteria
            .iter()
            .map(|exclusion| {
                Ok(CompiledExclusion::new(
                    DemographicFilter::from_demographics(&exclusion.demographics, current_year),
                    compile_chain(&exclusion.event_criteria, &resolved)?,
                ))
            })
            .collect::<EvalResult<Vec<_>>>()?;

        let flagged: Vec<_> = criteria
            .event_criteria
            .iter()
            .filter(|c| c.include_cpt_analysis)
            .collect();
        let cost_concepts = if flagged.is_empty() {
            None
        } else {
            let mut union = ConceptSet::new();
            for criterion in flagged {
                union.extend(lookup(&resolved, &criterion.concept)?.iter().copied());
            }
            Some(union)
        };

        Ok(Self {
            filter: DemographicFilter::from_demographics(&criteria.demographics, current_year),
            chain: compile_chain(&criteria.event_criteria, &resolved)?,
            exclusions,
            cost_concepts,
            strategy,
        })
    }

    /// Full per-patient decision: demographics, main chain, then exclusions
    pub fn matches(&self, patient: &Patient) -> bool {
        self.filter.matches(patient)
            && self.chain.matches(patient, self.strategy)
            && !is_excluded(&self.exclusions, patient, self.strategy)
    }
}

fn lookup(resolved: &Resolved, selector: &ConceptSelector) -> EvalResult<Arc<ConceptSet>> {
    resolved
        .get(selector)
        .cloned()
        .ok_or_else(|| EvalError::internal(format!("{} was not resolved", selector)))
}

fn compile_chain(chain: &[EventCriterion], resolved: &Resolved) -> EvalResult<CompiledChain> {
    chain
        .iter()
        .map(|criterion| Ok(CompiledCriterion::new(criterion, lookup(resolved, &criterion.concept)?)))
        .collect()
}
