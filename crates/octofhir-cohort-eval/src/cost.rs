//! CPT cost aggregation
//!
//! Totals multiply each per-unit field of a billing code by the number of
//! matched events whose concept maps to that code. Counts from every concept
//! mapping to the same code accumulate.

use indexmap::IndexMap;
use octofhir_cohort_model::{ConceptId, ConceptSet, CptCatalog, CptCode, Patient};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Aggregated cost for one billing code
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CptTotals {
    pub cpt_code: String,
    pub count: u64,
    pub work_rvu: Option<f64>,
    pub facility_practice_expense_rvu: Option<f64>,
    pub nonfacility_practice_expense_rvu: Option<f64>,
    pub pli_rvu: Option<f64>,
    pub total_facility_rvu: Option<f64>,
    pub total_medicare_physician_fee_schedule_facility_payment: Option<f64>,
    pub total_nonfacility_rvu: Option<f64>,
    pub total_medicare_physician_fee_schedule_non_facility_payment: Option<f64>,
    #[serde(skip)]
    unit: Arc<CptCode>,
}

impl CptTotals {
    pub fn new(unit: Arc<CptCode>) -> Self {
        Self {
            cpt_code: unit.code.clone(),
            count: 0,
            work_rvu: None,
            facility_practice_expense_rvu: None,
            nonfacility_practice_expense_rvu: None,
            pli_rvu: None,
            total_facility_rvu: None,
            total_medicare_physician_fee_schedule_facility_payment: None,
            total_nonfacility_rvu: None,
            total_medicare_physician_fee_schedule_non_facility_payment: None,
            unit,
        }
    }

    /// Add occurrences and recompute every total
    pub fn add_count(&mut self, count: u64) {
        self.count += count;
        let times = |value: Option<f64>| value.map(|v| v * self.count as f64);
        let unit = &self.unit;
        self.work_rvu = times(unit.work_rvu);
        self.facility_practice_expense_rvu = times(unit.facility_practice_expense_rvu);
        self.nonfacility_practice_expense_rvu = times(unit.nonfacility_practice_expense_rvu);
        self.pli_rvu = times(unit.pli_rvu);
        self.total_facility_rvu = times(unit.total_facility_rvu);
        self.total_medicare_physician_fee_schedule_facility_payment =
            times(unit.total_medicare_physician_fee_schedule_facility_payment);
        self.total_nonfacility_rvu = times(unit.total_nonfacility_rvu);
        self.total_medicare_physician_fee_schedule_non_facility_payment =
            times(unit.total_medicare_physician_fee_schedule_non_facility_payment);
    }
}

/// Count events per concept, restricted to `concepts`
pub fn concept_event_counts<'a, I>(concepts: &ConceptSet, patients: I) -> BTreeMap<ConceptId, u64>
where
    I: IntoIterator<Item = &'a Patient>,
{
    let mut counts = BTreeMap::new();
    for patient in patients {
        for event in patient.events_where(|concept| concepts.contains(&concept)) {
            *counts.entry(event.concept_id).or_insert(0) += 1;
        }
    }
    counts
}

/// Totals per billing code, ordered by code
pub fn cpt_totals(catalog: &CptCatalog, counts: &BTreeMap<ConceptId, u64>) -> IndexMap<String, CptTotals> {
    let mut totals: IndexMap<String, CptTotals> = IndexMap::new();
    for (concept, count) in counts {
        let Some(unit) = catalog.for_concept(*concept) else {
            continue;
        };
        totals
            .entry(unit.code.clone())
            .or_insert_with(|| CptTotals::new(Arc::clone(unit)))
            .add_count(*count);
    }
    totals.sort_keys();
    totals
}
