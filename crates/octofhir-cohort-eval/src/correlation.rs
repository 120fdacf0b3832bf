//! Treatment and negative outcome correlation
//!
//! Four cohorts are counted over the same base criteria: treated with the
//! outcome, treated, untreated with the outcome and untreated. The outcome
//! chance for each arm and the hazard ratio between them follow from those
//! counts.

use crate::context::QueryContext;
use crate::error::EvalResult;
use crate::executor::CohortExecutor;
use octofhir_cohort_model::{CohortCriteria, EventCriterion, StatisticalCorrelationRequest};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::time::Instant;

/// Placeholder for ratios with a zero operand
pub const NOT_APPLICABLE: &str = "-";

/// Counts of the four correlation cohorts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatisticalCorrelationReport {
    pub all_patients_count: usize,
    pub with_treatment_count: usize,
    pub with_treatment_with_negative_outcome_count: usize,
    pub without_treatment_count: usize,
    pub without_treatment_with_negative_outcome_count: usize,
}

impl StatisticalCorrelationReport {
    pub fn cohort_total(&self) -> usize {
        self.with_treatment_count + self.without_treatment_count
    }

    pub fn with_treatment_percentage(&self) -> String {
        percentage(self.with_treatment_count, self.cohort_total())
    }

    pub fn without_treatment_percentage(&self) -> String {
        percentage(self.without_treatment_count, self.cohort_total())
    }

    pub fn with_treatment_chance_of_negative_outcome(&self) -> String {
        percentage(
            self.with_treatment_with_negative_outcome_count,
            self.with_treatment_count,
        )
    }

    pub fn without_treatment_chance_of_negative_outcome(&self) -> String {
        percentage(
            self.without_treatment_with_negative_outcome_count,
            self.without_treatment_count,
        )
    }

    /// `(a/b) / (c/d)` to two decimals
    pub fn treatment_negative_outcome_hazard_ratio(&self) -> String {
        let counts = [
            self.with_treatment_with_negative_outcome_count,
            self.with_treatment_count,
            self.without_treatment_with_negative_outcome_count,
            self.without_treatment_count,
        ];
        if counts.contains(&0) {
            return NOT_APPLICABLE.to_string();
        }
        let [a, b, c, d] = counts.map(decimal);
        (a * d)
            .checked_div(b * c)
            .map(|ratio| round_half_up(ratio, 2))
            .unwrap_or_else(|| NOT_APPLICABLE.to_string())
    }
}

fn decimal(count: usize) -> Decimal {
    Decimal::from(count as u64)
}

fn round_half_up(value: Decimal, places: u32) -> String {
    let rounded = value.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.*}", places as usize, rounded)
}

/// `100 * a / b` to one decimal, `"-"` when either side is zero
pub fn percentage(a: usize, b: usize) -> String {
    if a == 0 || b == 0 {
        return NOT_APPLICABLE.to_string();
    }
    (decimal(a) * Decimal::ONE_HUNDRED)
        .checked_div(decimal(b))
        .map(|value| round_half_up(value, 1))
        .unwrap_or_else(|| NOT_APPLICABLE.to_string())
}

/// Count with `,` thousands separators
pub fn format_count(count: usize) -> String {
    let digits = count.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            formatted.push(',');
        }
        formatted.push(digit);
    }
    formatted
}

impl Serialize for StatisticalCorrelationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("StatisticalCorrelationReport", 18)?;
        state.serialize_field("allPatientsCount", &self.all_patients_count)?;
        state.serialize_field("allPatientsCountFormatted", &format_count(self.all_patients_count))?;
        state.serialize_field("cohortTotal", &self.cohort_total())?;
        state.serialize_field("cohortTotalFormatted", &format_count(self.cohort_total()))?;
        state.serialize_field("withTreatmentCount", &self.with_treatment_count)?;
        state.serialize_field("withTreatmentCountFormatted", &format_count(self.with_treatment_count))?;
        state.serialize_field("withTreatmentPercentage", &self.with_treatment_percentage())?;
        state.serialize_field(
            "withTreatmentWithNegativeOutcomeCount",
            &self.with_treatment_with_negative_outcome_count,
        )?;
        state.serialize_field(
            "withTreatmentWithNegativeOutcomeCountFormatted",
            &format_count(self.with_treatment_with_negative_outcome_count),
        )?;
        state.serialize_field(
            "withTreatmentChanceOfNegativeOutcome",
            &self.with_treatment_chance_of_negative_outcome(),
        )?;
        state.serialize_field("withoutTreatmentCount", &self.without_treatment_count)?;
        state.serialize_field(
            "withoutTreatmentCountFormatted",
            &format_count(self.without_treatment_count),
        )?;
        state.serialize_field("withoutTreatmentPercentage", &self.without_treatment_percentage())?;
        state.serialize_field(
            "withoutTreatmentWithNegativeOutcomeCount",
            &self.without_treatment_with_negative_outcome_count,
        )?;
        state.serialize_field(
            "withoutTreatmentWithNegativeOutcomeCountFormatted",
            &format_count(self.without_treatment_with_negative_outcome_count),
        )?;
        state.serialize_field(
            "withoutTreatmentChanceOfNegativeOutcome",
            &self.without_treatment_chance_of_negative_outcome(),
        )?;
        state.serialize_field(
            "treatmentNegativeOutcomeHazardRatio",
            &self.treatment_negative_outcome_hazard_ratio(),
        )?;
        state.end()
    }
}

impl CohortExecutor {
    /// Count the four correlation cohorts in one request context.
    ///
    /// The untreated arm negates the treatment criterion. A frequency on the
    /// treatment is dropped for that arm, so "untreated" means no treatment
    /// event in the window at all.
    pub async fn run_correlation(
        &self,
        request: &StatisticalCorrelationRequest,
    ) -> EvalResult<StatisticalCorrelationReport> {
        self.config()
            .deadline(async {
                let start = Instant::now();
                let ctx = QueryContext::new();
                let base = CohortCriteria::combine(None, Some(&request.base_criteria));

                let treated = request.treatment.clone().with_has(true);
                let mut untreated = request.treatment.clone().with_has(false);
                untreated.frequency = None;
                let outcome = &request.negative_outcome;

                let extend = |extra: &[&EventCriterion]| {
                    let mut criteria = base.clone();
                    criteria
                        .event_criteria
                        .extend(extra.iter().map(|c| (*c).clone()));
                    criteria
                };
                let treated_with_outcome = extend(&[&treated, outcome]);
                let treated_only = extend(&[&treated]);
                let untreated_with_outcome = extend(&[&untreated, outcome]);
                let untreated_only = extend(&[&untreated]);

                let (stats, a, b, c, d) = futures::try_join!(
                    self.stats(),
                    self.count_cohort_in(&ctx, &treated_with_outcome),
                    self.count_cohort_in(&ctx, &treated_only),
                    self.count_cohort_in(&ctx, &untreated_with_outcome),
                    self.count_cohort_in(&ctx, &untreated_only),
                )?;

                let report = StatisticalCorrelationReport {
                    all_patients_count: stats.patient_count,
                    with_treatment_count: b,
                    with_treatment_with_negative_outcome_count: a,
                    without_treatment_count: d,
                    without_treatment_with_negative_outcome_count: c,
                };
                log::info!("Correlation counts {:?} in {:?}", report, start.elapsed());
                Ok(report)
            })
            .await
    }
}
