//! Criteria validation
//!
//! Validation runs before any concept resolution or store access. The first
//! problem found is reported, prefixed with the position of the offending
//! criterion: `EventCriterion[i]` for the main chain and
//! `ExclusionCriteria[j].EventCriterion[i]` inside exclusion group `j`.

use crate::criteria::{CohortCriteria, EventCriterion, UNBOUNDED_DAYS};
use thiserror::Error;

/// Malformed criteria
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Label of the criterion at `index` in the chain named by `prefix`
    pub fn criterion_label(prefix: &str, index: usize) -> String {
        format!("{}EventCriterion[{}]", prefix, index)
    }

    pub fn nested_exclusion() -> Self {
        Self::new(
            "An ExclusionCriteria may not have a further ExclusionCriteria. \
             Nested exclusions are not supported.",
        )
    }
}

/// Prefix used for event criteria inside exclusion group `index`
pub fn exclusion_prefix(index: usize) -> String {
    format!("ExclusionCriteria[{}].", index)
}

impl CohortCriteria {
    /// Check every event criterion of the main chain and all exclusion chains
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_chain("", &self.event_criteria)?;
        for (index, exclusion) in self.exclusion_criteria.iter().enumerate() {
            validate_chain(&exclusion_prefix(index), &exclusion.event_criteria)?;
        }
        Ok(())
    }
}

impl EventCriterion {
    /// Check a single criterion, `label` names it in the error message
    pub fn validate_as(&self, label: &str) -> Result<(), ValidationError> {
        validate_criterion(self).map_err(|detail| ValidationError::new(format!("{}{}", label, detail)))
    }
}

fn validate_chain(prefix: &str, chain: &[EventCriterion]) -> Result<(), ValidationError> {
    for (index, criterion) in chain.iter().enumerate() {
        criterion.validate_as(&ValidationError::criterion_label(prefix, index))?;
    }
    Ok(())
}

fn validate_criterion(criterion: &EventCriterion) -> Result<(), &'static str> {
    if criterion
        .within_days_before
        .is_some_and(|days| days < UNBOUNDED_DAYS)
    {
        return Err(".withinDaysBefore must be -1 or a non-negative number of days.");
    }
    if criterion
        .within_days_after
        .is_some_and(|days| days < UNBOUNDED_DAYS)
    {
        return Err(".withinDaysAfter must be -1 or a non-negative number of days.");
    }

    let Some(frequency) = &criterion.frequency else {
        return Ok(());
    };
    if !criterion.has {
        return Err(".frequency can only be used when has=true.");
    }
    if frequency.min_repetitions < 1 {
        return Err(".frequency.minRepetitions must be a positive integer.");
    }
    if frequency.min_time_between.is_some_and(|v| v < 0) {
        return Err(".frequency.minTimeBetween must be a positive integer.");
    }
    if frequency.max_time_between.is_some_and(|v| v < 0) {
        return Err(".frequency.maxTimeBetween must be a positive integer.");
    }
    if let (Some(min), Some(max)) = (frequency.min_time_between, frequency.max_time_between) {
        if min > max {
            return Err(".frequency.minTimeBetween must be less than maxTimeBetween.");
        }
    }
    if frequency.time_unit.is_none() && frequency.has_gap_bounds() {
        return Err(
            ".frequency.timeUnit is required when minTimeBetween or maxTimeBetween is set.",
        );
    }
    Ok(())
}
