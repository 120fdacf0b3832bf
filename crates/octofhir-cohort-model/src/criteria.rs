//! Typed cohort criteria
//!
//! Criteria are built either programmatically or from the wire documents in
//! [`crate::document`]. A criterion always names exactly one concept selector,
//! and exclusion groups cannot nest further exclusions.

use crate::patient::Sex;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Day-bound value meaning "effectively unbounded"
pub const UNBOUNDED_DAYS: i32 = -1;

/// Window length substituted for [`UNBOUNDED_DAYS`], two hundred years
pub const UNBOUNDED_WINDOW_DAYS: i64 = 365 * 200;

/// How a criterion names its concepts
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConceptSelector {
    /// Terminology expression, e.g. `<<38341003`
    Expression(String),
    /// Identifier of a stored subset definition
    Subset(String),
}

impl ConceptSelector {
    pub fn expression(expression: impl Into<String>) -> Self {
        Self::Expression(expression.into())
    }

    pub fn subset(id: impl Into<String>) -> Self {
        Self::Subset(id.into())
    }
}

impl fmt::Display for ConceptSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression(expr) => write!(f, "expression '{}'", expr),
            Self::Subset(id) => write!(f, "subset '{}'", id),
        }
    }
}

/// Unit for frequency gap bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl TimeUnit {
    /// Length of one unit in milliseconds. Months are 30 days, years 365.
    pub const fn millis(self) -> i64 {
        const SECOND: i64 = 1000;
        const DAY: i64 = SECOND * 60 * 60 * 24;
        match self {
            Self::Second => SECOND,
            Self::Minute => SECOND * 60,
            Self::Hour => SECOND * 60 * 60,
            Self::Day => DAY,
            Self::Week => DAY * 7,
            Self::Month => DAY * 30,
            Self::Year => DAY * 365,
        }
    }

    /// Saturating conversion of `amount` units to milliseconds
    pub fn span_millis(self, amount: i32) -> i64 {
        i64::from(amount).saturating_mul(self.millis())
    }
}

/// Repetition requirement on a positive criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frequency {
    pub min_repetitions: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_time_between: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_time_between: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_unit: Option<TimeUnit>,
}

impl Frequency {
    pub fn new(
        min_repetitions: i32,
        min_time_between: Option<i32>,
        max_time_between: Option<i32>,
        time_unit: Option<TimeUnit>,
    ) -> Self {
        Self {
            min_repetitions,
            min_time_between,
            max_time_between,
            time_unit,
        }
    }

    /// Repetition count only, no gap bounds
    pub fn repetitions(min_repetitions: i32) -> Self {
        Self::new(min_repetitions, None, None, None)
    }

    pub fn has_gap_bounds(&self) -> bool {
        self.min_time_between.is_some() || self.max_time_between.is_some()
    }
}

/// One step of an event chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCriterion {
    /// Positive (must occur) or negative (must not occur)
    pub has: bool,
    pub concept: ConceptSelector,
    /// Inclusive lower bound on the event date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date: Option<DateTime<Utc>>,
    /// Exclusive upper bound on the event date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub within_days_before: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub within_days_after: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub include_cpt_analysis: bool,
}

impl EventCriterion {
    pub fn new(concept: ConceptSelector) -> Self {
        Self {
            has: true,
            concept,
            min_date: None,
            max_date: None,
            within_days_before: None,
            within_days_after: None,
            frequency: None,
            include_cpt_analysis: false,
        }
    }

    pub fn expression(expression: impl Into<String>) -> Self {
        Self::new(ConceptSelector::expression(expression))
    }

    pub fn subset(id: impl Into<String>) -> Self {
        Self::new(ConceptSelector::subset(id))
    }

    pub fn with_has(mut self, has: bool) -> Self {
        self.has = has;
        self
    }

    pub fn absent(self) -> Self {
        self.with_has(false)
    }

    pub fn with_min_date(mut self, date: DateTime<Utc>) -> Self {
        self.min_date = Some(date);
        self
    }

    pub fn with_max_date(mut self, date: DateTime<Utc>) -> Self {
        self.max_date = Some(date);
        self
    }

    pub fn within_days_before(mut self, days: i32) -> Self {
        self.within_days_before = Some(days);
        self
    }

    pub fn within_days_after(mut self, days: i32) -> Self {
        self.within_days_after = Some(days);
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = Some(frequency);
        self
    }

    pub fn with_cpt_analysis(mut self) -> Self {
        self.include_cpt_analysis = true;
        self
    }

    /// True if any absolute or relative date bound is set
    pub fn has_time_constraint(&self) -> bool {
        self.min_date.is_some()
            || self.max_date.is_some()
            || self.within_days_before.is_some()
            || self.within_days_after.is_some()
    }

    pub fn has_frequency(&self) -> bool {
        self.frequency.is_some()
    }
}

/// Convert a relative day bound into a window length
pub fn day_window(days: i32) -> TimeDelta {
    if days == UNBOUNDED_DAYS {
        TimeDelta::days(UNBOUNDED_WINDOW_DAYS)
    } else {
        TimeDelta::days(i64::from(days))
    }
}

/// Sex and age-now constraints shared by criteria and exclusion groups
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_age_now: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_age_now: Option<u32>,
}

impl Demographics {
    pub fn is_empty(&self) -> bool {
        self.sex.is_none() && self.min_age_now.is_none() && self.max_age_now.is_none()
    }

    /// Narrow towards the donor: sex only fills a gap, ages only tighten
    pub fn copy_where_more_specific(&mut self, donor: &Demographics) {
        if self.sex.is_none() {
            self.sex = donor.sex;
        }
        if let Some(min) = donor.min_age_now {
            if self.min_age_now.is_none_or(|current| current < min) {
                self.min_age_now = Some(min);
            }
        }
        if let Some(max) = donor.max_age_now {
            if self.max_age_now.is_none_or(|current| current > max) {
                self.max_age_now = Some(max);
            }
        }
    }
}

/// Group that removes matching patients from a cohort
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExclusionCriteria {
    #[serde(flatten)]
    pub demographics: Demographics,
    #[serde(default)]
    pub event_criteria: Vec<EventCriterion>,
}

/// Full cohort selection criteria
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortCriteria {
    #[serde(flatten)]
    pub demographics: Demographics,
    #[serde(default)]
    pub event_criteria: Vec<EventCriterion>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusion_criteria: Vec<ExclusionCriteria>,
}

impl CohortCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sex(mut self, sex: Sex) -> Self {
        self.demographics.sex = Some(sex);
        self
    }

    pub fn with_min_age_now(mut self, age: u32) -> Self {
        self.demographics.min_age_now = Some(age);
        self
    }

    pub fn with_max_age_now(mut self, age: u32) -> Self {
        self.demographics.max_age_now = Some(age);
        self
    }

    pub fn with_event(mut self, criterion: EventCriterion) -> Self {
        self.event_criteria.push(criterion);
        self
    }

    pub fn with_exclusion(mut self, exclusion: ExclusionCriteria) -> Self {
        self.exclusion_criteria.push(exclusion);
        self
    }

    /// Merge a donor into these criteria.
    ///
    /// Demographics follow [`Demographics::copy_where_more_specific`]. Donor
    /// event criteria and exclusions are appended after ours, never replaced
    /// or de-duplicated.
    pub fn copy_where_more_specific(&mut self, donor: &CohortCriteria) {
        self.demographics.copy_where_more_specific(&donor.demographics);
        self.event_criteria.extend(donor.event_criteria.iter().cloned());
        self.exclusion_criteria
            .extend(donor.exclusion_criteria.iter().cloned());
    }

    /// Union of `first` then `second`, either may be absent
    pub fn combine(first: Option<&CohortCriteria>, second: Option<&CohortCriteria>) -> Self {
        let mut combined = CohortCriteria::new();
        for criteria in [first, second].into_iter().flatten() {
            combined.copy_where_more_specific(criteria);
        }
        combined
    }

    /// Copy with every cost-analysis flag cleared
    pub fn without_cpt_analysis(&self) -> Self {
        let mut copy = self.clone();
        for criterion in &mut copy.event_criteria {
            criterion.include_cpt_analysis = false;
        }
        copy
    }

    pub fn wants_cpt_analysis(&self) -> bool {
        self.event_criteria.iter().any(|c| c.include_cpt_analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_time_unit_millis() {
        assert_eq!(TimeUnit::Day.millis(), 86_400_000);
        assert_eq!(TimeUnit::Month.millis(), 30 * 86_400_000);
        assert_eq!(TimeUnit::Year.millis(), 365 * 86_400_000);
        assert_eq!(TimeUnit::Year.span_millis(i32::MAX), i64::from(i32::MAX) * 365 * 86_400_000);
    }

    #[test]
    fn test_unbounded_day_window() {
        assert_eq!(day_window(-1), TimeDelta::days(73_000));
        assert_eq!(day_window(0), TimeDelta::zero());
        assert_eq!(day_window(30), TimeDelta::days(30));
    }

    #[test]
    fn test_copy_where_more_specific() {
        let mut base = CohortCriteria::new()
            .with_sex(Sex::Female)
            .with_min_age_now(30)
            .with_max_age_now(50)
            .with_event(EventCriterion::expression("<<1"));
        let donor = CohortCriteria::new()
            .with_sex(Sex::Male)
            .with_min_age_now(40)
            .with_max_age_now(60)
            .with_event(EventCriterion::expression("<<2"))
            .with_exclusion(ExclusionCriteria::default());

        base.copy_where_more_specific(&donor);

        assert_eq!(base.demographics.sex, Some(Sex::Female));
        assert_eq!(base.demographics.min_age_now, Some(40));
        assert_eq!(base.demographics.max_age_now, Some(50));
        let concepts: Vec<_> = base.event_criteria.iter().map(|c| c.concept.clone()).collect();
        assert_eq!(
            concepts,
            vec![ConceptSelector::expression("<<1"), ConceptSelector::expression("<<2")]
        );
        assert_eq!(base.exclusion_criteria.len(), 1);
    }

    #[test]
    fn test_demographics_fill_gaps_and_tighten() {
        let mut open = Demographics::default();
        open.copy_where_more_specific(&Demographics {
            sex: Some(Sex::Male),
            min_age_now: Some(20),
            max_age_now: Some(30),
        });
        assert_eq!(open.sex, Some(Sex::Male));
        assert_eq!(open.min_age_now, Some(20));
        assert_eq!(open.max_age_now, Some(30));

        open.copy_where_more_specific(&Demographics {
            sex: None,
            min_age_now: Some(10),
            max_age_now: Some(25),
        });
        assert_eq!(open.min_age_now, Some(20));
        assert_eq!(open.max_age_now, Some(25));
    }

    #[test]
    fn test_combine_handles_missing_sides() {
        let only = CohortCriteria::new().with_event(EventCriterion::expression("<<1"));
        assert_eq!(CohortCriteria::combine(None, Some(&only)), only);
        assert_eq!(CohortCriteria::combine(Some(&only), None), only);
        assert_eq!(CohortCriteria::combine(None, None), CohortCriteria::new());
    }

    #[test]
    fn test_without_cpt_analysis_clears_flags() {
        let criteria = CohortCriteria::new()
            .with_event(EventCriterion::expression("<<1").with_cpt_analysis())
            .with_event(EventCriterion::expression("<<2"));
        assert!(criteria.wants_cpt_analysis());

        let cleared = criteria.without_cpt_analysis();
        assert!(!cleared.wants_cpt_analysis());
        assert!(criteria.wants_cpt_analysis());
    }

    #[test]
    fn test_time_constraint_flags() {
        let plain = EventCriterion::expression("<<1");
        assert!(!plain.has_time_constraint());
        assert!(plain.clone().with_min_date(Utc::now()).has_time_constraint());
        assert!(plain.clone().within_days_after(10).has_time_constraint());
        assert!(plain.clone().within_days_before(-1).has_time_constraint());
        assert!(plain.with_frequency(Frequency::repetitions(2)).has_frequency());
    }
}
