//! Cohort Selection Tests
//!
//! End-to-end cohort queries over small clinical populations:
//! - Relative windows between chained events
//! - Negated criteria
//! - Frequency patterns on repeated screenings
//! - Absolute date bounds and age filters
//! - Exclusion groups
//! - Subsets and request-scoped resolution

mod common;

use common::*;
use octofhir_cohort::model::{ConceptSelector, Demographics, ExclusionCriteria, Sex};
use octofhir_cohort::{CohortCriteria, EventCriterion, EvalError, Frequency, TimeUnit};
use pretty_assertions::assert_eq;
use rstest::rstest;

async fn ids(executor: &octofhir_cohort::CohortExecutor, criteria: &CohortCriteria) -> Vec<String> {
    let page = executor.fetch_cohort(criteria, None).await.unwrap();
    assert_eq!(page.total, page.patients.len());
    page.patients.into_iter().map(|p| p.id).collect()
}

fn screening() -> EventCriterion {
    EventCriterion::expression(SCREENING_ECL)
}

fn months(min: i32, max: i32) -> Frequency {
    Frequency::new(2, Some(min), Some(max), Some(TimeUnit::Month))
}

// ============================================================================
// Relative windows
// ============================================================================

#[rstest]
#[case(5, &[])]
#[case(9, &[])]
#[case(10, &["bob"])]
#[case(12, &["bob"])]
#[case(-1, &["bob"])]
#[tokio::test]
async fn test_infarction_after_hypertension(#[case] days: i32, #[case] expected: &[&str]) {
    let executor = executor_over(bob_and_dave(), resolver());
    let criteria = CohortCriteria::new()
        .with_event(EventCriterion::expression(HYPERTENSION_ECL))
        .with_event(EventCriterion::expression(MI_ECL).within_days_after(days));
    assert_eq!(ids(&executor, &criteria).await, expected);
}

#[tokio::test]
async fn test_negated_infarction_keeps_dave() {
    let executor = executor_over(bob_and_dave(), resolver());
    let criteria = CohortCriteria::new()
        .with_event(EventCriterion::expression(HYPERTENSION_ECL))
        .with_event(EventCriterion::expression(MI_ECL).within_days_after(12).absent());
    assert_eq!(ids(&executor, &criteria).await, vec!["dave"]);
}

#[tokio::test]
async fn test_negated_window_outside_event_keeps_bob() {
    // Bob's infarction is ten days out, a five day window does not see it
    let executor = executor_over(bob_and_dave(), resolver());
    let criteria = CohortCriteria::new()
        .with_event(EventCriterion::expression(HYPERTENSION_ECL))
        .with_event(EventCriterion::expression(MI_ECL).within_days_after(5).absent());
    assert_eq!(ids(&executor, &criteria).await, vec!["bob", "dave"]);
}

#[tokio::test]
async fn test_window_before_previous_event() {
    let executor = executor_over(bob_and_dave(), resolver());
    let criteria = CohortCriteria::new()
        .with_event(EventCriterion::expression(MI_ECL))
        .with_event(EventCriterion::expression(HYPERTENSION_ECL).within_days_before(10));
    assert_eq!(ids(&executor, &criteria).await, vec!["bob"]);
}

// ============================================================================
// Frequency
// ============================================================================

#[rstest]
#[case(months(10, 14), &["ann", "beth"])]
#[case(months(22, 26), &["cara"])]
#[case(Frequency::repetitions(3), &["ann", "cara"])]
#[case(Frequency::repetitions(1), &["ann", "beth", "cara", "dina"])]
#[case(Frequency::new(1, Some(10), Some(14), Some(TimeUnit::Month)), &["ann", "beth", "cara", "dina"])]
#[case(Frequency::new(3, Some(10), Some(14), Some(TimeUnit::Month)), &["ann"])]
#[tokio::test]
async fn test_screening_frequency(#[case] frequency: Frequency, #[case] expected: &[&str]) {
    let executor = executor_over(screened_women(), resolver());
    let criteria = CohortCriteria::new().with_event(screening().with_frequency(frequency));
    assert_eq!(ids(&executor, &criteria).await, expected);
}

#[tokio::test]
async fn test_mammography_after_regular_screening() {
    // beth's first screening is too early for her mammography, the second one works
    let executor = executor_over(screened_women(), resolver());
    let criteria = CohortCriteria::new()
        .with_event(screening().with_frequency(months(10, 14)))
        .with_event(EventCriterion::expression(MAMMOGRAPHY_ECL).within_days_after(30));
    assert_eq!(ids(&executor, &criteria).await, vec!["beth"]);
}

// ============================================================================
// Absolute dates and demographics
// ============================================================================

#[rstest]
#[case(None, Some(at(2011, 1, 1)), &["ann", "beth", "cara"])]
#[case(Some(at(2012, 1, 1)), None, &["ann", "cara", "dina"])]
#[case(Some(at(2012, 1, 16)), Some(at(2014, 1, 1)), &[])]
#[case(Some(at(2012, 1, 16)), Some(at(2014, 1, 2)), &["cara"])]
#[tokio::test]
async fn test_screening_date_range(
    #[case] min_date: Option<chrono::DateTime<chrono::Utc>>,
    #[case] max_date: Option<chrono::DateTime<chrono::Utc>>,
    #[case] expected: &[&str],
) {
    let executor = executor_over(screened_women(), resolver());
    let mut criterion = screening();
    criterion.min_date = min_date;
    criterion.max_date = max_date;
    let criteria = CohortCriteria::new().with_event(criterion);
    assert_eq!(ids(&executor, &criteria).await, expected);
}

#[rstest]
#[case(Some(70), None, &[])]
#[case(Some(60), Some(65), &["beth"])]
#[case(None, Some(50), &[])]
#[case(None, Some(51), &["dina"])]
#[tokio::test]
async fn test_screening_by_age(
    #[case] min_age: Option<u32>,
    #[case] max_age: Option<u32>,
    #[case] expected: &[&str],
) {
    let executor = executor_over(screened_women(), resolver());
    let mut criteria = CohortCriteria::new().with_event(screening());
    criteria.demographics.min_age_now = min_age;
    criteria.demographics.max_age_now = max_age;
    assert_eq!(ids(&executor, &criteria).await, expected);
}

#[tokio::test]
async fn test_demographics_without_events() {
    let executor = executor_over(screened_women(), resolver());
    let criteria = CohortCriteria::new().with_sex(Sex::Male);
    assert_eq!(ids(&executor, &criteria).await, vec!["eric"]);
}

// ============================================================================
// Exclusions
// ============================================================================

fn cancer_exclusion() -> ExclusionCriteria {
    ExclusionCriteria {
        demographics: Demographics::default(),
        event_criteria: vec![EventCriterion::expression(BREAST_CANCER_ECL)],
    }
}

fn prompt_mammography_exclusion() -> ExclusionCriteria {
    ExclusionCriteria {
        demographics: Demographics::default(),
        event_criteria: vec![
            screening(),
            EventCriterion::expression(MAMMOGRAPHY_ECL).within_days_after(30),
        ],
    }
}

#[tokio::test]
async fn test_exclusions_narrow_cohort() {
    let executor = executor_over(screened_women(), resolver());
    let base = CohortCriteria::new().with_event(screening());
    assert_eq!(ids(&executor, &base).await.len(), 4);

    let without_cancer = base.clone().with_exclusion(cancer_exclusion());
    assert_eq!(ids(&executor, &without_cancer).await, vec!["ann", "beth", "dina"]);

    let both = without_cancer.with_exclusion(prompt_mammography_exclusion());
    assert_eq!(ids(&executor, &both).await, vec!["ann", "dina"]);
}

#[tokio::test]
async fn test_demographic_only_exclusion() {
    let executor = executor_over(screened_women(), resolver());
    let criteria = CohortCriteria::new()
        .with_event(screening())
        .with_exclusion(ExclusionCriteria {
            demographics: Demographics {
                max_age_now: Some(55),
                ..Demographics::default()
            },
            event_criteria: vec![],
        });
    assert_eq!(ids(&executor, &criteria).await, vec!["ann", "beth", "cara"]);
}

// ============================================================================
// Concept resolution
// ============================================================================

#[tokio::test]
async fn test_subset_selector() {
    let executor = executor_over(screened_women(), resolver());
    let criteria = CohortCriteria::new().with_event(
        EventCriterion::subset("breast-screening").with_frequency(Frequency::repetitions(3)),
    );
    // beth reaches three through her mammography
    assert_eq!(ids(&executor, &criteria).await, vec!["ann", "beth", "cara"]);
}

#[tokio::test]
async fn test_shared_selector_resolved_once() {
    let resolver = resolver();
    let executor = executor_over(screened_women(), resolver.clone());
    let criteria = CohortCriteria::new()
        .with_event(screening())
        .with_event(screening().within_days_after(400))
        .with_exclusion(ExclusionCriteria {
            demographics: Demographics::default(),
            event_criteria: vec![screening(), EventCriterion::expression(BREAST_CANCER_ECL)],
        });
    executor.count_cohort(&criteria).await.unwrap();
    assert_eq!(resolver.calls_for(&ConceptSelector::expression(SCREENING_ECL)), 1);
    assert_eq!(resolver.calls().len(), 2);
}

#[tokio::test]
async fn test_unknown_subset_fails_query() {
    let executor = executor_over(screened_women(), resolver());
    let criteria = CohortCriteria::new().with_event(EventCriterion::subset("nope"));
    let err = executor.count_cohort(&criteria).await.unwrap_err();
    assert!(matches!(err, EvalError::Resolution(_)));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_invalid_criteria_rejected_before_resolution() {
    let resolver = resolver();
    let executor = executor_over(screened_women(), resolver.clone());
    let criteria = CohortCriteria::new()
        .with_event(screening().absent().with_frequency(Frequency::repetitions(2)));
    let err = executor.count_cohort(&criteria).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Invalid criteria: EventCriterion[0].frequency can only be used when has=true."
    );
    assert!(resolver.calls().is_empty());
}
