//! Frequency evaluation
//!
//! A frequency asks for at least `min_repetitions` occurrences, optionally
//! with every consecutive gap inside `[min_time_between, max_time_between]`.
//! Gaps are walked from the earliest occurrence and the first gap outside the
//! bounds ends the search.

use chrono::{DateTime, Utc};
use octofhir_cohort_model::Frequency;

/// Check a frequency against occurrence dates (any order)
pub fn frequency_satisfied<I>(frequency: &Frequency, dates: I) -> bool
where
    I: IntoIterator<Item = DateTime<Utc>>,
{
    let mut dates: Vec<_> = dates.into_iter().collect();
    let required = usize::try_from(frequency.min_repetitions.max(1)).unwrap_or(1);
    if dates.len() < required {
        return false;
    }
    if !frequency.has_gap_bounds() {
        return true;
    }
    if required == 1 {
        return true;
    }

    let Some(unit) = frequency.time_unit else {
        // rejected by validation
        return false;
    };
    let min_gap = frequency.min_time_between.map(|v| unit.span_millis(v));
    let max_gap = frequency.max_time_between.map(|v| unit.span_millis(v));

    dates.sort_unstable();
    let mut chained = 1;
    for pair in dates.windows(2) {
        let gap = (pair[1] - pair[0]).num_milliseconds();
        if min_gap.is_some_and(|min| gap < min) || max_gap.is_some_and(|max| gap > max) {
            return false;
        }
        chained += 1;
        if chained >= required {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use octofhir_cohort_model::TimeUnit;
    use rstest::rstest;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    fn yearly() -> Vec<DateTime<Utc>> {
        vec![at(2019, 6, 1), at(2017, 6, 1), at(2018, 6, 1)]
    }

    #[rstest]
    #[case(Frequency::repetitions(3), true)]
    #[case(Frequency::repetitions(4), false)]
    #[case(Frequency::new(2, Some(10), Some(14), Some(TimeUnit::Month)), true)]
    #[case(Frequency::new(3, Some(10), Some(14), Some(TimeUnit::Month)), true)]
    #[case(Frequency::new(2, Some(22), Some(26), Some(TimeUnit::Month)), false)]
    #[case(Frequency::new(2, None, Some(300), Some(TimeUnit::Day)), false)]
    #[case(Frequency::new(2, Some(365), None, Some(TimeUnit::Day)), true)]
    #[case(Frequency::new(2, Some(1), Some(1), Some(TimeUnit::Year)), true)]
    fn test_yearly_occurrences(#[case] frequency: Frequency, #[case] expected: bool) {
        assert_eq!(frequency_satisfied(&frequency, yearly()), expected);
    }

    #[test]
    fn test_first_violation_is_final() {
        // 2015 -> 2017 breaks the 10-14 month gap, later pairs would pass
        let dates = [at(2015, 1, 10), at(2017, 1, 5), at(2018, 1, 10), at(2019, 1, 12)];
        let frequency = Frequency::new(2, Some(10), Some(14), Some(TimeUnit::Month));
        assert!(!frequency_satisfied(&frequency, dates));
    }

    #[test]
    fn test_success_stops_before_later_violation() {
        let dates = [at(2017, 5, 5), at(2018, 4, 10), at(2025, 1, 1)];
        let frequency = Frequency::new(2, Some(10), Some(14), Some(TimeUnit::Month));
        assert!(frequency_satisfied(&frequency, dates));
    }

    #[test]
    fn test_single_repetition_with_bounds() {
        let frequency = Frequency::new(1, Some(10), Some(14), Some(TimeUnit::Month));
        assert!(frequency_satisfied(&frequency, [at(2017, 1, 1)]));
        assert!(!frequency_satisfied(&frequency, Vec::<DateTime<Utc>>::new()));
    }
}
