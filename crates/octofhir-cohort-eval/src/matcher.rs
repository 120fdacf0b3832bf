//! Temporal chain matching
//!
//! A chain is an ordered list of event criteria evaluated against one
//! patient's history. Each positive criterion that matches sets the base date
//! for the relative windows of the criteria after it. Negative criteria match
//! when no admissible event exists and leave the base date untouched.
//!
//! The exhaustive strategy backtracks over every candidate date. Failed
//! `(criterion, base date)` pairs are remembered, so the search stays
//! polynomial in the number of events.

use crate::config::MatchStrategy;
use crate::frequency::frequency_satisfied;
use chrono::{DateTime, TimeDelta, Utc};
use octofhir_cohort_model::{
    day_window, ClinicalEvent, ConceptSet, EventCriterion, Frequency, Patient,
};
use smallvec::SmallVec;
use std::collections::HashSet;
use std::sync::Arc;

/// Dates matched per criterion, `None` for negative criteria
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainMatch {
    pub dates: SmallVec<[Option<DateTime<Utc>>; 4]>,
}

impl ChainMatch {
    /// Date of the last positive criterion
    pub fn last_date(&self) -> Option<DateTime<Utc>> {
        self.dates.iter().rev().find_map(|d| *d)
    }
}

/// Event criterion with its concept set resolved
#[derive(Debug, Clone)]
pub struct CompiledCriterion {
    pub has: bool,
    pub concepts: Arc<ConceptSet>,
    pub min_date: Option<DateTime<Utc>>,
    pub max_date: Option<DateTime<Utc>>,
    pub within_before: Option<TimeDelta>,
    pub within_after: Option<TimeDelta>,
    pub frequency: Option<Frequency>,
}

impl CompiledCriterion {
    pub fn new(criterion: &EventCriterion, concepts: Arc<ConceptSet>) -> Self {
        Self {
            has: criterion.has,
            concepts,
            min_date: criterion.min_date,
            max_date: criterion.max_date,
            within_before: criterion.within_days_before.map(day_window),
            within_after: criterion.within_days_after.map(day_window),
            frequency: criterion.frequency,
        }
    }

    fn lower_bound(&self, base: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        let relative = base
            .zip(self.within_before)
            .and_then(|(base, before)| base.checked_sub_signed(before));
        match (self.min_date, relative) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    fn below_upper_bound(&self, date: DateTime<Utc>, base: Option<DateTime<Utc>>) -> bool {
        if self.max_date.is_some_and(|max| date >= max) {
            return false;
        }
        let relative = base
            .zip(self.within_after)
            .and_then(|(base, after)| base.checked_add_signed(after));
        relative.is_none_or(|upper| date <= upper)
    }

    /// Dates of admissible events, ascending
    pub fn candidates<'a>(
        &'a self,
        patient: &'a Patient,
        base: Option<DateTime<Utc>>,
    ) -> impl Iterator<Item = DateTime<Utc>> + 'a {
        let events = match self.lower_bound(base) {
            Some(lower) => patient.events.range(ClinicalEvent::new(lower, 0)..),
            None => patient.events.range::<ClinicalEvent, _>(..),
        };
        events
            .take_while(move |e| self.below_upper_bound(e.date, base))
            .filter(move |e| self.concepts.contains(&e.concept_id))
            .map(|e| e.date)
    }

    /// Dates of every event in the concept set, ignoring all windows
    pub fn occurrences<'a>(&'a self, patient: &'a Patient) -> impl Iterator<Item = DateTime<Utc>> + 'a {
        patient
            .events_where(move |concept| self.concepts.contains(&concept))
            .map(|e| e.date)
    }

    fn frequency_holds(&self, patient: &Patient) -> bool {
        self.frequency
            .as_ref()
            .is_none_or(|frequency| frequency_satisfied(frequency, self.occurrences(patient)))
    }
}

/// Ordered chain of compiled criteria
#[derive(Debug, Clone, Default)]
pub struct CompiledChain {
    steps: Vec<CompiledCriterion>,
}

impl FromIterator<CompiledCriterion> for CompiledChain {
    fn from_iter<I: IntoIterator<Item = CompiledCriterion>>(iter: I) -> Self {
        Self {
            steps: iter.into_iter().collect(),
        }
    }
}

impl CompiledChain {
    pub fn new(steps: Vec<CompiledCriterion>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[CompiledCriterion] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn find_match(&self, patient: &Patient, strategy: MatchStrategy) -> Option<ChainMatch> {
        match strategy {
            MatchStrategy::Exhaustive => Search::new(&self.steps, patient).run(),
            MatchStrategy::Greedy => greedy(&self.steps, patient),
        }
    }

    pub fn matches(&self, patient: &Patient, strategy: MatchStrategy) -> bool {
        self.find_match(patient, strategy).is_some()
    }
}

struct Search<'a> {
    steps: &'a [CompiledCriterion],
    patient: &'a Patient,
    dates: SmallVec<[Option<DateTime<Utc>>; 4]>,
    dead_ends: HashSet<(usize, Option<DateTime<Utc>>)>,
    frequency: Vec<Option<bool>>,
}

impl<'a> Search<'a> {
    fn new(steps: &'a [CompiledCriterion], patient: &'a Patient) -> Self {
        Self {
            steps,
            patient,
            dates: SmallVec::new(),
            dead_ends: HashSet::new(),
            frequency: vec![None; steps.len()],
        }
    }

    fn run(mut self) -> Option<ChainMatch> {
        self.step(0, None).then(|| ChainMatch { dates: self.dates })
    }

    // frequency ignores windows, so one evaluation per criterion is enough
    fn frequency_holds(&mut self, index: usize) -> bool {
        let steps = self.steps;
        let patient = self.patient;
        *self.frequency[index].get_or_insert_with(|| steps[index].frequency_holds(patient))
    }

    fn step(&mut self, index: usize, base: Option<DateTime<Utc>>) -> bool {
        let steps = self.steps;
        let patient = self.patient;
        let Some(criterion) = steps.get(index) else {
            return true;
        };
        if self.dead_ends.contains(&(index, base)) {
            return false;
        }

        let found = if !criterion.has {
            criterion.candidates(patient, base).next().is_none() && self.descend(index, base, None)
        } else if !self.frequency_holds(index) {
            false
        } else {
            let mut previous = None;
            let mut found = false;
            for date in criterion.candidates(patient, base) {
                if previous == Some(date) {
                    continue;
                }
                previous = Some(date);
                if self.descend(index, Some(date), Some(date)) {
                    found = true;
                    break;
                }
            }
            found
        };

        if !found {
            self.dead_ends.insert((index, base));
        }
        found
    }

    fn descend(
        &mut self,
        index: usize,
        base: Option<DateTime<Utc>>,
        matched: Option<DateTime<Utc>>,
    ) -> bool {
        self.dates.push(matched);
        if self.step(index + 1, base) {
            return true;
        }
        self.dates.pop();
        false
    }
}

fn greedy(steps: &[CompiledCriterion], patient: &Patient) -> Option<ChainMatch> {
    let mut base = None;
    let mut dates = SmallVec::new();
    for criterion in steps {
        let first = criterion.candidates(patient, base).next();
        match (criterion.has, first) {
            (false, Some(_)) | (true, None) => return None,
            (false, None) => dates.push(None),
            (true, Some(date)) => {
                if !criterion.frequency_holds(patient) {
                    return None;
                }
                base = Some(date);
                dates.push(Some(date));
            }
        }
    }
    Some(ChainMatch { dates })
}
