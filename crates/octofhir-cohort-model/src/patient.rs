//! Patient records and clinical events
//!
//! A patient carries fixed demographics and a deduplicated, date-ordered set of
//! clinical events. Each event is the occurrence of a terminology concept at a
//! point in time.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Terminology concept identifier
pub type ConceptId = u64;

/// Administrative sex of a patient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

impl Sex {
    /// Parse a sex name case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Some(Self::Male),
            "female" | "f" => Some(Self::Female),
            "unknown" | "u" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "MALE",
            Self::Female => "FEMALE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single occurrence of a concept in a patient record.
///
/// Ordering is by date first, then concept id, so a `BTreeSet` of events
/// iterates chronologically and collapses exact duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClinicalEvent {
    pub date: DateTime<Utc>,
    pub concept_id: ConceptId,
}

impl ClinicalEvent {
    pub fn new(date: DateTime<Utc>, concept_id: ConceptId) -> Self {
        Self { date, concept_id }
    }
}

/// Patient record with demographics and clinical history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "PatientDocument")]
pub struct Patient {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    pub birth_date: NaiveDate,
    /// Cached from `birth_date`, age filters only look at the year
    pub birth_year: i32,
    pub sex: Sex,
    pub events: BTreeSet<ClinicalEvent>,
}

impl Patient {
    pub fn new(id: impl Into<String>, birth_date: NaiveDate, sex: Sex) -> Self {
        Self {
            id: id.into(),
            dataset: None,
            birth_date,
            birth_year: birth_date.year(),
            sex,
            events: BTreeSet::new(),
        }
    }

    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    /// Builder form of [`Patient::add_event`]
    pub fn with_event(mut self, date: DateTime<Utc>, concept_id: ConceptId) -> Self {
        self.add_event(ClinicalEvent::new(date, concept_id));
        self
    }

    /// Add an event, returns false if an identical event was already present
    pub fn add_event(&mut self, event: ClinicalEvent) -> bool {
        self.events.insert(event)
    }

    /// Age in whole years as seen from the given calendar year
    pub fn age_in(&self, year: i32) -> i32 {
        year - self.birth_year
    }

    /// Events whose concept satisfies the predicate, in date order
    pub fn events_where<'a, F>(&'a self, mut predicate: F) -> impl Iterator<Item = &'a ClinicalEvent> + 'a
    where
        F: FnMut(ConceptId) -> bool + 'a,
    {
        self.events.iter().filter(move |e| predicate(e.concept_id))
    }
}

/// Serialized patient shape, `birthYear` is derived and never trusted from input
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatientDocument {
    id: String,
    #[serde(default)]
    dataset: Option<String>,
    birth_date: NaiveDate,
    sex: Sex,
    #[serde(default)]
    events: Vec<ClinicalEvent>,
}

impl From<PatientDocument> for Patient {
    fn from(doc: PatientDocument) -> Self {
        let mut patient = Patient::new(doc.id, doc.birth_date, doc.sex);
        patient.dataset = doc.dataset;
        patient.events.extend(doc.events);
        patient
    }
}
