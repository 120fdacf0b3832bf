//! Collaborator traits for cohort evaluation
//!
//! The engine never talks to a terminology server or a patient database
//! directly. It goes through [`ConceptResolver`] and [`PatientStore`], which
//! callers implement for their own infrastructure.

use crate::criteria::{ConceptSelector, Demographics};
use crate::patient::{ConceptId, Patient, Sex};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Concrete, ordered set of concept identifiers
pub type ConceptSet = BTreeSet<ConceptId>;

/// Trait for expanding concept selectors into concept sets
#[async_trait]
pub trait ConceptResolver: Send + Sync {
    /// Resolve an expression or subset reference
    async fn resolve(&self, selector: &ConceptSelector) -> Result<ConceptSet, ResolutionError>;
}

/// Concept resolution error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("Unknown subset: {0}")]
    UnknownSubset(String),

    #[error("Expression rejected: {expression}: {message}")]
    Rejected { expression: String, message: String },

    #[error("Terminology service unavailable: {0}")]
    Unavailable(String),
}

impl ResolutionError {
    pub fn rejected(expression: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            expression: expression.into(),
            message: message.into(),
        }
    }
}

/// Sex and birth-year range applied before any event matching
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemographicFilter {
    pub sex: Option<Sex>,
    /// Earliest admissible birth year (from the maximum age)
    pub min_birth_year: Option<i32>,
    /// Latest admissible birth year (from the minimum age)
    pub max_birth_year: Option<i32>,
}

impl DemographicFilter {
    /// Build from age-now constraints, ages are `current_year - birth_year`
    pub fn from_demographics(demographics: &Demographics, current_year: i32) -> Self {
        Self {
            sex: demographics.sex,
            min_birth_year: demographics
                .max_age_now
                .map(|age| current_year.saturating_sub_unsigned(age)),
            max_birth_year: demographics
                .min_age_now
                .map(|age| current_year.saturating_sub_unsigned(age)),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.sex.is_none() && self.min_birth_year.is_none() && self.max_birth_year.is_none()
    }

    pub fn matches(&self, patient: &Patient) -> bool {
        self.sex.is_none_or(|sex| patient.sex == sex)
            && self.min_birth_year.is_none_or(|year| patient.birth_year >= year)
            && self.max_birth_year.is_none_or(|year| patient.birth_year <= year)
    }
}

/// Trait for reading patients from a longitudinal store
#[async_trait]
pub trait PatientStore: Send + Sync {
    /// All patients passing the filter, ordered by patient id
    async fn scan(&self, filter: &DemographicFilter) -> Result<Vec<Arc<Patient>>, StoreError>;

    /// Single patient by id
    async fn get(&self, id: &str) -> Result<Option<Arc<Patient>>, StoreError>;

    /// Total number of stored patients
    async fn count(&self) -> Result<usize, StoreError>;
}

/// Patient store error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Scan failed: {0}")]
    ScanFailed(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
