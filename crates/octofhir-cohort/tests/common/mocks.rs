//! Mock implementations for testing
//!
//! Provides configurable mock implementations of ConceptResolver and
//! PatientStore that record how they were called.

use async_trait::async_trait;
use octofhir_cohort::model::{
    ConceptId, ConceptResolver, ConceptSelector, ConceptSet, DemographicFilter, Patient,
    PatientStore, ResolutionError, StoreError,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Mock concept resolver with configurable expansions and call log
#[derive(Clone)]
pub struct MockConceptResolver {
    expansions: Arc<RwLock<HashMap<ConceptSelector, ConceptSet>>>,
    calls: Arc<RwLock<Vec<ConceptSelector>>>,
}

impl MockConceptResolver {
    pub fn new() -> Self {
        Self {
            expansions: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Configure an expression expansion
    pub fn set_expression(&self, expression: &str, concepts: &[ConceptId]) {
        self.expansions.write().insert(
            ConceptSelector::expression(expression),
            concepts.iter().copied().collect(),
        );
    }

    /// Configure a subset expansion
    pub fn set_subset(&self, id: &str, concepts: &[ConceptId]) {
        self.expansions
            .write()
            .insert(ConceptSelector::subset(id), concepts.iter().copied().collect());
    }

    /// Every selector resolved so far, in call order
    pub fn calls(&self) -> Vec<ConceptSelector> {
        self.calls.read().clone()
    }

    /// Number of calls for one selector
    pub fn calls_for(&self, selector: &ConceptSelector) -> usize {
        self.calls.read().iter().filter(|s| *s == selector).count()
    }
}

impl Default for MockConceptResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConceptResolver for MockConceptResolver {
    async fn resolve(&self, selector: &ConceptSelector) -> Result<ConceptSet, ResolutionError> {
        self.calls.write().push(selector.clone());
        match self.expansions.read().get(selector) {
            Some(concepts) => Ok(concepts.clone()),
            None => match selector {
                ConceptSelector::Subset(id) => Err(ResolutionError::UnknownSubset(id.clone())),
                ConceptSelector::Expression(expression) => {
                    Err(ResolutionError::rejected(expression.clone(), "not configured"))
                }
            },
        }
    }
}

/// Mock patient store over a fixed patient list
pub struct MockPatientStore {
    patients: Arc<RwLock<Vec<Arc<Patient>>>>,
    scans: Arc<RwLock<usize>>,
}

impl MockPatientStore {
    pub fn new(patients: Vec<Patient>) -> Self {
        let mut patients: Vec<_> = patients.into_iter().map(Arc::new).collect();
        patients.sort_by(|a, b| a.id.cmp(&b.id));
        Self {
            patients: Arc::new(RwLock::new(patients)),
            scans: Arc::new(RwLock::new(0)),
        }
    }

    pub fn scan_count(&self) -> usize {
        *self.scans.read()
    }
}

#[async_trait]
impl PatientStore for MockPatientStore {
    async fn scan(&self, filter: &DemographicFilter) -> Result<Vec<Arc<Patient>>, StoreError> {
        *self.scans.write() += 1;
        Ok(self
            .patients
            .read()
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Arc<Patient>>, StoreError> {
        Ok(self.patients.read().iter().find(|p| p.id == id).cloned())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.patients.read().len())
    }
}
