//! In-memory patient store

use crate::patient::{ClinicalEvent, Patient};
use crate::provider::{DemographicFilter, PatientStore, StoreError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Patient store keyed by patient id
#[derive(Debug, Default)]
pub struct InMemoryPatientStore {
    patients: RwLock<BTreeMap<String, Arc<Patient>>>,
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_patients<I>(patients: I) -> Self
    where
        I: IntoIterator<Item = Patient>,
    {
        let store = Self::new();
        for patient in patients {
            store.insert(patient);
        }
        store
    }

    /// Insert or replace a patient
    pub fn insert(&self, patient: Patient) {
        self.patients
            .write()
            .insert(patient.id.clone(), Arc::new(patient));
    }

    /// Append events to an existing patient.
    ///
    /// Unknown patients are logged and skipped so a batch load never fails on
    /// a single dangling reference. Returns whether the patient was found.
    pub fn append_events<I>(&self, id: &str, events: I) -> bool
    where
        I: IntoIterator<Item = ClinicalEvent>,
    {
        let mut patients = self.patients.write();
        let Some(entry) = patients.get_mut(id) else {
            log::warn!("Patient {} not found, skipping event append", id);
            return false;
        };
        let patient = Arc::make_mut(entry);
        for event in events {
            patient.add_event(event);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.patients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.read().is_empty()
    }
}

#[async_trait]
impl PatientStore for InMemoryPatientStore {
    async fn scan(&self, filter: &DemographicFilter) -> Result<Vec<Arc<Patient>>, StoreError> {
        Ok(self
            .patients
            .read()
            .values()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Arc<Patient>>, StoreError> {
        Ok(self.patients.read().get(id).cloned())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.len())
    }
}
