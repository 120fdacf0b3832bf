//! Exclusion evaluation

use crate::config::MatchStrategy;
use crate::matcher::CompiledChain;
use octofhir_cohort_model::{DemographicFilter, Patient};

/// Exclusion group with its chain compiled
#[derive(Debug, Clone, Default)]
pub struct CompiledExclusion {
    pub filter: DemographicFilter,
    pub chain: CompiledChain,
}

impl CompiledExclusion {
    pub fn new(filter: DemographicFilter, chain: CompiledChain) -> Self {
        Self { filter, chain }
    }

    /// Demographics and the whole chain must match for the patient to be excluded
    pub fn excludes(&self, patient: &Patient, strategy: MatchStrategy) -> bool {
        self.filter.matches(patient) && self.chain.matches(patient, strategy)
    }
}

/// True if any exclusion group fully matches
pub fn is_excluded(exclusions: &[CompiledExclusion], patient: &Patient, strategy: MatchStrategy) -> bool {
    exclusions.iter().any(|e| e.excludes(patient, strategy))
}
