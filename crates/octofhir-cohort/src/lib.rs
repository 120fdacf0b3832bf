//! Cohort criteria matching for Rust
//!
//! This crate bundles the cohort engine:
//! - Criteria model, validation and wire documents
//! - Temporal event matching with frequency patterns and exclusions
//! - Paginated cohort queries with CPT cost totals
//! - Hierarchical reports and treatment/outcome correlation
//!
//! # Example
//!
//! ```ignore
//! use octofhir_cohort::{CohortCriteria, CohortExecutor, EventCriterion};
//!
//! let criteria = CohortCriteria::new()
//!     .with_event(EventCriterion::expression("<< 38341003"))
//!     .with_event(EventCriterion::expression("<< 22298006").within_days_after(365));
//!
//! let page = executor.fetch_cohort(&criteria, None).await?;
//! ```

// Re-export all public APIs from internal crates
pub use octofhir_cohort_eval as eval;
pub use octofhir_cohort_model as model;

// Convenience re-exports
pub use octofhir_cohort_eval::{
    CohortExecutor, CohortPage, EvalError, EvalResult, ExecutorConfig, MatchStrategy, PageRequest,
    ReportNode, StatisticalCorrelationReport,
};
pub use octofhir_cohort_model::{
    CohortCriteria, ConceptResolver, ConceptSelector, EventCriterion, ExclusionCriteria, Frequency,
    InMemoryPatientStore, Patient, PatientStore, ReportDefinition, Sex, StaticConceptResolver,
    SubReportDefinition, TimeUnit,
};

// CLI module (only available with cli feature)
#[cfg(feature = "cli")]
pub mod cli;
