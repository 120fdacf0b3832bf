//! Cohort evaluation engine
//!
//! This crate provides:
//! - Request-scoped concept resolution cache
//! - Frequency and temporal chain matching over patient event histories
//! - Exclusion evaluation
//! - Cohort query executor with parallel scanning and pagination
//! - CPT cost aggregation
//! - Hierarchical reports and treatment/outcome correlation

pub mod config;
pub mod context;
pub mod correlation;
pub mod cost;
pub mod error;
pub mod exclusion;
pub mod executor;
pub mod frequency;
pub mod matcher;
pub mod plan;
pub mod report;

pub use config::{ExecutorConfig, MatchStrategy};
pub use context::{ConceptCache, QueryContext};
pub use correlation::StatisticalCorrelationReport;
pub use cost::CptTotals;
pub use error::{EvalError, EvalResult};
pub use executor::{CohortExecutor, CohortPage, PageRequest, Stats};
pub use matcher::ChainMatch;
pub use plan::QueryPlan;
pub use report::ReportNode;
