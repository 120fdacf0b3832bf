//! Cohort matching data model
//!
//! This crate provides:
//! - Patient records and timestamped clinical events
//! - Typed cohort criteria with validation and merge rules
//! - Wire documents for criteria, report definitions and correlation requests
//! - Concept resolver and patient store traits with in-memory implementations
//! - CPT cost catalog loading

pub mod cpt;
pub mod criteria;
pub mod definitions;
pub mod document;
pub mod patient;
pub mod provider;
pub mod resolver;
pub mod store;
pub mod validation;

pub use cpt::*;
pub use criteria::*;
pub use definitions::*;
pub use document::*;
pub use patient::*;
pub use provider::*;
pub use resolver::*;
pub use store::*;
pub use validation::*;
