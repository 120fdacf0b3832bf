//! CLI functionality for the cohort tool
//!
//! This module contains all CLI-related functionality including:
//! - Input loading (patients, concepts, documents, CPT tables)
//! - Cohort selection
//! - Reports and correlation
//! - Criteria validation
//! - Output formatting

#[cfg(feature = "cli")]
pub mod correlate;
#[cfg(feature = "cli")]
pub mod load;
#[cfg(feature = "cli")]
pub mod output;
#[cfg(feature = "cli")]
pub mod report;
#[cfg(feature = "cli")]
pub mod select;
#[cfg(feature = "cli")]
pub mod validate;
