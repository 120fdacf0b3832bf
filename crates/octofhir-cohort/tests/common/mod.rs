//! Common test utilities for cohort testing
//!
//! This module provides shared testing infrastructure including:
//! - Mock implementations of the concept resolver and patient store
//! - Patient fixtures for the clinical scenarios under test

#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
