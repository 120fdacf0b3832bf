//! Report and correlation request definitions

use crate::criteria::{CohortCriteria, EventCriterion};
use serde::{Deserialize, Serialize};

/// Hierarchical report request.
///
/// `groups[0]` holds the sibling groups directly under the root, `groups[1]`
/// the groups placed under each of those, and so on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub criteria: Option<CohortCriteria>,
    #[serde(default)]
    pub groups: Vec<Vec<SubReportDefinition>>,
}

impl ReportDefinition {
    pub fn new(name: impl Into<String>, criteria: Option<CohortCriteria>) -> Self {
        Self {
            name: name.into(),
            criteria,
            groups: Vec::new(),
        }
    }

    /// Append the next level of sibling groups
    pub fn with_level(mut self, level: Vec<SubReportDefinition>) -> Self {
        self.groups.push(level);
        self
    }
}

/// Named group inside a report level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubReportDefinition {
    pub name: String,
    #[serde(default)]
    pub criteria: CohortCriteria,
}

impl SubReportDefinition {
    pub fn new(name: impl Into<String>, criteria: CohortCriteria) -> Self {
        Self {
            name: name.into(),
            criteria,
        }
    }
}

/// Treatment versus negative outcome comparison over a base cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticalCorrelationRequest {
    #[serde(default)]
    pub base_criteria: CohortCriteria,
    pub treatment: EventCriterion,
    pub negative_outcome: EventCriterion,
}

impl StatisticalCorrelationRequest {
    pub fn new(
        base_criteria: CohortCriteria,
        treatment: EventCriterion,
        negative_outcome: EventCriterion,
    ) -> Self {
        Self {
            base_criteria,
            treatment,
            negative_outcome,
        }
    }
}
