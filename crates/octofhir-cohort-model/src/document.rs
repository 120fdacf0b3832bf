//! Wire documents for criteria and requests
//!
//! Documents mirror the JSON accepted from callers: a criterion names its
//! concepts through two optional fields, and exclusion groups are full criteria
//! documents that may carry further exclusions. Conversion into the typed model
//! rejects both shapes the model cannot represent and validates every
//! criterion on the way.

use crate::criteria::{
    CohortCriteria, ConceptSelector, Demographics, EventCriterion, ExclusionCriteria, Frequency,
};
use crate::definitions::{ReportDefinition, StatisticalCorrelationRequest, SubReportDefinition};
use crate::patient::Sex;
use crate::validation::{exclusion_prefix, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

fn default_has() -> bool {
    true
}

/// Event criterion as received on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCriterionDocument {
    #[serde(default = "default_has")]
    pub has: bool,
    #[serde(default, alias = "conceptECL")]
    pub concept_expression: Option<String>,
    #[serde(default)]
    pub concept_subset_id: Option<String>,
    #[serde(default)]
    pub min_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub max_date: Option<DateTime<Utc>>,
    #[serde(default, alias = "withinDaysBeforePreviouslyMatchedEvent")]
    pub within_days_before: Option<i32>,
    #[serde(default, alias = "withinDaysAfterPreviouslyMatchedEvent")]
    pub within_days_after: Option<i32>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default, alias = "includeCPTAnalysis")]
    pub include_cpt_analysis: bool,
}

impl EventCriterionDocument {
    /// Convert and validate, `label` names the criterion in error messages
    pub fn into_criterion(self, label: &str) -> Result<EventCriterion, ValidationError> {
        let concept = match (non_blank(self.concept_expression), non_blank(self.concept_subset_id)) {
            (Some(expression), None) => ConceptSelector::Expression(expression),
            (None, Some(subset)) => ConceptSelector::Subset(subset),
            _ => {
                return Err(ValidationError::new(format!(
                    "{} must have either conceptExpression or conceptSubsetId.",
                    label
                )));
            }
        };
        let criterion = EventCriterion {
            has: self.has,
            concept,
            min_date: self.min_date,
            max_date: self.max_date,
            within_days_before: self.within_days_before,
            within_days_after: self.within_days_after,
            frequency: self.frequency,
            include_cpt_analysis: self.include_cpt_analysis,
        };
        criterion.validate_as(label)?;
        Ok(criterion)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Cohort criteria as received on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortCriteriaDocument {
    #[serde(default, alias = "gender")]
    pub sex: Option<Sex>,
    #[serde(default)]
    pub min_age_now: Option<u32>,
    #[serde(default)]
    pub max_age_now: Option<u32>,
    #[serde(default)]
    pub event_criteria: Vec<EventCriterionDocument>,
    #[serde(default)]
    pub exclusion_criteria: Vec<CohortCriteriaDocument>,
}

impl CohortCriteriaDocument {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn demographics(&self) -> Demographics {
        Demographics {
            sex: self.sex,
            min_age_now: self.min_age_now,
            max_age_now: self.max_age_now,
        }
    }

    /// Convert into validated typed criteria
    pub fn into_criteria(self) -> Result<CohortCriteria, ValidationError> {
        let demographics = self.demographics();
        let event_criteria = convert_chain("", self.event_criteria)?;

        let mut exclusion_criteria = Vec::with_capacity(self.exclusion_criteria.len());
        for (index, exclusion) in self.exclusion_criteria.into_iter().enumerate() {
            if !exclusion.exclusion_criteria.is_empty() {
                return Err(ValidationError::nested_exclusion());
            }
            exclusion_criteria.push(ExclusionCriteria {
                demographics: exclusion.demographics(),
                event_criteria: convert_chain(&exclusion_prefix(index), exclusion.event_criteria)?,
            });
        }

        Ok(CohortCriteria {
            demographics,
            event_criteria,
            exclusion_criteria,
        })
    }
}

fn convert_chain(
    prefix: &str,
    chain: Vec<EventCriterionDocument>,
) -> Result<Vec<EventCriterion>, ValidationError> {
    chain
        .into_iter()
        .enumerate()
        .map(|(index, doc)| doc.into_criterion(&ValidationError::criterion_label(prefix, index)))
        .collect()
}

/// Report group as received on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubReportDocument {
    pub name: String,
    #[serde(default)]
    pub criteria: Option<CohortCriteriaDocument>,
}

/// Report definition as received on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDefinitionDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub criteria: Option<CohortCriteriaDocument>,
    #[serde(default)]
    pub groups: Vec<Vec<SubReportDocument>>,
}

impl ReportDefinitionDocument {
    pub fn into_definition(self) -> Result<ReportDefinition, ValidationError> {
        let criteria = self
            .criteria
            .map(|c| c.into_criteria().map_err(|e| in_report(&self.name, e)))
            .transpose()?;
        let mut groups = Vec::with_capacity(self.groups.len());
        for level in self.groups {
            let mut converted = Vec::with_capacity(level.len());
            for group in level {
                let criteria = match group.criteria {
                    Some(doc) => doc.into_criteria().map_err(|e| in_report(&group.name, e))?,
                    None => CohortCriteria::default(),
                };
                converted.push(SubReportDefinition::new(group.name, criteria));
            }
            groups.push(converted);
        }
        Ok(ReportDefinition {
            name: self.name,
            criteria,
            groups,
        })
    }
}

fn in_report(name: &str, error: ValidationError) -> ValidationError {
    ValidationError::new(format!("Report '{}': {}", name, error.message))
}

/// Correlation request as received on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationRequestDocument {
    #[serde(default)]
    pub base_criteria: Option<CohortCriteriaDocument>,
    #[serde(default)]
    pub treatment_criterion: Option<EventCriterionDocument>,
    #[serde(default)]
    pub negative_outcome_criterion: Option<EventCriterionDocument>,
}

impl CorrelationRequestDocument {
    pub fn into_request(self) -> Result<StatisticalCorrelationRequest, ValidationError> {
        let base_criteria = self
            .base_criteria
            .map(CohortCriteriaDocument::into_criteria)
            .transpose()?
            .unwrap_or_default();
        let treatment = self
            .treatment_criterion
            .ok_or_else(|| ValidationError::new("treatmentCriterion is required for the statistical test."))?
            .into_criterion("treatmentCriterion")?;
        let negative_outcome = self
            .negative_outcome_criterion
            .ok_or_else(|| {
                ValidationError::new("negativeOutcomeCriterion is required for the statistical test.")
            })?
            .into_criterion("negativeOutcomeCriterion")?;
        Ok(StatisticalCorrelationRequest::new(
            base_criteria,
            treatment,
            negative_outcome,
        ))
    }
}
