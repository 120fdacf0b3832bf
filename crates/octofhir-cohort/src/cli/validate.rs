//! Validate command implementation

use super::{load, output};
use anyhow::{bail, Result};
use clap::ValueEnum;
use colored::Colorize;
use octofhir_cohort_model::CohortCriteria;
use std::path::{Path, PathBuf};

/// Kind of document being validated
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DocumentKind {
    Criteria,
    Report,
    Correlation,
}

/// Configuration for validate command
pub struct ValidateConfig {
    pub files: Vec<PathBuf>,
    pub kind: DocumentKind,
    pub strict: bool,
}

/// Validation result for a single file
struct ValidationResult {
    file: PathBuf,
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// Validate criteria, report or correlation documents without evaluating them
pub async fn validate(config: ValidateConfig) -> Result<()> {
    if config.files.is_empty() {
        bail!("No files specified for validation");
    }

    let results: Vec<ValidationResult> = config
        .files
        .iter()
        .map(|file| validate_file(file, config.kind))
        .collect();
    for result in &results {
        print_validation_result(result);
    }

    let total_errors: usize = results.iter().map(|r| r.errors.len()).sum();
    let total_warnings: usize = results.iter().map(|r| r.warnings.len()).sum();

    println!();
    if total_errors == 0 && (total_warnings == 0 || !config.strict) {
        println!(
            "{}",
            output::format_success(&format!(
                "All {} file(s) validated successfully",
                config.files.len()
            ))
        );
        return Ok(());
    }

    if config.strict && total_errors == 0 {
        eprintln!("{}", "Strict mode: treating warnings as errors".yellow());
    }
    bail!(
        "Validation failed: {} error(s), {} warning(s)",
        total_errors,
        total_warnings
    )
}

fn validate_file(file: &Path, kind: DocumentKind) -> ValidationResult {
    log::debug!("Validating {}", file.display());
    let mut result = ValidationResult {
        file: file.to_path_buf(),
        errors: Vec::new(),
        warnings: Vec::new(),
    };

    let checked = match kind {
        DocumentKind::Criteria => load::load_criteria(file).and_then(|criteria| {
            criteria.validate()?;
            result.warnings.extend(criteria_warnings("", &criteria));
            Ok(())
        }),
        DocumentKind::Report => load::load_report(file).and_then(|definition| {
            if let Some(criteria) = &definition.criteria {
                criteria.validate()?;
                result.warnings.extend(criteria_warnings("", criteria));
            }
            for group in definition.groups.iter().flatten() {
                group.criteria.validate()?;
                let prefix = format!("{}: ", group.name);
                result.warnings.extend(criteria_warnings(&prefix, &group.criteria));
            }
            Ok(())
        }),
        DocumentKind::Correlation => load::load_correlation(file).and_then(|request| {
            request.base_criteria.validate()?;
            request.treatment.validate_as("treatmentCriterion")?;
            request.negative_outcome.validate_as("negativeOutcomeCriterion")?;
            Ok(())
        }),
    };

    if let Err(e) = checked {
        result.errors.push(format!("{:#}", e));
    }
    result
}

/// Legal but suspicious criteria
fn criteria_warnings(prefix: &str, criteria: &CohortCriteria) -> Vec<String> {
    let mut warnings = Vec::new();
    if criteria.demographics.is_empty()
        && criteria.event_criteria.is_empty()
        && criteria.exclusion_criteria.is_empty()
    {
        warnings.push(format!("{}criteria match every patient", prefix));
    }
    for (index, criterion) in criteria.event_criteria.iter().enumerate() {
        if !criterion.has && criterion.include_cpt_analysis {
            warnings.push(format!(
                "{}EventCriterion[{}] requests CPT analysis on absent events, totals will be empty",
                prefix, index
            ));
        }
    }
    warnings
}

fn print_validation_result(result: &ValidationResult) {
    let status = if result.errors.is_empty() {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("{} {}", status, result.file.display());
    for error in &result.errors {
        println!("  {} {}", "error:".red(), error);
    }
    for warning in &result.warnings {
        println!("  {} {}", "warning:".yellow(), warning);
    }
}
