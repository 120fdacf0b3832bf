//! Input loading for CLI commands
//!
//! Patients come from NDJSON (one patient document per line). The concepts
//! file maps concept expressions to concept id lists and may list stored
//! subsets:
//!
//! ```json
//! {
//!   "expressions": { "<< 38341003": [38341003, 1201005] },
//!   "subsets": [{ "id": "htn", "name": "Hypertension", "expression": "<< 38341003" }]
//! }
//! ```

use anyhow::{Context, Result};
use octofhir_cohort_eval::{CohortExecutor, ExecutorConfig, MatchStrategy};
use octofhir_cohort_model::{
    CohortCriteria, CohortCriteriaDocument, ConceptId, CorrelationRequestDocument, CptCatalog,
    InMemoryPatientStore, Patient, ReportDefinition, ReportDefinitionDocument,
    StatisticalCorrelationRequest, StaticConceptResolver, Subset,
};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Environment fallback for the CPT tables directory
pub const DATA_DIR_ENV: &str = "COHORT_DATA_DIR";

/// Data sources shared by the evaluating commands
#[derive(Debug, Clone)]
pub struct DataSources {
    pub patients: PathBuf,
    pub concepts: PathBuf,
    pub cpt_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub strategy: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConceptsFile {
    expressions: BTreeMap<String, Vec<ConceptId>>,
    subsets: Vec<Subset>,
}

/// Read patients from an NDJSON file, skipping blank lines
pub fn load_patients(path: &Path) -> Result<Vec<Patient>> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open patients file: {}", path.display()))?;
    read_patients(BufReader::new(file))
        .with_context(|| format!("Failed to load patients from {}", path.display()))
}

pub fn read_patients<R: BufRead>(reader: R) -> Result<Vec<Patient>> {
    let mut patients = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", index + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let patient: Patient = serde_json::from_str(&line)
            .with_context(|| format!("Invalid patient document on line {}", index + 1))?;
        patients.push(patient);
    }
    Ok(patients)
}

/// Build a resolver from a concepts file
pub fn load_concepts(path: &Path) -> Result<StaticConceptResolver> {
    let file: ConceptsFile = read_json(path, "concepts")?;
    let resolver = StaticConceptResolver::new();
    for (expression, concepts) in file.expressions {
        resolver.add_expression(expression, concepts);
    }
    for subset in file.subsets {
        resolver.add_subset(subset);
    }
    Ok(resolver)
}

/// Load the CPT tables from the given directory, falling back to
/// `COHORT_DATA_DIR`. No directory at all yields an empty catalog.
pub fn load_cpt_catalog(dir: Option<&Path>) -> Result<CptCatalog> {
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => return Ok(CptCatalog::new()),
        },
    };
    CptCatalog::load_from_dir(&dir)
        .with_context(|| format!("Failed to load CPT tables from {}", dir.display()))
}

/// Executor settings from an optional JSON file and `--strategy` override
pub fn load_config(path: Option<&Path>, strategy: Option<&str>) -> Result<ExecutorConfig> {
    let mut config = match path {
        Some(path) => read_json(path, "config")?,
        None => ExecutorConfig::default(),
    };
    if let Some(name) = strategy {
        let strategy = MatchStrategy::from_name(name)
            .with_context(|| format!("Unknown match strategy '{}', expected exhaustive or greedy", name))?;
        config = config.with_strategy(strategy);
    }
    Ok(config)
}

/// Assemble an executor over the given data sources
pub fn build_executor(sources: &DataSources) -> Result<CohortExecutor> {
    let patients = load_patients(&sources.patients)?;
    log::info!("Loaded {} patients from {}", patients.len(), sources.patients.display());
    let resolver = load_concepts(&sources.concepts)?;
    let catalog = load_cpt_catalog(sources.cpt_dir.as_deref())?;
    if !catalog.is_empty() {
        log::info!(
            "Loaded {} CPT codes, {} mapped concepts",
            catalog.code_count(),
            catalog.mapped_concept_count()
        );
    }
    let config = load_config(sources.config.as_deref(), sources.strategy.as_deref())?;

    Ok(CohortExecutor::new(
        Arc::new(InMemoryPatientStore::from_patients(patients)),
        Arc::new(resolver),
    )
    .with_cpt_catalog(Arc::new(catalog))
    .with_config(config))
}

pub fn load_criteria(path: &Path) -> Result<CohortCriteria> {
    let doc: CohortCriteriaDocument = read_json(path, "criteria")?;
    doc.into_criteria()
        .with_context(|| format!("Invalid criteria in {}", path.display()))
}

pub fn load_report(path: &Path) -> Result<ReportDefinition> {
    let doc: ReportDefinitionDocument = read_json(path, "report definition")?;
    doc.into_definition()
        .with_context(|| format!("Invalid report definition in {}", path.display()))
}

pub fn load_correlation(path: &Path) -> Result<StatisticalCorrelationRequest> {
    let doc: CorrelationRequestDocument = read_json(path, "correlation request")?;
    doc.into_request()
        .with_context(|| format!("Invalid correlation request in {}", path.display()))
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} file: {}", what, path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {} file: {}", what, path.display()))
}
