//! CPT billing code catalog
//!
//! Two tab-separated tables feed the catalog:
//! - `cpt-codes.txt`: 18 columns, code in column 0, unit RVU and payment
//!   values in columns 10 to 17
//! - `snomed-cpt-map.txt`: 9 columns, concept id in column 1, CPT code in
//!   column 7
//!
//! Both files start with a header row. Rows with the wrong number of columns
//! are skipped.

use crate::patient::ConceptId;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

pub const CPT_CODES_FILE: &str = "cpt-codes.txt";
pub const CONCEPT_MAP_FILE: &str = "snomed-cpt-map.txt";

const CPT_COLUMN_COUNT: usize = 18;
const MAP_COLUMN_COUNT: usize = 9;

static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("valid numeric pattern"));

/// Billing code with per-unit cost fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CptCode {
    pub code: String,
    pub work_rvu: Option<f64>,
    pub facility_practice_expense_rvu: Option<f64>,
    pub nonfacility_practice_expense_rvu: Option<f64>,
    pub pli_rvu: Option<f64>,
    pub total_facility_rvu: Option<f64>,
    pub total_medicare_physician_fee_schedule_facility_payment: Option<f64>,
    pub total_nonfacility_rvu: Option<f64>,
    pub total_medicare_physician_fee_schedule_non_facility_payment: Option<f64>,
}

impl CptCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    fn from_row(values: &[&str]) -> Self {
        let value = |index: usize| values[index].trim().parse::<f64>().ok();
        Self {
            code: values[0].trim().to_string(),
            work_rvu: value(10),
            facility_practice_expense_rvu: value(11),
            nonfacility_practice_expense_rvu: value(12),
            pli_rvu: value(13),
            total_facility_rvu: value(14),
            total_medicare_physician_fee_schedule_facility_payment: value(15),
            total_nonfacility_rvu: value(16),
            total_medicare_physician_fee_schedule_non_facility_payment: value(17),
        }
    }
}

/// CPT table loading error
#[derive(Debug, thiserror::Error)]
pub enum CptLoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No rows found in {0}")]
    Empty(&'static str),

    #[error("Header row of {file} contains {found} columns but expected {expected}")]
    ColumnCount {
        file: &'static str,
        found: usize,
        expected: usize,
    },

    #[error("The first row of {0} should be column headers but numbers were found")]
    NumericHeader(&'static str),
}

/// Concept to billing code lookup
#[derive(Debug, Clone, Default)]
pub struct CptCatalog {
    codes: HashMap<String, Arc<CptCode>>,
    concepts: HashMap<ConceptId, Arc<CptCode>>,
}

impl CptCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_code(&mut self, code: CptCode) {
        self.codes.insert(code.code.clone(), Arc::new(code));
    }

    /// Map a concept to an already known code, returns false for unknown codes
    pub fn map_concept(&mut self, concept_id: ConceptId, code: &str) -> bool {
        match self.codes.get(code) {
            Some(cpt) => {
                self.concepts.insert(concept_id, Arc::clone(cpt));
                true
            }
            None => false,
        }
    }

    pub fn code(&self, code: &str) -> Option<&Arc<CptCode>> {
        self.codes.get(code)
    }

    pub fn for_concept(&self, concept_id: ConceptId) -> Option<&Arc<CptCode>> {
        self.concepts.get(&concept_id)
    }

    pub fn code_count(&self) -> usize {
        self.codes.len()
    }

    pub fn mapped_concept_count(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Replace the code table from a `cpt-codes.txt` stream
    pub fn load_codes<R: BufRead>(&mut self, reader: R) -> Result<usize, CptLoadError> {
        self.codes.clear();
        for_each_row(reader, CPT_CODES_FILE, CPT_COLUMN_COUNT, |values| {
            let code = CptCode::from_row(values);
            self.codes.insert(code.code.clone(), Arc::new(code));
        })?;
        log::info!("Loaded {} CPT codes", self.codes.len());
        Ok(self.codes.len())
    }

    /// Replace the concept map from a `snomed-cpt-map.txt` stream
    pub fn load_concept_map<R: BufRead>(&mut self, reader: R) -> Result<usize, CptLoadError> {
        let mut concepts = HashMap::new();
        for_each_row(reader, CONCEPT_MAP_FILE, MAP_COLUMN_COUNT, |values| {
            let concept = values[1].trim();
            let code = values[7].trim();
            let Ok(concept_id) = concept.parse::<ConceptId>() else {
                log::info!("Skipping map row with non-numeric concept id '{}'", concept);
                return;
            };
            match self.codes.get(code) {
                Some(cpt) => {
                    concepts.insert(concept_id, Arc::clone(cpt));
                }
                None => log::warn!(
                    "CPT code '{}' found in {} but not loaded from {}, entry ignored",
                    code,
                    CONCEPT_MAP_FILE,
                    CPT_CODES_FILE
                ),
            }
        })?;
        self.concepts = concepts;
        log::info!("Loaded {} concept to CPT map entries", self.concepts.len());
        Ok(self.concepts.len())
    }

    /// Load both tables from a data directory.
    ///
    /// A missing directory or code table yields an empty catalog. A code table
    /// without a concept map is loaded but maps nothing.
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Self, CptLoadError> {
        let dir = dir.as_ref();
        let mut catalog = Self::new();
        if !dir.is_dir() {
            log::info!("No directory at {}, no CPT data loaded", dir.display());
            return Ok(catalog);
        }
        let codes_path = dir.join(CPT_CODES_FILE);
        if !codes_path.is_file() {
            log::info!("No CPT code files found to load in {}", dir.display());
            return Ok(catalog);
        }
        log::info!("Loading {}", codes_path.display());
        catalog.load_codes(BufReader::new(File::open(&codes_path)?))?;

        let map_path = dir.join(CONCEPT_MAP_FILE);
        if map_path.is_file() {
            log::info!("Loading {}", map_path.display());
            catalog.load_concept_map(BufReader::new(File::open(&map_path)?))?;
        } else {
            log::warn!(
                "{} was found but {} was not, events will not be mapped to CPT codes",
                CPT_CODES_FILE,
                CONCEPT_MAP_FILE
            );
        }
        Ok(catalog)
    }
}

fn for_each_row<R, F>(
    reader: R,
    file: &'static str,
    columns: usize,
    mut handle: F,
) -> Result<(), CptLoadError>
where
    R: BufRead,
    F: FnMut(&[&str]),
{
    let mut lines = reader.lines();
    let header = lines.next().ok_or(CptLoadError::Empty(file))??;
    let header: Vec<&str> = header.trim_end_matches('\r').split('\t').collect();
    if header.len() != columns {
        return Err(CptLoadError::ColumnCount {
            file,
            found: header.len(),
            expected: columns,
        });
    }
    if NUMERIC.is_match(header[0].trim()) {
        return Err(CptLoadError::NumericHeader(file));
    }

    for (index, line) in lines.enumerate() {
        let line = line?;
        let values: Vec<&str> = line.trim_end_matches('\r').split('\t').collect();
        if values.len() == columns {
            handle(&values);
        } else {
            // header is line 1
            log::info!("Skipping line {} of {}, wrong number of values", index + 2, file);
        }
    }
    Ok(())
}
