//! Patient fixtures
//!
//! Small populations built around concrete clinical questions. Ages are
//! relative to the current year so age filters stay stable over time.

use super::mocks::{MockConceptResolver, MockPatientStore};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use octofhir_cohort::model::{CptCatalog, CptCode, Patient, Sex};
use octofhir_cohort::CohortExecutor;
use std::sync::Arc;

pub const HYPERTENSION: u64 = 38341003;
pub const MI: u64 = 22298006;
pub const MI_ANTERIOR: u64 = 54329005;
pub const SCREENING: u64 = 268547008;
pub const MAMMOGRAPHY: u64 = 241055006;
pub const BREAST_CANCER: u64 = 254837009;
pub const ACE_INHIBITOR: u64 = 41549009;

pub const HYPERTENSION_ECL: &str = "<< 38341003";
pub const MI_ECL: &str = "<< 22298006";
pub const SCREENING_ECL: &str = "<< 268547008";
pub const MAMMOGRAPHY_ECL: &str = "<< 241055006";
pub const BREAST_CANCER_ECL: &str = "<< 254837009";
pub const ACE_INHIBITOR_ECL: &str = "<< 41549009";

pub fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

/// Patient born on January 1st, `age` years before the current year
pub fn aged(id: &str, age: i32, sex: Sex) -> Patient {
    let year = Utc::now().year() - age;
    Patient::new(id, NaiveDate::from_ymd_opt(year, 1, 1).unwrap(), sex)
}

pub fn resolver() -> MockConceptResolver {
    let resolver = MockConceptResolver::new();
    resolver.set_expression(HYPERTENSION_ECL, &[HYPERTENSION]);
    resolver.set_expression(MI_ECL, &[MI, MI_ANTERIOR]);
    resolver.set_expression(SCREENING_ECL, &[SCREENING]);
    resolver.set_expression(MAMMOGRAPHY_ECL, &[MAMMOGRAPHY]);
    resolver.set_expression(BREAST_CANCER_ECL, &[BREAST_CANCER]);
    resolver.set_expression(ACE_INHIBITOR_ECL, &[ACE_INHIBITOR]);
    resolver.set_subset("breast-screening", &[SCREENING, MAMMOGRAPHY]);
    resolver
}

pub fn executor_over(patients: Vec<Patient>, resolver: MockConceptResolver) -> CohortExecutor {
    CohortExecutor::new(Arc::new(MockPatientStore::new(patients)), Arc::new(resolver))
}

// ============================================================================
// Hypertension followed by infarction
// ============================================================================

/// Bob has an anterior infarction ten days after his hypertension diagnosis,
/// Dave has hypertension only.
pub fn bob_and_dave() -> Vec<Patient> {
    vec![
        aged("bob", 45, Sex::Male)
            .with_event(at(2017, 1, 10), HYPERTENSION)
            .with_event(at(2017, 1, 20), MI_ANTERIOR),
        aged("dave", 52, Sex::Male).with_event(at(2017, 3, 2), HYPERTENSION),
    ]
}

// ============================================================================
// Breast cancer screening
// ============================================================================

/// Four women screened at different intervals.
///
/// - ann (66): yearly, three screenings
/// - beth (61): two screenings eleven months apart, mammography nine days after the second
/// - cara (56): every two years, three screenings, breast cancer diagnosis in 2013
/// - dina (51): a single screening
pub fn screened_women() -> Vec<Patient> {
    vec![
        aged("ann", 66, Sex::Female)
            .with_event(at(2010, 1, 15), SCREENING)
            .with_event(at(2011, 1, 15), SCREENING)
            .with_event(at(2012, 1, 15), SCREENING),
        aged("beth", 61, Sex::Female)
            .with_event(at(2010, 3, 1), SCREENING)
            .with_event(at(2011, 2, 1), SCREENING)
            .with_event(at(2011, 2, 10), MAMMOGRAPHY),
        aged("cara", 56, Sex::Female)
            .with_event(at(2010, 1, 1), SCREENING)
            .with_event(at(2012, 1, 1), SCREENING)
            .with_event(at(2013, 5, 1), BREAST_CANCER)
            .with_event(at(2014, 1, 1), SCREENING),
        aged("dina", 51, Sex::Female).with_event(at(2015, 6, 1), SCREENING),
        aged("eric", 60, Sex::Male).with_event(at(2014, 4, 4), HYPERTENSION),
    ]
}

/// Screening and mammography billing codes
pub fn screening_cpt_catalog() -> CptCatalog {
    let mut catalog = CptCatalog::new();
    catalog.insert_code(CptCode {
        work_rvu: Some(0.76),
        total_medicare_physician_fee_schedule_facility_payment: Some(38.5),
        total_medicare_physician_fee_schedule_non_facility_payment: Some(141.25),
        ..CptCode::new("77067")
    });
    catalog.insert_code(CptCode {
        work_rvu: Some(0.87),
        ..CptCode::new("77065")
    });
    catalog.map_concept(SCREENING, "77067");
    catalog.map_concept(MAMMOGRAPHY, "77065");
    catalog
}

// ============================================================================
// Treatment and outcome
// ============================================================================

/// Twelve patients: five hypertensive patients on ACE inhibitors (two later
/// infarct), six untreated hypertensive patients (four infarct) and one
/// patient without hypertension.
pub fn treatment_population() -> Vec<Patient> {
    let mut patients = Vec::new();
    for i in 1..=5 {
        let patient = aged(&format!("t{}", i), 50 + i, Sex::Male)
            .with_event(at(2015, 1, 1), HYPERTENSION)
            .with_event(at(2015, 2, 1), ACE_INHIBITOR);
        patients.push(if i <= 2 {
            patient.with_event(at(2016, 1, 1), MI)
        } else {
            patient
        });
    }
    for i in 1..=6 {
        let patient = aged(&format!("u{}", i), 50 + i, Sex::Female).with_event(at(2015, 1, 1), HYPERTENSION);
        patients.push(if i <= 4 {
            patient.with_event(at(2016, 1, 1), MI)
        } else {
            patient
        });
    }
    patients.push(aged("x1", 40, Sex::Male).with_event(at(2016, 1, 1), MI));
    patients
}
