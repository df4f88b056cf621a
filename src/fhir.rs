//! FHIR
//!
//! Converts FHIR `Bundle` documents holding one `Patient`, its `Encounter`s and its lab and vital
//! `Observation`s into raw feature rows.
use crate::constants::{
    AGE, AVG_LOS, CREATININE, FHIR_REFERENCE_YEAR, GENDER, HEART_RATE, NUM_ENCOUNTERS, PATIENT_ID, READMITTED_30D,
    SYSTOLIC_BP,
};
use crate::data::{Column, FeatureTable};
use crate::errors::ReadmitError;
use chrono::{NaiveDate, NaiveDateTime};
use log::{debug, info};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct Bundle {
    #[serde(default)]
    pub readmission_label: Option<bool>,
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    pub resource: Resource,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resourceType")]
pub enum Resource {
    Patient(Patient),
    Encounter(Encounter),
    Observation(Observation),
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct Patient {
    pub id: String,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(rename = "birthDate")]
    pub birth_date: String,
}

#[derive(Debug, Deserialize)]
pub struct Period {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Deserialize)]
pub struct Encounter {
    pub period: Period,
}

#[derive(Debug, Deserialize)]
pub struct CodeText {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct Quantity {
    pub value: f64,
}

#[derive(Debug, Deserialize)]
pub struct Observation {
    pub code: CodeText,
    #[serde(rename = "valueQuantity")]
    pub value_quantity: Quantity,
}

/// One patient's raw feature values extracted from a bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct PatientRecord {
    pub patient_id: String,
    pub age: f64,
    pub gender: f64,
    pub num_encounters: f64,
    pub avg_los: f64,
    /// `NaN` when the bundle has no such observation.
    pub creatinine: f64,
    pub heart_rate: f64,
    pub systolic_bp: f64,
    pub readmitted_30d: Option<bool>,
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, ReadmitError> {
    if let Ok(ts) = s.parse::<NaiveDateTime>() {
        return Ok(ts);
    }
    s.parse::<NaiveDate>()
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ReadmitError::InvalidBundle(format!("bad timestamp {}", s)))
}

fn birth_year(birth_date: &str) -> Result<i32, ReadmitError> {
    birth_date
        .split('-')
        .next()
        .and_then(|y| y.parse::<i32>().ok())
        .ok_or_else(|| ReadmitError::InvalidBundle(format!("bad birthDate {}", birth_date)))
}

impl Bundle {
    pub fn from_json(json_str: &str) -> Result<Self, ReadmitError> {
        serde_json::from_str(json_str).map_err(|e| ReadmitError::InvalidBundle(e.to_string()))
    }

    /// Flatten the bundle into a single patient record.
    ///
    /// Age is measured against 2024. Length of stay is counted in whole days. When an
    /// observation code repeats, the last value wins.
    pub fn to_record(&self) -> Result<PatientRecord, ReadmitError> {
        let mut patient = None;
        let mut stays = Vec::new();
        let (mut creatinine, mut heart_rate, mut systolic_bp) = (f64::NAN, f64::NAN, f64::NAN);

        for entry in &self.entry {
            match &entry.resource {
                Resource::Patient(p) => patient = Some(p),
                Resource::Encounter(e) => {
                    let start = parse_timestamp(&e.period.start)?;
                    let end = parse_timestamp(&e.period.end)?;
                    stays.push((end - start).num_days() as f64);
                }
                Resource::Observation(o) => match o.code.text.as_str() {
                    CREATININE => creatinine = o.value_quantity.value,
                    HEART_RATE => heart_rate = o.value_quantity.value,
                    SYSTOLIC_BP => systolic_bp = o.value_quantity.value,
                    other => debug!("Ignoring observation {}.", other),
                },
                Resource::Other => (),
            }
        }

        let patient = patient.ok_or_else(|| ReadmitError::InvalidBundle("no Patient resource".to_string()))?;
        if stays.is_empty() {
            return Err(ReadmitError::InvalidBundle(format!(
                "patient {} has no Encounter resources",
                patient.id
            )));
        }
        let age = FHIR_REFERENCE_YEAR - birth_year(&patient.birth_date)?;
        Ok(PatientRecord {
            patient_id: patient.id.clone(),
            age: f64::from(age),
            gender: if patient.gender.as_deref() == Some("male") { 1.0 } else { 0.0 },
            num_encounters: stays.len() as f64,
            avg_los: stays.iter().sum::<f64>() / stays.len() as f64,
            creatinine,
            heart_rate,
            systolic_bp,
            readmitted_30d: self.readmission_label,
        })
    }
}

/// Build a raw feature table from patient records.
///
/// The `readmitted_30d` column is added when any record carries a label, unlabeled rows are
/// missing values.
pub fn records_to_table(records: &[PatientRecord]) -> Result<FeatureTable, ReadmitError> {
    let num = |f: fn(&PatientRecord) -> f64| Column::Numeric(records.iter().map(f).collect());
    let mut table = FeatureTable::from_columns(vec![
        (
            PATIENT_ID,
            Column::Text(records.iter().map(|r| Some(r.patient_id.clone())).collect()),
        ),
        (AGE, num(|r| r.age)),
        (GENDER, num(|r| r.gender)),
        (NUM_ENCOUNTERS, num(|r| r.num_encounters)),
        (AVG_LOS, num(|r| r.avg_los)),
        (CREATININE, num(|r| r.creatinine)),
        (HEART_RATE, num(|r| r.heart_rate)),
        (SYSTOLIC_BP, num(|r| r.systolic_bp)),
    ])?;
    if records.iter().any(|r| r.readmitted_30d.is_some()) {
        table.push_column(
            READMITTED_30D,
            num(|r| match r.readmitted_30d {
                Some(true) => 1.0,
                Some(false) => 0.0,
                None => f64::NAN,
            }),
        )?;
    }
    Ok(table)
}

/// Read every `*.json` bundle in a directory, in file name order, into a raw feature table.
pub fn load_bundles<P: AsRef<Path>>(dir: P) -> Result<FeatureTable, ReadmitError> {
    let read_dir = fs::read_dir(dir.as_ref())
        .map_err(|e| ReadmitError::UnableToRead(format!("{}: {}", dir.as_ref().display(), e)))?;
    let mut paths: Vec<PathBuf> = read_dir
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().map(|x| x == "json").unwrap_or(false))
        .collect();
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in &paths {
        let json_str =
            fs::read_to_string(path).map_err(|e| ReadmitError::UnableToRead(format!("{}: {}", path.display(), e)))?;
        records.push(Bundle::from_json(&json_str)?.to_record()?);
    }
    info!("Loaded {} FHIR bundles from {}.", records.len(), dir.as_ref().display());
    records_to_table(&records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const BUNDLE: &str = r#"{
        "resourceType": "Bundle",
        "type": "collection",
        "readmission_label": true,
        "entry": [
            {"resource": {"resourceType": "Patient", "id": "p-1", "gender": "male", "birthDate": "1960-01-01"}},
            {"resource": {"resourceType": "Encounter", "id": "e-1", "subject": {"reference": "Patient/p-1"},
                "period": {"start": "2024-01-10T00:00:00", "end": "2024-01-14T00:00:00"}}},
            {"resource": {"resourceType": "Encounter", "id": "e-2", "subject": {"reference": "Patient/p-1"},
                "period": {"start": "2024-02-01T00:00:00", "end": "2024-02-03T12:00:00"}}},
            {"resource": {"resourceType": "Observation", "id": "o-1", "code": {"text": "heart_rate"},
                "valueQuantity": {"value": 104}}},
            {"resource": {"resourceType": "Observation", "id": "o-2", "code": {"text": "creatinine"},
                "valueQuantity": {"value": 1.8}}},
            {"resource": {"resourceType": "Condition", "id": "c-1"}}
        ]
    }"#;

    #[test]
    fn test_bundle_to_record() {
        let record = Bundle::from_json(BUNDLE).unwrap().to_record().unwrap();
        assert_eq!(record.patient_id, "p-1");
        assert_eq!(record.age, 64.0);
        assert_eq!(record.gender, 1.0);
        assert_eq!(record.num_encounters, 2.0);
        assert_eq!(record.avg_los, 3.0);
        assert_eq!(record.heart_rate, 104.0);
        assert_eq!(record.creatinine, 1.8);
        assert!(record.systolic_bp.is_nan());
        assert_eq!(record.readmitted_30d, Some(true));
    }

    #[test]
    fn test_bundle_without_patient() {
        let json = r#"{"entry": [{"resource": {"resourceType": "Encounter",
            "period": {"start": "2024-01-01", "end": "2024-01-03"}}}]}"#;
        let err = Bundle::from_json(json).unwrap().to_record().unwrap_err();
        assert!(matches!(err, ReadmitError::InvalidBundle(_)));
    }

    #[test]
    fn test_load_bundles() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.json"), BUNDLE).unwrap();
        fs::write(dir.path().join("b.json"), BUNDLE.replace("\"male\"", "\"female\"")).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let table = load_bundles(dir.path()).unwrap();
        assert_eq!(table.rows(), 2);
        assert_eq!(table.numeric(GENDER).unwrap(), &[1.0, 0.0]);
        assert_eq!(table.numeric(READMITTED_30D).unwrap(), &[1.0, 1.0]);
    }
}
