// Column names
pub const PATIENT_ID: &str = "patient_id";
pub const AGE: &str = "age";
pub const GENDER: &str = "gender";
pub const NUM_ENCOUNTERS: &str = "num_encounters";
pub const AVG_LOS: &str = "avg_los";
pub const CREATININE: &str = "creatinine";
pub const HEART_RATE: &str = "heart_rate";
pub const SYSTOLIC_BP: &str = "systolic_bp";
pub const HIGH_CREATININE: &str = "high_creatinine";
pub const HIGH_BP: &str = "high_bp";
pub const TACHYCARDIA: &str = "tachycardia";
pub const ENCOUNTER_LOS_RATIO: &str = "encounter_los_ratio";
pub const READMITTED_30D: &str = "readmitted_30d";

pub const RAW_FEATURES: [&str; 7] = [AGE, GENDER, NUM_ENCOUNTERS, AVG_LOS, CREATININE, HEART_RATE, SYSTOLIC_BP];
pub const DERIVED_FEATURES: [&str; 4] = [HIGH_CREATININE, HIGH_BP, TACHYCARDIA, ENCOUNTER_LOS_RATIO];

// Clinical cut points
pub const HIGH_CREATININE_MG_DL: f64 = 1.5;
pub const HIGH_SYSTOLIC_BP: f64 = 140.0;
pub const TACHYCARDIA_BPM: f64 = 100.0;
pub const LOS_EPS: f64 = 1e-6;
pub const NORMALIZE_EPS: f64 = 1e-6;

// Drift defaults
pub const PSI_BUCKETS: usize = 10;
pub const PSI_SMOOTHING: f64 = 1e-6;
pub const KS_ALPHA: f64 = 0.05;
pub const PSI_THRESHOLD: f64 = 0.1;
pub const PSI_MAJOR: f64 = 0.25;
pub const PSI_SENTINEL: f64 = 1e6;
pub const EXACT_KS_LIMIT: usize = 10_000;

pub const HIGH_RISK_THRESHOLD: f64 = 0.5;
pub const FHIR_REFERENCE_YEAR: i32 = 2024;
