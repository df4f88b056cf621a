//! Synthetic Data
//!
//! Seeded generator of raw patient tables, for demos, benchmarks and tests. Ranges follow the
//! synthetic FHIR bundles the service was first developed against.
use crate::constants::{
    AGE, AVG_LOS, CREATININE, FHIR_REFERENCE_YEAR, GENDER, HEART_RATE, NUM_ENCOUNTERS, PATIENT_ID, READMITTED_30D,
    SYSTOLIC_BP,
};
use crate::data::{Column, FeatureTable};
use crate::errors::ReadmitError;
use crate::utils::precision_round;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Settings for [`generate_patients`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Number of patients.
    pub n: usize,
    pub seed: u64,
    /// Moves vitals and labs upward, 1.0 is roughly one full range of drift.
    pub shift: f64,
    /// Probability that any single lab or vital value is missing.
    pub missing_rate: f64,
    /// Emit the `readmitted_30d` label column.
    pub with_label: bool,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        SyntheticConfig {
            n: 500,
            seed: 0,
            shift: 0.0,
            missing_rate: 0.0,
            with_label: true,
        }
    }
}

fn maybe_missing(rng: &mut StdRng, v: f64, rate: f64) -> f64 {
    if rate > 0.0 && rng.gen::<f64>() < rate {
        f64::NAN
    } else {
        v
    }
}

/// Generate a raw patient table.
pub fn generate_patients(cfg: &SyntheticConfig) -> Result<FeatureTable, ReadmitError> {
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let n = cfg.n;
    let mut ids = Vec::with_capacity(n);
    let (mut age, mut gender, mut encounters, mut los) = (
        Vec::with_capacity(n),
        Vec::with_capacity(n),
        Vec::with_capacity(n),
        Vec::with_capacity(n),
    );
    let (mut creatinine, mut heart_rate, mut systolic_bp, mut readmitted) = (
        Vec::with_capacity(n),
        Vec::with_capacity(n),
        Vec::with_capacity(n),
        Vec::with_capacity(n),
    );

    for i in 0..n {
        ids.push(Some(format!("p{:05}", i)));
        let birth_year: i32 = rng.gen_range(1950..=2005);
        age.push(f64::from(FHIR_REFERENCE_YEAR - birth_year));
        gender.push(if rng.gen_bool(0.5) { 1.0 } else { 0.0 });

        let count: u32 = rng.gen_range(1..=3);
        let mut total_days = 0u32;
        let mut flag = false;
        let mut prev_end: Option<i64> = None;
        for _ in 0..count {
            let admit: i64 = rng.gen_range(0..=200);
            let days: u32 = rng.gen_range(2..=7);
            if let Some(end) = prev_end {
                if admit - end <= 30 {
                    flag = true;
                }
            }
            prev_end = Some(admit + i64::from(days));
            total_days += days;
        }
        encounters.push(f64::from(count));
        los.push(f64::from(total_days) / f64::from(count));
        readmitted.push(if flag { 1.0 } else { 0.0 });

        let hr = (f64::from(rng.gen_range(60u32..=120)) + cfg.shift * 30.0).clamp(30.0, 250.0);
        let sbp = (f64::from(rng.gen_range(90u32..=180)) + cfg.shift * 40.0).clamp(50.0, 250.0);
        let cr = (precision_round(rng.gen_range(0.6..=3.0), 2) + cfg.shift).max(0.0);
        heart_rate.push(maybe_missing(&mut rng, hr, cfg.missing_rate));
        systolic_bp.push(maybe_missing(&mut rng, sbp, cfg.missing_rate));
        creatinine.push(maybe_missing(&mut rng, cr, cfg.missing_rate));
    }

    let mut columns = vec![
        (PATIENT_ID, Column::Text(ids)),
        (AGE, Column::Numeric(age)),
        (GENDER, Column::Numeric(gender)),
        (NUM_ENCOUNTERS, Column::Numeric(encounters)),
        (AVG_LOS, Column::Numeric(los)),
        (CREATININE, Column::Numeric(creatinine)),
        (HEART_RATE, Column::Numeric(heart_rate)),
        (SYSTOLIC_BP, Column::Numeric(systolic_bp)),
    ];
    if cfg.with_label {
        columns.push((READMITTED_30D, Column::Numeric(readmitted)));
    }
    FeatureTable::from_columns(columns)
}
