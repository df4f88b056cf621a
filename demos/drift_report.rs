//! Compare a live patient table against a training table and print the drift report.
//!
//! Usage: `cargo run --example drift_report [reference.csv current.csv [report.json]]`
//! Without arguments a synthetic reference and a shifted synthetic batch are used.
use readmit::drift::PsiBand;
use readmit::synthetic::{generate_patients, SyntheticConfig};
use readmit::{prepare_features, prepare_features_with, DriftDetector, FeatureTable, ImputationParams, JsonIO};
use std::env;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    let (reference_raw, current_raw) = if args.len() >= 3 {
        (FeatureTable::from_csv(&args[1])?, FeatureTable::from_csv(&args[2])?)
    } else {
        let reference = generate_patients(&SyntheticConfig::default())?;
        let current = generate_patients(&SyntheticConfig {
            n: 200,
            seed: 7,
            shift: 0.5,
            missing_rate: 0.05,
            with_label: false,
        })?;
        (reference, current)
    };

    // Freeze the training medians and reuse them on the live batch.
    let imputation = ImputationParams::fit(&reference_raw);
    let reference = prepare_features(&reference_raw, false)?;
    let current = prepare_features_with(&current_raw, &imputation, false)?;

    let report = DriftDetector::default().detect(&reference, &current)?;
    for (name, stats) in report.evaluated() {
        let band = match stats.psi_band() {
            PsiBand::Stable => "stable",
            PsiBand::Moderate => "moderate",
            PsiBand::Major => "major",
        };
        println!(
            "{:<22} ks={:.4} p={:.4} psi={:.4} ({}) drift={}",
            name, stats.ks_stat, stats.ks_pvalue, stats.psi, band, stats.drift_detected
        );
    }
    for (name, reason) in report.skipped() {
        println!("{:<22} skipped: {:?}", name, reason);
    }

    match args.get(3) {
        Some(path) => report.save(path)?,
        None => println!("{}", report.json_dump()?),
    }
    Ok(())
}
