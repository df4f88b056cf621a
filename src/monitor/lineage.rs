use crate::data::FeatureRow;
use crate::errors::ReadmitError;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// FNV-1a over bytes, finished with SplitMix64 for better bit diffusion.
///
/// Stable across platforms and releases. Not a cryptographic hash.
pub fn stable_hash64(seed: u64, s: &str) -> u64 {
    let mut h: u64 = 14695981039346656037u64;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(1099511628211u64);
    }
    splitmix64(seed ^ h)
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Content hash of a row of inputs, as 16 hex characters.
///
/// Hashes the canonical JSON encoding, keys sorted, so the same values always give the same hash.
pub fn content_hash(inputs: &FeatureRow) -> Result<String, ReadmitError> {
    let json = serde_json::to_string(inputs).map_err(|e| ReadmitError::UnableToWrite(e.to_string()))?;
    Ok(format!("{:016x}", stable_hash64(0, &json)))
}

/// One scored request: what went in, which model scored it, and what came out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageRecord {
    pub timestamp: DateTime<Utc>,
    pub model_version: String,
    pub input_hash: String,
    pub inputs: FeatureRow,
    pub prediction: f64,
}

impl LineageRecord {
    /// Build and log a lineage record stamped with the current time.
    pub fn new(inputs: FeatureRow, prediction: f64, model_version: &str) -> Result<Self, ReadmitError> {
        let record = LineageRecord {
            timestamp: Utc::now(),
            model_version: model_version.to_string(),
            input_hash: content_hash(&inputs)?,
            inputs,
            prediction,
        };
        info!(
            "Lineage: model {} input {} prediction {:.4}",
            record.model_version, record.input_hash, record.prediction
        );
        Ok(record)
    }
}

/// Append-only JSON lines sink for lineage records.
pub struct LineageLog<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> LineageLog<W> {
    pub fn new(writer: W) -> Self {
        LineageLog { writer, written: 0 }
    }

    /// Write one record as a single JSON line.
    pub fn append(&mut self, record: &LineageRecord) -> Result<(), ReadmitError> {
        serde_json::to_writer(&mut self.writer, record).map_err(|e| ReadmitError::UnableToWrite(e.to_string()))?;
        self.writer
            .write_all(b"\n")
            .map_err(|e| ReadmitError::UnableToWrite(e.to_string()))?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
