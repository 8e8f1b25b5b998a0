//! Structured batch results

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::error::{FailureKind, TaskError};

/// A successfully decoded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedFile {
    pub source: PathBuf,
    pub output: PathBuf,
    pub key: u8,
    pub extension: String,
    pub bytes: u64,
    pub sha256: String,
}

/// A file that was skipped, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub source: PathBuf,
    pub kind: FailureKind,
    pub reason: String,
}

/// Result of one task as delivered by a worker.
#[derive(Debug)]
pub struct TaskOutcome {
    pub source: PathBuf,
    pub result: Result<DecodedFile, TaskError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub started_at: String,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Tasks handed to the queue.
    pub dispatched: usize,
    /// Directory entries that were not eligible for decoding.
    pub skipped: usize,
    pub decoded: Vec<DecodedFile>,
    pub failed: Vec<FailedFile>,
    pub cancelled: bool,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl BatchReport {
    pub fn new(input_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            started_at: Utc::now().to_rfc3339(),
            duration: Duration::ZERO,
            input_dir,
            output_dir,
            dispatched: 0,
            skipped: 0,
            decoded: Vec::new(),
            failed: Vec::new(),
            cancelled: false,
        }
    }

    pub fn record(&mut self, outcome: TaskOutcome) {
        match outcome.result {
            Ok(file) => self.decoded.push(file),
            Err(e) => self.failed.push(FailedFile {
                source: outcome.source,
                kind: e.kind(),
                reason: e.to_string(),
            }),
        }
    }

    /// Tasks that reached a worker and finished, either way.
    pub fn processed(&self) -> usize {
        self.decoded.len() + self.failed.len()
    }

    pub fn bytes_decoded(&self) -> u64 {
        self.decoded.iter().map(|f| f.bytes).sum()
    }

    pub fn decoded_by_extension(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for file in &self.decoded {
            *counts.entry(file.extension.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn failed_by_kind(&self) -> BTreeMap<FailureKind, usize> {
        let mut counts = BTreeMap::new();
        for file in &self.failed {
            *counts.entry(file.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json(&self, path: &Path) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeFailure;

    fn decoded(name: &str, ext: &str, bytes: u64) -> TaskOutcome {
        TaskOutcome {
            source: PathBuf::from(name),
            result: Ok(DecodedFile {
                source: PathBuf::from(name),
                output: PathBuf::from(format!("{name}{ext}")),
                key: 1,
                extension: ext.to_string(),
                bytes,
                sha256: String::new(),
            }),
        }
    }

    #[test]
    fn test_record_and_counts() {
        let mut report = BatchReport::new("in".into(), "out".into());
        report.record(decoded("a.dat", ".jpeg", 10));
        report.record(decoded("b.dat", ".jpeg", 5));
        report.record(decoded("c.dat", ".png", 1));
        report.record(TaskOutcome {
            source: PathBuf::from("d.dat"),
            result: Err(TaskError::Recovery(DecodeFailure {
                prefix: "00".into(),
            })),
        });

        assert_eq!(report.processed(), 4);
        assert_eq!(report.bytes_decoded(), 16);
        assert_eq!(report.decoded_by_extension()[".jpeg"], 2);
        assert_eq!(report.failed_by_kind()[&FailureKind::Recovery], 1);
        assert_eq!(report.failed[0].source, PathBuf::from("d.dat"));
        assert!(report.failed[0].reason.contains("[00]"));
    }

    #[test]
    fn test_json_shape() {
        let mut report = BatchReport::new("in".into(), "out".into());
        report.record(decoded("a.dat", ".gif", 3));
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(value["decoded"][0]["extension"], ".gif");
        assert_eq!(value["cancelled"], false);
        assert!(value["duration"].is_f64());
    }
}
