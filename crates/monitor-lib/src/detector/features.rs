//! Feature extraction from raw metric samples
//!
//! Turns each sample into a fixed-order numeric vector: the six canonical
//! metric fields, plus hour-of-day and day-of-week when the batch carries
//! timestamps. Calendar presence is decided per batch, never per row, so
//! every vector in a batch has the same width.

use crate::models::MetricSample;
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};

/// Canonical metric fields, in feature order
pub const CANONICAL_FEATURES: usize = 6;

/// Calendar features appended when timestamps are present
pub const CALENDAR_FEATURES: usize = 2;

/// Defaults used when a timestamp is present but unparsable
const FALLBACK_HOUR: f64 = 12.0;
const FALLBACK_WEEKDAY: f64 = 1.0;

/// A batch of extracted feature vectors, all of equal width
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub rows: Vec<Vec<f64>>,
    /// Whether the calendar features were appended to every row
    pub with_calendar: bool,
}

impl FeatureMatrix {
    /// Width of every row in the matrix
    pub fn width(&self) -> usize {
        if self.with_calendar {
            CANONICAL_FEATURES + CALENDAR_FEATURES
        } else {
            CANONICAL_FEATURES
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Extracts fixed-order feature vectors from raw samples
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract one feature vector per sample. Deterministic, never fails:
    /// bad fields were already coerced to 0.0 at deserialization and a bad
    /// timestamp falls back to fixed calendar defaults.
    pub fn extract(&self, samples: &[MetricSample]) -> FeatureMatrix {
        let with_calendar = samples.iter().any(|s| s.timestamp.is_some());

        let rows = samples
            .iter()
            .map(|sample| {
                let mut row = vec![
                    sample.cpu_usage,
                    sample.memory_usage,
                    sample.disk_usage,
                    sample.error_rate,
                    sample.request_count,
                    sample.response_time,
                ];
                if with_calendar {
                    let (hour, weekday) = sample
                        .timestamp
                        .as_deref()
                        .map(calendar_features)
                        .unwrap_or((FALLBACK_HOUR, FALLBACK_WEEKDAY));
                    row.push(hour);
                    row.push(weekday);
                }
                row
            })
            .collect();

        FeatureMatrix { rows, with_calendar }
    }
}

/// Parse hour-of-day and day-of-week (Monday = 0) from a timestamp string,
/// accepting RFC 3339 or naive ISO 8601.
fn calendar_features(raw: &str) -> (f64, f64) {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return (
            dt.hour() as f64,
            dt.weekday().num_days_from_monday() as f64,
        );
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return (
                dt.hour() as f64,
                dt.weekday().num_days_from_monday() as f64,
            );
        }
    }
    (FALLBACK_HOUR, FALLBACK_WEEKDAY)
}
