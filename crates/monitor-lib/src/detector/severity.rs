//! Severity classification for detection results

use crate::models::Severity;

/// Classify severity from the outlier percentage and the worst (lowest)
/// decision score in the batch. Evaluated top-down, first match wins, so
/// severity never decreases as the percentage rises or the score falls.
pub fn classify(anomaly_percentage: f64, worst_score: f64) -> Severity {
    if anomaly_percentage > 20.0 || worst_score < -0.5 {
        Severity::Critical
    } else if anomaly_percentage > 10.0 || worst_score < -0.3 {
        Severity::High
    } else if anomaly_percentage > 5.0 || worst_score < -0.1 {
        Severity::Medium
    } else {
        Severity::Low
    }
}
