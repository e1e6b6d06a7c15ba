//! Feature standardization
//!
//! Per-column mean/variance are learned once at fit time and reused for
//! every batch scored against the same model; transform never recomputes
//! statistics from the batch being scored.

use super::features::FeatureMatrix;
use crate::error::MonitorError;

/// Per-column statistics learned from a training matrix
#[derive(Debug, Clone)]
pub struct ScalerParams {
    means: Vec<f64>,
    variances: Vec<f64>,
}

/// Standardizing scaler: z = (x - mean) / sqrt(variance)
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardScaler;

impl StandardScaler {
    /// Learn per-column mean and population variance from the training
    /// matrix.
    pub fn fit(matrix: &FeatureMatrix) -> Result<ScalerParams, MonitorError> {
        if matrix.is_empty() {
            return Err(MonitorError::Validation(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let width = matrix.width();
        let n = matrix.rows.len() as f64;

        let mut means = vec![0.0; width];
        for row in &matrix.rows {
            for (i, value) in row.iter().enumerate() {
                means[i] += value;
            }
        }
        for mean in &mut means {
            *mean /= n;
        }

        let mut variances = vec![0.0; width];
        for row in &matrix.rows {
            for (i, value) in row.iter().enumerate() {
                variances[i] += (value - means[i]).powi(2);
            }
        }
        for variance in &mut variances {
            *variance /= n;
        }

        Ok(ScalerParams { means, variances })
    }
}

impl ScalerParams {
    pub fn width(&self) -> usize {
        self.means.len()
    }

    /// Standardize a batch using the stored training statistics. A width
    /// mismatch against the fitted columns is a hard error.
    pub fn transform(&self, matrix: &FeatureMatrix) -> Result<Vec<Vec<f64>>, MonitorError> {
        if matrix.width() != self.width() {
            return Err(MonitorError::Validation(format!(
                "feature width {} does not match fitted width {}",
                matrix.width(),
                self.width()
            )));
        }

        let scales: Vec<f64> = self
            .variances
            .iter()
            .map(|v| {
                let s = v.sqrt();
                // Constant columns pass through unscaled
                if s < f64::EPSILON {
                    1.0
                } else {
                    s
                }
            })
            .collect();

        Ok(matrix
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(i, value)| (value - self.means[i]) / scales[i])
                    .collect()
            })
            .collect())
    }
}
