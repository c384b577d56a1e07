use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Min-max scaler mapping the fitted range onto `[0, 1]`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    range: Option<(f64, f64)>,
}

impl MinMaxScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.range.is_some()
    }

    /// Fitted `(min, max)`
    pub fn range(&self) -> Option<(f64, f64)> {
        self.range
    }

    /// Learn the min and max of `values`
    pub fn fit(&mut self, values: &[f64]) -> Result<()> {
        if values.is_empty() {
            return Err(AppError::InsufficientData("cannot fit scaler on an empty series".to_string()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(AppError::InvalidInput("cannot fit scaler on non-finite values".to_string()));
        }

        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        self.range = Some((min, max));
        Ok(())
    }

    pub fn fit_transform(&mut self, values: &[f64]) -> Result<Vec<f64>> {
        self.fit(values)?;
        self.transform(values)
    }

    pub fn transform(&self, values: &[f64]) -> Result<Vec<f64>> {
        let (min, scale) = self.params()?;
        Ok(values.iter().map(|v| (v - min) / scale).collect())
    }

    pub fn inverse_transform(&self, values: &[f64]) -> Result<Vec<f64>> {
        let (min, scale) = self.params()?;
        Ok(values.iter().map(|v| v * scale + min).collect())
    }

    /// `(min, max - min)`; a constant series gets a unit scale
    fn params(&self) -> Result<(f64, f64)> {
        let (min, max) = self.range.ok_or(AppError::ModelNotAvailable)?;
        let span = max - min;
        Ok((min, if span > 0.0 { span } else { 1.0 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_and_inverse_round_trip() {
        let closes = vec![29400.0, 29500.0, 29100.0, 30250.5, 28999.9];
        let mut scaler = MinMaxScaler::new();
        let scaled = scaler.fit_transform(&closes).unwrap();

        assert!(scaled.iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(scaled[3], 1.0);
        assert_eq!(scaled[4], 0.0);

        let restored = scaler.inverse_transform(&scaled).unwrap();
        for (a, b) in closes.iter().zip(&restored) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_constant_series() {
        let mut scaler = MinMaxScaler::new();
        let scaled = scaler.fit_transform(&[5.0, 5.0, 5.0]).unwrap();
        assert_eq!(scaled, vec![0.0, 0.0, 0.0]);
        assert_eq!(scaler.inverse_transform(&[0.0]).unwrap(), vec![5.0]);
    }

    #[test]
    fn test_unfitted_scaler() {
        let scaler = MinMaxScaler::new();
        assert!(!scaler.is_fitted());
        assert!(matches!(scaler.transform(&[1.0]), Err(AppError::ModelNotAvailable)));
    }

    #[test]
    fn test_fit_empty() {
        let mut scaler = MinMaxScaler::new();
        assert!(matches!(scaler.fit(&[]), Err(AppError::InsufficientData(_))));
    }
}
