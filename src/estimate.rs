//! Starting values for the continuum and line parameters.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::fitter::FitError;
use crate::params::{LineParams, DEFAULT_LINE_WIDTH};
use crate::spectrum::SubSpectrum;

/// Where the fitter's starting point comes from
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum InitialGuess {
    /// Ask a [`ParameterEstimator`] to look at the data
    #[default]
    Estimate,
    /// Start from exactly these values, the estimator is never consulted
    Explicit(LineParams),
}

/// Given observed data, compute some initial parameters
pub trait ParameterEstimator {
    fn estimate(&self, data: &SubSpectrum) -> Result<LineParams, FitError>;
}

/// Draws the continuum through the two end points of the region and puts an
/// absorption line of default width at its deepest point.
///
/// The line is assumed to be a dip below the continuum: the line position is
/// the minimum of the region, and the strength is the signed depth there.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearContinuumEstimator {
    pub line_width: f64,
}

impl Default for LinearContinuumEstimator {
    fn default() -> Self {
        Self {
            line_width: DEFAULT_LINE_WIDTH,
        }
    }
}

impl LinearContinuumEstimator {
    pub fn new(line_width: f64) -> Self {
        Self { line_width }
    }
}

impl ParameterEstimator for LinearContinuumEstimator {
    fn estimate(&self, data: &SubSpectrum) -> Result<LineParams, FitError> {
        let (first, last) = match (data.first(), data.last()) {
            (Some(first), Some(last)) if data.len() >= 2 => (first, last),
            _ => {
                return Err(FitError::DegenerateInput(format!(
                    "at least 2 points are needed to estimate a continuum, found {}",
                    data.len()
                )))
            }
        };
        let (x0, y0) = first;
        let (xn, yn) = last;
        if x0 == xn {
            return Err(FitError::DegenerateInput(format!(
                "the region starts and ends at the same pixel position {x0}, the continuum slope is undefined"
            )));
        }

        let slope = (y0 - yn) / (x0 - xn);
        let level = y0 - slope * x0;

        let index = data.argmin().ok_or_else(|| {
            FitError::DegenerateInput("the region holds no finite values".to_string())
        })?;
        let (position, value) = data
            .get(index)
            .ok_or_else(|| FitError::DegenerateInput("line index out of range".to_string()))?;
        let strength = value - (slope * position + level);

        let params = LineParams::new(
            level,
            slope,
            strength,
            position,
            self.line_width,
            Some(self.line_width),
        );
        if !params.is_finite() {
            return Err(FitError::DegenerateInput(format!(
                "the estimated starting point is not finite: {params:?}"
            )));
        }
        log::debug!("Estimated initial parameters {params:?}");
        Ok(params)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::spectrum::Spectrum;

    #[test]
    fn test_estimate_dip() {
        // continuum 10 + 0.5 x with a dip of depth 4 at pixel 5
        let mut values: Vec<f64> = (0..11).map(|i| 10.0 + 0.5 * i as f64).collect();
        values[5] -= 4.0;
        let spectrum = Spectrum::new(values);
        let data = spectrum.select(0, 11).unwrap();

        let params = LinearContinuumEstimator::default().estimate(&data).unwrap();
        assert!((params.m - 0.5).abs() < 1e-12);
        assert!((params.cte - 10.0).abs() < 1e-12);
        assert_eq!(params.mu, 5.0);
        assert!((params.amplitude + 4.0).abs() < 1e-12);
        assert_eq!(params.fwhm_l, 20.0);
        assert_eq!(params.fwhm_d, Some(20.0));
    }

    #[test]
    fn test_flat_ends_are_finite() {
        let data = SubSpectrum::from((vec![3.0, 4.0, 5.0, 6.0], vec![7.0, 5.0, 6.0, 7.0]));
        let params = LinearContinuumEstimator::default().estimate(&data).unwrap();
        assert_eq!(params.m, 0.0);
        assert_eq!(params.cte, 7.0);
        assert_eq!(params.mu, 4.0);
        assert_eq!(params.amplitude, -2.0);
    }

    #[test]
    fn test_same_end_positions_are_degenerate() {
        let data = SubSpectrum::from((vec![4.0, 5.0, 4.0], vec![1.0, 0.0, 2.0]));
        let err = LinearContinuumEstimator::default().estimate(&data).unwrap_err();
        assert!(matches!(err, FitError::DegenerateInput(_)), "{err}");
    }

    #[test]
    fn test_single_point_is_degenerate() {
        let data = SubSpectrum::from((vec![4.0], vec![1.0]));
        let err = LinearContinuumEstimator::default().estimate(&data).unwrap_err();
        assert!(matches!(err, FitError::DegenerateInput(_)), "{err}");
    }
}
