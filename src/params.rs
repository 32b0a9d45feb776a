//! The named parameter set shared by the continuum and line profile models.
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use thiserror::Error;

/// The coarse starting width, in pixels, for both line widths
pub const DEFAULT_LINE_WIDTH: f64 = 20.0;

/// Names for the six scalar model parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Parameter {
    /// Continuum intercept
    Cte,
    /// Continuum slope
    M,
    /// Line amplitude
    A,
    /// Line center
    Mu,
    /// Lorentzian full width at half maximum
    FwhmL,
    /// Gaussian (Doppler) full width at half maximum
    FwhmD,
}

impl Parameter {
    /// The order in which an explicit parameter vector is read
    pub const ALL: [Parameter; 6] = [
        Parameter::Cte,
        Parameter::M,
        Parameter::A,
        Parameter::Mu,
        Parameter::FwhmL,
        Parameter::FwhmD,
    ];

    pub const fn label(&self) -> &'static str {
        match self {
            Parameter::Cte => "cte",
            Parameter::M => "m",
            Parameter::A => "A",
            Parameter::Mu => "mu",
            Parameter::FwhmL => "fwhmL",
            Parameter::FwhmD => "fwhmD",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("Expected {expected} initial parameters, received {received}")]
    WrongCount { expected: usize, received: usize },
    #[error("Unknown line profile {0:?}, expected \"lorentz\" or \"voigt\"")]
    UnknownProfile(String),
}

/// Continuum plus line profile parameters.
///
/// `fwhm_d` is optional: the Lorentz-only model never reads it, and leaves it
/// unset after fitting.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineParams {
    pub cte: f64,
    pub m: f64,
    pub amplitude: f64,
    pub mu: f64,
    pub fwhm_l: f64,
    pub fwhm_d: Option<f64>,
}

impl Default for LineParams {
    fn default() -> Self {
        Self {
            cte: 0.0,
            m: 0.0,
            amplitude: 0.0,
            mu: 0.0,
            fwhm_l: DEFAULT_LINE_WIDTH,
            fwhm_d: Some(DEFAULT_LINE_WIDTH),
        }
    }
}

impl LineParams {
    pub fn new(cte: f64, m: f64, amplitude: f64, mu: f64, fwhm_l: f64, fwhm_d: Option<f64>) -> Self {
        Self {
            cte,
            m,
            amplitude,
            mu,
            fwhm_l,
            fwhm_d,
        }
    }

    /// Read `cte, m, A, mu, fwhmL, fwhmD` from a six value slice
    pub fn from_slice(values: &[f64]) -> Result<Self, ParameterError> {
        match values {
            [cte, m, amplitude, mu, fwhm_l, fwhm_d] => Ok(Self::new(
                *cte,
                *m,
                *amplitude,
                *mu,
                *fwhm_l,
                Some(*fwhm_d),
            )),
            _ => Err(ParameterError::WrongCount {
                expected: Parameter::ALL.len(),
                received: values.len(),
            }),
        }
    }

    pub fn get(&self, param: Parameter) -> Option<f64> {
        match param {
            Parameter::Cte => Some(self.cte),
            Parameter::M => Some(self.m),
            Parameter::A => Some(self.amplitude),
            Parameter::Mu => Some(self.mu),
            Parameter::FwhmL => Some(self.fwhm_l),
            Parameter::FwhmD => self.fwhm_d,
        }
    }

    pub fn set(&mut self, param: Parameter, value: f64) {
        match param {
            Parameter::Cte => self.cte = value,
            Parameter::M => self.m = value,
            Parameter::A => self.amplitude = value,
            Parameter::Mu => self.mu = value,
            Parameter::FwhmL => self.fwhm_l = value,
            Parameter::FwhmD => self.fwhm_d = Some(value),
        }
    }

    /// Gather the values of `params` in order, `None` if any is unset
    pub fn gather(&self, params: &[Parameter]) -> Option<Vec<f64>> {
        params.iter().map(|p| self.get(*p)).collect()
    }

    /// Write `values` back into `params`, pairwise
    pub fn scatter(&mut self, params: &[Parameter], values: &[f64]) {
        for (p, v) in params.iter().zip(values.iter()) {
            self.set(*p, *v);
        }
    }

    pub fn clear_fwhm_d(&mut self) {
        self.fwhm_d = None;
    }

    /// Both line shapes depend only on the magnitude of their widths, so a
    /// negative width is replaced by its absolute value
    pub fn normalize_widths(&mut self) {
        self.fwhm_l = self.fwhm_l.abs();
        self.fwhm_d = self.fwhm_d.map(f64::abs);
    }

    pub fn is_finite(&self) -> bool {
        Parameter::ALL
            .iter()
            .filter_map(|p| self.get(*p))
            .all(f64::is_finite)
    }
}

impl fmt::Display for LineParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for param in Parameter::ALL {
            match self.get(param) {
                Some(value) => writeln!(f, "{:>8} =  {}", param.label(), value)?,
                None => writeln!(f, "{:>8} =  None", param.label())?,
            }
        }
        Ok(())
    }
}

/// Which line shape accompanies the linear continuum
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Profile {
    Lorentz,
    #[default]
    Voigt,
}

impl Profile {
    pub const fn name(&self) -> &'static str {
        match self {
            Profile::Lorentz => "lorentz",
            Profile::Voigt => "voigt",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = ParameterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lorentz" | "lorentzian" => Ok(Profile::Lorentz),
            "voigt" => Ok(Profile::Voigt),
            _ => Err(ParameterError::UnknownProfile(s.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_slice_order() {
        let params = LineParams::from_slice(&[100.0, 0.5, -20.0, 250.0, 12.0, 8.0]).unwrap();
        assert_eq!(params.cte, 100.0);
        assert_eq!(params.m, 0.5);
        assert_eq!(params.amplitude, -20.0);
        assert_eq!(params.mu, 250.0);
        assert_eq!(params.fwhm_l, 12.0);
        assert_eq!(params.fwhm_d, Some(8.0));

        let err = LineParams::from_slice(&[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(
            err,
            ParameterError::WrongCount {
                expected: 6,
                received: 3
            }
        );
    }

    #[test]
    fn test_gather_scatter() {
        let mut params = LineParams::default();
        let names = [Parameter::A, Parameter::Mu];
        params.scatter(&names, &[-5.0, 42.0]);
        assert_eq!(params.gather(&names), Some(vec![-5.0, 42.0]));

        params.clear_fwhm_d();
        assert_eq!(params.gather(&[Parameter::Mu, Parameter::FwhmD]), None);
        assert!(params.is_finite());
    }

    #[test]
    fn test_normalize_widths() {
        let mut params = LineParams::new(1.0, 0.5, -3.0, 10.0, -4.0, Some(-2.5));
        params.normalize_widths();
        assert_eq!((params.fwhm_l, params.fwhm_d), (4.0, Some(2.5)));
        assert_eq!(params.amplitude, -3.0);

        params.clear_fwhm_d();
        params.normalize_widths();
        assert_eq!(params.fwhm_d, None);
    }

    #[test]
    fn test_display_placeholder() {
        let mut params = LineParams::default();
        params.clear_fwhm_d();
        let text = params.to_string();
        assert!(text.contains("   fwhmD =  None"), "{text}");
        assert!(text.contains("     cte =  0"), "{text}");
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!("Voigt".parse::<Profile>().unwrap(), Profile::Voigt);
        assert_eq!("lorentz".parse::<Profile>().unwrap(), Profile::Lorentz);
        assert!("gauss".parse::<Profile>().is_err());
        assert_eq!(Profile::default(), Profile::Voigt);
    }
}
