//! Continuum and line profile functions.
//!
//! Every function here is pure: it reads the parameters it is handed and
//! nothing else. The two fittable composite models, [`ContinuumLorentz`] and
//! [`ContinuumVoigt`], combine the linear continuum with one line shape and
//! implement [`ProfileModel`].
//!
//! # Amplitude conventions
//!
//! The amplitude scalings are the historical ones and are known to be
//! approximate:
//!
//! - [`lorentz`] is scaled so that its value at `mu` is exactly `A`.
//! - [`voigt`] multiplies a *unit-area* pseudo-Voigt by `A`, so `A` is the
//!   integrated line strength rather than the depth.
use std::f64::consts::{LN_2, PI};
use std::fmt::Debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::fitter::FitError;
use crate::params::{LineParams, Parameter, Profile};

/// Linear continuum
///
/// ```math
/// y = \mathrm{cte} + m x
/// ```
#[inline]
pub fn continuum(params: &LineParams, x: f64) -> f64 {
    params.cte + params.m * x
}

/// Amplitude-scaled Lorentzian
///
/// ```math
/// y = A \cdot w \frac{\pi}{2} \cdot \frac{w / 2\pi}{(x - \mu)^2 + (w/2)^2}
/// ```
#[inline]
pub fn lorentz(params: &LineParams, x: f64) -> f64 {
    let fwhm = params.fwhm_l;
    let amp = params.amplitude * fwhm * PI / 2.0;
    amp * (fwhm / (2.0 * PI)) / ((x - params.mu).powi(2) + (fwhm / 2.0).powi(2))
}

/// Unit-area Gaussian with full width at half maximum `fwhm`
#[inline]
fn unit_gaussian(dx: f64, fwhm: f64) -> f64 {
    let sigma = fwhm / (2.0 * (2.0 * LN_2).sqrt());
    (-0.5 * (dx / sigma).powi(2)).exp() / (sigma * (2.0 * PI).sqrt())
}

/// Unit-area Lorentzian with full width at half maximum `fwhm`
#[inline]
fn unit_lorentzian(dx: f64, fwhm: f64) -> f64 {
    let gamma = fwhm / 2.0;
    gamma / (PI * (dx.powi(2) + gamma.powi(2)))
}

/// Unit-area pseudo-Voigt profile centered at `mu`.
///
/// The Gaussian (`fwhm_d`) and Lorentzian (`fwhm_l`) widths are combined into
/// a total width `f`, and the profile is the mixture
/// $`\eta L(x; f) + (1 - \eta) G(x; f)`$ with the Thompson-Cox-Hastings
/// coefficients. Widths are taken by magnitude.
pub fn pseudo_voigt(x: f64, fwhm_d: f64, fwhm_l: f64, mu: f64) -> f64 {
    let fg = fwhm_d.abs();
    let fl = fwhm_l.abs();
    let dx = x - mu;
    if fg == 0.0 && fl == 0.0 {
        return if dx == 0.0 { f64::INFINITY } else { 0.0 };
    }
    if fg == 0.0 {
        return unit_lorentzian(dx, fl);
    }
    if fl == 0.0 {
        return unit_gaussian(dx, fg);
    }

    let f = (fg.powi(5)
        + 2.69269 * fg.powi(4) * fl
        + 2.42843 * fg.powi(3) * fl.powi(2)
        + 4.47163 * fg.powi(2) * fl.powi(3)
        + 0.07842 * fg * fl.powi(4)
        + fl.powi(5))
    .powf(0.2);
    let ratio = fl / f;
    let eta = 1.36603 * ratio - 0.47719 * ratio.powi(2) + 0.11116 * ratio.powi(3);
    eta * unit_lorentzian(dx, f) + (1.0 - eta) * unit_gaussian(dx, f)
}

/// Amplitude times a unit-area pseudo-Voigt
#[inline]
pub fn voigt(params: &LineParams, x: f64) -> f64 {
    let fwhm_d = params.fwhm_d.unwrap_or_default();
    params.amplitude * pseudo_voigt(x, fwhm_d, params.fwhm_l, params.mu)
}

#[inline]
pub fn cont_lorentz(params: &LineParams, x: f64) -> f64 {
    continuum(params, x) + lorentz(params, x)
}

#[inline]
pub fn cont_voigt(params: &LineParams, x: f64) -> f64 {
    continuum(params, x) + voigt(params, x)
}

/// A continuum plus line shape model that can be fit by
/// [`LevenbergMarquardt`](crate::fitter::LevenbergMarquardt)
pub trait ProfileModel: Debug {
    /// The parameters the model reads and the fitter varies, in fitting order
    fn free_parameters(&self) -> &'static [Parameter];

    /// The line shape alone, without the continuum
    fn line(&self, params: &LineParams, x: f64) -> f64;

    fn profile(&self) -> Profile;

    /// Continuum plus line
    fn density(&self, params: &LineParams, x: f64) -> f64 {
        continuum(params, x) + self.line(params, x)
    }

    /// Given a coordinate sequence, produce the complementary sequence of model values
    fn predict(&self, params: &LineParams, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|x| self.density(params, *x)).collect()
    }

    /// Given a coordinate sequence, produce the line-only component
    fn line_only(&self, params: &LineParams, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|x| self.line(params, *x)).collect()
    }

    /// Ensure every free parameter is populated
    fn check(&self, params: &LineParams) -> Result<(), FitError> {
        match self
            .free_parameters()
            .iter()
            .find(|p| params.get(**p).is_none())
        {
            Some(missing) => Err(FitError::MissingParameter(*missing)),
            None => Ok(()),
        }
    }
}

/// Linear continuum plus [`lorentz`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContinuumLorentz;

impl ProfileModel for ContinuumLorentz {
    fn free_parameters(&self) -> &'static [Parameter] {
        &[
            Parameter::Cte,
            Parameter::M,
            Parameter::A,
            Parameter::Mu,
            Parameter::FwhmL,
        ]
    }

    fn line(&self, params: &LineParams, x: f64) -> f64 {
        lorentz(params, x)
    }

    fn profile(&self) -> Profile {
        Profile::Lorentz
    }
}

/// Linear continuum plus [`voigt`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContinuumVoigt;

impl ProfileModel for ContinuumVoigt {
    fn free_parameters(&self) -> &'static [Parameter] {
        &[
            Parameter::Cte,
            Parameter::M,
            Parameter::A,
            Parameter::Mu,
            Parameter::FwhmD,
            Parameter::FwhmL,
        ]
    }

    fn line(&self, params: &LineParams, x: f64) -> f64 {
        voigt(params, x)
    }

    fn profile(&self) -> Profile {
        Profile::Voigt
    }
}

impl Profile {
    /// The composite model fit and evaluated for this profile
    pub fn model(&self) -> &'static dyn ProfileModel {
        match self {
            Profile::Lorentz => &ContinuumLorentz,
            Profile::Voigt => &ContinuumVoigt,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::arrayops::gridspace;

    macro_rules! assert_is_close {
        ($t1:expr, $t2:expr, $tol:expr, $label:literal) => {
            assert!(
                ($t1 - $t2).abs() < $tol,
                "Observed {} {}, expected {}, difference {}",
                $label,
                $t1,
                $t2,
                $t1 - $t2,
            );
        };
    }

    fn params() -> LineParams {
        LineParams::new(100.0, 0.1, -25.0, 50.0, 10.0, Some(6.0))
    }

    #[test]
    fn test_lorentz_peak_is_amplitude() {
        let p = params();
        assert_is_close!(lorentz(&p, p.mu), p.amplitude, 1e-12, "peak");
        // half maximum at mu +/- fwhm / 2
        assert_is_close!(lorentz(&p, p.mu + 5.0), p.amplitude / 2.0, 1e-12, "half max");
        assert_is_close!(lorentz(&p, p.mu - 5.0), p.amplitude / 2.0, 1e-12, "half max");
    }

    #[test]
    fn test_pseudo_voigt_limits() {
        let xs = gridspace(0.0, 100.0, 0.5);
        for x in xs.iter().copied() {
            let pure_l = pseudo_voigt(x, 0.0, 10.0, 50.0);
            assert_is_close!(pure_l, unit_lorentzian(x - 50.0, 10.0), 1e-15, "lorentzian limit");
            let pure_g = pseudo_voigt(x, 10.0, 0.0, 50.0);
            assert_is_close!(pure_g, unit_gaussian(x - 50.0, 10.0), 1e-15, "gaussian limit");
        }
        // as the Gaussian width vanishes the mixture tends to the Lorentzian
        let near_l = pseudo_voigt(50.0, 1e-9, 10.0, 50.0);
        assert_is_close!(near_l, unit_lorentzian(0.0, 10.0), 1e-6, "mixing");
    }

    #[test]
    fn test_pseudo_voigt_unit_area() {
        let step = 0.01;
        let xs = gridspace(-400.0, 400.0, step);
        let area: f64 = xs.iter().map(|x| pseudo_voigt(*x, 4.0, 3.0, 0.0) * step).sum();
        // the Lorentzian wings beyond +/-400 hold a small share of the area
        assert_is_close!(area, 1.0, 5e-3, "area");
    }

    #[test]
    fn test_pseudo_voigt_symmetric_and_width_sign() {
        let a = pseudo_voigt(47.0, 6.0, 4.0, 50.0);
        let b = pseudo_voigt(53.0, 6.0, 4.0, 50.0);
        assert_is_close!(a, b, 1e-15, "symmetry");
        assert_eq!(pseudo_voigt(47.0, -6.0, -4.0, 50.0), a);
    }

    #[test]
    fn test_composites() {
        let p = params();
        let x = 42.0;
        assert_eq!(cont_lorentz(&p, x), continuum(&p, x) + lorentz(&p, x));
        assert_eq!(cont_voigt(&p, x), continuum(&p, x) + voigt(&p, x));
        assert_eq!(ContinuumLorentz.density(&p, x), cont_lorentz(&p, x));
        assert_eq!(ContinuumVoigt.density(&p, x), cont_voigt(&p, x));
        assert_eq!(Profile::Voigt.model().profile(), Profile::Voigt);
    }

    #[test]
    fn test_check_requires_fwhm_d_for_voigt() {
        let mut p = params();
        p.clear_fwhm_d();
        assert!(ContinuumLorentz.check(&p).is_ok());
        match ContinuumVoigt.check(&p) {
            Err(FitError::MissingParameter(Parameter::FwhmD)) => {}
            other => panic!("Expected a missing fwhmD, got {other:?}"),
        }
    }
}
