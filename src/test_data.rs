use crate::arrayops::arange;
use crate::params::LineParams;
use crate::profile::ProfileModel;
use crate::spectrum::Spectrum;

/// Continuum plus a Lorentzian absorption dip
pub const LORENTZ_TRUTH: LineParams = LineParams {
    cte: 100.0,
    m: 0.05,
    amplitude: -30.0,
    mu: 250.0,
    fwhm_l: 12.0,
    fwhm_d: None,
};

/// Continuum plus a Voigt absorption dip, with `A` as integrated strength
pub const VOIGT_TRUTH: LineParams = LineParams {
    cte: 80.0,
    m: -0.02,
    amplitude: -400.0,
    mu: 240.0,
    fwhm_l: 6.0,
    fwhm_d: Some(8.0),
};

/// Evaluate `model` at `truth` over `0..n`
pub fn synthetic_spectrum(model: &dyn ProfileModel, truth: &LineParams, n: usize) -> Spectrum {
    let x: Vec<f64> = arange(0, n);
    Spectrum::new(model.predict(truth, &x))
}

/// A feature-free straight line
pub fn linear_spectrum(cte: f64, m: f64, n: usize) -> Spectrum {
    Spectrum::new((0..n).map(|i| cte + m * i as f64).collect())
}
