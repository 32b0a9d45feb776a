//! The feature removal pipeline.
//!
//! Load a spectrum, select the region around the feature, fit a continuum plus
//! line profile to that region, subtract the fitted line (but not the
//! continuum) from the whole spectrum, and write the result on confirmation.
//!
//! ```
//! use rmfeature::{FeatureRemover, Profile, RemovalConfig, Region, Spectrum};
//!
//! let values: Vec<f64> = (0..200)
//!     .map(|i| {
//!         let x = i as f64;
//!         50.0 + 0.01 * x - 10.0 * 16.0 / ((x - 100.0).powi(2) + 16.0)
//!     })
//!     .collect();
//! let spectrum = Spectrum::new(values);
//! let remover = FeatureRemover::new(RemovalConfig::default().profile(Profile::Lorentz));
//! let fit = remover
//!     .fit(&spectrum, Region::new(60, 140, spectrum.len()).unwrap())
//!     .unwrap();
//! assert!((fit.params.mu - 100.0).abs() < 1e-3);
//! assert!(fit.corrected.iter().all(|y| y.is_finite()));
//! ```
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use thiserror::Error;

use crate::container::{ContainerError, SpectralContainer, DEFAULT_EXTENSION};
use crate::estimate::{InitialGuess, LinearContinuumEstimator, ParameterEstimator};
use crate::fitter::{FitConfig, FitError, LevenbergMarquardt, ModelFitResult};
use crate::params::{LineParams, Profile};
use crate::profile::{ContinuumLorentz, ProfileModel};
use crate::spectrum::{Region, RegionError, Spectrum, SubSpectrum};

/// Every way the pipeline can halt
#[derive(Debug, Error)]
pub enum RemovalError {
    #[error(transparent)]
    Region(#[from] RegionError),
    #[error(transparent)]
    Fit(#[from] FitError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error("Interactive input failed: {0}")]
    Prompt(#[source] io::Error),
}

/// Supplies the `[left, right)` pixel bounds around the feature
pub trait RegionProvider {
    fn select_region(&mut self, spectrum: &Spectrum) -> io::Result<(i64, i64)>;
}

/// Decides whether the corrected spectrum is written to `destination`
pub trait ConfirmationProvider {
    fn confirm_write(&mut self, destination: &Path) -> io::Result<bool>;
}

/// Hooks for displaying intermediate results. Both default to doing nothing.
pub trait Presenter {
    fn spectrum_loaded(&mut self, _spectrum: &Spectrum) {}

    fn fit_completed(&mut self, _spectrum: &Spectrum, _fit: &FeatureFit) {}
}

impl Presenter for () {}

/// A region known ahead of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedRegion(pub i64, pub i64);

impl RegionProvider for FixedRegion {
    fn select_region(&mut self, _spectrum: &Spectrum) -> io::Result<(i64, i64)> {
        Ok((self.0, self.1))
    }
}

/// Answer every confirmation with the same value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssumeYes(pub bool);

impl ConfirmationProvider for AssumeYes {
    fn confirm_write(&mut self, _destination: &Path) -> io::Result<bool> {
        Ok(self.0)
    }
}

/// Settings for one feature removal run
#[derive(Debug, Clone, PartialEq)]
pub struct RemovalConfig {
    pub profile: Profile,
    pub extension: String,
    pub initial: InitialGuess,
    pub fit: FitConfig,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            profile: Profile::default(),
            extension: DEFAULT_EXTENSION.to_string(),
            initial: InitialGuess::default(),
            fit: FitConfig::default(),
        }
    }
}

impl RemovalConfig {
    pub fn profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn initial(mut self, initial: InitialGuess) -> Self {
        self.initial = initial;
        self
    }

    pub fn fit(mut self, fit: FitConfig) -> Self {
        self.fit = fit;
        self
    }
}

/// One run of the solver within a fit
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StageReport {
    pub profile: Profile,
    pub initial: LineParams,
    pub fitted: LineParams,
    pub result: ModelFitResult,
}

/// The converged parameters and the full-length curves derived from them
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureFit {
    pub profile: Profile,
    pub region: Region,
    pub params: LineParams,
    pub stages: Vec<StageReport>,
    /// Continuum plus line over the whole spectrum
    pub best_fit: Vec<f64>,
    /// The spectrum with the line, but not the continuum, removed
    pub corrected: Vec<f64>,
}

impl fmt::Display for FeatureFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Best Fit Parameters:")?;
        writeln!(f, " section =  {}", self.region)?;
        write!(f, "{}", self.params)
    }
}

/// What happened at the end of a run
#[derive(Debug, Clone, PartialEq)]
pub enum RemovalOutcome {
    Written { destination: PathBuf, fit: FeatureFit },
    Discarded { fit: FeatureFit },
}

impl RemovalOutcome {
    pub fn fit(&self) -> &FeatureFit {
        match self {
            RemovalOutcome::Written { fit, .. } => fit,
            RemovalOutcome::Discarded { fit } => fit,
        }
    }
}

/// Evaluate the model over the whole pixel range of `spectrum`, returning the
/// best-fit curve and the spectrum with the line-only component subtracted.
pub fn reconstruct(
    spectrum: &Spectrum,
    model: &dyn ProfileModel,
    params: &LineParams,
) -> Result<(Vec<f64>, Vec<f64>), FitError> {
    model.check(params)?;
    let pixels = spectrum.pixels();
    let best_fit = model.predict(params, &pixels);
    let corrected = spectrum
        .values()
        .iter()
        .zip(model.line_only(params, &pixels))
        .map(|(y, line)| y - line)
        .collect();
    Ok((best_fit, corrected))
}

/// Fits and removes one spectral feature
pub struct FeatureRemover {
    pub config: RemovalConfig,
    estimator: Box<dyn ParameterEstimator>,
}

impl fmt::Debug for FeatureRemover {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureRemover")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for FeatureRemover {
    fn default() -> Self {
        Self::new(RemovalConfig::default())
    }
}

impl FeatureRemover {
    pub fn new(config: RemovalConfig) -> Self {
        Self {
            config,
            estimator: Box::new(LinearContinuumEstimator::default()),
        }
    }

    /// Replace the estimator used when no explicit starting point is given
    pub fn with_estimator(mut self, estimator: impl ParameterEstimator + 'static) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    fn run_stage(
        &self,
        solver: &LevenbergMarquardt,
        model: &dyn ProfileModel,
        params: &mut LineParams,
        data: &SubSpectrum,
    ) -> Result<StageReport, FitError> {
        let initial = *params;
        log::debug!("Fitting {:?} from {initial:?}", model);
        let result = solver.fit(model, params, data)?;
        params.normalize_widths();
        log::debug!("{:?} converged after {} iterations, cost {:e}", model, result.iterations, result.cost);
        Ok(StageReport {
            profile: model.profile(),
            initial,
            fitted: *params,
            result,
        })
    }

    /// Fit the configured profile to `region` of `spectrum` and reconstruct
    /// the best-fit and corrected spectra.
    ///
    /// With an estimated starting point and the Voigt profile, a Lorentz
    /// profile is fit first and its values seed the Voigt fit. The Lorentz
    /// profile leaves `fwhm_d` unset.
    ///
    /// `region` must lie within `spectrum`, otherwise this fails with
    /// [`RegionError::InvalidRegion`].
    pub fn fit(&self, spectrum: &Spectrum, region: Region) -> Result<FeatureFit, RemovalError> {
        let data = spectrum.region(&region)?;
        let solver = LevenbergMarquardt::new(self.config.fit.clone());
        let profile = self.config.profile;
        let model = profile.model();
        let mut stages = Vec::new();

        let mut params = match self.config.initial {
            InitialGuess::Explicit(params) => {
                log::debug!("Using explicit initial parameters");
                params
            }
            InitialGuess::Estimate => {
                let mut params = self.estimator.estimate(&data)?;
                if profile == Profile::Voigt {
                    stages.push(self.run_stage(&solver, &ContinuumLorentz, &mut params, &data)?);
                }
                params
            }
        };

        if profile == Profile::Lorentz {
            params.clear_fwhm_d();
        }
        stages.push(self.run_stage(&solver, model, &mut params, &data)?);

        let (best_fit, corrected) = reconstruct(spectrum, model, &params)?;
        log::info!("Fit {profile} profile over [{}, {}): {params:?}", region.start, region.end);
        Ok(FeatureFit {
            profile,
            region,
            params,
            stages,
            best_fit,
            corrected,
        })
    }

    /// Drive the whole pipeline: load, select, fit, present, confirm and write.
    pub fn run(
        &self,
        container: &mut dyn SpectralContainer,
        regions: &mut dyn RegionProvider,
        confirmation: &mut dyn ConfirmationProvider,
        presenter: &mut dyn Presenter,
        destination: &Path,
    ) -> Result<RemovalOutcome, RemovalError> {
        let spectrum = container.read_spectrum(&self.config.extension)?;
        container.check_writable(destination)?;
        log::debug!(
            "Loaded {} samples from {}[{}]",
            spectrum.len(),
            container.describe(),
            self.config.extension
        );
        presenter.spectrum_loaded(&spectrum);

        let (left, right) = regions
            .select_region(&spectrum)
            .map_err(RemovalError::Prompt)?;
        let region = Region::new(left, right, spectrum.len())?;

        let fit = self.fit(&spectrum, region)?;
        presenter.fit_completed(&spectrum, &fit);

        if confirmation
            .confirm_write(destination)
            .map_err(RemovalError::Prompt)?
        {
            container.write_corrected(&self.config.extension, &fit.corrected, destination)?;
            log::info!("Wrote corrected spectrum to {}", destination.display());
            Ok(RemovalOutcome::Written {
                destination: destination.to_path_buf(),
                fit,
            })
        } else {
            log::info!("Corrected spectrum discarded");
            Ok(RemovalOutcome::Discarded { fit })
        }
    }
}
