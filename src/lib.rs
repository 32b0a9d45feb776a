//! `rmfeature` removes a single absorption feature from a one-dimensional
//! spectrum by fitting a linear continuum plus a Lorentzian or Voigt line
//! profile to a region around it, then subtracting the fitted line (leaving the
//! continuum in place) from the whole spectrum.
//!
//! The fitting is driven by [`FeatureRemover`], which estimates a starting
//! point from the data (or takes explicit parameters), fits with a
//! Levenberg-Marquardt solver and reconstructs the best-fit and corrected
//! spectra. Reading and writing is delegated to a [`SpectralContainer`], and
//! the region and write confirmation come from pluggable providers so the
//! same pipeline runs interactively or scripted.
//!
//! # Usage
//! ```
//! use rmfeature::prelude::*;
//! use rmfeature::{AssumeYes, FixedRegion, MemoryContainer};
//!
//! let values: Vec<f64> = (0..300)
//!     .map(|i| {
//!         let x = i as f64;
//!         20.0 - 5.0 * 9.0 / ((x - 150.0).powi(2) + 9.0)
//!     })
//!     .collect();
//! let mut container = MemoryContainer::new().with_extension("SCI", values);
//! let remover = FeatureRemover::new(RemovalConfig::default().profile(Profile::Lorentz));
//! let outcome = remover
//!     .run(
//!         &mut container,
//!         &mut FixedRegion(100, 200),
//!         &mut AssumeYes(true),
//!         &mut (),
//!         std::path::Path::new("corrected.txt"),
//!     )
//!     .unwrap();
//! println!("{}", outcome.fit());
//! assert!(matches!(outcome, RemovalOutcome::Written { .. }));
//! ```
//! ## Features
//! FITS files are read and written through `fitsio` when the `fits` feature is
//! enabled, which builds a bundled copy of `cfitsio`. Without it, only
//! whitespace separated text spectra are supported. The `plot` feature enables
//! rendering the fit with `plotters`, and `serde` adds serialization to the
//! result types.
pub mod arrayops;
pub mod container;
pub mod estimate;
pub mod fitter;
pub mod params;
pub mod pipeline;
pub mod profile;
pub mod prompt;
pub mod spectrum;
pub mod text;

#[cfg(feature = "plot")]
pub mod plot;

pub mod prelude;

#[cfg(test)]
mod test_data;

pub use crate::container::{open_container, ContainerError, MemoryContainer, SpectralContainer, TextContainer};
#[cfg(feature = "fits")]
pub use crate::container::FitsContainer;
pub use crate::estimate::{InitialGuess, LinearContinuumEstimator, ParameterEstimator};
pub use crate::fitter::{DivergenceReason, FitConfig, FitError, LevenbergMarquardt, ModelFitResult};
pub use crate::params::{LineParams, Parameter, ParameterError, Profile};
pub use crate::pipeline::{
    reconstruct, AssumeYes, ConfirmationProvider, FeatureFit, FeatureRemover, FixedRegion, Presenter,
    RegionProvider, RemovalConfig, RemovalError, RemovalOutcome, StageReport,
};
pub use crate::profile::{ContinuumLorentz, ContinuumVoigt, ProfileModel};
pub use crate::prompt::{SharedPrompt, TerminalPrompt};
pub use crate::spectrum::{Region, RegionError, Spectrum, SubSpectrum};
