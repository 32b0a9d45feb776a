pub use crate::container::SpectralContainer;
pub use crate::estimate::{InitialGuess, ParameterEstimator};
pub use crate::fitter::FitConfig;
pub use crate::params::{LineParams, Profile};
pub use crate::pipeline::{
    ConfirmationProvider, FeatureRemover, Presenter, RegionProvider, RemovalConfig, RemovalOutcome,
};
pub use crate::profile::ProfileModel;
pub use crate::spectrum::{Region, Spectrum};
