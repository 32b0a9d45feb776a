//! Nonlinear least squares fitting of [`ProfileModel`]s.
//!
//! [`LevenbergMarquardt`] minimizes the sum of squared residuals
//! $`\sum_i (f(x_i; \theta) - y_i)^2`$ over the model's free parameters,
//! using a forward-difference Jacobian and Marquardt's diagonal damping of
//! the normal equations.
//!
//! Parameters are updated in place. A fit that does not converge is an
//! error which carries the last accepted parameter state, it is never
//! handed back as if it had converged.
use std::fmt;

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::params::{LineParams, Parameter};
use crate::profile::ProfileModel;
use crate::spectrum::SubSpectrum;

const MIN_DAMPING: f64 = 1e-15;
const MAX_DAMPING: f64 = 1e16;

/// Why an optimization run stopped without converging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DivergenceReason {
    /// The iteration limit was reached
    MaxIterations,
    /// The damped normal equations could not be solved, or no damping
    /// produced a downhill step
    SingularSystem,
    /// The model produced `NaN` or infinite residuals
    NonFinite,
}

impl fmt::Display for DivergenceReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DivergenceReason::MaxIterations => f.write_str("iteration limit reached"),
            DivergenceReason::SingularSystem => f.write_str("singular or ill-conditioned system"),
            DivergenceReason::NonFinite => f.write_str("non-finite residuals"),
        }
    }
}

/// All the ways fitting a line profile can fail
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("Degenerate input: {0}")]
    DegenerateInput(String),
    #[error("Parameter {0} must be set before the model can be evaluated")]
    MissingParameter(Parameter),
    #[error("The fit did not converge after {iterations} iterations ({reason}). Last parameters:\n{params}")]
    Divergence {
        reason: DivergenceReason,
        iterations: usize,
        params: LineParams,
    },
}

/// Hyperparameters for the Levenberg-Marquardt solver
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitConfig {
    /// The maximum number of trial steps before giving up
    pub max_iter: usize,
    /// Relative reduction of the sum of squares below which the fit has converged
    pub ftol: f64,
    /// Relative step size below which the fit has converged
    pub xtol: f64,
    /// Cosine between the residuals and the Jacobian columns below which the fit has converged
    pub gtol: f64,
    /// Residual norm, relative to the norm of the data, which counts as an exact fit
    pub residual_tolerance: f64,
    /// The starting Marquardt damping factor
    pub initial_damping: f64,
    /// Relative step used for the forward-difference Jacobian
    pub difference_step: f64,
}

impl FitConfig {
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    pub fn xtol(mut self, xtol: f64) -> Self {
        self.xtol = xtol;
        self
    }

    pub fn gtol(mut self, gtol: f64) -> Self {
        self.gtol = gtol;
        self
    }

    pub fn residual_tolerance(mut self, residual_tolerance: f64) -> Self {
        self.residual_tolerance = residual_tolerance;
        self
    }

    pub fn initial_damping(mut self, initial_damping: f64) -> Self {
        self.initial_damping = initial_damping;
        self
    }

    pub fn difference_step(mut self, difference_step: f64) -> Self {
        self.difference_step = difference_step;
        self
    }
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iter: 1_000,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            gtol: 0.0,
            residual_tolerance: 1e-10,
            initial_damping: 1e-3,
            difference_step: 1.49012e-8,
        }
    }
}

/// Describe a successful optimization run
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ModelFitResult {
    /// The sum of squared residuals at the solution
    pub cost: f64,
    /// The number of trial steps taken
    pub iterations: usize,
    /// The number of model evaluations over the data
    pub evaluations: usize,
}

impl ModelFitResult {
    pub fn new(cost: f64, iterations: usize, evaluations: usize) -> Self {
        Self {
            cost,
            iterations,
            evaluations,
        }
    }

    /// Root mean squared residual over `n` points
    pub fn rmse(&self, n: usize) -> f64 {
        if n == 0 {
            return 0.0;
        }
        (self.cost / n as f64).sqrt()
    }
}

/// A Levenberg-Marquardt solver
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    pub config: FitConfig,
}

impl LevenbergMarquardt {
    pub fn new(config: FitConfig) -> Self {
        Self { config }
    }

    fn residuals(
        model: &dyn ProfileModel,
        params: &LineParams,
        data: &SubSpectrum,
        out: &mut DVector<f64>,
    ) -> f64 {
        for (i, (x, y)) in data.iter().enumerate() {
            out[i] = model.density(params, x) - y;
        }
        out.norm_squared()
    }

    fn jacobian(
        &self,
        model: &dyn ProfileModel,
        names: &[Parameter],
        params: &LineParams,
        residuals: &DVector<f64>,
        data: &SubSpectrum,
    ) -> DMatrix<f64> {
        let mut jac = DMatrix::zeros(data.len(), names.len());
        let mut shifted = *params;
        let mut column = DVector::zeros(data.len());
        for (j, name) in names.iter().enumerate() {
            let value = params.get(*name).unwrap_or_default();
            let h = self.config.difference_step * value.abs().max(1.0);
            shifted.set(*name, value + h);
            Self::residuals(model, &shifted, data, &mut column);
            for i in 0..data.len() {
                jac[(i, j)] = (column[i] - residuals[i]) / h;
            }
            shifted.set(*name, value);
        }
        jac
    }

    fn solve_damped(normal: &DMatrix<f64>, gradient: &DVector<f64>, damping: f64) -> Option<DVector<f64>> {
        let max_diag = normal.diagonal().amax();
        let floor = (max_diag * f64::EPSILON).max(f64::MIN_POSITIVE);
        let mut damped = normal.clone();
        for j in 0..damped.nrows() {
            damped[(j, j)] += damping * normal[(j, j)].max(floor);
        }
        let rhs = -gradient;
        let step = match damped.clone().cholesky() {
            Some(decomp) => Some(decomp.solve(&rhs)),
            None => damped.lu().solve(&rhs),
        }?;
        if step.iter().all(|v| v.is_finite()) {
            Some(step)
        } else {
            None
        }
    }

    /// Scaled gradient norm: the largest cosine between the residual vector
    /// and a Jacobian column.
    fn gradient_cosine(normal: &DMatrix<f64>, gradient: &DVector<f64>, cost: f64) -> f64 {
        let rnorm = cost.sqrt();
        if rnorm == 0.0 {
            return 0.0;
        }
        gradient
            .iter()
            .zip(normal.diagonal().iter())
            .filter(|(_, d)| **d > 0.0)
            .map(|(g, d)| g.abs() / (d.sqrt() * rnorm))
            .fold(0.0, f64::max)
    }

    /// Fit `model` to `data`, starting from and updating `params` in place.
    pub fn fit(
        &self,
        model: &dyn ProfileModel,
        params: &mut LineParams,
        data: &SubSpectrum,
    ) -> Result<ModelFitResult, FitError> {
        model.check(params)?;
        let names = model.free_parameters();
        let n = data.len();
        if n < names.len() {
            return Err(FitError::DegenerateInput(format!(
                "{n} points cannot constrain the {} free parameters of {model:?}",
                names.len()
            )));
        }

        let mut x = DVector::from_vec(
            params
                .gather(names)
                .ok_or_else(|| FitError::DegenerateInput("unset parameter".into()))?,
        );
        let mut residuals = DVector::zeros(n);
        let mut trial_residuals = DVector::zeros(n);
        let mut cost = Self::residuals(model, params, data, &mut residuals);
        let mut evaluations = 1;

        let divergence = |reason, iterations, params: &LineParams| FitError::Divergence {
            reason,
            iterations,
            params: *params,
        };

        if !cost.is_finite() {
            return Err(divergence(DivergenceReason::NonFinite, 0, &*params));
        }

        let data_norm = data.value.iter().map(|y| y * y).sum::<f64>().sqrt().max(1.0);
        let mut damping = self.config.initial_damping;
        let mut trial = *params;
        let mut normal = DMatrix::zeros(names.len(), names.len());
        let mut gradient = DVector::zeros(names.len());
        let mut stale = true;

        for it in 0..self.config.max_iter {
            if cost.sqrt() <= self.config.residual_tolerance * data_norm {
                log::trace!("{it}: Residuals vanish, cost = {cost:e}");
                return Ok(ModelFitResult::new(cost, it, evaluations));
            }

            if stale {
                let jac = self.jacobian(model, names, params, &residuals, data);
                evaluations += names.len();
                normal = jac.tr_mul(&jac);
                gradient = jac.tr_mul(&residuals);
                stale = false;

                if Self::gradient_cosine(&normal, &gradient, cost) <= self.config.gtol {
                    log::trace!("{it}: Gradient orthogonal to residuals");
                    return Ok(ModelFitResult::new(cost, it, evaluations));
                }
            }

            let step = match Self::solve_damped(&normal, &gradient, damping) {
                Some(step) => step,
                None => {
                    damping *= 10.0;
                    log::trace!("{it}: Damped system unsolvable, damping = {damping:e}");
                    if damping > MAX_DAMPING {
                        return Err(divergence(DivergenceReason::SingularSystem, it, &*params));
                    }
                    continue;
                }
            };

            let step_small = step.norm() <= self.config.xtol * (x.norm() + self.config.xtol);
            let candidate = &x + &step;
            trial.scatter(names, candidate.as_slice());
            let trial_cost = Self::residuals(model, &trial, data, &mut trial_residuals);
            evaluations += 1;

            if trial_cost.is_finite() && trial_cost < cost {
                let predicted =
                    -(2.0 * step.dot(&gradient) + step.dot(&(&normal * &step)));
                let actual = cost - trial_cost;
                let previous = cost;

                x = candidate;
                std::mem::swap(&mut residuals, &mut trial_residuals);
                cost = trial_cost;
                *params = trial;
                damping = (damping / 10.0).max(MIN_DAMPING);
                stale = true;
                log::trace!("{it}: Accepted step, cost = {cost:e}, damping = {damping:e}, params = {params:?}");

                if (actual <= self.config.ftol * previous && predicted.abs() <= self.config.ftol * previous)
                    || step_small
                {
                    return Ok(ModelFitResult::new(cost, it + 1, evaluations));
                }
            } else {
                if step_small {
                    log::trace!("{it}: Step below tolerance, cost = {cost:e}");
                    return Ok(ModelFitResult::new(cost, it + 1, evaluations));
                }
                damping *= 10.0;
                log::trace!("{it}: Rejected step, trial cost = {trial_cost:e}, damping = {damping:e}");
                if damping > MAX_DAMPING {
                    let reason = if trial_cost.is_finite() {
                        DivergenceReason::SingularSystem
                    } else {
                        DivergenceReason::NonFinite
                    };
                    return Err(divergence(reason, it + 1, &*params));
                }
                // the rejected trial left stale values in the scratch copy
                trial = *params;
            }
        }

        Err(divergence(
            DivergenceReason::MaxIterations,
            self.config.max_iter,
            &*params,
        ))
    }
}
