//! Negative log marginal likelihood of the GP training data.
use crate::covariance::CovarianceBuilder;
use crate::errors::{GpError, Result};
use crate::hyperparameters::Hyperparameters;
use crate::kernels::CovarianceKernel;
use crate::utils::DistanceMatrix;

use linfa::Float;
use linfa_linalg::{cholesky::*, triangular::*};
use ndarray::{Array2, ArrayBase, Axis, Data, Ix1, Ix2};

/// Value returned by [`MarginalLikelihood::penalized_nll`] for hyperparameters
/// where the likelihood cannot be computed (non positive definite covariance, non finite value)
pub const NLL_PENALTY: f64 = 1e20;

/// The three terms of the negative log marginal likelihood
///
/// `nll = 0.5 * y^t.K^-1.y + 0.5 * log|K| + 0.5 * n * log(2*pi)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NllTerms<F: Float> {
    /// Data fit term `0.5 * s^t.s` where `L.s = y`
    pub data_fit: F,
    /// Complexity term `sum(log(L_ii))`, that is `0.5 * log|K|`
    pub log_det: F,
    /// Normalization constant `0.5 * n * log(2*pi)`
    pub constant: F,
}

impl<F: Float> NllTerms<F> {
    /// Negative log marginal likelihood, the sum of the three terms
    pub fn value(&self) -> F {
        self.data_fit + self.log_det + self.constant
    }
}

/// Negative log marginal likelihood of training observations `y` at points `x`
/// under a zero mean GP prior with a given kernel and a fixed observation noise.
///
/// Pairwise distances between training points do not depend on hyperparameters,
/// they are computed once. Covariance matrix and its Cholesky factor are rebuilt
/// at each evaluation.
#[derive(Debug)]
pub struct MarginalLikelihood<'a, F: Float, K: CovarianceKernel<F>> {
    kernel: &'a K,
    distances: DistanceMatrix<F>,
    y: Array2<F>,
    noise_std: F,
}

impl<'a, F: Float, K: CovarianceKernel<F>> MarginalLikelihood<'a, F, K> {
    /// Constructor given training points `x` (n, nx) and observations `y` (n,)
    ///
    /// **Panics** if `x` and `y` have not the same number of rows.
    pub fn new(
        kernel: &'a K,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix1>,
        noise_std: F,
    ) -> Self {
        assert_eq!(x.nrows(), y.len(), "x and y should have the same length");
        MarginalLikelihood {
            kernel,
            distances: DistanceMatrix::new(x),
            y: y.to_owned().insert_axis(Axis(1)),
            noise_std,
        }
    }

    /// Pairwise distances of the training points
    pub fn distances(&self) -> &DistanceMatrix<F> {
        &self.distances
    }

    /// Compute the terms of the negative log marginal likelihood for the given hyperparameters.
    ///
    /// Fails with a linear algebra error when the training covariance is not positive definite.
    pub fn nll_terms(&self, hyper: &Hyperparameters<F>) -> Result<NllTerms<F>> {
        let k = CovarianceBuilder::new(self.kernel, *hyper, self.noise_std)
            .training_from_distances(&self.distances);
        // K cholesky decomposition
        let l = k.cholesky()?;
        // Forward substitution L.s = y
        let s = l.solve_triangular(&self.y, UPLO::Lower)?;

        let n_obs = F::cast(self.distances.n_obs);
        let half = F::cast(0.5);
        let data_fit = half * s.mapv(|v| v * v).sum();
        let log_det = l.diag().mapv(|v| v.ln()).sum();
        let constant = half * n_obs * F::cast(2. * std::f64::consts::PI).ln();
        Ok(NllTerms {
            data_fit,
            log_det,
            constant,
        })
    }

    /// Negative log marginal likelihood for the given hyperparameters
    pub fn nll(&self, hyper: &Hyperparameters<F>) -> Result<F> {
        let value = self.nll_terms(hyper)?.value();
        if value.is_finite() {
            Ok(value)
        } else {
            Err(GpError::LikelihoodComputationError(format!(
                "non finite likelihood value {value} with {hyper}"
            )))
        }
    }

    /// Negative log marginal likelihood given log hyperparameters `theta = [ln(l), ln(sigma_f)]`.
    ///
    /// This is the objective minimized during hyperparameters optimization:
    /// any failure is mapped to [`NLL_PENALTY`].
    pub fn penalized_nll(&self, theta: &[f64]) -> f64 {
        // check theta as optimizer may pass nan values
        if theta.len() != 2 || theta.iter().any(|v| !v.is_finite()) {
            return NLL_PENALTY;
        }
        let theta = [F::cast(theta[0]), F::cast(theta[1])];
        let hyper = Hyperparameters::from_log(&theta);
        match self.nll(&hyper).map(|v| v.to_f64()) {
            Ok(Some(v)) if v.is_finite() => v,
            _ => NLL_PENALTY,
        }
    }
}
