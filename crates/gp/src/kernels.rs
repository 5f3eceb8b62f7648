//! A module for stationary covariance kernels used as the prior of the GP model.
//!
//! A kernel maps the euclidean distance `r` between two points to a covariance value
//! given [`Hyperparameters`] (length scale and signal standard deviation).
//!
//! The following kernel is implemented:
//! * matern 3/2.

use crate::hyperparameters::Hyperparameters;
use crate::utils::{pairwise_distances, DistanceMatrix};
use linfa::Float;
use ndarray::{Array2, ArrayBase, Data, Ix2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::fmt;

/// A trait for using a stationary covariance kernel in GP regression
pub trait CovarianceKernel<F: Float>:
    Clone + Copy + Default + fmt::Debug + fmt::Display + Sync
{
    /// Covariance value `k(r)` for a euclidean distance `r >= 0`
    fn eval(&self, r: F, hyper: &Hyperparameters<F>) -> F;

    /// Covariance value at `r = 0`, that is the prior variance of any point
    fn variance(&self, hyper: &Hyperparameters<F>) -> F {
        self.eval(F::zero(), hyper)
    }

    /// Compute covariance matrix `K(a, b)` of shape (p, q) given `a` points (p, nx)
    /// and `b` points (q, nx).
    fn covariance(
        &self,
        a: &ArrayBase<impl Data<Elem = F>, Ix2>,
        b: &ArrayBase<impl Data<Elem = F>, Ix2>,
        hyper: &Hyperparameters<F>,
    ) -> Array2<F> {
        let mut k = pairwise_distances(a, b);
        Zip::from(&mut k).par_for_each(|v| *v = self.eval(*v, hyper));
        k
    }

    /// Compute covariance matrix `K(x, x)` of shape (n, n) given `x` points (n, nx).
    ///
    /// The result is exactly symmetric: only distinct pairs are evaluated
    /// and mirrored.
    fn autocovariance(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        hyper: &Hyperparameters<F>,
    ) -> Array2<F> {
        self.autocovariance_from_distances(&DistanceMatrix::new(x), hyper)
    }

    /// Compute covariance matrix `K(x, x)` given precomputed pairwise distances of `x` points
    fn autocovariance_from_distances(
        &self,
        distances: &DistanceMatrix<F>,
        hyper: &Hyperparameters<F>,
    ) -> Array2<F> {
        let n = distances.n_obs;
        let variance = self.variance(hyper);
        let mut k = Array2::<F>::eye(n).mapv(|v| v * variance);
        let kij = distances.d.mapv(|r| self.eval(r, hyper));
        for (v, ij) in kij.iter().zip(distances.d_indices.outer_iter()) {
            k[[ij[0], ij[1]]] = *v;
            k[[ij[1], ij[0]]] = *v;
        }
        k
    }
}

/// Matern 3/2 covariance kernel
///
/// `k(r) = sigma_f^2 * (1 + sqrt(3) * r / l) * exp(-sqrt(3) * r / l)`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(into = "String"),
    serde(try_from = "String")
)]
pub struct Matern32Kernel();

impl From<Matern32Kernel> for String {
    fn from(_item: Matern32Kernel) -> String {
        "Matern32".to_string()
    }
}

impl TryFrom<String> for Matern32Kernel {
    type Error = &'static str;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        if s == "Matern32" {
            Ok(Self::default())
        } else {
            Err("Bad string value for Matern32Kernel, should be \'Matern32\'")
        }
    }
}

impl<F: Float> CovarianceKernel<F> for Matern32Kernel {
    fn eval(&self, r: F, hyper: &Hyperparameters<F>) -> F {
        let a = F::cast(3.).sqrt() * r / hyper.length_scale();
        hyper.signal_variance() * (F::one() + a) * F::exp(-a)
    }
}

impl fmt::Display for Matern32Kernel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Matern32")
    }
}
