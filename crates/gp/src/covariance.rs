//! Assembly of the covariance matrices used by GP likelihood and prediction.
use crate::hyperparameters::Hyperparameters;
use crate::kernels::CovarianceKernel;
use crate::utils::DistanceMatrix;
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Data, Ix2};

/// Builds training, cross and test covariance matrices for one set of hyperparameters.
///
/// A builder is bound to the hyperparameters it is created with, a new one is
/// required for each candidate hyperparameters.
#[derive(Debug, Clone, Copy)]
pub struct CovarianceBuilder<'a, F: Float, K: CovarianceKernel<F>> {
    kernel: &'a K,
    hyper: Hyperparameters<F>,
    noise_std: F,
}

impl<'a, F: Float, K: CovarianceKernel<F>> CovarianceBuilder<'a, F, K> {
    /// Constructor given the `kernel`, its hyperparameters and the observation noise standard deviation
    pub fn new(kernel: &'a K, hyper: Hyperparameters<F>, noise_std: F) -> Self {
        CovarianceBuilder {
            kernel,
            hyper,
            noise_std,
        }
    }

    /// Training covariance `K(x, x) + noise_std^2 * I`, shape (n_train, n_train)
    pub fn training(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        self.training_from_distances(&DistanceMatrix::new(x))
    }

    /// Training covariance given precomputed pairwise distances of training points
    pub fn training_from_distances(&self, distances: &DistanceMatrix<F>) -> Array2<F> {
        let mut k = self
            .kernel
            .autocovariance_from_distances(distances, &self.hyper);
        let noise2 = self.noise_std * self.noise_std;
        k.diag_mut().mapv_inplace(|v| v + noise2);
        k
    }

    /// Cross covariance `K(x_train, x_test)`, shape (n_train, n_test)
    pub fn cross(
        &self,
        x_train: &ArrayBase<impl Data<Elem = F>, Ix2>,
        x_test: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Array2<F> {
        self.kernel.covariance(x_train, x_test, &self.hyper)
    }

    /// Test covariance `K(x_test, x_test)`, shape (n_test, n_test), noise free
    pub fn test(&self, x_test: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        self.kernel.autocovariance(x_test, &self.hyper)
    }

    /// Diagonal of the test covariance, shape (n_test,)
    pub fn test_variance(&self, x_test: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array1<F> {
        Array1::from_elem(x_test.nrows(), self.kernel.variance(&self.hyper))
    }
}
