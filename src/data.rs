//! Synthetic one-dimensional observations of the `sin` function.
use anyhow::{ensure, Result};
use ndarray::{Array, Array1};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;

/// Reference function observed with noise
pub fn reference(x: f64) -> f64 {
    x.sin()
}

/// Noisy training observations of [`reference`] and evenly spaced test points
#[derive(Clone, Debug)]
pub struct SyntheticData {
    /// Training inputs drawn uniformly within limits
    pub x_train: Array1<f64>,
    /// Noisy observations at training inputs
    pub y_train: Array1<f64>,
    /// Test inputs evenly spaced within limits
    pub x_test: Array1<f64>,
}

impl SyntheticData {
    /// Draw `n_train` training points in `xlimits` observed with a gaussian noise
    /// of standard deviation `noise_std` and `n_test` test points spanning `xlimits`.
    pub fn generate<R: Rng + ?Sized>(
        n_train: usize,
        n_test: usize,
        xlimits: (f64, f64),
        noise_std: f64,
        rng: &mut R,
    ) -> Result<Self> {
        let (xmin, xmax) = xlimits;
        ensure!(
            xmin.is_finite() && xmax.is_finite() && xmin < xmax,
            "invalid input range [{xmin}, {xmax}]"
        );
        ensure!(n_train > 0, "at least one training point is required");
        ensure!(
            noise_std.is_finite() && noise_std >= 0.,
            "noise standard deviation should be finite and non negative, got {noise_std}"
        );

        let x_train = Array::random_using(n_train, Uniform::new(xmin, xmax), rng);
        let noise = Array::random_using(n_train, Normal::new(0., noise_std)?, rng);
        let y_train = x_train.mapv(reference) + noise;
        let x_test = Array::linspace(xmin, xmax, n_test);
        Ok(SyntheticData {
            x_train,
            y_train,
            x_test,
        })
    }
}
