use crate::covariance::CovarianceBuilder;
use crate::errors::{GpError, Result};
use crate::hyperparameters::{HyperTuning, Hyperparameters};
use crate::kernels::{CovarianceKernel, Matern32Kernel};
use crate::likelihood::MarginalLikelihood;
use crate::optimization::{
    optimize_hyperparameters, Algorithm, CobylaMinimizer, SlsqpMinimizer,
};
use crate::parameters::{GpParams, GpValidParams};
use crate::utils::DistanceMatrix;

use linfa::prelude::{DatasetBase, Fit, Float, PredictInplace};
use linfa_linalg::{cholesky::*, triangular::*};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

use log::{debug, info, warn};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Default number of additional random starting points for hyperparameters optimization
pub const GP_OPTIM_N_START: usize = 0;
/// Minimum of function evaluations for hyperparameters optimization
pub const GP_MIN_EVAL: usize = 25;
/// Default maximum of function evaluations for hyperparameters optimization
pub const GP_MAX_EVAL: usize = 200;
/// Default observation noise standard deviation
pub const GP_DEFAULT_NOISE_STD: f64 = 0.1;
/// Default seed of the multistart random generator
pub const GP_DEFAULT_SEED: u64 = 42;

/// Internal parameters computed by GP training
/// used later on in prediction computations
#[derive(Default, Debug, Clone)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(deserialize = "F: Deserialize<'de>"))
)]
pub(crate) struct GpInnerParams<F: Float> {
    /// Inverse of the training covariance matrix \[K\]
    k_inv: Array2<F>,
    /// Gaussian process weights \[K\]^-1.y
    alpha: Array2<F>,
}

impl<F: Float> GpInnerParams<F> {
    /// Factorize the training covariance built with `builder` from training points `distances`
    /// and compute prediction weights given training outputs `y` (n, 1)
    fn new<K: CovarianceKernel<F>>(
        builder: &CovarianceBuilder<F, K>,
        distances: &DistanceMatrix<F>,
        y: &Array2<F>,
    ) -> Result<Self> {
        let k = builder.training_from_distances(distances);
        // K cholesky decomposition
        let k_chol = k.cholesky()?;
        // K^-1 = L^-t.L^-1
        let l_inv = k_chol.solve_triangular(&Array2::eye(distances.n_obs), UPLO::Lower)?;
        let k_inv = k_chol.t().solve_triangular_into(l_inv, UPLO::Upper)?;
        let alpha = k_inv.dot(y);
        Ok(GpInnerParams { k_inv, alpha })
    }
}

/// A GP regression models the observed outputs as a realization
/// of a zero mean gaussian process plus an independent gaussian observation noise:
///
/// `y = f(x) + e` where `f ~ GP(0, k(x, x'))` and `e ~ Normal(0, noise_std^2)`
///
/// where `k` is a stationary covariance kernel (matern 3/2) governed by
/// a length scale `l` and a signal standard deviation `sigma_f`.
///
/// # Implementation
///
/// * Based on [ndarray](https://github.com/rust-ndarray/ndarray)
///   and [linfa](https://github.com/rust-ml/linfa)
/// * Kernel hyperparameters are estimated by minimizing the negative log marginal likelihood
///   in log-space within bounds, `noise_std` is given and not estimated.
/// * Predictions use the standard gaussian conditioning formulas:
///   mean is `K_s^t.K^-1.y` and covariance is `K_ss - K_s^t.K^-1.K_s`
/// * GP models can be saved and loaded using [serde](https://serde.rs/).
///   See `serializable` feature section below.
///
/// # Features
///
/// ## serializable
///
/// The `serializable` feature enables the serialization of GP models using the [`serde crate`](https://serde.rs/).
///
/// # Example
///
/// ```no_run
/// use gpfit_gp::{GaussianProcess, Matern32Kernel};
/// use linfa::prelude::*;
/// use ndarray::{arr2, Array, Axis};
///
/// // training data
/// let xt = arr2(&[[-4.0], [-2.5], [-1.0], [0.5], [2.0], [3.5]]);
/// let yt = xt.column(0).mapv(f64::sin);
///
/// // GP with matern 3/2 kernel and observation noise std 0.1
/// let gp = GaussianProcess::<f64, Matern32Kernel>::matern32(0.1)
///     .fit(&Dataset::new(xt, yt))
///     .expect("GP trained");
///
/// // Use trained model for making predictions
/// let xtest = Array::linspace(-5., 5., 50).insert_axis(Axis(1));
/// let (mean, std) = gp.predict_valstd(&xtest).expect("GP prediction");
///```
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize, K: Serialize",
        deserialize = "F: Deserialize<'de>, K: Deserialize<'de>"
    ))
)]
pub struct GaussianProcess<F: Float, K: CovarianceKernel<F>> {
    /// Kernel hyperparameters (result from internal optimization or given)
    hyper: Hyperparameters<F>,
    /// Negative log marginal likelihood value with fitted hyperparameters
    nll: F,
    /// Gaussian process internal fitted params
    inner_params: GpInnerParams<F>,
    /// Training dataset (input, output)
    pub(crate) training_data: (Array2<F>, Array1<F>),
    /// Parameters used to fit this model
    pub(crate) params: GpValidParams<F, K>,
}

impl<F: Float, K: CovarianceKernel<F>> fmt::Display for GaussianProcess<F, K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "GP(kernel={}, {}, noise_std={}, nll={})",
            self.params.kernel, self.hyper, self.params.noise_std, self.nll,
        )
    }
}

impl<F: Float> GaussianProcess<F, Matern32Kernel> {
    /// Gp parameters constructor with a matern 3/2 kernel and given observation noise
    pub fn matern32(noise_std: F) -> GpParams<F, Matern32Kernel> {
        GpParams::<F, Matern32Kernel>::matern32(noise_std)
    }
}

impl<F: Float, K: CovarianceKernel<F>> GaussianProcess<F, K> {
    /// Gp parameters constructor
    pub fn params<NewKern: CovarianceKernel<F>>(kernel: NewKern) -> GpParams<F, NewKern> {
        GpParams::new(kernel)
    }

    /// Covariance kernel
    pub fn kernel(&self) -> &K {
        &self.params.kernel
    }

    /// Kernel hyperparameters `(l, sigma_f)`
    pub fn hyperparameters(&self) -> &Hyperparameters<F> {
        &self.hyper
    }

    /// Negative log marginal likelihood of the training data with fitted hyperparameters
    pub fn nll(&self) -> F {
        self.nll
    }

    /// Observation noise standard deviation
    pub fn noise_std(&self) -> F {
        self.params.noise_std
    }

    /// Training data `(x, y)`
    pub fn training_data(&self) -> &(Array2<F>, Array1<F>) {
        &self.training_data
    }

    /// Parameters used to fit this model
    pub fn params_used(&self) -> &GpValidParams<F, K> {
        &self.params
    }

    fn builder(&self) -> CovarianceBuilder<F, K> {
        CovarianceBuilder::new(&self.params.kernel, self.hyper, self.params.noise_std)
    }

    fn check_input(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<()> {
        let nx = self.training_data.0.ncols();
        if x.ncols() != nx {
            return Err(GpError::InvalidValueError(format!(
                "Prediction points should have {nx} components, got {}",
                x.ncols()
            )));
        }
        Ok(())
    }

    /// Predict mean values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n scalar output values as a vector (n,).
    pub fn predict(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.check_input(x)?;
        let ks = self.builder().cross(&self.training_data.0, x);
        Ok(ks.t().dot(&self.inner_params.alpha).remove_axis(Axis(1)))
    }

    /// Predict variance values at n given `x` points of nx components specified as a (n, nx) matrix.
    /// Returns n variance values as (n,) column vector.
    pub fn predict_var(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        self.check_input(x)?;
        let builder = self.builder();
        let ks = builder.cross(&self.training_data.0, x);
        Ok(self.compute_var(&builder, x, &ks))
    }

    /// Predict standard deviation values at n given `x` points specified as a (n, nx) matrix.
    pub fn predict_std(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array1<F>> {
        Ok(self.predict_var(x)?.mapv(|v| v.sqrt()))
    }

    /// Predict both mean values and standard deviations at n given `x` points of nx components
    pub fn predict_valstd(
        &self,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    ) -> Result<(Array1<F>, Array1<F>)> {
        self.check_input(x)?;
        let builder = self.builder();
        let ks = builder.cross(&self.training_data.0, x);
        let mean = ks.t().dot(&self.inner_params.alpha).remove_axis(Axis(1));
        let std = self.compute_var(&builder, x, &ks).mapv(|v| v.sqrt());
        Ok((mean, std))
    }

    /// Predict the full covariance matrix (n, n) at n given `x` points specified as a (n, nx) matrix.
    ///
    /// Diagonal values are the unclamped variances: they may be slightly negative
    /// due to floating point cancellation.
    pub fn predict_cov(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        self.check_input(x)?;
        let builder = self.builder();
        let ks = builder.cross(&self.training_data.0, x);
        let kss = builder.test(x);
        Ok(kss - ks.t().dot(&self.inner_params.k_inv.dot(&ks)))
    }

    /// Variances `diag(K_ss) - diag(K_s^t.K^-1.K_s)` given cross covariance `ks`
    fn compute_var(
        &self,
        builder: &CovarianceBuilder<F, K>,
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        ks: &Array2<F>,
    ) -> Array1<F> {
        let v = self.inner_params.k_inv.dot(ks);
        let var = builder.test_variance(x) - (ks * &v).sum_axis(Axis(0));
        // Variance might be slightly negative depending on
        // machine precision: set to zero in that case
        var.mapv(|v| if v < F::zero() { F::zero() } else { v })
    }
}

impl<F, D, K> PredictInplace<ArrayBase<D, Ix2>, Array1<F>> for GaussianProcess<F, K>
where
    F: Float,
    D: Data<Elem = F>,
    K: CovarianceKernel<F>,
{
    fn predict_inplace(&self, x: &ArrayBase<D, Ix2>, y: &mut Array1<F>) {
        assert_eq!(
            x.nrows(),
            y.len(),
            "The number of data points must match the number of output targets."
        );

        let values = self.predict(x).expect("GP Prediction");
        *y = values;
    }

    fn default_target(&self, x: &ArrayBase<D, Ix2>) -> Array1<F> {
        Array1::zeros((x.nrows(),))
    }
}

/// Check training data: non empty, same number of points and outputs, finite values
pub(crate) fn check_training_data<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix1>,
) -> Result<()> {
    if x.nrows() == 0 {
        return Err(GpError::InvalidValueError(
            "Training set should not be empty".to_string(),
        ));
    }
    if x.nrows() != y.len() {
        return Err(GpError::InvalidValueError(format!(
            "Training points ({}) and observations ({}) should have the same length",
            x.nrows(),
            y.len()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(GpError::InvalidValueError(
            "Training data should only contain finite values".to_string(),
        ));
    }
    Ok(())
}

impl<F: Float, K: CovarianceKernel<F>, D: Data<Elem = F>>
    Fit<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>, GpError> for GpValidParams<F, K>
{
    type Object = GaussianProcess<F, K>;

    /// Fit GP hyperparameters using maximum likelihood
    fn fit(
        &self,
        dataset: &DatasetBase<ArrayBase<D, Ix2>, ArrayBase<D, Ix1>>,
    ) -> Result<Self::Object> {
        let x = dataset.records();
        let y = dataset.targets();
        check_training_data(x, y)?;

        let likelihood = MarginalLikelihood::new(self.kernel(), x, y, self.noise_std());
        if likelihood.distances().min_distance() == Some(F::zero()) {
            warn!("Multiple training points have the same input value (at least same row twice).");
        }

        let hyper = match self.hyper_tuning() {
            HyperTuning::Fixed(hyper) => {
                // Easy path no optimization
                *hyper
            }
            HyperTuning::Optimized { init, log_bounds } => {
                let mut rng = Xoshiro256Plus::seed_from_u64(self.seed());
                let now = Instant::now();
                let hyper = match self.algorithm() {
                    Algorithm::Slsqp => optimize_hyperparameters(
                        &likelihood,
                        init,
                        log_bounds,
                        self.n_start(),
                        &SlsqpMinimizer {
                            maxeval: self.max_eval(),
                            ..SlsqpMinimizer::default()
                        },
                        &mut rng,
                    ),
                    Algorithm::Cobyla => optimize_hyperparameters(
                        &likelihood,
                        init,
                        log_bounds,
                        self.n_start(),
                        &CobylaMinimizer {
                            maxeval: self.max_eval(),
                            ..CobylaMinimizer::default()
                        },
                        &mut rng,
                    ),
                };
                debug!(
                    "{} optimization done in {}ms",
                    self.algorithm(),
                    now.elapsed().as_millis()
                );
                hyper
            }
        };
        let nll = likelihood.nll(&hyper)?;
        info!("GP fitted with {hyper} (nll={nll})");

        let builder = CovarianceBuilder::new(self.kernel(), hyper, self.noise_std());
        let yt = y.to_owned().insert_axis(Axis(1));
        let inner_params = GpInnerParams::new(&builder, likelihood.distances(), &yt)?;
        Ok(GaussianProcess {
            hyper,
            nll,
            inner_params,
            training_data: (x.to_owned(), y.to_owned()),
            params: self.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use linfa::prelude::{Dataset, ParamGuard};
    use ndarray::{array, Array};
    use ndarray_rand::rand_distr::Uniform;
    use ndarray_rand::RandomExt;

    fn three_points() -> (Array2<f64>, Array1<f64>) {
        (array![[-2.], [0.], [2.]], array![-1., 0., 1.])
    }

    #[test]
    fn test_conditioning_reference_values() {
        let (xt, yt) = three_points();
        let gp = GaussianProcess::<f64, Matern32Kernel>::matern32(0.1)
            .hyper_tuning(HyperTuning::Fixed(Hyperparameters::default()))
            .fit(&Dataset::new(xt, yt))
            .expect("GP fit error");

        let xtest = array![[0.], [1.], [-0.5], [3.]];
        let (mean, std) = gp.predict_valstd(&xtest).expect("GP prediction error");
        assert_abs_diff_eq!(
            array![0., 0.4480443272548827, -0.19714074982900404, 0.48061036338758395],
            mean,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            array![
                0.09948407097296774,
                0.7699411777462758,
                0.6026014259227155,
                0.8761290533744291
            ],
            std,
            epsilon = 1e-10
        );
        let var = gp.predict_var(&xtest).expect("GP prediction error");
        assert_abs_diff_eq!(0.009897080377354484, var[0], epsilon = 1e-12);
        assert_abs_diff_eq!(3.7501199935803466, gp.nll(), epsilon = 1e-10);
        assert_abs_diff_eq!(mean, gp.predict(&xtest).unwrap(), epsilon = 1e-14);
    }

    #[test]
    fn test_predict_cov() {
        let (xt, yt) = three_points();
        let gp = GaussianProcess::<f64, Matern32Kernel>::matern32(0.1)
            .fit(&Dataset::new(xt, yt))
            .expect("GP fit error");
        let xtest = Array::linspace(-3., 3., 13).insert_axis(Axis(1));
        let cov = gp.predict_cov(&xtest).expect("GP prediction error");
        assert_eq!((13, 13), cov.dim());
        assert_abs_diff_eq!(cov, cov.t(), epsilon = 1e-12);
        let var = gp.predict_var(&xtest).expect("GP prediction error");
        assert_abs_diff_eq!(
            cov.diag().mapv(|v| v.max(0.)),
            var,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_negative_variance_is_clamped() {
        let (xt, yt) = three_points();
        let mut gp = GaussianProcess::<f64, Matern32Kernel>::matern32(0.1)
            .hyper_tuning(HyperTuning::Fixed(Hyperparameters::default()))
            .fit(&Dataset::new(xt, yt))
            .expect("GP fit error");
        // inverse inflated as by round off errors of an ill conditioned covariance
        gp.inner_params.k_inv.mapv_inplace(|v| 2. * v);

        let xtest = array![[0.], [10.]];
        let cov = gp.predict_cov(&xtest).expect("GP prediction error");
        assert!(cov[[0, 0]] < -0.5);
        assert!(cov[[1, 1]] > 0.);

        let var = gp.predict_var(&xtest).expect("GP prediction error");
        assert_eq!(0., var[0]);
        assert_abs_diff_eq!(cov[[1, 1]], var[1], epsilon = 1e-14);
        let std = gp.predict_std(&xtest).expect("GP prediction error");
        assert_eq!(0., std[0]);
        let (_, std) = gp.predict_valstd(&xtest).expect("GP prediction error");
        assert!(std.iter().all(|v| v.is_finite() && *v >= 0.));
        assert_eq!(0., std[0]);
    }

    #[test]
    fn test_interpolation_near_data() {
        let xt = array![[-3.], [-1.], [0.5], [2.], [4.]];
        let yt = xt.column(0).mapv(|v: f64| v.sin());
        let gp = GaussianProcess::<f64, Matern32Kernel>::matern32(1e-6)
            .hyper_tuning(HyperTuning::Fixed(Hyperparameters::new(1.5, 1.).unwrap()))
            .fit(&Dataset::new(xt.clone(), yt.clone()))
            .expect("GP fit error");
        let (mean, std) = gp.predict_valstd(&xt).expect("GP prediction error");
        assert_abs_diff_eq!(yt, mean, epsilon = 1e-6);
        assert_abs_diff_eq!(Array1::<f64>::zeros(5), std, epsilon = 1e-4);
    }

    #[test]
    fn test_optimized_fit() {
        let xt = Array::random_using(
            (10, 1),
            Uniform::new(-5., 5.),
            &mut Xoshiro256Plus::seed_from_u64(42),
        );
        let yt = xt.column(0).mapv(|v: f64| v.sin());
        let init = Hyperparameters::default();
        let kernel = Matern32Kernel::default();
        let lkh = MarginalLikelihood::new(&kernel, &xt, &yt, 0.1);
        for algorithm in [Algorithm::Slsqp, Algorithm::Cobyla] {
            let gp = GaussianProcess::<f64, Matern32Kernel>::matern32(0.1)
                .algorithm(algorithm)
                .fit(&Dataset::new(xt.clone(), yt.clone()))
                .expect("GP fit error");
            let hyper = gp.hyperparameters();
            let (lo, up) = ((-5f64).exp() - 1e-12, 5f64.exp() + 1e-9);
            assert!(lo <= hyper.length_scale() && hyper.length_scale() <= up);
            assert!(lo <= hyper.sigma_f() && hyper.sigma_f() <= up);

            assert!(gp.nll() < lkh.nll(&init).unwrap());

            let xtest = Array::linspace(-6., 6., 100).insert_axis(Axis(1));
            let std = gp.predict_std(&xtest).expect("GP prediction error");
            assert!(std.iter().all(|v| *v >= 0.));
        }
    }

    #[test]
    fn test_fixed_hyperparameters() {
        let xt = array![[0.0], [1.0], [2.0], [3.0], [4.0]];
        let yt = array![0.0, 1.0, 1.5, 0.9, 1.0];
        let expected = Hyperparameters::new(0.8, 1.3).unwrap();
        let gp = GaussianProcess::<f64, Matern32Kernel>::matern32(0.1)
            .hyper_tuning(HyperTuning::Fixed(expected))
            .fit(&Dataset::new(xt, yt))
            .expect("GP fit error");
        assert_eq!(&expected, gp.hyperparameters());
        assert_eq!(HyperTuning::Fixed(expected), *gp.params_used().hyper_tuning());
    }

    #[test]
    fn test_multistart_is_reproducible() {
        let (xt, yt) = three_points();
        let params = GaussianProcess::<f64, Matern32Kernel>::matern32(0.1).n_start(4).seed(7);
        let gp1 = params
            .clone()
            .fit(&Dataset::new(xt.clone(), yt.clone()))
            .expect("GP fit error");
        let gp2 = params
            .fit(&Dataset::new(xt, yt))
            .expect("GP fit error");
        assert_eq!(gp1.hyperparameters(), gp2.hyperparameters());
    }

    #[test]
    fn test_duplicated_points() {
        let xt = array![[0.], [0.], [1.], [2.]];
        let yt = array![0.1, -0.1, 0.8, 0.9];
        let gp = GaussianProcess::<f64, Matern32Kernel>::matern32(0.1)
            .fit(&Dataset::new(xt, yt))
            .expect("GP fit error");
        let std = gp.predict_std(&array![[0.], [1.5]]).unwrap();
        assert!(std.iter().all(|v| v.is_finite() && *v >= 0.));
    }

    #[test]
    fn test_invalid_training_data() {
        let params = GaussianProcess::<f64, Matern32Kernel>::matern32(0.1).check().unwrap();
        let empty = Dataset::new(Array2::<f64>::zeros((0, 1)), Array1::<f64>::zeros(0));
        assert!(matches!(
            params.fit(&empty),
            Err(GpError::InvalidValueError(_))
        ));
        let nan = Dataset::new(array![[0.], [1.]], array![0., f64::NAN]);
        assert!(matches!(
            params.fit(&nan),
            Err(GpError::InvalidValueError(_))
        ));
        assert!(check_training_data(&array![[0.], [1.]], &array![0.]).is_err());
    }

    #[test]
    fn test_invalid_prediction_points() {
        let (xt, yt) = three_points();
        let gp = GaussianProcess::<f64, Matern32Kernel>::matern32(0.1)
            .fit(&Dataset::new(xt, yt))
            .expect("GP fit error");
        assert!(gp.predict(&array![[0., 1.]]).is_err());
    }

    #[test]
    fn test_predict_inplace_and_display() {
        let (xt, yt) = three_points();
        let gp = GaussianProcess::<f64, Matern32Kernel>::matern32(0.1)
            .hyper_tuning(HyperTuning::Fixed(Hyperparameters::default()))
            .fit(&Dataset::new(xt, yt))
            .expect("GP fit error");
        let xtest = array![[1.]];
        let mut y = Array1::<f64>::zeros(1);
        gp.predict_inplace(&xtest, &mut y);
        assert_abs_diff_eq!(0.4480443272548827, y[0], epsilon = 1e-12);
        assert!(gp
            .to_string()
            .starts_with("GP(kernel=Matern32, length_scale=1, sigma_f=1, noise_std=0.1, nll=3.75"));
    }
}
