use crate::errors::{GpError, Result};
use crate::hyperparameters::{HyperTuning, Hyperparameters};
use crate::kernels::{CovarianceKernel, Matern32Kernel};
use crate::optimization::Algorithm;
use crate::{GP_DEFAULT_NOISE_STD, GP_DEFAULT_SEED, GP_MAX_EVAL, GP_MIN_EVAL, GP_OPTIM_N_START};
use linfa::{Float, ParamGuard};

#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// A set of validated GP parameters.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serializable",
    derive(Serialize, Deserialize),
    serde(bound(
        serialize = "F: Serialize, Kern: Serialize",
        deserialize = "F: Deserialize<'de>, Kern: Deserialize<'de>"
    ))
)]
pub struct GpValidParams<F: Float, Kern: CovarianceKernel<F>> {
    /// Covariance kernel of the GP prior
    pub(crate) kernel: Kern,
    /// Standard deviation of the observation noise, not optimized
    pub(crate) noise_std: F,
    /// Hyperparameters tuning hint of the kernel
    pub(crate) hyper_tuning: HyperTuning<F>,
    /// Number of additional random starting points of the likelihood optimization
    pub(crate) n_start: usize,
    /// Max number of internal likelihood evaluation during one optimization
    pub(crate) max_eval: usize,
    /// Optimizer used to minimize the negative log likelihood
    pub(crate) algorithm: Algorithm,
    /// Seed of the random generator drawing multistart points
    pub(crate) seed: u64,
}

impl<F: Float, Kern: CovarianceKernel<F>> Default for GpValidParams<F, Kern> {
    fn default() -> GpValidParams<F, Kern> {
        GpValidParams {
            kernel: Kern::default(),
            noise_std: F::cast(GP_DEFAULT_NOISE_STD),
            hyper_tuning: HyperTuning::default(),
            n_start: GP_OPTIM_N_START,
            max_eval: GP_MAX_EVAL,
            algorithm: Algorithm::default(),
            seed: GP_DEFAULT_SEED,
        }
    }
}

impl<F: Float, Kern: CovarianceKernel<F>> GpValidParams<F, Kern> {
    /// Get covariance kernel
    pub fn kernel(&self) -> &Kern {
        &self.kernel
    }

    /// Get observation noise standard deviation
    pub fn noise_std(&self) -> F {
        self.noise_std
    }

    /// Get hyperparameters tuning
    pub fn hyper_tuning(&self) -> &HyperTuning<F> {
        &self.hyper_tuning
    }

    /// Get the number of additional optimization starting points
    pub fn n_start(&self) -> usize {
        self.n_start
    }

    /// Get the max number of internal likelihood evaluations during one optimization
    pub fn max_eval(&self) -> usize {
        self.max_eval
    }

    /// Get the optimization algorithm
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Get the multistart random generator seed
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

#[derive(Clone, Debug)]
/// The set of parameters that can be specified for the execution of
/// the [GP algorithm](struct.GaussianProcess.html).
pub struct GpParams<F: Float, Kern: CovarianceKernel<F>>(GpValidParams<F, Kern>);

impl<F: Float> GpParams<F, Matern32Kernel> {
    /// A constructor for GP parameters with a Matern 3/2 kernel and the given noise
    pub fn matern32(noise_std: F) -> Self {
        GpParams::new(Matern32Kernel::default()).noise_std(noise_std)
    }
}

impl<F: Float, Kern: CovarianceKernel<F>> GpParams<F, Kern> {
    /// A constructor for GP parameters given a covariance kernel
    pub fn new(kernel: Kern) -> GpParams<F, Kern> {
        Self(GpValidParams {
            kernel,
            ..Default::default()
        })
    }

    /// Set covariance kernel.
    pub fn kernel(mut self, kernel: Kern) -> Self {
        self.0.kernel = kernel;
        self
    }

    /// Set the observation noise standard deviation, should be strictly positive
    pub fn noise_std(mut self, noise_std: F) -> Self {
        self.0.noise_std = noise_std;
        self
    }

    /// Set initial hyperparameters.
    ///
    /// When hyperparameters are optimized, the internal optimization is started from `init`.
    /// When hyperparameters are fixed, this set their constant value.
    pub fn hyper_init(mut self, init: Hyperparameters<F>) -> Self {
        self.0.hyper_tuning = match self.0.hyper_tuning {
            HyperTuning::Optimized {
                init: _,
                log_bounds,
            } => HyperTuning::Optimized { init, log_bounds },
            HyperTuning::Fixed(_) => HyperTuning::Fixed(init),
        };
        self
    }

    /// Set log hyperparameters search space as `[(lo, up) of ln(l), (lo, up) of ln(sigma_f)]`.
    ///
    /// This function is no-op when hyperparameters are fixed
    pub fn hyper_log_bounds(mut self, log_bounds: [(F, F); 2]) -> Self {
        self.0.hyper_tuning = match self.0.hyper_tuning {
            HyperTuning::Optimized {
                init,
                log_bounds: _,
            } => HyperTuning::Optimized { init, log_bounds },
            HyperTuning::Fixed(f) => HyperTuning::Fixed(f),
        };
        self
    }

    /// Set hyperparameters tuning
    pub fn hyper_tuning(mut self, hyper_tuning: HyperTuning<F>) -> Self {
        self.0.hyper_tuning = hyper_tuning;
        self
    }

    /// Set the number of additional random starting points of the likelihood optimization
    pub fn n_start(mut self, n_start: usize) -> Self {
        self.0.n_start = n_start;
        self
    }

    /// Set the max number of internal likelihood evaluations during one optimization
    /// Given max_eval is set to at least [crate::GP_MIN_EVAL].
    pub fn max_eval(mut self, max_eval: usize) -> Self {
        self.0.max_eval = GP_MIN_EVAL.max(max_eval);
        self
    }

    /// Set the optimization algorithm
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.0.algorithm = algorithm;
        self
    }

    /// Set the seed of the random generator drawing multistart points
    pub fn seed(mut self, seed: u64) -> Self {
        self.0.seed = seed;
        self
    }
}

impl<F: Float, Kern: CovarianceKernel<F>> ParamGuard for GpParams<F, Kern> {
    type Checked = GpValidParams<F, Kern>;
    type Error = GpError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        let noise_std = self.0.noise_std;
        if !(noise_std.is_finite() && noise_std > F::zero()) {
            return Err(GpError::InvalidValueError(format!(
                "`noise_std` should be strictly positive and finite, got {noise_std}"
            )));
        }
        let init = self.0.hyper_tuning.init();
        Hyperparameters::new(init.length_scale(), init.sigma_f())?;
        if let Some(log_bounds) = self.0.hyper_tuning.log_bounds() {
            for (lo, up) in log_bounds.iter() {
                if !(lo.is_finite() && up.is_finite() && lo < up) {
                    return Err(GpError::InvalidValueError(format!(
                        "Log bounds should be finite with lower < upper, got ({lo}, {up})"
                    )));
                }
            }
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = GpParams::<f64, Matern32Kernel>::matern32(0.1).check().unwrap();
        assert_eq!(0.1, params.noise_std());
        assert_eq!(&HyperTuning::default(), params.hyper_tuning());
        assert_eq!(GP_OPTIM_N_START, params.n_start());
        assert_eq!(GP_MAX_EVAL, params.max_eval());
        assert_eq!(Algorithm::Slsqp, params.algorithm());
    }

    #[test]
    fn test_builder() {
        let init = Hyperparameters::new(2., 0.5).unwrap();
        let params = GpParams::<f64, Matern32Kernel>::matern32(0.2)
            .hyper_init(init)
            .hyper_log_bounds([(-1., 1.), (-2., 2.)])
            .n_start(4)
            .max_eval(3)
            .algorithm(Algorithm::Cobyla)
            .seed(7)
            .check()
            .unwrap();
        assert_eq!(
            &HyperTuning::Optimized {
                init,
                log_bounds: [(-1., 1.), (-2., 2.)]
            },
            params.hyper_tuning()
        );
        assert_eq!(4, params.n_start());
        assert_eq!(GP_MIN_EVAL, params.max_eval());
        assert_eq!(Algorithm::Cobyla, params.algorithm());
        assert_eq!(7, params.seed());

        let fixed = GpParams::<f64, Matern32Kernel>::matern32(0.2)
            .hyper_tuning(HyperTuning::Fixed(init))
            .hyper_log_bounds([(-1., 1.), (-2., 2.)])
            .check()
            .unwrap();
        assert_eq!(&HyperTuning::Fixed(init), fixed.hyper_tuning());
    }

    #[test]
    fn test_invalid_params() {
        assert!(GpParams::<f64, Matern32Kernel>::matern32(0.).check().is_err());
        assert!(GpParams::<f64, Matern32Kernel>::matern32(-0.1).check().is_err());
        assert!(GpParams::<f64, Matern32Kernel>::matern32(f64::NAN).check().is_err());
        assert!(GpParams::<f64, Matern32Kernel>::matern32(0.1)
            .hyper_log_bounds([(1., -1.), (-5., 5.)])
            .check()
            .is_err());
        assert!(GpParams::<f64, Matern32Kernel>::matern32(0.1)
            .hyper_log_bounds([(-5., 5.), (f64::NEG_INFINITY, 5.)])
            .check()
            .is_err());
    }
}
