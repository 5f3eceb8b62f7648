//! Kernel hyperparameters and how they are tuned.
use crate::errors::{GpError, Result};
use linfa::Float;
use ndarray::{array, Array1};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hyperparameters of a stationary kernel: the length scale `l`
/// and the signal standard deviation `sigma_f`.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Hyperparameters<F: Float> {
    length_scale: F,
    sigma_f: F,
}

impl<F: Float> Hyperparameters<F> {
    /// Constructor, both values have to be strictly positive and finite
    pub fn new(length_scale: F, sigma_f: F) -> Result<Self> {
        for (name, v) in [("length_scale", length_scale), ("sigma_f", sigma_f)] {
            if !(v.is_finite() && v > F::zero()) {
                return Err(GpError::InvalidValueError(format!(
                    "{name} should be strictly positive and finite, got {v}"
                )));
            }
        }
        Ok(Hyperparameters {
            length_scale,
            sigma_f,
        })
    }

    /// Build hyperparameters from their log-space representation `[ln(l), ln(sigma_f)]`.
    ///
    /// **Panics** if `theta` has not exactly 2 components.
    pub fn from_log(theta: &[F]) -> Self {
        assert_eq!(theta.len(), 2, "log hyperparameters should be [ln(l), ln(sigma_f)]");
        Hyperparameters {
            length_scale: theta[0].exp(),
            sigma_f: theta[1].exp(),
        }
    }

    /// Log-space representation `[ln(l), ln(sigma_f)]`
    pub fn to_log(&self) -> Array1<F> {
        array![self.length_scale.ln(), self.sigma_f.ln()]
    }

    /// Length scale `l`
    pub fn length_scale(&self) -> F {
        self.length_scale
    }

    /// Signal standard deviation `sigma_f`
    pub fn sigma_f(&self) -> F {
        self.sigma_f
    }

    /// Signal variance `sigma_f^2`
    pub fn signal_variance(&self) -> F {
        self.sigma_f * self.sigma_f
    }
}

impl<F: Float> Default for Hyperparameters<F> {
    fn default() -> Self {
        Hyperparameters {
            length_scale: F::one(),
            sigma_f: F::one(),
        }
    }
}

impl<F: Float> fmt::Display for Hyperparameters<F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "length_scale={}, sigma_f={}",
            self.length_scale, self.sigma_f
        )
    }
}

/// An enum to represent how kernel hyperparameters are obtained
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum HyperTuning<F: Float> {
    /// Constant hyperparameters (ie given not estimated)
    Fixed(Hyperparameters<F>),
    /// Hyperparameters are optimized in log-space between given bounds
    /// starting from the initial guess
    Optimized {
        /// Initial guess
        init: Hyperparameters<F>,
        /// Bounds (lower, upper) of `[ln(l), ln(sigma_f)]`
        log_bounds: [(F, F); 2],
    },
}

impl<F: Float> Default for HyperTuning<F> {
    fn default() -> Self {
        let (lo, up) = HyperTuning::<F>::DEFAULT_LOG_BOUNDS;
        HyperTuning::Optimized {
            init: Hyperparameters::default(),
            log_bounds: [(F::cast(lo), F::cast(up)); 2],
        }
    }
}

impl<F: Float> HyperTuning<F> {
    /// Default bounds for log hyperparameters values
    pub const DEFAULT_LOG_BOUNDS: (f64, f64) = (-5., 5.);

    /// Get initial hyperparameters value
    pub fn init(&self) -> &Hyperparameters<F> {
        match self {
            HyperTuning::Optimized {
                init,
                log_bounds: _,
            } => init,
            HyperTuning::Fixed(init) => init,
        }
    }

    /// Get log bounds, `None` when hyperparameters are fixed
    pub fn log_bounds(&self) -> Option<&[(F, F); 2]> {
        match self {
            HyperTuning::Optimized {
                init: _,
                log_bounds,
            } => Some(log_bounds),
            HyperTuning::Fixed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_log_round_trip() {
        let hyper = Hyperparameters::new(2.5, 0.3).unwrap();
        let back = Hyperparameters::from_log(hyper.to_log().as_slice().unwrap());
        assert_abs_diff_eq!(2.5, back.length_scale(), epsilon = 1e-12);
        assert_abs_diff_eq!(0.3, back.sigma_f(), epsilon = 1e-12);
        assert_abs_diff_eq!(0.09, back.signal_variance(), epsilon = 1e-12);
    }

    #[test]
    fn test_default_is_log_origin() {
        let tuning = HyperTuning::<f64>::default();
        assert_eq!(array![0., 0.], tuning.init().to_log());
        assert_eq!(Some(&[(-5., 5.), (-5., 5.)]), tuning.log_bounds());
    }

    #[test]
    fn test_invalid_hyperparameters() {
        assert!(Hyperparameters::new(0., 1.).is_err());
        assert!(Hyperparameters::new(1., -1.).is_err());
        assert!(Hyperparameters::new(f64::NAN, 1.).is_err());
        assert!(Hyperparameters::new(1., f64::INFINITY).is_err());
    }
}
