//! Fit-then-predict entry point working on plain one-dimensional sequences.
use crate::algorithm::{check_training_data, GaussianProcess};
use crate::errors::{GpError, Result};
use crate::kernels::Matern32Kernel;
use crate::parameters::GpParams;

use linfa::prelude::{Dataset, Fit};
use ndarray::{Array1, ArrayView1, Axis};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Result of [`fit_predict`]: fitted hyperparameters and predictions at test points
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct GpOutput {
    /// Fitted kernel length scale
    pub length_scale: f64,
    /// Fitted kernel signal standard deviation
    pub sigma_f: f64,
    /// Negative log marginal likelihood with fitted hyperparameters
    pub nll: f64,
    /// Predictive mean, one value per test point
    pub mean: Array1<f64>,
    /// Predictive standard deviation, one value per test point
    pub std: Array1<f64>,
}

/// Fit a matern 3/2 GP to one-dimensional observations `y_train` at `x_train`
/// with a given observation noise, then predict mean and standard deviation at `x_test`.
///
/// Hyperparameters are optimized with default settings, see [`fit_predict_with`].
pub fn fit_predict(
    x_train: &[f64],
    y_train: &[f64],
    x_test: &[f64],
    noise_std: f64,
) -> Result<GpOutput> {
    fit_predict_with(
        GaussianProcess::<f64, Matern32Kernel>::matern32(noise_std),
        x_train,
        y_train,
        x_test,
    )
}

/// Same as [`fit_predict`] with given GP parameters
pub fn fit_predict_with(
    params: GpParams<f64, Matern32Kernel>,
    x_train: &[f64],
    y_train: &[f64],
    x_test: &[f64],
) -> Result<GpOutput> {
    let xt = ArrayView1::from(x_train).insert_axis(Axis(1));
    let yt = ArrayView1::from(y_train);
    // invalid input is reported before any computation
    check_training_data(&xt, &yt)?;
    if x_test.iter().any(|v| !v.is_finite()) {
        return Err(GpError::InvalidValueError(
            "Test points should only contain finite values".to_string(),
        ));
    }

    let gp = params.fit(&Dataset::new(xt.to_owned(), yt.to_owned()))?;
    let xs = ArrayView1::from(x_test).insert_axis(Axis(1));
    let (mean, std) = gp.predict_valstd(&xs)?;
    let hyper = gp.hyperparameters();
    Ok(GpOutput {
        length_scale: hyper.length_scale(),
        sigma_f: hyper.sigma_f(),
        nll: gp.nll(),
        mean,
        std,
    })
}
