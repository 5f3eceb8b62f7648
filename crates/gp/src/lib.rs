//! This library implements [Gaussian Process](https://en.wikipedia.org/wiki/Gaussian_process) regression
//! of scattered observations with a [Matern 3/2](https://en.wikipedia.org/wiki/Mat%C3%A9rn_covariance_function)
//! covariance kernel and a given observation noise.
//!
//! Kernel hyperparameters (length scale and signal standard deviation) are estimated
//! by maximizing the marginal likelihood of the training data: the negative log likelihood
//! is computed with a Cholesky factorization of the training covariance and minimized
//! in log-space within bounds.
//!
//! GP methods are implemented by [GaussianProcess] parameterized by [GpParams].
//! The [fit_predict] function gives a one-call access to fitted hyperparameters and
//! predictions given plain sequences of values.
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod algorithm;
pub mod covariance;
mod errors;
mod hyperparameters;
pub mod kernels;
pub mod likelihood;
mod parameters;
mod pipeline;
mod utils;

pub mod optimization;

pub use algorithm::*;
pub use errors::*;
pub use hyperparameters::*;
pub use kernels::{CovarianceKernel, Matern32Kernel};
pub use optimization::Algorithm;
pub use parameters::*;
pub use pipeline::*;
pub use utils::{pairwise_distances, DistanceMatrix};
