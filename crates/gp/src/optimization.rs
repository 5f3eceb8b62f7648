//! Bounded minimization of the negative log marginal likelihood
//! over log-space hyperparameters `[ln(l), ln(sigma_f)]`.
use crate::hyperparameters::Hyperparameters;
use crate::kernels::CovarianceKernel;
use crate::likelihood::MarginalLikelihood;

use finitediff::FiniteDiff;
use linfa::Float;
use log::{debug, warn};
use ndarray::{arr1, Array1, Array2, Zip};
use ndarray_rand::rand::Rng;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rayon::prelude::*;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

/// A bounded local minimizer used as a black box by the hyperparameters optimization
pub trait Minimizer: Sync {
    /// Minimize `objfn` starting from `x0` within box `bounds`.
    ///
    /// Returns the best objective value and its location.
    /// A failed optimization returns an infinite value.
    fn minimize<ObjF>(&self, objfn: ObjF, x0: &[f64], bounds: &[(f64, f64)]) -> (f64, Array1<f64>)
    where
        ObjF: Fn(&[f64]) -> f64;
}

/// Optimizer used to tune hyperparameters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Algorithm {
    /// Gradient-based SLSQP with finite-difference gradient
    #[default]
    Slsqp,
    /// Derivative-free COBYLA
    Cobyla,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Algorithm::Slsqp => write!(f, "SLSQP"),
            Algorithm::Cobyla => write!(f, "COBYLA"),
        }
    }
}

/// COBYLA settings
#[derive(Clone, Copy, Debug)]
pub struct CobylaMinimizer {
    /// Initial trust region radius
    pub rhobeg: f64,
    /// Relative tolerance on the objective value
    pub ftol_rel: f64,
    /// Maximum number of objective evaluations
    pub maxeval: usize,
}

impl Default for CobylaMinimizer {
    fn default() -> Self {
        CobylaMinimizer {
            rhobeg: 0.5,
            ftol_rel: 1e-4,
            maxeval: 200,
        }
    }
}

impl Minimizer for CobylaMinimizer {
    fn minimize<ObjF>(&self, objfn: ObjF, x0: &[f64], bounds: &[(f64, f64)]) -> (f64, Array1<f64>)
    where
        ObjF: Fn(&[f64]) -> f64,
    {
        use cobyla::{minimize, Func, RhoBeg, StopTols};

        let cons: Vec<&dyn Func<()>> = vec![];
        match minimize(
            |x: &[f64], _u: &mut ()| objfn(x),
            x0,
            bounds,
            &cons,
            (),
            self.maxeval,
            RhoBeg::All(self.rhobeg),
            Some(StopTols {
                ftol_rel: self.ftol_rel,
                ..StopTols::default()
            }),
        ) {
            Ok((_, x_opt, fval)) => {
                let fval = if f64::is_nan(fval) {
                    f64::INFINITY
                } else {
                    fval
                };
                (fval, arr1(&x_opt))
            }
            Err((status, x_opt, _)) => {
                warn!("Cobyla optimizer failed in hyperparameters optimization, status={status:?}");
                (f64::INFINITY, arr1(&x_opt))
            }
        }
    }
}

/// SLSQP settings, gradient is approximated by central finite differences
#[derive(Clone, Copy, Debug)]
pub struct SlsqpMinimizer {
    /// Relative tolerance on the objective value
    pub ftol_rel: f64,
    /// Absolute tolerance on the objective value
    pub ftol_abs: f64,
    /// Maximum number of iterations
    pub maxeval: usize,
}

impl Default for SlsqpMinimizer {
    fn default() -> Self {
        SlsqpMinimizer {
            ftol_rel: 1e-6,
            ftol_abs: 1e-8,
            maxeval: 200,
        }
    }
}

impl Minimizer for SlsqpMinimizer {
    fn minimize<ObjF>(&self, objfn: ObjF, x0: &[f64], bounds: &[(f64, f64)]) -> (f64, Array1<f64>)
    where
        ObjF: Fn(&[f64]) -> f64,
    {
        let obj = |x: &[f64], gradient: Option<&mut [f64]>, _u: &mut ()| -> f64 {
            if let Some(grad) = gradient {
                let f = |x: &Vec<f64>| -> f64 { objfn(x) };
                grad[..].copy_from_slice(&x.to_vec().central_diff(&f));
            }
            objfn(x)
        };
        let cons: Vec<fn(&[f64], Option<&mut [f64]>, &mut ()) -> f64> = vec![];
        match slsqp::minimize(
            obj,
            x0,
            bounds,
            &cons,
            (),
            self.maxeval,
            Some(slsqp::StopTols {
                ftol_rel: self.ftol_rel,
                ftol_abs: self.ftol_abs,
                ..slsqp::StopTols::default()
            }),
        ) {
            Ok((_, x_opt, fval)) => {
                let fval = if f64::is_nan(fval) {
                    f64::INFINITY
                } else {
                    fval
                };
                (fval, arr1(&x_opt))
            }
            Err((status, x_opt, _)) => {
                warn!("Slsqp optimizer failed in hyperparameters optimization, status={status:?}");
                (f64::INFINITY, arr1(&x_opt))
            }
        }
    }
}

/// Starting points of the optimization as rows: `theta0` first then
/// `n_start` points drawn uniformly within `bounds`.
pub(crate) fn prepare_multistart<R: Rng + ?Sized>(
    n_start: usize,
    theta0: &Array1<f64>,
    bounds: &[(f64, f64)],
    rng: &mut R,
) -> Array2<f64> {
    let mut theta0s = Array2::zeros((n_start + 1, theta0.len()));
    theta0s.row_mut(0).assign(theta0);
    if n_start > 0 {
        let mut draws = Array2::random_using((n_start, bounds.len()), Uniform::new(0., 1.), rng);
        for mut row in draws.rows_mut() {
            Zip::from(&mut row)
                .and(bounds)
                .for_each(|v, (lo, up)| *v = lo + *v * (up - lo));
        }
        theta0s.slice_mut(ndarray::s![1.., ..]).assign(&draws);
    }
    theta0s
}

/// Optimize kernel hyperparameters by minimizing the negative log marginal likelihood
/// in log-space `[ln(l), ln(sigma_f)]` within `log_bounds`.
///
/// The search starts from `init` then from `n_start` additional random points.
/// The best point found (the starting point included) is clamped within the bounds
/// and returned as hyperparameters. Minimizer failures are not fatal.
pub fn optimize_hyperparameters<F, K, M, R>(
    likelihood: &MarginalLikelihood<F, K>,
    init: &Hyperparameters<F>,
    log_bounds: &[(F, F); 2],
    n_start: usize,
    minimizer: &M,
    rng: &mut R,
) -> Hyperparameters<F>
where
    F: Float,
    K: CovarianceKernel<F>,
    M: Minimizer,
    R: Rng + ?Sized,
{
    let bounds: Vec<(f64, f64)> = log_bounds
        .iter()
        .map(|(lo, up)| (to_f64(*lo), to_f64(*up)))
        .collect();
    let theta0 = init.to_log().mapv(to_f64);
    let theta0s = prepare_multistart(n_start, &theta0, &bounds, rng);
    debug!("Optimize with multistart theta = {:?}", theta0s);

    let objfn = |x: &[f64]| -> f64 { likelihood.penalized_nll(x) };

    let now = std::time::Instant::now();
    let start = (objfn(&theta0.to_vec()), theta0.to_owned());
    let (fmin, theta_opt) = (0..theta0s.nrows())
        .into_par_iter()
        .map(|i| {
            let x0 = theta0s.row(i).to_vec();
            let res = minimizer.minimize(objfn, &x0, &bounds);
            debug!("Start #{i} from {x0:?}: nll={} at {}", res.0, res.1);
            res
        })
        .reduce(
            || start.clone(),
            |a, b| if b.0 < a.0 { b } else { a },
        );
    debug!("elapsed optim = {:?}", now.elapsed().as_millis());
    debug!("Best nll={fmin} at log hyperparameters {theta_opt}");

    let theta_opt = Zip::from(&theta_opt)
        .and(&bounds)
        .map_collect(|v, (lo, up)| F::cast((*v).clamp(*lo, *up)));
    Hyperparameters::from_log(&theta_opt.to_vec())
}

fn to_f64<F: Float>(v: F) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}
