use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::{Builder, Env};
use gpfit_gp::{fit_predict_with, Algorithm, GaussianProcess, GpOutput, Matern32Kernel};
use log::info;
use ndarray::Array1;
use ndarray_npy::write_npy;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;
use std::path::{Path, PathBuf};

mod data;

use data::{reference, SyntheticData};

/// Environment variable used to set the log level
const GPFIT_LOG: &str = "GPFIT_LOG";
/// Number of rows of the printed prediction table
const TABLE_ROWS: usize = 11;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Optimizer {
    /// Gradient-based SLSQP
    Slsqp,
    /// Derivative-free COBYLA
    Cobyla,
}

impl From<Optimizer> for Algorithm {
    fn from(optimizer: Optimizer) -> Self {
        match optimizer {
            Optimizer::Slsqp => Algorithm::Slsqp,
            Optimizer::Cobyla => Algorithm::Cobyla,
        }
    }
}

/// Fit a Matern 3/2 gaussian process to noisy observations of sin(x)
/// and predict its mean and standard deviation over the input range
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of training points
    #[arg(long, default_value_t = 10)]
    n_train: usize,
    /// Number of test points
    #[arg(long, default_value_t = 100)]
    n_test: usize,
    /// Observation noise standard deviation
    #[arg(long, default_value_t = 0.1)]
    noise: f64,
    /// Lower bound of the input range
    #[arg(long, default_value_t = -5., allow_hyphen_values = true)]
    xmin: f64,
    /// Upper bound of the input range
    #[arg(long, default_value_t = 5., allow_hyphen_values = true)]
    xmax: f64,
    /// Seed of the random generator used for data and multistart
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Hyperparameters optimizer
    #[arg(long, value_enum, default_value_t = Optimizer::Slsqp)]
    algorithm: Optimizer,
    /// Number of additional random starting points of the optimization
    #[arg(long, default_value_t = 0)]
    n_start: usize,
    /// Directory where npy result files are written
    #[arg(short, long)]
    outdir: Option<PathBuf>,
}

fn write_results(outdir: &Path, data: &SyntheticData, output: &GpOutput) -> Result<()> {
    std::fs::create_dir_all(outdir)
        .with_context(|| format!("cannot create directory {}", outdir.display()))?;
    let files: [(&str, &Array1<f64>); 5] = [
        ("x_train.npy", &data.x_train),
        ("y_train.npy", &data.y_train),
        ("x_test.npy", &data.x_test),
        ("mean.npy", &output.mean),
        ("std.npy", &output.std),
    ];
    for (name, values) in files {
        let path = outdir.join(name);
        write_npy(&path, values).with_context(|| format!("cannot save {}", path.display()))?;
    }
    info!("Results written in {}", outdir.display());
    Ok(())
}

fn print_results(data: &SyntheticData, output: &GpOutput) {
    println!(
        "Optimized hyperparameters: length_scale = {:.6}, sigma_f = {:.6} (nll = {:.6})",
        output.length_scale, output.sigma_f, output.nll
    );
    println!(
        "{:>10} {:>12} {:>12} {:>12}",
        "x", "mean", "std", "sin(x)"
    );
    let n_test = data.x_test.len();
    let step = (n_test / TABLE_ROWS).max(1);
    for i in (0..n_test).step_by(step) {
        let x = data.x_test[i];
        println!(
            "{:>10.4} {:>12.6} {:>12.6} {:>12.6}",
            x,
            output.mean[i],
            output.std[i],
            reference(x)
        );
    }
}

fn main() -> Result<()> {
    let env = Env::new().filter_or(GPFIT_LOG, "info");
    let mut builder = Builder::from_env(env);
    let builder = builder.target(env_logger::Target::Stdout);
    builder.try_init().ok();

    let args = Args::parse();

    let mut rng = Xoshiro256Plus::seed_from_u64(args.seed);
    let data = SyntheticData::generate(
        args.n_train,
        args.n_test,
        (args.xmin, args.xmax),
        args.noise,
        &mut rng,
    )?;
    info!(
        "Fit GP with {} training points in [{}, {}], noise_std={}",
        args.n_train, args.xmin, args.xmax, args.noise
    );

    let params = GaussianProcess::<f64, Matern32Kernel>::matern32(args.noise)
        .algorithm(args.algorithm.into())
        .n_start(args.n_start)
        .seed(args.seed);
    let output = fit_predict_with(
        params,
        &data.x_train.to_vec(),
        &data.y_train.to_vec(),
        &data.x_test.to_vec(),
    )
    .context("GP fit and prediction failed")?;

    print_results(&data, &output);
    if let Some(outdir) = &args.outdir {
        write_results(outdir, &data, &output)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args() {
        let args = Args::parse_from(["gpfit"]);
        assert_eq!(10, args.n_train);
        assert_eq!(100, args.n_test);
        assert_eq!(-5., args.xmin);
        assert_eq!(Optimizer::Slsqp, args.algorithm);
        assert!(args.outdir.is_none());

        let args = Args::parse_from([
            "gpfit",
            "--xmin",
            "-2",
            "--algorithm",
            "cobyla",
            "--n-start",
            "3",
            "-o",
            "out",
        ]);
        assert_eq!(-2., args.xmin);
        assert_eq!(Algorithm::Cobyla, Algorithm::from(args.algorithm));
        assert_eq!(3, args.n_start);
        assert_eq!(Some(PathBuf::from("out")), args.outdir);
    }

    #[test]
    fn test_write_results() {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let data = SyntheticData::generate(6, 20, (-3., 3.), 0.1, &mut rng).unwrap();
        let params = GaussianProcess::<f64, Matern32Kernel>::matern32(0.1);
        let output = fit_predict_with(
            params,
            &data.x_train.to_vec(),
            &data.y_train.to_vec(),
            &data.x_test.to_vec(),
        )
        .unwrap();
        let outdir = std::env::temp_dir().join(format!("gpfit-test-{}", std::process::id()));
        write_results(&outdir, &data, &output).unwrap();
        let mean: Array1<f64> = ndarray_npy::read_npy(outdir.join("mean.npy")).unwrap();
        assert_eq!(output.mean, mean);
        std::fs::remove_dir_all(&outdir).ok();
    }
}
