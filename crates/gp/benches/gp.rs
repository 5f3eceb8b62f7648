use criterion::{criterion_group, criterion_main, Criterion};
use gpfit_gp::{GaussianProcess, Matern32Kernel};
use linfa::prelude::{Dataset, Fit};
use ndarray::{Array, Array2, Axis};
use ndarray_rand::rand::SeedableRng;
use ndarray_rand::rand_distr::{Normal, Uniform};
use ndarray_rand::RandomExt;
use rand_xoshiro::Xoshiro256Plus;

fn criterion_gp(c: &mut Criterion) {
    let nts = [10, 50, 100, 200];
    let noise_std = 0.1;

    let mut group = c.benchmark_group("gp");
    group.sample_size(20);
    for nt in nts {
        let mut rng = Xoshiro256Plus::seed_from_u64(42);
        let xt: Array2<f64> = Array::random_using((nt, 1), Uniform::new(-5., 5.), &mut rng);
        let noise = Array::random_using(nt, Normal::new(0., noise_std).unwrap(), &mut rng);
        let yt = xt.column(0).mapv(f64::sin) + noise;
        let xtest = Array::linspace(-5., 5., 100).insert_axis(Axis(1));

        group.bench_function(format!("gp fit {nt}"), |b| {
            b.iter(|| {
                std::hint::black_box(
                    GaussianProcess::<f64, Matern32Kernel>::matern32(noise_std)
                        .fit(&Dataset::new(xt.to_owned(), yt.to_owned()))
                        .expect("GP fit error"),
                )
            });
        });

        let gp = GaussianProcess::<f64, Matern32Kernel>::matern32(noise_std)
            .fit(&Dataset::new(xt.to_owned(), yt.to_owned()))
            .expect("GP fit error");
        group.bench_function(format!("gp predict {nt}"), |b| {
            b.iter(|| std::hint::black_box(gp.predict_valstd(&xtest).expect("GP prediction")));
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_gp);
criterion_main!(benches);
