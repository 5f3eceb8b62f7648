use gpfit_gp::{GaussianProcess, Matern32Kernel};
use linfa::prelude::*;
use ndarray::{arr2, concatenate, Array, Array1, Array2, Axis};

fn xsinx(x: &Array2<f64>) -> Array1<f64> {
    ((x - 3.5) * ((x - 3.5) / std::f64::consts::PI).mapv(|v| v.sin())).remove_axis(Axis(1))
}

fn main() {
    let xt = arr2(&[[0.0], [5.0], [10.0], [15.0], [18.0], [20.0], [25.0]]);
    let yt = xsinx(&xt);

    println!("Train matern 3/2 GP of 'xsinx' at {}", xt.column(0));
    let gp = GaussianProcess::<f64, Matern32Kernel>::matern32(1e-2)
        .fit(&Dataset::new(xt, yt))
        .expect("GP fitting");
    println!("{gp}");

    let xtest = Array::linspace(0., 25., 26).insert_axis(Axis(1));
    let ytest = xsinx(&xtest);
    // predict values and standard deviation
    let (ypred, ysigma) = gp.predict_valstd(&xtest).expect("GP prediction");

    println!("Compute prediction errors (x, err(x), sigma(x))");
    println!(
        "{}",
        concatenate![
            Axis(1),
            xtest,
            (ypred - ytest).insert_axis(Axis(1)),
            ysigma.insert_axis(Axis(1))
        ]
    );
}
