use linfa::Float;
use ndarray::{s, Array1, Array2, ArrayBase, Axis, Data, Ix2};

/// A structure to retain euclidean distances between distinct pairs of points
/// used to compute the training covariance matrix
#[derive(Debug, Clone)]
pub struct DistanceMatrix<F: Float> {
    /// Distances as a (n_obs * (n_obs-1))/2 vector
    pub d: Array1<F>,
    /// Indices (i, j) with i < j of the distances in the original data array
    pub d_indices: Array2<usize>,
    /// Number of observations
    pub n_obs: usize,
}

impl<F: Float> DistanceMatrix<F> {
    /// Compute distances given points given as an array (n_obs, nx)
    pub fn new(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> DistanceMatrix<F> {
        let (d, d_indices) = Self::_cross_dist(x);
        let n_obs = x.nrows();

        DistanceMatrix {
            d,
            d_indices,
            n_obs,
        }
    }

    fn _cross_dist(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> (Array1<F>, Array2<usize>) {
        let n_obs = x.nrows();
        let n_non_zero_cross_dist = n_obs * n_obs.saturating_sub(1) / 2;
        let mut indices = Array2::<usize>::zeros((n_non_zero_cross_dist, 2));
        let mut d = Array1::zeros(n_non_zero_cross_dist);
        let mut idx = 0;
        for k in 0..n_obs.saturating_sub(1) {
            let idx0 = idx;
            let offset = n_obs - k - 1;
            idx = idx0 + offset;

            for i in (k + 1)..n_obs {
                let r = idx0 + i - k - 1;
                indices[[r, 0]] = k;
                indices[[r, 1]] = i;
            }

            let diff = &x.slice(s![k, ..]) - &x.slice(s![k + 1..n_obs, ..]);
            let dist = diff.map_axis(Axis(1), |row| row.dot(&row).sqrt());
            d.slice_mut(s![idx0..idx]).assign(&dist);
        }

        (d, indices)
    }

    /// Smallest distance between two distinct points, `None` with less than two points
    pub fn min_distance(&self) -> Option<F> {
        self.d
            .iter()
            .copied()
            .fold(None, |acc, v| match acc {
                Some(m) if m <= v => Some(m),
                _ => Some(v),
            })
    }
}

/// Computes euclidean distances between each row of x and each row of y
/// resulting in a 2d array of shape (nrows(x), nrows(y));
/// *Panics* if x and y have not the same column numbers
pub fn pairwise_distances<F: Float>(
    x: &ArrayBase<impl Data<Elem = F>, Ix2>,
    y: &ArrayBase<impl Data<Elem = F>, Ix2>,
) -> Array2<F> {
    assert!(x.ncols() == y.ncols());

    let mut result = Array2::zeros((x.nrows(), y.nrows()));
    for (i, x_row) in x.rows().into_iter().enumerate() {
        for (j, y_row) in y.rows().into_iter().enumerate() {
            let diff = &x_row - &y_row;
            result[[i, j]] = diff.dot(&diff).sqrt();
        }
    }
    result
}
