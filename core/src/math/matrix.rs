use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Eigenpairs of a symmetric matrix, sorted by descending eigenvalue.
/// Eigenvectors are stored as columns.
#[derive(Debug, Clone)]
pub struct SymmetricEigen {
    pub values: Array1<f64>,
    pub vectors: Array2<f64>,
}

pub struct MatrixHelper;

impl MatrixHelper {
    /// Symmetric eigendecomposition through `nalgebra`. Returns `None` for
    /// non-square or non-finite input.
    pub fn symmetric_eigen(matrix: ArrayView2<f64>) -> Option<SymmetricEigen> {
        let n = matrix.nrows();
        if n == 0 || matrix.ncols() != n || matrix.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let dense = DMatrix::from_fn(n, n, |r, c| matrix[[r, c]]);
        let eigen = dense.symmetric_eigen();

        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&i, &j| eigen.eigenvalues[j].total_cmp(&eigen.eigenvalues[i]));

        let values = Array1::from_iter(order.iter().map(|&i| eigen.eigenvalues[i]));
        let vectors = Array2::from_shape_fn((n, n), |(r, c)| eigen.eigenvectors[(r, order[c])]);
        Some(SymmetricEigen { values, vectors })
    }

    /// `V diag(1/sqrt(max(λ, floor))) Vᵀ`, the symmetric inverse square root.
    pub fn inverse_sqrt(eigen: &SymmetricEigen, floor: f64) -> Array2<f64> {
        let weights = eigen.values.mapv(|l| 1.0 / l.max(floor).sqrt());
        let scaled = &eigen.vectors * &weights.insert_axis(Axis(0));
        scaled.dot(&eigen.vectors.t())
    }

    /// Symmetrizes in place to remove rounding asymmetry.
    pub fn symmetrize(matrix: &mut Array2<f64>) {
        let transposed = matrix.t().to_owned();
        *matrix += &transposed;
        *matrix *= 0.5;
    }
}
