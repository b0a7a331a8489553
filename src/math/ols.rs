//! Linear least squares solver.
//!
//! Polynomial calibration fits solve small problems of the form:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! where `x_i` is a Vandermonde row `[1, x, x^2, ...]`. Raw sensor keys run up to a
//! few thousand, so `x^6` spans ~20 orders of magnitude across columns.
//!
//! Implementation choices:
//! - Columns are scaled to unit norm before solving and the solution is unscaled
//!   afterwards. This keeps the singular values comparable across degrees.
//! - SVD is used so tall (over-determined) systems are handled directly.
//!   (Nalgebra's `QR::solve` is intended for square systems.)
//! - A numerically rank-deficient design is an error, not a silent
//!   minimum-norm solution.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Why a least-squares solve was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("design matrix is rank-deficient (rank {rank} < {cols} columns)")]
    RankDeficient { rank: usize, cols: usize },
    #[error("local linearization is singular")]
    Singular,
    #[error("solution is not finite")]
    NonFinite,
    #[error("exceeded {0} iterations without converging")]
    MaxIterations(usize),
}

/// Solve a least squares problem using column-scaled SVD.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<DVector<f64>, SolveError> {
    let cols = x.ncols();
    if x.nrows() < cols {
        return Err(SolveError::RankDeficient {
            rank: x.nrows(),
            cols,
        });
    }

    let norms: Vec<f64> = x.column_iter().map(|c| c.norm()).collect();
    if norms.iter().any(|n| !n.is_finite()) {
        return Err(SolveError::NonFinite);
    }
    if let Some(rank) = norms.iter().position(|n| *n == 0.0) {
        return Err(SolveError::RankDeficient { rank, cols });
    }

    let mut scaled = x.clone();
    for (j, norm) in norms.iter().enumerate() {
        scaled.column_mut(j).scale_mut(1.0 / norm);
    }

    let svd = scaled.svd(true, true);
    let sigma_max = svd.singular_values.max();
    let tol = sigma_max * (x.nrows().max(cols) as f64) * f64::EPSILON;

    let rank = svd.rank(tol);
    if rank < cols {
        return Err(SolveError::RankDeficient { rank, cols });
    }

    let beta_scaled = svd.solve(y, tol).map_err(|_| SolveError::Singular)?;
    let beta = DVector::from_iterator(cols, beta_scaled.iter().zip(&norms).map(|(b, n)| b / n));

    if beta.iter().all(|v| v.is_finite()) {
        Ok(beta)
    } else {
        Err(SolveError::NonFinite)
    }
}
