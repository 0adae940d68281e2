//! Linear algebra utilities for ellipse construction.
//!
//! This module provides the principal-axis decomposition of the 2×2 moment
//! matrix using nalgebra for the symmetric eigendecomposition, plus the
//! rotation helpers used to place the ellipse in world coordinates.

use std::f64::consts::PI;

use nalgebra::{Matrix2, SymmetricEigen, Vector2};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Principal axes of a symmetric 2×2 moment matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PrincipalAxes {
    /// Eigenvalues sorted in descending order, clamped to be non-negative.
    pub eigenvalues: [f64; 2],

    /// Eigenvectors as columns, sorted by corresponding eigenvalue.
    /// `eigenvectors[r][c]` is row `r` of column `c`.
    pub eigenvectors: [[f64; 2]; 2],
}

impl PrincipalAxes {
    /// Get the i-th principal axis as a unit vector.
    #[must_use]
    pub fn axis(&self, i: usize) -> [f64; 2] {
        debug_assert!(i < 2);
        [self.eigenvectors[0][i], self.eigenvectors[1][i]]
    }

    /// Whether the two eigenvalues are equal within `eps` relative to the
    /// larger one. An isotropic matrix has no preferred direction.
    #[must_use]
    pub fn is_isotropic(&self, eps: f64) -> bool {
        self.eigenvalues[0] - self.eigenvalues[1] <= eps * self.eigenvalues[0]
    }

    /// Whether the minor eigenvalue vanishes within `eps` relative to the
    /// major one (collinear or coincident points).
    #[must_use]
    pub fn is_degenerate(&self, eps: f64) -> bool {
        self.eigenvalues[1] <= eps * self.eigenvalues[0]
    }

    /// Orientation of the major axis in `[0, π)`.
    ///
    /// Returns 0 for isotropic matrices.
    #[must_use]
    pub fn orientation(&self, isotropy_eps: f64) -> f64 {
        if self.is_isotropic(isotropy_eps) {
            return 0.0;
        }
        let [vx, vy] = self.axis(0);
        normalize_orientation(vy.atan2(vx))
    }
}

/// Compute the principal axes of a symmetric 2×2 matrix.
///
/// Round-off can make the smaller eigenvalue of a singular matrix slightly
/// negative; such values are clamped to zero.
#[must_use]
pub fn compute_principal_axes(matrix: &Matrix2<f64>) -> PrincipalAxes {
    let eigen = SymmetricEigen::new(*matrix);

    let mut pairs: Vec<(f64, Vector2<f64>)> = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .map(|(i, &v)| (v.max(0.0), eigen.eigenvectors.column(i).into_owned()))
        .collect();

    pairs.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    PrincipalAxes {
        eigenvalues: [pairs[0].0, pairs[1].0],
        eigenvectors: [
            [pairs[0].1[0], pairs[1].1[0]],
            [pairs[0].1[1], pairs[1].1[1]],
        ],
    }
}

/// Map an undirected axis angle into `[0, π)`.
#[must_use]
pub fn normalize_orientation(angle: f64) -> f64 {
    let a = angle.rem_euclid(PI);
    // rem_euclid may round up to exactly π
    if a >= PI {
        0.0
    } else {
        a
    }
}

/// Rotate a local `[u, v]` offset by `theta` and translate it to `origin`.
#[must_use]
#[inline]
pub fn to_world(local: [f64; 2], theta: f64, origin: [f64; 2]) -> [f64; 2] {
    let (sin_t, cos_t) = theta.sin_cos();
    [
        origin[0] + cos_t * local[0] - sin_t * local[1],
        origin[1] + sin_t * local[0] + cos_t * local[1],
    ]
}
