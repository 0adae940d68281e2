//! Weighted first and second moments of a point group.
//!
//! The second moments are normalized by the total weight `W`, i.e. they are
//! the weighted population (co)variances of the coordinates. Scaling every
//! weight by a constant therefore leaves the result unchanged.

use nalgebra::Matrix2;

use crate::error::{Result, SdeError};
use crate::geometry::Point;
use crate::grouping::Group;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Minimum number of weighted points required for an ellipse.
pub const MIN_POINTS: usize = 2;

/// Weighted mean center and normalized second central moments of a group.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MomentResult {
    pub mean_x: f64,
    pub mean_y: f64,
    /// `Σ wᵢ dxᵢ² / W`
    pub sxx: f64,
    /// `Σ wᵢ dyᵢ² / W`
    pub syy: f64,
    /// `Σ wᵢ dxᵢ dyᵢ / W`
    pub sxy: f64,
    /// Total weight `W`.
    pub total_weight: f64,
    /// Number of points with positive weight.
    pub count: usize,
}

impl MomentResult {
    /// Weighted mean center.
    #[must_use]
    pub fn center(&self) -> Point {
        Point::new(self.mean_x, self.mean_y)
    }

    /// Symmetric moment matrix `[[Sxx, Sxy], [Sxy, Syy]]`.
    #[must_use]
    pub fn matrix(&self) -> Matrix2<f64> {
        Matrix2::new(self.sxx, self.sxy, self.sxy, self.syy)
    }
}

/// Compute the weighted moments of a group.
///
/// Two passes: the mean first, then deviations from it, which keeps the
/// second moments accurate for coordinates far from the origin.
///
/// # Errors
///
/// - [`SdeError::InsufficientData`] when the group has fewer than
///   [`MIN_POINTS`] weighted points or no positive total weight.
/// - [`SdeError::NumericalInstability`] when a moment is not finite.
pub fn estimate_moments(group: &Group) -> Result<MomentResult> {
    let count = group.len();
    let total_weight = group.total_weight();

    if count < MIN_POINTS || total_weight.is_nan() || total_weight <= 0.0 {
        return Err(SdeError::insufficient_data(
            group.key.clone(),
            count,
            total_weight,
        ));
    }

    let (sum_x, sum_y) = group
        .points
        .iter()
        .zip(&group.weights)
        .fold((0.0, 0.0), |(sx, sy), (p, &w)| (sx + w * p.x(), sy + w * p.y()));

    let mean_x = sum_x / total_weight;
    let mean_y = sum_y / total_weight;

    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (p, &w) in group.points.iter().zip(&group.weights) {
        let dx = p.x() - mean_x;
        let dy = p.y() - mean_y;
        sxx += w * dx * dx;
        syy += w * dy * dy;
        sxy += w * dx * dy;
    }

    let moments = MomentResult {
        mean_x,
        mean_y,
        sxx: sxx / total_weight,
        syy: syy / total_weight,
        sxy: sxy / total_weight,
        total_weight,
        count,
    };

    let finite = [
        moments.mean_x,
        moments.mean_y,
        moments.sxx,
        moments.syy,
        moments.sxy,
        moments.total_weight,
    ]
    .iter()
    .all(|v| v.is_finite());
    if !finite {
        return Err(SdeError::numerical_instability(format!(
            "non-finite moments for case {}",
            group.key
        )));
    }

    Ok(moments)
}
