//! Ellipse parameters and boundary materialization.
//!
//! [`build_ellipse`] turns the moment matrix of a group into oriented,
//! scaled semi-axes. [`EllipseParams::ring`] samples the boundary as a
//! [`geo::Polygon`].
//!
//! # Example
//!
//! ```
//! use sde_ellipse::{build_ellipse, estimate_moments, CaseKey, Group, Point, SdeConfig};
//!
//! let group = Group::unweighted(
//!     CaseKey::Null,
//!     vec![
//!         Point::new(0.0, 0.0),
//!         Point::new(2.0, 0.0),
//!         Point::new(0.0, 2.0),
//!         Point::new(2.0, 2.0),
//!     ],
//! );
//! let moments = estimate_moments(&group)?;
//! let ellipse = build_ellipse(&moments, &SdeConfig::default());
//!
//! assert!((ellipse.semi_major - 1.0).abs() < 1e-12);
//! assert_eq!(ellipse.theta, 0.0);
//! assert_eq!(ellipse.ring(90).exterior().0.len(), 91);
//! # Ok::<(), sde_ellipse::SdeError>(())
//! ```

use std::f64::consts::{PI, TAU};

use crate::config::SdeConfig;
use crate::geometry::{LineString, Point, Polygon};
use crate::math::linalg::{compute_principal_axes, to_world, PrincipalAxes};
use crate::math::moments::MomentResult;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Oriented, scaled ellipse of one group.
///
/// Invariants: `semi_major >= semi_minor >= 0` and `theta` in `[0, π)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EllipseParams {
    /// Weighted mean center.
    pub center: Point,
    /// Orientation of the major axis, radians counter-clockwise from +x.
    pub theta: f64,
    /// `k · √λ1`
    pub semi_major: f64,
    /// `k · √λ2`
    pub semi_minor: f64,
    /// Deviation multiplier `k`.
    pub deviations: f64,
    /// Decomposition the axes were derived from.
    pub axes: PrincipalAxes,
    /// Zero-area ellipse (collinear or coincident points).
    pub degenerate: bool,
}

impl EllipseParams {
    /// Orientation in degrees, `[0, 180)`.
    #[must_use]
    pub fn rotation_degrees(&self) -> f64 {
        self.theta.to_degrees()
    }

    /// `π · a · b`
    #[must_use]
    pub fn area(&self) -> f64 {
        PI * self.semi_major * self.semi_minor
    }

    /// Eigenvalues `[λ1, λ2]` of the moment matrix.
    #[must_use]
    pub const fn eigenvalues(&self) -> [f64; 2] {
        self.axes.eigenvalues
    }

    /// Sample the boundary at `segments` evenly spaced parameter values as a
    /// polygon whose exterior is closed by repeating the first vertex.
    ///
    /// The exterior has `segments + 1` vertices and starts at the positive end
    /// of the major axis. A degenerate ellipse yields a ring collapsed onto a
    /// segment or a point.
    #[must_use]
    pub fn ring(&self, segments: usize) -> Polygon {
        let origin = [self.center.x(), self.center.y()];
        let mut coords: Vec<[f64; 2]> = (0..segments)
            .map(|i| {
                let t = TAU * i as f64 / segments as f64;
                let local = [self.semi_major * t.cos(), self.semi_minor * t.sin()];
                to_world(local, self.theta, origin)
            })
            .collect();

        if let Some(&first) = coords.first() {
            coords.push(first);
        }
        Polygon::new(LineString::from(coords), vec![])
    }
}

/// Build the ellipse of a group from its moments.
///
/// The deviation multiplier, isotropy and degeneracy thresholds come from
/// `config`.
#[must_use]
pub fn build_ellipse(moments: &MomentResult, config: &SdeConfig) -> EllipseParams {
    let k = config.deviations();
    let axes = compute_principal_axes(&moments.matrix());

    EllipseParams {
        center: moments.center(),
        theta: axes.orientation(config.isotropy_eps),
        semi_major: k * axes.eigenvalues[0].sqrt(),
        semi_minor: k * axes.eigenvalues[1].sqrt(),
        deviations: k,
        axes,
        degenerate: axes.is_degenerate(config.degenerate_eps),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EllipseSize;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_4;

    fn moments(sxx: f64, syy: f64, sxy: f64) -> MomentResult {
        MomentResult {
            mean_x: 5.0,
            mean_y: -3.0,
            sxx,
            syy,
            sxy,
            total_weight: 10.0,
            count: 10,
        }
    }

    #[test]
    fn test_axis_aligned() {
        let e = build_ellipse(&moments(4.0, 1.0, 0.0), &SdeConfig::default());
        assert_relative_eq!(e.semi_major, 2.0, epsilon = 1e-12);
        assert_relative_eq!(e.semi_minor, 1.0, epsilon = 1e-12);
        assert_relative_eq!(e.theta, 0.0, epsilon = 1e-12);
        assert_relative_eq!(e.area(), 2.0 * PI, epsilon = 1e-12);
        assert_eq!(e.center, Point::new(5.0, -3.0));
        assert!(!e.degenerate);
    }

    #[test]
    fn test_multiplier_scales_axes() {
        let m = moments(3.0, 1.0, 0.8);
        let one = build_ellipse(&m, &SdeConfig::default());
        let two = build_ellipse(&m, &SdeConfig::default().with_ellipse_size(EllipseSize::Two));
        let three = build_ellipse(&m, &SdeConfig::three_standard_deviations());

        assert_relative_eq!(two.semi_major, 2.0 * one.semi_major, epsilon = 1e-12);
        assert_relative_eq!(two.semi_minor, 2.0 * one.semi_minor, epsilon = 1e-12);
        assert_relative_eq!(three.semi_major, 3.0 * one.semi_major, epsilon = 1e-12);
        assert_relative_eq!(two.theta, one.theta, epsilon = 1e-15);
        assert_eq!(three.deviations, 3.0);
    }

    #[test]
    fn test_rotated() {
        // Covariance of a distribution elongated along y = x
        let e = build_ellipse(&moments(2.5, 2.5, 1.5), &SdeConfig::default());
        assert_relative_eq!(e.theta, FRAC_PI_4, epsilon = 1e-12);
        assert_relative_eq!(e.rotation_degrees(), 45.0, epsilon = 1e-10);
        assert_relative_eq!(e.eigenvalues()[0], 4.0, epsilon = 1e-12);
        assert_relative_eq!(e.eigenvalues()[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_negative_correlation_orientation() {
        let e = build_ellipse(&moments(2.5, 2.5, -1.5), &SdeConfig::default());
        assert_relative_eq!(e.theta, 3.0 * FRAC_PI_4, epsilon = 1e-12);
        assert!(e.semi_major >= e.semi_minor);
    }

    #[test]
    fn test_degenerate_flag() {
        let e = build_ellipse(&moments(1.0, 1.0, 1.0), &SdeConfig::default());
        assert!(e.degenerate);
        assert_relative_eq!(e.semi_minor, 0.0, epsilon = 1e-6);
        assert!(e.semi_major > 0.0);

        let point = build_ellipse(&moments(0.0, 0.0, 0.0), &SdeConfig::default());
        assert!(point.degenerate);
        assert_eq!(point.semi_major, 0.0);
        assert_eq!(point.semi_minor, 0.0);
        assert_eq!(point.theta, 0.0);
    }

    #[test]
    fn test_ring_is_closed_and_on_ellipse() {
        let e = build_ellipse(&moments(2.5, 2.5, 1.5), &SdeConfig::default());
        let ring = e.ring(64);
        let exterior = ring.exterior();
        assert_eq!(exterior.0.len(), 65);
        assert!(exterior.is_closed());
        assert!(ring.interiors().is_empty());

        // Every vertex satisfies the implicit ellipse equation in the local frame.
        let (s, c) = e.theta.sin_cos();
        for p in exterior.points() {
            let dx = p.x() - e.center.x();
            let dy = p.y() - e.center.y();
            let u = c * dx + s * dy;
            let v = -s * dx + c * dy;
            let q = (u / e.semi_major).powi(2) + (v / e.semi_minor).powi(2);
            assert_relative_eq!(q, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_ring_starts_on_major_axis() {
        let e = build_ellipse(&moments(4.0, 1.0, 0.0), &SdeConfig::default());
        let ring = e.ring(4);
        let v = &ring.exterior().0;
        assert_relative_eq!(v[0].x, 7.0, epsilon = 1e-12);
        assert_relative_eq!(v[0].y, -3.0, epsilon = 1e-12);
        assert_relative_eq!(v[1].x, 5.0, epsilon = 1e-12);
        assert_relative_eq!(v[1].y, -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_ring() {
        let e = build_ellipse(&moments(1.0, 1.0, 0.0), &SdeConfig::default());
        assert!(e.ring(0).exterior().0.is_empty());
    }

    #[test]
    fn test_point_ellipse_ring_keeps_vertex_count() {
        let e = build_ellipse(&moments(0.0, 0.0, 0.0), &SdeConfig::default());
        let ring = e.ring(12);
        assert_eq!(ring.exterior().0.len(), 13);
        assert!(ring.exterior().points().all(|p| p == e.center));
    }
}
