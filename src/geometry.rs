//! Planar geometry types and point extraction.
//!
//! Feature geometry is carried as [`geo`] types. Every input feature is
//! reduced to a single [`Point`] before grouping: the point itself, or the
//! centroid of a non-point geometry as computed by [`geo::Centroid`].

use geo::Centroid;

/// Planar coordinate.
pub type Point = geo::Point<f64>;

/// Feature geometry.
pub type Geometry = geo::Geometry<f64>;

/// Closed ring with optional holes; also the ellipse boundary.
pub type Polygon = geo::Polygon<f64>;

pub use geo::{LineString, MultiPoint};

/// Whether both coordinates are finite.
#[must_use]
pub fn is_finite(p: &Point) -> bool {
    p.x().is_finite() && p.y().is_finite()
}

/// Representative location of a geometry.
///
/// Returns `None` for empty geometries or when the centroid is not finite.
#[must_use]
pub fn location(geometry: &Geometry) -> Option<Point> {
    geometry.centroid().filter(is_finite)
}
