//! Standard Deviational Ellipse Library
//!
//! Summarizes the central tendency, dispersion and directional trend of a
//! set of spatial point features with a standard deviational ellipse (SDE).
//!
//! Points may be weighted by a numeric attribute and partitioned into
//! independent cases by a grouping attribute; one ellipse is produced per
//! case.
//!
//! # Features
//!
//! - **Weighted**: center and dispersion use per-point weights
//! - **Grouped**: one ellipse per case, in first-appearance order
//! - **Geometry-aware**: non-point [`geo`] features contribute their centroid
//! - **Cancellable**: caller-provided check polled between cases
//! - **Parallel**: cases estimated on the rayon pool (`parallel` feature)
//!
//! # Quick Start
//!
//! ```
//! use sde_ellipse::{compute_standard_deviational_ellipse, FeatureCollection, SdeConfig};
//!
//! let points = FeatureCollection::from_points([
//!     [0.0, 0.0],
//!     [2.0, 0.0],
//!     [0.0, 2.0],
//!     [2.0, 2.0],
//! ]);
//!
//! let result = compute_standard_deviational_ellipse(&points, &SdeConfig::default())?;
//! let ellipse = &result.features[0];
//!
//! assert!((ellipse.center().x() - 1.0).abs() < 1e-12);
//! assert!((ellipse.semi_major() - 1.0).abs() < 1e-12);
//! # Ok::<(), sde_ellipse::SdeError>(())
//! ```
//!
//! # Method
//!
//! For a group with weights `wᵢ` and total weight `W`:
//!
//! | Quantity | Definition |
//! |----------|------------|
//! | center | `(Σ wᵢxᵢ / W, Σ wᵢyᵢ / W)` |
//! | moment matrix | `[[Sxx, Sxy], [Sxy, Syy]]`, `Sab = Σ wᵢ daᵢ dbᵢ / W` |
//! | semi-axes | `k·√λ1 ≥ k·√λ2` from the eigenvalues |
//! | rotation | major eigenvector angle in `[0, π)`; 0 when circular |
//!
//! `k` is 1, 2 or 3 standard deviations.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod config;
pub mod ellipse;
pub mod error;
pub mod feature;
pub mod geometry;
pub mod grouping;
pub mod math;
pub mod process;
pub mod result;
pub mod validation;

// Re-exports for convenient access
pub use config::{EllipseSize, MissingWeightPolicy, SdeConfig, DEFAULT_SEGMENTS};
pub use ellipse::{build_ellipse, EllipseParams};
pub use error::{Result, SdeError, SdeWarning};
pub use feature::{AttributeSource, AttributeValue, CaseKey, Feature, FeatureCollection, FeatureSource};
pub use geometry::{Geometry, LineString, MultiPoint, Point, Polygon};
pub use grouping::{group_features, Group, Grouping};
pub use math::{compute_principal_axes, estimate_moments, MomentResult, PrincipalAxes};
pub use process::{
    compute_standard_deviational_ellipse, estimate_group, standard_deviational_ellipse,
    CancelCheck, Invocation, ProgressSink, SdeProcess,
};
pub use result::{EllipseFeature, ResultAssembler, RunStatus, SdeResult, ATTRIBUTE_NAMES};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
