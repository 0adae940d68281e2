//! Mathematical utilities for ellipse computation.
//!
//! This module provides:
//! - [`moments`]: weighted mean center and second central moments
//! - [`linalg`]: principal axes of the moment matrix and rotations

pub mod linalg;
pub mod moments;

pub use linalg::{compute_principal_axes, normalize_orientation, PrincipalAxes};
pub use moments::{estimate_moments, MomentResult, MIN_POINTS};
