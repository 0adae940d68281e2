//! Configuration for standard deviational ellipse computation.
//!
//! This module provides the [`SdeConfig`] struct which centralizes all
//! parameters of a run, along with presets for the usual ellipse sizes.
//!
//! # Example
//!
//! ```
//! use sde_ellipse::{EllipseSize, SdeConfig};
//!
//! // One standard deviation, no weights, single group
//! let config = SdeConfig::default();
//!
//! // Two standard deviations, weighted, grouped by district
//! let config = SdeConfig::two_standard_deviations()
//!     .with_weight_field("population")
//!     .with_case_field("district");
//! assert_eq!(config.ellipse_size, EllipseSize::Two);
//! ```

use std::fmt;

use crate::error::{Result, SdeError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default number of boundary vertices of the ellipse ring.
pub const DEFAULT_SEGMENTS: usize = 90;

/// Default output type name attached to results.
pub const DEFAULT_TYPE_NAME: &str = "StandardDistanceEllipse";

/// Number of standard deviations spanned by each semi-axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EllipseSize {
    /// One standard deviation (about 63% of a bivariate normal sample).
    #[default]
    One,
    /// Two standard deviations (about 98%).
    Two,
    /// Three standard deviations (about 99.9%).
    Three,
}

impl EllipseSize {
    /// Select a size from a free-form token.
    ///
    /// Selection is by substring: any token containing `'2'` selects
    /// [`EllipseSize::Two`], otherwise any token containing `'3'` selects
    /// [`EllipseSize::Three`], otherwise [`EllipseSize::One`].
    ///
    /// ```
    /// use sde_ellipse::EllipseSize;
    ///
    /// assert_eq!(EllipseSize::from_token("2_STANDARD_DEVIATIONS"), EllipseSize::Two);
    /// assert_eq!(EllipseSize::from_token("3"), EllipseSize::Three);
    /// assert_eq!(EllipseSize::from_token("whatever"), EllipseSize::One);
    /// ```
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        if token.contains('2') {
            Self::Two
        } else if token.contains('3') {
            Self::Three
        } else {
            Self::One
        }
    }

    /// Deviation multiplier `k`.
    #[must_use]
    pub const fn deviations(self) -> f64 {
        match self {
            Self::One => 1.0,
            Self::Two => 2.0,
            Self::Three => 3.0,
        }
    }

    /// Canonical token for this size.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::One => "1_STANDARD_DEVIATION",
            Self::Two => "2_STANDARD_DEVIATIONS",
            Self::Three => "3_STANDARD_DEVIATIONS",
        }
    }
}

impl fmt::Display for EllipseSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl From<&str> for EllipseSize {
    fn from(token: &str) -> Self {
        Self::from_token(token)
    }
}

/// What to do with a weight value that is missing, non-numeric, non-finite
/// or negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MissingWeightPolicy {
    /// Treat as weight 0: the point carries no mass and does not count
    /// toward the group's point total.
    #[default]
    Exclude,
    /// Treat as weight 1, as if no weight field were configured.
    DefaultWeight,
}

/// Configuration for a standard deviational ellipse run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SdeConfig {
    /// Deviation multiplier applied to both semi-axes.
    pub ellipse_size: EllipseSize,

    /// Attribute supplying per-point weight. `None` weighs every point 1.0.
    pub weight_field: Option<String>,

    /// Attribute partitioning points into cases. `None` yields one group.
    pub case_field: Option<String>,

    /// Number of distinct vertices on the ellipse ring (ring has one more,
    /// repeating the first).
    pub segments: usize,

    /// Policy for unusable weight values.
    pub missing_weight: MissingWeightPolicy,

    /// Relative eigenvalue gap under which the dispersion is treated as
    /// circular and the rotation is fixed at 0.
    pub isotropy_eps: f64,

    /// Relative minor/major eigenvalue ratio under which an ellipse is flagged
    /// degenerate.
    pub degenerate_eps: f64,

    /// Estimate groups on the rayon pool when the `parallel` feature is on.
    pub parallel: bool,

    /// Type name attached to the result set.
    pub output_type_name: String,
}

impl Default for SdeConfig {
    fn default() -> Self {
        Self {
            ellipse_size: EllipseSize::One,
            weight_field: None,
            case_field: None,
            segments: DEFAULT_SEGMENTS,
            missing_weight: MissingWeightPolicy::Exclude,
            isotropy_eps: 1e-9,
            degenerate_eps: 1e-9,
            parallel: true,
            output_type_name: DEFAULT_TYPE_NAME.to_string(),
        }
    }
}

impl SdeConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.segments < 3 {
            return Err(SdeError::invalid_config("segments must be at least 3"));
        }
        if !(0.0..1.0).contains(&self.isotropy_eps) {
            return Err(SdeError::invalid_config("isotropy_eps must be in [0, 1)"));
        }
        if !(0.0..1.0).contains(&self.degenerate_eps) {
            return Err(SdeError::invalid_config(
                "degenerate_eps must be in [0, 1)",
            ));
        }
        if matches!(self.weight_field.as_deref(), Some("")) {
            return Err(SdeError::invalid_config("weight_field must not be empty"));
        }
        if matches!(self.case_field.as_deref(), Some("")) {
            return Err(SdeError::invalid_config("case_field must not be empty"));
        }
        Ok(())
    }

    /// Preset for one-standard-deviation ellipses.
    #[must_use]
    pub fn one_standard_deviation() -> Self {
        Self::default()
    }

    /// Preset for two-standard-deviation ellipses.
    #[must_use]
    pub fn two_standard_deviations() -> Self {
        Self {
            ellipse_size: EllipseSize::Two,
            ..Self::default()
        }
    }

    /// Preset for three-standard-deviation ellipses.
    #[must_use]
    pub fn three_standard_deviations() -> Self {
        Self {
            ellipse_size: EllipseSize::Three,
            ..Self::default()
        }
    }

    /// Configuration whose size is selected from a free-form token.
    #[must_use]
    pub fn from_size_token(token: &str) -> Self {
        Self {
            ellipse_size: EllipseSize::from_token(token),
            ..Self::default()
        }
    }

    /// Set the ellipse size.
    #[must_use]
    pub const fn with_ellipse_size(mut self, size: EllipseSize) -> Self {
        self.ellipse_size = size;
        self
    }

    /// Set the weight field.
    #[must_use]
    pub fn with_weight_field(mut self, field: impl Into<String>) -> Self {
        self.weight_field = Some(field.into());
        self
    }

    /// Set the case field.
    #[must_use]
    pub fn with_case_field(mut self, field: impl Into<String>) -> Self {
        self.case_field = Some(field.into());
        self
    }

    /// Set the number of ring segments.
    #[must_use]
    pub const fn with_segments(mut self, segments: usize) -> Self {
        self.segments = segments;
        self
    }

    /// Set the missing-weight policy.
    #[must_use]
    pub const fn with_missing_weight(mut self, policy: MissingWeightPolicy) -> Self {
        self.missing_weight = policy;
        self
    }

    /// Enable/disable parallel group estimation.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Deviation multiplier `k` of the configured size.
    #[must_use]
    pub const fn deviations(&self) -> f64 {
        self.ellipse_size.deviations()
    }
}
