//! Error types for standard deviational ellipse computation.
//!
//! Fatal conditions are [`SdeError`] variants. Conditions that only affect a
//! single feature or group are recorded as [`SdeWarning`] entries on the
//! result and never abort the run.

use thiserror::Error;

use crate::feature::CaseKey;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Main error type for ellipse computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SdeError {
    /// The input feature collection is absent or empty.
    #[error("Missing input: input features are required and must not be empty")]
    MissingInput,

    /// A group has fewer than two weighted points or no positive weight.
    #[error("Insufficient data for case {case}: {points} weighted points, total weight {total_weight}")]
    InsufficientData {
        case: CaseKey,
        points: usize,
        total_weight: f64,
    },

    /// A configured weight or case field is not part of the input schema.
    #[error("Invalid field: '{field}' does not exist on the input schema")]
    InvalidField { field: String },

    /// A single-use process was executed a second time.
    #[error("Process can only be run once")]
    AlreadyExecuted,

    /// Configuration validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Numerical computation resulted in NaN or Inf.
    #[error("Numerical instability: {context}")]
    NumericalInstability { context: String },
}

/// Result type alias for ellipse operations.
pub type Result<T> = std::result::Result<T, SdeError>;

impl SdeError {
    /// Create an insufficient data error.
    #[must_use]
    pub fn insufficient_data(case: CaseKey, points: usize, total_weight: f64) -> Self {
        Self::InsufficientData {
            case,
            points,
            total_weight,
        }
    }

    /// Create an invalid field error.
    #[must_use]
    pub fn invalid_field(field: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
        }
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a numerical instability error.
    #[must_use]
    pub fn numerical_instability(context: impl Into<String>) -> Self {
        Self::NumericalInstability {
            context: context.into(),
        }
    }
}

/// Non-fatal condition recorded while computing ellipses.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SdeWarning {
    /// Feature at `index` has no readable location and was skipped.
    UnreadableGeometry { index: usize },

    /// Feature at `index` resolved to zero weight and carries no mass.
    ExcludedWeight { index: usize },

    /// Group was skipped because it cannot support an ellipse.
    InsufficientData {
        case: CaseKey,
        points: usize,
        total_weight: f64,
    },

    /// Group was skipped because its moments overflowed.
    NumericalInstability { case: CaseKey, context: String },

    /// Ellipse has (near) zero area: points are collinear or identical.
    DegenerateEllipse { case: CaseKey },
}

impl std::fmt::Display for SdeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnreadableGeometry { index } => {
                write!(f, "feature {index} has no readable geometry; skipped")
            }
            Self::ExcludedWeight { index } => {
                write!(f, "feature {index} has no usable weight; excluded")
            }
            Self::InsufficientData {
                case,
                points,
                total_weight,
            } => write!(
                f,
                "case {case} skipped: {points} weighted points, total weight {total_weight}"
            ),
            Self::NumericalInstability { case, context } => {
                write!(f, "case {case} skipped: {context}")
            }
            Self::DegenerateEllipse { case } => {
                write!(f, "case {case} produced a zero-area ellipse")
            }
        }
    }
}
