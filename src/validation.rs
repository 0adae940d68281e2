//! Input validation utilities.
//!
//! Checks that must pass before any group is formed: the source is present
//! and non-empty, and every configured field exists on its schema. Also
//! resolves raw weight values under the configured [`MissingWeightPolicy`].

use crate::config::{MissingWeightPolicy, SdeConfig};
use crate::error::{Result, SdeError};
use crate::feature::FeatureSource;

/// Validate a feature source against a configuration.
///
/// # Errors
///
/// - [`SdeError::MissingInput`] if the source has no features.
/// - [`SdeError::InvalidField`] if the weight or case field is not declared
///   on the source schema.
pub fn validate_source<S>(source: &S, config: &SdeConfig) -> Result<()>
where
    S: FeatureSource + ?Sized,
{
    if source.is_empty() {
        return Err(SdeError::MissingInput);
    }

    for field in [&config.weight_field, &config.case_field]
        .into_iter()
        .flatten()
    {
        if !source.has_field(field) {
            return Err(SdeError::invalid_field(field.as_str()));
        }
    }

    Ok(())
}

/// Resolve a raw attribute reading to a usable weight.
///
/// Finite non-negative readings are used as-is. Anything else (missing,
/// non-numeric, NaN, infinite, negative) is replaced according to `policy`.
#[must_use]
pub fn resolve_weight(raw: Option<f64>, policy: MissingWeightPolicy) -> Option<f64> {
    match raw {
        Some(w) if w.is_finite() && w >= 0.0 => Some(w),
        _ => match policy {
            MissingWeightPolicy::Exclude => None,
            MissingWeightPolicy::DefaultWeight => Some(1.0),
        },
    }
}
