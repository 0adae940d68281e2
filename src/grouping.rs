//! Partitioning of input features into independent case groups.
//!
//! Groups are emitted in first-appearance order of their [`CaseKey`], so
//! repeated runs over the same input always produce the same order.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::SdeConfig;
use crate::error::{Result, SdeWarning};
use crate::feature::{AttributeSource, CaseKey, FeatureSource};
use crate::geometry::Point;
use crate::validation::{resolve_weight, validate_source};

/// Weighted points sharing one case key.
///
/// Only points with positive weight are stored; zero-weight points carry no
/// mass and do not count toward [`Group::len`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    pub key: CaseKey,
    pub points: Vec<Point>,
    pub weights: Vec<f64>,
}

impl Group {
    /// Empty group for `key`.
    #[must_use]
    pub fn new(key: CaseKey) -> Self {
        Self {
            key,
            points: Vec::new(),
            weights: Vec::new(),
        }
    }

    /// Group with every point weighted 1.0.
    #[must_use]
    pub fn unweighted(key: CaseKey, points: Vec<Point>) -> Self {
        let weights = vec![1.0; points.len()];
        Self {
            key,
            points,
            weights,
        }
    }

    /// Add a weighted point. Zero weights are dropped.
    pub fn push(&mut self, point: Point, weight: f64) {
        if weight > 0.0 {
            self.points.push(point);
            self.weights.push(weight);
        }
    }

    /// Number of points with positive weight.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Sum of weights.
    #[must_use]
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }
}

/// Output of [`group_features`].
#[derive(Debug, Clone, Default)]
pub struct Grouping {
    /// Groups in first-appearance order of their key.
    pub groups: Vec<Group>,
    /// Per-feature conditions encountered while reading.
    pub warnings: Vec<SdeWarning>,
}

/// Partition the features of `source` into case groups.
///
/// With no case field every readable feature lands in one group keyed
/// [`CaseKey::Null`]. Features whose case value is missing are grouped under
/// [`CaseKey::Null`] as well. Features without a readable location are
/// skipped and recorded as [`SdeWarning::UnreadableGeometry`]. Features
/// whose weight resolves to zero still register their case but add no mass,
/// and are recorded as [`SdeWarning::ExcludedWeight`].
///
/// # Errors
///
/// Fails when [`validate_source`] rejects the source.
pub fn group_features<S>(source: &S, config: &SdeConfig) -> Result<Grouping>
where
    S: FeatureSource + ?Sized,
{
    validate_source(source, config)?;

    let weight_field = config.weight_field.as_deref();
    let case_field = config.case_field.as_deref();

    let mut index: HashMap<CaseKey, usize> = HashMap::new();
    let mut grouping = Grouping::default();

    for i in 0..source.len() {
        let Some(feature) = source.get(i) else {
            continue;
        };

        let Some(point) = feature.location() else {
            warn!(index = i, "feature has no readable geometry; skipping");
            grouping
                .warnings
                .push(SdeWarning::UnreadableGeometry { index: i });
            continue;
        };

        let key = case_field
            .and_then(|name| feature.group_key_of(name))
            .unwrap_or_default();

        let weight = match weight_field {
            None => 1.0,
            Some(name) => resolve_weight(feature.numeric_value_of(name), config.missing_weight)
                .unwrap_or(0.0),
        };
        if weight <= 0.0 {
            debug!(index = i, "feature carries no weight; excluded");
            grouping
                .warnings
                .push(SdeWarning::ExcludedWeight { index: i });
        }

        let slot = *index.entry(key).or_insert_with_key(|key| {
            grouping.groups.push(Group::new(key.clone()));
            grouping.groups.len() - 1
        });
        grouping.groups[slot].push(point, weight);
    }

    debug!(
        groups = grouping.groups.len(),
        warnings = grouping.warnings.len(),
        "grouped input features"
    );

    Ok(grouping)
}
