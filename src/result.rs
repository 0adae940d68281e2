//! Output records of an ellipse run.
//!
//! One [`EllipseFeature`] per valid group, collected in group order by
//! [`ResultAssembler`] into an [`SdeResult`].

use tracing::warn;

use crate::ellipse::EllipseParams;
use crate::error::SdeWarning;
use crate::feature::{AttributeValue, CaseKey};
use crate::geometry::{Point, Polygon};
use crate::math::moments::MomentResult;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Attribute names emitted by [`EllipseFeature::attributes`], in order.
pub const ATTRIBUTE_NAMES: [&str; 11] = [
    "case_key",
    "center_x",
    "center_y",
    "semi_major",
    "semi_minor",
    "theta",
    "rotation",
    "area",
    "deviations",
    "point_count",
    "total_weight",
];

/// Ellipse of one group: parameters, boundary ring and group summary.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EllipseFeature {
    pub case_key: CaseKey,
    pub params: EllipseParams,
    /// Boundary polygon; the exterior repeats its first vertex at the end.
    pub ring: Polygon,
    /// Number of points with positive weight.
    pub point_count: usize,
    pub total_weight: f64,
}

impl EllipseFeature {
    /// Assemble a feature from a group's moments and ellipse.
    #[must_use]
    pub fn new(case_key: CaseKey, moments: &MomentResult, params: EllipseParams, segments: usize) -> Self {
        Self {
            case_key,
            ring: params.ring(segments),
            params,
            point_count: moments.count,
            total_weight: moments.total_weight,
        }
    }

    #[must_use]
    pub const fn center(&self) -> Point {
        self.params.center
    }

    #[must_use]
    pub const fn semi_major(&self) -> f64 {
        self.params.semi_major
    }

    #[must_use]
    pub const fn semi_minor(&self) -> f64 {
        self.params.semi_minor
    }

    #[must_use]
    pub const fn theta(&self) -> f64 {
        self.params.theta
    }

    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.params.degenerate
    }

    /// Flat attribute set, named as in [`ATTRIBUTE_NAMES`].
    #[must_use]
    pub fn attributes(&self) -> Vec<(&'static str, AttributeValue)> {
        let p = &self.params;
        let values = [
            AttributeValue::from(self.case_key.clone()),
            p.center.x().into(),
            p.center.y().into(),
            p.semi_major.into(),
            p.semi_minor.into(),
            p.theta.into(),
            p.rotation_degrees().into(),
            p.area().into(),
            p.deviations.into(),
            AttributeValue::Integer(i64::try_from(self.point_count).unwrap_or(i64::MAX)),
            self.total_weight.into(),
        ];
        ATTRIBUTE_NAMES.into_iter().zip(values).collect()
    }
}

/// Completion state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RunStatus {
    /// Every group was processed.
    #[default]
    Completed,
    /// The caller cancelled; results cover the groups finished before that.
    Cancelled,
}

/// Ordered ellipses plus the warnings recorded along the way.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SdeResult {
    pub type_name: String,
    pub features: Vec<EllipseFeature>,
    pub warnings: Vec<SdeWarning>,
    pub status: RunStatus,
}

impl SdeResult {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }

    /// Ellipse of the given case, if one was emitted.
    #[must_use]
    pub fn feature(&self, key: &CaseKey) -> Option<&EllipseFeature> {
        self.features.iter().find(|f| &f.case_key == key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Collects ellipse features in group order.
#[derive(Debug, Default)]
pub struct ResultAssembler {
    result: SdeResult,
}

impl ResultAssembler {
    /// Start a result set carrying `warnings` recorded before assembly.
    #[must_use]
    pub fn new(type_name: impl Into<String>, warnings: Vec<SdeWarning>) -> Self {
        Self {
            result: SdeResult {
                type_name: type_name.into(),
                warnings,
                ..SdeResult::default()
            },
        }
    }

    /// Append a feature, noting degenerate ellipses.
    pub fn push(&mut self, feature: EllipseFeature) {
        if feature.is_degenerate() {
            warn!(case = %feature.case_key, "zero-area ellipse");
            self.result.warnings.push(SdeWarning::DegenerateEllipse {
                case: feature.case_key.clone(),
            });
        }
        self.result.features.push(feature);
    }

    /// Record a non-fatal condition.
    pub fn warn(&mut self, warning: SdeWarning) {
        self.result.warnings.push(warning);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.result.features.is_empty()
    }

    /// Finish with the given status.
    #[must_use]
    pub fn finish(mut self, status: RunStatus) -> SdeResult {
        self.result.status = status;
        self.result
    }
}
