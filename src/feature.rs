//! Feature access for the ellipse pipeline.
//!
//! The statistical core never looks at a concrete feature representation.
//! It reads locations and attributes through two capability traits:
//!
//! - [`FeatureSource`]: a schema plus indexed access to features.
//! - [`AttributeSource`]: per-feature location, numeric and grouping values.
//!
//! [`FeatureCollection`] and [`Feature`] are the bundled in-memory backend.
//! Plain point slices are also accepted as a source without attributes.
//!
//! # Example
//!
//! ```
//! use sde_ellipse::{AttributeValue, Feature, FeatureCollection, Geometry, Point};
//!
//! let mut fc = FeatureCollection::new(["district", "population"]);
//! fc.push(
//!     Feature::new(Geometry::Point(Point::new(1.0, 2.0)))
//!         .with_attribute("district", "north")
//!         .with_attribute("population", 1200_i64),
//! );
//! assert_eq!(fc.features.len(), 1);
//! ```

use std::collections::HashMap;
use std::fmt;

use crate::geometry::{self, Geometry, Point};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Discrete grouping value.
///
/// `Null` is the sentinel for "no group": it keys the single implicit group
/// when no case field is configured, and collects features whose case value
/// is missing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CaseKey {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl CaseKey {
    /// Whether this is the "no group" sentinel.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for CaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("<none>"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CaseKey {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for CaseKey {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for CaseKey {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for CaseKey {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Attribute value of the in-memory backend.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AttributeValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    /// Numeric interpretation: numbers as-is, numeric text parsed, else `None`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(v) => Some(*v),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
            Self::Null | Self::Bool(_) => None,
        }
    }

    /// Grouping interpretation. Floats are keyed by their shortest
    /// round-trip text so that distinct values never collide.
    #[must_use]
    pub fn as_case_key(&self) -> Option<CaseKey> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(CaseKey::Bool(*b)),
            Self::Integer(i) => Some(CaseKey::Integer(*i)),
            Self::Float(v) => Some(CaseKey::Text(v.to_string())),
            Self::Text(s) => Some(CaseKey::Text(s.clone())),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for AttributeValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<bool> for AttributeValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for AttributeValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<CaseKey> for AttributeValue {
    fn from(key: CaseKey) -> Self {
        match key {
            CaseKey::Null => Self::Null,
            CaseKey::Bool(b) => Self::Bool(b),
            CaseKey::Integer(i) => Self::Integer(i),
            CaseKey::Text(s) => Self::Text(s),
        }
    }
}

/// Per-feature capability used by the grouper.
pub trait AttributeSource {
    /// Point representing the feature, `None` when the geometry is unreadable.
    fn location(&self) -> Option<Point>;

    /// Numeric value of the named attribute.
    fn numeric_value_of(&self, name: &str) -> Option<f64>;

    /// Grouping value of the named attribute.
    fn group_key_of(&self, name: &str) -> Option<CaseKey>;
}

/// Collection-level capability: schema lookup and indexed feature access.
pub trait FeatureSource {
    type Feature: AttributeSource;

    /// Whether the schema declares `name`.
    fn has_field(&self, name: &str) -> bool;

    /// Number of features.
    fn len(&self) -> usize;

    /// Feature at `index`.
    fn get(&self, index: usize) -> Option<&Self::Feature>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory feature: optional geometry plus named attributes.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Feature {
    pub geometry: Option<Geometry>,
    pub attributes: HashMap<String, AttributeValue>,
}

impl Feature {
    /// Create a feature with the given geometry and no attributes.
    #[must_use]
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry: Some(geometry),
            attributes: HashMap::new(),
        }
    }

    /// Create a feature with no geometry.
    #[must_use]
    pub fn without_geometry() -> Self {
        Self::default()
    }

    /// Set an attribute value.
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Attribute value by name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }
}

impl AttributeSource for Feature {
    fn location(&self) -> Option<Point> {
        self.geometry.as_ref().and_then(geometry::location)
    }

    fn numeric_value_of(&self, name: &str) -> Option<f64> {
        self.attribute(name).and_then(AttributeValue::as_f64)
    }

    fn group_key_of(&self, name: &str) -> Option<CaseKey> {
        self.attribute(name).and_then(AttributeValue::as_case_key)
    }
}

/// In-memory feature collection with an explicit attribute schema.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FeatureCollection {
    pub schema: Vec<String>,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Create an empty collection declaring the given attribute names.
    pub fn new<I, S>(schema: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            schema: schema.into_iter().map(Into::into).collect(),
            features: Vec::new(),
        }
    }

    /// Collection of bare point features with an empty schema.
    pub fn from_points<I, P>(points: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Point>,
    {
        Self {
            schema: Vec::new(),
            features: points
                .into_iter()
                .map(|p| Feature::new(Geometry::Point(p.into())))
                .collect(),
        }
    }

    /// Append a feature.
    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    /// Append a feature, builder style.
    #[must_use]
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.push(feature);
        self
    }
}

impl FeatureSource for FeatureCollection {
    type Feature = Feature;

    fn has_field(&self, name: &str) -> bool {
        self.schema.iter().any(|f| f == name)
    }

    fn len(&self) -> usize {
        self.features.len()
    }

    fn get(&self, index: usize) -> Option<&Feature> {
        self.features.get(index)
    }
}

impl AttributeSource for Point {
    fn location(&self) -> Option<Point> {
        geometry::is_finite(self).then_some(*self)
    }

    fn numeric_value_of(&self, _name: &str) -> Option<f64> {
        None
    }

    fn group_key_of(&self, _name: &str) -> Option<CaseKey> {
        None
    }
}

impl FeatureSource for [Point] {
    type Feature = Point;

    fn has_field(&self, _name: &str) -> bool {
        false
    }

    fn len(&self) -> usize {
        <[Point]>::len(self)
    }

    fn get(&self, index: usize) -> Option<&Point> {
        <[Point]>::get(self, index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values() {
        assert_eq!(AttributeValue::Integer(3).as_f64(), Some(3.0));
        assert_eq!(AttributeValue::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(AttributeValue::from(" 4.25 ").as_f64(), Some(4.25));
        assert_eq!(AttributeValue::from("n/a").as_f64(), None);
        assert_eq!(AttributeValue::Null.as_f64(), None);
        assert_eq!(AttributeValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_case_keys() {
        assert_eq!(AttributeValue::Null.as_case_key(), None);
        assert_eq!(
            AttributeValue::Integer(5).as_case_key(),
            Some(CaseKey::Integer(5))
        );
        assert_eq!(
            AttributeValue::Float(1.5).as_case_key(),
            Some(CaseKey::from("1.5"))
        );
        assert_ne!(
            AttributeValue::Float(0.1).as_case_key(),
            AttributeValue::Float(0.1 + 1e-15).as_case_key()
        );
        assert!(CaseKey::default().is_null());
        assert_eq!(CaseKey::Null.to_string(), "<none>");
    }

    #[test]
    fn test_feature_attribute_source() {
        let f = Feature::new(Geometry::Point(Point::new(1.0, 2.0)))
            .with_attribute("w", 2.0)
            .with_attribute("zone", "east");

        assert_eq!(f.location(), Some(Point::new(1.0, 2.0)));
        assert_eq!(f.numeric_value_of("w"), Some(2.0));
        assert_eq!(f.numeric_value_of("missing"), None);
        assert_eq!(f.group_key_of("zone"), Some(CaseKey::from("east")));
        assert!(Feature::without_geometry().location().is_none());
    }

    #[test]
    fn test_collection_schema() {
        let fc = FeatureCollection::new(["w", "zone"])
            .with_feature(Feature::new(Geometry::Point(Point::new(0.0, 0.0))));
        assert!(fc.has_field("w"));
        assert!(!fc.has_field("population"));
        assert_eq!(FeatureSource::len(&fc), 1);
        assert!(fc.get(1).is_none());
    }

    #[test]
    fn test_point_slice_source() {
        let pts = [Point::new(0.0, 0.0), Point::new(1.0, 1.0)];
        let source: &[Point] = &pts;
        assert_eq!(FeatureSource::len(source), 2);
        assert!(!source.has_field("anything"));
        assert_eq!(source.get(1).and_then(AttributeSource::location), Some(Point::new(1.0, 1.0)));
    }
}
