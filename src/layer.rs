//! Polygon features and layers.
//!
//! The engine reads features through [`PolygonLayer`] and
//! [`PolygonFeature`]. [`VectorLayer`] is an in-memory layer
//! of [`Feature`]s; the GDAL reader produces one.
use std::collections::HashMap;

use geo::algorithm::coordinate_position::{coord_pos_relative_to_ring, CoordPos};
use geo::{Area, BoundingRect, Coord, Intersects, MultiPolygon, Rect};
use serde_derive::Serialize;

use crate::error::FeatureError;

/// Identifier of a feature in its layer.
pub type FeatureId = u64;

/// Integer class code read from the class field.
pub type ClassCode = i64;

/// Value of an attribute field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Null,
}

impl FieldValue {
    /// Interpret the value as a class code. Reals must be
    /// integral, and text must parse as an integer.
    pub fn as_class_code(&self) -> std::result::Result<ClassCode, String> {
        match self {
            FieldValue::Integer(v) => Ok(*v),
            FieldValue::Real(v)
                if v.fract() == 0. && *v >= ClassCode::MIN as f64 && *v < ClassCode::MAX as f64 =>
            {
                Ok(*v as ClassCode)
            }
            FieldValue::Real(v) => Err(format!("is not an integer ({})", v)),
            FieldValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| format!("is not an integer ('{}')", s)),
            FieldValue::Null => Err("is null".into()),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Integer(v as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Real(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

/// A polygon record of a layer.
pub trait PolygonFeature {
    fn id(&self) -> FeatureId;

    /// The feature geometry, if it has one.
    fn geometry(&self) -> Option<&MultiPolygon<f64>>;

    fn field(&self, name: &str) -> Option<&FieldValue>;

    /// Bounding envelope of the geometry.
    fn envelope(&self) -> Option<Rect<f64>> {
        self.geometry().and_then(|g| g.bounding_rect())
    }

    /// The class code stored in field `name`.
    fn class_code(&self, name: &str) -> std::result::Result<ClassCode, FeatureError> {
        let attribute_error = |reason: String| FeatureError::Attribute {
            feature: self.id(),
            field: name.to_owned(),
            reason,
        };
        self.field(name)
            .ok_or_else(|| attribute_error("is missing".into()))?
            .as_class_code()
            .map_err(attribute_error)
    }
}

/// An ordered, finite collection of features.
pub trait PolygonLayer: Sync {
    type Feature: PolygonFeature + Sync;

    /// All features, in layer order.
    fn features(&self) -> Box<dyn Iterator<Item = &Self::Feature> + '_>;

    /// Features whose envelope intersects `bounds`, in layer
    /// order. Features without an envelope can't be pruned
    /// and are always yielded.
    fn features_within<'a>(
        &'a self,
        bounds: &Rect<f64>,
    ) -> Box<dyn Iterator<Item = &'a Self::Feature> + 'a> {
        let bounds = *bounds;
        Box::new(
            self.features()
                .filter(move |f| f.envelope().map_or(true, |env| env.intersects(&bounds))),
        )
    }
}

/// A feature held in memory. The envelope is computed once
/// at construction.
#[derive(Debug, Clone)]
pub struct Feature {
    id: FeatureId,
    geometry: Option<MultiPolygon<f64>>,
    envelope: Option<Rect<f64>>,
    fields: HashMap<String, FieldValue>,
}

impl Feature {
    pub fn new<G: Into<MultiPolygon<f64>>>(id: FeatureId, geometry: G) -> Self {
        Feature::with_geometry(id, Some(geometry.into()))
    }

    pub fn with_geometry(id: FeatureId, geometry: Option<MultiPolygon<f64>>) -> Self {
        let envelope = geometry.as_ref().and_then(|g| g.bounding_rect());
        Feature {
            id,
            geometry,
            envelope,
            fields: HashMap::new(),
        }
    }

    /// Set field `name` to `value`.
    pub fn with_field<V: Into<FieldValue>>(mut self, name: &str, value: V) -> Self {
        self.fields.insert(name.to_owned(), value.into());
        self
    }

    pub fn set_field<V: Into<FieldValue>>(&mut self, name: &str, value: V) {
        self.fields.insert(name.to_owned(), value.into());
    }
}

impl PolygonFeature for Feature {
    fn id(&self) -> FeatureId {
        self.id
    }

    fn geometry(&self) -> Option<&MultiPolygon<f64>> {
        self.geometry.as_ref()
    }

    fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    fn envelope(&self) -> Option<Rect<f64>> {
        self.envelope
    }
}

/// An in-memory layer.
#[derive(Debug, Clone, Default)]
pub struct VectorLayer {
    features: Vec<Feature>,
}

impl VectorLayer {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FromIterator<Feature> for VectorLayer {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        VectorLayer {
            features: iter.into_iter().collect(),
        }
    }
}

impl PolygonLayer for VectorLayer {
    type Feature = Feature;

    fn features(&self) -> Box<dyn Iterator<Item = &Feature> + '_> {
        Box::new(self.features.iter())
    }
}

/// Check that a geometry can be used for containment
/// tests.
pub fn validate_geometry(
    feature: FeatureId,
    geometry: Option<&MultiPolygon<f64>>,
) -> std::result::Result<&MultiPolygon<f64>, FeatureError> {
    let degenerate = |reason: &str| FeatureError::Geometry {
        feature,
        reason: reason.to_owned(),
    };
    let geometry = geometry.ok_or_else(|| degenerate("missing geometry"))?;
    if geometry.0.is_empty() {
        return Err(degenerate("empty geometry"));
    }
    for polygon in geometry {
        // Closed rings repeat the first vertex.
        if polygon.exterior().0.len() < 4 {
            return Err(degenerate("exterior ring has fewer than 3 vertices"));
        }
        let finite = polygon
            .exterior()
            .coords()
            .chain(polygon.interiors().iter().flat_map(|ring| ring.coords()))
            .all(|c| c.x.is_finite() && c.y.is_finite());
        if !finite {
            return Err(degenerate("non-finite coordinates"));
        }
    }
    if geometry.unsigned_area() == 0. {
        return Err(degenerate("zero area"));
    }
    Ok(geometry)
}

/// Whether `coord` lies in the footprint of `geometry`:
/// inside or on the exterior ring of some polygon, and not
/// strictly inside any of that polygon's holes. `tests` is
/// incremented once per ring tested.
pub fn footprint_contains(geometry: &MultiPolygon<f64>, coord: Coord<f64>, tests: &mut u64) -> bool {
    for polygon in geometry {
        *tests += 1;
        if coord_pos_relative_to_ring(coord, polygon.exterior()) == CoordPos::Outside {
            continue;
        }
        let mut in_hole = false;
        for hole in polygon.interiors() {
            *tests += 1;
            if coord_pos_relative_to_ring(coord, hole) == CoordPos::Inside {
                in_hole = true;
                break;
            }
        }
        if !in_hole {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon, LineString, Polygon};

    fn square_with_hole() -> MultiPolygon<f64> {
        polygon!(
            exterior: [
                (x: 0., y: 0.), (x: 10., y: 0.), (x: 10., y: 10.), (x: 0., y: 10.),
            ],
            interiors: [
                [(x: 4., y: 4.), (x: 6., y: 4.), (x: 6., y: 6.), (x: 4., y: 6.)],
            ],
        )
        .into()
    }

    #[test]
    fn containment_respects_holes() {
        let g = square_with_hole();
        let mut tests = 0;
        assert!(footprint_contains(&g, coord! { x: 1., y: 1. }, &mut tests));
        assert!(!footprint_contains(&g, coord! { x: 5., y: 5. }, &mut tests));
        assert!(!footprint_contains(&g, coord! { x: 11., y: 5. }, &mut tests));
        // Exterior boundary is in, hole boundary is out of the hole.
        assert!(footprint_contains(&g, coord! { x: 0., y: 5. }, &mut tests));
        assert!(footprint_contains(&g, coord! { x: 4., y: 5. }, &mut tests));
        // Outside point skips the hole test.
        assert_eq!(tests, 2 + 2 + 1 + 2 + 2);
    }

    #[test]
    fn class_code_parsing() {
        let f = Feature::new(3, square_with_hole())
            .with_field("int", 4)
            .with_field("real", 5.)
            .with_field("frac", 5.5)
            .with_field("text", " 6 ")
            .with_field("word", "forest");
        assert_eq!(f.class_code("int"), Ok(4));
        assert_eq!(f.class_code("real"), Ok(5));
        assert_eq!(f.class_code("text"), Ok(6));
        assert!(f.class_code("frac").is_err());
        let huge = Feature::new(4, square_with_hole())
            .with_field("big", 1e19)
            .with_field("low", -1e19)
            .with_field("inf", f64::INFINITY)
            .with_field("min", -9223372036854775808.);
        assert!(huge.class_code("big").is_err());
        assert!(huge.class_code("low").is_err());
        assert!(huge.class_code("inf").is_err());
        assert_eq!(huge.class_code("min"), Ok(ClassCode::MIN));
        assert!(f.class_code("word").is_err());
        let missing = f.class_code("nope").unwrap_err();
        assert_eq!(missing.feature(), 3);
        assert!(missing.is_attribute());
    }

    #[test]
    fn degenerate_geometries() {
        assert!(validate_geometry(1, None).is_err());
        assert!(validate_geometry(1, Some(&MultiPolygon::new(vec![]))).is_err());

        let line = Polygon::new(LineString::from(vec![(0., 0.), (1., 1.)]), vec![]);
        assert!(validate_geometry(1, Some(&line.into())).is_err());

        let flat = Polygon::new(
            LineString::from(vec![(0., 0.), (1., 0.), (2., 0.)]),
            vec![],
        );
        assert!(validate_geometry(1, Some(&flat.into())).is_err());

        assert!(validate_geometry(1, Some(&square_with_hole())).is_ok());
    }

    #[test]
    fn spatial_filter_is_a_pure_query() {
        let near = Feature::new(1, polygon![(x: 0., y: 0.), (x: 1., y: 0.), (x: 1., y: 1.)]);
        let far = Feature::new(2, polygon![(x: 50., y: 50.), (x: 51., y: 50.), (x: 51., y: 51.)]);
        let empty = Feature::with_geometry(3, None);
        let layer: VectorLayer = vec![near, far, empty].into_iter().collect();

        let bounds = Rect::new(coord! { x: -1., y: -1. }, coord! { x: 2., y: 2. });
        let ids: Vec<_> = layer.features_within(&bounds).map(|f| f.id()).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(layer.features().count(), 3);
    }
}
