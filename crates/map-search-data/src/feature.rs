//! GeoJSON feature model.
//!
//! Only the parts of RFC 7946 the search control needs are modelled: feature
//! collections, features with an optional geometry and a property mapping, and
//! every geometry type so bounding boxes can be computed over any layer.
//! Property order is preserved (`serde_json/preserve_order`), which matters
//! because the first feature's keys become the default search keys.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{LoadError, Result};

/// A feature's property mapping.
pub type Properties = serde_json::Map<String, Value>;

/// A GeoJSON position: `[x, y]` with an optional altitude.
pub type Position = Vec<f64>;

/// GeoJSON geometry, tagged by its `type` member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    MultiPoint { coordinates: Vec<Position> },
    LineString { coordinates: Vec<Position> },
    MultiLineString { coordinates: Vec<Vec<Position>> },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    GeometryCollection { geometries: Vec<Geometry> },
}

impl Geometry {
    /// Calls `visit` with the `(x, y)` of every position in the geometry.
    ///
    /// Positions with fewer than two ordinates are skipped.
    pub fn visit_positions<F: FnMut(f64, f64)>(&self, visit: &mut F) {
        fn emit<F: FnMut(f64, f64)>(position: &Position, visit: &mut F) {
            if let [x, y, ..] = position.as_slice() {
                visit(*x, *y);
            }
        }

        match self {
            Self::Point { coordinates } => emit(coordinates, visit),
            Self::MultiPoint { coordinates } | Self::LineString { coordinates } => {
                coordinates.iter().for_each(|p| emit(p, visit));
            }
            Self::MultiLineString { coordinates } | Self::Polygon { coordinates } => coordinates
                .iter()
                .flatten()
                .for_each(|p| emit(p, visit)),
            Self::MultiPolygon { coordinates } => coordinates
                .iter()
                .flatten()
                .flatten()
                .for_each(|p| emit(p, visit)),
            Self::GeometryCollection { geometries } => {
                for geometry in geometries {
                    geometry.visit_positions(visit);
                }
            }
        }
    }
}

/// A single geographic entity: geometry plus properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub properties: Properties,
}

impl Feature {
    pub fn new(geometry: Option<Geometry>, properties: Properties) -> Self {
        Self {
            id: None,
            geometry,
            properties,
        }
    }

    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// A GeoJSON `FeatureCollection`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Parse a feature collection, naming `origin` in the error on failure.
    pub fn from_slice(bytes: &[u8], origin: &str) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|source| LoadError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    /// Parse a feature collection from an already decoded JSON value.
    pub fn from_value(value: Value, origin: &str) -> Result<Self> {
        serde_json::from_value(value).map_err(|source| LoadError::Parse {
            origin: origin.to_string(),
            source,
        })
    }

    /// Replace every `null` property value with `""`, see [`normalize_nulls`].
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for feature in &mut self.features {
            normalize_nulls(&mut feature.properties);
        }
        self
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

/// Replace `null` values with empty strings so every value can be text-matched.
///
/// Nested objects are normalized too; `null`s inside arrays are left alone.
pub fn normalize_nulls(properties: &mut Properties) {
    for value in properties.values_mut() {
        match value {
            Value::Null => *value = Value::String(String::new()),
            Value::Object(nested) => normalize_nulls(nested),
            _ => {}
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Properties, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Properties>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_feature_collection() {
        let raw = json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
                    "properties": {"id": 1, "name": "Lakeview"}
                },
                {
                    "type": "Feature",
                    "geometry": null,
                    "properties": null
                }
            ]
        });

        let collection = FeatureCollection::from_value(raw, "inline").unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.features[0].property("name"), Some(&json!("Lakeview")));
        assert!(collection.features[1].geometry.is_none());
        assert!(collection.features[1].properties.is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_features() {
        let raw = json!({"type": "FeatureCollection", "features": "nope"});
        let err = FeatureCollection::from_value(raw, "bad.geojson").unwrap_err();
        assert!(matches!(err, LoadError::Parse { ref origin, .. } if origin == "bad.geojson"));
    }

    #[test]
    fn test_normalize_nulls_nested() {
        let mut props = json!({"a": null, "b": {"c": null, "d": 1}, "e": [null]})
            .as_object()
            .cloned()
            .unwrap();
        normalize_nulls(&mut props);

        assert_eq!(props["a"], json!(""));
        assert_eq!(props["b"]["c"], json!(""));
        assert_eq!(props["b"]["d"], json!(1));
        assert_eq!(props["e"], json!([null]));
    }

    #[test]
    fn test_property_order_is_preserved() {
        let raw = br#"{"type":"FeatureCollection","features":[
            {"type":"Feature","geometry":null,"properties":{"zeta":1,"alpha":2,"mid":3}}
        ]}"#;
        let collection = FeatureCollection::from_slice(raw, "inline").unwrap();
        let keys: Vec<_> = collection.features[0].properties.keys().cloned().collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_visit_positions_all_geometry_types() {
        let geometry = Geometry::GeometryCollection {
            geometries: vec![
                Geometry::Point {
                    coordinates: vec![0.0, 0.0],
                },
                Geometry::Polygon {
                    coordinates: vec![vec![vec![1.0, 1.0], vec![2.0, 1.0], vec![2.0, 2.0]]],
                },
                Geometry::MultiPolygon {
                    coordinates: vec![vec![vec![vec![-3.0, 4.0, 100.0]]]],
                },
                Geometry::LineString {
                    coordinates: vec![vec![5.0]],
                },
            ],
        };

        let mut seen = Vec::new();
        geometry.visit_positions(&mut |x, y| seen.push((x, y)));
        assert_eq!(
            seen,
            vec![(0.0, 0.0), (1.0, 1.0), (2.0, 1.0), (2.0, 2.0), (-3.0, 4.0)]
        );
    }
}
