use std::io::Write;

use serde_json::{Value, json};
use tempfile::NamedTempFile;
use tracing::info;

use super::error::Result;
use crate::{Feature, FeatureCollection, Geometry, Properties};

/// Configuration for test data generation
#[derive(Debug, Clone)]
pub struct TestDataConfig {
    /// Number of park features to generate
    pub park_rows: usize,
    /// Every n-th park gets a `null` name (0 disables)
    pub null_name_every: usize,
    /// Whether to use realistic data or the two-park minimal fixture
    pub realistic_data: bool,
}

impl Default for TestDataConfig {
    fn default() -> Self {
        Self {
            park_rows: 20,
            null_name_every: 5,
            realistic_data: true,
        }
    }
}

impl TestDataConfig {
    /// Minimal data for unit tests
    pub fn minimal() -> Self {
        Self {
            park_rows: 2,
            null_name_every: 2,
            realistic_data: false,
        }
    }

    /// Sample data for integration tests
    pub fn sample() -> Self {
        Self::default()
    }
}

/// Write a parks feature collection to a temporary `.geojson` file.
pub fn create_test_data(config: &TestDataConfig) -> Result<NamedTempFile> {
    info!("Creating test data with config: {:?}", config);

    let collection = if config.realistic_data {
        sample_parks(config)
    } else {
        parks()
    };

    let mut file = NamedTempFile::with_suffix(".geojson")?;
    let body = serde_json::to_vec(&collection).map_err(std::io::Error::other)?;
    file.write_all(&body)?;
    file.flush()?;
    Ok(file)
}

/// Two parks, the second with a `null` name.
///
/// `{id: 1, name: "Lakeview"}` covers `[0, 0]..[2, 1]`, `{id: 2, name: null}`
/// covers `[10, 10]..[11, 11]`.
pub fn parks() -> FeatureCollection {
    FeatureCollection::new(vec![
        feature(
            square(0.0, 0.0, 2.0, 1.0),
            json!({"id": 1, "name": "Lakeview"}),
        ),
        feature(square(10.0, 10.0, 11.0, 11.0), json!({"id": 2, "name": null})),
    ])
}

/// Three trails; two share the name "Ridge Loop".
pub fn trails() -> FeatureCollection {
    FeatureCollection::new(vec![
        feature(
            Geometry::LineString {
                coordinates: vec![vec![-1.0, -1.0], vec![-2.0, -3.0]],
            },
            json!({"trail_id": "t-1", "name": "Ridge Loop", "surface": "gravel"}),
        ),
        feature(
            Geometry::LineString {
                coordinates: vec![vec![4.0, 4.0], vec![6.0, 5.0]],
            },
            json!({"trail_id": "t-2", "name": "Ridge Loop", "surface": "dirt"}),
        ),
        feature(
            Geometry::LineString {
                coordinates: vec![vec![7.0, 7.0], vec![8.0, 9.0]],
            },
            json!({"trail_id": "t-3", "name": "Creek Walk", "surface": null}),
        ),
    ])
}

const PARK_NAMES: [&str; 6] = [
    "Lakeview",
    "Riverside",
    "Oak Hollow",
    "Pine Ridge",
    "Harbor Point",
    "Meadowbrook",
];

fn sample_parks(config: &TestDataConfig) -> FeatureCollection {
    let features = (0..config.park_rows)
        .map(|i| {
            let name = if config.null_name_every > 0 && (i + 1) % config.null_name_every == 0 {
                Value::Null
            } else {
                json!(PARK_NAMES[i % PARK_NAMES.len()])
            };
            let x = i as f64;
            feature(
                square(x, x, x + 0.5, x + 0.5),
                json!({"id": i + 1, "name": name, "district": format!("D{}", i % 3)}),
            )
        })
        .collect();
    FeatureCollection::new(features)
}

fn square(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Geometry {
    Geometry::Polygon {
        coordinates: vec![vec![
            vec![min_x, min_y],
            vec![max_x, min_y],
            vec![max_x, max_y],
            vec![min_x, max_y],
            vec![min_x, min_y],
        ]],
    }
}

fn feature(geometry: Geometry, properties: Value) -> Feature {
    let properties: Properties = match properties {
        Value::Object(map) => map,
        _ => Properties::new(),
    };
    Feature::new(Some(geometry), properties)
}
