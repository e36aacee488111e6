//! Layer registry: validation of raw control options and the layer picker model.
//!
//! Raw options arrive as loosely typed JSON (the shape an integrator would hand
//! a map control). Every check runs before anything touches the map, so a bad
//! configuration never leaves the map half initialized.

use ahash::AHashSet;
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::config::{
    ConfigError, ControlOptions, ControlOptionsBuilder, GeometryType, LayerConfig,
};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+(?:-[A-Za-z0-9_]+)*$").expect("identifier pattern is valid")
});

/// Validated, immutable set of layers and global options of one control.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRegistry {
    options: ControlOptions,
}

impl LayerRegistry {
    /// Wrap already built options, re-running the shared checks.
    pub fn new(options: ControlOptions) -> Result<Self, ConfigError> {
        check_options(&options)?;
        Ok(Self { options })
    }

    /// Validate and normalize raw JSON options.
    ///
    /// Numeric options are rounded half-up (`4.6 → 5`, `2.5 → 3`); non-numeric
    /// values are rejected rather than coerced.
    #[instrument(name = "Validate control options", level = "debug", skip_all)]
    pub fn from_json(raw: &Value) -> Result<Self, ConfigError> {
        let raw = raw.as_object().ok_or(ConfigError::NotAnObject)?;
        let mut builder = ControlOptionsBuilder::new();

        if let Some(class) = optional_identifier(raw, "containerClass")? {
            builder = builder.container_class(class);
        }
        if let Some(id) = optional_identifier(raw, "inputID")? {
            builder = builder.input_id(id);
        }
        if let Some(id) = optional_identifier(raw, "btnID")? {
            builder = builder.btn_id(id);
        }

        let max_results = raw
            .get("maxResults")
            .filter(|value| !value.is_null())
            .or_else(|| raw.get("maxSuggest"));
        if let Some(max_results) = optional_count(max_results, "maxResults")? {
            builder = builder.max_results(max_results);
        }
        if let Some(threshold) = optional_count(raw.get("characterThreshold"), "characterThreshold")? {
            builder = builder.character_threshold(threshold);
        }
        match raw.get("placeholderText") {
            None | Some(Value::Null) => {}
            Some(Value::String(text)) => builder = builder.placeholder_text(text.clone()),
            Some(other) => {
                return Err(ConfigError::NotAString {
                    option: "placeholderText",
                    value: other.to_string(),
                });
            }
        }
        match raw.get("cacheBust") {
            None | Some(Value::Null) => {}
            Some(Value::Bool(cache_bust)) => builder = builder.cache_bust(*cache_bust),
            Some(other) => {
                return Err(ConfigError::NotABoolean {
                    option: "cacheBust",
                    value: other.to_string(),
                });
            }
        }

        let layers = match raw.get("layers") {
            None | Some(Value::Null) => return Err(ConfigError::MissingLayers),
            Some(Value::Array(layers)) => layers,
            Some(_) => return Err(ConfigError::LayersNotSequence),
        };
        for (position, layer) in layers.iter().enumerate() {
            builder = builder.layer(parse_layer(position, layer)?);
        }

        let options = builder.build()?;
        debug!(layers = options.layers.len(), "Control options validated");
        Ok(Self { options })
    }

    #[must_use]
    pub fn options(&self) -> &ControlOptions {
        &self.options
    }

    #[must_use]
    pub fn layers(&self) -> &[LayerConfig] {
        &self.options.layers
    }

    /// The layer loaded when the control activates.
    #[must_use]
    pub fn first(&self) -> &LayerConfig {
        // check_options guarantees at least one layer
        &self.options.layers[0]
    }

    #[must_use]
    pub fn layer(&self, display_name: &str) -> Option<&LayerConfig> {
        self.options
            .layers
            .iter()
            .find(|layer| layer.display_name == display_name)
    }

    /// Group layers for the layer picker.
    ///
    /// One group per distinct category in first-seen order; uncategorized
    /// layers share a group without a label. Group ids start at 1.
    #[must_use]
    pub fn picker_groups(&self, selected: &str) -> Vec<PickerGroup> {
        self.options
            .layers
            .iter()
            .map(|layer| layer.category.as_deref())
            .unique()
            .enumerate()
            .map(|(i, category)| PickerGroup {
                id: i + 1,
                label: category.map(ToString::to_string),
                choices: self
                    .options
                    .layers
                    .iter()
                    .filter(|layer| layer.category.as_deref() == category)
                    .map(|layer| PickerChoice {
                        value: layer.display_name.clone(),
                        label: layer.display_name.clone(),
                        selected: layer.display_name == selected,
                    })
                    .collect(),
            })
            .collect()
    }
}

/// A group of choices in the layer picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerGroup {
    pub id: usize,
    /// `None` for uncategorized layers.
    pub label: Option<String>,
    pub choices: Vec<PickerChoice>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerChoice {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

/// Checks shared by the JSON and builder paths.
pub(crate) fn check_options(options: &ControlOptions) -> Result<(), ConfigError> {
    check_identifier("containerClass", &options.container_class)?;
    check_identifier("inputID", &options.input_id)?;
    check_identifier("btnID", &options.btn_id)?;

    if options.layers.is_empty() {
        return Err(ConfigError::NoLayers);
    }

    let mut names = AHashSet::with_capacity(options.layers.len());
    for layer in &options.layers {
        if layer.source.is_empty() {
            return Err(ConfigError::InvalidLayerField {
                layer: layer.display_name.clone(),
                field: "source",
                reason: "must be a non-empty string",
            });
        }
        if layer.display_name.is_empty() {
            return Err(ConfigError::InvalidLayerField {
                layer: layer.source.clone(),
                field: "displayName",
                reason: "must be a non-empty string",
            });
        }
        if !names.insert(layer.display_name.as_str()) {
            return Err(ConfigError::DuplicateDisplayName(layer.display_name.clone()));
        }
        if layer.search_properties.is_some() && layer.excluded_properties.is_some() {
            return Err(ConfigError::ConflictingPropertyFilters(
                layer.display_name.clone(),
            ));
        }
    }
    Ok(())
}

fn check_identifier(option: &'static str, value: &str) -> Result<(), ConfigError> {
    if IDENTIFIER.is_match(value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidIdentifier {
            option,
            value: value.to_string(),
        })
    }
}

fn optional_identifier(
    raw: &Map<String, Value>,
    option: &'static str,
) -> Result<Option<String>, ConfigError> {
    match raw.get(option) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => {
            check_identifier(option, value)?;
            Ok(Some(value.clone()))
        }
        Some(other) => Err(ConfigError::InvalidIdentifier {
            option,
            value: other.to_string(),
        }),
    }
}

/// Round half-up, matching `Math.round` for the option values users write.
pub(crate) fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

fn optional_count(value: Option<&Value>, option: &'static str) -> Result<Option<usize>, ConfigError> {
    let number = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(number)) => number.as_f64().ok_or(ConfigError::NotANumber {
            option,
            value: number.to_string(),
        })?,
        Some(other) => {
            return Err(ConfigError::NotANumber {
                option,
                value: other.to_string(),
            });
        }
    };

    let rounded = round_half_up(number);
    if !rounded.is_finite() || rounded < 0.0 {
        return Err(ConfigError::NumberOutOfRange {
            option,
            value: number,
        });
    }
    Ok(Some(rounded as usize))
}

fn parse_layer(position: usize, raw: &Value) -> Result<LayerConfig, ConfigError> {
    let fallback_name = format!("#{position}");
    let raw = raw.as_object().ok_or_else(|| ConfigError::InvalidLayerField {
        layer: fallback_name.clone(),
        field: "layer",
        reason: "must be an object",
    })?;
    let name = match raw.get("displayName") {
        Some(Value::String(name)) => name.clone(),
        _ => {
            return Err(ConfigError::InvalidLayerField {
                layer: fallback_name,
                field: "displayName",
                reason: "must be a non-empty string",
            });
        }
    };
    let source = required_string(raw, &name, "source")?;

    let mut builder = LayerConfig::builder(source, name.clone());
    if let Some(category) = optional_string(raw, &name, "category")? {
        builder = builder.category(category);
    }
    let geometry = match optional_string(raw, &name, "geometryType")? {
        Some(kind) => Some(kind),
        None => optional_string(raw, &name, "type")?,
    };
    if let Some(kind) = geometry {
        builder = builder.geometry_type(GeometryType::from_name(&kind));
    }
    if let Some(id) = optional_string(raw, &name, "uniqueFeatureID")? {
        builder = builder.unique_feature_id(id);
    }
    if let Some(properties) = optional_string_list(raw, &name, "searchProperties")? {
        builder = builder.search_properties(properties);
    }
    if let Some(properties) = optional_string_list(raw, &name, "excludedProperties")? {
        builder = builder.excluded_properties(properties);
    }
    if let Some(path) = optional_string(raw, &name, "dataPath")? {
        builder = builder.data_path(path);
    }
    if let Some(color) = optional_string(raw, &name, "highlightColor")? {
        builder = builder.highlight_color(color);
    }
    match raw.get("zoomOnSearch") {
        None | Some(Value::Null) => {}
        Some(Value::Bool(zoom)) => builder = builder.zoom_on_search(*zoom),
        Some(_) => {
            return Err(ConfigError::InvalidLayerField {
                layer: name,
                field: "zoomOnSearch",
                reason: "must be a boolean",
            });
        }
    }

    Ok(builder.build())
}

fn required_string(
    raw: &Map<String, Value>,
    layer: &str,
    field: &'static str,
) -> Result<String, ConfigError> {
    optional_string(raw, layer, field)?.ok_or_else(|| ConfigError::InvalidLayerField {
        layer: layer.to_string(),
        field,
        reason: "must be a non-empty string",
    })
}

fn optional_string(
    raw: &Map<String, Value>,
    layer: &str,
    field: &'static str,
) -> Result<Option<String>, ConfigError> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(_) => Err(ConfigError::InvalidLayerField {
            layer: layer.to_string(),
            field,
            reason: "must be a string",
        }),
    }
}

fn optional_string_list(
    raw: &Map<String, Value>,
    layer: &str,
    field: &'static str,
) -> Result<Option<Vec<String>>, ConfigError> {
    let invalid = || ConfigError::InvalidLayerField {
        layer: layer.to_string(),
        field,
        reason: "must be an array of strings",
    };
    match raw.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(values)) => values
            .iter()
            .map(|value| value.as_str().map(ToString::to_string).ok_or_else(invalid))
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parks_layer() -> Value {
        json!({
            "source": "parks",
            "displayName": "Parks",
            "uniqueFeatureID": "id",
            "searchProperties": ["name"],
            "type": "polygon"
        })
    }

    #[test]
    fn test_defaults_applied() {
        let registry = LayerRegistry::from_json(&json!({"layers": [parks_layer()]})).unwrap();
        let options = registry.options();
        assert_eq!(options.max_results, 5);
        assert_eq!(options.character_threshold, 2);
        assert_eq!(options.placeholder_text, "Search...");
        assert_eq!(options.container_class, "map-search-container");
        assert_eq!(registry.first().geometry_type, GeometryType::Polygon);
        assert_eq!(registry.first().highlight_color, "#ff0");
    }

    #[test]
    fn test_max_results_rounds_half_up() {
        let registry =
            LayerRegistry::from_json(&json!({"layers": [parks_layer()], "maxResults": 4.6}))
                .unwrap();
        assert_eq!(registry.options().max_results, 5);

        let registry =
            LayerRegistry::from_json(&json!({"layers": [parks_layer()], "maxResults": 2.5}))
                .unwrap();
        assert_eq!(registry.options().max_results, 3);

        let registry = LayerRegistry::from_json(
            &json!({"layers": [parks_layer()], "characterThreshold": 1.4}),
        )
        .unwrap();
        assert_eq!(registry.options().character_threshold, 1);
    }

    #[test]
    fn test_max_suggest_alias() {
        let registry =
            LayerRegistry::from_json(&json!({"layers": [parks_layer()], "maxSuggest": 8}))
                .unwrap();
        assert_eq!(registry.options().max_results, 8);

        let registry = LayerRegistry::from_json(
            &json!({"layers": [parks_layer()], "maxResults": null, "maxSuggest": 8}),
        )
        .unwrap();
        assert_eq!(registry.options().max_results, 8);
    }

    #[test]
    fn test_cache_bust_must_be_boolean() {
        let registry =
            LayerRegistry::from_json(&json!({"layers": [parks_layer()], "cacheBust": false}))
                .unwrap();
        assert!(!registry.options().cache_bust);

        let err = LayerRegistry::from_json(&json!({"layers": [parks_layer()], "cacheBust": "no"}))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotABoolean {
                option: "cacheBust",
                ..
            }
        ));
    }

    #[test]
    fn test_round_half_up_matches_math_round() {
        assert_eq!(round_half_up(4.6), 5.0);
        assert_eq!(round_half_up(4.5), 5.0);
        assert_eq!(round_half_up(4.4), 4.0);
        assert_eq!(round_half_up(-2.5), -2.0);
    }

    #[test]
    fn test_non_numeric_rejected() {
        let err = LayerRegistry::from_json(&json!({"layers": [parks_layer()], "maxResults": "5"}))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotANumber {
                option: "maxResults",
                ..
            }
        ));

        let err = LayerRegistry::from_json(
            &json!({"layers": [parks_layer()], "characterThreshold": true}),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NotANumber {
                option: "characterThreshold",
                ..
            }
        ));
    }

    #[test]
    fn test_negative_count_rejected() {
        let err = LayerRegistry::from_json(&json!({"layers": [parks_layer()], "maxResults": -3}))
            .unwrap_err();
        assert!(matches!(err, ConfigError::NumberOutOfRange { .. }));
    }

    #[test]
    fn test_identifier_validation() {
        for good in ["search", "my-search", "a_b-c_d", "x1-2-3"] {
            assert!(
                LayerRegistry::from_json(&json!({"layers": [parks_layer()], "inputID": good}))
                    .is_ok(),
                "{good} should be accepted"
            );
        }
        for bad in ["", "-lead", "trail-", "double--dash", "has space", "dot.ted", "ünï"] {
            let err = LayerRegistry::from_json(
                &json!({"layers": [parks_layer()], "containerClass": bad}),
            )
            .unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidIdentifier { option: "containerClass", .. }),
                "{bad} should be rejected"
            );
        }
        let err =
            LayerRegistry::from_json(&json!({"layers": [parks_layer()], "btnID": "b t n"}))
                .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidIdentifier { option: "btnID", .. }));
    }

    #[test]
    fn test_layers_shape() {
        assert_eq!(
            LayerRegistry::from_json(&json!({})).unwrap_err(),
            ConfigError::MissingLayers
        );
        assert_eq!(
            LayerRegistry::from_json(&json!({"layers": {"source": "x"}})).unwrap_err(),
            ConfigError::LayersNotSequence
        );
        assert_eq!(
            LayerRegistry::from_json(&json!({"layers": []})).unwrap_err(),
            ConfigError::NoLayers
        );
        assert_eq!(
            LayerRegistry::from_json(&json!([parks_layer()])).unwrap_err(),
            ConfigError::NotAnObject
        );
    }

    #[test]
    fn test_conflicting_property_filters_rejected() {
        let mut layer = parks_layer();
        layer["excludedProperties"] = json!(["id"]);
        let err = LayerRegistry::from_json(&json!({"layers": [layer]})).unwrap_err();
        assert_eq!(err, ConfigError::ConflictingPropertyFilters("Parks".to_string()));
    }

    #[test]
    fn test_duplicate_display_names_rejected() {
        let err = LayerRegistry::from_json(&json!({"layers": [parks_layer(), parks_layer()]}))
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateDisplayName("Parks".to_string()));
    }

    #[test]
    fn test_missing_unique_id_is_left_to_the_loader() {
        let registry = LayerRegistry::from_json(
            &json!({"layers": [{"source": "parks", "displayName": "Parks"}]}),
        )
        .unwrap();
        assert_eq!(registry.first().unique_feature_id(), None);
    }

    #[test]
    fn test_bad_layer_fields_rejected() {
        let err = LayerRegistry::from_json(
            &json!({"layers": [{"source": "parks", "displayName": "Parks", "zoomOnSearch": "no"}]}),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLayerField { field: "zoomOnSearch", .. }));

        let err = LayerRegistry::from_json(
            &json!({"layers": [{"source": "parks", "displayName": "Parks", "searchProperties": "name"}]}),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLayerField { field: "searchProperties", .. }));

        let err = LayerRegistry::from_json(&json!({"layers": [{"displayName": "Parks"}]}))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLayerField { field: "source", .. }));
    }

    #[test]
    fn test_picker_groups() {
        let registry = LayerRegistry::from_json(&json!({"layers": [
            {"source": "parks", "displayName": "Parks", "category": "Recreation"},
            {"source": "roads", "displayName": "Roads"},
            {"source": "trails", "displayName": "Trails", "category": "Recreation"},
            {"source": "rivers", "displayName": "Rivers", "category": "Water"},
            {"source": "bridges", "displayName": "Bridges"}
        ]}))
        .unwrap();

        let groups = registry.picker_groups("Trails");
        assert_eq!(groups.len(), 3);

        assert_eq!(groups[0].id, 1);
        assert_eq!(groups[0].label.as_deref(), Some("Recreation"));
        let names: Vec<_> = groups[0].choices.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(names, vec!["Parks", "Trails"]);
        assert!(!groups[0].choices[0].selected);
        assert!(groups[0].choices[1].selected);

        assert_eq!(groups[1].id, 2);
        assert_eq!(groups[1].label, None);
        let names: Vec<_> = groups[1].choices.iter().map(|c| c.value.as_str()).collect();
        assert_eq!(names, vec!["Roads", "Bridges"]);

        assert_eq!(groups[2].label.as_deref(), Some("Water"));
    }
}
