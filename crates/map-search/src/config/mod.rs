//! Control and layer configuration.
//!
//! [`ControlOptions`] is the validated, immutable configuration of one search
//! control. It is produced either from raw JSON options by
//! [`LayerRegistry::from_json`](crate::LayerRegistry::from_json) or with the
//! fluent [`ControlOptionsBuilder`]; both paths run the same checks.

pub use error::ConfigError;

use crate::highlight::HIGHLIGHT_ID;

pub const DEFAULT_MAX_RESULTS: usize = 5;
pub const DEFAULT_CHARACTER_THRESHOLD: usize = 2;
pub const DEFAULT_PLACEHOLDER_TEXT: &str = "Search...";
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "#ff0";
pub const DEFAULT_CONTAINER_CLASS: &str = "map-search-container";
pub const DEFAULT_INPUT_ID: &str = "map-search-input";
pub const DEFAULT_BTN_ID: &str = "map-search-btn";

/// How a layer's features are drawn, which decides the highlight overlay type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GeometryType {
    Polygon,
    LineString,
    Line,
    /// Points and anything unrecognised.
    #[default]
    Circle,
}

impl GeometryType {
    /// Map a configured type name; unknown names fall back to [`GeometryType::Circle`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "polygon" => Self::Polygon,
            "linestring" => Self::LineString,
            "line" => Self::Line,
            _ => Self::Circle,
        }
    }

    /// Whether the highlight overlay outlines the feature with a line.
    #[must_use]
    pub const fn is_outlined(self) -> bool {
        matches!(self, Self::Polygon | Self::LineString | Self::Line)
    }
}

/// Configuration of a single searchable layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerConfig {
    /// Id of the map source backing the layer.
    pub source: String,
    /// Label shown in the layer picker; unique per control.
    pub display_name: String,
    /// Optional picker group.
    pub category: Option<String>,
    pub geometry_type: GeometryType,
    /// Property identifying individual features. Required to load the layer.
    pub unique_feature_id: Option<String>,
    /// Allow-list of searchable properties.
    pub search_properties: Option<Vec<String>>,
    /// Deny-list of searchable properties.
    pub excluded_properties: Option<Vec<String>>,
    /// Override location of the raw features.
    pub data_path: Option<String>,
    pub highlight_color: String,
    /// `None` and `Some(true)` both zoom on selection.
    pub zoom_on_search: Option<bool>,
}

impl LayerConfig {
    pub fn builder(source: impl Into<String>, display_name: impl Into<String>) -> LayerConfigBuilder {
        LayerConfigBuilder::new(source, display_name)
    }

    #[must_use]
    pub fn zooms_on_search(&self) -> bool {
        self.zoom_on_search.unwrap_or(true)
    }

    /// Id of the highlight overlay added for this layer.
    #[must_use]
    pub fn highlight_layer_id(&self) -> String {
        format!("{}{HIGHLIGHT_ID}", self.source)
    }

    /// The configured unique feature id, if non-empty.
    #[must_use]
    pub fn unique_feature_id(&self) -> Option<&str> {
        self.unique_feature_id.as_deref().filter(|id| !id.is_empty())
    }

    /// The configured data path, if non-empty.
    #[must_use]
    pub fn data_path(&self) -> Option<&str> {
        self.data_path.as_deref().filter(|path| !path.is_empty())
    }
}

/// Builder for [`LayerConfig`] with the same defaults as raw options.
#[derive(Debug, Clone)]
pub struct LayerConfigBuilder {
    layer: LayerConfig,
}

impl LayerConfigBuilder {
    fn new(source: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            layer: LayerConfig {
                source: source.into(),
                display_name: display_name.into(),
                category: None,
                geometry_type: GeometryType::default(),
                unique_feature_id: None,
                search_properties: None,
                excluded_properties: None,
                data_path: None,
                highlight_color: DEFAULT_HIGHLIGHT_COLOR.to_string(),
                zoom_on_search: None,
            },
        }
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.layer.category = Some(category.into());
        self
    }

    pub fn geometry_type(mut self, geometry_type: GeometryType) -> Self {
        self.layer.geometry_type = geometry_type;
        self
    }

    pub fn unique_feature_id(mut self, property: impl Into<String>) -> Self {
        self.layer.unique_feature_id = Some(property.into());
        self
    }

    pub fn search_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layer.search_properties = Some(properties.into_iter().map(Into::into).collect());
        self
    }

    pub fn excluded_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.layer.excluded_properties = Some(properties.into_iter().map(Into::into).collect());
        self
    }

    pub fn data_path(mut self, path: impl Into<String>) -> Self {
        self.layer.data_path = Some(path.into());
        self
    }

    pub fn highlight_color(mut self, color: impl Into<String>) -> Self {
        self.layer.highlight_color = color.into();
        self
    }

    pub fn zoom_on_search(mut self, zoom: bool) -> Self {
        self.layer.zoom_on_search = Some(zoom);
        self
    }

    pub fn build(self) -> LayerConfig {
        self.layer
    }
}

/// Validated configuration of a search control.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlOptions {
    pub layers: Vec<LayerConfig>,
    /// Maximum number of suggestions shown.
    pub max_results: usize,
    /// Characters typed before suggestions appear.
    pub character_threshold: usize,
    pub placeholder_text: String,
    pub container_class: String,
    pub input_id: String,
    pub btn_id: String,
    /// Append a random query parameter when fetching layer data over HTTP.
    pub cache_bust: bool,
}

impl ControlOptions {
    pub fn builder() -> ControlOptionsBuilder {
        ControlOptionsBuilder::new()
    }
}

/// Fluent builder for [`ControlOptions`].
#[derive(Debug, Clone)]
pub struct ControlOptionsBuilder {
    options: ControlOptions,
}

impl Default for ControlOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlOptionsBuilder {
    /// Create a new builder with the documented defaults and no layers
    pub fn new() -> Self {
        Self {
            options: ControlOptions {
                layers: Vec::new(),
                max_results: DEFAULT_MAX_RESULTS,
                character_threshold: DEFAULT_CHARACTER_THRESHOLD,
                placeholder_text: DEFAULT_PLACEHOLDER_TEXT.to_string(),
                container_class: DEFAULT_CONTAINER_CLASS.to_string(),
                input_id: DEFAULT_INPUT_ID.to_string(),
                btn_id: DEFAULT_BTN_ID.to_string(),
                cache_bust: true,
            },
        }
    }

    /// Add a layer; the first layer added is loaded on activation
    pub fn layer(mut self, layer: LayerConfig) -> Self {
        self.options.layers.push(layer);
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.options.max_results = max_results;
        self
    }

    pub fn character_threshold(mut self, threshold: usize) -> Self {
        self.options.character_threshold = threshold;
        self
    }

    pub fn placeholder_text(mut self, text: impl Into<String>) -> Self {
        self.options.placeholder_text = text.into();
        self
    }

    pub fn container_class(mut self, class: impl Into<String>) -> Self {
        self.options.container_class = class.into();
        self
    }

    pub fn input_id(mut self, id: impl Into<String>) -> Self {
        self.options.input_id = id.into();
        self
    }

    pub fn btn_id(mut self, id: impl Into<String>) -> Self {
        self.options.btn_id = id.into();
        self
    }

    pub fn cache_bust(mut self, enabled: bool) -> Self {
        self.options.cache_bust = enabled;
        self
    }

    /// Validate and build the final configuration
    pub fn build(self) -> Result<ControlOptions, ConfigError> {
        crate::registry::check_options(&self.options)?;
        Ok(self.options)
    }
}

/// Which value the highlight filter isolates after a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HighlightKeyStrategy {
    /// Filter on the matched property and value: `["in", key, value]`.
    MatchedValue,
    /// Look up the `uniqueFeatureID` of every feature carrying the matched
    /// value and filter on those ids.
    #[default]
    UniqueFeatureIdLookup,
}

/// Behavioural switches of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub highlight_key_strategy: HighlightKeyStrategy,
    /// Collapse suggestions with the same matched key and value.
    pub dedup_enabled: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            highlight_key_strategy: HighlightKeyStrategy::default(),
            dedup_enabled: true,
        }
    }
}

impl EngineOptions {
    pub fn highlight_key_strategy(mut self, strategy: HighlightKeyStrategy) -> Self {
        self.highlight_key_strategy = strategy;
        self
    }

    pub fn dedup_enabled(mut self, enabled: bool) -> Self {
        self.dedup_enabled = enabled;
        self
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum ConfigError {
        #[error("options is not a valid object")]
        NotAnObject,
        #[error("{value} is not a valid string for an identifier ({option})")]
        InvalidIdentifier { option: &'static str, value: String },
        #[error("options.layers is required")]
        MissingLayers,
        #[error("options.layers is not an array")]
        LayersNotSequence,
        #[error("options.layers must contain at least one layer")]
        NoLayers,
        #[error("{value} is not a valid number for options.{option}")]
        NotANumber { option: &'static str, value: String },
        #[error("{value} is not a valid string for options.{option}")]
        NotAString { option: &'static str, value: String },
        #[error("{value} is not a valid boolean for options.{option}")]
        NotABoolean { option: &'static str, value: String },
        #[error("{value} is out of range for options.{option}")]
        NumberOutOfRange { option: &'static str, value: f64 },
        #[error("layer {layer}: {field} {reason}")]
        InvalidLayerField {
            layer: String,
            field: &'static str,
            reason: &'static str,
        },
        #[error("layer display name '{0}' is used more than once")]
        DuplicateDisplayName(String),
        #[error("options.uniqueFeatureID is required for every layer (missing on '{0}')")]
        MissingUniqueFeatureId(String),
        #[error(
            "both options.searchProperties and options.excludedProperties cannot be included at the same time (layer '{0}')"
        )]
        ConflictingPropertyFilters(String),
        #[error("source '{source_id}' of layer '{layer}' is not present on the map")]
        UnknownSource { layer: String, source_id: String },
        #[error("{source_id} layer is not a valid geojson (source type '{kind}')")]
        NotGeoJson { source_id: String, kind: String },
        #[error("no layer named '{0}' is configured")]
        UnknownLayer(String),
    }
}
