//! Highlight state machine.
//!
//! Every transition takes the current [`EngineState`] by value and returns the
//! next one together with the ordered [`MapMutation`]s that bring the map in
//! line with it. Nothing here talks to the map directly; the engine applies the
//! mutations in the order given.

use std::sync::Arc;

use itertools::Itertools;
use map_search_data::{Feature, FeatureCollection};
use serde::{Serialize, Serializer, ser::SerializeSeq};
use serde_json::Value;
use tracing::{debug, instrument, warn};

pub use layers::{HighlightLayerSpec, OverlayKind};

use crate::config::{HighlightKeyStrategy, LayerConfig};
use crate::host::MapHost;
use crate::zoom::{BoundingBox, FitBoundsOptions, ViewHints, ViewportZoomer};

mod layers;

/// Suffix of every highlight overlay id, and the key of the match-nothing filter.
pub const HIGHLIGHT_ID: &str = "_highlighted_search__";

/// A membership filter, serialized as `["in", key, value, ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    key: String,
    values: Vec<Value>,
}

impl FilterExpr {
    pub fn matching(key: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            key: key.into(),
            values,
        }
    }

    /// Filter that matches no feature: `["in", "_highlighted_search__", ""]`.
    #[must_use]
    pub fn empty_match() -> Self {
        Self::matching(HIGHLIGHT_ID, vec![Value::String(String::new())])
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    #[must_use]
    pub fn is_empty_match(&self) -> bool {
        *self == Self::empty_match()
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut expr = Vec::with_capacity(self.values.len() + 2);
        expr.push(Value::from("in"));
        expr.push(Value::from(self.key.as_str()));
        expr.extend(self.values.iter().cloned());
        Value::Array(expr)
    }
}

impl Serialize for FilterExpr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.values.len() + 2))?;
        seq.serialize_element("in")?;
        seq.serialize_element(&self.key)?;
        for value in &self.values {
            seq.serialize_element(value)?;
        }
        seq.end()
    }
}

/// A change the engine asks the map host to make.
#[derive(Debug, Clone, PartialEq)]
pub enum MapMutation {
    SetFilter { layer_id: String, filter: FilterExpr },
    FitBounds {
        bounds: BoundingBox,
        options: FitBoundsOptions,
    },
}

impl MapMutation {
    fn clear(layer: &LayerConfig) -> Self {
        Self::SetFilter {
            layer_id: layer.highlight_layer_id(),
            filter: FilterExpr::empty_match(),
        }
    }

    pub fn apply<H: MapHost + ?Sized>(&self, host: &mut H) {
        match self {
            Self::SetFilter { layer_id, filter } => host.set_filter(layer_id, filter),
            Self::FitBounds { bounds, options } => host.fit_bounds(*bounds, *options),
        }
    }
}

/// A suggestion picked in the text-search UI.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    /// Property the query matched on.
    pub key: String,
    /// Matched property value.
    pub value: Value,
}

impl Selection {
    pub fn new(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Strict equality of the feature's `key` property with the selected value.
    #[must_use]
    pub fn matches(&self, feature: &Feature) -> bool {
        feature.property(&self.key) == Some(&self.value)
    }

    /// The value as the search input should show it.
    #[must_use]
    pub fn display_value(&self) -> String {
        match &self.value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightPhase {
    Idle,
    Highlighted,
}

/// Single source of truth for the active layer and its highlight.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub active_layer: LayerConfig,
    /// Layer left by the last switch, until its highlight has been cleared.
    pub previous_layer: Option<LayerConfig>,
    pub highlight_visible: bool,
    pub current_features: Arc<FeatureCollection>,
}

impl EngineState {
    #[must_use]
    pub fn new(active_layer: LayerConfig, features: Arc<FeatureCollection>) -> Self {
        Self {
            active_layer,
            previous_layer: None,
            highlight_visible: false,
            current_features: features,
        }
    }

    #[must_use]
    pub fn phase(&self) -> HighlightPhase {
        if self.highlight_visible {
            HighlightPhase::Highlighted
        } else {
            HighlightPhase::Idle
        }
    }
}

/// Result of a highlight transition.
#[derive(Debug, Clone)]
pub struct Transition {
    pub state: EngineState,
    /// Mutations to apply, in order.
    pub mutations: Vec<MapMutation>,
    /// Text the search input should show afterwards, when it changes.
    pub display_value: Option<String>,
}

impl Transition {
    fn unchanged(state: EngineState) -> Self {
        Self {
            state,
            mutations: Vec::new(),
            display_value: None,
        }
    }
}

pub struct HighlightController;

impl HighlightController {
    /// Highlight the features matching `selection` on the active layer.
    ///
    /// A pending previous-layer highlight is cleared first. When the layer zooms
    /// on search a viewport fit follows the filter; a failed fit is logged and
    /// the highlight still applies.
    #[instrument(name = "Highlight selection", level = "debug", skip_all, fields(layer = %state.active_layer.display_name, key = %selection.key))]
    pub fn select(
        mut state: EngineState,
        selection: &Selection,
        strategy: HighlightKeyStrategy,
        view: ViewHints,
    ) -> Transition {
        let mut mutations = Vec::with_capacity(3);

        if let Some(previous) = state.previous_layer.take() {
            debug!(layer = %previous.display_name, "Clearing highlight of previous layer");
            mutations.push(MapMutation::clear(&previous));
        }

        let layer = &state.active_layer;
        mutations.push(MapMutation::SetFilter {
            layer_id: layer.highlight_layer_id(),
            filter: Self::selection_filter(layer, &state.current_features.features, selection, strategy),
        });

        if layer.zooms_on_search() {
            match ViewportZoomer::zoom_to(&state.current_features.features, selection, view) {
                Ok(fit) => mutations.push(fit),
                Err(e) => warn!(error = %e, "Skipping zoom to selection"),
            }
        }

        state.highlight_visible = true;
        Transition {
            state,
            mutations,
            display_value: Some(selection.display_value()),
        }
    }

    /// Clear the active and any previous layer highlight.
    #[instrument(name = "Clear highlight", level = "debug", skip_all)]
    pub fn clear(mut state: EngineState) -> Transition {
        let mut mutations = Vec::with_capacity(2);
        if let Some(previous) = state.previous_layer.take() {
            mutations.push(MapMutation::clear(&previous));
        }
        mutations.push(MapMutation::clear(&state.active_layer));

        state.highlight_visible = false;
        Transition {
            state,
            mutations,
            display_value: None,
        }
    }

    /// React to raw input edits: emptying the input clears a visible highlight.
    pub fn input_changed(state: EngineState, text: &str) -> Transition {
        if text.is_empty() && state.highlight_visible {
            Self::clear(state)
        } else {
            Transition::unchanged(state)
        }
    }

    /// Make `new_layer` active with freshly loaded features.
    ///
    /// The filter of the layer being left is cleared before anything else and
    /// the layer is remembered as `previous_layer`.
    #[instrument(name = "Switch highlight layer", level = "debug", skip_all, fields(from = %state.active_layer.display_name, to = %new_layer.display_name))]
    pub fn switch_layer(
        state: EngineState,
        new_layer: LayerConfig,
        features: Arc<FeatureCollection>,
    ) -> Transition {
        let left = state.active_layer;
        let mutations = vec![MapMutation::clear(&left)];

        Transition {
            state: EngineState {
                active_layer: new_layer,
                previous_layer: Some(left),
                highlight_visible: false,
                current_features: features,
            },
            mutations,
            display_value: None,
        }
    }

    fn selection_filter(
        layer: &LayerConfig,
        features: &[Feature],
        selection: &Selection,
        strategy: HighlightKeyStrategy,
    ) -> FilterExpr {
        let unique_id = match (strategy, layer.unique_feature_id()) {
            (HighlightKeyStrategy::UniqueFeatureIdLookup, Some(unique_id)) => unique_id,
            (HighlightKeyStrategy::UniqueFeatureIdLookup, None) => {
                warn!(layer = %layer.display_name, "Layer has no unique feature id, filtering on the matched value");
                return FilterExpr::matching(&selection.key, vec![selection.value.clone()]);
            }
            (HighlightKeyStrategy::MatchedValue, _) => {
                return FilterExpr::matching(&selection.key, vec![selection.value.clone()]);
            }
        };

        let ids: Vec<Value> = features
            .iter()
            .filter(|f| selection.matches(f))
            .filter_map(|f| f.property(unique_id).cloned())
            .unique_by(ToString::to_string)
            .collect();

        if ids.is_empty() {
            debug!(key = %selection.key, "No feature matches the selection");
            return FilterExpr::empty_match();
        }
        FilterExpr::matching(unique_id, ids)
    }
}
