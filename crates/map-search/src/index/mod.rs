//! Projection of a layer's features into searchable records and keys.

use std::sync::Arc;

use itertools::Itertools;
use map_search_data::{Feature, Properties, normalize_nulls};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::{ControlOptions, LayerConfig};

/// Records and searchable keys of one layer, consumed by the text-search UI.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuggestionIndex {
    /// One property mapping per feature, with no `null` values.
    pub records: Vec<Properties>,
    /// Properties the UI may match on.
    pub keys: Vec<String>,
}

impl SuggestionIndex {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub struct SuggestionIndexBuilder;

impl SuggestionIndexBuilder {
    /// Build the index of `layer` from its features.
    ///
    /// Keys are the layer's `searchProperties` when given. Otherwise they are the
    /// first feature's property names, minus `excludedProperties`.
    #[instrument(name = "Build suggestion index", level = "debug", skip_all, fields(layer = %layer.display_name, features = features.len()))]
    pub fn build(features: &[Feature], layer: &LayerConfig) -> SuggestionIndex {
        let records: Vec<Properties> = features
            .iter()
            .map(|feature| {
                let mut properties = feature.properties.clone();
                normalize_nulls(&mut properties);
                properties
            })
            .collect();

        let keys = match (&layer.search_properties, &layer.excluded_properties) {
            (Some(search), _) => search.clone(),
            (None, excluded) => records
                .first()
                .map(|first| {
                    first
                        .keys()
                        .filter(|key| excluded.as_ref().is_none_or(|ex| !ex.contains(*key)))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default(),
        };

        debug!(records = records.len(), keys = ?keys, "Suggestion index built");
        SuggestionIndex { records, keys }
    }
}

/// One match produced by the text-search UI.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCandidate {
    /// Property that matched.
    pub key: String,
    /// Value that matched.
    pub value: Value,
    /// Position of the matching record in [`SuggestionIndex::records`].
    pub record: usize,
}

impl SearchCandidate {
    pub fn new(key: impl Into<String>, value: impl Into<Value>, record: usize) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            record,
        }
    }
}

/// Drop candidates whose `(key, value)` pair was already seen, keeping the
/// first occurrence and the original order.
pub fn dedup_candidates<I>(candidates: I) -> Vec<SearchCandidate>
where
    I: IntoIterator<Item = SearchCandidate>,
{
    candidates
        .into_iter()
        .unique_by(|c| (c.key.clone(), c.value.to_string()))
        .collect()
}

/// Everything the text-search UI needs for the active layer.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchFeed {
    /// Display name of the layer the feed was built from.
    pub layer: String,
    /// Layer-switch generation the feed belongs to.
    pub generation: u64,
    pub index: Arc<SuggestionIndex>,
    /// Characters typed before suggestions show.
    pub threshold: usize,
    pub max_results: usize,
    pub placeholder: String,
    pub dedup_enabled: bool,
}

impl SearchFeed {
    pub(crate) fn new(
        layer: &LayerConfig,
        generation: u64,
        index: SuggestionIndex,
        options: &ControlOptions,
        dedup_enabled: bool,
    ) -> Self {
        Self {
            layer: layer.display_name.clone(),
            generation,
            index: Arc::new(index),
            threshold: options.character_threshold,
            max_results: options.max_results,
            placeholder: options.placeholder_text.clone(),
            dedup_enabled,
        }
    }

    /// Whether `query` is long enough to ask for suggestions.
    #[must_use]
    pub fn accepts(&self, query: &str) -> bool {
        query.chars().count() >= self.threshold
    }

    /// Post-process ranked candidates: dedup when enabled, then cap at `max_results`.
    pub fn filter<I>(&self, candidates: I) -> Vec<SearchCandidate>
    where
        I: IntoIterator<Item = SearchCandidate>,
    {
        let candidates: Vec<SearchCandidate> = if self.dedup_enabled {
            dedup_candidates(candidates)
        } else {
            candidates.into_iter().collect()
        };
        candidates.into_iter().take(self.max_results).collect()
    }
}
