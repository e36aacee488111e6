//! The search control engine.
//!
//! [`SearchControl`] owns the validated configuration, the map host, the data
//! loader and the single [`EngineState`]. UI events come in as method calls;
//! the map is only ever changed by applying [`MapMutation`]s.

use std::sync::Arc;

use map_search_data::{DataOrigin, FeatureCollection, FeatureFetcher, LoadError};
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::config::{ConfigError, ControlOptions, EngineOptions, LayerConfig};
use crate::error::{MapSearchError, Result};
use crate::highlight::{
    EngineState, HighlightController, HighlightLayerSpec, MapMutation, Selection, Transition,
};
use crate::host::{HostReady, MapHost};
use crate::index::{SearchFeed, SuggestionIndexBuilder};
use crate::loader::DataLoader;
use crate::registry::{LayerRegistry, PickerGroup};

/// A layer load that has been requested but not yet applied.
///
/// Only the most recently requested load is applied; older ones are discarded
/// when they complete.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingLoad {
    pub generation: u64,
    pub layer: LayerConfig,
    pub origin: DataOrigin,
}

/// Search control bound to one map.
///
/// # Examples
///
/// ```rust,no_run
/// use map_search::{ControlOptions, LayerConfig, SearchControl, Selection, host_ready};
/// use map_search::host::{MapSource, recording::RecordingHost};
/// use map_search_data::{HttpFetcher, test_data};
///
/// # async fn run() -> map_search::error::Result<()> {
/// let options = ControlOptions::builder()
///     .layer(
///         LayerConfig::builder("parks", "Parks")
///             .unique_feature_id("id")
///             .search_properties(["name"])
///             .build(),
///     )
///     .build()?;
/// let host = RecordingHost::new().with_source("parks", MapSource::geojson_inline(test_data::parks()));
///
/// let mut control = SearchControl::new(options, host, HttpFetcher::new())?;
/// control.on_add()?;
///
/// let (signal, ready) = host_ready();
/// signal.fire();
/// let feed = control.activate(ready).await?;
/// println!("{} records searchable on {:?}", feed.index.len(), feed.index.keys);
///
/// control.select(&Selection::new("name", "Lakeview"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SearchControl<H, F> {
    registry: LayerRegistry,
    engine: EngineOptions,
    host: H,
    loader: DataLoader<F>,
    state: Option<EngineState>,
    feed: Option<SearchFeed>,
    generation: u64,
}

#[cfg(feature = "fetch")]
impl<H: MapHost> SearchControl<H, map_search_data::HttpFetcher> {
    /// Control fetching layer data over HTTP, honouring `options.cache_bust`.
    pub fn with_http(options: ControlOptions, host: H) -> Result<Self> {
        let fetcher = map_search_data::HttpFetcher::new().cache_bust(options.cache_bust);
        Self::new(options, host, fetcher)
    }
}

impl<H: MapHost, F: FeatureFetcher> SearchControl<H, F> {
    pub fn new(options: ControlOptions, host: H, fetcher: F) -> Result<Self> {
        Ok(Self {
            registry: LayerRegistry::new(options)?,
            engine: EngineOptions::default(),
            host,
            loader: DataLoader::new(fetcher),
            state: None,
            feed: None,
            generation: 0,
        })
    }

    /// Build a control from raw JSON options.
    pub fn from_json(raw: &Value, host: H, fetcher: F) -> Result<Self> {
        let registry = LayerRegistry::from_json(raw)?;
        Self::new(registry.options().clone(), host, fetcher)
    }

    #[must_use]
    pub fn with_engine_options(mut self, engine: EngineOptions) -> Self {
        self.engine = engine;
        self
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn engine_options(&self) -> EngineOptions {
        self.engine
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn loader(&self) -> &DataLoader<F> {
        &self.loader
    }

    /// Attach to the map: install one highlight overlay per layer.
    ///
    /// Every layer is checked and resolved against the host first, so a bad
    /// layer leaves the map untouched.
    #[instrument(name = "Attach search control", level = "info", skip_all)]
    pub fn on_add(&mut self) -> Result<()> {
        for layer in self.registry.layers() {
            DataLoader::<F>::resolve(layer, &self.host)?;
        }

        for layer in self.registry.layers() {
            if let Some(path) = layer.data_path() {
                debug!(source = %layer.source, path, "Pointing source at its data path");
                self.host.set_source_data(&layer.source, path);
            }
            self.host.add_layer(HighlightLayerSpec::for_layer(layer));
        }
        info!(layers = self.registry.layers().len(), "Highlight overlays installed");
        Ok(())
    }

    /// Wait for the host to be ready, then load the first layer.
    pub async fn activate(&mut self, ready: HostReady) -> Result<SearchFeed> {
        ready.wait().await?;
        self.populate().await
    }

    /// Load the first layer and start from a clean highlight state.
    #[instrument(name = "Populate search control", level = "info", skip_all)]
    pub async fn populate(&mut self) -> Result<SearchFeed> {
        self.generation += 1;
        let generation = self.generation;
        let layer = self.registry.first().clone();

        let collection = self.loader.load(&layer, &self.host).await?;
        let features = Arc::new(collection);
        let index = SuggestionIndexBuilder::build(&features.features, &layer);

        if let Some(previous) = self.state.take() {
            let cleared = HighlightController::clear(previous);
            self.apply(&cleared.mutations);
        }
        self.state = Some(EngineState::new(layer.clone(), features));

        let feed = SearchFeed::new(
            &layer,
            generation,
            index,
            self.registry.options(),
            self.engine.dedup_enabled,
        );
        self.feed = Some(feed.clone());
        Ok(feed)
    }

    /// Highlight the selection; returns the text the search input should show.
    pub fn select(&mut self, selection: &Selection) -> Result<Option<String>> {
        let view = self.host.view();
        let strategy = self.engine.highlight_key_strategy;
        self.transition(|state| HighlightController::select(state, selection, strategy, view))
    }

    pub fn input_changed(&mut self, text: &str) -> Result<()> {
        self.transition(|state| HighlightController::input_changed(state, text))?;
        Ok(())
    }

    pub fn clear_query(&mut self) -> Result<()> {
        self.transition(HighlightController::clear)?;
        Ok(())
    }

    /// Start switching to the layer named `display_name`.
    ///
    /// Configuration problems surface here. Only a returned load supersedes
    /// earlier ones.
    #[instrument(name = "Begin layer switch", level = "debug", skip(self))]
    pub fn begin_layer_switch(&mut self, display_name: &str) -> Result<PendingLoad> {
        if self.state.is_none() {
            return Err(MapSearchError::NotActive);
        }
        let layer = self
            .registry
            .layer(display_name)
            .ok_or_else(|| ConfigError::UnknownLayer(display_name.to_string()))?
            .clone();
        let origin = DataLoader::<F>::resolve(&layer, &self.host)?;

        // a rejected request never supersedes a load in flight
        self.generation += 1;
        Ok(PendingLoad {
            generation: self.generation,
            layer,
            origin,
        })
    }

    /// Apply the outcome of a pending load.
    ///
    /// Returns `None` when a newer switch has been requested since. A failed
    /// load leaves the active layer and feed untouched.
    #[instrument(name = "Complete layer switch", level = "debug", skip_all, fields(layer = %pending.layer.display_name, generation = pending.generation))]
    pub fn complete_layer_switch(
        &mut self,
        pending: PendingLoad,
        result: std::result::Result<FeatureCollection, LoadError>,
    ) -> Result<Option<SearchFeed>> {
        if pending.generation != self.generation {
            debug!(current = self.generation, "Discarding stale layer data");
            return Ok(None);
        }
        let state = self.state.take().ok_or(MapSearchError::NotActive)?;
        let collection = match result {
            Ok(collection) => collection,
            Err(e) => {
                self.state = Some(state);
                return Err(e.into());
            }
        };

        let features = Arc::new(collection);
        let index = SuggestionIndexBuilder::build(&features.features, &pending.layer);
        let transition = HighlightController::switch_layer(state, pending.layer, features);
        self.apply(&transition.mutations);

        let feed = SearchFeed::new(
            &transition.state.active_layer,
            pending.generation,
            index,
            self.registry.options(),
            self.engine.dedup_enabled,
        );
        info!(records = feed.index.len(), "Switched search layer");
        self.state = Some(transition.state);
        self.feed = Some(feed.clone());
        Ok(Some(feed))
    }

    /// Switch to another layer and wait for its data.
    pub async fn switch_layer(&mut self, display_name: &str) -> Result<Option<SearchFeed>> {
        let pending = self.begin_layer_switch(display_name)?;
        let result = self.loader.fetch(&pending.origin).await;
        self.complete_layer_switch(pending, result)
    }

    /// Layer picker model with the active layer selected.
    pub fn picker_groups(&self) -> Vec<PickerGroup> {
        let selected = self
            .state
            .as_ref()
            .map_or(self.registry.first(), |state| &state.active_layer);
        self.registry.picker_groups(&selected.display_name)
    }

    /// Feed of the active layer, once activated.
    pub fn feed(&self) -> Option<&SearchFeed> {
        self.feed.as_ref()
    }

    pub fn state(&self) -> Option<&EngineState> {
        self.state.as_ref()
    }

    /// Detach from the map, dropping all engine state.
    pub fn on_remove(self) -> H {
        debug!("Search control removed");
        self.host
    }

    fn transition(
        &mut self,
        step: impl FnOnce(EngineState) -> Transition,
    ) -> Result<Option<String>> {
        let state = self.state.take().ok_or(MapSearchError::NotActive)?;
        let transition = step(state);
        self.apply(&transition.mutations);
        self.state = Some(transition.state);
        Ok(transition.display_value)
    }

    fn apply(&mut self, mutations: &[MapMutation]) {
        for mutation in mutations {
            mutation.apply(&mut self.host);
        }
    }
}
