//! The map the control drives, and the signal telling it the map is ready.

use std::sync::Arc;

use map_search_data::FeatureCollection;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{MapSearchError, Result};
use crate::highlight::{FilterExpr, HighlightLayerSpec};
use crate::zoom::{BoundingBox, FitBoundsOptions, ViewHints};

/// Operations the engine needs from an interactive map.
pub trait MapHost {
    fn add_layer(&mut self, spec: HighlightLayerSpec);
    fn set_filter(&mut self, layer_id: &str, filter: &FilterExpr);
    /// Look up a data source by id.
    fn source(&self, source_id: &str) -> Option<MapSource>;
    /// Point a source at new data.
    fn set_source_data(&mut self, source_id: &str, url: &str);
    fn fit_bounds(&mut self, bounds: BoundingBox, options: FitBoundsOptions);
    fn pitch(&self) -> f64;
    fn bearing(&self) -> f64;

    fn view(&self) -> ViewHints {
        ViewHints {
            pitch: self.pitch(),
            bearing: self.bearing(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    GeoJson,
    /// Any other source type, e.g. `vector` or `raster`.
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceData {
    /// The source loads its data from this URL.
    Url(String),
    /// The source holds its feature collection in memory.
    Inline(Arc<FeatureCollection>),
    None,
}

/// A map data source as reported by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSource {
    pub kind: SourceKind,
    pub data: SourceData,
}

impl MapSource {
    pub fn geojson_url(url: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::GeoJson,
            data: SourceData::Url(url.into()),
        }
    }

    #[must_use]
    pub fn geojson_inline(collection: FeatureCollection) -> Self {
        Self {
            kind: SourceKind::GeoJson,
            data: SourceData::Inline(Arc::new(collection)),
        }
    }

    pub fn other(kind: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Other(kind.into()),
            data: SourceData::None,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &str {
        match &self.kind {
            SourceKind::GeoJson => "geojson",
            SourceKind::Other(kind) => kind,
        }
    }
}

/// Create a connected ready signal pair.
///
/// The integrator keeps the [`ReadySignal`] and fires it once the map has
/// finished loading; the engine waits on [`HostReady`].
#[must_use]
pub fn host_ready() -> (ReadySignal, HostReady) {
    let (tx, rx) = oneshot::channel();
    (ReadySignal(tx), HostReady(rx))
}

#[derive(Debug)]
pub struct ReadySignal(oneshot::Sender<()>);

impl ReadySignal {
    pub fn fire(self) {
        if self.0.send(()).is_err() {
            debug!("Host ready signal fired after the control went away");
        }
    }
}

#[derive(Debug)]
pub struct HostReady(oneshot::Receiver<()>);

impl HostReady {
    /// Resolves once the paired [`ReadySignal`] fires.
    pub async fn wait(self) -> Result<()> {
        self.0.await.map_err(|_| MapSearchError::HostReadyDropped)
    }
}

pub mod recording {
    //! In-memory [`MapHost`] that records every call, for headless use and tests.

    use ahash::AHashMap;

    use super::{MapHost, MapSource, SourceData};
    use crate::highlight::{FilterExpr, HighlightLayerSpec};
    use crate::zoom::{BoundingBox, FitBoundsOptions};

    #[derive(Debug, Clone, PartialEq)]
    pub enum HostCall {
        AddLayer(HighlightLayerSpec),
        SetFilter { layer_id: String, filter: FilterExpr },
        SetSourceData { source_id: String, url: String },
        FitBounds {
            bounds: BoundingBox,
            options: FitBoundsOptions,
        },
    }

    #[derive(Debug, Clone, Default)]
    pub struct RecordingHost {
        sources: AHashMap<String, MapSource>,
        filters: AHashMap<String, FilterExpr>,
        calls: Vec<HostCall>,
        pub pitch: f64,
        pub bearing: f64,
    }

    impl RecordingHost {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn with_source(mut self, source_id: impl Into<String>, source: MapSource) -> Self {
            self.sources.insert(source_id.into(), source);
            self
        }

        /// Current filter of an overlay.
        #[must_use]
        pub fn filter(&self, layer_id: &str) -> Option<&FilterExpr> {
            self.filters.get(layer_id)
        }

        #[must_use]
        pub fn calls(&self) -> &[HostCall] {
            &self.calls
        }

        /// Drain the recorded calls.
        pub fn take_calls(&mut self) -> Vec<HostCall> {
            std::mem::take(&mut self.calls)
        }

        /// Ids of the overlays added so far, in order.
        #[must_use]
        pub fn overlay_ids(&self) -> Vec<&str> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    HostCall::AddLayer(spec) => Some(spec.id.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    impl MapHost for RecordingHost {
        fn add_layer(&mut self, spec: HighlightLayerSpec) {
            self.filters.insert(spec.id.clone(), spec.filter.clone());
            self.calls.push(HostCall::AddLayer(spec));
        }

        fn set_filter(&mut self, layer_id: &str, filter: &FilterExpr) {
            self.filters.insert(layer_id.to_string(), filter.clone());
            self.calls.push(HostCall::SetFilter {
                layer_id: layer_id.to_string(),
                filter: filter.clone(),
            });
        }

        fn source(&self, source_id: &str) -> Option<MapSource> {
            self.sources.get(source_id).cloned()
        }

        fn set_source_data(&mut self, source_id: &str, url: &str) {
            if let Some(source) = self.sources.get_mut(source_id) {
                source.data = SourceData::Url(url.to_string());
            }
            self.calls.push(HostCall::SetSourceData {
                source_id: source_id.to_string(),
                url: url.to_string(),
            });
        }

        fn fit_bounds(&mut self, bounds: BoundingBox, options: FitBoundsOptions) {
            self.calls.push(HostCall::FitBounds { bounds, options });
        }

        fn pitch(&self) -> f64 {
            self.pitch
        }

        fn bearing(&self) -> f64 {
            self.bearing
        }
    }
}
