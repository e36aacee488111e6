//! Map Search - search control engine for GeoJSON map layers
//!
//! `map-search` turns the features of one or more map layers into a searchable
//! suggestion index, and turns a picked suggestion into highlight filters and a
//! viewport fit on the map. Rendering, widget layout and the ranking done by the
//! text-search UI stay outside; the engine talks to the map through the
//! [`MapHost`] trait and to the UIs through plain values ([`SearchFeed`],
//! [`Selection`], [`PickerGroup`]).
//!
//! # Quick Start
//!
//! ```rust
//! use map_search::{LayerRegistry, SuggestionIndexBuilder};
//! use map_search_data::test_data;
//! use serde_json::json;
//!
//! let registry = LayerRegistry::from_json(&json!({
//!     "maxResults": 4.6,
//!     "layers": [{
//!         "source": "parks",
//!         "displayName": "Parks",
//!         "uniqueFeatureID": "id",
//!         "searchProperties": ["name"],
//!         "type": "polygon"
//!     }]
//! }))?;
//! assert_eq!(registry.options().max_results, 5);
//!
//! let parks = test_data::parks();
//! let index = SuggestionIndexBuilder::build(&parks.features, registry.first());
//! assert_eq!(index.keys, vec!["name"]);
//! # Ok::<(), map_search::config::ConfigError>(())
//! ```
//!
//! # Lifecycle
//!
//! 1. Validate options ([`LayerRegistry::from_json`] or [`ControlOptions::builder`]).
//! 2. [`SearchControl::on_add`] installs one highlight overlay per layer.
//! 3. [`SearchControl::activate`] waits for the [`HostReady`] signal and loads
//!    the first layer.
//! 4. Selections, input edits and layer switches update the single engine
//!    state and the map.

use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

pub mod config;
mod control;
pub mod error;
mod highlight;
pub mod host;
mod index;
mod loader;
mod registry;
mod zoom;

pub use config::{
    ControlOptions, ControlOptionsBuilder, EngineOptions, GeometryType, HighlightKeyStrategy,
    LayerConfig, LayerConfigBuilder,
};
pub use control::{PendingLoad, SearchControl};
pub use highlight::{
    EngineState, FilterExpr, HIGHLIGHT_ID, HighlightController, HighlightLayerSpec,
    HighlightPhase, MapMutation, OverlayKind, Selection, Transition,
};
pub use host::{HostReady, MapHost, MapSource, ReadySignal, SourceData, SourceKind, host_ready};
pub use index::{SearchCandidate, SearchFeed, SuggestionIndex, SuggestionIndexBuilder, dedup_candidates};
pub use loader::DataLoader;
pub use map_search_data as data;
pub use registry::{LayerRegistry, PickerChoice, PickerGroup};
pub use zoom::{BoundingBox, FitBoundsOptions, ViewHints, ViewportZoomer, ZOOM_PADDING, ZoomError};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the map-search engine.
///
/// Installs a `tracing` fmt subscriber once per process. `RUST_LOG` takes
/// precedence over `level` when set.
///
/// # Examples
///
/// ```rust
/// use map_search::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), map_search::error::MapSearchError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::MapSearchError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("hyper_util=warn".parse()?)
            .add_directive("reqwest=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        assert!(init_logging(tracing::Level::WARN).is_ok());
        assert!(init_logging(tracing::Level::DEBUG).is_ok());
    }
}
