//! Resolves and fetches the feature collection behind a layer.
//!
//! Resolution is synchronous and reports configuration problems before any
//! await point; fetching is the only step that suspends.

use std::sync::Arc;

use map_search_data::{DataOrigin, FeatureCollection, FeatureFetcher, LoadError};
use tracing::{debug, info, instrument};

use crate::config::{ConfigError, LayerConfig};
use crate::error::Result;
use crate::host::{MapHost, SourceData, SourceKind};

#[derive(Debug, Clone)]
pub struct DataLoader<F> {
    fetcher: F,
}

impl<F: FeatureFetcher> DataLoader<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Layer-level requirements for loading.
    pub fn check_layer(layer: &LayerConfig) -> std::result::Result<(), ConfigError> {
        if layer.unique_feature_id().is_none() {
            return Err(ConfigError::MissingUniqueFeatureId(
                layer.display_name.clone(),
            ));
        }
        if layer.search_properties.is_some() && layer.excluded_properties.is_some() {
            return Err(ConfigError::ConflictingPropertyFilters(
                layer.display_name.clone(),
            ));
        }
        Ok(())
    }

    /// Decide where the layer's features come from.
    ///
    /// The source must exist and be GeoJSON. A non-empty `dataPath` wins, then
    /// a URL-backed source, then the collection held by the source itself.
    pub fn resolve<H: MapHost + ?Sized>(
        layer: &LayerConfig,
        host: &H,
    ) -> std::result::Result<DataOrigin, ConfigError> {
        Self::check_layer(layer)?;

        let source = host
            .source(&layer.source)
            .ok_or_else(|| ConfigError::UnknownSource {
                layer: layer.display_name.clone(),
                source_id: layer.source.clone(),
            })?;
        if source.kind != SourceKind::GeoJson {
            return Err(ConfigError::NotGeoJson {
                source_id: layer.source.clone(),
                kind: source.kind_name().to_string(),
            });
        }

        if let Some(path) = layer.data_path() {
            return Ok(DataOrigin::Remote(path.to_string()));
        }
        Ok(match source.data {
            SourceData::Url(url) => DataOrigin::Remote(url),
            SourceData::Inline(collection) => DataOrigin::Resident(collection),
            SourceData::None => {
                debug!(source = %layer.source, "Source holds no data yet");
                DataOrigin::Resident(Arc::new(FeatureCollection::new(Vec::new())))
            }
        })
    }

    pub async fn fetch(&self, origin: &DataOrigin) -> std::result::Result<FeatureCollection, LoadError> {
        origin.load(&self.fetcher).await
    }

    /// Resolve then fetch the layer's features.
    #[instrument(name = "Load layer", level = "info", skip_all, fields(layer = %layer.display_name))]
    pub async fn load<H: MapHost + ?Sized>(
        &self,
        layer: &LayerConfig,
        host: &H,
    ) -> Result<FeatureCollection> {
        let origin = Self::resolve(layer, host)?;
        let collection = self.fetch(&origin).await?;
        info!(features = collection.len(), "Layer loaded");
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::error::MapSearchError;
    use crate::host::MapSource;
    use crate::host::recording::RecordingHost;
    use crate::index::SuggestionIndexBuilder;
    use map_search_data::test_data;

    #[derive(Default)]
    struct StubFetcher {
        requested: RefCell<Vec<String>>,
    }

    impl FeatureFetcher for StubFetcher {
        async fn fetch(&self, location: &str) -> map_search_data::Result<FeatureCollection> {
            self.requested.borrow_mut().push(location.to_string());
            if location.contains("broken") {
                return FeatureCollection::from_slice(b"{not json", location);
            }
            Ok(test_data::trails())
        }
    }

    fn parks_layer() -> LayerConfig {
        LayerConfig::builder("parks", "Parks")
            .unique_feature_id("id")
            .build()
    }

    fn host() -> RecordingHost {
        RecordingHost::new()
            .with_source("parks", MapSource::geojson_inline(test_data::parks()))
            .with_source("remote", MapSource::geojson_url("https://example.com/remote.geojson"))
            .with_source("tiles", MapSource::other("vector"))
    }

    #[test]
    fn test_missing_unique_id_rejected() {
        let layer = LayerConfig::builder("parks", "Parks").build();
        assert_eq!(
            DataLoader::<StubFetcher>::check_layer(&layer),
            Err(ConfigError::MissingUniqueFeatureId("Parks".to_string()))
        );

        let layer = LayerConfig::builder("parks", "Parks").unique_feature_id("").build();
        assert!(DataLoader::<StubFetcher>::resolve(&layer, &host()).is_err());
    }

    #[test]
    fn test_conflicting_filters_rejected() {
        let layer = LayerConfig::builder("parks", "Parks")
            .unique_feature_id("id")
            .search_properties(["name"])
            .excluded_properties(["id"])
            .build();
        assert_eq!(
            DataLoader::<StubFetcher>::check_layer(&layer),
            Err(ConfigError::ConflictingPropertyFilters("Parks".to_string()))
        );
    }

    #[test]
    fn test_resolution_order() {
        let host = host();

        let resident = DataLoader::<StubFetcher>::resolve(&parks_layer(), &host).unwrap();
        assert_eq!(resident, DataOrigin::Resident(Arc::new(test_data::parks())));

        let overridden = LayerConfig::builder("parks", "Parks")
            .unique_feature_id("id")
            .data_path("https://example.com/override.geojson")
            .build();
        assert_eq!(
            DataLoader::<StubFetcher>::resolve(&overridden, &host).unwrap(),
            DataOrigin::Remote("https://example.com/override.geojson".to_string())
        );

        let remote = LayerConfig::builder("remote", "Remote").unique_feature_id("id").build();
        assert_eq!(
            DataLoader::<StubFetcher>::resolve(&remote, &host).unwrap(),
            DataOrigin::Remote("https://example.com/remote.geojson".to_string())
        );
    }

    #[test]
    fn test_source_type_checked_before_data_path() {
        let layer = LayerConfig::builder("tiles", "Tiles")
            .unique_feature_id("id")
            .data_path("https://example.com/tiles.geojson")
            .build();
        assert_eq!(
            DataLoader::<StubFetcher>::resolve(&layer, &host()),
            Err(ConfigError::NotGeoJson {
                source_id: "tiles".to_string(),
                kind: "vector".to_string()
            })
        );

        let layer = LayerConfig::builder("nope", "Nope").unique_feature_id("id").build();
        assert!(matches!(
            DataLoader::<StubFetcher>::resolve(&layer, &host()),
            Err(ConfigError::UnknownSource { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_config_error_before_fetch() {
        let loader = DataLoader::new(StubFetcher::default());
        let layer = LayerConfig::builder("remote", "Remote").build();

        let err = loader.load(&layer, &host()).await.unwrap_err();
        assert!(matches!(
            err,
            MapSearchError::Config(ConfigError::MissingUniqueFeatureId(_))
        ));
        assert!(loader.fetcher().requested.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_load_remote_and_resident() {
        let loader = DataLoader::new(StubFetcher::default());
        let host = host();

        let remote = LayerConfig::builder("remote", "Remote").unique_feature_id("trail_id").build();
        let trails = loader.load(&remote, &host).await.unwrap();
        assert_eq!(trails.len(), 3);
        assert_eq!(
            *loader.fetcher().requested.borrow(),
            vec!["https://example.com/remote.geojson".to_string()]
        );

        let parks = loader.load(&parks_layer(), &host).await.unwrap();
        assert_eq!(parks.features[1].property("name"), Some(&serde_json::json!("")));
    }

    #[tokio::test]
    async fn test_source_without_data_loads_empty() {
        let loader = DataLoader::new(StubFetcher::default());
        let host = host().with_source(
            "pending",
            MapSource {
                kind: SourceKind::GeoJson,
                data: SourceData::None,
            },
        );
        let layer = LayerConfig::builder("pending", "Pending").unique_feature_id("id").build();

        assert_eq!(
            DataLoader::<StubFetcher>::resolve(&layer, &host).unwrap(),
            DataOrigin::Resident(Arc::new(FeatureCollection::default()))
        );
        let collection = loader.load(&layer, &host).await.unwrap();
        assert!(collection.is_empty());
        assert!(loader.fetcher().requested.borrow().is_empty());

        let index = SuggestionIndexBuilder::build(&collection.features, &layer);
        assert!(index.is_empty());
        assert!(index.keys.is_empty());
    }

    #[tokio::test]
    async fn test_parse_failure_is_load_error() {
        let loader = DataLoader::new(StubFetcher::default());
        let layer = LayerConfig::builder("parks", "Parks")
            .unique_feature_id("id")
            .data_path("https://example.com/broken.geojson")
            .build();

        let err = loader.load(&layer, &host()).await.unwrap_err();
        assert!(matches!(err, MapSearchError::Load(LoadError::Parse { .. })));
    }
}
