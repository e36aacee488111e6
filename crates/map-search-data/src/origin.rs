//! Where a layer's features come from.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::{FeatureCollection, Result};

/// Resolved origin of a layer's feature data.
///
/// Resolution happens up front and synchronously; only [`DataOrigin::load`]
/// may suspend.
#[derive(Debug, Clone, PartialEq)]
pub enum DataOrigin {
    /// Fetch the collection from a URL or local path.
    Remote(String),
    /// The collection is already held by the map host.
    Resident(Arc<FeatureCollection>),
}

impl DataOrigin {
    /// Human readable description used in logs and errors.
    #[must_use]
    pub fn describe(&self) -> &str {
        match self {
            Self::Remote(location) => location,
            Self::Resident(_) => "<resident source data>",
        }
    }

    /// Produce the normalized feature collection for this origin.
    #[instrument(name = "Load layer data", level = "debug", skip_all, fields(origin = self.describe()))]
    pub async fn load<F: FeatureFetcher + ?Sized>(&self, fetcher: &F) -> Result<FeatureCollection> {
        let collection = match self {
            Self::Remote(location) => fetcher.fetch(location).await?,
            Self::Resident(collection) => collection.as_ref().clone(),
        };
        debug!(features = collection.len(), "Layer data loaded");
        Ok(collection.normalized())
    }
}

/// Fetches a feature collection from a location string.
///
/// Implementations decide which locations they understand; the bundled
/// [`HttpFetcher`](crate::HttpFetcher) handles `http(s)://`, `file://` and bare paths.
pub trait FeatureFetcher {
    fn fetch(&self, location: &str) -> impl Future<Output = Result<FeatureCollection>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LoadError, test_data};
    use std::cell::RefCell;

    #[derive(Default)]
    struct CountingFetcher {
        calls: RefCell<Vec<String>>,
    }

    impl FeatureFetcher for CountingFetcher {
        async fn fetch(&self, location: &str) -> Result<FeatureCollection> {
            self.calls.borrow_mut().push(location.to_string());
            if location.ends_with("missing.geojson") {
                return Err(LoadError::InvalidLocation {
                    location: location.to_string(),
                    reason: "not found".to_string(),
                });
            }
            Ok(test_data::parks())
        }
    }

    #[tokio::test]
    async fn test_remote_origin_uses_fetcher_and_normalizes() {
        let fetcher = CountingFetcher::default();
        let origin = DataOrigin::Remote("https://example.com/parks.geojson".to_string());

        let collection = origin.load(&fetcher).await.unwrap();
        assert_eq!(fetcher.calls.borrow().len(), 1);
        assert_eq!(collection.features[1].property("name"), Some(&serde_json::json!("")));
    }

    #[tokio::test]
    async fn test_resident_origin_skips_fetcher() {
        let fetcher = CountingFetcher::default();
        let origin = DataOrigin::Resident(Arc::new(test_data::parks()));

        let collection = origin.load(&fetcher).await.unwrap();
        assert!(fetcher.calls.borrow().is_empty());
        assert_eq!(collection.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates() {
        let fetcher = CountingFetcher::default();
        let origin = DataOrigin::Remote("/data/missing.geojson".to_string());
        assert!(origin.load(&fetcher).await.is_err());
    }
}
