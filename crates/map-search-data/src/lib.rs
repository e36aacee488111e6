//! GeoJSON layer data for the map-search control.
//!
//! This crate owns everything that touches raw feature data: the GeoJSON
//! [`FeatureCollection`] model, the normalization applied to property values at
//! load time, where a layer's data comes from ([`DataOrigin`]) and how it is
//! fetched ([`FeatureFetcher`], [`HttpFetcher`]).

pub mod feature;
#[cfg(feature = "fetch")]
pub mod fetch;
pub mod origin;
pub mod test_data;

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum LoadError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[cfg(feature = "fetch")]
        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("Invalid feature collection from {origin}: {source}")]
        Parse {
            origin: String,
            #[source]
            source: serde_json::Error,
        },
        #[error("Invalid data location {location}: {reason}")]
        InvalidLocation { location: String, reason: String },
        #[error("Unsupported URL scheme '{0}'")]
        UnsupportedScheme(String),
    }

    pub type Result<T> = std::result::Result<T, LoadError>;
}

pub use error::{LoadError, Result};

pub use feature::{Feature, FeatureCollection, Geometry, Position, Properties, normalize_nulls};
#[cfg(feature = "fetch")]
pub use fetch::{HttpFetcher, cache_busted};
pub use origin::{DataOrigin, FeatureFetcher};
pub use test_data::{TestDataConfig, create_test_data};
