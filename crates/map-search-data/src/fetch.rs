use std::path::PathBuf;

use rand::{Rng, distributions::Alphanumeric};
use reqwest::Client;
use tracing::{info, instrument};
use url::Url;

use crate::{FeatureCollection, FeatureFetcher, LoadError, Result};

/// Fetches layer data over HTTP(S) or from the local filesystem.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    cache_bust: bool,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            cache_bust: true,
        }
    }

    /// Append a random query parameter to HTTP requests so intermediaries
    /// cannot serve a stale copy of the layer data.
    pub fn cache_bust(mut self, enabled: bool) -> Self {
        self.cache_bust = enabled;
        self
    }

    async fn fetch_http(&self, url: Url) -> Result<FeatureCollection> {
        let url = if self.cache_bust {
            cache_busted(&url)
        } else {
            url
        };
        info!(url = %url, "Fetching layer data");
        let response = self.client.get(url.clone()).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        FeatureCollection::from_slice(&bytes, url.as_str())
    }
}

impl FeatureFetcher for HttpFetcher {
    #[instrument(name = "Fetch feature collection", level = "debug", skip(self))]
    async fn fetch(&self, location: &str) -> Result<FeatureCollection> {
        match Location::parse(location)? {
            Location::Http(url) => self.fetch_http(url).await,
            Location::File(path) => {
                info!(path = %path.display(), "Reading layer data");
                let bytes = tokio::fs::read(&path).await?;
                FeatureCollection::from_slice(&bytes, location)
            }
        }
    }
}

/// Return `url` with an extra `x-<2 chars>=<4 chars>` query parameter.
pub fn cache_busted(url: &Url) -> Url {
    let mut busted = url.clone();
    let key = random_token(2);
    let value = random_token(4);
    busted
        .query_pairs_mut()
        .append_pair(&format!("x-{key}"), &value);
    busted
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

#[derive(Debug, PartialEq)]
enum Location {
    Http(Url),
    File(PathBuf),
}

impl Location {
    fn parse(location: &str) -> Result<Self> {
        match Url::parse(location) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Self::Http(url)),
                "file" => url
                    .to_file_path()
                    .map(Self::File)
                    .map_err(|()| LoadError::InvalidLocation {
                        location: location.to_string(),
                        reason: "file URL has no local path".to_string(),
                    }),
                other => Err(LoadError::UnsupportedScheme(other.to_string())),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => Ok(Self::File(PathBuf::from(location))),
            Err(e) => Err(LoadError::InvalidLocation {
                location: location.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
