use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapSearchError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("Layer data error: {0}")]
    Load(#[from] map_search_data::LoadError),
    #[error("The control has not been activated")]
    NotActive,
    #[error("The host ready signal was dropped before firing")]
    HostReadyDropped,
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, MapSearchError>;
