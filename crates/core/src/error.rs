/// Top-level error type, returned by [`BookFinder::lookup`](crate::finder::BookFinder::lookup).
/// The component errors below convert into it.
#[derive(Debug, thiserror::Error)]
pub enum BenibookError {
    #[error("Library availability search error: {0}")]
    Search(#[from] SearchError),

    #[error("Metadata lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures of the availability poller.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Invalid search request: {0}")]
    Validation(String),

    #[error("Unexpected response from availability service: {0}")]
    Protocol(String),

    #[error("Availability service returned status {status}: {detail}")]
    Server { status: u16, detail: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Search still running after {rounds} polling rounds")]
    PollLimitExceeded { rounds: u32 },

    #[error("Search cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        SearchError::Network(e.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("ISBN must not be empty")]
    InvalidIsbn,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider {provider} returned HTTP status {status}")]
    Server { provider: String, status: u16 },

    #[error("Provider {provider} returned malformed data: {message}")]
    Malformed { provider: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Could not serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
