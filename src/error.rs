use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BrainMapError {
    #[error("request failed{}: {message}", .status.map(|code| format!(" (HTTP {code})")).unwrap_or_default())]
    Network {
        status: Option<u16>,
        message: String,
    },
    #[error("{0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("malformed shared view: {0}")]
    MalformedShare(String),
    #[error("settings storage error: {0}")]
    Storage(String),
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl BrainMapError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            status: None,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Stale-reference failures ask the caller to refresh affected lists.
    pub fn should_refresh(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, BrainMapError>;
