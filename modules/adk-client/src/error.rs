use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdkError>;

#[derive(Debug, Error)]
pub enum AdkError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Extraction timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for AdkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return AdkError::Timeout;
        }
        AdkError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AdkError {
    fn from(err: serde_json::Error) -> Self {
        AdkError::Parse(err.to_string())
    }
}
