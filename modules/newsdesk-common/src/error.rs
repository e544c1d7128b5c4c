use thiserror::Error;

#[derive(Error, Debug)]
pub enum NewsdeskError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Ingestion pass already in progress")]
    PassInProgress,

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
