use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Browserless rendering service. None disables browser-backed scraping
    /// entirely; static HTML fetch still works.
    pub browserless_url: Option<String>,
    pub browserless_token: Option<String>,

    /// Agent extraction service endpoint. None makes ADK-typed sources fall
    /// through to traditional scraping immediately.
    pub adk_url: Option<String>,
    pub adk_api_key: Option<String>,

    /// Minutes between periodic ingestion passes.
    pub check_interval_minutes: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if a required var is malformed.
    pub fn from_env() -> Self {
        Self {
            browserless_url: env::var("BROWSERLESS_URL").ok(),
            browserless_token: env::var("BROWSERLESS_TOKEN").ok(),
            adk_url: env::var("ADK_URL").ok(),
            adk_api_key: env::var("ADK_API_KEY").ok(),
            check_interval_minutes: env::var("CHECK_INTERVAL_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("CHECK_INTERVAL_MINUTES must be a number"),
        }
    }

    /// Log which optional collaborators are configured without leaking
    /// tokens into the logs.
    pub fn log_redacted(&self) {
        info!(
            browserless = self.browserless_url.is_some(),
            browserless_token = self.browserless_token.is_some(),
            adk = self.adk_url.is_some(),
            check_interval_minutes = self.check_interval_minutes,
            "Configuration loaded"
        );
    }
}
