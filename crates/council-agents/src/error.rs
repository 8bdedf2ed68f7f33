use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Model invocation error: {0}")]
    Model(String),

    #[error("Model response parse error: {0}")]
    Parse(String),

    #[error("Analyst timed out after {0} seconds")]
    Timeout(u64),

    #[error("Analyst disabled: {0}")]
    Disabled(String),

    #[error("Data fetch failed: {0}")]
    Provider(#[from] council_cache::ProviderError),

    #[error("Invalid portfolio: {0}")]
    Portfolio(#[from] council_models::PortfolioError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
