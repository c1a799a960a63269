use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Failed to persist risk state: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("Failed to encode risk state: {0}")]
    Serialization(#[from] serde_json::Error),
}
