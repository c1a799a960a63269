use broker::BrokerError;
use core_types::CoreError;
use risk::RiskError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// A position could not be closed even after the retry budget. The
    /// engine halts admission and keeps retrying on subsequent cycles.
    #[error("Failed to close order {order_id} after retries: {source}")]
    CloseFailed {
        order_id: String,
        source: BrokerError,
    },
}
