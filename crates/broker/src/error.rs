use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Broker connection failed: {0}")]
    Connection(String),

    /// A temporary failure worth retrying (timeout, requote, dropped
    /// session).
    #[error("Transient broker error: {0}")]
    Transient(String),

    /// The broker refused the request; retrying the same request will
    /// not help.
    #[error("Order rejected by broker: {0}")]
    Rejected(String),

    #[error("Unknown order id: {0}")]
    UnknownOrder(String),
}

impl BrokerError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BrokerError::Transient(_) | BrokerError::Connection(_))
    }
}
