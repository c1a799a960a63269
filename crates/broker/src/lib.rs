//! # Broker Gateway
//!
//! The trait boundary between the trading engine and whatever executes
//! its orders. The engine only ever sees `dyn BrokerGateway`, so the
//! paper broker used for demo runs and the tests is interchangeable
//! with a real integration.

pub mod error;
pub mod gateway;
pub mod paper;
pub mod retry;

pub use error::BrokerError;
pub use gateway::{AccountInfo, BrokerGateway, OrderRequest};
pub use paper::PaperBroker;
pub use retry::with_backoff;
