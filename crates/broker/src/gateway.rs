use async_trait::async_trait;
use core_types::{OrderBookSnapshot, Side, Tick};
use rust_decimal::Decimal;

use crate::error::BrokerError;

/// A request to open a position at a given price with a protective stop.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub stop_loss: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountInfo {
    pub balance: Decimal,
    pub equity: Decimal,
}

/// A generic trait for order execution and account access.
///
/// This trait keeps the engine agnostic about whether it is talking to a
/// simulated broker or a real one. All methods are fallible; callers
/// decide retry policy via [`crate::retry::with_backoff`].
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Establishes (or re-establishes) the broker session.
    async fn connect(&self) -> Result<(), BrokerError>;

    async fn get_quote(&self, symbol: &str) -> Result<Tick, BrokerError>;

    /// Depth-of-market data. `Ok(None)` means the broker does not provide
    /// a book for this symbol right now; that is not an error.
    async fn get_order_book(&self, symbol: &str)
    -> Result<Option<OrderBookSnapshot>, BrokerError>;

    /// Places the order and returns the broker's order id.
    async fn place_order(&self, order: &OrderRequest) -> Result<String, BrokerError>;

    /// Closes the order at market and returns the fill price.
    async fn close_order(&self, order_id: &str) -> Result<Decimal, BrokerError>;

    /// Moves the protective stop of an open order.
    async fn modify_stop(&self, order_id: &str, stop_loss: Decimal) -> Result<(), BrokerError>;

    async fn get_account_info(&self) -> Result<AccountInfo, BrokerError>;
}
