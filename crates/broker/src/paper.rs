use std::collections::HashMap;

use async_trait::async_trait;
use core_types::{OrderBookSnapshot, Side, Tick};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use crate::error::BrokerError;
use crate::gateway::{AccountInfo, BrokerGateway, OrderRequest};

/// An in-process broker for demo runs and tests.
///
/// Quotes and books are pushed in by the caller (`set_quote`,
/// `set_book`); orders fill instantly at the requested price and close
/// at the current quote. Transient failures can be scripted to exercise
/// the engine's retry and escalation paths.
pub struct PaperBroker {
    state: Mutex<PaperState>,
}

struct PaperState {
    balance: Decimal,
    equity: Decimal,
    quote: Option<Tick>,
    book: Option<OrderBookSnapshot>,
    orders: HashMap<String, OrderRequest>,
    next_order: u64,
    failing_closes: u32,
    failing_account_infos: u32,
}

impl PaperBroker {
    pub fn new(starting_balance: Decimal) -> Self {
        Self {
            state: Mutex::new(PaperState {
                balance: starting_balance,
                equity: starting_balance,
                quote: None,
                book: None,
                orders: HashMap::new(),
                next_order: 1,
                failing_closes: 0,
                failing_account_infos: 0,
            }),
        }
    }

    pub async fn set_quote(&self, quote: Tick) {
        self.state.lock().await.quote = Some(quote);
    }

    pub async fn set_book(&self, book: Option<OrderBookSnapshot>) {
        self.state.lock().await.book = book;
    }

    pub async fn set_account(&self, balance: Decimal, equity: Decimal) {
        let mut state = self.state.lock().await;
        state.balance = balance;
        state.equity = equity;
    }

    /// The next `n` close attempts fail with a transient error.
    pub async fn fail_next_closes(&self, n: u32) {
        self.state.lock().await.failing_closes = n;
    }

    /// The next `n` account queries fail with a transient error.
    pub async fn fail_next_account_infos(&self, n: u32) {
        self.state.lock().await.failing_account_infos = n;
    }

    pub async fn open_orders(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn stop_loss_of(&self, order_id: &str) -> Option<Decimal> {
        self.state
            .lock()
            .await
            .orders
            .get(order_id)
            .map(|order| order.stop_loss)
    }
}

#[async_trait]
impl BrokerGateway for PaperBroker {
    async fn connect(&self) -> Result<(), BrokerError> {
        Ok(())
    }

    async fn get_quote(&self, _symbol: &str) -> Result<Tick, BrokerError> {
        self.state
            .lock()
            .await
            .quote
            .clone()
            .ok_or_else(|| BrokerError::Transient("no quote available".to_string()))
    }

    async fn get_order_book(
        &self,
        _symbol: &str,
    ) -> Result<Option<OrderBookSnapshot>, BrokerError> {
        Ok(self.state.lock().await.book.clone())
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<String, BrokerError> {
        if order.size <= Decimal::ZERO {
            return Err(BrokerError::Rejected("non-positive size".to_string()));
        }
        let mut state = self.state.lock().await;
        let id = format!("paper-{}", state.next_order);
        state.next_order += 1;
        state.orders.insert(id.clone(), order.clone());
        tracing::debug!(order_id = %id, side = ?order.side, price = %order.price, "paper order placed");
        Ok(id)
    }

    async fn close_order(&self, order_id: &str) -> Result<Decimal, BrokerError> {
        let mut state = self.state.lock().await;
        if state.failing_closes > 0 {
            state.failing_closes -= 1;
            return Err(BrokerError::Transient("close requote".to_string()));
        }
        let order = state
            .orders
            .remove(order_id)
            .ok_or_else(|| BrokerError::UnknownOrder(order_id.to_string()))?;
        // A long exits at the bid, a short at the ask. Without a quote the
        // fill falls back to the order's own price.
        let fill = match &state.quote {
            Some(quote) => match order.side {
                Side::Buy => quote.bid,
                Side::Sell => quote.ask,
            },
            None => order.price,
        };
        Ok(fill)
    }

    async fn modify_stop(&self, order_id: &str, stop_loss: Decimal) -> Result<(), BrokerError> {
        let mut state = self.state.lock().await;
        match state.orders.get_mut(order_id) {
            Some(order) => {
                order.stop_loss = stop_loss;
                Ok(())
            }
            None => Err(BrokerError::UnknownOrder(order_id.to_string())),
        }
    }

    async fn get_account_info(&self) -> Result<AccountInfo, BrokerError> {
        let mut state = self.state.lock().await;
        if state.failing_account_infos > 0 {
            state.failing_account_infos -= 1;
            return Err(BrokerError::Transient("account query timed out".to_string()));
        }
        Ok(AccountInfo {
            balance: state.balance,
            equity: state.equity,
        })
    }
}
