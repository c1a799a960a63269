use std::sync::Arc;

use broker::{BrokerGateway, OrderRequest, with_backoff};
use chrono::{DateTime, Duration, Utc};
use configuration::{BrokerConfig, TradingConfig};
use core_types::{CloseReason, Position, PositionStatus, Side, TradeSignal};
use events::{EngineEvent, Severity};
use market_data::MarketSnapshot;
use rust_decimal::Decimal;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::EngineError;
use crate::exhaustion::ExhaustionDetector;

/// The outcome of a position reaching a terminal state.
#[derive(Debug, Clone)]
pub struct ClosedTrade {
    pub position: Position,
    pub reason: CloseReason,
    pub exit_price: Decimal,
    /// Realized P&L in account currency.
    pub pnl: Decimal,
}

/// Owns every live position and drives its lifecycle.
///
/// Exit conditions are checked in strict priority order: stop-loss
/// first, then the hold timeout, then exhaustion. The manager never
/// decides admission; the risk controller does that before `submit` is
/// ever called.
pub struct PositionManager {
    trading: TradingConfig,
    broker_cfg: BrokerConfig,
    exhaustion: ExhaustionDetector,
    broker: Arc<dyn BrokerGateway>,
    events: broadcast::Sender<EngineEvent>,
    positions: Vec<Position>,
    trail_trigger: Decimal,
    trail_lock: Decimal,
}

impl PositionManager {
    pub fn new(
        trading: TradingConfig,
        broker_cfg: BrokerConfig,
        exhaustion: ExhaustionDetector,
        trail_trigger_pips: u32,
        trail_lock_pips: u32,
        broker: Arc<dyn BrokerGateway>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        let pip = trading.pip_value;
        Self {
            trading,
            broker_cfg,
            exhaustion,
            broker,
            events,
            positions: Vec::new(),
            trail_trigger: Decimal::from(trail_trigger_pips) * pip,
            trail_lock: Decimal::from(trail_lock_pips) * pip,
        }
    }

    /// Number of positions that have not reached a terminal state.
    pub fn open_count(&self) -> usize {
        self.positions
            .iter()
            .filter(|p| !p.status.is_terminal())
            .count()
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Places the entry order for an admitted signal.
    ///
    /// The broker's order id doubles as the fill acknowledgment for a
    /// market-style entry, so the position moves through `PendingEntry`
    /// to `Open` in the same call once the id arrives.
    pub async fn submit(
        &mut self,
        signal: &TradeSignal,
        size: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let request = OrderRequest {
            symbol: signal.symbol.clone(),
            side: signal.side,
            price: signal.entry_price,
            size,
            stop_loss: signal.stop_loss,
        };
        let order_id = with_backoff(
            self.broker_cfg.max_retries,
            self.broker_cfg.retry_backoff_ms,
            "place_order",
            || self.broker.place_order(&request),
        )
        .await?;

        let mut position = Position {
            client_id: Uuid::new_v4(),
            order_id,
            symbol: signal.symbol.clone(),
            side: signal.side,
            size,
            entry_price: signal.entry_price,
            stop_loss: signal.stop_loss,
            opened_at: now,
            status: PositionStatus::PendingEntry,
        };
        let _ = self.events.send(EngineEvent::OrderPlaced {
            position: position.clone(),
        });

        position.transition(PositionStatus::Open)?;
        tracing::info!(
            order_id = %position.order_id,
            side = ?position.side,
            entry = %position.entry_price,
            stop = %position.stop_loss,
            %size,
            "position opened"
        );
        let _ = self.events.send(EngineEvent::PositionOpened {
            position: position.clone(),
        });
        self.positions.push(position);
        Ok(())
    }

    /// One monitoring pass over every open position.
    ///
    /// Returns the trades that reached a terminal state this pass. A
    /// close that still fails after the retry budget escalates as
    /// `CloseFailed` after a critical alert; the position stays open so
    /// the next pass retries it.
    pub async fn monitor(
        &mut self,
        snapshot: &MarketSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Vec<ClosedTrade>, EngineError> {
        let mut closed = Vec::new();

        for i in 0..self.positions.len() {
            if self.positions[i].status != PositionStatus::Open {
                continue;
            }
            let exit_price = Self::exit_price(self.positions[i].side, snapshot);

            let reason = self.exit_reason(&self.positions[i], exit_price, snapshot, now);
            let Some(reason) = reason else {
                self.trail_stop(i, exit_price).await;
                continue;
            };

            let trade = self.close(i, reason).await?;
            closed.push(trade);
        }

        self.positions.retain(|p| !p.status.is_terminal());
        Ok(closed)
    }

    /// Stop-loss beats timeout beats exhaustion when several conditions
    /// hold at once.
    fn exit_reason(
        &self,
        position: &Position,
        exit_price: Decimal,
        snapshot: &MarketSnapshot,
        now: DateTime<Utc>,
    ) -> Option<CloseReason> {
        if position.stop_hit(exit_price) {
            return Some(CloseReason::StopLoss);
        }
        if now - position.opened_at >= Duration::minutes(self.trading.max_hold_minutes) {
            return Some(CloseReason::Timeout);
        }
        if self.exhaustion.is_exhausted(snapshot) {
            return Some(CloseReason::Exhaustion);
        }
        None
    }

    async fn close(&mut self, index: usize, reason: CloseReason) -> Result<ClosedTrade, EngineError> {
        let order_id = self.positions[index].order_id.clone();
        let (reason, fill) = match with_backoff(
            self.broker_cfg.max_retries,
            self.broker_cfg.retry_backoff_ms,
            "close_order",
            || self.broker.close_order(&order_id),
        )
        .await
        {
            Ok(fill) => (reason, fill),
            // The broker no longer knows the order: its native stop
            // already executed. Book the close at the stop price.
            Err(broker::BrokerError::UnknownOrder(_)) => {
                tracing::warn!(%order_id, "order already gone at the broker, assuming stop fill");
                (CloseReason::StopLoss, self.positions[index].stop_loss)
            }
            Err(source) => {
                let _ = self.events.send(EngineEvent::Alert {
                    timestamp: Utc::now(),
                    severity: Severity::Critical,
                    message: format!(
                        "could not close order {order_id} ({reason:?}): {source}; trading halted"
                    ),
                });
                return Err(EngineError::CloseFailed { order_id, source });
            }
        };

        let position = &mut self.positions[index];
        position.transition(reason.terminal_status())?;
        let pnl = position.pnl_at(fill) / self.trading.pip_value * self.trading.pip_value_per_lot;
        tracing::info!(
            order_id = %position.order_id,
            ?reason,
            exit = %fill,
            %pnl,
            "position closed"
        );
        let trade = ClosedTrade {
            position: position.clone(),
            reason,
            exit_price: fill,
            pnl,
        };
        let _ = self.events.send(EngineEvent::PositionClosed {
            position: trade.position.clone(),
            reason,
            exit_price: fill,
            pnl,
        });
        Ok(trade)
    }

    /// Locks in a few pips once the position is sufficiently in profit.
    /// A failed stop move is logged and retried on the next pass; it
    /// never blocks monitoring.
    async fn trail_stop(&mut self, index: usize, exit_price: Decimal) {
        let position = &self.positions[index];
        let (profit, locked_stop) = match position.side {
            Side::Buy => (
                exit_price - position.entry_price,
                position.entry_price + self.trail_lock,
            ),
            Side::Sell => (
                position.entry_price - exit_price,
                position.entry_price - self.trail_lock,
            ),
        };
        let improves = match position.side {
            Side::Buy => locked_stop > position.stop_loss,
            Side::Sell => locked_stop < position.stop_loss,
        };
        if profit < self.trail_trigger || !improves {
            return;
        }

        let order_id = position.order_id.clone();
        match self.broker.modify_stop(&order_id, locked_stop).await {
            Ok(()) => {
                tracing::info!(%order_id, new_stop = %locked_stop, "stop trailed to lock in profit");
                self.positions[index].stop_loss = locked_stop;
            }
            Err(err) => {
                tracing::warn!(%order_id, error = %err, "failed to trail stop");
            }
        }
    }

    /// A long exits at the bid, a short at the ask.
    fn exit_price(side: Side, snapshot: &MarketSnapshot) -> Decimal {
        match side {
            Side::Buy => snapshot.bid,
            Side::Sell => snapshot.ask,
        }
    }
}
