use crate::enums::{PositionStatus, Side};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single top-of-book quote tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub volume: Decimal,
}

impl Tick {
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / dec!(2)
    }
}

/// An OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// The classic VWAP input: (high + low + close) / 3.
    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / dec!(3)
    }
}

/// A single resting-volume level in the depth-of-market book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub volume: Decimal,
}

/// A point-in-time view of the order book, levels ordered best-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub timestamp: DateTime<Utc>,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

impl OrderBookSnapshot {
    /// Total resting volume (both sides) within `tolerance` of `price`.
    pub fn volume_near(&self, price: Decimal, tolerance: Decimal) -> Decimal {
        self.bids
            .iter()
            .chain(self.asks.iter())
            .filter(|level| (level.price - price).abs() <= tolerance)
            .map(|level| level.volume)
            .sum()
    }
}

/// The five weighted confluence sub-scores of an execution zone.
///
/// Each component is bounded by its associated cap; the aggregate is
/// always the exact sum of the components, clamped to [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub vwap: Decimal,
    pub round_number: Decimal,
    pub fibonacci: Decimal,
    pub dom: Decimal,
    pub delta: Decimal,
}

impl ScoreBreakdown {
    pub const VWAP_MAX: Decimal = dec!(30);
    pub const ROUND_MAX: Decimal = dec!(25);
    pub const FIB_MAX: Decimal = dec!(20);
    pub const DOM_MAX: Decimal = dec!(15);
    pub const DELTA_MAX: Decimal = dec!(10);

    pub fn zero() -> Self {
        Self {
            vwap: Decimal::ZERO,
            round_number: Decimal::ZERO,
            fibonacci: Decimal::ZERO,
            dom: Decimal::ZERO,
            delta: Decimal::ZERO,
        }
    }

    /// The aggregate confluence score: sum of sub-scores, clamped to [0, 100].
    pub fn total(&self) -> Decimal {
        let sum = self.vwap + self.round_number + self.fibonacci + self.dom + self.delta;
        sum.clamp(Decimal::ZERO, dec!(100))
    }
}

/// A scored candidate price level. Immutable once produced; a fresh
/// evaluation yields a fresh instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionZone {
    pub price: Decimal,
    pub side: Side,
    pub breakdown: ScoreBreakdown,
    pub score: Decimal,
    pub evaluated_at: DateTime<Utc>,
}

impl ExecutionZone {
    pub fn new(
        price: Decimal,
        side: Side,
        breakdown: ScoreBreakdown,
        evaluated_at: DateTime<Utc>,
    ) -> Self {
        let score = breakdown.total();
        Self {
            price,
            side,
            breakdown,
            score,
            evaluated_at,
        }
    }
}

/// An actionable trade intent derived from a qualifying zone.
///
/// Valid only until consumed by the risk controller or expired by the
/// minimum trade interval; never queued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub symbol: String,
    pub side: Side,
    pub zone: ExecutionZone,
    /// Zone price offset toward current price, so entry fills before the
    /// zone itself is reached.
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A live (or pending) trade owned by the position manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub client_id: Uuid,
    /// Broker-assigned order id, available once the order is placed.
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub size: Decimal,
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub opened_at: DateTime<Utc>,
    pub status: PositionStatus,
}

impl Position {
    /// Advances the lifecycle state machine, rejecting any transition
    /// that is not `PendingEntry -> Open` or `Open -> Closed*`.
    pub fn transition(&mut self, next: PositionStatus) -> Result<(), CoreError> {
        let legal = match (self.status, next) {
            (PositionStatus::PendingEntry, PositionStatus::Open) => true,
            (PositionStatus::Open, s) if s.is_terminal() => true,
            _ => false,
        };
        if !legal {
            return Err(CoreError::InvalidTransition(self.status, next));
        }
        self.status = next;
        Ok(())
    }

    /// Signed P&L in price units for a hypothetical exit at `price`.
    pub fn pnl_at(&self, price: Decimal) -> Decimal {
        match self.side {
            Side::Buy => (price - self.entry_price) * self.size,
            Side::Sell => (self.entry_price - price) * self.size,
        }
    }

    /// True when `price` has crossed the protective stop.
    pub fn stop_hit(&self, price: Decimal) -> bool {
        match self.side {
            Side::Buy => price <= self.stop_loss,
            Side::Sell => price >= self.stop_loss,
        }
    }
}
