use chrono::{DateTime, Utc};
use core_types::{CloseReason, Position, TradeSignal};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Severity of a notification. `Critical` events mean capital is at risk
/// and a human must intervene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// The top-level event enum broadcast by the engine.
///
/// The alerter service consumes this stream to deliver notifications;
/// delivery is best-effort and must never block the trading loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum EngineEvent {
    /// The engine came up and connected to the broker.
    Started { symbol: String, balance: Decimal },
    /// A qualifying signal was rejected by the risk controller.
    SignalRejected { signal: TradeSignal, reason: String },
    /// An entry order was placed and is awaiting the fill confirmation.
    OrderPlaced { position: Position },
    /// The broker confirmed the entry fill.
    PositionOpened { position: Position },
    /// A position reached a terminal state.
    PositionClosed {
        position: Position,
        reason: CloseReason,
        exit_price: Decimal,
        pnl: Decimal,
    },
    /// End-of-day roll: daily counters were reset.
    DailySummary {
        day: String,
        trades: u32,
        realized_loss: Decimal,
        balance: Decimal,
    },
    /// A free-form alert with severity.
    Alert {
        timestamp: DateTime<Utc>,
        severity: Severity,
        message: String,
    },
}

impl EngineEvent {
    /// How loudly this event should be surfaced to the notifier.
    pub fn severity(&self) -> Severity {
        match self {
            EngineEvent::Alert { severity, .. } => *severity,
            EngineEvent::SignalRejected { .. } => Severity::Warning,
            _ => Severity::Info,
        }
    }
}
