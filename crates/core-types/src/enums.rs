use serde::{Deserialize, Serialize};

/// The anticipated breakout direction of a zone, and the side of the
/// resulting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Returns the opposite side of the order
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// The lifecycle state of a position.
///
/// The only legal transitions are `PendingEntry -> Open` and
/// `Open -> Closed*`; the `Closed*` states are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    PendingEntry,
    Open,
    ClosedExhaustion,
    ClosedTimeout,
    ClosedStopLoss,
}

impl PositionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PositionStatus::ClosedExhaustion
                | PositionStatus::ClosedTimeout
                | PositionStatus::ClosedStopLoss
        )
    }
}

/// Why a position was (or is about to be) closed.
///
/// Ordering matters when several conditions fire in the same cycle:
/// stop-loss beats timeout beats exhaustion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    StopLoss,
    Timeout,
    Exhaustion,
}

impl CloseReason {
    /// The terminal status a close for this reason transitions into.
    pub fn terminal_status(&self) -> PositionStatus {
        match self {
            CloseReason::StopLoss => PositionStatus::ClosedStopLoss,
            CloseReason::Timeout => PositionStatus::ClosedTimeout,
            CloseReason::Exhaustion => PositionStatus::ClosedExhaustion,
        }
    }
}
