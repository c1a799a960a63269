pub mod enums;
pub mod error;
pub mod structs;

// Re-export the core types to provide a clean public API.
pub use enums::{CloseReason, PositionStatus, Side};
pub use error::CoreError;
pub use structs::{
    BookLevel, Candle, ExecutionZone, OrderBookSnapshot, Position, ScoreBreakdown, Tick,
    TradeSignal,
};
