//! # Risk Controller
//!
//! The single authority on trade admission and risk-state mutation. Every
//! trade intent passes through `RiskController::evaluate`, which either
//! accepts it with a computed position size or rejects it with a reason.
//! Rejections are expected control flow, not errors.
//!
//! All other components treat `RiskState` as read-only; the controller
//! updates counters atomically with the admission decision so no signal
//! can be double-counted, and persists the state as a small day-keyed
//! record so open positions survive a process restart.

pub mod controller;
pub mod error;
pub mod state;

pub use controller::{RejectReason, RiskController, Verdict};
pub use error::RiskError;
pub use state::{RiskState, RiskStateStore};
