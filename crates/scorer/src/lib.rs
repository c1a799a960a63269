//! # Zone Scorer
//!
//! Scores candidate price levels for the likelihood of institutional order
//! execution. Five bounded, weighted signals are combined into a 0-100
//! confluence score per level:
//!
//! - VWAP distance (max 30)
//! - round-number proximity (max 25)
//! - Fibonacci confluence (max 20)
//! - depth-of-market resting volume (max 15)
//! - bid/ask delta imbalance (max 10)
//!
//! This is a pure logic crate: no I/O, no hidden state, no randomness.
//! Identical snapshots always yield identical zones, and missing market
//! data degrades the affected sub-score to zero instead of failing.

pub mod confluence;

pub use confluence::ZoneScorer;
