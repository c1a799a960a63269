//! Rolling market-microstructure cache for a single symbol.
//!
//! The cache is the only stateful data component in the pipeline: bounded
//! windows of ticks, candles and order-book snapshots, with derived session
//! metrics (VWAP, bid/ask delta, swing levels, Fibonacci retracements,
//! rolling volume/spread baselines) computed on demand into an immutable
//! `MarketSnapshot`. The snapshot is copy-on-read, so concurrent ingestion
//! can never be observed mid-update by the scorer.

pub mod cache;
pub mod feed;

pub use cache::{FibLevel, MarketDataCache, MarketSnapshot};
pub use feed::{MarketEvent, market_channel};
