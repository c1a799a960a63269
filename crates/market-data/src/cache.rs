use chrono::{DateTime, Utc};
use configuration::CacheConfig;
use core_types::{Candle, OrderBookSnapshot, Tick};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;

/// Number of trailing ticks used for the bid/ask delta measure.
const DELTA_WINDOW: usize = 50;
/// Number of trailing ticks averaged for the "recent" side of the
/// volume-exhaustion comparison.
const RECENT_WINDOW: usize = 5;
/// Minimum tick history before rolling baselines are considered meaningful.
const BASELINE_MIN_TICKS: usize = 20;
/// Bid prices carried into the snapshot for the price-stall check.
const STALL_PRICE_WINDOW: usize = 10;

/// A Fibonacci retracement level derived from the recent swing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FibLevel {
    /// Retracement ratio (0.236, 0.382, 0.5, 0.618, 0.786).
    pub ratio: Decimal,
    pub price: Decimal,
}

/// The immutable view handed to the scorer and the position manager.
///
/// Everything the downstream components need is materialized here; they
/// never touch the cache directly. Derived fields degrade to `None` when
/// the underlying data is missing, they never fail.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub bid: Decimal,
    pub ask: Decimal,
    pub last: Decimal,
    pub spread: Decimal,
    /// Session VWAP over today's minute candles.
    pub vwap: Option<Decimal>,
    /// Signed bid/ask volume differential over the recent tick window.
    pub delta: Decimal,
    pub swing_high: Option<Decimal>,
    pub swing_low: Option<Decimal>,
    pub fib_levels: Vec<FibLevel>,
    /// Latest depth-of-market view, when the feed provides one.
    pub book: Option<OrderBookSnapshot>,
    /// Mean tick volume over the trailing window (None during warmup).
    pub volume_baseline: Option<Decimal>,
    /// Mean tick volume over the last few ticks (None during warmup).
    pub volume_recent: Option<Decimal>,
    /// Mean spread over the trailing window (None during warmup).
    pub spread_baseline: Option<Decimal>,
    /// Most recent bid prices, oldest first, for stall detection.
    pub recent_bids: Vec<Decimal>,
    /// False until at least one minute candle has been ingested; the
    /// scorer yields an empty zone set in that case.
    pub has_candles: bool,
}

/// Bounded, append-only rolling windows of market data for one symbol.
///
/// `ingest_*` appends and evicts the oldest entry past capacity;
/// `snapshot()` clones the derived state out. No I/O happens here.
#[derive(Debug)]
pub struct MarketDataCache {
    symbol: String,
    ticks: VecDeque<Tick>,
    candles: VecDeque<Candle>,
    daily: VecDeque<Candle>,
    books: VecDeque<OrderBookSnapshot>,
    limits: CacheConfig,
}

impl MarketDataCache {
    pub fn new(symbol: impl Into<String>, limits: CacheConfig) -> Self {
        Self {
            symbol: symbol.into(),
            ticks: VecDeque::new(),
            candles: VecDeque::new(),
            daily: VecDeque::new(),
            books: VecDeque::new(),
            limits,
        }
    }

    pub fn ingest_tick(&mut self, tick: Tick) {
        push_bounded(&mut self.ticks, tick, self.limits.tick_window);
    }

    pub fn ingest_candle(&mut self, candle: Candle) {
        push_bounded(&mut self.candles, candle, self.limits.candle_window);
    }

    pub fn ingest_daily(&mut self, candle: Candle) {
        push_bounded(&mut self.daily, candle, self.limits.daily_window);
    }

    pub fn ingest_book(&mut self, book: OrderBookSnapshot) {
        push_bounded(&mut self.books, book, self.limits.book_window);
    }

    pub fn tick_count(&self) -> usize {
        self.ticks.len()
    }

    /// Builds the immutable snapshot for this cycle, or `None` before the
    /// first tick has arrived.
    pub fn snapshot(&self) -> Option<MarketSnapshot> {
        let latest = self.ticks.back()?;

        let (swing_high, swing_low) = self.swing_levels();
        let fib_levels = match (swing_high, swing_low) {
            (Some(high), Some(low)) if high > low => fibonacci_levels(high, low),
            _ => Vec::new(),
        };

        Some(MarketSnapshot {
            symbol: self.symbol.clone(),
            timestamp: latest.timestamp,
            bid: latest.bid,
            ask: latest.ask,
            last: latest.last,
            spread: latest.spread(),
            vwap: self.session_vwap(latest.timestamp),
            delta: self.bid_ask_delta(),
            swing_high,
            swing_low,
            fib_levels,
            book: self.books.back().cloned(),
            volume_baseline: self.volume_baseline(),
            volume_recent: self.volume_recent(),
            spread_baseline: self.spread_baseline(),
            recent_bids: self
                .ticks
                .iter()
                .rev()
                .take(STALL_PRICE_WINDOW)
                .map(|t| t.bid)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect(),
            has_candles: !self.candles.is_empty(),
        })
    }

    /// Volume-weighted average of the typical price over today's candles.
    fn session_vwap(&self, now: DateTime<Utc>) -> Option<Decimal> {
        let today = now.date_naive();
        let mut pv = Decimal::ZERO;
        let mut volume = Decimal::ZERO;
        for candle in self.candles.iter().filter(|c| c.timestamp.date_naive() == today) {
            pv += candle.typical_price() * candle.volume;
            volume += candle.volume;
        }
        if volume.is_zero() {
            None
        } else {
            Some(pv / volume)
        }
    }

    /// Tick volume signed by trade aggressor side, summed over the recent
    /// window. A last price at or above mid counts as buy pressure.
    fn bid_ask_delta(&self) -> Decimal {
        self.ticks
            .iter()
            .rev()
            .take(DELTA_WINDOW)
            .map(|t| {
                if t.last >= t.mid() {
                    t.volume
                } else {
                    -t.volume
                }
            })
            .sum()
    }

    fn swing_levels(&self) -> (Option<Decimal>, Option<Decimal>) {
        let high = self.daily.iter().map(|c| c.high).max();
        let low = self.daily.iter().map(|c| c.low).min();
        (high, low)
    }

    fn volume_baseline(&self) -> Option<Decimal> {
        if self.ticks.len() < BASELINE_MIN_TICKS {
            return None;
        }
        mean(self.ticks.iter().rev().take(DELTA_WINDOW).map(|t| t.volume))
    }

    fn volume_recent(&self) -> Option<Decimal> {
        if self.ticks.len() < BASELINE_MIN_TICKS {
            return None;
        }
        mean(self.ticks.iter().rev().take(RECENT_WINDOW).map(|t| t.volume))
    }

    fn spread_baseline(&self) -> Option<Decimal> {
        if self.ticks.len() < BASELINE_MIN_TICKS {
            return None;
        }
        mean(self.ticks.iter().rev().take(DELTA_WINDOW).map(|t| t.spread()))
    }
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T, capacity: usize) {
    if capacity > 0 && buffer.len() >= capacity {
        buffer.pop_front();
    }
    buffer.push_back(item);
}

fn mean(values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    let mut sum = Decimal::ZERO;
    let mut count = 0u32;
    for value in values {
        sum += value;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(sum / Decimal::from(count))
    }
}

/// Standard retracement levels, measured down from the swing high.
fn fibonacci_levels(high: Decimal, low: Decimal) -> Vec<FibLevel> {
    let diff = high - low;
    [dec!(0.236), dec!(0.382), dec!(0.5), dec!(0.618), dec!(0.786)]
        .into_iter()
        .map(|ratio| FibLevel {
            ratio,
            price: high - diff * ratio,
        })
        .collect()
}
