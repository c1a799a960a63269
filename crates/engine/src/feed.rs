use std::sync::Arc;

use broker::BrokerGateway;
use chrono::{Duration, DurationRound};
use core_types::{Candle, Tick};
use market_data::MarketEvent;
use tokio::sync::mpsc;

/// Folds a stream of ticks into fixed-period candles.
pub struct CandleBuilder {
    period: Duration,
    current: Option<Candle>,
}

impl CandleBuilder {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            current: None,
        }
    }

    /// Absorbs a tick; returns the finished candle when the tick opens a
    /// new period.
    pub fn update(&mut self, tick: &Tick) -> Option<Candle> {
        let bucket = tick
            .timestamp
            .duration_trunc(self.period)
            .unwrap_or(tick.timestamp);

        match &mut self.current {
            Some(candle) if candle.timestamp == bucket => {
                candle.high = candle.high.max(tick.last);
                candle.low = candle.low.min(tick.last);
                candle.close = tick.last;
                candle.volume += tick.volume;
                None
            }
            _ => self.current.replace(Candle {
                timestamp: bucket,
                open: tick.last,
                high: tick.last,
                low: tick.last,
                close: tick.last,
                volume: tick.volume,
            }),
        }
    }
}

/// Polls the broker for quotes and depth and publishes market events to
/// the trading loop. Minute and daily candles are aggregated locally
/// from the tick stream.
///
/// Runs until the receiving side of the channel is dropped. A broker
/// without quotes (the paper broker before any quote is pushed) makes
/// the feed idle rather than error out.
pub async fn run_market_feed(
    broker: Arc<dyn BrokerGateway>,
    symbol: String,
    poll_ms: u64,
    tx: mpsc::Sender<MarketEvent>,
) {
    let mut minute = CandleBuilder::new(Duration::minutes(1));
    let mut daily = CandleBuilder::new(Duration::days(1));
    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(poll_ms));

    tracing::info!(%symbol, poll_ms, "market feed started");
    loop {
        ticker.tick().await;

        let quote = match broker.get_quote(&symbol).await {
            Ok(quote) => quote,
            Err(err) => {
                tracing::debug!(error = %err, "no quote this poll");
                continue;
            }
        };

        if let Some(candle) = minute.update(&quote) {
            if tx.send(MarketEvent::Candle(candle)).await.is_err() {
                break;
            }
        }
        if let Some(candle) = daily.update(&quote) {
            if tx.send(MarketEvent::DailyCandle(candle)).await.is_err() {
                break;
            }
        }
        match broker.get_order_book(&symbol).await {
            Ok(Some(book)) => {
                if tx.send(MarketEvent::Book(book)).await.is_err() {
                    break;
                }
            }
            Ok(None) => {}
            Err(err) => tracing::warn!(error = %err, "order book fetch failed"),
        }
        if tx.send(MarketEvent::Tick(quote)).await.is_err() {
            break;
        }
    }
    tracing::info!("market feed stopped");
}
