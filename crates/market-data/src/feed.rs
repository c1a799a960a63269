use crate::cache::MarketDataCache;
use core_types::{Candle, OrderBookSnapshot, Tick};
use tokio::sync::mpsc;

/// A unit of market data handed from the ingestion side to the trading
/// loop. The loop is the only writer of the cache; streaming callbacks
/// publish through the channel instead of touching it directly.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    Tick(Tick),
    Candle(Candle),
    DailyCandle(Candle),
    Book(OrderBookSnapshot),
}

impl MarketEvent {
    /// Applies this event to the cache. Centralized so every producer
    /// updates the windows the same way.
    pub fn apply(self, cache: &mut MarketDataCache) {
        match self {
            MarketEvent::Tick(tick) => cache.ingest_tick(tick),
            MarketEvent::Candle(candle) => cache.ingest_candle(candle),
            MarketEvent::DailyCandle(candle) => cache.ingest_daily(candle),
            MarketEvent::Book(book) => cache.ingest_book(book),
        }
    }
}

/// The bounded single-writer/single-reader handoff between ingestion and
/// the trading loop.
pub fn market_channel(
    capacity: usize,
) -> (mpsc::Sender<MarketEvent>, mpsc::Receiver<MarketEvent>) {
    mpsc::channel(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use configuration::CacheConfig;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn events_flow_through_the_channel_into_the_cache() {
        let (tx, mut rx) = market_channel(8);
        let mut cache = MarketDataCache::new("EURUSD", CacheConfig::default());

        let tick = Tick {
            timestamp: Utc::now(),
            bid: dec!(1.0850),
            ask: dec!(1.0851),
            last: dec!(1.0850),
            volume: dec!(2),
        };
        tx.send(MarketEvent::Tick(tick)).await.unwrap();
        drop(tx);

        while let Some(event) = rx.recv().await {
            event.apply(&mut cache);
        }
        assert_eq!(cache.snapshot().unwrap().bid, dec!(1.0850));
    }
}
