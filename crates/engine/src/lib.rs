//! # Trading Engine
//!
//! The orchestrator of the whole pipeline. Each cycle it drains queued
//! market events into the cache, monitors open positions (exits always
//! run before entries), rolls the trading day when the date changes,
//! and only then scans for new zones, generates at most one signal, and
//! passes it through the risk controller for admission.
//!
//! The engine is the single writer of the market data cache and the
//! only caller of the broker gateway; every other component is pure
//! with respect to I/O.

use std::sync::Arc;

use broker::{AccountInfo, BrokerGateway, with_backoff};
use chrono::{DateTime, Utc};
use configuration::Config;
use core_types::Candle;
use events::{EngineEvent, Severity};
use market_data::{MarketDataCache, MarketEvent};
use risk::{RiskController, RiskState, RiskStateStore, Verdict};
use rust_decimal::Decimal;
use scorer::ZoneScorer;
use signals::SignalGenerator;
use tokio::sync::{broadcast, mpsc};

pub mod error;
pub mod exhaustion;
pub mod feed;
pub mod position;

pub use error::EngineError;
pub use exhaustion::ExhaustionDetector;
pub use feed::{CandleBuilder, run_market_feed};
pub use position::{ClosedTrade, PositionManager};

pub struct TradingEngine {
    config: Config,
    cache: MarketDataCache,
    scorer: ZoneScorer,
    signals: SignalGenerator,
    risk: RiskController,
    positions: PositionManager,
    broker: Arc<dyn BrokerGateway>,
    events: broadcast::Sender<EngineEvent>,
    market_rx: mpsc::Receiver<MarketEvent>,
}

impl TradingEngine {
    /// Connects to the broker, restores (or initializes) the risk state,
    /// and assembles the pipeline.
    pub async fn new(
        config: Config,
        broker: Arc<dyn BrokerGateway>,
        market_rx: mpsc::Receiver<MarketEvent>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Result<Self, EngineError> {
        broker.connect().await?;
        let account = broker.get_account_info().await?;

        let store = RiskStateStore::new(&config.state.file_path);
        let state = match store.load()? {
            Some(state) => {
                tracing::info!(
                    day = %state.day,
                    trades_today = state.trades_today,
                    "risk state restored from disk"
                );
                state
            }
            None => RiskState::new(Utc::now().date_naive(), account.balance),
        };
        let risk = RiskController::new(
            config.risk.clone(),
            config.trading.clone(),
            state,
            Some(store),
        );

        let detector = ExhaustionDetector::new(config.exhaustion.clone(), config.trading.pip_value);
        let positions = PositionManager::new(
            config.trading.clone(),
            config.broker.clone(),
            detector,
            config.exhaustion.trail_trigger_pips,
            config.exhaustion.trail_lock_pips,
            Arc::clone(&broker),
            events.clone(),
        );

        let scorer = ZoneScorer::new(config.scoring.clone(), config.trading.pip_value);
        let signals = SignalGenerator::new(config.trading.clone(), config.risk.min_trade_interval_secs);
        let cache = MarketDataCache::new(config.trading.symbol.clone(), config.cache.clone());

        tracing::info!(
            symbol = %config.trading.symbol,
            balance = %account.balance,
            live = config.trading.live_trading_enabled,
            "engine initialized"
        );
        let _ = events.send(EngineEvent::Started {
            symbol: config.trading.symbol.clone(),
            balance: account.balance,
        });

        Ok(Self {
            config,
            cache,
            scorer,
            signals,
            risk,
            positions,
            broker,
            events,
            market_rx,
        })
    }

    /// Drives `cycle` at the configured cadence until the process stops.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(
            self.config.trading.loop_interval_ms,
        ));
        loop {
            ticker.tick().await;
            self.cycle(Utc::now()).await?;
        }
    }

    /// One pass of the trading loop. Split out from `run` so tests can
    /// drive the engine with a controlled clock.
    pub async fn cycle(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        self.drain_market_events();
        let Some(snapshot) = self.cache.snapshot() else {
            return Ok(());
        };

        match self.positions.monitor(&snapshot, now).await {
            Ok(closed) => {
                for trade in &closed {
                    self.risk.record_close(trade.pnl)?;
                }
            }
            Err(EngineError::CloseFailed { order_id, source }) => {
                // Keep the loop alive: the position stays under monitoring
                // and the close is retried next cycle, but nothing new is
                // admitted until a human intervenes.
                tracing::error!(%order_id, error = %source, "close failed, halting admission");
                self.risk.halt("unrecoverable close failure")?;
                return Ok(());
            }
            Err(other) => return Err(other),
        }

        self.roll_day_if_needed(now).await?;

        // A broker outage must never take the loop down: positions were
        // already monitored above, so a failed account fetch only costs
        // this cycle's entry scan.
        let account = match self.account_info().await {
            Ok(account) => account,
            Err(err) => {
                tracing::warn!(error = %err, "account info unavailable, skipping entry scan");
                return Ok(());
            }
        };
        self.risk.update_equity(account.equity)?;

        if self.risk.is_halted() {
            return Ok(());
        }
        if self.positions.open_count() >= self.config.trading.max_open_positions {
            return Ok(());
        }

        let zones = self
            .scorer
            .scan(&snapshot, self.config.trading.scan_range_pips);
        let Some(signal) =
            self.signals
                .generate(&zones, snapshot.bid, self.risk.last_trade_at(), now)
        else {
            return Ok(());
        };

        let verdict =
            self.risk
                .evaluate(&signal, account.equity, self.positions.open_count(), now)?;
        match verdict {
            Verdict::Accept { size } => {
                if let Err(err) = self.positions.submit(&signal, size, now).await {
                    tracing::error!(error = %err, "failed to place entry order");
                    let _ = self.events.send(EngineEvent::Alert {
                        timestamp: now,
                        severity: Severity::Warning,
                        message: format!("entry order failed: {err}"),
                    });
                }
            }
            Verdict::Reject { reason } => {
                let _ = self.events.send(EngineEvent::SignalRejected {
                    signal,
                    reason: reason.to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn open_positions(&self) -> usize {
        self.positions.open_count()
    }

    pub fn risk(&self) -> &RiskController {
        &self.risk
    }

    async fn account_info(&self) -> Result<AccountInfo, broker::BrokerError> {
        with_backoff(
            self.config.broker.max_retries,
            self.config.broker.retry_backoff_ms,
            "get_account_info",
            || self.broker.get_account_info(),
        )
        .await
    }

    fn drain_market_events(&mut self) {
        while let Ok(event) = self.market_rx.try_recv() {
            event.apply(&mut self.cache);
        }
    }

    /// Resets daily risk counters on the first cycle of a new
    /// broker-server day and reports the previous day's tally.
    async fn roll_day_if_needed(&mut self, now: DateTime<Utc>) -> Result<(), EngineError> {
        let today = now.date_naive();
        if today == self.risk.state().day {
            return Ok(());
        }
        let previous = self.risk.state().clone();
        // Deferred, not fatal: the roll re-runs on the next cycle until
        // the balance fetch succeeds.
        let account = match self.account_info().await {
            Ok(account) => account,
            Err(err) => {
                tracing::warn!(error = %err, "account info unavailable, day roll deferred");
                return Ok(());
            }
        };
        if self.risk.roll_day(today, account.balance)? {
            let _ = self.events.send(EngineEvent::DailySummary {
                day: previous.day.to_string(),
                trades: previous.trades_today,
                realized_loss: previous.realized_loss_today,
                balance: account.balance,
            });
        }
        Ok(())
    }
}

/// Connects, reports account and market state plus the best-scored
/// zones, and exits without placing any order. Backs the CLI test mode.
pub async fn probe(
    config: &Config,
    broker: Arc<dyn BrokerGateway>,
    top: usize,
) -> Result<(), EngineError> {
    broker.connect().await?;
    let AccountInfo { balance, equity } = broker.get_account_info().await?;
    let quote = broker.get_quote(&config.trading.symbol).await?;
    tracing::info!(%balance, %equity, "account state");
    tracing::info!(
        bid = %quote.bid,
        ask = %quote.ask,
        spread = %quote.spread(),
        "market state"
    );

    let mut cache = MarketDataCache::new(config.trading.symbol.clone(), config.cache.clone());
    // Synthesize one candle from the live quote so the scorer has a
    // session to evaluate against.
    cache.ingest_candle(Candle {
        timestamp: quote.timestamp,
        open: quote.last,
        high: quote.ask,
        low: quote.bid,
        close: quote.last,
        volume: quote.volume.max(Decimal::ONE),
    });
    if let Some(book) = broker.get_order_book(&config.trading.symbol).await? {
        cache.ingest_book(book);
    }
    cache.ingest_tick(quote);

    let Some(snapshot) = cache.snapshot() else {
        return Ok(());
    };
    let scorer = ZoneScorer::new(config.scoring.clone(), config.trading.pip_value);
    let zones = scorer.scan(&snapshot, config.trading.scan_range_pips);
    tracing::info!(candidates = zones.len(), "zones at or above the reporting floor");
    for zone in zones.iter().take(top) {
        tracing::info!(
            price = %zone.price,
            side = ?zone.side,
            score = %zone.score,
            vwap = %zone.breakdown.vwap,
            round = %zone.breakdown.round_number,
            fib = %zone.breakdown.fibonacci,
            dom = %zone.breakdown.dom,
            delta = %zone.breakdown.delta,
            "zone"
        );
    }
    Ok(())
}
