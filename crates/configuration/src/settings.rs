use crate::error::ConfigError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// The root configuration structure for the entire application.
///
/// Every field is defaulted, so an empty file (or no file at all) yields a
/// runnable demo configuration with live trading disabled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub trading: TradingConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub exhaustion: ExhaustionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Config {
    /// Checks every invariant the components rely on. Called once at
    /// startup; a failure here must abort the run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.trading;
        if t.symbol.is_empty() {
            return Err(ConfigError::Invalid("trading.symbol must be set".into()));
        }
        if t.pip_value <= Decimal::ZERO || t.pip_value_per_lot <= Decimal::ZERO {
            return Err(ConfigError::Invalid(
                "trading.pip_value and trading.pip_value_per_lot must be positive".into(),
            ));
        }
        if t.scan_range_pips == 0 || t.stop_loss_pips == 0 {
            return Err(ConfigError::Invalid(
                "trading.scan_range_pips and trading.stop_loss_pips must be positive".into(),
            ));
        }
        if t.min_score_threshold <= Decimal::ZERO || t.min_score_threshold > dec!(100) {
            return Err(ConfigError::Invalid(
                "trading.min_score_threshold must be in (0, 100]".into(),
            ));
        }
        if t.loop_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "trading.loop_interval_ms must be positive".into(),
            ));
        }
        if t.max_open_positions == 0 {
            return Err(ConfigError::Invalid(
                "trading.max_open_positions must be at least 1".into(),
            ));
        }

        let r = &self.risk;
        for (name, value) in [
            ("risk.risk_per_trade", r.risk_per_trade),
            ("risk.max_daily_loss", r.max_daily_loss),
            ("risk.max_total_drawdown", r.max_total_drawdown),
        ] {
            if value <= Decimal::ZERO || value >= Decimal::ONE {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a fraction between 0 and 1"
                )));
            }
        }
        if r.max_trades_per_day == 0 {
            return Err(ConfigError::Invalid(
                "risk.max_trades_per_day must be at least 1".into(),
            ));
        }

        let e = &self.exhaustion;
        if e.volume_drop_threshold <= Decimal::ZERO || e.volume_drop_threshold >= Decimal::ONE {
            return Err(ConfigError::Invalid(
                "exhaustion.volume_drop_threshold must be a fraction between 0 and 1".into(),
            ));
        }
        if e.spread_widen_threshold <= Decimal::ONE {
            return Err(ConfigError::Invalid(
                "exhaustion.spread_widen_threshold must be greater than 1".into(),
            ));
        }
        if e.stall_window_ticks < 2 {
            return Err(ConfigError::Invalid(
                "exhaustion.stall_window_ticks must be at least 2".into(),
            ));
        }

        if self.scoring.vwap_max_distance_pips == 0 {
            return Err(ConfigError::Invalid(
                "scoring.vwap_max_distance_pips must be positive".into(),
            ));
        }
        if self.broker.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "broker.max_retries must be at least 1".into(),
            ));
        }

        Ok(())
    }
}

/// Symbol, cadence and signal geometry parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TradingConfig {
    /// The instrument to monitor and trade (e.g., "EURUSD").
    pub symbol: String,
    /// The price increment of one pip (0.0001 for 5-digit FX quotes).
    pub pip_value: Decimal,
    /// Account-currency value of one pip per standard lot.
    pub pip_value_per_lot: Decimal,
    /// Candidate levels are scanned this many pips around the current bid.
    pub scan_range_pips: u32,
    /// Entry is placed this many pips before the zone, toward current price.
    pub entry_offset_pips: u32,
    /// Fixed stop distance from the entry price.
    pub stop_loss_pips: u32,
    /// Zones below this aggregate score never become signals.
    pub min_score_threshold: Decimal,
    /// A position older than this is closed regardless of other conditions.
    pub max_hold_minutes: i64,
    /// Cadence of the trading loop.
    pub loop_interval_ms: u64,
    /// Concurrency cap on simultaneous positions (admission-controlled by
    /// the risk controller, not the position manager).
    pub max_open_positions: usize,
    /// When false the engine runs against the paper broker; the pipeline is
    /// identical, only the injected gateway differs.
    pub live_trading_enabled: bool,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            symbol: "EURUSD".to_string(),
            pip_value: dec!(0.0001),
            pip_value_per_lot: dec!(10),
            scan_range_pips: 20,
            entry_offset_pips: 7,
            stop_loss_pips: 10,
            min_score_threshold: dec!(90),
            max_hold_minutes: 15,
            loop_interval_ms: 1000,
            max_open_positions: 1,
            live_trading_enabled: false,
        }
    }
}

/// Prop-firm style risk limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Fraction of equity risked on a single trade.
    pub risk_per_trade: Decimal,
    /// Max cumulative realized loss per day, as a fraction of the
    /// day-start balance.
    pub max_daily_loss: Decimal,
    /// Max drawdown from the all-time equity peak before trading halts.
    pub max_total_drawdown: Decimal,
    pub max_trades_per_day: u32,
    /// Minimum seconds between accepted trades.
    pub min_trade_interval_secs: i64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: dec!(0.01),
            max_daily_loss: dec!(0.05),
            max_total_drawdown: dec!(0.10),
            max_trades_per_day: 3,
            min_trade_interval_secs: 10_800,
        }
    }
}

/// Shape parameters of the five confluence sub-scores.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// The VWAP sub-score decays linearly and saturates at 0 beyond this
    /// distance.
    pub vwap_max_distance_pips: u32,
    /// A Fibonacci level only contributes within this distance.
    pub fibonacci_proximity_pips: u32,
    /// Resting book volume that earns the full DOM sub-score.
    pub dom_volume_threshold: Decimal,
    /// Book levels within this many pips of a candidate count toward it.
    pub dom_tolerance_pips: u32,
    /// Absolute bid/ask delta that earns the full delta sub-score.
    pub delta_imbalance_threshold: Decimal,
    /// Zones scoring below this are discarded during scanning.
    pub min_zone_score: Decimal,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            vwap_max_distance_pips: 45,
            fibonacci_proximity_pips: 5,
            dom_volume_threshold: dec!(1500),
            dom_tolerance_pips: 5,
            delta_imbalance_threshold: dec!(8000),
            min_zone_score: dec!(50),
        }
    }
}

/// How the three exhaustion sub-conditions combine into an exit trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Any single condition triggers the exit.
    AnyOf,
    /// All three conditions must hold simultaneously.
    AllOf,
}

/// Exhaustion-exit thresholds and stop-trailing parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExhaustionConfig {
    pub policy: ExhaustionPolicy,
    /// Recent volume below this fraction of its rolling baseline counts as
    /// exhausted.
    pub volume_drop_threshold: Decimal,
    /// Spread above this multiple of its rolling baseline counts as
    /// exhausted.
    pub spread_widen_threshold: Decimal,
    /// Price range below this many pips over the stall window counts as
    /// stalled.
    pub price_stall_pips: u32,
    /// Number of recent ticks inspected for the stall check.
    pub stall_window_ticks: usize,
    /// Move the stop to break-even once this many pips in profit.
    pub trail_trigger_pips: u32,
    /// Pips beyond entry locked in when the stop trails.
    pub trail_lock_pips: u32,
}

impl Default for ExhaustionConfig {
    fn default() -> Self {
        Self {
            policy: ExhaustionPolicy::AnyOf,
            volume_drop_threshold: dec!(0.70),
            spread_widen_threshold: dec!(1.50),
            price_stall_pips: 2,
            stall_window_ticks: 5,
            trail_trigger_pips: 15,
            trail_lock_pips: 5,
        }
    }
}

/// Bounds of the rolling market-data windows.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub tick_window: usize,
    pub candle_window: usize,
    pub daily_window: usize,
    pub book_window: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tick_window: 1000,
            candle_window: 1440,
            daily_window: 5,
            book_window: 50,
        }
    }
}

/// Retry policy for broker calls.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Account balance the paper broker starts with when no live gateway
    /// is configured.
    pub paper_starting_balance: Decimal,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_ms: 250,
            paper_starting_balance: dec!(100000),
        }
    }
}

/// Where the day-keyed risk state record lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub file_path: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            file_path: "data/risk_state.json".to_string(),
        }
    }
}

/// Telegram notifier credentials; empty values disable alerting.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
}
