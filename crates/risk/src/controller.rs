use chrono::{DateTime, Duration, NaiveDate, Utc};
use configuration::{RiskConfig, TradingConfig};
use core_types::TradeSignal;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

use crate::error::RiskError;
use crate::state::{RiskState, RiskStateStore};

const MIN_LOT: Decimal = dec!(0.01);
const MAX_LOT: Decimal = dec!(100);

/// Why a qualifying signal was not admitted. Rejections are logged and
/// reported, but they are ordinary control flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    /// Trading is halted (drawdown breach or an unrecoverable close failure).
    Halted,
    /// The concurrency cap on simultaneous positions is already reached.
    PositionOpen,
    DailyTradeLimit,
    DailyLossLimit,
    MaxDrawdown,
    /// The minimum interval since the last accepted trade has not elapsed.
    TradeInterval,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::Halted => "trading halted",
            RejectReason::PositionOpen => "position already open",
            RejectReason::DailyTradeLimit => "daily trade limit reached",
            RejectReason::DailyLossLimit => "daily loss limit would be breached",
            RejectReason::MaxDrawdown => "max drawdown breached",
            RejectReason::TradeInterval => "minimum trade interval not elapsed",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The admission decision for one trade signal.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Accept { size: Decimal },
    Reject { reason: RejectReason },
}

/// The single authority on trade admission and `RiskState` mutation.
///
/// Counters are updated in the same call that produces the accept
/// verdict, so a signal can never be admitted twice against the same
/// budget. When a store is attached, every mutation is persisted before
/// the verdict is returned.
pub struct RiskController {
    risk: RiskConfig,
    trading: TradingConfig,
    state: RiskState,
    store: Option<RiskStateStore>,
}

impl RiskController {
    pub fn new(
        risk: RiskConfig,
        trading: TradingConfig,
        state: RiskState,
        store: Option<RiskStateStore>,
    ) -> Self {
        Self {
            risk,
            trading,
            state,
            store,
        }
    }

    pub fn state(&self) -> &RiskState {
        &self.state
    }

    /// Read-only view for the signal generator's interval suppression.
    pub fn last_trade_at(&self) -> Option<DateTime<Utc>> {
        self.state.last_trade_at
    }

    pub fn is_halted(&self) -> bool {
        self.state.halted
    }

    /// Halts all further admission. Used on drawdown breach and by the
    /// engine when a position cannot be closed at the broker.
    pub fn halt(&mut self, cause: &str) -> Result<(), RiskError> {
        if !self.state.halted {
            tracing::error!(cause, "trading halted, no further signals will be admitted");
            self.state.halted = true;
            self.persist()?;
        }
        Ok(())
    }

    /// Tracks the all-time equity peak for drawdown measurement. A new
    /// peak is persisted immediately so a restart measures drawdown
    /// against the true high-water mark, not the last trade-time
    /// snapshot.
    pub fn update_equity(&mut self, equity: Decimal) -> Result<(), RiskError> {
        if equity > self.state.peak_equity {
            self.state.peak_equity = equity;
            self.persist()?;
        }
        Ok(())
    }

    /// Evaluates one signal against every configured limit and, on
    /// acceptance, sizes the position and commits the counters in the
    /// same step.
    pub fn evaluate(
        &mut self,
        signal: &TradeSignal,
        equity: Decimal,
        open_positions: usize,
        now: DateTime<Utc>,
    ) -> Result<Verdict, RiskError> {
        if self.state.halted {
            return Ok(self.reject(signal, RejectReason::Halted));
        }

        self.update_equity(equity)?;
        if self.drawdown(equity) >= self.risk.max_total_drawdown {
            self.state.halted = true;
            self.persist()?;
            return Ok(self.reject(signal, RejectReason::MaxDrawdown));
        }

        if open_positions >= self.trading.max_open_positions as usize {
            return Ok(self.reject(signal, RejectReason::PositionOpen));
        }

        if self.state.trades_today >= self.risk.max_trades_per_day {
            return Ok(self.reject(signal, RejectReason::DailyTradeLimit));
        }

        let size = self.position_size(equity);
        let projected_loss = size
            * Decimal::from(self.trading.stop_loss_pips)
            * self.trading.pip_value_per_lot;
        let daily_loss_cap = self.state.day_start_balance * self.risk.max_daily_loss;
        if self.state.realized_loss_today + projected_loss > daily_loss_cap {
            return Ok(self.reject(signal, RejectReason::DailyLossLimit));
        }

        if let Some(last) = self.state.last_trade_at {
            if now - last < Duration::seconds(self.risk.min_trade_interval_secs) {
                return Ok(self.reject(signal, RejectReason::TradeInterval));
            }
        }

        self.state.trades_today += 1;
        self.state.last_trade_at = Some(now);
        self.persist()?;

        tracing::info!(
            symbol = %signal.symbol,
            side = ?signal.side,
            %size,
            %projected_loss,
            trades_today = self.state.trades_today,
            "signal accepted"
        );
        Ok(Verdict::Accept { size })
    }

    /// Feeds a closed position's realized P&L back into the daily loss
    /// budget. Profits do not replenish it.
    pub fn record_close(&mut self, pnl: Decimal) -> Result<(), RiskError> {
        if pnl < Decimal::ZERO {
            self.state.realized_loss_today -= pnl;
        }
        self.persist()
    }

    /// Resets the day-scoped counters when the broker-server date rolls
    /// over. Idempotent within a day.
    pub fn roll_day(&mut self, today: NaiveDate, balance: Decimal) -> Result<bool, RiskError> {
        if self.state.day == today {
            return Ok(false);
        }
        tracing::info!(
            %today,
            trades_yesterday = self.state.trades_today,
            "trading day rolled over, risk counters reset"
        );
        self.state.roll_day(today, balance);
        self.persist()?;
        Ok(true)
    }

    /// `risk_per_trade` of equity divided by the account-currency cost of
    /// the stop distance per lot, rounded to broker lot precision.
    fn position_size(&self, equity: Decimal) -> Decimal {
        let risk_amount = equity * self.risk.risk_per_trade;
        let loss_per_lot =
            Decimal::from(self.trading.stop_loss_pips) * self.trading.pip_value_per_lot;
        (risk_amount / loss_per_lot)
            .round_dp(2)
            .clamp(MIN_LOT, MAX_LOT)
    }

    fn drawdown(&self, equity: Decimal) -> Decimal {
        if self.state.peak_equity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        ((self.state.peak_equity - equity) / self.state.peak_equity).max(Decimal::ZERO)
    }

    fn reject(&self, signal: &TradeSignal, reason: RejectReason) -> Verdict {
        tracing::info!(
            symbol = %signal.symbol,
            zone_price = %signal.zone.price,
            score = %signal.zone.score,
            %reason,
            "signal rejected"
        );
        Verdict::Reject { reason }
    }

    fn persist(&self) -> Result<(), RiskError> {
        if let Some(store) = &self.store {
            store.save(&self.state)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_types::{ExecutionZone, ScoreBreakdown, Side, TradeSignal};

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn today() -> NaiveDate {
        now().date_naive()
    }

    fn signal() -> TradeSignal {
        let breakdown = ScoreBreakdown {
            vwap: dec!(30),
            round_number: dec!(25),
            fibonacci: dec!(20),
            dom: dec!(15),
            delta: dec!(5),
        };
        let zone = ExecutionZone::new(dec!(1.08500), Side::Buy, breakdown, now());
        TradeSignal {
            symbol: "EURUSD".to_string(),
            side: Side::Buy,
            zone,
            entry_price: dec!(1.08430),
            stop_loss: dec!(1.08330),
            created_at: now(),
        }
    }

    fn controller() -> RiskController {
        RiskController::new(
            RiskConfig::default(),
            TradingConfig::default(),
            RiskState::new(today(), dec!(100000)),
            None,
        )
    }

    #[test]
    fn accepted_signal_is_sized_from_equity_and_stop_distance() {
        let mut risk = controller();
        // $1,000 risked over a 10-pip stop at $10/pip/lot.
        let verdict = risk.evaluate(&signal(), dec!(100000), 0, now()).unwrap();
        assert_eq!(verdict, Verdict::Accept { size: dec!(10.00) });
    }

    #[test]
    fn risked_amount_never_exceeds_the_configured_fraction() {
        let mut risk = controller();
        let equity = dec!(100000);
        let verdict = risk.evaluate(&signal(), equity, 0, now()).unwrap();
        let Verdict::Accept { size } = verdict else {
            panic!("expected acceptance, got {verdict:?}");
        };
        let risked = size * dec!(10) * dec!(10);
        assert!(risked <= equity * dec!(0.01));
    }

    #[test]
    fn size_is_clamped_to_the_minimum_lot() {
        let mut risk = controller();
        let verdict = risk.evaluate(&signal(), dec!(50), 0, now()).unwrap();
        assert_eq!(verdict, Verdict::Accept { size: dec!(0.01) });
    }

    #[test]
    fn fourth_trade_of_the_day_is_rejected() {
        let mut risk = controller();
        let mut t = now();
        for _ in 0..3 {
            let verdict = risk.evaluate(&signal(), dec!(100000), 0, t).unwrap();
            assert!(matches!(verdict, Verdict::Accept { .. }));
            t += Duration::hours(4);
        }
        let verdict = risk.evaluate(&signal(), dec!(100000), 0, t).unwrap();
        assert_eq!(
            verdict,
            Verdict::Reject {
                reason: RejectReason::DailyTradeLimit
            }
        );
        assert_eq!(risk.state().trades_today, 3);
    }

    #[test]
    fn signal_inside_the_interval_is_rejected() {
        let mut risk = controller();
        risk.evaluate(&signal(), dec!(100000), 0, now()).unwrap();
        let verdict = risk
            .evaluate(&signal(), dec!(100000), 0, now() + Duration::hours(1))
            .unwrap();
        assert_eq!(
            verdict,
            Verdict::Reject {
                reason: RejectReason::TradeInterval
            }
        );
    }

    #[test]
    fn open_position_blocks_admission() {
        let mut risk = controller();
        let verdict = risk.evaluate(&signal(), dec!(100000), 1, now()).unwrap();
        assert_eq!(
            verdict,
            Verdict::Reject {
                reason: RejectReason::PositionOpen
            }
        );
    }

    #[test]
    fn drawdown_breach_halts_all_further_admission() {
        let mut risk = controller();
        risk.update_equity(dec!(100000)).unwrap();
        let verdict = risk.evaluate(&signal(), dec!(89000), 0, now()).unwrap();
        assert_eq!(
            verdict,
            Verdict::Reject {
                reason: RejectReason::MaxDrawdown
            }
        );
        assert!(risk.is_halted());

        // Even recovered equity does not resume trading within the process.
        let verdict = risk.evaluate(&signal(), dec!(100000), 0, now()).unwrap();
        assert_eq!(
            verdict,
            Verdict::Reject {
                reason: RejectReason::Halted
            }
        );
    }

    #[test]
    fn projected_loss_beyond_daily_cap_is_rejected() {
        let mut risk = controller();
        // Cap is 5% of the $100k day-start balance. A $4,200 realized loss
        // leaves less headroom than the next $1,000 stop would need.
        risk.record_close(dec!(-4200)).unwrap();
        let verdict = risk.evaluate(&signal(), dec!(100000), 0, now()).unwrap();
        assert_eq!(
            verdict,
            Verdict::Reject {
                reason: RejectReason::DailyLossLimit
            }
        );
    }

    #[test]
    fn profits_do_not_replenish_the_daily_loss_budget() {
        let mut risk = controller();
        risk.record_close(dec!(-1000)).unwrap();
        risk.record_close(dec!(2500)).unwrap();
        assert_eq!(risk.state().realized_loss_today, dec!(1000));
    }

    #[test]
    fn new_equity_peak_is_persisted_for_the_next_restart() {
        let path = std::env::temp_dir().join(format!(
            "zoneflow-risk-peak-{}.json",
            std::process::id()
        ));
        std::fs::remove_file(&path).ok();

        let mut risk = RiskController::new(
            RiskConfig::default(),
            TradingConfig::default(),
            RiskState::new(today(), dec!(100000)),
            Some(RiskStateStore::new(&path)),
        );
        risk.update_equity(dec!(104000)).unwrap();

        // A restart that reloads the record sees the high-water mark, so
        // drawdown is not measured against a stale, lower peak.
        let reloaded = RiskStateStore::new(&path).load().unwrap().unwrap();
        assert_eq!(reloaded.peak_equity, dec!(104000));

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn day_roll_resets_the_trade_counter() {
        let mut risk = controller();
        let mut t = now();
        for _ in 0..3 {
            risk.evaluate(&signal(), dec!(100000), 0, t).unwrap();
            t += Duration::hours(4);
        }
        assert_eq!(risk.state().trades_today, 3);

        let rolled = risk
            .roll_day(today() + Duration::days(1), dec!(99000))
            .unwrap();
        assert!(rolled);
        assert_eq!(risk.state().trades_today, 0);
        assert_eq!(risk.state().day_start_balance, dec!(99000));

        // Same day again is a no-op.
        let rolled = risk
            .roll_day(today() + Duration::days(1), dec!(99000))
            .unwrap();
        assert!(!rolled);
    }
}
