use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::RiskError;

/// Day-scoped risk counters plus the cross-day drawdown baseline.
///
/// Mutated only by the `RiskController`; every other component reads it
/// through accessor methods on the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskState {
    /// The trading day these counters belong to (broker-server date).
    pub day: NaiveDate,
    pub trades_today: u32,
    /// Cumulative realized loss for the day, stored as a positive amount.
    pub realized_loss_today: Decimal,
    pub last_trade_at: Option<DateTime<Utc>>,
    /// Balance at the start of the day; the daily loss cap is a fraction
    /// of this, not of live equity.
    pub day_start_balance: Decimal,
    pub peak_equity: Decimal,
    pub halted: bool,
}

impl RiskState {
    pub fn new(day: NaiveDate, balance: Decimal) -> Self {
        Self {
            day,
            trades_today: 0,
            realized_loss_today: Decimal::ZERO,
            last_trade_at: None,
            day_start_balance: balance,
            peak_equity: balance,
            halted: false,
        }
    }

    /// Resets the day-scoped counters for a new trading day. The equity
    /// peak and the halt flag deliberately survive the boundary; drawdown
    /// is measured across days.
    pub fn roll_day(&mut self, day: NaiveDate, balance: Decimal) {
        self.day = day;
        self.trades_today = 0;
        self.realized_loss_today = Decimal::ZERO;
        self.day_start_balance = balance;
    }
}

/// Persists the risk state as a pretty-printed JSON record so the daily
/// counters survive a restart while a position is still open.
pub struct RiskStateStore {
    path: PathBuf,
}

impl RiskStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns `None` when no record exists yet (first run, or the file
    /// was removed).
    pub fn load(&self) -> Result<Option<RiskState>, RiskError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Writes via a temp file and rename so a crash mid-write never
    /// leaves a truncated record behind.
    pub fn save(&self, state: &RiskState) -> Result<(), RiskError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn roll_day_resets_counters_but_keeps_the_peak() {
        let mut state = RiskState::new(day("2026-03-02"), dec!(100000));
        state.trades_today = 3;
        state.realized_loss_today = dec!(1200);
        state.peak_equity = dec!(104000);
        state.last_trade_at = Some(Utc::now());

        state.roll_day(day("2026-03-03"), dec!(101500));

        assert_eq!(state.day, day("2026-03-03"));
        assert_eq!(state.trades_today, 0);
        assert_eq!(state.realized_loss_today, Decimal::ZERO);
        assert_eq!(state.day_start_balance, dec!(101500));
        assert_eq!(state.peak_equity, dec!(104000));
    }

    #[test]
    fn save_and_load_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "zoneflow-risk-state-{}-roundtrip.json",
            std::process::id()
        ));
        let store = RiskStateStore::new(&path);

        let mut state = RiskState::new(day("2026-03-02"), dec!(100000));
        state.trades_today = 2;
        state.realized_loss_today = dec!(350.50);

        store.save(&state).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded, state);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn load_returns_none_when_no_record_exists() {
        let store = RiskStateStore::new("/nonexistent/zoneflow/risk_state.json");
        assert!(store.load().unwrap().is_none());
    }
}
