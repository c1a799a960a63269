use configuration::{ExhaustionConfig, ExhaustionPolicy};
use market_data::MarketSnapshot;
use rust_decimal::Decimal;

/// Detects momentum exhaustion from the live market snapshot.
///
/// Three conditions are evaluated independently: recent volume dropping
/// below a fraction of its baseline, the spread widening beyond a
/// multiple of its baseline, and price stalling inside a narrow range.
/// A condition whose inputs are still warming up is treated as unknown:
/// it can neither trigger an `AnyOf` exit nor satisfy an `AllOf` one.
pub struct ExhaustionDetector {
    config: ExhaustionConfig,
    pip: Decimal,
}

impl ExhaustionDetector {
    pub fn new(config: ExhaustionConfig, pip: Decimal) -> Self {
        Self { config, pip }
    }

    pub fn is_exhausted(&self, snapshot: &MarketSnapshot) -> bool {
        let conditions = [
            self.volume_dropped(snapshot),
            self.spread_widened(snapshot),
            self.price_stalled(snapshot),
        ];
        match self.config.policy {
            ExhaustionPolicy::AnyOf => conditions.iter().flatten().any(|&hit| hit),
            ExhaustionPolicy::AllOf => conditions.iter().all(|c| *c == Some(true)),
        }
    }

    fn volume_dropped(&self, snapshot: &MarketSnapshot) -> Option<bool> {
        let recent = snapshot.volume_recent?;
        let baseline = snapshot.volume_baseline?;
        if baseline <= Decimal::ZERO {
            return None;
        }
        Some(recent < baseline * self.config.volume_drop_threshold)
    }

    fn spread_widened(&self, snapshot: &MarketSnapshot) -> Option<bool> {
        let baseline = snapshot.spread_baseline?;
        if baseline <= Decimal::ZERO {
            return None;
        }
        Some(snapshot.spread > baseline * self.config.spread_widen_threshold)
    }

    fn price_stalled(&self, snapshot: &MarketSnapshot) -> Option<bool> {
        let window = self.config.stall_window_ticks;
        if snapshot.recent_bids.len() < window {
            return None;
        }
        let recent = &snapshot.recent_bids[snapshot.recent_bids.len() - window..];
        let mut high = recent[0];
        let mut low = recent[0];
        for &bid in recent {
            high = high.max(bid);
            low = low.min(bid);
        }
        Some(high - low < Decimal::from(self.config.price_stall_pips) * self.pip)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            symbol: "EURUSD".to_string(),
            timestamp: Utc::now(),
            bid: dec!(1.08450),
            ask: dec!(1.08460),
            last: dec!(1.08450),
            spread: dec!(0.00010),
            vwap: None,
            delta: Decimal::ZERO,
            swing_high: None,
            swing_low: None,
            fib_levels: vec![],
            book: None,
            volume_baseline: Some(dec!(100)),
            volume_recent: Some(dec!(100)),
            spread_baseline: Some(dec!(0.00010)),
            recent_bids: vec![dec!(1.08420), dec!(1.08450), dec!(1.08480)],
            has_candles: true,
        }
    }

    fn detector(policy: ExhaustionPolicy) -> ExhaustionDetector {
        let config = ExhaustionConfig {
            policy,
            ..ExhaustionConfig::default()
        };
        ExhaustionDetector::new(config, dec!(0.0001))
    }

    #[test]
    fn healthy_market_is_not_exhausted() {
        assert!(!detector(ExhaustionPolicy::AnyOf).is_exhausted(&snapshot()));
    }

    #[test]
    fn volume_collapse_triggers_any_of() {
        let mut snap = snapshot();
        snap.volume_recent = Some(dec!(50));
        assert!(detector(ExhaustionPolicy::AnyOf).is_exhausted(&snap));
    }

    #[test]
    fn wide_spread_triggers_any_of() {
        let mut snap = snapshot();
        snap.spread = dec!(0.00020);
        assert!(detector(ExhaustionPolicy::AnyOf).is_exhausted(&snap));
    }

    #[test]
    fn stalled_price_triggers_any_of() {
        let mut snap = snapshot();
        // Five ticks inside a one-pip range, against a 2-pip stall bar.
        snap.recent_bids = vec![
            dec!(1.08450),
            dec!(1.08451),
            dec!(1.08450),
            dec!(1.08452),
            dec!(1.08451),
        ];
        assert!(detector(ExhaustionPolicy::AnyOf).is_exhausted(&snap));
    }

    #[test]
    fn all_of_needs_every_condition() {
        let mut snap = snapshot();
        snap.volume_recent = Some(dec!(50));
        snap.spread = dec!(0.00020);
        // Price is still moving, so AllOf must not trigger.
        snap.recent_bids = vec![
            dec!(1.08410),
            dec!(1.08440),
            dec!(1.08480),
            dec!(1.08520),
            dec!(1.08560),
        ];
        assert!(!detector(ExhaustionPolicy::AllOf).is_exhausted(&snap));

        snap.recent_bids = vec![dec!(1.08450); 5];
        assert!(detector(ExhaustionPolicy::AllOf).is_exhausted(&snap));
    }

    #[test]
    fn warmup_data_never_triggers() {
        let mut snap = snapshot();
        snap.volume_baseline = None;
        snap.volume_recent = None;
        snap.spread_baseline = None;
        snap.recent_bids = vec![dec!(1.08450)];
        assert!(!detector(ExhaustionPolicy::AnyOf).is_exhausted(&snap));
        assert!(!detector(ExhaustionPolicy::AllOf).is_exhausted(&snap));
    }
}
