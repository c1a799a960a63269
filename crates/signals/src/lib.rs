//! # Signal Generator
//!
//! Converts scored execution zones into actionable trade intents. Only
//! zones at or above the configured score threshold qualify; the entry is
//! offset from the zone toward the current price so the order fills before
//! the zone itself is reached, and the stop sits a fixed pip distance
//! beyond the entry. Signals inside the minimum interval since the last
//! accepted trade are suppressed, never queued.

use chrono::{DateTime, Duration, Utc};
use configuration::TradingConfig;
use core_types::{ExecutionZone, Side, TradeSignal};
use rust_decimal::Decimal;

pub struct SignalGenerator {
    trading: TradingConfig,
    min_interval: Duration,
}

impl SignalGenerator {
    pub fn new(trading: TradingConfig, min_interval_secs: i64) -> Self {
        Self {
            trading,
            min_interval: Duration::seconds(min_interval_secs),
        }
    }

    /// Produces at most one signal per cycle from the scored zones.
    ///
    /// `last_accepted` is the timestamp of the last trade the risk
    /// controller admitted; it is read-only here. The controller repeats
    /// the interval check at admission time as defense in depth.
    pub fn generate(
        &self,
        zones: &[ExecutionZone],
        current_bid: Decimal,
        last_accepted: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<TradeSignal> {
        let best = self.best_zone(zones, current_bid)?;

        if let Some(last) = last_accepted {
            if now - last < self.min_interval {
                tracing::debug!(
                    zone_price = %best.price,
                    score = %best.score,
                    "signal suppressed, minimum trade interval not elapsed"
                );
                return None;
            }
        }

        let pip = self.trading.pip_value;
        let offset = Decimal::from(self.trading.entry_offset_pips) * pip;
        let stop_distance = Decimal::from(self.trading.stop_loss_pips) * pip;

        // Entry sits between current price and the zone, so the position
        // is live before institutional orders at the zone trigger.
        let (entry_price, stop_loss) = match best.side {
            Side::Buy => (best.price - offset, best.price - offset - stop_distance),
            Side::Sell => (best.price + offset, best.price + offset + stop_distance),
        };

        tracing::info!(
            zone_price = %best.price,
            score = %best.score,
            side = ?best.side,
            %entry_price,
            %stop_loss,
            "trade signal generated"
        );

        Some(TradeSignal {
            symbol: self.trading.symbol.clone(),
            side: best.side,
            zone: best.clone(),
            entry_price,
            stop_loss,
            created_at: now,
        })
    }

    /// Highest score wins; exact ties go to the zone closer to the
    /// current price.
    fn best_zone<'a>(
        &self,
        zones: &'a [ExecutionZone],
        current_bid: Decimal,
    ) -> Option<&'a ExecutionZone> {
        zones
            .iter()
            .filter(|z| z.score >= self.trading.min_score_threshold)
            .min_by(|a, b| {
                b.score.cmp(&a.score).then_with(|| {
                    let da = (a.price - current_bid).abs();
                    let db = (b.price - current_bid).abs();
                    da.cmp(&db)
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use core_types::ScoreBreakdown;
    use rust_decimal_macros::dec;

    fn generator() -> SignalGenerator {
        SignalGenerator::new(TradingConfig::default(), 10_800)
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn zone(price: Decimal, side: Side, score: Decimal) -> ExecutionZone {
        // Pack the whole score into one component; the breakdown detail is
        // irrelevant to signal generation.
        let breakdown = ScoreBreakdown {
            vwap: score.min(dec!(30)),
            round_number: (score - dec!(30)).clamp(Decimal::ZERO, dec!(25)),
            fibonacci: (score - dec!(55)).clamp(Decimal::ZERO, dec!(20)),
            dom: (score - dec!(75)).clamp(Decimal::ZERO, dec!(15)),
            delta: (score - dec!(90)).clamp(Decimal::ZERO, dec!(10)),
        };
        ExecutionZone::new(price, side, breakdown, now())
    }

    #[test]
    fn no_signal_below_threshold() {
        let zones = vec![zone(dec!(1.08500), Side::Buy, dec!(89))];
        assert!(
            generator()
                .generate(&zones, dec!(1.08450), None, now())
                .is_none()
        );
    }

    #[test]
    fn scenario_a_aggregate_sixty_four_never_signals() {
        let zones = vec![zone(dec!(1.08500), Side::Buy, dec!(64))];
        assert!(
            generator()
                .generate(&zones, dec!(1.08450), None, now())
                .is_none()
        );
    }

    #[test]
    fn buy_entry_is_offset_below_the_zone() {
        let zones = vec![zone(dec!(1.08500), Side::Buy, dec!(92))];
        let signal = generator()
            .generate(&zones, dec!(1.08450), None, now())
            .unwrap();
        // 7 pips before the zone, 10-pip stop beyond the entry.
        assert_eq!(signal.entry_price, dec!(1.08430));
        assert_eq!(signal.stop_loss, dec!(1.08330));
        assert_eq!(signal.side, Side::Buy);
    }

    #[test]
    fn sell_entry_is_offset_above_the_zone() {
        let zones = vec![zone(dec!(1.08400), Side::Sell, dec!(92))];
        let signal = generator()
            .generate(&zones, dec!(1.08450), None, now())
            .unwrap();
        assert_eq!(signal.entry_price, dec!(1.08470));
        assert_eq!(signal.stop_loss, dec!(1.08570));
        assert_eq!(signal.side, Side::Sell);
    }

    #[test]
    fn highest_score_wins() {
        let zones = vec![
            zone(dec!(1.08520), Side::Buy, dec!(91)),
            zone(dec!(1.08510), Side::Buy, dec!(95)),
        ];
        let signal = generator()
            .generate(&zones, dec!(1.08450), None, now())
            .unwrap();
        assert_eq!(signal.zone.price, dec!(1.08510));
    }

    #[test]
    fn exact_ties_go_to_the_closer_zone() {
        let zones = vec![
            zone(dec!(1.08530), Side::Buy, dec!(92)),
            zone(dec!(1.08480), Side::Sell, dec!(92)),
        ];
        let signal = generator()
            .generate(&zones, dec!(1.08500), None, now())
            .unwrap();
        assert_eq!(signal.zone.price, dec!(1.08480));
    }

    #[test]
    fn signals_inside_the_interval_are_suppressed() {
        let zones = vec![zone(dec!(1.08500), Side::Buy, dec!(95))];
        let last = now() - Duration::hours(1);
        assert!(
            generator()
                .generate(&zones, dec!(1.08450), Some(last), now())
                .is_none()
        );
    }

    #[test]
    fn signals_flow_once_the_interval_elapsed() {
        let zones = vec![zone(dec!(1.08500), Side::Buy, dec!(95))];
        let last = now() - Duration::hours(4);
        assert!(
            generator()
                .generate(&zones, dec!(1.08450), Some(last), now())
                .is_some()
        );
    }
}
