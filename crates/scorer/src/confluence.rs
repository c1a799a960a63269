use configuration::ScoringConfig;
use core_types::{ExecutionZone, ScoreBreakdown, Side};
use market_data::MarketSnapshot;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fibonacci ratio weights; 61.8% is the strongest level.
const FIB_WEIGHTS: [(Decimal, Decimal); 5] = [
    (dec!(0.618), dec!(1.0)),
    (dec!(0.5), dec!(0.85)),
    (dec!(0.382), dec!(0.75)),
    (dec!(0.786), dec!(0.70)),
    (dec!(0.236), dec!(0.60)),
];

/// Computes confluence scores for candidate price levels around the
/// current price.
#[derive(Debug, Clone)]
pub struct ZoneScorer {
    scoring: ScoringConfig,
    /// Price increment of one pip for the monitored symbol.
    pip: Decimal,
}

impl ZoneScorer {
    pub fn new(scoring: ScoringConfig, pip: Decimal) -> Self {
        Self { scoring, pip }
    }

    /// Scores every level within `scan_range_pips` of the current bid in
    /// 1-pip steps. Zones below the configured floor are discarded; the
    /// rest come back sorted best-first (score descending, then distance
    /// to current price ascending).
    ///
    /// Returns an empty set when no candle history exists yet; a data gap
    /// is not an error.
    pub fn scan(&self, snapshot: &MarketSnapshot, scan_range_pips: u32) -> Vec<ExecutionZone> {
        if !snapshot.has_candles {
            tracing::debug!(symbol = %snapshot.symbol, "no candles in cache yet, skipping scan");
            return Vec::new();
        }

        let range = scan_range_pips as i64;
        let mut zones: Vec<ExecutionZone> = (-range..=range)
            .map(|offset| {
                let level = snapshot.bid + Decimal::from(offset) * self.pip;
                self.score_level(level, snapshot)
            })
            .filter(|zone| zone.score >= self.scoring.min_zone_score)
            .collect();

        zones.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| {
                    let da = (a.price - snapshot.bid).abs();
                    let db = (b.price - snapshot.bid).abs();
                    da.cmp(&db)
                })
                .then_with(|| a.price.cmp(&b.price))
        });
        zones
    }

    /// Scores a single candidate level against the snapshot.
    pub fn score_level(&self, price: Decimal, snapshot: &MarketSnapshot) -> ExecutionZone {
        let breakdown = ScoreBreakdown {
            vwap: self.vwap_score(price, snapshot.vwap),
            round_number: self.round_number_score(price),
            fibonacci: self.fibonacci_score(price, snapshot),
            dom: self.dom_score(price, snapshot),
            delta: self.delta_score(snapshot.delta),
        };

        // A level above the current price anticipates a buy-side breakout
        // into it; below, a sell-side one.
        let side = if price > snapshot.bid {
            Side::Buy
        } else {
            Side::Sell
        };

        ExecutionZone::new(price, side, breakdown, snapshot.timestamp)
    }

    /// VWAP distance (0-30): linear decay in pips, saturating at zero at
    /// `vwap_max_distance_pips`. Institutions are anchored to the session
    /// VWAP, so levels near it score highest.
    fn vwap_score(&self, price: Decimal, vwap: Option<Decimal>) -> Decimal {
        let Some(vwap) = vwap else {
            return Decimal::ZERO;
        };
        let distance_pips = (price - vwap).abs() / self.pip;
        let max_distance = Decimal::from(self.scoring.vwap_max_distance_pips);
        if distance_pips >= max_distance {
            return Decimal::ZERO;
        }
        ScoreBreakdown::VWAP_MAX * (max_distance - distance_pips) / max_distance
    }

    /// Round-number proximity (0-25). Large resting orders cluster at
    /// psychologically significant levels: full 50-pip multiples score the
    /// cap, quarter and 10-pip levels progressively less, and anything
    /// within 10 pips of a 50-pip multiple keeps a decaying remainder.
    fn round_number_score(&self, price: Decimal) -> Decimal {
        let pips = price / self.pip;

        if (pips % dec!(50)).is_zero() {
            return ScoreBreakdown::ROUND_MAX;
        }
        if (pips % dec!(25)).is_zero() {
            return ScoreBreakdown::ROUND_MAX * dec!(0.40);
        }
        if (pips % dec!(10)).is_zero() {
            return ScoreBreakdown::ROUND_MAX * dec!(0.20);
        }

        let nearest = (pips / dec!(50)).round() * dec!(50);
        let distance = (pips - nearest).abs();
        if distance <= dec!(10) {
            return ScoreBreakdown::ROUND_MAX * dec!(0.30) * (dec!(10) - distance) / dec!(10);
        }
        Decimal::ZERO
    }

    /// Fibonacci confluence (0-20): weighted proximity to the retracement
    /// levels of the recent swing; the best-scoring level wins. Zero when
    /// no valid swing is available.
    fn fibonacci_score(&self, price: Decimal, snapshot: &MarketSnapshot) -> Decimal {
        if snapshot.fib_levels.is_empty() {
            return Decimal::ZERO;
        }
        let threshold = Decimal::from(self.scoring.fibonacci_proximity_pips) * self.pip;
        if threshold.is_zero() {
            return Decimal::ZERO;
        }

        let mut best = Decimal::ZERO;
        for level in &snapshot.fib_levels {
            let distance = (price - level.price).abs();
            if distance > threshold {
                continue;
            }
            let weight = FIB_WEIGHTS
                .iter()
                .find(|(ratio, _)| *ratio == level.ratio)
                .map(|(_, w)| *w)
                .unwrap_or(dec!(0.5));
            let score = ScoreBreakdown::FIB_MAX * weight * (threshold - distance) / threshold;
            if score > best {
                best = score;
            }
        }
        best
    }

    /// DOM resting volume (0-15): book volume within tolerance of the
    /// candidate versus the full-score threshold. Zero when no book
    /// snapshot is available; the computation never fails.
    fn dom_score(&self, price: Decimal, snapshot: &MarketSnapshot) -> Decimal {
        let Some(book) = &snapshot.book else {
            return Decimal::ZERO;
        };
        let tolerance = Decimal::from(self.scoring.dom_tolerance_pips) * self.pip;
        let volume = book.volume_near(price, tolerance);
        let threshold = self.scoring.dom_volume_threshold;
        if threshold <= Decimal::ZERO || volume <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let knee = threshold * dec!(0.6);
        if volume >= threshold {
            ScoreBreakdown::DOM_MAX
        } else if volume >= knee {
            let base = ScoreBreakdown::DOM_MAX * dec!(0.6);
            base + ScoreBreakdown::DOM_MAX * dec!(0.4) * (volume - knee) / (threshold - knee)
        } else {
            volume * ScoreBreakdown::DOM_MAX * dec!(0.6) / knee
        }
    }

    /// Delta imbalance (0-10): extreme bid/ask volume differential marks
    /// institutional activity; magnitude is what matters, the sign picks
    /// the direction.
    fn delta_score(&self, delta: Decimal) -> Decimal {
        let magnitude = delta.abs();
        let threshold = self.scoring.delta_imbalance_threshold;
        if threshold <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let knee = threshold * dec!(0.5);
        if magnitude >= threshold {
            ScoreBreakdown::DELTA_MAX
        } else if magnitude >= knee {
            let base = ScoreBreakdown::DELTA_MAX * dec!(0.5);
            base + ScoreBreakdown::DELTA_MAX * dec!(0.5) * (magnitude - knee) / (threshold - knee)
        } else {
            magnitude * ScoreBreakdown::DELTA_MAX * dec!(0.5) / knee
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use core_types::{BookLevel, OrderBookSnapshot};
    use market_data::FibLevel;

    fn scorer() -> ZoneScorer {
        ZoneScorer::new(ScoringConfig::default(), dec!(0.0001))
    }

    fn snapshot(bid: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            symbol: "EURUSD".to_string(),
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            bid,
            ask: bid + dec!(0.0001),
            last: bid,
            spread: dec!(0.0001),
            vwap: None,
            delta: Decimal::ZERO,
            swing_high: None,
            swing_low: None,
            fib_levels: Vec::new(),
            book: None,
            volume_baseline: None,
            volume_recent: None,
            spread_baseline: None,
            recent_bids: vec![bid],
            has_candles: true,
        }
    }

    fn book_at(price: Decimal, volume: Decimal) -> OrderBookSnapshot {
        OrderBookSnapshot {
            timestamp: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            bids: vec![BookLevel { price, volume }],
            asks: Vec::new(),
        }
    }

    /// Scenario A from the acceptance checklist: 3 pips from VWAP, dead on
    /// a round number, no swing, moderate book volume, balanced delta.
    #[test]
    fn scenario_a_moderate_confluence_scores_sixty_four() {
        let mut snap = snapshot(dec!(1.08500));
        snap.vwap = Some(dec!(1.08470));
        snap.book = Some(book_at(dec!(1.08500), dec!(800)));
        snap.delta = dec!(2400);

        let zone = scorer().score_level(dec!(1.08500), &snap);

        assert_eq!(zone.breakdown.vwap, dec!(28));
        assert_eq!(zone.breakdown.round_number, dec!(25));
        assert_eq!(zone.breakdown.fibonacci, dec!(0));
        assert_eq!(zone.breakdown.dom, dec!(8));
        assert_eq!(zone.breakdown.delta, dec!(3));
        assert_eq!(zone.score, dec!(64));
    }

    #[test]
    fn vwap_score_decays_and_saturates_at_zero() {
        let s = scorer();
        assert_eq!(s.vwap_score(dec!(1.08500), Some(dec!(1.08500))), dec!(30));
        let near = s.vwap_score(dec!(1.08510), Some(dec!(1.08500)));
        let far = s.vwap_score(dec!(1.08530), Some(dec!(1.08500)));
        assert!(near > far);
        // 45 pips away and beyond: saturated.
        assert_eq!(s.vwap_score(dec!(1.08950), Some(dec!(1.08500))), dec!(0));
        assert_eq!(s.vwap_score(dec!(1.09500), Some(dec!(1.08500))), dec!(0));
        // No VWAP available: degrade, don't fail.
        assert_eq!(s.vwap_score(dec!(1.08500), None), dec!(0));
    }

    #[test]
    fn round_number_tiers() {
        let s = scorer();
        assert_eq!(s.round_number_score(dec!(1.0800)), dec!(25));
        assert_eq!(s.round_number_score(dec!(1.0850)), dec!(25));
        assert_eq!(s.round_number_score(dec!(1.0825)), dec!(10));
        assert_eq!(s.round_number_score(dec!(1.0810)), dec!(5));
        // Fractionally off the 50-pip level: proximity remainder.
        let near = s.round_number_score(dec!(1.08503));
        assert!(near > Decimal::ZERO && near < dec!(7.5));
    }

    #[test]
    fn fibonacci_score_zero_without_swing() {
        let snap = snapshot(dec!(1.08500));
        assert_eq!(
            scorer().fibonacci_score(dec!(1.08500), &snap),
            Decimal::ZERO
        );
    }

    #[test]
    fn fibonacci_prefers_the_golden_ratio_level() {
        let mut snap = snapshot(dec!(1.08500));
        snap.fib_levels = vec![
            FibLevel {
                ratio: dec!(0.618),
                price: dec!(1.08500),
            },
            FibLevel {
                ratio: dec!(0.236),
                price: dec!(1.08500),
            },
        ];
        // Both levels are dead-on; the 0.618 weight must win.
        assert_eq!(scorer().fibonacci_score(dec!(1.08500), &snap), dec!(20));
    }

    #[test]
    fn dom_score_zero_when_book_unavailable() {
        let snap = snapshot(dec!(1.08500));
        assert_eq!(scorer().dom_score(dec!(1.08500), &snap), Decimal::ZERO);
    }

    #[test]
    fn dom_score_full_at_threshold() {
        let mut snap = snapshot(dec!(1.08500));
        snap.book = Some(book_at(dec!(1.08500), dec!(1500)));
        assert_eq!(scorer().dom_score(dec!(1.08500), &snap), dec!(15));
    }

    #[test]
    fn delta_score_full_at_threshold_and_sign_agnostic() {
        let s = scorer();
        assert_eq!(s.delta_score(dec!(8000)), dec!(10));
        assert_eq!(s.delta_score(dec!(-8000)), dec!(10));
        assert_eq!(s.delta_score(dec!(-2400)), dec!(3));
    }

    #[test]
    fn scan_yields_empty_set_without_candles() {
        let mut snap = snapshot(dec!(1.08500));
        snap.has_candles = false;
        snap.vwap = Some(dec!(1.08500));
        assert!(scorer().scan(&snap, 20).is_empty());
    }

    #[test]
    fn scan_is_idempotent_on_identical_snapshots() {
        let mut snap = snapshot(dec!(1.08500));
        snap.vwap = Some(dec!(1.08470));
        snap.book = Some(book_at(dec!(1.08500), dec!(800)));
        snap.delta = dec!(2400);

        let first = scorer().scan(&snap, 20);
        let second = scorer().scan(&snap, 20);
        assert_eq!(first, second);
    }

    #[test]
    fn every_sub_score_respects_its_cap() {
        let mut snap = snapshot(dec!(1.08500));
        snap.vwap = Some(dec!(1.08500));
        snap.delta = dec!(50000);
        snap.book = Some(book_at(dec!(1.08500), dec!(99999)));
        snap.fib_levels = vec![FibLevel {
            ratio: dec!(0.618),
            price: dec!(1.08500),
        }];

        let s = scorer();
        for offset in -20i64..=20 {
            let price = snap.bid + Decimal::from(offset) * dec!(0.0001);
            let zone = s.score_level(price, &snap);
            let b = &zone.breakdown;
            assert!(b.vwap >= Decimal::ZERO && b.vwap <= ScoreBreakdown::VWAP_MAX);
            assert!(b.round_number >= Decimal::ZERO && b.round_number <= ScoreBreakdown::ROUND_MAX);
            assert!(b.fibonacci >= Decimal::ZERO && b.fibonacci <= ScoreBreakdown::FIB_MAX);
            assert!(b.dom >= Decimal::ZERO && b.dom <= ScoreBreakdown::DOM_MAX);
            assert!(b.delta >= Decimal::ZERO && b.delta <= ScoreBreakdown::DELTA_MAX);
            assert!(zone.score >= Decimal::ZERO && zone.score <= dec!(100));
            assert_eq!(zone.score, b.total());
        }
    }

    #[test]
    fn zones_above_current_price_anticipate_buys() {
        let mut snap = snapshot(dec!(1.08500));
        snap.vwap = Some(dec!(1.08500));
        let s = scorer();
        assert_eq!(s.score_level(dec!(1.08510), &snap).side, Side::Buy);
        assert_eq!(s.score_level(dec!(1.08490), &snap).side, Side::Sell);
    }
}
