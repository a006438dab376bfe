//! Sticky shortlist selection.
//!
//! Incumbents survive as long as they still match in their category (even
//! on a lower score) and keep their prior relative order. Remaining slots
//! fill from new candidates by score descending. The hysteresis keeps the
//! shortlist from reshuffling on every run over scoring noise.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::constants::RECOMMENDATION_SLOTS;
use crate::models::{RecommendationSet, RiskProfile, ScanResult};

/// Combine the previous shortlist with this run's results into a new set.
pub fn merge(
    previous: &RecommendationSet,
    results: &[ScanResult],
    now: DateTime<Utc>,
) -> RecommendationSet {
    let mut categories = BTreeMap::new();

    for profile in RiskProfile::ALL {
        // Best result per ticker within this category; a ticker matching two
        // detectors of the same profile competes once, at its higher score.
        let mut best: BTreeMap<&str, &ScanResult> = BTreeMap::new();
        for result in results.iter().filter(|r| r.detector.profile() == profile) {
            best.entry(result.ticker.as_str())
                .and_modify(|current| {
                    if result.score > current.score {
                        *current = result;
                    }
                })
                .or_insert(result);
        }

        let mut shortlist: Vec<ScanResult> = Vec::with_capacity(RECOMMENDATION_SLOTS);

        // Incumbents first, in their prior order, refreshed to this run's
        // scores.
        for incumbent in previous.category(profile) {
            if shortlist.len() >= RECOMMENDATION_SLOTS {
                break;
            }
            if let Some(refreshed) = best.get(incumbent.ticker.as_str()) {
                shortlist.push((*refreshed).clone());
            }
        }

        // Fill the rest from new candidates by score, skipping retained
        // tickers.
        let mut candidates: Vec<&ScanResult> = best
            .values()
            .filter(|r| !shortlist.iter().any(|kept| kept.ticker == r.ticker))
            .copied()
            .collect();
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.ticker.cmp(&b.ticker))
        });

        for candidate in candidates {
            if shortlist.len() >= RECOMMENDATION_SLOTS {
                break;
            }
            shortlist.push(candidate.clone());
        }

        categories.insert(profile, shortlist);
    }

    RecommendationSet {
        categories,
        last_scan: Some(now),
        is_scanning: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DetectorKind, Grade, PatternMatch, TradeLevels};
    use std::collections::BTreeMap as Map;

    fn result(ticker: &str, detector: DetectorKind, score: f64) -> ScanResult {
        ScanResult {
            ticker: ticker.to_string(),
            detector,
            score,
            grade: Grade::from_score(score),
            relative_strength: None,
            pattern: PatternMatch {
                ticker: ticker.to_string(),
                detector,
                matched_at: Utc::now(),
                metrics: Map::new(),
                levels: TradeLevels {
                    entry: 10.0,
                    stop: 9.0,
                    targets: vec![12.0],
                },
                rationale: vec![],
                trend_confirmed: None,
            },
        }
    }

    fn set_with(profile: RiskProfile, entries: Vec<ScanResult>) -> RecommendationSet {
        let mut categories = BTreeMap::new();
        categories.insert(profile, entries);
        RecommendationSet {
            categories,
            last_scan: Some(Utc::now()),
            is_scanning: false,
        }
    }

    #[test]
    fn test_incumbents_kept_then_fill_by_score() {
        // Previous shortlist [A, B, C]; this run A and C still match, B does
        // not, and D arrives with a higher score. Expected: [A, C, D].
        let previous = set_with(
            RiskProfile::Aggressive,
            vec![
                result("A", DetectorKind::Rally, 75.0),
                result("B", DetectorKind::Rally, 72.0),
                result("C", DetectorKind::Rally, 70.0),
            ],
        );

        let fresh = vec![
            result("A", DetectorKind::Rally, 60.0),
            result("C", DetectorKind::Rally, 50.0),
            result("D", DetectorKind::Rally, 90.0),
        ];

        let merged = merge(&previous, &fresh, Utc::now());
        let shortlist = merged.category(RiskProfile::Aggressive);

        let tickers: Vec<&str> = shortlist.iter().map(|r| r.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["A", "C", "D"]);

        // Incumbents carry this run's scores, even though they dropped.
        assert_eq!(shortlist[0].score, 60.0);
        assert_eq!(shortlist[1].score, 50.0);
    }

    #[test]
    fn test_cap_of_three_per_category() {
        let previous = RecommendationSet::default();
        let fresh = vec![
            result("A", DetectorKind::Rally, 90.0),
            result("B", DetectorKind::Rally, 80.0),
            result("C", DetectorKind::Rally, 70.0),
            result("D", DetectorKind::Rally, 60.0),
        ];

        let merged = merge(&previous, &fresh, Utc::now());
        let shortlist = merged.category(RiskProfile::Aggressive);
        assert_eq!(shortlist.len(), 3);
        assert_eq!(shortlist[0].ticker, "A");
        assert_eq!(shortlist[2].ticker, "C");
    }

    #[test]
    fn test_ticker_competes_once_per_category_at_best_score() {
        // Rally and bull-flag are both Aggressive; the same ticker should
        // hold one slot, at the stronger score.
        let previous = RecommendationSet::default();
        let fresh = vec![
            result("A", DetectorKind::Rally, 65.0),
            result("A", DetectorKind::BullFlag, 88.0),
            result("B", DetectorKind::Rally, 70.0),
        ];

        let merged = merge(&previous, &fresh, Utc::now());
        let shortlist = merged.category(RiskProfile::Aggressive);
        assert_eq!(shortlist.len(), 2);
        assert_eq!(shortlist[0].ticker, "A");
        assert_eq!(shortlist[0].score, 88.0);
        assert_eq!(shortlist[0].detector, DetectorKind::BullFlag);
    }

    #[test]
    fn test_categories_are_independent() {
        let previous = set_with(
            RiskProfile::Conservative,
            vec![result("X", DetectorKind::WeeklyRsiReversal, 60.0)],
        );

        let fresh = vec![
            result("X", DetectorKind::WeeklyRsiReversal, 58.0),
            result("Y", DetectorKind::Vcp, 80.0),
        ];

        let merged = merge(&previous, &fresh, Utc::now());
        assert_eq!(
            merged.category(RiskProfile::Conservative)[0].ticker,
            "X"
        );
        assert_eq!(merged.category(RiskProfile::Moderate)[0].ticker, "Y");
        assert!(merged.category(RiskProfile::Aggressive).is_empty());
    }
}
