use std::collections::BTreeMap;

use super::PatternDetector;
use crate::constants::*;
use crate::error::Result;
use crate::models::{DetectorKind, PatternMatch, Series, TradeLevels};

/// Elliott ABC correction: a pivot low, an impulse high (A), and a higher
/// low (B), with wave C projected from B by Fibonacci multiples of the A
/// leg's amplitude.
pub struct ElliottAbcDetector;

#[derive(Debug, Clone, Copy, PartialEq)]
enum PivotKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy)]
struct Pivot {
    index: usize,
    price: f64,
    kind: PivotKind,
}

impl PatternDetector for ElliottAbcDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::ElliottAbc
    }

    fn detect(&self, series: &Series) -> Result<Option<PatternMatch>> {
        let pivots = find_pivots(series, ELLIOTT_PIVOT_WINDOW);
        if pivots.len() < ELLIOTT_MIN_PIVOTS {
            return Ok(None);
        }

        let Some((low, wave_a, wave_b)) = find_abc(&pivots) else {
            return Ok(None);
        };

        let amplitude = wave_a.price - low.price;
        if amplitude <= 0.0 {
            return Ok(None);
        }

        let retracement = (wave_a.price - wave_b.price) / amplitude;
        let high_quality = retracement < ELLIOTT_HIGH_QUALITY_RETRACE;

        let targets: Vec<f64> = ELLIOTT_FIB_MULTIPLES
            .iter()
            .map(|m| wave_b.price + m * amplitude)
            .collect();

        let close = series.last().map(|c| c.close).unwrap_or(0.0);
        let entry = close * (1.0 + ELLIOTT_ENTRY_BUFFER);
        let stop = wave_b.price * (1.0 - ELLIOTT_STOP_BUFFER);
        let levels = TradeLevels {
            entry,
            stop,
            targets,
        };

        let mut metrics = BTreeMap::new();
        metrics.insert("wave_a_return".into(), amplitude / low.price);
        metrics.insert("retracement".into(), retracement);
        metrics.insert("pivot_count".into(), pivots.len() as f64);
        metrics.insert(
            "bars_since_b".into(),
            (series.len() - 1 - wave_b.index) as f64,
        );
        metrics.insert("quality_high".into(), if high_quality { 1.0 } else { 0.0 });

        let rationale = vec![
            format!(
                "wave A {:.2} -> {:.2} (+{:.1}%)",
                low.price,
                wave_a.price,
                amplitude / low.price * 100.0
            ),
            format!(
                "wave B held {:.2}, retracing {:.0}% of A",
                wave_b.price,
                retracement * 100.0
            ),
            format!(
                "quality {} (retracement {} 70%)",
                if high_quality { "High" } else { "Medium" },
                if high_quality { "<" } else { ">=" }
            ),
        ];

        let matched_at = series.last().map(|c| c.time).unwrap_or_default();

        Ok(Some(PatternMatch {
            ticker: series.ticker.clone(),
            detector: self.kind(),
            matched_at,
            metrics,
            levels,
            rationale,
            trend_confirmed: None,
        }))
    }
}

/// A bar is a pivot high/low when it strictly dominates every neighbor in a
/// symmetric window. Ties produce no pivot.
fn find_pivots(series: &Series, window: usize) -> Vec<Pivot> {
    let highs = series.highs();
    let lows = series.lows();
    let len = highs.len();
    let mut pivots = Vec::new();

    if len < 2 * window + 1 {
        return pivots;
    }

    for i in window..len - window {
        let neighborhood = (i - window)..=(i + window);

        let is_high = neighborhood
            .clone()
            .filter(|&j| j != i)
            .all(|j| highs[i] > highs[j]);
        if is_high {
            pivots.push(Pivot {
                index: i,
                price: highs[i],
                kind: PivotKind::High,
            });
            continue;
        }

        let is_low = neighborhood.filter(|&j| j != i).all(|j| lows[i] < lows[j]);
        if is_low {
            pivots.push(Pivot {
                index: i,
                price: lows[i],
                kind: PivotKind::Low,
            });
        }
    }

    pivots
}

/// Most recent Low -> High(A) -> HigherLow(B) triple, with B strictly above
/// the initial low.
fn find_abc(pivots: &[Pivot]) -> Option<(Pivot, Pivot, Pivot)> {
    for b_idx in (0..pivots.len()).rev() {
        if pivots[b_idx].kind != PivotKind::Low {
            continue;
        }
        for a_idx in (0..b_idx).rev() {
            if pivots[a_idx].kind != PivotKind::High {
                continue;
            }
            for low_idx in (0..a_idx).rev() {
                if pivots[low_idx].kind != PivotKind::Low {
                    continue;
                }
                let low = pivots[low_idx];
                let wave_a = pivots[a_idx];
                let wave_b = pivots[b_idx];
                if wave_b.price > low.price && wave_a.price > low.price {
                    return Some((low, wave_a, wave_b));
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{elliott_fixture, series_from_closes};

    #[test]
    fn test_abc_fixture_matches() {
        let series = elliott_fixture("AAA");
        let m = ElliottAbcDetector.detect(&series).unwrap().expect("abc should match");

        assert!(m.metric("pivot_count").unwrap() >= ELLIOTT_MIN_PIVOTS as f64);
        assert_eq!(m.levels.targets.len(), ELLIOTT_FIB_MULTIPLES.len());

        // Targets ascend with the Fibonacci ladder.
        let targets = &m.levels.targets;
        assert!(targets.windows(2).all(|w| w[0] < w[1]));
        assert!(m.metric("retracement").unwrap() > 0.0);
    }

    #[test]
    fn test_too_few_pivots_is_none() {
        let series = series_from_closes("BBB", &vec![10.0; 50]);
        assert!(ElliottAbcDetector.detect(&series).unwrap().is_none());
    }
}
