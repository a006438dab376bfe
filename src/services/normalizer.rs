//! Converts raw provider tables into typed [`Series`].
//!
//! Batched chart responses are not trustworthy about layout: the same
//! endpoint has been seen returning flat columns, columns grouped
//! field-then-ticker, columns grouped ticker-then-field, and tables buried
//! under envelope objects. Extraction precedence is fixed:
//!
//! 1. flat single-ticker columns at the top level
//! 2. grouped field -> ticker
//! 3. grouped ticker -> field
//! 4. flatten: walk the tree for any table tagged with the requested symbol
//!
//! A response that plainly covers other tickers but not the requested one
//! yields [`AppError::TickerNotPresent`], which is distinct from an empty
//! series ("nothing traded") so the caller can retry a different call shape.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::{Candle, Interval, Series};

const TIME_KEYS: &[&str] = &["timestamp", "time", "t", "date"];
const OPEN_KEYS: &[&str] = &["open", "o"];
const HIGH_KEYS: &[&str] = &["high", "h"];
const LOW_KEYS: &[&str] = &["low", "l"];
const CLOSE_KEYS: &[&str] = &["close", "c", "adjclose"];
const VOLUME_KEYS: &[&str] = &["volume", "v"];
const SYMBOL_KEYS: &[&str] = &["symbol", "ticker", "s"];

/// Normalize a raw provider table into the series for `ticker`.
pub fn normalize(raw: &Value, ticker: &str, interval: Interval) -> Result<Series> {
    let ticker = ticker.trim().to_uppercase();

    let Some(obj) = raw.as_object() else {
        return Err(AppError::DataShape("response is not a JSON object".into()));
    };

    // 1. Flat single-ticker table at the top level.
    if let Some(candles) = extract_flat(obj) {
        return Ok(finish(&ticker, interval, candles));
    }

    let mut saw_other_tickers = false;

    // 2. Grouped field -> ticker.
    match extract_field_first(obj, &ticker) {
        Ok(Some(candles)) => return Ok(finish(&ticker, interval, candles)),
        Ok(None) => {}
        Err(()) => saw_other_tickers = true,
    }

    // 3. Grouped ticker -> field.
    match extract_ticker_first(obj, &ticker) {
        Ok(Some(candles)) => return Ok(finish(&ticker, interval, candles)),
        Ok(None) => {}
        Err(()) => saw_other_tickers = true,
    }

    // 4. Flatten: collect every recognizable table in the tree along with
    // the nearest symbol tag.
    let mut tables = Vec::new();
    collect_tables(raw, None, &mut tables);

    if let Some((_, candles)) = tables
        .iter()
        .find(|(sym, _)| sym.as_deref() == Some(ticker.as_str()))
    {
        return Ok(finish(&ticker, interval, candles.clone()));
    }

    // A single untagged table in a response that showed no trace of other
    // tickers is the requested ticker's data.
    if !saw_other_tickers
        && tables.len() == 1
        && tables[0].0.is_none()
    {
        return Ok(finish(&ticker, interval, tables[0].1.clone()));
    }

    if saw_other_tickers || tables.iter().any(|(sym, _)| sym.is_some()) {
        return Err(AppError::TickerNotPresent(ticker));
    }

    Err(AppError::DataShape(
        "no recognizable OHLCV table in response".into(),
    ))
}

fn finish(ticker: &str, interval: Interval, mut candles: Vec<Candle>) -> Series {
    candles.sort_by_key(|c| c.time);
    // Provider encoding quirks can repeat column pairs; keep the last value
    // seen for a timestamp.
    candles.reverse();
    candles.dedup_by_key(|c| c.time);
    candles.reverse();
    Series::new(ticker, interval, candles)
}

fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

/// Extract flat columns from an object; None when it does not look like a
/// flat table. Rows with a missing OHLC value are dropped; a missing volume
/// is zero.
fn extract_flat(obj: &Map<String, Value>) -> Option<Vec<Candle>> {
    let times = first_present(obj, TIME_KEYS)?.as_array()?;
    let opens = first_present(obj, OPEN_KEYS)?.as_array()?;
    let highs = first_present(obj, HIGH_KEYS)?.as_array()?;
    let lows = first_present(obj, LOW_KEYS)?.as_array()?;
    let closes = first_present(obj, CLOSE_KEYS)?.as_array()?;
    let volumes = first_present(obj, VOLUME_KEYS).and_then(Value::as_array);

    let len = times.len();
    if [opens.len(), highs.len(), lows.len(), closes.len()]
        .iter()
        .any(|&l| l != len)
    {
        return None;
    }

    let mut candles = Vec::with_capacity(len);
    for i in 0..len {
        let Some(time) = parse_time(&times[i]) else {
            continue;
        };
        let (Some(open), Some(high), Some(low), Some(close)) = (
            opens[i].as_f64(),
            highs[i].as_f64(),
            lows[i].as_f64(),
            closes[i].as_f64(),
        ) else {
            continue;
        };
        let volume = volumes
            .and_then(|v| v.get(i))
            .and_then(Value::as_u64)
            .unwrap_or(0);

        candles.push(Candle::new(time, open, high, low, close, volume));
    }

    Some(candles)
}

/// Layout A: `{"open": {"AAPL": [...]}, "close": {"AAPL": [...]}, ...}`.
/// `Err(())` means the grouping exists but the ticker is not in it.
fn extract_field_first(
    obj: &Map<String, Value>,
    ticker: &str,
) -> std::result::Result<Option<Vec<Candle>>, ()> {
    let close_family = match first_present(obj, CLOSE_KEYS).and_then(Value::as_object) {
        Some(f) => f,
        None => return Ok(None),
    };

    if !member(close_family, ticker) {
        // The close column is grouped by ticker, so the layout is A; the
        // requested ticker simply is not in the batch.
        return Err(());
    }

    let mut flat = Map::new();
    for (canonical, keys) in [
        ("open", OPEN_KEYS),
        ("high", HIGH_KEYS),
        ("low", LOW_KEYS),
        ("close", CLOSE_KEYS),
        ("volume", VOLUME_KEYS),
        ("timestamp", TIME_KEYS),
    ] {
        let Some(family) = first_present(obj, keys) else {
            continue;
        };
        let column = match family {
            // Timestamps are sometimes shared across the batch as one array.
            Value::Array(_) => Some(family.clone()),
            Value::Object(map) => get_member(map, ticker).cloned(),
            _ => None,
        };
        if let Some(column) = column {
            flat.insert(canonical.to_string(), column);
        }
    }

    Ok(extract_flat(&flat))
}

/// Layout B: `{"AAPL": {"open": [...], ...}, "MSFT": {...}}`.
fn extract_ticker_first(
    obj: &Map<String, Value>,
    ticker: &str,
) -> std::result::Result<Option<Vec<Candle>>, ()> {
    if let Some(nested) = get_member(obj, ticker).and_then(Value::as_object) {
        if let Some(candles) = extract_flat(nested) {
            return Ok(Some(candles));
        }
    }

    // Other keys holding flat tables mean the layout is B without the
    // requested ticker.
    let has_other_tables = obj.values().any(|v| {
        v.as_object()
            .map(|nested| extract_flat(nested).is_some())
            .unwrap_or(false)
    });
    if has_other_tables {
        return Err(());
    }

    Ok(None)
}

fn member(map: &Map<String, Value>, ticker: &str) -> bool {
    get_member(map, ticker).is_some()
}

fn get_member<'a>(map: &'a Map<String, Value>, ticker: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(ticker))
        .map(|(_, v)| v)
}

/// Walk the tree collecting every flat table together with the nearest
/// enclosing symbol tag.
fn collect_tables(value: &Value, symbol: Option<String>, out: &mut Vec<(Option<String>, Vec<Candle>)>) {
    match value {
        Value::Object(obj) => {
            let symbol = first_present(obj, SYMBOL_KEYS)
                .and_then(Value::as_str)
                .map(str::to_uppercase)
                .or(symbol);

            if let Some(candles) = extract_flat(obj) {
                out.push((symbol, candles));
                return;
            }

            for (key, v) in obj {
                // A key that looks like a ticker symbol tags the subtree.
                let child_symbol = if is_symbol_key(key) {
                    Some(key.to_uppercase())
                } else {
                    symbol.clone()
                };
                collect_tables(v, child_symbol, out);
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_tables(v, symbol.clone(), out);
            }
        }
        _ => {}
    }
}

/// Uppercase, short, alphanumeric (plus `.`/`-`): the shape of an exchange
/// symbol used as a grouping key.
fn is_symbol_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 8
        && key.chars().any(|c| c.is_ascii_uppercase())
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '.' || c == '-')
}

/// Epoch seconds (number or string) or a `YYYY-MM-DD` date, collapsed to
/// midnight UTC.
fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    let date = if let Some(ts) = value.as_i64() {
        DateTime::<Utc>::from_timestamp(ts, 0)?.date_naive()
    } else if let Some(s) = value.as_str() {
        if let Ok(ts) = s.parse::<i64>() {
            DateTime::<Utc>::from_timestamp(ts, 0)?.date_naive()
        } else {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?
        }
    } else {
        return None;
    };

    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flat_table() -> Value {
        json!({
            "timestamp": [1704153600, 1704240000, 1704326400],
            "open": [10.0, 10.5, 10.2],
            "high": [10.8, 10.9, 10.6],
            "low": [9.9, 10.3, 10.0],
            "close": [10.5, 10.4, 10.5],
            "volume": [100000, 120000, 90000],
        })
    }

    fn series_to_table(series: &Series) -> Value {
        json!({
            "timestamp": series.candles.iter().map(|c| c.time.timestamp()).collect::<Vec<_>>(),
            "open": series.candles.iter().map(|c| c.open).collect::<Vec<_>>(),
            "high": series.candles.iter().map(|c| c.high).collect::<Vec<_>>(),
            "low": series.candles.iter().map(|c| c.low).collect::<Vec<_>>(),
            "close": series.candles.iter().map(|c| c.close).collect::<Vec<_>>(),
            "volume": series.candles.iter().map(|c| c.volume).collect::<Vec<_>>(),
        })
    }

    #[test]
    fn test_flat_layout() {
        let series = normalize(&flat_table(), "aapl", Interval::Daily).unwrap();
        assert_eq!(series.ticker, "AAPL");
        assert_eq!(series.len(), 3);
        assert!(series.is_well_formed());
    }

    #[test]
    fn test_field_first_grouping() {
        let raw = json!({
            "timestamp": [1704153600, 1704240000],
            "open": {"AAPL": [10.0, 10.5], "MSFT": [300.0, 301.0]},
            "high": {"AAPL": [10.8, 10.9], "MSFT": [305.0, 306.0]},
            "low": {"AAPL": [9.9, 10.3], "MSFT": [299.0, 300.0]},
            "close": {"AAPL": [10.5, 10.4], "MSFT": [304.0, 305.0]},
            "volume": {"AAPL": [100000, 120000], "MSFT": [500000, 400000]},
        });

        let series = normalize(&raw, "AAPL", Interval::Daily).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.candles[0].close, 10.5);

        let other = normalize(&raw, "MSFT", Interval::Daily).unwrap();
        assert_eq!(other.candles[0].close, 304.0);
    }

    #[test]
    fn test_ticker_first_grouping() {
        let raw = json!({
            "AAPL": flat_table(),
            "MSFT": {
                "timestamp": [1704153600],
                "open": [300.0], "high": [305.0], "low": [299.0], "close": [304.0],
                "volume": [500000],
            },
        });

        let series = normalize(&raw, "AAPL", Interval::Daily).unwrap();
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn test_ticker_not_present_is_distinct_from_empty() {
        let raw = json!({
            "MSFT": flat_table(),
        });
        let err = normalize(&raw, "AAPL", Interval::Daily).unwrap_err();
        assert!(matches!(err, AppError::TickerNotPresent(_)));

        let empty = json!({
            "timestamp": [], "open": [], "high": [], "low": [], "close": [], "volume": [],
        });
        let series = normalize(&empty, "AAPL", Interval::Daily).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_nested_envelope_with_symbol_tags() {
        let raw = json!({
            "spark": {
                "result": [
                    {"symbol": "MSFT", "response": [flat_table()]},
                    {"symbol": "AAPL", "response": [flat_table()]},
                ],
            },
        });
        let series = normalize(&raw, "AAPL", Interval::Daily).unwrap();
        assert_eq!(series.len(), 3);
    }

    #[test]
    fn test_rows_with_missing_ohlc_are_dropped() {
        let raw = json!({
            "timestamp": [1704153600, 1704240000, 1704326400],
            "open": [10.0, null, 10.2],
            "high": [10.8, 10.9, 10.6],
            "low": [9.9, 10.3, 10.0],
            "close": [10.5, 10.4, 10.5],
            "volume": [100000, 120000, 90000],
        });
        let series = normalize(&raw, "AAPL", Interval::Daily).unwrap();
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn test_unsorted_and_duplicated_rows() {
        let raw = json!({
            "timestamp": [1704326400, 1704153600, 1704326400],
            "open": [10.2, 10.0, 10.3],
            "high": [10.6, 10.8, 10.7],
            "low": [10.0, 9.9, 10.1],
            "close": [10.5, 10.5, 10.6],
            "volume": [90000, 100000, 95000],
        });
        let series = normalize(&raw, "AAPL", Interval::Daily).unwrap();
        assert_eq!(series.len(), 2);
        assert!(series.is_well_formed());
        // Last occurrence of the duplicated timestamp wins.
        assert_eq!(series.candles[1].close, 10.6);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let once = normalize(&flat_table(), "AAPL", Interval::Daily).unwrap();
        let twice = normalize(&series_to_table(&once), "AAPL", Interval::Daily).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_garbage_is_data_shape_error() {
        let err = normalize(&json!({"hello": "world"}), "AAPL", Interval::Daily).unwrap_err();
        assert!(matches!(err, AppError::DataShape(_)));
        let err = normalize(&json!(42), "AAPL", Interval::Daily).unwrap_err();
        assert!(matches!(err, AppError::DataShape(_)));
    }
}
