//! REST bootstrap of historical candles, so indicators have warm-up
//! history before the first live bar closes.

use bot_core::{Candle, Error, Result, Timeframe};
use chrono::{TimeZone, Utc};
use tracing::info;

/// Fetch the most recent `limit` klines for one symbol and interval.
pub async fn fetch_klines(
    client: &reqwest::Client,
    rest_url: &str,
    symbol: &str,
    timeframe: Timeframe,
    limit: usize,
) -> Result<Vec<Candle>> {
    let url = format!(
        "{rest_url}/api/v3/klines?symbol={symbol}&interval={}&limit={limit}",
        timeframe.as_str()
    );
    let rows: Vec<Vec<serde_json::Value>> = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let candles = parse_kline_rows(&rows)?;
    info!(symbol, interval = timeframe.as_str(), bars = candles.len(),
        "bootstrapped history");
    Ok(candles)
}

/// Each row is `[open_time_ms, "o", "h", "l", "c", "v", ...]`.
fn parse_kline_rows(rows: &[Vec<serde_json::Value>]) -> Result<Vec<Candle>> {
    rows.iter().map(|row| parse_kline_row(row)).collect()
}

fn parse_kline_row(row: &[serde_json::Value]) -> Result<Candle> {
    if row.len() < 6 {
        return Err(Error::InvalidData(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }
    let open_time = row[0]
        .as_i64()
        .ok_or_else(|| Error::InvalidData("kline open time is not an integer".to_string()))?;
    let timestamp = Utc
        .timestamp_millis_opt(open_time)
        .single()
        .ok_or_else(|| Error::InvalidData(format!("timestamp out of range: {open_time}")))?;

    let field = |i: usize, name: &str| -> Result<f64> {
        row[i]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| Error::InvalidData(format!("kline {name} is not a decimal string")))
    };

    Ok(Candle {
        timestamp,
        open: field(1, "open")?,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
        volume: field(5, "volume")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_kline_rows() {
        let rows: Vec<Vec<serde_json::Value>> = vec![vec![
            json!(1_700_000_100_000_i64),
            json!("42000.0"),
            json!("42200.0"),
            json!("41900.0"),
            json!("42150.0"),
            json!("12.5"),
            json!(1_700_001_000_000_i64),
        ]];
        let candles = parse_kline_rows(&rows).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].open, 42000.0);
        assert_eq!(candles[0].volume, 12.5);
        assert_eq!(candles[0].timestamp.timestamp_millis(), 1_700_000_100_000);
    }

    #[test]
    fn test_parse_rejects_short_rows() {
        let rows: Vec<Vec<serde_json::Value>> = vec![vec![json!(1_700_000_100_000_i64)]];
        assert!(parse_kline_rows(&rows).is_err());
    }

    #[test]
    fn test_parse_rejects_non_numeric_price() {
        let rows: Vec<Vec<serde_json::Value>> = vec![vec![
            json!(1_700_000_100_000_i64),
            json!("not-a-price"),
            json!("1"),
            json!("1"),
            json!("1"),
            json!("1"),
        ]];
        assert!(parse_kline_rows(&rows).is_err());
    }
}
