//! Historical candle loading and resampling.

use std::path::Path;

use bot_core::{Candle, Error, Result, Timeframe};
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::info;

/// CSV row: epoch-millisecond open time plus OHLCV.
#[derive(Debug, Deserialize)]
struct RawRow {
    timestamp: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Load candles from a CSV file with columns
/// `timestamp,open,high,low,close,volume`. Rows are sorted by time and
/// duplicate timestamps keep the last occurrence.
pub fn load_candles_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let mut candles = Vec::new();
    for row in reader.deserialize::<RawRow>() {
        let row = row?;
        let timestamp = millis_to_datetime(row.timestamp)?;
        candles.push(Candle {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }

    candles.sort_by_key(|c| c.timestamp);
    candles.reverse();
    candles.dedup_by_key(|c| c.timestamp);
    candles.reverse();

    info!(path = %path.display(), bars = candles.len(), "loaded historical candles");
    Ok(candles)
}

/// Aggregate fine-grained candles into `target` buckets aligned to the
/// epoch: first open, max high, min low, last close, summed volume.
/// Input must be sorted by timestamp.
pub fn resample(fine: &[Candle], target: Timeframe) -> Vec<Candle> {
    let bucket_ms = target.duration().num_milliseconds();
    let mut out: Vec<Candle> = Vec::new();
    for candle in fine {
        let bucket_start = candle.timestamp.timestamp_millis().div_euclid(bucket_ms) * bucket_ms;
        match out.last_mut() {
            Some(current) if current.timestamp.timestamp_millis() == bucket_start => {
                current.high = current.high.max(candle.high);
                current.low = current.low.min(candle.low);
                current.close = candle.close;
                current.volume += candle.volume;
            }
            _ => out.push(Candle {
                timestamp: Utc.timestamp_millis_opt(bucket_start).single().unwrap_or(candle.timestamp),
                open: candle.open,
                high: candle.high,
                low: candle.low,
                close: candle.close,
                volume: candle.volume,
            }),
        }
    }
    out
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| Error::InvalidData(format!("timestamp out of range: {millis}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(minutes: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: Utc.timestamp_opt(minutes * 60, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn test_resample_quarter_hours_into_hour() {
        let fine = vec![
            candle(0, 10.0, 12.0, 9.0, 11.0),
            candle(15, 11.0, 15.0, 10.0, 14.0),
            candle(30, 14.0, 14.5, 8.0, 9.0),
            candle(45, 9.0, 10.0, 8.5, 9.5),
            candle(60, 9.5, 11.0, 9.0, 10.0),
        ];
        let coarse = resample(&fine, Timeframe::H1);
        assert_eq!(coarse.len(), 2);

        let first = coarse[0];
        assert_eq!(first.timestamp, Utc.timestamp_opt(0, 0).unwrap());
        assert_eq!(first.open, 10.0);
        assert_eq!(first.high, 15.0);
        assert_eq!(first.low, 8.0);
        assert_eq!(first.close, 9.5);
        assert_eq!(first.volume, 4.0);

        assert_eq!(coarse[1].timestamp, Utc.timestamp_opt(3600, 0).unwrap());
    }

    #[test]
    fn test_resample_aligns_to_bucket_start() {
        // A lone 15m bar at :45 lands in the bucket opening at :00.
        let fine = vec![candle(45, 1.0, 2.0, 0.5, 1.5)];
        let coarse = resample(&fine, Timeframe::H1);
        assert_eq!(coarse[0].timestamp, Utc.timestamp_opt(0, 0).unwrap());
    }

    #[test]
    fn test_load_sorts_and_dedups() {
        let dir = std::env::temp_dir().join(format!("bt-data-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("candles.csv");
        std::fs::write(
            &path,
            "timestamp,open,high,low,close,volume\n\
             900000,2.0,2.0,2.0,2.0,1.0\n\
             0,1.0,1.0,1.0,1.0,1.0\n\
             900000,3.0,3.0,3.0,3.0,1.0\n",
        )
        .unwrap();

        let candles = load_candles_csv(&path).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].close, 1.0);
        // Later duplicate wins.
        assert_eq!(candles[1].close, 3.0);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_rejects_malformed_rows() {
        let dir = std::env::temp_dir().join(format!("bt-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.csv");
        std::fs::write(
            &path,
            "timestamp,open,high,low,close,volume\nnot-a-number,1,1,1,1,1\n",
        )
        .unwrap();
        assert!(load_candles_csv(&path).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
