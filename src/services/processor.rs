//! Raw candles to feature frames
//!
//! `preprocess` turns each fetched series into a timestamp-indexed [`Frame`];
//! `feature_engineering` appends `ma_<d>` / `ema_<d>` columns for every depth
//! and then drops rows whose rolling windows are not yet full.

use crate::constants::feature_window;
use crate::error::Result;
use crate::models::indicators::{calculate_ema, calculate_sma};
use crate::models::{Candle, DataSet, Frame, FrameSet};
use tracing::{debug, info, warn};

/// Index every non-empty series by timestamp; empty series are skipped
pub fn preprocess(data: &DataSet) -> FrameSet {
    let mut frames = FrameSet::new();

    for (key, rows) in data {
        if rows.is_empty() {
            warn!(key = %key, "No data fetched, skipping");
            continue;
        }

        let candles = sort_and_deduplicate(rows);
        if candles.len() != rows.len() {
            debug!(
                key = %key,
                removed = rows.len() - candles.len(),
                "Removed duplicate timestamps"
            );
        }

        frames.insert(key.clone(), Frame::from_candles(&candles));
    }

    info!(input = data.len(), frames = frames.len(), "Preprocessing complete");
    frames
}

/// Order rows by time; on duplicate timestamps the last row received wins
fn sort_and_deduplicate(rows: &[Candle]) -> Vec<Candle> {
    let mut candles = rows.to_vec();
    // stable sort keeps arrival order among equal timestamps
    candles.sort_by_key(|c| c.timestamp_ms);

    let mut deduped: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        match deduped.last_mut() {
            Some(last) if last.timestamp_ms == candle.timestamp_ms => *last = candle,
            _ => deduped.push(candle),
        }
    }
    deduped
}

/// Append moving averages for depths `0..max_depth` to one frame, then drop incomplete rows
pub fn engineer_frame(frame: &mut Frame, max_depth: usize) -> Result<()> {
    let closes = frame.close()?;

    for depth in 0..max_depth {
        let window = feature_window(depth);
        frame.push_column(&format!("ma_{}", depth), calculate_sma(&closes, window))?;
        frame.push_column(&format!("ema_{}", depth), calculate_ema(&closes, window))?;
    }

    frame.drop_incomplete();
    Ok(())
}

/// Feature-engineer every frame; a frame that cannot be engineered is logged and omitted
pub fn feature_engineering(frames: FrameSet, max_depth: usize) -> FrameSet {
    let mut engineered = FrameSet::new();

    for (key, mut frame) in frames {
        let rows_before = frame.len();
        match engineer_frame(&mut frame, max_depth) {
            Ok(()) => {
                debug!(
                    key = %key,
                    rows_before = rows_before,
                    rows_after = frame.len(),
                    columns = frame.width(),
                    "Features added"
                );
                engineered.insert(key, frame);
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Feature engineering failed, skipping");
            }
        }
    }

    engineered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BASE_COLUMN_COUNT;
    use crate::models::RawSeries;

    fn series(len: usize) -> RawSeries {
        (0..len)
            .map(|i| {
                let price = 100.0 + i as f64;
                Candle::new(1_609_459_200_000 + i as i64 * 60_000, price, price + 1.0, price - 1.0, price, 10.0)
            })
            .collect()
    }

    #[test]
    fn test_preprocess_scenario() {
        let mut data = DataSet::new();
        data.insert(
            "binance_BTC_USD".to_string(),
            vec![
                Candle::from_row([1609459200000.0, 29000.0, 29500.0, 28900.0, 29400.0, 500.0]),
                Candle::from_row([1609459260000.0, 29400.0, 29600.0, 29300.0, 29500.0, 600.0]),
            ],
        );

        let frames = preprocess(&data);
        let frame = &frames["binance_BTC_USD"];
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.close().unwrap()[0], 29400.0);
        assert_eq!(frame.index()[0], 1609459200000);
        assert_eq!(frame.column_names(), vec!["open", "high", "low", "close", "volume"]);
    }

    #[test]
    fn test_preprocess_skips_empty_series() {
        let mut data = DataSet::new();
        data.insert("binance_BTC_USD".to_string(), series(3));
        data.insert("coinbase_BTC_USD".to_string(), Vec::new());

        let frames = preprocess(&data);
        assert_eq!(frames.len(), 1);
        assert!(!frames.contains_key("coinbase_BTC_USD"));
    }

    #[test]
    fn test_preprocess_sorts_and_deduplicates() {
        let mut rows = series(3);
        rows.reverse();
        let mut replacement = rows[2];
        replacement.close = 999.0;
        rows.push(replacement);

        let mut data = DataSet::new();
        data.insert("k".to_string(), rows);
        let frame = &preprocess(&data)["k"];

        assert_eq!(frame.len(), 3);
        assert!(frame.index().windows(2).all(|w| w[0] < w[1]));
        assert_eq!(frame.close().unwrap()[0], 999.0);
    }

    #[test]
    fn test_feature_engineering_shape() {
        let mut data = DataSet::new();
        data.insert("k".to_string(), series(100));

        let max_depth = 3;
        let frames = feature_engineering(preprocess(&data), max_depth);
        let frame = &frames["k"];

        // largest window is 10 + 5 * 2 = 20, so 19 rows lack history
        assert_eq!(frame.len(), 100 - 19);
        assert_eq!(frame.width(), BASE_COLUMN_COUNT + 2 * max_depth);
        assert!(frame.is_complete());
        for row in 0..frame.len() {
            let values = frame.row(row).unwrap();
            assert_eq!(values.len(), 5 + 2 * max_depth);
            assert!(values.iter().all(Option::is_some));
        }
    }

    #[test]
    fn test_feature_columns_values() {
        let mut data = DataSet::new();
        data.insert("k".to_string(), series(30));
        let frame = &feature_engineering(preprocess(&data), 1)["k"];

        assert_eq!(
            frame.column_names(),
            vec!["open", "high", "low", "close", "volume", "ma_0", "ema_0"]
        );
        // first surviving row is the 10th close (109); mean of 100..=109
        assert_eq!(frame.len(), 21);
        let ma = frame.values("ma_0").unwrap();
        assert!((ma[0] - 104.5).abs() < 1e-9);
        // ema is seeded with the first close, so it lags behind a rising series
        let ema = frame.values("ema_0").unwrap();
        assert!(ema[0] > 100.0 && ema[0] < 109.0);
    }

    #[test]
    fn test_short_series_ends_up_empty() {
        let mut data = DataSet::new();
        data.insert("k".to_string(), series(5));
        let frames = feature_engineering(preprocess(&data), 3);
        assert!(frames["k"].is_empty());
    }

    #[test]
    fn test_zero_depth_keeps_base_columns() {
        let mut data = DataSet::new();
        data.insert("k".to_string(), series(5));
        let frame = &feature_engineering(preprocess(&data), 0)["k"];
        assert_eq!(frame.len(), 5);
        assert_eq!(frame.width(), BASE_COLUMN_COUNT);
    }
}
