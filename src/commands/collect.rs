//! Fetch one collection cycle and show (or export) the engineered frames
//!
//! Usage:
//! - Summary only: `pricecast collect`
//! - Also write one CSV per pair: `pricecast collect --csv-dir data/`

use crate::error::Result;
use crate::models::{AppConfig, FrameSet};
use crate::services::{feature_engineering, preprocess, Collector};
use std::fs::File;
use std::path::{Path, PathBuf};

pub fn run(config_path: &Path, csv_dir: Option<PathBuf>) {
    let config = super::bootstrap(config_path);

    println!(
        "📡 Collecting {} symbol(s) from {} exchange(s), timeframe {}",
        config.collector.symbols.len(),
        config.collector.exchanges.len(),
        config.collector.timeframe
    );

    let runtime = super::runtime();
    let frames = match runtime.block_on(collect(&config)) {
        Ok(frames) => frames,
        Err(e) => {
            eprintln!("❌ Collection failed: {}", e);
            std::process::exit(1);
        }
    };

    print_summary(&frames);

    if let Some(dir) = csv_dir {
        match write_frames(&frames, &dir) {
            Ok(written) => println!("\n💾 Wrote {} CSV file(s) to {}", written, dir.display()),
            Err(e) => {
                eprintln!("❌ Failed to write CSV files: {}", e);
                std::process::exit(1);
            }
        }
    }
}

async fn collect(config: &AppConfig) -> Result<FrameSet> {
    let collector = Collector::from_config(&config.collector)?;
    let outcomes = collector.collect_outcomes().await;

    let mut failed = 0;
    for (key, outcome) in &outcomes {
        if !outcome.is_fetched() {
            println!("   ⚠️  {}: {:?}", key, outcome);
            failed += 1;
        }
    }
    if failed > 0 {
        println!("   {} of {} pair(s) returned no data", failed, outcomes.len());
    }

    let data = outcomes
        .into_iter()
        .map(|(key, outcome)| (key, outcome.into_series()))
        .collect();
    Ok(feature_engineering(preprocess(&data), config.model.max_depth))
}

fn print_summary(frames: &FrameSet) {
    if frames.is_empty() {
        println!("\n⚠️  No data collected");
        return;
    }

    println!("\n📊 Frames:");
    for (key, frame) in frames {
        let span = match (frame.time_at(0), frame.time_at(frame.len().saturating_sub(1))) {
            (Some(first), Some(last)) => format!(
                "{} → {}",
                first.format("%Y-%m-%d %H:%M"),
                last.format("%Y-%m-%d %H:%M")
            ),
            _ => "empty".to_string(),
        };
        let last_close = frame
            .close()
            .ok()
            .and_then(|c| c.last().copied())
            .map(|c| format!("{:.2}", c))
            .unwrap_or_else(|| "-".to_string());

        println!(
            "   {:<24} rows:{:<5} cols:{:<3} close:{:<12} {}",
            key,
            frame.len(),
            frame.width(),
            last_close,
            span
        );
    }
}

fn write_frames(frames: &FrameSet, dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(dir)?;
    for (key, frame) in frames {
        let file = File::create(dir.join(format!("{}.csv", key)))?;
        frame.write_csv(file)?;
    }
    Ok(frames.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candle, DataSet};

    #[test]
    fn test_write_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut data = DataSet::new();
        data.insert(
            "binance_BTC_USD".to_string(),
            vec![
                Candle::from_row([1609459200000.0, 29000.0, 29500.0, 28900.0, 29400.0, 500.0]),
                Candle::from_row([1609459260000.0, 29400.0, 29600.0, 29300.0, 29500.0, 600.0]),
            ],
        );
        let frames = preprocess(&data);

        assert_eq!(write_frames(&frames, dir.path()).unwrap(), 1);
        let csv = std::fs::read_to_string(dir.path().join("binance_BTC_USD.csv")).unwrap();
        assert!(csv.starts_with("timestamp,open,high,low,close,volume\n"));
        assert_eq!(csv.lines().count(), 3);
    }
}
