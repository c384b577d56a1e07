//! Timestamp-indexed table of named numeric columns.
//!
//! A `Frame` starts life with the five OHLCV base columns produced by
//! preprocessing. Feature engineering appends derived columns that may be
//! unpopulated (`None`) for the first rows of a rolling window; those rows are
//! removed by [`Frame::drop_incomplete`].

use crate::constants::BASE_COLUMNS;
use crate::error::{AppError, Result};
use crate::models::ohlcv::Candle;
use chrono::{DateTime, TimeZone, Utc};
use std::io::Write;

/// A single named column
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    /// Row index: candle open time in Unix milliseconds
    index: Vec<i64>,
    columns: Vec<Column>,
}

impl Frame {
    /// Build a frame from fetched candles, indexed by their timestamps
    pub fn from_candles(candles: &[Candle]) -> Self {
        let index = candles.iter().map(|c| c.timestamp_ms).collect();
        let pick = |f: fn(&Candle) -> f64| candles.iter().map(|c| Some(f(c))).collect::<Vec<_>>();

        let columns = vec![
            Column { name: BASE_COLUMNS[0].to_string(), values: pick(|c| c.open) },
            Column { name: BASE_COLUMNS[1].to_string(), values: pick(|c| c.high) },
            Column { name: BASE_COLUMNS[2].to_string(), values: pick(|c| c.low) },
            Column { name: BASE_COLUMNS[3].to_string(), values: pick(|c| c.close) },
            Column { name: BASE_COLUMNS[4].to_string(), values: pick(|c| c.volume) },
        ];

        Self { index, columns }
    }

    /// Build a frame from fully populated columns
    pub fn from_columns(index: Vec<i64>, columns: Vec<(&str, Vec<f64>)>) -> Result<Self> {
        let mut frame = Self {
            index,
            columns: Vec::with_capacity(columns.len()),
        };
        for (name, values) in columns {
            frame.push_column(name, values.into_iter().map(Some).collect())?;
        }
        Ok(frame)
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of columns, excluding the index
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn index(&self) -> &[i64] {
        &self.index
    }

    /// Index entry `row` as a UTC datetime
    pub fn time_at(&self, row: usize) -> Option<DateTime<Utc>> {
        self.index
            .get(row)
            .and_then(|ms| Utc.timestamp_millis_opt(*ms).single())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Populated values of a column; `None` if it is missing or has gaps
    pub fn values(&self, name: &str) -> Option<Vec<f64>> {
        self.column(name)?.iter().copied().collect()
    }

    /// Closing prices, the series the predictor trains on
    pub fn close(&self) -> Result<Vec<f64>> {
        self.values("close")
            .ok_or_else(|| AppError::InvalidInput("frame has no complete 'close' column".to_string()))
    }

    /// Append (or replace) a column; its length must match the index
    pub fn push_column(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<()> {
        if values.len() != self.index.len() {
            return Err(AppError::InvalidInput(format!(
                "column '{}' has {} values, frame has {} rows",
                name,
                values.len(),
                self.index.len()
            )));
        }

        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column {
                name: name.to_string(),
                values,
            }),
        }
        Ok(())
    }

    /// Row values in column order
    pub fn row(&self, row: usize) -> Option<Vec<Option<f64>>> {
        if row >= self.len() {
            return None;
        }
        Some(self.columns.iter().map(|c| c.values[row]).collect())
    }

    /// True when no cell in the frame is unpopulated
    pub fn is_complete(&self) -> bool {
        self.columns.iter().all(|c| c.values.iter().all(Option::is_some))
    }

    /// Remove every row that has at least one unpopulated cell
    pub fn drop_incomplete(&mut self) -> usize {
        let keep: Vec<bool> = (0..self.len())
            .map(|row| self.columns.iter().all(|c| c.values[row].is_some()))
            .collect();
        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped == 0 {
            return 0;
        }

        retain_rows(&mut self.index, &keep);
        for column in &mut self.columns {
            retain_rows(&mut column.values, &keep);
        }
        dropped
    }

    /// Write as CSV with a leading `timestamp` column in UTC
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);

        let mut header = vec!["timestamp"];
        header.extend(self.column_names());
        wtr.write_record(&header)?;

        for row in 0..self.len() {
            let mut record = Vec::with_capacity(self.width() + 1);
            record.push(
                self.time_at(row)
                    .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| self.index[row].to_string()),
            );
            for column in &self.columns {
                record.push(column.values[row].map(|v| v.to_string()).unwrap_or_default());
            }
            wtr.write_record(&record)?;
        }

        wtr.flush()?;
        Ok(())
    }
}

fn retain_rows<T>(values: &mut Vec<T>, keep: &[bool]) {
    let mut flags = keep.iter();
    values.retain(|_| *flags.next().unwrap_or(&false));
}
