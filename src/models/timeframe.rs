use serde::{Deserialize, Serialize};
use std::fmt;

/// Candle width requested from the exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    /// 1-minute candles
    Minute1,
    /// 5-minute candles
    Minute5,
    /// 15-minute candles
    Minute15,
    /// 1-hour candles
    Hour1,
    /// 6-hour candles
    Hour6,
    /// Daily candles
    Day1,
}

impl Timeframe {
    /// Unified interval string ("1m", "1h", "1d", ...), also Binance's format
    pub fn to_interval_string(&self) -> &'static str {
        match self {
            Timeframe::Minute1 => "1m",
            Timeframe::Minute5 => "5m",
            Timeframe::Minute15 => "15m",
            Timeframe::Hour1 => "1h",
            Timeframe::Hour6 => "6h",
            Timeframe::Day1 => "1d",
        }
    }

    /// Candle width in seconds (Coinbase `granularity` parameter)
    pub fn as_seconds(&self) -> u64 {
        match self {
            Timeframe::Minute1 => 60,
            Timeframe::Minute5 => 300,
            Timeframe::Minute15 => 900,
            Timeframe::Hour1 => 3_600,
            Timeframe::Hour6 => 21_600,
            Timeframe::Day1 => 86_400,
        }
    }

    /// Parse from string (case-insensitive for the hour/day units)
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim() {
            "1m" => Ok(Timeframe::Minute1),
            "5m" => Ok(Timeframe::Minute5),
            "15m" => Ok(Timeframe::Minute15),
            "1h" | "1H" => Ok(Timeframe::Hour1),
            "6h" | "6H" => Ok(Timeframe::Hour6),
            "1d" | "1D" => Ok(Timeframe::Day1),
            _ => Err(format!(
                "Invalid timeframe: {}. Valid options: 1m, 5m, 15m, 1h, 6h, 1d",
                s
            )),
        }
    }

    /// Get all available timeframes
    pub fn all() -> Vec<Timeframe> {
        vec![
            Timeframe::Minute1,
            Timeframe::Minute5,
            Timeframe::Minute15,
            Timeframe::Hour1,
            Timeframe::Hour6,
            Timeframe::Day1,
        ]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_interval_string())
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Timeframe::Hour1
    }
}

impl TryFrom<String> for Timeframe {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Timeframe::from_str(&value)
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.to_interval_string().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_from_str() {
        assert_eq!(Timeframe::from_str("1h").unwrap(), Timeframe::Hour1);
        assert_eq!(Timeframe::from_str("1H").unwrap(), Timeframe::Hour1);
        assert_eq!(Timeframe::from_str("1d").unwrap(), Timeframe::Day1);
        assert!(Timeframe::from_str("4h").is_err());
    }

    #[test]
    fn test_every_timeframe_round_trips_through_its_string() {
        for tf in Timeframe::all() {
            assert_eq!(Timeframe::from_str(tf.to_interval_string()).unwrap(), tf);
        }
    }

    #[test]
    fn test_seconds() {
        assert_eq!(Timeframe::Hour1.as_seconds(), 3600);
        assert_eq!(Timeframe::Day1.as_seconds(), 86400);
    }

    #[test]
    fn test_yaml_representation() {
        let tf: Timeframe = serde_yaml::from_str("6h").unwrap();
        assert_eq!(tf, Timeframe::Hour6);
        assert_eq!(serde_yaml::to_string(&Timeframe::Minute15).unwrap().trim(), "15m");
    }
}
