use serde::{Deserialize, Serialize};

/// Instrument-specific price precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Number of decimal places quoted by the feed (5 for EUR/USD, 3 for USD/JPY)
    pub digits: u32,
}

impl InstrumentConfig {
    /// Conventional precision for a forex pair: JPY crosses quote 3 digits, the rest 5.
    pub fn for_symbol(symbol: &str) -> Self {
        let digits = if symbol.to_uppercase().contains("JPY") { 3 } else { 5 };
        Self { digits }
    }

    pub fn format_price(&self, price: f64) -> String {
        format!("{:.*}", self.digits as usize, price)
    }
}

/// Supported bar granularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    M1,
    H1,
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "m1",
            Timeframe::H1 => "h1",
            Timeframe::D1 => "d1",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "m1" | "minute" | "minute_1" => Ok(Timeframe::M1),
            "h1" | "hour" | "hour_1" => Ok(Timeframe::H1),
            "d1" | "day" | "day_1" => Ok(Timeframe::D1),
            _ => Err(format!("Unknown timeframe: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_parse_and_display() {
        assert_eq!("M1".parse::<Timeframe>().unwrap(), Timeframe::M1);
        assert_eq!("Day_1".parse::<Timeframe>().unwrap(), Timeframe::D1);
        assert!("w1".parse::<Timeframe>().is_err());
        assert_eq!(Timeframe::H1.to_string(), "h1");
    }

    #[test]
    fn test_instrument_digits() {
        assert_eq!(InstrumentConfig::for_symbol("USDJPY").digits, 3);
        assert_eq!(InstrumentConfig::for_symbol("gbpusd").digits, 5);
        assert_eq!(InstrumentConfig::for_symbol("AUDJPY").format_price(97.5), "97.500");
    }
}
