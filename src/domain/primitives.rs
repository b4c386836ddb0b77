//! Domain primitives: TimeMs, Symbol, StockAction, InstrumentType.

use serde::{Deserialize, Serialize};

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Get the underlying milliseconds value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Offset by a number of hours.
    pub fn plus_hours(&self, hours: i64) -> Self {
        TimeMs(self.0 + hours * 3_600_000)
    }
}

/// Ticker symbol, stored uppercase and scoped to one account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    /// Create a Symbol, normalizing to uppercase and trimming whitespace.
    pub fn new(s: &str) -> Self {
        Symbol(s.trim().to_uppercase())
    }

    /// Get the symbol as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the symbol is empty after normalization.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stock trade side: Buy or Sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockAction {
    Buy,
    Sell,
}

impl StockAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockAction::Buy => "BUY",
            StockAction::Sell => "SELL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Some(StockAction::Buy),
            "SELL" => Some(StockAction::Sell),
            _ => None,
        }
    }
}

/// Instrument type distinguishing stock rows from option rows in imports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstrumentType {
    Stock,
    Option,
}

impl InstrumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstrumentType::Stock => "STOCK",
            InstrumentType::Option => "OPTION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "STOCK" => Some(InstrumentType::Stock),
            "OPTION" => Some(InstrumentType::Option),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_normalizes() {
        let s = Symbol::new("  aapl ");
        assert_eq!(s.as_str(), "AAPL");
    }

    #[test]
    fn test_timems_plus_hours() {
        let t = TimeMs::new(1_000_000);
        assert_eq!(t.plus_hours(48).as_i64(), 1_000_000 + 48 * 3_600_000);
    }

    #[test]
    fn test_stock_action_parse() {
        assert_eq!(StockAction::parse("buy"), Some(StockAction::Buy));
        assert_eq!(StockAction::parse(" SELL "), Some(StockAction::Sell));
        assert_eq!(StockAction::parse("HOLD"), None);
    }

    #[test]
    fn test_instrument_type_parse() {
        assert_eq!(InstrumentType::parse("stock"), Some(InstrumentType::Stock));
        assert_eq!(InstrumentType::parse("OPTION"), Some(InstrumentType::Option));
        assert_eq!(InstrumentType::parse("FUTURE"), None);
    }
}
