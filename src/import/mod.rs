//! Broker CSV parsing and the three-layer dedup row statuses.
//!
//! Parsing is strict and batched: if any row fails validation, the whole
//! file is rejected with every row error listed, and nothing persists.

pub mod fingerprint;

use crate::domain::{
    CallPut, Decimal, InstrumentType, OptionAction, StockAction, Symbol, TimeMs,
};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use fingerprint::{trade_fingerprint, FingerprintParts};

/// Raw CSV row as exported. Optional columns deserialize as None when the
/// field is empty.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRow {
    pub account_name: String,
    pub trade_datetime: String,
    pub symbol: String,
    pub instrument_type: String,
    pub action: String,
    pub quantity: String,
    pub price: String,
    pub fees: String,
    pub expiration: Option<String>,
    pub strike: Option<String>,
    pub call_put: Option<String>,
    pub external_trade_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// 1-based data row number (header excluded).
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ImportParseError {
    #[error("csv read failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("{} row(s) failed validation", .0.len())]
    Rows(Vec<RowError>),
}

/// Typed trade-specific fields after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeDetails {
    Stock {
        action: StockAction,
    },
    Option {
        action: OptionAction,
        expiration: NaiveDate,
        strike: Decimal,
        call_put: CallPut,
    },
}

impl TradeDetails {
    pub fn action_str(&self) -> &'static str {
        match self {
            TradeDetails::Stock { action } => action.as_str(),
            TradeDetails::Option { action, .. } => action.as_str(),
        }
    }
}

/// A validated row ready for dedup evaluation and commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTrade {
    /// 1-based data row number, kept for per-row status reporting.
    pub row: usize,
    pub occurred_at: TimeMs,
    pub symbol: Symbol,
    pub details: TradeDetails,
    pub quantity: Decimal,
    pub price: Decimal,
    pub fees: Decimal,
    pub external_ref: Option<String>,
    pub notes: Option<String>,
}

impl ParsedTrade {
    pub fn instrument(&self) -> InstrumentType {
        match self.details {
            TradeDetails::Stock { .. } => InstrumentType::Stock,
            TradeDetails::Option { .. } => InstrumentType::Option,
        }
    }

    pub fn fingerprint(&self, account_id: i64) -> String {
        let (expiration, strike, call_put) = match &self.details {
            TradeDetails::Stock { .. } => (None, None, None),
            TradeDetails::Option {
                expiration,
                strike,
                call_put,
                ..
            } => (Some(*expiration), Some(*strike), Some(*call_put)),
        };
        trade_fingerprint(&FingerprintParts {
            account_id,
            occurred_at: self.occurred_at,
            symbol: &self.symbol,
            instrument: self.instrument(),
            action: self.details.action_str(),
            expiration,
            strike,
            call_put,
            quantity: self.quantity,
            price: self.price,
            fees: self.fees,
        })
    }
}

/// Outcome of dedup evaluation for one parsed row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowStatus {
    New,
    DuplicateFile,
    DuplicateExternalRef,
    DuplicateFingerprint,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_row(row: usize, raw: &ImportRow, account_name: &str) -> Result<ParsedTrade, Vec<String>> {
    let mut errors = Vec::new();

    if raw.account_name.trim() != account_name {
        errors.push(format!(
            "account_name '{}' does not match the import account '{}'",
            raw.account_name.trim(),
            account_name
        ));
    }

    let occurred_at = match DateTime::parse_from_rfc3339(raw.trade_datetime.trim()) {
        Ok(dt) => Some(TimeMs::new(dt.timestamp_millis())),
        Err(e) => {
            errors.push(format!("trade_datetime '{}': {e}", raw.trade_datetime));
            None
        }
    };

    let symbol = Symbol::new(&raw.symbol);
    if symbol.is_empty() {
        errors.push("symbol is empty".to_string());
    }

    let quantity = parse_positive(&raw.quantity, "quantity", &mut errors);
    let price = parse_non_negative(&raw.price, "price", &mut errors);
    let fees = parse_non_negative(&raw.fees, "fees", &mut errors);

    let details = match InstrumentType::parse(&raw.instrument_type) {
        Some(InstrumentType::Stock) => match StockAction::parse(&raw.action) {
            Some(action) => Some(TradeDetails::Stock { action }),
            None => {
                errors.push(format!("unknown stock action '{}'", raw.action));
                None
            }
        },
        Some(InstrumentType::Option) => parse_option_details(raw, &mut errors),
        None => {
            errors.push(format!("unknown instrument_type '{}'", raw.instrument_type));
            None
        }
    };

    // Every None above pushed an error, so the Some arm is the only one
    // reachable with an empty error list.
    match (occurred_at, details, quantity, price, fees) {
        (Some(occurred_at), Some(details), Some(quantity), Some(price), Some(fees))
            if errors.is_empty() =>
        {
            Ok(ParsedTrade {
                row,
                occurred_at,
                symbol,
                details,
                quantity,
                price,
                fees,
                external_ref: non_empty(raw.external_trade_id.clone()),
                notes: non_empty(raw.notes.clone()),
            })
        }
        _ => Err(errors),
    }
}

fn parse_option_details(raw: &ImportRow, errors: &mut Vec<String>) -> Option<TradeDetails> {
    let action = OptionAction::parse(&raw.action);
    if action.is_none() {
        errors.push(format!("unknown option action '{}'", raw.action));
    }

    let expiration = non_empty(raw.expiration.clone()).and_then(|v| {
        match NaiveDate::parse_from_str(&v, "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(e) => {
                errors.push(format!("expiration '{v}': {e}"));
                None
            }
        }
    });
    if non_empty(raw.expiration.clone()).is_none() {
        errors.push("expiration is required for option rows".to_string());
    }

    let strike = non_empty(raw.strike.clone()).and_then(|v| match Decimal::from_str(&v) {
        Ok(s) if s.is_positive() => Some(s),
        Ok(_) => {
            errors.push(format!("strike '{v}' must be positive"));
            None
        }
        Err(e) => {
            errors.push(format!("strike '{v}': {e}"));
            None
        }
    });
    if non_empty(raw.strike.clone()).is_none() {
        errors.push("strike is required for option rows".to_string());
    }

    let call_put = non_empty(raw.call_put.clone()).and_then(|v| {
        let parsed = CallPut::parse(&v);
        if parsed.is_none() {
            errors.push(format!("unknown call_put '{v}'"));
        }
        parsed
    });
    if non_empty(raw.call_put.clone()).is_none() {
        errors.push("call_put is required for option rows".to_string());
    }

    Some(TradeDetails::Option {
        action: action?,
        expiration: expiration?,
        strike: strike?,
        call_put: call_put?,
    })
}

fn parse_positive(value: &str, field: &str, errors: &mut Vec<String>) -> Option<Decimal> {
    match Decimal::from_str(value.trim()) {
        Ok(d) if d.is_positive() => Some(d),
        Ok(_) => {
            errors.push(format!("{field} '{value}' must be positive"));
            None
        }
        Err(e) => {
            errors.push(format!("{field} '{value}': {e}"));
            None
        }
    }
}

fn parse_non_negative(value: &str, field: &str, errors: &mut Vec<String>) -> Option<Decimal> {
    match Decimal::from_str(value.trim()) {
        Ok(d) if !d.is_negative() => Some(d),
        Ok(_) => {
            errors.push(format!("{field} '{value}' must not be negative"));
            None
        }
        Err(e) => {
            errors.push(format!("{field} '{value}': {e}"));
            None
        }
    }
}

/// Parse the whole file. Rows are numbered from 1 (header excluded).
pub fn parse_trades(bytes: &[u8], account_name: &str) -> Result<Vec<ParsedTrade>, ImportParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let mut trades = Vec::new();
    let mut row_errors = Vec::new();

    for (idx, result) in reader.deserialize::<ImportRow>().enumerate() {
        let row = idx + 1;
        match result {
            Ok(raw) => match parse_row(row, &raw, account_name) {
                Ok(trade) => trades.push(trade),
                Err(messages) => {
                    for message in messages {
                        row_errors.push(RowError { row, message });
                    }
                }
            },
            Err(e) => row_errors.push(RowError {
                row,
                message: e.to_string(),
            }),
        }
    }

    if row_errors.is_empty() {
        Ok(trades)
    } else {
        Err(ImportParseError::Rows(row_errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "account_name,trade_datetime,symbol,instrument_type,action,quantity,price,fees,expiration,strike,call_put,external_trade_id,notes\n";

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_stock_and_option_rows() {
        let csv = format!(
            "{HEADER}\
             ira,2026-03-02T14:30:00Z,aapl,STOCK,BUY,100,150.25,1.00,,,,T-1001,first lot\n\
             ira,2026-03-02T14:31:00Z,SPY,OPTION,STO,1,2.50,0.65,2026-09-18,450,PUT,T-1002,\n"
        );
        let trades = parse_trades(csv.as_bytes(), "ira").unwrap();
        assert_eq!(trades.len(), 2);

        assert_eq!(trades[0].symbol.as_str(), "AAPL");
        assert_eq!(
            trades[0].details,
            TradeDetails::Stock {
                action: StockAction::Buy
            }
        );
        assert_eq!(trades[0].external_ref.as_deref(), Some("T-1001"));

        match &trades[1].details {
            TradeDetails::Option {
                action,
                strike,
                call_put,
                ..
            } => {
                assert_eq!(*action, OptionAction::Sto);
                assert_eq!(*strike, dec("450"));
                assert_eq!(*call_put, CallPut::Put);
            }
            other => panic!("expected option details, got {other:?}"),
        }
        assert_eq!(trades[1].notes, None);
    }

    #[test]
    fn test_errors_are_batched_across_rows() {
        let csv = format!(
            "{HEADER}\
             ira,not-a-date,AAPL,STOCK,BUY,100,150,1,,,,,\n\
             ira,2026-03-02T14:30:00Z,AAPL,STOCK,BUY,-5,150,1,,,,,\n\
             ira,2026-03-02T14:30:00Z,SPY,OPTION,STO,1,2.5,0.65,,,,,\n"
        );
        let err = parse_trades(csv.as_bytes(), "ira").unwrap_err();
        match err {
            ImportParseError::Rows(errors) => {
                assert!(errors.iter().any(|e| e.row == 1));
                assert!(errors.iter().any(|e| e.row == 2));
                // Option row missing expiration, strike and call_put.
                assert!(errors.iter().filter(|e| e.row == 3).count() >= 3);
            }
            other => panic!("expected row errors, got {other}"),
        }
    }

    #[test]
    fn test_account_name_mismatch_is_an_error() {
        let csv = format!(
            "{HEADER}ira,2026-03-02T14:30:00Z,AAPL,STOCK,BUY,100,150,1,,,,,\n"
        );
        assert!(parse_trades(csv.as_bytes(), "taxable").is_err());
    }

    #[test]
    fn test_fingerprint_ignores_external_ref() {
        let csv = format!(
            "{HEADER}\
             ira,2026-03-02T14:30:00Z,AAPL,STOCK,BUY,100,150,1,,,,T-1,\n\
             ira,2026-03-02T14:30:10Z,AAPL,STOCK,BUY,100,150,1,,,,T-2,\n"
        );
        let trades = parse_trades(csv.as_bytes(), "ira").unwrap();
        // Same trade within the rounding window, different broker ids.
        assert_eq!(trades[0].fingerprint(1), trades[1].fingerprint(1));
        assert_ne!(trades[0].fingerprint(1), trades[0].fingerprint(2));
    }
}
