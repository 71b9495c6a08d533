//! Parser module for L2 order-book feed messages
//!
//! Decodes one JSON update into a [`BookSnapshot`]. Decoding is strict: a
//! missing field, a wrongly typed field or an unparsable numeric string makes
//! the whole message invalid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::Result;
use crate::orderbook::{BookSnapshot, Level};

/// Raw L2 snapshot message as sent by the feed
#[derive(Debug, Clone, Deserialize)]
pub struct FeedMessage {
    /// Exchange name (e.g. "okx")
    pub exchange: String,

    /// Instrument symbol
    pub symbol: String,

    /// ISO-8601 event time with `Z` or an explicit offset, normalised to UTC
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Asks as `[price, quantity]` string pairs
    #[serde(deserialize_with = "deserialize_price_levels")]
    pub asks: Vec<Level>,

    /// Bids as `[price, quantity]` string pairs
    #[serde(deserialize_with = "deserialize_price_levels")]
    pub bids: Vec<Level>,
}

impl FeedMessage {
    /// Parse a raw feed message
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Convert into a validated, sorted snapshot
    pub fn into_snapshot(self) -> Result<BookSnapshot> {
        BookSnapshot::new(
            self.exchange,
            self.symbol,
            self.timestamp,
            self.asks,
            self.bids,
        )
    }
}

/// Parse a raw feed message straight into a snapshot
pub fn parse_snapshot(raw: &str) -> Result<BookSnapshot> {
    FeedMessage::parse(raw)?.into_snapshot()
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(serde::de::Error::custom)
}

/// Custom deserializer for price levels from array of string pairs
fn deserialize_price_levels<'de, D>(deserializer: D) -> std::result::Result<Vec<Level>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Vec<String>> = Deserialize::deserialize(deserializer)?;
    raw.into_iter()
        .map(|pair| {
            if pair.len() != 2 {
                return Err(serde::de::Error::custom("Invalid price level format"));
            }
            Ok(Level {
                price: parse_number(&pair[0]).map_err(serde::de::Error::custom)?,
                quantity: parse_number(&pair[1]).map_err(serde::de::Error::custom)?,
            })
        })
        .collect()
}

fn parse_number(s: &str) -> std::result::Result<f64, String> {
    match s.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!("invalid numeric string: {:?}", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;

    const VALID: &str = r#"{
        "exchange": "okx",
        "symbol": "BTC-USDT-SWAP",
        "timestamp": "2025-05-04T10:39:13Z",
        "asks": [["101.0", "2"], ["100.0", "1"]],
        "bids": [["98.0", "3"], ["99.0", "1"]]
    }"#;

    #[test]
    fn test_parse_snapshot() {
        let snapshot = parse_snapshot(VALID).unwrap();
        assert_eq!(snapshot.exchange(), "okx");
        assert_eq!(snapshot.symbol(), "BTC-USDT-SWAP");
        assert_eq!(snapshot.asks()[0].price, 100.0);
        assert_eq!(snapshot.bids()[0].price, 99.0);
        assert_eq!(snapshot.view().mid_price(), 99.5);
    }

    #[test]
    fn test_timestamp_offset_is_normalised() {
        let raw = r#"{"exchange":"okx","symbol":"X","timestamp":"2025-05-04T12:39:13+02:00","asks":[],"bids":[]}"#;
        let snapshot = parse_snapshot(raw).unwrap();
        let expected = DateTime::parse_from_rfc3339("2025-05-04T10:39:13Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(snapshot.observed_at(), expected);
    }

    #[test]
    fn test_malformed_numeric_string() {
        let raw = r#"{"exchange":"okx","symbol":"X","timestamp":"2025-05-04T10:39:13Z","asks":[["abc","1"]],"bids":[]}"#;
        assert!(matches!(parse_snapshot(raw), Err(FeedError::Parse(_))));

        let raw = r#"{"exchange":"okx","symbol":"X","timestamp":"2025-05-04T10:39:13Z","asks":[["NaN","1"]],"bids":[]}"#;
        assert!(matches!(parse_snapshot(raw), Err(FeedError::Parse(_))));
    }

    #[test]
    fn test_missing_and_mistyped_fields() {
        let missing_bids = r#"{"exchange":"okx","symbol":"X","timestamp":"2025-05-04T10:39:13Z","asks":[]}"#;
        assert!(parse_snapshot(missing_bids).is_err());

        let numeric_prices = r#"{"exchange":"okx","symbol":"X","timestamp":"2025-05-04T10:39:13Z","asks":[[100.0, 1.0]],"bids":[]}"#;
        assert!(parse_snapshot(numeric_prices).is_err());

        let bad_pair = r#"{"exchange":"okx","symbol":"X","timestamp":"2025-05-04T10:39:13Z","asks":[["100"]],"bids":[]}"#;
        assert!(parse_snapshot(bad_pair).is_err());

        let bad_time = r#"{"exchange":"okx","symbol":"X","timestamp":"yesterday","asks":[],"bids":[]}"#;
        assert!(parse_snapshot(bad_time).is_err());

        assert!(parse_snapshot("not json").is_err());
    }

    #[test]
    fn test_negative_quantity_is_invalid() {
        let raw = r#"{"exchange":"okx","symbol":"X","timestamp":"2025-05-04T10:39:13Z","asks":[["100","-1"]],"bids":[]}"#;
        assert!(matches!(parse_snapshot(raw), Err(FeedError::Parse(_))));
    }
}
