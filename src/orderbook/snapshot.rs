//! Immutable order book snapshot
//!
//! One snapshot is built per feed message; asks are kept ascending and bids
//! descending by price so every derived metric can walk from the touch outwards.

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::cmp::Reverse;

use super::{Level, OrderBookView, Side};
use crate::error::{FeedError, Result};

/// Parsed representation of one L2 feed update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookSnapshot {
    exchange: String,
    symbol: String,
    observed_at: DateTime<Utc>,
    /// Sorted by price ascending (lowest first)
    asks: Vec<Level>,
    /// Sorted by price descending (highest first)
    bids: Vec<Level>,
}

impl BookSnapshot {
    /// Build a snapshot, validating and sorting both sides.
    ///
    /// Levels with equal prices keep their arrival order. Negative or
    /// non-finite prices and quantities are rejected.
    pub fn new(
        exchange: impl Into<String>,
        symbol: impl Into<String>,
        observed_at: DateTime<Utc>,
        mut asks: Vec<Level>,
        mut bids: Vec<Level>,
    ) -> Result<Self> {
        validate_levels(Side::Ask, &asks)?;
        validate_levels(Side::Bid, &bids)?;

        // Stable sorts: equal prices are consumed in feed order
        asks.sort_by_key(|level| OrderedFloat(level.price));
        bids.sort_by_key(|level| Reverse(OrderedFloat(level.price)));

        Ok(Self {
            exchange: exchange.into(),
            symbol: symbol.into(),
            observed_at,
            asks,
            bids,
        })
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn observed_at(&self) -> DateTime<Utc> {
        self.observed_at
    }

    pub fn asks(&self) -> &[Level] {
        &self.asks
    }

    pub fn bids(&self) -> &[Level] {
        &self.bids
    }

    /// Levels of one side in walking order
    pub fn side(&self, side: Side) -> &[Level] {
        match side {
            Side::Ask => &self.asks,
            Side::Bid => &self.bids,
        }
    }

    /// Derived metrics over this snapshot
    pub fn view(&self) -> OrderBookView<'_> {
        OrderBookView::new(self)
    }
}

fn validate_levels(side: Side, levels: &[Level]) -> Result<()> {
    for level in levels {
        let valid = level.price.is_finite()
            && level.quantity.is_finite()
            && level.price >= 0.0
            && level.quantity >= 0.0;
        if !valid {
            return Err(FeedError::Parse(format!(
                "invalid {:?} level: price={} quantity={}",
                side, level.price, level.quantity
            )));
        }
    }
    Ok(())
}
