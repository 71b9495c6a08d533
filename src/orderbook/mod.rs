//! Order book module
//!
//! Immutable per-message book snapshots and the metrics derived from them.

mod metrics;
mod snapshot;
mod view;

pub use metrics::OrderBookMetrics;
pub use snapshot::BookSnapshot;
pub use view::{ExecutionError, OrderBookView};

use serde::{Deserialize, Serialize};

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

/// Direction of a hypothetical market order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    /// Lifts the asks
    Buy,
    /// Hits the bids
    Sell,
}

impl TradeSide {
    /// Book side consumed by an order in this direction
    pub fn consumes(self) -> Side {
        match self {
            TradeSide::Buy => Side::Ask,
            TradeSide::Sell => Side::Bid,
        }
    }
}

/// A single level in the order book
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: f64,
    pub quantity: f64,
}

impl Level {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }

    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }
}

/// Running totals at one level, walking away from the touch
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DepthPoint {
    pub price: f64,
    pub quantity: f64,
    pub cumulative_quantity: f64,
    pub cumulative_notional: f64,
}
