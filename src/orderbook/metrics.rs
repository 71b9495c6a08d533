//! Order book summary metrics

use serde::{Deserialize, Serialize};

/// Computed metrics for one snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderBookMetrics {
    /// Mid price (average of best bid and ask), 0 for a one-sided book
    pub mid_price: f64,

    /// Best ask minus best bid, 0 for a one-sided book
    pub spread: f64,

    /// Spread in basis points
    pub spread_bps: f64,

    pub best_bid: Option<f64>,
    pub best_ask: Option<f64>,

    /// Simple imbalance: (bid_vol - ask_vol) / (bid_vol + ask_vol)
    pub imbalance: Option<f64>,

    /// Total bid depth (volume)
    pub bid_depth: f64,

    /// Total ask depth (volume)
    pub ask_depth: f64,

    /// Number of bid levels
    pub bid_levels: usize,

    /// Number of ask levels
    pub ask_levels: usize,
}

impl OrderBookMetrics {
    /// Check if the order book is two-sided and not crossed
    pub fn is_healthy(&self) -> bool {
        self.bid_levels > 0 && self.ask_levels > 0 && self.spread >= 0.0
    }

    /// Get volume ratio (bid_depth / ask_depth)
    pub fn volume_ratio(&self) -> Option<f64> {
        if self.ask_depth > 0.0 {
            Some(self.bid_depth / self.ask_depth)
        } else {
            None
        }
    }
}
