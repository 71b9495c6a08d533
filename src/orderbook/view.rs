//! Derived order book metrics
//!
//! Pure functions over a [`BookSnapshot`]. Metrics that need both sides of
//! the book degrade to `0.0` when either side is empty instead of failing.

use thiserror::Error;

use super::{BookSnapshot, DepthPoint, Level, OrderBookMetrics, Side, TradeSide};

/// Levels used for the summary imbalance
const IMBALANCE_LEVELS: usize = 5;

/// Outcomes of execution-price queries that are not a price
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// The side cannot absorb the requested quantity; a market outcome, not a fault
    #[error("not enough liquidity: requested {requested}, available {available}")]
    NotEnoughLiquidity { requested: f64, available: f64 },

    #[error("quantity must be a positive finite number, got {0}")]
    InvalidQuantity(f64),

    #[error("depth must be at least one level")]
    InvalidDepth,
}

/// Read-only metrics view over one snapshot
#[derive(Debug, Clone, Copy)]
pub struct OrderBookView<'a> {
    snapshot: &'a BookSnapshot,
}

impl<'a> OrderBookView<'a> {
    pub fn new(snapshot: &'a BookSnapshot) -> Self {
        Self { snapshot }
    }

    /// Get best bid price
    pub fn best_bid(&self) -> Option<f64> {
        self.snapshot.bids().first().map(|level| level.price)
    }

    /// Get best ask price
    pub fn best_ask(&self) -> Option<f64> {
        self.snapshot.asks().first().map(|level| level.price)
    }

    /// Average of best bid and best ask, `0.0` for a one-sided book
    pub fn mid_price(&self) -> f64 {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => (ask + bid) / 2.0,
            _ => 0.0,
        }
    }

    /// Best ask minus best bid, `0.0` for a one-sided book.
    ///
    /// A crossed book yields a negative spread; it is passed through as-is.
    pub fn spread(&self) -> f64 {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => ask - bid,
            _ => 0.0,
        }
    }

    /// Spread in basis points of the mid price
    pub fn spread_bps(&self) -> f64 {
        let mid = self.mid_price();
        if mid == 0.0 {
            return 0.0;
        }
        self.spread() / mid * 10_000.0
    }

    /// Notional available in the first `levels` levels as `(ask, bid)`.
    ///
    /// Books shallower than `levels` contribute every level they have.
    pub fn liquidity_at_level(&self, levels: usize) -> Result<(f64, f64), ExecutionError> {
        if levels == 0 {
            return Err(ExecutionError::InvalidDepth);
        }

        let notional = |side: &[Level]| -> f64 {
            side.iter().take(levels).map(Level::notional).sum()
        };

        Ok((notional(self.snapshot.asks()), notional(self.snapshot.bids())))
    }

    /// Average fill price of a market order for `quantity`.
    ///
    /// Whole levels are consumed from the touch outwards; only the needed part
    /// of the last level counts toward notional.
    pub fn price_for_quantity(
        &self,
        quantity: f64,
        side: TradeSide,
    ) -> Result<f64, ExecutionError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(ExecutionError::InvalidQuantity(quantity));
        }

        let levels = self.snapshot.side(side.consumes());
        let available = total(levels);
        if available < quantity {
            return Err(ExecutionError::NotEnoughLiquidity {
                requested: quantity,
                available,
            });
        }

        let mut remaining = quantity;
        let mut notional = 0.0;
        for level in levels {
            if remaining <= 0.0 {
                break;
            }
            let filled = level.quantity.min(remaining);
            notional += filled * level.price;
            remaining -= filled;
        }

        Ok(notional / quantity)
    }

    /// Cumulative quantity and notional per level, in walking order
    pub fn depth(&self, side: Side) -> Vec<DepthPoint> {
        let mut cumulative_quantity = 0.0;
        let mut cumulative_notional = 0.0;

        self.snapshot
            .side(side)
            .iter()
            .map(|level| {
                cumulative_quantity += level.quantity;
                cumulative_notional += level.notional();
                DepthPoint {
                    price: level.price,
                    quantity: level.quantity,
                    cumulative_quantity,
                    cumulative_notional,
                }
            })
            .collect()
    }

    /// Total resting quantity on one side
    pub fn total_quantity(&self, side: Side) -> f64 {
        total(self.snapshot.side(side))
    }

    /// Quantity imbalance over the top N levels: (bid - ask) / (bid + ask)
    pub fn imbalance(&self, levels: usize) -> Option<f64> {
        let bid_volume: f64 = self.snapshot.bids().iter().take(levels).map(|l| l.quantity).sum();
        let ask_volume: f64 = self.snapshot.asks().iter().take(levels).map(|l| l.quantity).sum();

        let volume = bid_volume + ask_volume;
        if volume > 0.0 {
            Some((bid_volume - ask_volume) / volume)
        } else {
            None
        }
    }

    /// Summary of the book for logging and publishing
    pub fn metrics(&self) -> OrderBookMetrics {
        OrderBookMetrics {
            mid_price: self.mid_price(),
            spread: self.spread(),
            spread_bps: self.spread_bps(),
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            imbalance: self.imbalance(IMBALANCE_LEVELS),
            bid_depth: self.total_quantity(Side::Bid),
            ask_depth: self.total_quantity(Side::Ask),
            bid_levels: self.snapshot.bids().len(),
            ask_levels: self.snapshot.asks().len(),
        }
    }
}

fn total(levels: &[Level]) -> f64 {
    levels.iter().map(|level| level.quantity).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use proptest::prelude::*;

    fn book(asks: &[(f64, f64)], bids: &[(f64, f64)]) -> BookSnapshot {
        let levels = |raw: &[(f64, f64)]| -> Vec<Level> {
            raw.iter().map(|&(p, q)| Level::new(p, q)).collect()
        };
        BookSnapshot::new(
            "OKX",
            "BTC-USDT-SWAP",
            DateTime::<Utc>::default(),
            levels(asks),
            levels(bids),
        )
        .unwrap()
    }

    fn create_test_book() -> BookSnapshot {
        book(&[(100.0, 1.0), (101.0, 2.0)], &[(99.0, 1.0), (98.0, 3.0)])
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_mid_and_spread() {
        let snapshot = create_test_book();
        let view = snapshot.view();
        assert_eq!(view.mid_price(), 99.5);
        assert_eq!(view.spread(), 1.0);
        assert!(approx(view.spread_bps(), 1.0 / 99.5 * 10_000.0));
    }

    #[test]
    fn test_buy_walks_partial_level() {
        let snapshot = create_test_book();
        let price = snapshot.view().price_for_quantity(1.5, TradeSide::Buy).unwrap();
        assert!(approx(price, (100.0 * 1.0 + 101.0 * 0.5) / 1.5));
    }

    #[test]
    fn test_sell_walks_bids() {
        let snapshot = create_test_book();
        let view = snapshot.view();
        assert_eq!(view.price_for_quantity(0.5, TradeSide::Sell).unwrap(), 99.0);
        let price = view.price_for_quantity(4.0, TradeSide::Sell).unwrap();
        assert!(approx(price, (99.0 + 98.0 * 3.0) / 4.0));
    }

    #[test]
    fn test_exact_side_total_is_fillable() {
        let snapshot = create_test_book();
        let price = snapshot.view().price_for_quantity(3.0, TradeSide::Buy).unwrap();
        assert!(approx(price, (100.0 + 202.0) / 3.0));
    }

    #[test]
    fn test_not_enough_liquidity() {
        let snapshot = create_test_book();
        let result = snapshot.view().price_for_quantity(3.5, TradeSide::Buy);
        assert_eq!(
            result,
            Err(ExecutionError::NotEnoughLiquidity {
                requested: 3.5,
                available: 3.0
            })
        );
    }

    #[test]
    fn test_invalid_quantity_is_a_distinct_error() {
        let snapshot = create_test_book();
        let view = snapshot.view();
        assert_eq!(
            view.price_for_quantity(0.0, TradeSide::Buy),
            Err(ExecutionError::InvalidQuantity(0.0))
        );
        assert!(matches!(
            view.price_for_quantity(-1.0, TradeSide::Sell),
            Err(ExecutionError::InvalidQuantity(_))
        ));
        assert!(matches!(
            view.price_for_quantity(f64::INFINITY, TradeSide::Sell),
            Err(ExecutionError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn test_one_sided_book_degrades_to_zero() {
        let snapshot = book(&[], &[(99.0, 1.0)]);
        let view = snapshot.view();
        assert_eq!(view.mid_price(), 0.0);
        assert_eq!(view.spread(), 0.0);
        assert_eq!(view.spread_bps(), 0.0);
        assert_eq!(view.liquidity_at_level(5).unwrap(), (0.0, 99.0));
        assert!(matches!(
            view.price_for_quantity(1.0, TradeSide::Buy),
            Err(ExecutionError::NotEnoughLiquidity { .. })
        ));
    }

    #[test]
    fn test_empty_book_metrics() {
        let snapshot = book(&[], &[]);
        let metrics = snapshot.view().metrics();
        assert_eq!(metrics.mid_price, 0.0);
        assert_eq!(metrics.spread_bps, 0.0);
        assert!(metrics.imbalance.is_none());
        assert!(!metrics.is_healthy());
    }

    #[test]
    fn test_crossed_book_passes_through() {
        let snapshot = book(&[(99.0, 1.0)], &[(100.0, 1.0)]);
        let view = snapshot.view();
        assert_eq!(view.spread(), -1.0);
        assert_eq!(view.mid_price(), 99.5);
        assert!(view.spread_bps() < 0.0);
    }

    #[test]
    fn test_liquidity_at_level() {
        let snapshot = create_test_book();
        let view = snapshot.view();
        assert_eq!(view.liquidity_at_level(1).unwrap(), (100.0, 99.0));
        assert_eq!(view.liquidity_at_level(10).unwrap(), (302.0, 393.0));
        assert_eq!(view.liquidity_at_level(0), Err(ExecutionError::InvalidDepth));
    }

    #[test]
    fn test_depth_accumulates() {
        let snapshot = create_test_book();
        let depth = snapshot.view().depth(Side::Bid);
        assert_eq!(depth.len(), 2);
        assert_eq!(depth[0].cumulative_quantity, 1.0);
        assert_eq!(depth[1].cumulative_quantity, 4.0);
        assert_eq!(depth[1].cumulative_notional, 99.0 + 294.0);
    }

    #[test]
    fn test_imbalance() {
        let snapshot = create_test_book();
        // Bids: 1 + 3 = 4, asks: 1 + 2 = 3
        let imbalance = snapshot.view().imbalance(10).unwrap();
        assert!(approx(imbalance, 1.0 / 7.0));
    }

    fn arb_side() -> impl Strategy<Value = Vec<(f64, f64)>> {
        prop::collection::vec((1.0f64..1_000.0, 0.01f64..50.0), 1..20)
    }

    proptest! {
        #[test]
        fn prop_buy_price_is_monotonic(asks in arb_side(), a in 0.01f64..1.0, b in 0.01f64..1.0) {
            let snapshot = book(&asks, &[]);
            let view = snapshot.view();
            let total = view.total_quantity(Side::Ask);
            let (small, large) = if a <= b { (a, b) } else { (b, a) };

            let small_price = view.price_for_quantity(small * total, TradeSide::Buy).unwrap();
            let large_price = view.price_for_quantity(large * total, TradeSide::Buy).unwrap();
            prop_assert!(large_price >= small_price - 1e-9 * small_price.abs().max(1.0));
        }

        #[test]
        fn prop_sell_price_is_monotonic(bids in arb_side(), a in 0.01f64..1.0, b in 0.01f64..1.0) {
            let snapshot = book(&[], &bids);
            let view = snapshot.view();
            let total = view.total_quantity(Side::Bid);
            let (small, large) = if a <= b { (a, b) } else { (b, a) };

            let small_price = view.price_for_quantity(small * total, TradeSide::Sell).unwrap();
            let large_price = view.price_for_quantity(large * total, TradeSide::Sell).unwrap();
            prop_assert!(large_price <= small_price + 1e-9 * small_price.abs().max(1.0));
        }

        #[test]
        fn prop_more_than_available_is_rejected(asks in arb_side(), extra in 0.01f64..10.0) {
            let snapshot = book(&asks, &[]);
            let view = snapshot.view();
            let total = view.total_quantity(Side::Ask);
            let is_short = matches!(
                view.price_for_quantity(total + extra, TradeSide::Buy),
                Err(ExecutionError::NotEnoughLiquidity { .. })
            );
            prop_assert!(is_short);
        }
    }
}
