use async_trait::async_trait;

use crate::{Candle, Interval, Result, Side};

/// Abstraction over the market-data connection.
///
/// `BinanceCandleSource` implements this against the public REST API; tests
/// use in-memory implementations. The scan pipeline never talks to the network
/// except through this trait.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Closed candles for `symbol`, ascending by timestamp.
    async fn fetch_candles(&self, symbol: &str, interval: Interval) -> Result<Vec<Candle>>;

    /// Latest traded price, used for the staleness check.
    async fn current_price(&self, symbol: &str) -> Result<f64>;

    /// Price of the largest resting order standing in the way of a trade on
    /// `side` (asks above for LONG, bids below for SHORT). Best-effort.
    async fn order_book_wall(&self, _symbol: &str, _side: Side) -> Result<Option<f64>> {
        Ok(None)
    }

    /// Midpoint of the densest liquidation cluster in the direction of `side`.
    /// Best-effort.
    async fn liquidation_cluster(&self, _symbol: &str, _side: Side) -> Result<Option<f64>> {
        Ok(None)
    }
}
