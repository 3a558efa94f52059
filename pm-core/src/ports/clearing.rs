use crate::models::{BidInfo, PriceInfo};

/// Interface for turning an aggregated bid into a single price.
///
/// Implementations must be deterministic: the same aggregate always clears at
/// the same price, however it was assembled.
pub trait ClearingRule: Send + Sync {
    /// Determine the price for the aggregated bid
    fn clear(&self, aggregate: &BidInfo) -> PriceInfo;
}
