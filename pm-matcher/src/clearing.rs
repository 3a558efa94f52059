use pm_core::{
    models::{BidInfo, PriceInfo},
    ports::ClearingRule,
};

/// Clears at the lowest price where aggregate demand drops to the target.
///
/// Over ascending price steps, the equilibrium is the first step `k` with
/// `demand[k] <= target_demand`. If demand stays above the target even at the
/// highest price, the highest price is used; if it is already at or below the
/// target at the lowest price, the lowest price is used.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ZeroCrossing {
    /// The aggregate demand to clear at, zero for a balanced market
    pub target_demand: f64,
}

impl ClearingRule for ZeroCrossing {
    fn clear(&self, aggregate: &BidInfo) -> PriceInfo {
        PriceInfo::new(
            aggregate.market_basis().clone(),
            aggregate.price_at(self.target_demand),
        )
    }
}
