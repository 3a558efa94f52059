use crate::models::MarketBasis;
use std::{fmt, sync::Arc};

/// A single cleared price, tied to the basis it was cleared in.
///
/// The price is not clamped to the range of its basis: a price
/// cleared upstream over a wider range is still a valid price downstream and
/// must be relayed as-is.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PriceInfo {
    market_basis: Arc<MarketBasis>,
    current_price: f64,
}

impl PriceInfo {
    /// Creates a new price
    pub fn new(market_basis: Arc<MarketBasis>, current_price: f64) -> Self {
        Self {
            market_basis,
            current_price,
        }
    }

    /// The basis the price was cleared in
    pub fn market_basis(&self) -> &Arc<MarketBasis> {
        &self.market_basis
    }

    /// The price value
    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    /// The price as a signed offset from the zero-price step of its basis
    pub fn normalized_price(&self) -> i32 {
        self.market_basis.to_normalized_price(self.current_price)
    }

    /// The same price value, labelled with another basis
    pub fn to_market_basis(&self, market_basis: &Arc<MarketBasis>) -> PriceInfo {
        Self {
            market_basis: market_basis.clone(),
            current_price: self.current_price,
        }
    }
}

impl fmt::Display for PriceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PriceInfo{{currentPrice={}, {}}}",
            self.current_price, self.market_basis
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basis(min: f64, max: f64) -> Arc<MarketBasis> {
        Arc::new(MarketBasis::new("electricity", "EUR", 5, min, max, 0).unwrap())
    }

    #[test]
    fn test_out_of_range_is_kept() {
        let price = PriceInfo::new(basis(0.0, 50.0), 52.0);
        assert_eq!(price.current_price(), 52.0);
        assert_eq!(price.normalized_price(), 4);
    }

    #[test]
    fn test_equality() {
        let a = PriceInfo::new(basis(0.0, 10.0), 5.0);
        assert_eq!(a, PriceInfo::new(basis(0.0, 10.0), 5.0));
        assert_ne!(a, PriceInfo::new(basis(0.0, 10.0), 7.5));
        assert_ne!(a, PriceInfo::new(basis(0.0, 20.0), 5.0));
    }

    #[test]
    fn test_to_market_basis() {
        let a = PriceInfo::new(basis(0.0, 10.0), 5.0);
        let b = a.to_market_basis(&basis(-100.0, 100.0));
        assert_eq!(b.current_price(), 5.0);
        assert_eq!(b.market_basis().minimum_price(), -100.0);
    }
}
