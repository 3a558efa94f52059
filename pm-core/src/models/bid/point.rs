use std::cmp::Ordering;

/// A breakpoint of a stepwise demand curve
///
/// Each point consists of:
/// - A price (value per unit of commodity)
/// - A demand (quantity at and above that price, until the next breakpoint)
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PricePoint {
    /// The price coordinate
    pub price: f64,
    /// The demand coordinate
    pub demand: f64,
}

impl PricePoint {
    /// Creates a new breakpoint
    pub fn new(price: f64, demand: f64) -> Self {
        Self { price, demand }
    }
}

// Consecutive breakpoints of a valid bid satisfy pt0 <= pt1, which means:
// pt0.price <= pt1.price AND pt0.demand >= pt1.demand
impl PartialOrd for PricePoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let price_ord = self.price.partial_cmp(&other.price)?;
        // Note the reversed ordering for demand
        let demand_ord = self.demand.partial_cmp(&other.demand)?.reverse();

        if price_ord == Ordering::Equal {
            Some(demand_ord)
        } else if demand_ord == Ordering::Equal || price_ord == demand_ord {
            Some(price_ord)
        } else {
            None
        }
    }
}
