mod curve;
mod point;

pub use curve::BidCurve;
pub use point::PricePoint;

use crate::models::{IncompatibleBasis, MarketBasis};
use std::{fmt, sync::Arc};

/// A demand curve tied to a market basis.
///
/// `demand[i]` is the demand (in Watts, or any abstract unit shared by the
/// whole tree) at price step `i` of the basis. Bidders want less at higher
/// prices, so the array is non-increasing. Positive demand is consumption,
/// negative demand is production.
///
/// A bid is immutable. Every submission from a source supersedes the
/// previous one rather than editing it.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "BidInfoDto", into = "BidInfoDto")
)]
pub struct BidInfo {
    market_basis: Arc<MarketBasis>,
    demand: Vec<f64>,
}

impl BidInfo {
    /// Creates a bid from either a dense or a sparse curve, validating all constraints
    pub fn new(market_basis: Arc<MarketBasis>, curve: impl Into<BidCurve>) -> Result<Self, InvalidBid> {
        let demand = curve.into().to_dense(&market_basis)?;
        Ok(Self {
            market_basis,
            demand,
        })
    }

    /// Creates a bid from one demand value per price step
    pub fn from_demand(market_basis: Arc<MarketBasis>, demand: Vec<f64>) -> Result<Self, InvalidBid> {
        Self::new(market_basis, BidCurve::Dense(demand))
    }

    /// Creates a bid from the breakpoints of a step function
    pub fn from_points(
        market_basis: Arc<MarketBasis>,
        points: Vec<PricePoint>,
    ) -> Result<Self, InvalidBid> {
        Self::new(market_basis, BidCurve::Sparse(points))
    }

    /// A bid with zero demand at every price
    pub fn zero(market_basis: Arc<MarketBasis>) -> Self {
        let demand = vec![0.0; market_basis.price_steps()];
        Self {
            market_basis,
            demand,
        }
    }

    /// The basis this bid is expressed in
    pub fn market_basis(&self) -> &Arc<MarketBasis> {
        &self.market_basis
    }

    /// The demand per price step
    pub fn demand(&self) -> &[f64] {
        &self.demand
    }

    /// Sums two bids step by step.
    ///
    /// Both bids must be expressed in compatible bases; no implicit
    /// translation happens here.
    pub fn aggregate(&self, other: &BidInfo) -> Result<BidInfo, IncompatibleBasis> {
        if !self.market_basis.is_compatible(&other.market_basis) {
            return Err(IncompatibleBasis {
                left: self.market_basis.clone(),
                right: other.market_basis.clone(),
            });
        }
        let demand = self
            .demand
            .iter()
            .zip(other.demand.iter())
            .map(|(a, b)| a + b)
            .collect();
        Ok(Self {
            market_basis: self.market_basis.clone(),
            demand,
        })
    }

    /// Sums any number of bids, returning `None` if there are none
    pub fn aggregate_all<'a>(
        bids: impl IntoIterator<Item = &'a BidInfo>,
    ) -> Result<Option<BidInfo>, IncompatibleBasis> {
        let mut bids = bids.into_iter();
        let Some(first) = bids.next() else {
            return Ok(None);
        };
        bids.try_fold(first.clone(), |acc, bid| acc.aggregate(bid))
            .map(Some)
    }

    /// The demand at the step nearest to `price`
    pub fn demand_at(&self, price: f64) -> f64 {
        self.demand[self.market_basis.to_price_step(price)]
    }

    /// The demand at a (clamped) price step
    pub fn demand_at_step(&self, price_step: usize) -> f64 {
        self.demand[self.market_basis.bound_price_step(price_step)]
    }

    /// The smallest step whose demand is at or below `target_demand`,
    /// or the last step if demand exceeds the target everywhere
    pub fn price_step_at(&self, target_demand: f64) -> usize {
        // demand is non-increasing, so the steps above target form a prefix
        let step = self.demand.partition_point(|demand| *demand > target_demand);
        self.market_basis.bound_price_step(step)
    }

    /// The price at which demand first drops to `target_demand` or below.
    ///
    /// This is the inverse of [`BidInfo::demand_at`] used for clearing: with a
    /// target of zero it is the equilibrium price of the curve.
    pub fn price_at(&self, target_demand: f64) -> f64 {
        self.market_basis.to_price(self.price_step_at(target_demand))
    }

    /// The demand at the lowest price
    pub fn maximum_demand(&self) -> f64 {
        self.demand.first().copied().unwrap_or(0.0)
    }

    /// The demand at the highest price
    pub fn minimum_demand(&self) -> f64 {
        self.demand.last().copied().unwrap_or(0.0)
    }

    /// The factor by which demand must be divided to fit within `±max_value`
    pub fn scale_factor(&self, max_value: f64) -> f64 {
        self.maximum_demand().max(-self.minimum_demand()) / max_value
    }

    /// Shifts the whole curve by a constant demand, e.g. to account for a
    /// flow that does not respond to price
    pub fn transpose(&self, offset: f64) -> BidInfo {
        Self {
            market_basis: self.market_basis.clone(),
            demand: self.demand.iter().map(|demand| demand + offset).collect(),
        }
    }

    /// Resamples the bid onto another basis of the same commodity and currency.
    ///
    /// Every step of the new basis takes the demand of the old step nearest to
    /// its price; prices outside the old range use the first or last old step.
    /// A compatible basis is simply relabelled.
    pub fn to_market_basis(&self, market_basis: &Arc<MarketBasis>) -> BidInfo {
        if self.market_basis.is_compatible(market_basis) {
            return Self {
                market_basis: market_basis.clone(),
                demand: self.demand.clone(),
            };
        }
        let demand = (0..market_basis.price_steps())
            .map(|step| {
                let price = self.market_basis.bound_price(market_basis.to_price(step));
                self.demand[self.market_basis.to_price_step(price)]
            })
            .collect();
        Self {
            market_basis: market_basis.clone(),
            demand,
        }
    }

    /// The breakpoints of the curve: one at the first step and one at every
    /// step where demand changes.
    ///
    /// Feeding the result back into [`BidInfo::from_points`] over the same
    /// basis reproduces this bid exactly.
    pub fn price_points(&self) -> Vec<PricePoint> {
        let mut points = Vec::new();
        let mut prev = None;
        for (step, &demand) in self.demand.iter().enumerate() {
            if prev != Some(demand) {
                points.push(PricePoint::new(self.market_basis.to_price(step), demand));
                prev = Some(demand);
            }
        }
        points
    }
}

impl fmt::Display for BidInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BidInfo{{demand[]{{")?;
        for (i, demand) in self.demand.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{demand}")?;
        }
        write!(f, "}}, {}}}", self.market_basis)
    }
}

/// DTO to ensure that we always validate when we deserialize from an untrusted source
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct BidInfoDto {
    /// The basis the curve is expressed in
    pub market_basis: Arc<MarketBasis>,
    /// The (dense or sparse) demand curve
    pub curve: BidCurve,
}

impl TryFrom<BidInfoDto> for BidInfo {
    type Error = InvalidBid;

    fn try_from(value: BidInfoDto) -> Result<Self, Self::Error> {
        Self::new(value.market_basis, value.curve)
    }
}

impl From<BidInfo> for BidInfoDto {
    fn from(value: BidInfo) -> Self {
        Self {
            market_basis: value.market_basis,
            curve: BidCurve::Dense(value.demand),
        }
    }
}

/// Errors that can occur when creating or validating a bid
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidBid {
    /// Error when a dense curve does not have one value per price step
    #[error("expected {expected} demand values for the market basis, got {actual}")]
    LengthMismatch {
        /// The number of price steps of the basis
        expected: usize,
        /// The number of values provided
        actual: usize,
    },
    /// Error when any coordinate value is NaN
    #[error("NaN value encountered")]
    NaN,
    /// Error when demand increases with price, or breakpoints are out of price order
    #[error("demand must be non-increasing in price (violated at index {index})")]
    NonMonotone {
        /// The position of the offending value or breakpoint
        index: usize,
    },
}
