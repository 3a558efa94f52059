use super::{InvalidBid, PricePoint};
use crate::models::MarketBasis;

/// The shape of a submitted demand curve.
///
/// Agents may describe their demand either densely (one value per price step
/// of the market basis) or sparsely (a list of breakpoints of a step
/// function). Either form is normalized exactly once, when a
/// [`BidInfo`](super::BidInfo) is constructed, so that aggregation and
/// clearing only ever deal with dense arrays.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum BidCurve {
    /// Demand per price step, in ascending price order
    Dense(Vec<f64>),
    /// Breakpoints in ascending price order; demand is held constant between them
    Sparse(Vec<PricePoint>),
}

impl From<Vec<f64>> for BidCurve {
    fn from(value: Vec<f64>) -> Self {
        Self::Dense(value)
    }
}

impl From<Vec<PricePoint>> for BidCurve {
    fn from(value: Vec<PricePoint>) -> Self {
        Self::Sparse(value)
    }
}

impl BidCurve {
    /// Expands the curve into exactly `basis.price_steps()` demand values,
    /// validating all constraints along the way
    ///
    /// # Validation
    ///
    /// 1. A dense curve has one value per price step
    /// 2. No coordinate values are NaN
    /// 3. Demand is non-increasing as price increases (and breakpoints are in ascending price order)
    ///
    /// A sparse curve takes, at every step, the demand of the last breakpoint
    /// at or below that step; steps below the first breakpoint take its
    /// demand. No breakpoints at all means zero demand everywhere.
    pub fn to_dense(self, basis: &MarketBasis) -> Result<Vec<f64>, InvalidBid> {
        match self {
            Self::Dense(demand) => {
                if demand.len() != basis.price_steps() {
                    return Err(InvalidBid::LengthMismatch {
                        expected: basis.price_steps(),
                        actual: demand.len(),
                    });
                }
                let mut prev = f64::INFINITY;
                for (index, &value) in demand.iter().enumerate() {
                    if value.is_nan() {
                        return Err(InvalidBid::NaN);
                    }
                    if value > prev {
                        return Err(InvalidBid::NonMonotone { index });
                    }
                    prev = value;
                }
                Ok(demand)
            }
            Self::Sparse(points) => {
                let initial = points.first().map(|point| point.demand).unwrap_or(0.0);
                let mut demand = vec![initial; basis.price_steps()];

                let mut prev = PricePoint {
                    price: f64::NEG_INFINITY,
                    demand: f64::INFINITY,
                };
                for (index, point) in points.iter().enumerate() {
                    if point.price.is_nan() || point.demand.is_nan() {
                        return Err(InvalidBid::NaN);
                    }
                    // `point < prev` is not enough, the points may be incomparable
                    if !(point >= &prev) {
                        return Err(InvalidBid::NonMonotone { index });
                    }
                    let step = basis.to_price_step(point.price);
                    demand[step..].fill(point.demand);
                    prev = *point;
                }
                Ok(demand)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basis() -> MarketBasis {
        MarketBasis::new("electricity", "EUR", 5, 0.0, 10.0, 0).unwrap()
    }

    #[test]
    fn test_dense_length_mismatch() {
        assert_eq!(
            BidCurve::Dense(vec![1.0, 0.0]).to_dense(&basis()).unwrap_err(),
            InvalidBid::LengthMismatch {
                expected: 5,
                actual: 2
            }
        );
    }

    #[test]
    fn test_dense_non_monotone() {
        assert_eq!(
            BidCurve::Dense(vec![3.0, 2.0, 2.5, 1.0, 0.0])
                .to_dense(&basis())
                .unwrap_err(),
            InvalidBid::NonMonotone { index: 2 }
        );
    }

    #[test]
    fn test_dense_nan() {
        assert_eq!(
            BidCurve::Dense(vec![3.0, f64::NAN, 1.0, 1.0, 0.0])
                .to_dense(&basis())
                .unwrap_err(),
            InvalidBid::NaN
        );
    }

    #[test]
    fn test_sparse_holds_demand_between_breakpoints() {
        let curve = BidCurve::Sparse(vec![PricePoint::new(2.5, 100.0), PricePoint::new(7.5, -50.0)]);
        assert_eq!(
            curve.to_dense(&basis()).unwrap(),
            vec![100.0, 100.0, 100.0, -50.0, -50.0]
        );
    }

    #[test]
    fn test_sparse_empty_is_zero() {
        assert_eq!(
            BidCurve::Sparse(vec![]).to_dense(&basis()).unwrap(),
            vec![0.0; 5]
        );
    }

    #[test]
    fn test_sparse_out_of_range_breakpoints_are_clamped() {
        let curve = BidCurve::Sparse(vec![PricePoint::new(-20.0, 4.0), PricePoint::new(40.0, 1.0)]);
        assert_eq!(
            curve.to_dense(&basis()).unwrap(),
            vec![4.0, 4.0, 4.0, 4.0, 1.0]
        );
    }

    #[test]
    fn test_sparse_non_monotone() {
        // price goes backwards
        let curve = BidCurve::Sparse(vec![PricePoint::new(5.0, 10.0), PricePoint::new(2.5, 8.0)]);
        assert_eq!(
            curve.to_dense(&basis()).unwrap_err(),
            InvalidBid::NonMonotone { index: 1 }
        );

        // demand goes up
        let curve = BidCurve::Sparse(vec![PricePoint::new(2.5, 8.0), PricePoint::new(5.0, 10.0)]);
        assert_eq!(
            curve.to_dense(&basis()).unwrap_err(),
            InvalidBid::NonMonotone { index: 1 }
        );
    }
}
