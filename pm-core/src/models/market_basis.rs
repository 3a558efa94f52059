use std::{fmt, sync::Arc};

/// The price coordinate space that bids and prices are expressed in.
///
/// A market basis fixes the commodity and currency being traded and
/// discretizes the price range `[minimum_price, maximum_price]` into
/// `price_steps` evenly spaced steps. Bids assign a demand to each step.
///
/// A basis is immutable. A changed basis is a new instance, normally with a
/// new `market_ref` so that wire messages can be correlated to the basis they
/// were produced under.
///
/// Equality (and therefore [`MarketBasis::is_compatible`]) considers the
/// commodity, currency, step count and price range, but not the market
/// reference: two bases with equal coordinates are interchangeable for
/// aggregation regardless of which generation produced them.
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "MarketBasisDto", into = "MarketBasisDto")
)]
pub struct MarketBasis {
    commodity: String,
    currency: String,
    price_steps: usize,
    minimum_price: f64,
    maximum_price: f64,
    market_ref: u32,
    zero_price_step: usize,
}

impl MarketBasis {
    /// Creates a new market basis, validating the step count and price range
    pub fn new(
        commodity: impl Into<String>,
        currency: impl Into<String>,
        price_steps: usize,
        minimum_price: f64,
        maximum_price: f64,
        market_ref: u32,
    ) -> Result<Self, MarketBasisError> {
        Self::try_from(MarketBasisDto {
            commodity: commodity.into(),
            currency: currency.into(),
            price_steps,
            minimum_price,
            maximum_price,
            market_ref,
        })
    }

    /// The commodity being traded, e.g. `"electricity"`
    pub fn commodity(&self) -> &str {
        &self.commodity
    }

    /// The currency prices are quoted in, e.g. `"EUR"`
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// The number of discrete price steps `N`
    pub fn price_steps(&self) -> usize {
        self.price_steps
    }

    /// The price represented by step 0
    pub fn minimum_price(&self) -> f64 {
        self.minimum_price
    }

    /// The price represented by step `N - 1`
    pub fn maximum_price(&self) -> f64 {
        self.maximum_price
    }

    /// The generation id of this basis
    pub fn market_ref(&self) -> u32 {
        self.market_ref
    }

    /// The step that a price of zero maps onto
    pub fn zero_price_step(&self) -> usize {
        self.zero_price_step
    }

    /// The price difference between two adjacent steps (0 for a single-step basis)
    pub fn price_increment(&self) -> f64 {
        if self.price_steps > 1 {
            (self.maximum_price - self.minimum_price) / (self.price_steps - 1) as f64
        } else {
            0.0
        }
    }

    /// Returns a copy of this basis labelled with a different market reference
    pub fn with_market_ref(&self, market_ref: u32) -> Self {
        Self {
            market_ref,
            ..self.clone()
        }
    }

    /// Whether bids over `self` and `other` can be summed step by step
    pub fn is_compatible(&self, other: &MarketBasis) -> bool {
        self.commodity == other.commodity
            && self.currency == other.currency
            && self.price_steps == other.price_steps
            && self.minimum_price == other.minimum_price
            && self.maximum_price == other.maximum_price
    }

    /// Maps a price onto the nearest step.
    ///
    /// Exact midpoints round up. Prices outside the range of the basis are
    /// clamped onto the first or last step; a price from a basis with a wider
    /// range is legitimate input here and must not fail.
    pub fn to_price_step(&self, price: f64) -> usize {
        if self.price_steps == 1 || price.is_nan() {
            return 0;
        }
        let last = (self.price_steps - 1) as f64;
        let step = (price - self.minimum_price) / (self.maximum_price - self.minimum_price) * last;
        (step + 0.5).floor().clamp(0.0, last) as usize
    }

    /// The price represented by a step. Steps past the end are clamped.
    pub fn to_price(&self, price_step: usize) -> f64 {
        let step = self.bound_price_step(price_step);
        if step + 1 == self.price_steps && step > 0 {
            // avoid accumulating rounding error at the top of the range
            self.maximum_price
        } else {
            self.minimum_price + step as f64 * self.price_increment()
        }
    }

    /// Maps a price onto its signed offset from the zero-price step
    pub fn to_normalized_price(&self, price: f64) -> i32 {
        self.to_price_step(price) as i32 - self.zero_price_step as i32
    }

    /// Maps a signed offset from the zero-price step back onto a (clamped) step
    pub fn normalized_to_price_step(&self, normalized_price: i32) -> usize {
        let step = self.zero_price_step as i64 + normalized_price as i64;
        step.clamp(0, (self.price_steps - 1) as i64) as usize
    }

    /// Clamps a price into `[minimum_price, maximum_price]`
    pub fn bound_price(&self, price: f64) -> f64 {
        price.clamp(self.minimum_price, self.maximum_price)
    }

    /// Clamps a step into `[0, N - 1]`
    pub fn bound_price_step(&self, price_step: usize) -> usize {
        price_step.min(self.price_steps - 1)
    }
}

impl PartialEq for MarketBasis {
    fn eq(&self, other: &Self) -> bool {
        self.is_compatible(other)
    }
}

impl fmt::Display for MarketBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MarketBasis{{commodity={}, currency={}, minimumPrice={}, maximumPrice={}, priceSteps={}, marketRef={}}}",
            self.commodity,
            self.currency,
            self.minimum_price,
            self.maximum_price,
            self.price_steps,
            self.market_ref,
        )
    }
}

/// DTO to ensure that we always validate when we deserialize from an untrusted source
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct MarketBasisDto {
    /// The commodity being traded
    pub commodity: String,
    /// The currency prices are quoted in
    pub currency: String,
    /// The number of price steps (at least 1)
    pub price_steps: usize,
    /// The lowest representable price
    pub minimum_price: f64,
    /// The highest representable price
    pub maximum_price: f64,
    /// The generation id of the basis
    #[cfg_attr(feature = "serde", serde(default))]
    pub market_ref: u32,
}

impl TryFrom<MarketBasisDto> for MarketBasis {
    type Error = MarketBasisError;

    fn try_from(value: MarketBasisDto) -> Result<Self, Self::Error> {
        let MarketBasisDto {
            commodity,
            currency,
            price_steps,
            minimum_price,
            maximum_price,
            market_ref,
        } = value;

        if price_steps == 0 {
            return Err(MarketBasisError::NoPriceSteps);
        }
        if !minimum_price.is_finite() || !maximum_price.is_finite() {
            return Err(MarketBasisError::NonFinite);
        }
        if minimum_price > maximum_price || (price_steps > 1 && minimum_price == maximum_price) {
            return Err(MarketBasisError::EmptyRange {
                minimum_price,
                maximum_price,
            });
        }

        let mut basis = Self {
            commodity,
            currency,
            price_steps,
            minimum_price,
            maximum_price,
            market_ref,
            zero_price_step: 0,
        };
        basis.zero_price_step = basis.to_price_step(0.0);
        Ok(basis)
    }
}

impl From<MarketBasis> for MarketBasisDto {
    fn from(value: MarketBasis) -> Self {
        Self {
            commodity: value.commodity,
            currency: value.currency,
            price_steps: value.price_steps,
            minimum_price: value.minimum_price,
            maximum_price: value.maximum_price,
            market_ref: value.market_ref,
        }
    }
}

/// Errors that can occur when constructing a market basis
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum MarketBasisError {
    /// The basis must have at least one step
    #[error("price steps must be > 0")]
    NoPriceSteps,
    /// The price range bounds must be finite
    #[error("price range must be finite")]
    NonFinite,
    /// The price range is inverted, or empty while spanning several steps
    #[error("invalid price range [{minimum_price}, {maximum_price}]")]
    EmptyRange {
        /// The requested minimum price
        minimum_price: f64,
        /// The requested maximum price
        maximum_price: f64,
    },
}

/// Bids over two bases that are not compatible cannot be combined
#[derive(Debug, Clone, thiserror::Error)]
#[error("incompatible market basis: {left} vs {right}")]
pub struct IncompatibleBasis {
    /// The basis of the receiving side
    pub left: Arc<MarketBasis>,
    /// The basis of the offending side
    pub right: Arc<MarketBasis>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basis(steps: usize, min: f64, max: f64) -> MarketBasis {
        MarketBasis::new("electricity", "EUR", steps, min, max, 0).unwrap()
    }

    #[test]
    fn test_invalid_bases() {
        assert_eq!(
            MarketBasis::new("electricity", "EUR", 0, 0.0, 1.0, 0).unwrap_err(),
            MarketBasisError::NoPriceSteps
        );
        assert_eq!(
            MarketBasis::new("electricity", "EUR", 5, 1.0, 0.0, 0).unwrap_err(),
            MarketBasisError::EmptyRange {
                minimum_price: 1.0,
                maximum_price: 0.0
            }
        );
        assert_eq!(
            MarketBasis::new("electricity", "EUR", 5, 0.0, f64::INFINITY, 0).unwrap_err(),
            MarketBasisError::NonFinite
        );
        assert!(MarketBasis::new("electricity", "EUR", 1, 3.0, 3.0, 0).is_ok());
    }

    #[test]
    fn test_price_increment() {
        assert_eq!(basis(5, 0.0, 10.0).price_increment(), 2.5);
        assert_eq!(basis(1, 2.0, 2.0).price_increment(), 0.0);
    }

    #[test]
    fn test_to_price_step_rounds_to_nearest() {
        let b = basis(5, 0.0, 10.0);
        assert_eq!(b.to_price_step(0.0), 0);
        assert_eq!(b.to_price_step(1.2), 0);
        assert_eq!(b.to_price_step(1.3), 1);
        assert_eq!(b.to_price_step(3.7), 1);
        assert_eq!(b.to_price_step(10.0), 4);
    }

    #[test]
    fn test_to_price_step_midpoint_rounds_up() {
        let b = basis(5, 0.0, 10.0);
        assert_eq!(b.to_price_step(1.25), 1);
        assert_eq!(b.to_price_step(3.75), 2);
    }

    #[test]
    fn test_to_price_step_clamps() {
        let b = basis(5, 0.0, 10.0);
        assert_eq!(b.to_price_step(-100.0), 0);
        assert_eq!(b.to_price_step(52.0), 4);
        assert_eq!(b.to_price_step(f64::INFINITY), 4);
        assert_eq!(b.to_price_step(f64::NAN), 0);
    }

    #[test]
    fn test_to_price() {
        let b = basis(5, 0.0, 10.0);
        let prices = (0..5).map(|i| b.to_price(i)).collect::<Vec<_>>();
        assert_eq!(prices, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
        assert_eq!(b.to_price(17), 10.0);
        for step in 0..5 {
            assert_eq!(b.to_price_step(b.to_price(step)), step);
        }
    }

    #[test]
    fn test_normalized_prices() {
        let b = basis(255, -127.0, 127.0);
        assert_eq!(b.zero_price_step(), 127);
        assert_eq!(b.to_normalized_price(-123.0), -123);
        assert_eq!(b.to_normalized_price(0.0), 0);
        assert_eq!(b.to_normalized_price(500.0), 127);
        assert_eq!(b.normalized_to_price_step(-127), 0);
        assert_eq!(b.normalized_to_price_step(200), 254);
    }

    #[test]
    fn test_compatibility_ignores_market_ref() {
        let a = basis(5, 0.0, 10.0);
        let b = a.with_market_ref(9);
        assert!(a.is_compatible(&b));
        assert_eq!(a, b);
        assert_eq!(b.market_ref(), 9);

        assert!(!a.is_compatible(&basis(5, 0.0, 20.0)));
        assert!(!a.is_compatible(&basis(6, 0.0, 10.0)));
        let gas = MarketBasis::new("gas", "EUR", 5, 0.0, 10.0, 0).unwrap();
        assert!(!a.is_compatible(&gas));
    }

    #[test]
    fn test_deserialize_validates() {
        let raw = r#"{
            "commodity": "electricity",
            "currency": "EUR",
            "price_steps": 5,
            "minimum_price": 0.0,
            "maximum_price": 10.0
        }"#;
        let basis = serde_json::from_str::<MarketBasis>(raw).unwrap();
        assert_eq!(basis.market_ref(), 0);
        assert_eq!(basis.price_steps(), 5);

        let raw = r#"{
            "commodity": "electricity",
            "currency": "EUR",
            "price_steps": 0,
            "minimum_price": 0.0,
            "maximum_price": 10.0
        }"#;
        assert!(serde_json::from_str::<MarketBasis>(raw).is_err());
    }
}
