use crate::{MAXIMUM_NORMALIZED_PRICE, PRICE_STEPS};
use pm_core::models::{MarketBasis, MarketBasisError};
use std::sync::Arc;

/// Translates between the basis used inside the system and the basis used on
/// the wire.
///
/// Both directions must preserve the market reference, since that is how a
/// [`MarketBasisCache`](crate::MarketBasisCache) pairs them up.
pub trait MarketBasisMapper: Send + Sync {
    /// The wire basis for an internal basis
    fn to_external(&self, internal: &MarketBasis) -> Result<MarketBasis, MarketBasisError>;

    /// The internal basis for a wire basis
    fn to_internal(&self, external: &MarketBasis) -> Result<MarketBasis, MarketBasisError>;
}

/// The standard mapping onto the symmetric 255-step wire basis.
///
/// Going out, the wire basis covers `±max(|min|, |max|)` of the internal
/// range, rounded so that one step is a whole number of thousandths. Coming
/// in, a wire basis for the same commodity and currency as the configured
/// internal basis maps onto that basis; anything else is used as-is.
#[derive(Clone, Debug, Default)]
pub struct HanMapper {
    internal: Option<Arc<MarketBasis>>,
}

impl HanMapper {
    /// A mapper that decodes onto `internal`, if given
    pub fn new(internal: Option<Arc<MarketBasis>>) -> Self {
        Self { internal }
    }

    /// The price of one wire step, in thousandths, for an internal basis
    pub fn exchange_rate(internal: &MarketBasis) -> f64 {
        let max_abs = internal
            .minimum_price()
            .abs()
            .max(internal.maximum_price().abs());
        (max_abs / f64::from(MAXIMUM_NORMALIZED_PRICE) * 1000.0).round()
    }
}

impl MarketBasisMapper for HanMapper {
    fn to_external(&self, internal: &MarketBasis) -> Result<MarketBasis, MarketBasisError> {
        let maximum_price = f64::from(MAXIMUM_NORMALIZED_PRICE) * Self::exchange_rate(internal) / 1000.0;
        MarketBasis::new(
            internal.commodity(),
            internal.currency(),
            PRICE_STEPS,
            -maximum_price,
            maximum_price,
            internal.market_ref(),
        )
    }

    fn to_internal(&self, external: &MarketBasis) -> Result<MarketBasis, MarketBasisError> {
        Ok(match &self.internal {
            Some(internal)
                if internal.commodity() == external.commodity()
                    && internal.currency() == external.currency() =>
            {
                internal.with_market_ref(external.market_ref())
            }
            _ => external.clone(),
        })
    }
}
