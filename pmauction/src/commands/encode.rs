use crate::AgentCurve;
use pm_core::models::{BidInfo, MarketBasis, PriceInfo};
use pm_han::HanCodec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One bid to encode; the market defaults to the configured one
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BidSpec {
    #[serde(default)]
    pub market: Option<Arc<MarketBasis>>,
    #[serde(flatten)]
    pub curve: AgentCurve,
}

pub fn encode_price(codec: &HanCodec, market: &Arc<MarketBasis>, price: f64) -> anyhow::Result<Vec<u8>> {
    Ok(codec.encode_price(&PriceInfo::new(market.clone(), price))?)
}

pub fn encode_bid(codec: &HanCodec, market: &Arc<MarketBasis>, spec: BidSpec) -> anyhow::Result<Vec<u8>> {
    let market = spec.market.unwrap_or_else(|| market.clone());
    let bid = BidInfo::new(market, spec.curve)?;
    Ok(codec.encode_bid(&bid)?)
}
