use pm_core::models::{BidInfo, MarketBasis, PriceInfo};
use pm_han::{HanCodec, HanMapper, HanMessage, MarketBasisMapper as _};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodedMessage {
    Price(PriceInfo),
    Bid(BidInfo),
}

impl From<HanMessage> for DecodedMessage {
    fn from(value: HanMessage) -> Self {
        match value {
            HanMessage::Price(price) => Self::Price(price),
            HanMessage::Bid(bid) => Self::Bid(bid),
        }
    }
}

/// Decode a hex message, with the configured market already announced so
/// that bids under its reference can be read without a preceding price
pub fn decode(codec: &HanCodec, market: &Arc<MarketBasis>, message: &str) -> anyhow::Result<DecodedMessage> {
    codec
        .cache()
        .register_external(HanMapper::default().to_external(market)?)?;
    let bytes = hex::decode(message.trim())?;
    Ok(codec.decode(&bytes)?.into())
}
