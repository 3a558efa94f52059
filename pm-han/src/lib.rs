#![warn(missing_docs)]
// Note: this overwrites the links in the README to point to the rust docs of the pm-han crate.
//! [`HanCodec`]: crate::HanCodec
//! [`MarketBasisCache`]: crate::MarketBasisCache
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod cache;
mod codec;
mod mapper;
mod message;

pub use cache::MarketBasisCache;
pub use codec::{DecodeError, EncodeError, HanCodec, HanMessage, peek_message_type};
pub use mapper::{HanMapper, MarketBasisMapper};
pub use message::{
    BID_HEADER_SIZE, Commodity, HEADER_SIZE, MAXIMUM_NORMALIZED_PRICE, MessageType, PRICE_MESSAGE_SIZE,
    PRICE_STEPS, VERSION,
};
