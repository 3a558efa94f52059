use crate::{
    BID_HEADER_SIZE, Commodity, HEADER_SIZE, HanMapper, MAXIMUM_NORMALIZED_PRICE, MarketBasisCache,
    MarketBasisMapper, MessageType, PRICE_MESSAGE_SIZE, PRICE_STEPS, VERSION,
};
use pm_core::models::{BidInfo, InvalidBid, MarketBasis, MarketBasisError, PriceInfo, PricePoint};
use std::sync::Arc;
use tracing::{Level, event};

const POINT_SIZE: usize = 3;
const MAXIMUM_RAW_DEMAND: f64 = i16::MAX as f64;

/// A decoded message of either kind
#[derive(Clone, Debug, PartialEq)]
pub enum HanMessage {
    /// A price, relabelled with the internal basis
    Price(PriceInfo),
    /// A bid, resampled onto the internal basis
    Bid(BidInfo),
}

/// Encodes and decodes HAN messages, translating between the internal basis
/// and the wire basis on the way.
///
/// The codec owns the [`MarketBasisCache`] that pairs the two up, so one
/// codec should be used per peer for the lifetime of the connection.
#[derive(Debug)]
pub struct HanCodec {
    cache: MarketBasisCache,
}

impl HanCodec {
    /// A codec that maps bases with `mapper`
    pub fn new(mapper: impl MarketBasisMapper + 'static) -> Self {
        Self {
            cache: MarketBasisCache::new(mapper),
        }
    }

    /// A codec using the standard [`HanMapper`], decoding onto `internal` if given
    pub fn with_internal_basis(internal: Option<Arc<MarketBasis>>) -> Self {
        Self::new(HanMapper::new(internal))
    }

    /// The basis pairs seen so far
    pub fn cache(&self) -> &MarketBasisCache {
        &self.cache
    }

    /// Encode a price as a 10-byte price message
    pub fn encode_price(&self, price: &PriceInfo) -> Result<Vec<u8>, EncodeError> {
        let external = self.cache.external_for(price.market_basis())?;
        let rate = exchange_rate(&external)?;
        let currency = currency_bytes(external.currency())?;

        let mut msg = header(MessageType::Price, PRICE_MESSAGE_SIZE);
        msg.push(external.to_normalized_price(price.current_price()) as i8 as u8);
        msg.push(external.market_ref() as u8);
        msg.extend_from_slice(&currency);
        msg.extend_from_slice(&rate.to_be_bytes());
        msg.push(Commodity::from_name(external.commodity()) as u8);
        Ok(msg)
    }

    /// Encode a bid as a bid message with one point per demand change.
    ///
    /// The bid is first resampled onto the wire basis; demand is then sent in
    /// whole multiples of the smallest unit that keeps every value within an
    /// `i16`. A bid with no demand at all is sent with a unit of zero.
    pub fn encode_bid(&self, bid: &BidInfo) -> Result<Vec<u8>, EncodeError> {
        let external = self.cache.external_for(bid.market_basis())?;
        let bid = bid.to_market_basis(&external);
        let points = bid.price_points();
        let num_points =
            u8::try_from(points.len()).map_err(|_| EncodeError::TooManyPoints(points.len()))?;

        let unit = bid.scale_factor(MAXIMUM_RAW_DEMAND).ceil();
        if !(unit <= f64::from(u16::MAX)) {
            return Err(EncodeError::DemandOverflow(unit));
        }
        let unit = unit as u16;

        let mut msg = header(MessageType::Bid, BID_HEADER_SIZE + POINT_SIZE * points.len());
        msg.push(external.market_ref() as u8);
        msg.extend_from_slice(&unit.to_be_bytes());
        msg.push(num_points);
        for point in points {
            let raw = match unit {
                0 => 0,
                unit => (point.demand / f64::from(unit)).round() as i16,
            };
            msg.push(external.to_normalized_price(point.price) as i8 as u8);
            msg.extend_from_slice(&raw.to_be_bytes());
        }
        Ok(msg)
    }

    /// Decode a price message.
    ///
    /// The wire basis it describes is registered under its market reference,
    /// which is what later allows bids referring to it to be decoded.
    pub fn decode_price(&self, bytes: &[u8]) -> Result<PriceInfo, DecodeError> {
        check_header(bytes, MessageType::Price, PRICE_MESSAGE_SIZE)?;

        let normalized = bytes[2] as i8;
        let market_ref = bytes[3];
        // ISO-8859-1 maps every byte onto the code point of the same value
        let currency: String = bytes[4..7].iter().map(|&b| char::from(b)).collect();
        let rate = u16::from_be_bytes([bytes[7], bytes[8]]);
        let commodity = Commodity::try_from(bytes[9])?;

        let maximum_price = f64::from(MAXIMUM_NORMALIZED_PRICE) * f64::from(rate) / 1000.0;
        let external = MarketBasis::new(
            commodity.name(),
            currency,
            PRICE_STEPS,
            -maximum_price,
            maximum_price,
            u32::from(market_ref),
        )?;
        let internal = self.cache.register_external(external)?;
        let current_price = f64::from(normalized) * f64::from(rate) / 1000.0;
        Ok(PriceInfo::new(internal, current_price))
    }

    /// Decode a bid message whose market reference is already known
    pub fn decode_bid(&self, bytes: &[u8]) -> Result<BidInfo, DecodeError> {
        check_header(bytes, MessageType::Bid, BID_HEADER_SIZE)?;

        let market_ref = bytes[2];
        let unit = f64::from(u16::from_be_bytes([bytes[3], bytes[4]]));
        let num_points = usize::from(bytes[5]);
        let expected = BID_HEADER_SIZE + POINT_SIZE * num_points;
        if bytes.len() < expected {
            return Err(DecodeError::TooShort {
                expected,
                actual: bytes.len(),
            });
        }

        let (internal, external) = self
            .cache
            .bases_for_ref(market_ref)
            .ok_or(DecodeError::UnknownMarketRef(market_ref))?;

        let points = bytes[BID_HEADER_SIZE..expected]
            .chunks_exact(POINT_SIZE)
            .map(|chunk| {
                let step = external.normalized_to_price_step(i32::from(chunk[0] as i8));
                let raw = i16::from_be_bytes([chunk[1], chunk[2]]);
                PricePoint::new(external.to_price(step), unit * f64::from(raw))
            })
            .collect();
        let bid = BidInfo::from_points(external, points)?;
        Ok(bid.to_market_basis(&internal))
    }

    /// Decode a message of either kind
    pub fn decode(&self, bytes: &[u8]) -> Result<HanMessage, DecodeError> {
        let result = match peek_message_type(bytes)? {
            MessageType::Price => self.decode_price(bytes).map(HanMessage::Price),
            MessageType::Bid => self.decode_bid(bytes).map(HanMessage::Bid),
            MessageType::Undefined => Err(DecodeError::UnknownMessageType(MessageType::Undefined as u8)),
        };
        result.inspect_err(|err| {
            event!(Level::DEBUG, err = err.to_string(), "failed to decode HAN message");
        })
    }
}

impl Default for HanCodec {
    fn default() -> Self {
        Self::new(HanMapper::default())
    }
}

/// Read the message type from the header, checking the protocol version
pub fn peek_message_type(bytes: &[u8]) -> Result<MessageType, DecodeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DecodeError::TooShort {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }
    if bytes[0] != VERSION {
        return Err(DecodeError::UnsupportedVersion(bytes[0]));
    }
    MessageType::try_from(bytes[1])
}

fn check_header(bytes: &[u8], expected_type: MessageType, size: usize) -> Result<(), DecodeError> {
    let actual = peek_message_type(bytes)?;
    if actual != expected_type {
        return Err(DecodeError::UnexpectedMessageType {
            expected: expected_type,
            actual,
        });
    }
    if bytes.len() < size {
        return Err(DecodeError::TooShort {
            expected: size,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn header(message_type: MessageType, size: usize) -> Vec<u8> {
    let mut msg = Vec::with_capacity(size);
    msg.push(VERSION);
    msg.push(message_type as u8);
    msg
}

fn exchange_rate(external: &MarketBasis) -> Result<u16, EncodeError> {
    let rate = (external.price_increment() * 1000.0).round();
    if !(0.0..=f64::from(u16::MAX)).contains(&rate) {
        return Err(EncodeError::ExchangeRateOverflow(rate));
    }
    Ok(rate as u16)
}

fn currency_bytes(currency: &str) -> Result<[u8; 3], EncodeError> {
    let bytes = currency
        .chars()
        .map(|c| u8::try_from(c).ok())
        .collect::<Option<Vec<u8>>>()
        .and_then(|bytes| <[u8; 3]>::try_from(bytes).ok());
    bytes.ok_or_else(|| EncodeError::InvalidCurrency(currency.to_owned()))
}

/// Errors that can occur when reading a HAN message
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The message is shorter than its header announces
    #[error("message too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// The minimal length for the message
        expected: usize,
        /// The length received
        actual: usize,
    },
    /// The version byte is not one this codec speaks
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u8),
    /// A decoder for one kind of message was handed another
    #[error("expected a {expected:?} message, got {actual:?}")]
    UnexpectedMessageType {
        /// The type the decoder handles
        expected: MessageType,
        /// The type in the header
        actual: MessageType,
    },
    /// The message type byte names no message with a payload
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),
    /// A bid refers to a market basis that no price has announced
    #[error("unknown market basis reference {0}")]
    UnknownMarketRef(u8),
    /// The commodity byte is out of range
    #[error("unknown commodity {0}")]
    UnknownCommodity(u8),
    /// The points of a bid do not form a valid curve
    #[error("invalid bid: {0}")]
    InvalidBid(#[from] InvalidBid),
    /// The announced market basis cannot be constructed
    #[error("invalid market basis: {0}")]
    InvalidMarketBasis(#[from] MarketBasisError),
}

/// Errors that can occur when writing a HAN message
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    /// The currency is not three ISO-8859-1 characters
    #[error("currency {0:?} is not 3 ISO-8859-1 characters")]
    InvalidCurrency(String),
    /// The bid has more breakpoints than a message can carry
    #[error("{0} price points exceed the maximum of 255")]
    TooManyPoints(usize),
    /// The price of one wire step does not fit 16 bits
    #[error("exchange rate {0} does not fit 16 bits")]
    ExchangeRateOverflow(f64),
    /// The demand unit needed does not fit 16 bits
    #[error("demand unit {0} does not fit 16 bits")]
    DemandOverflow(f64),
    /// No wire basis can represent the market basis
    #[error("invalid market basis: {0}")]
    InvalidMarketBasis(#[from] MarketBasisError),
}
