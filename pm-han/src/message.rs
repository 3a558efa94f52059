use crate::DecodeError;

/// The only protocol version this crate speaks
pub const VERSION: u8 = 1;

/// Version byte plus message type byte
pub const HEADER_SIZE: usize = 2;

/// The fixed size of a price message
pub const PRICE_MESSAGE_SIZE: usize = HEADER_SIZE + 8;

/// The size of a bid message without any points
pub const BID_HEADER_SIZE: usize = HEADER_SIZE + 4;

/// The number of steps of every wire basis
pub const PRICE_STEPS: usize = 255;

/// The largest normalized price that fits the wire basis
pub const MAXIMUM_NORMALIZED_PRICE: i32 = 127;

/// The kind of payload that follows the header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Reserved, never carries a payload
    Undefined = 0,
    /// A price message
    Price = 1,
    /// A bid message
    Bid = 2,
}

impl TryFrom<u8> for MessageType {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Undefined),
            1 => Ok(Self::Price),
            2 => Ok(Self::Bid),
            other => Err(DecodeError::UnknownMessageType(other)),
        }
    }
}

/// The commodities the wire format can name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Commodity {
    /// Anything not listed below
    Undefined = 0,
    /// Electrical energy
    Electricity = 1,
}

impl Commodity {
    /// The commodity named by a market basis; unknown names map to `Undefined`
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("electricity") {
            Self::Electricity
        } else {
            Self::Undefined
        }
    }

    /// The name used in a market basis
    pub fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Electricity => "electricity",
        }
    }
}

impl TryFrom<u8> for Commodity {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Undefined),
            1 => Ok(Self::Electricity),
            other => Err(DecodeError::UnknownCommodity(other)),
        }
    }
}
