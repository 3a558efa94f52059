use super::IOArgs;
use clap::Subcommand;

mod decode;
mod encode;

pub use decode::{DecodedMessage, decode};
pub use encode::{BidSpec, encode_bid, encode_price};

#[derive(Subcommand)]
pub enum Commands {
    /// Run one matching round over a scenario and report the aggregate and the prices
    Clear {
        #[command(flatten)]
        io: IOArgs,
    },

    /// Encode a price in the configured market as a HAN price message (hex)
    EncodePrice {
        /// The price to encode
        #[arg(short, long, allow_negative_numbers = true)]
        price: f64,
    },

    /// Encode a single agent's bid as a HAN bid message (hex)
    EncodeBid {
        #[command(flatten)]
        io: IOArgs,
    },

    /// Decode a hex HAN message and print it as JSON
    Decode {
        /// The message bytes, hex encoded
        message: String,
    },
}
