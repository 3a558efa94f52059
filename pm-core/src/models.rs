mod bid;
mod market_basis;
mod price;

pub use bid::*;
pub use market_basis::*;
pub use price::*;
