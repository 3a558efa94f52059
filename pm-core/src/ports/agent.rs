use super::MatchError;
use crate::models::PriceInfo;

/// The child-facing side of a matching node.
///
/// A parent relays every price it publishes to each of its bound children
/// through this trait. An implementation may read the accessors of its parent
/// while handling a price, but must not bid back into it from there.
pub trait AgentService: Send + Sync {
    /// The identifier this child bids under
    fn id(&self) -> &str;

    /// Receive the latest price of the parent.
    ///
    /// An absent price is rejected, and leaves the previously received price in place.
    fn update_price_info(&self, price: Option<PriceInfo>) -> Result<(), MatchError>;
}
