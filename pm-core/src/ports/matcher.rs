use super::MatchError;
use crate::models::BidInfo;

/// The parent-facing side of a matching node.
///
/// Children (leaf agents, lower concentrators, or a transport adapter acting
/// on behalf of a remote peer) push their latest bid through this trait.
/// Implementations are called synchronously on the caller's thread and must
/// be safe to call from several threads at once.
pub trait MatcherService: Send + Sync {
    /// Submit the latest bid of the child identified by `child_id`.
    ///
    /// The bid replaces any previous bid of that child. An absent bid is
    /// rejected with [`MatchError::InvalidArgument`].
    ///
    /// # Returns
    ///
    /// - Ok(Some(aggregate)) with the aggregate bid the node produced
    /// - Ok(None) if the bid was ignored (e.g. the child is not bound)
    /// - Err otherwise, in which case the node is unchanged
    fn update_bid_info(
        &self,
        child_id: &str,
        bid: Option<BidInfo>,
    ) -> Result<Option<BidInfo>, MatchError>;
}
