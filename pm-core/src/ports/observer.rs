use crate::models::{BidInfo, PriceInfo};

/// Receives notifications about what a node produces, purely for recording.
///
/// Observers are notified after the node has committed its new state. They
/// cannot return errors and therefore cannot fail a clearing round; they
/// should return quickly, since they run inline on the caller's thread.
///
/// A callback may read the accessors of any node, including the one
/// notifying it. It must not submit a bid or a price into that node.
pub trait MatcherObserver: Send + Sync {
    /// A node computed a new aggregated bid
    fn aggregated_bid(&self, node_id: &str, bid: &BidInfo) {
        let _ = (node_id, bid);
    }

    /// A node published a new price to its children
    fn published_price(&self, node_id: &str, price: &PriceInfo) {
        let _ = (node_id, price);
    }
}

/// An observer that ignores everything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopObserver;

impl MatcherObserver for NoopObserver {}
