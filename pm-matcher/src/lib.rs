//! Tree nodes of a hierarchical demand-response market.
//!
//! A [`Concentrator`] sums the bids of its children into one bid for its
//! parent and relays the prices it receives back down. An [`Auctioneer`] is
//! the root: it clears the aggregate bid of its children into a price using a
//! [`ClearingRule`](pm_core::ports::ClearingRule), by default [`ZeroCrossing`].
//!
//! A concentrator given [`FlowLimits`] shaves the peaks of its cluster: the
//! bid it sends up is clipped to the limits, and prices coming down are moved
//! back inside them.
//!
//! Every operation runs synchronously on the caller's thread. A bid submitted
//! by a leaf travels up the tree, and the price it triggers travels back down,
//! within that one call.

/**
 * The default clearing rule.
 */
mod clearing;
pub use clearing::ZeroCrossing;

/**
 * The node implementations and the bookkeeping they share.
 */
mod auctioneer;
mod concentrator;
mod node;
pub use auctioneer::Auctioneer;
pub use concentrator::Concentrator;
pub use node::NodeState;

/**
 * Keeping a cluster within flow limits.
 */
mod peak_shaving;
pub use peak_shaving::FlowLimits;

// We use non-std collections here for their ordering semantics and performance
pub(crate) type Map<K, V> = indexmap::IndexMap<K, V, rustc_hash::FxBuildHasher>;
