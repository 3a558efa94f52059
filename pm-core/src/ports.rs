mod agent;
mod clearing;
mod matcher;
mod observer;

pub use agent::AgentService;
pub use clearing::ClearingRule;
pub use matcher::MatcherService;
pub use observer::{MatcherObserver, NoopObserver};

use crate::models::{IncompatibleBasis, InvalidBid};

/// Errors returned by the operations of a matching node.
///
/// Every error is reported to the immediate caller only. A node that returns
/// an error has not changed any of its state.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// The bid could not be constructed or validated
    #[error("invalid bid: {0}")]
    InvalidBid(#[from] InvalidBid),
    /// The bid cannot be aggregated with the bids already held
    #[error(transparent)]
    IncompatibleBasis(#[from] IncompatibleBasis),
    /// A required bid or price was absent
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}
