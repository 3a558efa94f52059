use crate::Map;
use parking_lot::RwLock;
use pm_core::{
    models::{BidInfo, IncompatibleBasis, PriceInfo},
    ports::AgentService,
};
use std::sync::Arc;
use tracing::{Level, event};

/// The lifecycle of a matching node.
///
/// A node starts out [`Uninitialized`](NodeState::Uninitialized), becomes
/// [`Bound`](NodeState::Bound) once a child attaches, and
/// [`Active`](NodeState::Active) as soon as it has produced an aggregate or a
/// price. Once every child has detached again it is
/// [`Unbound`](NodeState::Unbound); binding a new child resumes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeState {
    /// No child was ever bound
    Uninitialized,
    /// Children are attached, nothing produced yet
    Bound,
    /// At least one aggregate or price was produced
    Active,
    /// All children detached after having been bound
    Unbound,
}

/// The bound children of a node.
#[derive(Default)]
pub(crate) struct Registry {
    inner: RwLock<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    children: Map<String, Arc<dyn AgentService>>,
    ever_bound: bool,
}

impl Registry {
    /// Attach a child, replacing any child with the same id
    pub fn bind(&self, node_id: &str, child: Arc<dyn AgentService>) {
        let child_id = child.id().to_owned();
        let mut inner = self.inner.write();
        if inner.children.insert(child_id.clone(), child).is_some() {
            event!(Level::DEBUG, node = node_id, child = child_id.as_str(), "child rebound");
        } else {
            event!(Level::DEBUG, node = node_id, child = child_id.as_str(), "child bound");
        }
        inner.ever_bound = true;
    }

    /// Detach a child, returning whether it was bound
    pub fn unbind(&self, node_id: &str, child_id: &str) -> bool {
        let removed = self.inner.write().children.shift_remove(child_id).is_some();
        if removed {
            event!(Level::DEBUG, node = node_id, child = child_id, "child unbound");
        }
        removed
    }

    pub fn contains(&self, child_id: &str) -> bool {
        self.inner.read().children.contains_key(child_id)
    }

    /// The ids of the bound children, in binding order
    pub fn ids(&self) -> Vec<String> {
        self.inner.read().children.keys().cloned().collect()
    }

    /// A copy of the bound children, so that callbacks run without the lock held
    pub fn snapshot(&self) -> Vec<Arc<dyn AgentService>> {
        self.inner.read().children.values().cloned().collect()
    }

    /// Derive the lifecycle state, given whether the node has produced anything
    pub fn state(&self, produced: bool) -> NodeState {
        let inner = self.inner.read();
        match (inner.children.is_empty(), inner.ever_bound, produced) {
            (true, false, _) => NodeState::Uninitialized,
            (true, true, _) => NodeState::Unbound,
            (false, _, false) => NodeState::Bound,
            (false, _, true) => NodeState::Active,
        }
    }

    /// Relay a price to every bound child.
    ///
    /// A child that refuses the price is logged and skipped; its siblings
    /// still receive it.
    pub fn relay(&self, node_id: &str, price: &PriceInfo) {
        for child in self.snapshot() {
            if let Err(err) = child.update_price_info(Some(price.clone())) {
                event!(
                    Level::WARN,
                    node = node_id,
                    child = child.id(),
                    err = err.to_string(),
                    "child rejected price"
                );
            }
        }
    }
}

/// The latest bid of every child that has bid.
#[derive(Default)]
pub(crate) struct BidBook {
    bids: Map<String, BidInfo>,
}

impl BidBook {
    /// The aggregate the book would hold if `bid` replaced the bid of `child_id`.
    ///
    /// The book itself is left untouched, so a failure here changes nothing.
    pub fn aggregate_with(&self, child_id: &str, bid: &BidInfo) -> Result<BidInfo, IncompatibleBasis> {
        self.bids
            .iter()
            .filter(|(id, _)| id.as_str() != child_id)
            .try_fold(bid.clone(), |acc, (_, other)| acc.aggregate(other))
    }

    /// Store a bid, returning the one it replaced
    pub fn insert(&mut self, child_id: &str, bid: BidInfo) -> Option<BidInfo> {
        self.bids.insert(child_id.to_owned(), bid)
    }

    /// Undo an [`BidBook::insert`]
    pub fn restore(&mut self, child_id: &str, previous: Option<BidInfo>) {
        match previous {
            Some(bid) => {
                self.bids.insert(child_id.to_owned(), bid);
            }
            None => {
                self.bids.shift_remove(child_id);
            }
        }
    }

    pub fn remove(&mut self, child_id: &str) -> Option<BidInfo> {
        self.bids.shift_remove(child_id)
    }

    #[cfg(test)]
    pub fn get(&self, child_id: &str) -> Option<&BidInfo> {
        self.bids.get(child_id)
    }
}
