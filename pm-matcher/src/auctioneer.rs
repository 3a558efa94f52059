use crate::{
    ZeroCrossing,
    node::{BidBook, NodeState, Registry},
};
use parking_lot::{Mutex, RwLock};
use pm_core::{
    models::{BidInfo, PriceInfo},
    ports::{AgentService, ClearingRule, MatchError, MatcherObserver, MatcherService, NoopObserver},
};
use std::sync::Arc;
use tracing::{Level, event};

/// The root of a matching tree.
///
/// The auctioneer aggregates the bids of its children (normally a single
/// concentrator), clears the aggregate into a price and publishes that price
/// back down, all within the call that delivered the bid.
pub struct Auctioneer {
    id: String,
    rule: Box<dyn ClearingRule>,
    observer: Arc<dyn MatcherObserver>,
    children: Registry,
    // held across store -> aggregate -> clear -> publish
    bids: Mutex<BidBook>,
    // held across relay -> record
    relaying: Mutex<()>,
    // never held while calling out
    status: RwLock<Status>,
}

#[derive(Default)]
struct Status {
    last_aggregated: Option<BidInfo>,
    last_published_price: Option<PriceInfo>,
}

impl Auctioneer {
    /// Create an auctioneer that clears at zero aggregate demand
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rule: Box::new(ZeroCrossing::default()),
            observer: Arc::new(NoopObserver),
            children: Registry::default(),
            bids: Mutex::default(),
            relaying: Mutex::default(),
            status: RwLock::default(),
        }
    }

    /// Replace the clearing rule
    pub fn with_clearing_rule(mut self, rule: impl ClearingRule + 'static) -> Self {
        self.rule = Box::new(rule);
        self
    }

    /// Attach an observer that is told about every aggregate and price
    pub fn with_observer(mut self, observer: Arc<dyn MatcherObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Attach a child; its bids are aggregated and it receives every price
    pub fn bind(&self, child: Arc<dyn AgentService>) {
        self.children.bind(&self.id, child);
    }

    /// Detach a child and forget its bid
    pub fn unbind(&self, child_id: &str) -> bool {
        let removed = self.children.unbind(&self.id, child_id);
        self.bids.lock().remove(child_id);
        removed
    }

    /// Publish a price to every bound child.
    ///
    /// An absent price clears the last published price and is not sent to
    /// anyone. A present price is sent as-is, even if it lies outside the
    /// range of its basis.
    pub fn publish_price_info(&self, price: Option<PriceInfo>) -> Option<PriceInfo> {
        let _turn = self.relaying.lock();
        let Some(price) = price else {
            event!(Level::DEBUG, node = %self.id, "cleared published price");
            self.status.write().last_published_price = None;
            return None;
        };
        self.children.relay(&self.id, &price);
        event!(
            Level::INFO,
            node = %self.id,
            price = price.current_price(),
            "published price"
        );
        self.status.write().last_published_price = Some(price.clone());
        self.observer.published_price(&self.id, &price);
        Some(price)
    }

    /// The sum of the latest bids of all children
    pub fn last_aggregated_bid(&self) -> Option<BidInfo> {
        self.status.read().last_aggregated.clone()
    }

    /// The last price sent to the children
    pub fn last_published_price_info(&self) -> Option<PriceInfo> {
        self.status.read().last_published_price.clone()
    }

    /// The ids of the bound children
    pub fn children(&self) -> Vec<String> {
        self.children.ids()
    }

    /// Where this node is in its lifecycle; it counts as active once it has
    /// aggregated a bid or published a price
    pub fn state(&self) -> NodeState {
        let produced = {
            let status = self.status.read();
            status.last_aggregated.is_some() || status.last_published_price.is_some()
        };
        self.children.state(produced)
    }
}

impl MatcherService for Auctioneer {
    fn update_bid_info(
        &self,
        child_id: &str,
        bid: Option<BidInfo>,
    ) -> Result<Option<BidInfo>, MatchError> {
        let bid = bid.ok_or(MatchError::InvalidArgument("bid must not be absent"))?;

        let mut book = self.bids.lock();
        if !self.children.contains(child_id) {
            event!(Level::WARN, node = %self.id, child = child_id, "ignoring bid from unbound child");
            return Ok(None);
        }
        event!(Level::DEBUG, node = %self.id, child = child_id, "bid received");

        let aggregate = book.aggregate_with(child_id, &bid)?;
        book.insert(child_id, bid);
        self.status.write().last_aggregated = Some(aggregate.clone());
        self.observer.aggregated_bid(&self.id, &aggregate);

        let price = self.rule.clear(&aggregate);
        self.publish_price_info(Some(price));
        Ok(Some(aggregate))
    }
}

impl std::fmt::Debug for Auctioneer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auctioneer")
            .field("id", &self.id)
            .field("children", &self.children.ids())
            .finish_non_exhaustive()
    }
}
