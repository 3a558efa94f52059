use crate::{
    FlowLimits,
    node::{BidBook, NodeState, Registry},
    peak_shaving::PeakShaver,
};
use parking_lot::{Mutex, RwLock};
use pm_core::{
    models::{BidInfo, PriceInfo},
    ports::{AgentService, MatchError, MatcherObserver, MatcherService, NoopObserver},
};
use std::sync::Arc;
use tracing::{Level, event};

/// An intermediate node: aggregates the bids of its children for its parent,
/// and relays the parent's prices back down.
///
/// A concentrator is a [`MatcherService`] towards its children and an
/// [`AgentService`] towards its parent, so concentrators nest to any depth.
/// With [`FlowLimits`] it also shaves peaks: the bid it sends up is clipped to
/// the limits, and prices coming down are moved so that its cluster stays
/// within them.
pub struct Concentrator {
    id: String,
    parent: Arc<dyn MatcherService>,
    observer: Arc<dyn MatcherObserver>,
    shaver: Option<PeakShaver>,
    children: Registry,
    // held across store -> aggregate -> forward, in that order
    bids: Mutex<BidBook>,
    // held across record -> relay
    relaying: Mutex<()>,
    // never held while calling out, so accessors work from any callback
    status: RwLock<Status>,
}

#[derive(Default)]
struct Status {
    last_aggregated: Option<BidInfo>,
    last_published_bid: Option<BidInfo>,
    last_received_price: Option<PriceInfo>,
    last_published_price: Option<PriceInfo>,
}

impl Concentrator {
    /// Create a concentrator that reports to `parent`.
    ///
    /// The concentrator does not bind itself to the parent; whoever assembles
    /// the tree does that, so that the parent can relay prices back down.
    pub fn new(id: impl Into<String>, parent: Arc<dyn MatcherService>) -> Self {
        Self {
            id: id.into(),
            parent,
            observer: Arc::new(NoopObserver),
            shaver: None,
            children: Registry::default(),
            bids: Mutex::default(),
            relaying: Mutex::default(),
            status: RwLock::default(),
        }
    }

    /// Attach an observer that is told about every aggregate and price
    pub fn with_observer(mut self, observer: Arc<dyn MatcherObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Keep the flow of this cluster within `limits`
    pub fn with_flow_limits(mut self, limits: FlowLimits) -> Self {
        self.shaver = Some(PeakShaver::new(limits));
        self
    }

    /// The limits this concentrator shaves to, if any
    pub fn flow_limits(&self) -> Option<FlowLimits> {
        self.shaver.as_ref().map(PeakShaver::limits)
    }

    /// Report the flow actually measured for this cluster.
    ///
    /// The difference between the measurement and what the bids predicted at
    /// the last price is treated as uncontrollable, and shifts the limits the
    /// next bid and price are shaved to. Without flow limits this is an error.
    pub fn set_measured_flow(&self, flow: f64) -> Result<(), MatchError> {
        let shaver = self
            .shaver
            .as_ref()
            .ok_or(MatchError::InvalidArgument("concentrator has no flow limits"))?;
        shaver.set_measured_flow(flow)?;
        event!(Level::DEBUG, node = %self.id, flow, "measured flow updated");
        Ok(())
    }

    /// The measured flow the bids do not account for, once a measurement,
    /// an aggregate and a price are all known
    pub fn uncontrolled_flow(&self) -> Option<f64> {
        self.shaver.as_ref().and_then(PeakShaver::uncontrolled_flow)
    }

    /// Attach a child; its bids are aggregated and it receives every price
    pub fn bind(&self, child: Arc<dyn AgentService>) {
        self.children.bind(&self.id, child);
    }

    /// Detach a child and forget its bid.
    ///
    /// The current aggregate is not recomputed; the bid simply no longer
    /// takes part in the next one.
    pub fn unbind(&self, child_id: &str) -> bool {
        let removed = self.children.unbind(&self.id, child_id);
        self.bids.lock().remove(child_id);
        removed
    }

    /// Forward a bid to the parent on behalf of this node
    pub fn publish_bid_update(&self, bid: BidInfo) -> Result<BidInfo, MatchError> {
        let _book = self.bids.lock();
        self.forward(bid)
    }

    /// Relay a price, unchanged, to every bound child
    pub fn publish_price_info(&self, price: PriceInfo) -> PriceInfo {
        let _turn = self.relaying.lock();
        self.relay(price)
    }

    fn forward(&self, bid: BidInfo) -> Result<BidInfo, MatchError> {
        match self.parent.update_bid_info(&self.id, Some(bid.clone()))? {
            Some(_) => {
                event!(Level::DEBUG, node = %self.id, "published aggregated bid");
                self.status.write().last_published_bid = Some(bid.clone());
            }
            None => {
                event!(Level::WARN, node = %self.id, "parent ignored bid, not bound to it");
            }
        }
        Ok(bid)
    }

    fn relay(&self, price: PriceInfo) -> PriceInfo {
        self.children.relay(&self.id, &price);
        event!(
            Level::INFO,
            node = %self.id,
            price = price.current_price(),
            "published price"
        );
        self.status.write().last_published_price = Some(price.clone());
        self.observer.published_price(&self.id, &price);
        price
    }

    /// The sum of the latest bids of all children
    pub fn last_aggregated_bid(&self) -> Option<BidInfo> {
        self.status.read().last_aggregated.clone()
    }

    /// The last bid accepted by the parent; with flow limits, the clipped one
    pub fn last_published_bid(&self) -> Option<BidInfo> {
        self.status.read().last_published_bid.clone()
    }

    /// The last price received from the parent
    pub fn last_price_info(&self) -> Option<PriceInfo> {
        self.status.read().last_received_price.clone()
    }

    /// The last price relayed to the children
    pub fn last_published_price_info(&self) -> Option<PriceInfo> {
        self.status.read().last_published_price.clone()
    }

    /// The ids of the bound children
    pub fn children(&self) -> Vec<String> {
        self.children.ids()
    }

    /// Where this node is in its lifecycle; it counts as active once it has
    /// aggregated a bid or received a price
    pub fn state(&self) -> NodeState {
        let produced = {
            let status = self.status.read();
            status.last_aggregated.is_some() || status.last_received_price.is_some()
        };
        self.children.state(produced)
    }
}

impl MatcherService for Concentrator {
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
        let (outgoing, shaved) = match &self.shaver {
            Some(shaver) => {
                let (outgoing, previous) = shaver.shave_bid(&aggregate)?;
                (outgoing, Some(previous))
            }
            None => (aggregate.clone(), None),
        };

        let previous = book.insert(child_id, bid);
        if let Err(err) = self.forward(outgoing) {
            event!(Level::DEBUG, node = %self.id, err = err.to_string(), "parent rejected bid");
            book.restore(child_id, previous);
            if let (Some(shaver), Some(shaved)) = (&self.shaver, shaved) {
                shaver.restore(shaved);
            }
            return Err(err);
        }
        self.status.write().last_aggregated = Some(aggregate.clone());
        drop(book);

        self.observer.aggregated_bid(&self.id, &aggregate);
        Ok(Some(aggregate))
    }
}

impl AgentService for Concentrator {
    fn id(&self) -> &str {
        &self.id
    }

    fn update_price_info(&self, price: Option<PriceInfo>) -> Result<(), MatchError> {
        let price = price.ok_or(MatchError::InvalidArgument("price must not be absent"))?;
        let _turn = self.relaying.lock();
        self.status.write().last_received_price = Some(price.clone());

        let price = match &self.shaver {
            Some(shaver) => shaver.steer_price(price),
            None => price,
        };
        self.relay(price);
        Ok(())
    }
}

impl std::fmt::Debug for Concentrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Concentrator")
            .field("id", &self.id)
            .field("children", &self.children.ids())
            .field("flow_limits", &self.flow_limits())
            .finish_non_exhaustive()
    }
}
