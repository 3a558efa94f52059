#![allow(dead_code)]

use parking_lot::Mutex;
use pm_core::{
    models::{BidInfo, MarketBasis, PriceInfo},
    ports::{AgentService, MatchError, MatcherService},
};
use pm_matcher::{Auctioneer, Concentrator};
use std::sync::Arc;

/// A leaf that remembers every price it is sent
#[derive(Debug)]
pub struct RecordingAgent {
    id: String,
    pub prices: Mutex<Vec<PriceInfo>>,
}

impl RecordingAgent {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_owned(),
            prices: Mutex::default(),
        })
    }

    pub fn last_price(&self) -> Option<PriceInfo> {
        self.prices.lock().last().cloned()
    }
}

impl AgentService for RecordingAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn update_price_info(&self, price: Option<PriceInfo>) -> Result<(), MatchError> {
        let price = price.ok_or(MatchError::InvalidArgument("price must not be absent"))?;
        self.prices.lock().push(price);
        Ok(())
    }
}

/// A parent that refuses everything
pub struct RejectingParent;

impl MatcherService for RejectingParent {
    fn update_bid_info(&self, _: &str, _: Option<BidInfo>) -> Result<Option<BidInfo>, MatchError> {
        Err(MatchError::InvalidArgument("rejected"))
    }
}

pub fn basis(steps: usize, min: f64, max: f64) -> Arc<MarketBasis> {
    Arc::new(MarketBasis::new("electricity", "EUR", steps, min, max, 0).unwrap())
}

pub fn bid(basis: &Arc<MarketBasis>, demand: &[f64]) -> BidInfo {
    BidInfo::from_demand(basis.clone(), demand.to_vec()).unwrap()
}

/// An auctioneer with a single concentrator and `agents` leaves under it
pub struct Tree {
    pub auctioneer: Arc<Auctioneer>,
    pub concentrator: Arc<Concentrator>,
    pub agents: Vec<Arc<RecordingAgent>>,
}

impl Tree {
    pub fn new(agents: usize) -> Self {
        let auctioneer = Arc::new(Auctioneer::new("auctioneer"));
        let concentrator = Arc::new(Concentrator::new("concentrator", auctioneer.clone()));
        auctioneer.bind(concentrator.clone());

        let agents = (0..agents)
            .map(|i| {
                let agent = RecordingAgent::new(&format!("agent-{i}"));
                concentrator.bind(agent.clone());
                agent
            })
            .collect();

        Self {
            auctioneer,
            concentrator,
            agents,
        }
    }

    pub fn submit(&self, agent: usize, bid: BidInfo) -> Result<Option<BidInfo>, MatchError> {
        self.concentrator
            .update_bid_info(self.agents[agent].id(), Some(bid))
    }
}
