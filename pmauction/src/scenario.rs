use crate::CliError;
use indexmap::IndexMap;
use parking_lot::Mutex;
use pm_core::{
    models::{BidCurve, BidInfo, MarketBasis, PriceInfo, PricePoint},
    ports::{AgentService, MatchError, MatcherService as _},
};
use pm_matcher::{Auctioneer, Concentrator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{Level, event};

/// A single matching round: some agents, each with one bid, under one
/// concentrator and one auctioneer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Scenario {
    /// The basis all bids are expressed in (defaults to the configured market)
    #[serde(default)]
    pub market: Option<Arc<MarketBasis>>,
    pub agents: Vec<AgentSpec>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentSpec {
    pub id: String,
    #[serde(flatten)]
    pub curve: AgentCurve,
}

/// Either one demand value per price step, or the breakpoints of a step function
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum AgentCurve {
    Demand { demand: Vec<f64> },
    Points { points: Vec<PricePoint> },
}

impl From<AgentCurve> for BidCurve {
    fn from(value: AgentCurve) -> Self {
        match value {
            AgentCurve::Demand { demand } => BidCurve::Dense(demand),
            AgentCurve::Points { points } => BidCurve::Sparse(points),
        }
    }
}

/// What a round produced
#[derive(Debug, Serialize)]
pub struct ClearingOutcome {
    /// The aggregate bid the auctioneer cleared
    pub aggregate: BidInfo,
    /// The price the auctioneer published
    pub price: Option<PriceInfo>,
    /// The price each agent observed last, by agent id
    pub prices: IndexMap<String, Option<f64>>,
}

impl Scenario {
    /// Assemble the tree, submit every bid in order and collect the result
    pub fn run(self, default_market: &Arc<MarketBasis>) -> anyhow::Result<ClearingOutcome> {
        if self.agents.is_empty() {
            return Err(CliError::NoAgents.into());
        }
        let market = self.market.unwrap_or_else(|| default_market.clone());

        let auctioneer = Arc::new(Auctioneer::new("auctioneer"));
        let concentrator = Arc::new(Concentrator::new("concentrator", auctioneer.clone()));
        auctioneer.bind(concentrator.clone());

        let mut agents = IndexMap::new();
        for spec in &self.agents {
            let agent = Arc::new(ScenarioAgent::new(&spec.id));
            if agents.insert(spec.id.clone(), agent.clone()).is_some() {
                return Err(CliError::DuplicateAgent(spec.id.clone()).into());
            }
            concentrator.bind(agent);
        }

        for AgentSpec { id, curve } in self.agents {
            let bid = BidInfo::new(market.clone(), curve)?;
            event!(Level::DEBUG, agent = id.as_str(), "submitting bid");
            concentrator.update_bid_info(&id, Some(bid))?;
        }

        let aggregate = auctioneer
            .last_aggregated_bid()
            .ok_or(CliError::NoAgents)?;
        let price = auctioneer.last_published_price_info();
        let prices = agents
            .into_iter()
            .map(|(id, agent)| (id, agent.last_price().map(|price| price.current_price())))
            .collect();

        Ok(ClearingOutcome {
            aggregate,
            price,
            prices,
        })
    }
}

/// A leaf that only remembers the last price it was sent
struct ScenarioAgent {
    id: String,
    last: Mutex<Option<PriceInfo>>,
}

impl ScenarioAgent {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_owned(),
            last: Mutex::default(),
        }
    }

    fn last_price(&self) -> Option<PriceInfo> {
        self.last.lock().clone()
    }
}

impl AgentService for ScenarioAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn update_price_info(&self, price: Option<PriceInfo>) -> Result<(), MatchError> {
        let price = price.ok_or(MatchError::InvalidArgument("price must not be absent"))?;
        *self.last.lock() = Some(price);
        Ok(())
    }
}
