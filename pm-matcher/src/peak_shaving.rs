use parking_lot::Mutex;
use pm_core::{
    models::{BidInfo, PriceInfo},
    ports::MatchError,
};

/// The band a concentrator keeps the flow of its cluster in.
///
/// Demand above the ceiling or production below the floor (a floor is usually
/// negative) is shaved off the aggregate before it goes up, and a price that
/// would pull the cluster outside the band is moved back to the nearest price
/// that keeps it inside.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlowLimits {
    floor: f64,
    ceiling: f64,
}

impl FlowLimits {
    /// A band from `floor` to `ceiling`; either side may be infinite
    pub fn new(floor: f64, ceiling: f64) -> Result<Self, MatchError> {
        if floor.is_nan() || ceiling.is_nan() {
            return Err(MatchError::InvalidArgument("flow limits must be numbers"));
        }
        if floor > ceiling {
            return Err(MatchError::InvalidArgument("flow floor must not exceed the ceiling"));
        }
        Ok(Self { floor, ceiling })
    }

    /// No limits at all
    pub fn unbounded() -> Self {
        Self {
            floor: f64::NEG_INFINITY,
            ceiling: f64::INFINITY,
        }
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Flatten the curve wherever it leaves the band.
    ///
    /// Steps above the ceiling take the demand of the first step at or below
    /// it, steps below the floor take the demand of the last step at or above
    /// it. A curve entirely outside one side is flattened to its closest end.
    pub fn clip(&self, bid: &BidInfo) -> Result<BidInfo, MatchError> {
        let mut demand = bid.demand().to_vec();
        let Some(last) = demand.len().checked_sub(1) else {
            return Ok(bid.clone());
        };

        let start = self.first_within_ceiling(&demand).unwrap_or(last);
        let head = demand[start];
        demand[..start].fill(head);

        let end = self.last_within_floor(&demand).unwrap_or(0);
        let tail = demand[end];
        demand[end + 1..].fill(tail);

        Ok(BidInfo::from_demand(bid.market_basis().clone(), demand)?)
    }

    /// The price step that keeps `demand` within the band, starting from
    /// `step`. Inside the band this is `step` itself.
    fn steer(&self, demand: &[f64], step: usize) -> usize {
        let allocation = demand[step];
        if allocation > self.ceiling {
            self.first_within_ceiling(demand).unwrap_or(demand.len() - 1)
        } else if allocation < self.floor {
            self.last_within_floor(demand).unwrap_or(0)
        } else {
            step
        }
    }

    fn first_within_ceiling(&self, demand: &[f64]) -> Option<usize> {
        demand.iter().position(|d| *d <= self.ceiling)
    }

    fn last_within_floor(&self, demand: &[f64]) -> Option<usize> {
        demand.iter().rposition(|d| *d >= self.floor)
    }
}

impl Default for FlowLimits {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// The state a concentrator needs to keep its cluster within [`FlowLimits`].
///
/// The lock is only held while a bid or price is transformed, never while
/// calling out.
pub(crate) struct PeakShaver {
    limits: FlowLimits,
    state: Mutex<ShaverState>,
}

#[derive(Clone, Default)]
pub(crate) struct ShaverState {
    aggregate_in: Option<BidInfo>,
    price_out: Option<PriceInfo>,
    measured_flow: Option<f64>,
}

impl ShaverState {
    /// The part of the measured flow that the bids do not account for
    fn uncontrolled_flow(&self) -> Option<f64> {
        let measured = self.measured_flow?;
        let aggregate = self.aggregate_in.as_ref()?;
        let price = self.price_out.as_ref()?;
        Some(measured - aggregate.demand_at(price.current_price()))
    }
}

impl PeakShaver {
    pub fn new(limits: FlowLimits) -> Self {
        Self {
            limits,
            state: Mutex::default(),
        }
    }

    pub fn limits(&self) -> FlowLimits {
        self.limits
    }

    pub fn set_measured_flow(&self, flow: f64) -> Result<(), MatchError> {
        if !flow.is_finite() {
            return Err(MatchError::InvalidArgument("measured flow must be finite"));
        }
        self.state.lock().measured_flow = Some(flow);
        Ok(())
    }

    pub fn uncontrolled_flow(&self) -> Option<f64> {
        self.state.lock().uncontrolled_flow()
    }

    /// Clip an aggregate to the band, taking the uncontrolled flow into
    /// account. Returns the clipped bid and the state to restore should the
    /// parent refuse it.
    pub fn shave_bid(&self, aggregate: &BidInfo) -> Result<(BidInfo, ShaverState), MatchError> {
        let mut state = self.state.lock();
        let offset = state.uncontrolled_flow().unwrap_or(0.0);
        let shaved = self.limits.clip(&aggregate.transpose(offset))?.transpose(-offset);
        let previous = state.clone();
        state.aggregate_in = Some(aggregate.clone());
        Ok((shaved, previous))
    }

    pub fn restore(&self, previous: ShaverState) {
        *self.state.lock() = previous;
    }

    /// Move a price from the parent so that the cluster stays within the band.
    ///
    /// Before any aggregate has been seen the price passes through unchanged.
    pub fn steer_price(&self, price: PriceInfo) -> PriceInfo {
        let mut state = self.state.lock();
        let Some(aggregate) = state.aggregate_in.as_ref() else {
            state.price_out = Some(price.clone());
            return price;
        };

        let offset = state.uncontrolled_flow().unwrap_or(0.0);
        let demand = aggregate.transpose(offset);
        let basis = demand.market_basis();
        let step = basis.to_price_step(price.current_price());
        let steered = self.limits.steer(demand.demand(), step);

        let price = if steered == step {
            price
        } else {
            PriceInfo::new(price.market_basis().clone(), basis.to_price(steered))
        };
        state.price_out = Some(price.clone());
        price
    }
}
