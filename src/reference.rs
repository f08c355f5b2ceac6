use crate::{
    ident::{NodeId, StreamId},
    network::{ConfigError, Network, NodeDesc},
    routing::{Destination, Row, RoutingTable},
    statistic::Statistic,
    theory::Mm1,
    time::Time,
    units::Rate,
    variate::Sampler,
};

pub const ACCESS_POINTS: usize = 4;
pub const SWITCH: NodeId = NodeId::new(5);

pub const ARRIVAL_RATE: Rate = Rate::new(5.0);
pub const AP_RATE: Rate = Rate::new(0.3328);
pub const SWITCH_RATE: Rate = Rate::new(46.137344);

// Bounded-Pareto supports
pub const AP_BOUNDS: (f64, f64) = (0.3756009615, 8.756197416);
pub const SWITCH_BOUNDS: (f64, f64) = (0.002709302035, 0.0631606037);

pub const TRANSIENT_SHAPE: f64 = 0.5;
pub const STEADY_SHAPE: f64 = 1.5;

pub const AP_CAPACITY: u64 = 10;

pub const ARRIVAL_STREAM: StreamId = StreamId::new(0);
pub const AP_STREAM: StreamId = StreamId::new(1);
pub const SWITCH_STREAM: StreamId = StreamId::new(2);

const AP_SHARE: f64 = 1.0 / 20.0;

pub fn access_points() -> Vec<NodeId> {
    (1..=ACCESS_POINTS).map(NodeId::new).collect()
}

pub fn routing() -> RoutingTable {
    let mut entries: Vec<(Destination, f64)> = access_points()
        .into_iter()
        .map(|ap| (Destination::Node(ap), AP_SHARE))
        .collect();
    entries.push((
        Destination::Node(SWITCH),
        1.0 - ACCESS_POINTS as f64 * AP_SHARE,
    ));
    let mut nodes = vec![Row::deterministic(Destination::Node(SWITCH)); ACCESS_POINTS];
    nodes.push(Row::deterministic(Destination::Exit));
    RoutingTable::new(Row::from_probabilities(entries), nodes).expect("invalid reference routing")
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ServiceModel {
    Exponential { ap: Rate, switch: Rate },
    /// Bounded-Pareto service on [`AP_BOUNDS`] and [`SWITCH_BOUNDS`].
    BoundedPareto { shape: f64 },
}

impl ServiceModel {
    pub const EXPONENTIAL: ServiceModel = ServiceModel::Exponential {
        ap: AP_RATE,
        switch: SWITCH_RATE,
    };

    fn samplers(&self) -> (Sampler, Sampler) {
        match *self {
            ServiceModel::Exponential { ap, switch } => (
                Sampler::exponential(ap.mean().into_f64(), AP_STREAM),
                Sampler::exponential(switch.mean().into_f64(), SWITCH_STREAM),
            ),
            ServiceModel::BoundedPareto { shape } => (
                Sampler::bounded_pareto(shape, AP_BOUNDS.0, AP_BOUNDS.1, AP_STREAM),
                Sampler::bounded_pareto(shape, SWITCH_BOUNDS.0, SWITCH_BOUNDS.1, SWITCH_STREAM),
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct Reference {
    pub service: ServiceModel,
    #[builder(default = ARRIVAL_RATE)]
    pub arrival: Rate,
    #[builder(setter(into))]
    pub horizon: Time,
    /// Capacity of each access point. The switch never refuses.
    #[builder(default, setter(strip_option))]
    pub ap_capacity: Option<u64>,
}

impl Reference {
    pub fn network(&self) -> Result<Network, ConfigError> {
        let (ap, switch) = self.service.samplers();
        let mut nodes: Vec<NodeDesc> = access_points()
            .into_iter()
            .map(|id| NodeDesc {
                name: format!("ap{}", id),
                service: ap,
                capacity: self.ap_capacity,
            })
            .collect();
        nodes.push(
            NodeDesc::builder()
                .name("switch")
                .service(switch)
                .build(),
        );
        Network::builder()
            .routing(routing())
            .nodes(nodes)
            .arrival(Sampler::exponential(
                self.arrival.mean().into_f64(),
                ARRIVAL_STREAM,
            ))
            .horizon(self.horizon)
            .build()
    }
}

/// Wait of a user crossing one access point and then the switch, access points weighted by
/// their share of the traffic.
pub fn user_wait() -> Statistic {
    Statistic::access_wait(&routing(), &access_points(), SWITCH)
}

/// Closed-form values of the exponential reference network, each node treated as M/M/1.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Expectations {
    pub ap_utilization: f64,
    pub switch_utilization: f64,
    pub ap_delay: f64,
    pub switch_delay: f64,
    pub ap_response: f64,
    pub switch_response: f64,
    /// E(Tq) and E(Ts) weighted by the share of traffic entering each node.
    pub delay: f64,
    pub response: f64,
    pub in_queue: f64,
    pub in_system: f64,
    pub user_response: f64,
}

impl Expectations {
    pub fn new(arrival: Rate, ap: Rate, switch: Rate) -> Option<Self> {
        let ap_q = Mm1::new(arrival.scale_by(AP_SHARE), ap);
        let sw_q = Mm1::new(arrival, switch);
        let ap_share = ACCESS_POINTS as f64 * AP_SHARE;
        let sw_share = 1.0 - ap_share;
        let (ap_delay, switch_delay) = (ap_q.queue_delay()?, sw_q.queue_delay()?);
        let (ap_response, switch_response) = (ap_q.response()?, sw_q.response()?);
        let delay = ap_delay * ap_share + switch_delay * sw_share;
        let response = ap_response * ap_share + switch_response * sw_share;
        Some(Self {
            ap_utilization: ap_q.utilization(),
            switch_utilization: sw_q.utilization(),
            ap_delay,
            switch_delay,
            ap_response,
            switch_response,
            delay,
            response,
            in_queue: delay * arrival.into_f64(),
            in_system: response * arrival.into_f64(),
            user_response: ap_response + switch_response,
        })
    }

    pub fn reference() -> Option<Self> {
        Self::new(ARRIVAL_RATE, AP_RATE, SWITCH_RATE)
    }
}
