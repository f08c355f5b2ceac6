use crate::{
    ident::{NodeId, StreamId},
    replication::Reseed,
    routing::RoutingTable,
    time::Time,
    variate::{Sampler, Variate},
};

#[derive(Debug, Clone, PartialEq, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct NodeDesc {
    #[builder(default, setter(into))]
    #[serde(default)]
    pub name: String,
    pub service: Sampler,
    /// The largest queue length at which arrivals are still admitted. `None` admits everything.
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub capacity: Option<u64>,
}

/// A validated network model: routing, service nodes, the arrival process and the time after
/// which no more external arrivals are admitted.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
#[builder(build_method(vis = "", name = __build))]
pub struct Network {
    pub(crate) routing: RoutingTable,
    pub(crate) nodes: Vec<NodeDesc>,
    pub(crate) arrival: Sampler,
    #[builder(setter(into))]
    pub(crate) horizon: Time,
    // Stream used for routing draws; the arrival stream unless configured
    #[builder(default, setter(strip_option))]
    pub(crate) routing_stream: Option<StreamId>,
}

#[allow(non_camel_case_types)]
impl<__routing_stream: typed_builder::Optional<Option<StreamId>>>
    NetworkBuilder<(
        (RoutingTable,),
        (Vec<NodeDesc>,),
        (Sampler,),
        (Time,),
        __routing_stream,
    )>
{
    pub fn build(self) -> Result<Network, ConfigError> {
        let network = self.__build();
        network.validate()?;
        Ok(network)
    }
}

impl Network {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn node(&self, id: NodeId) -> &NodeDesc {
        &self.nodes[id.slot()]
    }

    pub fn nodes(&self) -> &[NodeDesc] {
        &self.nodes
    }

    pub fn horizon(&self) -> Time {
        self.horizon
    }

    pub fn arrival(&self) -> &Sampler {
        &self.arrival
    }

    pub fn routing_stream(&self) -> StreamId {
        self.routing_stream.unwrap_or(self.arrival.stream)
    }

    pub fn is_blocking(&self) -> bool {
        self.nodes.iter().any(|n| n.capacity.is_some())
    }

    pub fn with_horizon(&self, horizon: Time) -> Result<Self, ConfigError> {
        let mut network = self.clone();
        network.horizon = horizon;
        network.validate()?;
        Ok(network)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.routing.node_count() != self.nodes.len() {
            return Err(ConfigError::NodeCount {
                expected: self.routing.node_count(),
                found: self.nodes.len(),
            });
        }
        if self.horizon.into_f64().is_nan() || self.horizon <= Time::ZERO {
            return Err(ConfigError::Horizon(self.horizon.into_f64()));
        }
        self.arrival.variate.validate()?;
        for (i, node) in self.nodes.iter().enumerate() {
            node.service.variate.validate()?;
            if node.capacity == Some(0) {
                return Err(ConfigError::Capacity {
                    node: NodeId::new(i + 1),
                });
            }
        }
        Ok(())
    }
}

/// Errors in a model or estimator configuration. These are fatal at setup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("routing row of node {from} sums to {total}, not 1")]
    RoutingSum { from: NodeId, total: f64 },

    #[error("routing row of node {from} is not monotone")]
    NonMonotone { from: NodeId },

    #[error("routing row of node {from} is empty")]
    EmptyRow { from: NodeId },

    #[error("node {from} routes to unknown node {node}")]
    UnknownDestination { from: NodeId, node: NodeId },

    #[error("the dispatcher cannot route jobs out of the system")]
    DispatcherExit,

    #[error("expected {expected} nodes, found {found}")]
    NodeCount { expected: usize, found: usize },

    #[error("horizon must be positive, got {0}")]
    Horizon(f64),

    #[error("a run that drains the network needs a finite horizon")]
    UnboundedHorizon,

    #[error("capacity of node {node} must be positive")]
    Capacity { node: NodeId },

    #[error("invalid distribution parameters: {0:?}")]
    InvalidVariate(Variate),

    #[error("{departures} departures cannot be split into {batches} batches")]
    Batches { departures: u64, batches: u64 },

    #[error("warm-up of {warmup} batches leaves none of {batches}")]
    Warmup { warmup: u64, batches: u64 },

    #[error("at least one replication is required")]
    Replications,

    #[error("statistic refers to unknown node {node}")]
    UnknownNode { node: NodeId },

    #[error("weight of node {node} is not finite")]
    Weight { node: NodeId },

    /// Parallel replications always plant seeds derived from the run seed.
    #[error("parallel replications cannot be reseeded with {0:?}")]
    ParallelReseed(Reseed),
}
