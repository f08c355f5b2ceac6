use crate::{ident::NodeId, node::NodeState, time::Delta};

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct NodeStats {
    /// Time integral of the queue length, including the job in service.
    pub area: f64,
    pub served: u64,
    pub completed: u64,
    pub arrived: u64,
    /// Sum of the drawn service times.
    pub service: f64,
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct RunStatistics {
    pub nodes: Vec<NodeStats>,
    pub arrivals: u64,
    /// Jobs that left the system through a terminal node.
    pub departures: u64,
    pub refused: u64,
}

impl RunStatistics {
    pub fn with_nodes(node_count: usize) -> Self {
        Self {
            nodes: vec![NodeStats::default(); node_count],
            ..Default::default()
        }
    }

    pub fn node(&self, id: NodeId) -> &NodeStats {
        &self.nodes[id.slot()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeStats {
        &mut self.nodes[id.slot()]
    }

    /// Adds `delta` worth of the given queue lengths to the occupancy integrals.
    pub(crate) fn integrate(&mut self, delta: Delta, nodes: &[NodeState]) {
        let dt = delta.into_f64();
        for (stats, node) in self.nodes.iter_mut().zip(nodes) {
            if node.queue_len > 0 {
                stats.area += dt * node.queue_len as f64;
            }
        }
    }

    pub fn total_area(&self) -> f64 {
        self.nodes.iter().map(|n| n.area).sum()
    }

    pub fn total_service(&self) -> f64 {
        self.nodes.iter().map(|n| n.service).sum()
    }

    pub fn total_served(&self) -> u64 {
        self.nodes.iter().map(|n| n.served).sum()
    }

    pub(crate) fn reset(&mut self) {
        self.nodes.fill(NodeStats::default());
        self.arrivals = 0;
        self.departures = 0;
        self.refused = 0;
    }
}

/// When the occupancy integral samples the queue lengths.
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, derivative::Derivative, serde::Serialize, serde::Deserialize,
)]
#[derivative(Default)]
#[serde(rename_all = "snake_case")]
pub enum Occupancy {
    /// Integrate the lengths as they stood before the event, the standard time average.
    #[derivative(Default)]
    PreTransition,
    /// Integrate the lengths after the event's effects. Over-counts every interval that ends with
    /// an arrival and under-counts every one ending with a departure.
    PostTransition,
}
