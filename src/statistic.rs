use crate::{
    ident::NodeId,
    network::{ConfigError, Network},
    routing::RoutingTable,
};

/// A per-node average whose denominator is zero, e.g. a node never served within a short
/// replication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, serde::Serialize)]
#[error("node {node} has no jobs to average over")]
pub struct Degenerate {
    pub node: NodeId,
}

/// One scalar estimate; degenerate estimates are kept rather than propagated as NaN.
pub type Observation = Result<f64, Degenerate>;

pub fn node_wait(node: NodeId, area: f64, count: u64) -> Observation {
    if count == 0 {
        Err(Degenerate { node })
    } else {
        Ok(area / count as f64)
    }
}

/// A weighted sum of per-node average waits.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Statistic {
    weights: Vec<(NodeId, f64)>,
}

impl Statistic {
    pub fn weighted(weights: Vec<(NodeId, f64)>) -> Self {
        Self { weights }
    }

    pub fn node(node: NodeId) -> Self {
        Self::weighted(vec![(node, 1.0)])
    }

    /// Wait of a job entering through one of the `access` nodes and then crossing `relay`.
    /// Access nodes are weighted by their share of the external arrivals entering through
    /// them.
    pub fn access_wait(routing: &RoutingTable, access: &[NodeId], relay: NodeId) -> Self {
        let shares: Vec<f64> = access.iter().map(|&n| routing.entry_share(n)).collect();
        let total: f64 = shares.iter().sum();
        if total <= 0.0 {
            return Self::equal_access_wait(access, relay);
        }
        let mut weights: Vec<(NodeId, f64)> = access
            .iter()
            .zip(&shares)
            .map(|(&n, &s)| (n, s / total))
            .collect();
        weights.push((relay, 1.0));
        Self::weighted(weights)
    }

    /// Like [`Statistic::access_wait`] with every access node weighted equally, whatever the
    /// routing shares.
    pub fn equal_access_wait(access: &[NodeId], relay: NodeId) -> Self {
        let w = 1.0 / access.len() as f64;
        let mut weights: Vec<(NodeId, f64)> = access.iter().map(|&n| (n, w)).collect();
        weights.push((relay, 1.0));
        Self::weighted(weights)
    }

    pub fn weights(&self) -> &[(NodeId, f64)] {
        &self.weights
    }

    pub fn validate(&self, network: &Network) -> Result<(), ConfigError> {
        for &(node, w) in &self.weights {
            if node.is_dispatcher() || node.into_usize() > network.node_count() {
                return Err(ConfigError::UnknownNode { node });
            }
            if !w.is_finite() {
                return Err(ConfigError::Weight { node });
            }
        }
        Ok(())
    }

    /// Evaluates the statistic given a per-node wait. The first degenerate node wins.
    pub fn evaluate(&self, wait: impl Fn(NodeId) -> Observation) -> Observation {
        self.weights
            .iter()
            .try_fold(0.0, |acc, &(node, w)| -> Observation { Ok(acc + w * wait(node)?) })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        ident::StreamId,
        network::NodeDesc,
        routing::{Destination, Row},
        variate::Sampler,
    };

    fn nodes(ids: &[usize]) -> Vec<NodeId> {
        ids.iter().copied().map(NodeId::new).collect()
    }

    #[test]
    fn equal_weights() {
        let stat = Statistic::equal_access_wait(&nodes(&[1, 2, 3, 4]), NodeId::new(5));
        let value = stat.evaluate(|n| Ok(n.into_usize() as f64)).unwrap();
        assert_relative_eq!(value, 2.5 + 5.0);
    }

    #[test]
    fn routing_weights() {
        let routing = RoutingTable::new(
            Row::from_probabilities([
                (Destination::Node(NodeId::new(1)), 0.3),
                (Destination::Node(NodeId::new(2)), 0.1),
                (Destination::Node(NodeId::new(3)), 0.6),
            ]),
            vec![
                Row::deterministic(Destination::Node(NodeId::new(3))),
                Row::deterministic(Destination::Node(NodeId::new(3))),
                Row::deterministic(Destination::Exit),
            ],
        )
        .unwrap();
        let stat = Statistic::access_wait(&routing, &nodes(&[1, 2]), NodeId::new(3));
        let w = stat.weights();
        assert_relative_eq!(w[0].1, 0.75, epsilon = 1e-12);
        assert_relative_eq!(w[1].1, 0.25, epsilon = 1e-12);
        assert_eq!(w[2], (NodeId::new(3), 1.0));
    }

    #[test]
    fn validates_nodes_and_weights() {
        let network = Network::builder()
            .routing(
                RoutingTable::new(
                    Row::deterministic(Destination::Node(NodeId::ONE)),
                    vec![Row::deterministic(Destination::Exit)],
                )
                .unwrap(),
            )
            .nodes(vec![NodeDesc::builder()
                .service(Sampler::exponential(0.5, StreamId::ONE))
                .build()])
            .arrival(Sampler::exponential(1.0, StreamId::ZERO))
            .horizon(10.0)
            .build()
            .unwrap();
        assert_eq!(Statistic::node(NodeId::ONE).validate(&network), Ok(()));
        assert_eq!(
            Statistic::node(NodeId::DISPATCHER).validate(&network),
            Err(ConfigError::UnknownNode {
                node: NodeId::DISPATCHER
            })
        );
        assert_eq!(
            Statistic::node(NodeId::new(2)).validate(&network),
            Err(ConfigError::UnknownNode {
                node: NodeId::new(2)
            })
        );
        assert_eq!(
            Statistic::weighted(vec![(NodeId::ONE, f64::NAN)]).validate(&network),
            Err(ConfigError::Weight { node: NodeId::ONE })
        );
    }

    #[test]
    fn degenerate_node_is_reported() {
        let stat = Statistic::equal_access_wait(&nodes(&[1, 2]), NodeId::new(3));
        let result = stat.evaluate(|n| node_wait(n, 1.0, if n == NodeId::new(2) { 0 } else { 2 }));
        assert_eq!(result, Err(Degenerate { node: NodeId::new(2) }));
    }
}
