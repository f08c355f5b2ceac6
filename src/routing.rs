use crate::{ident::NodeId, network::ConfigError};

// Tolerance on the final cumulative threshold of a row.
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    Node(NodeId),
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, derive_new::new)]
pub struct Threshold {
    pub destination: Destination,
    pub cumulative: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Row(Vec<Threshold>);

impl Row {
    pub fn from_probabilities(entries: impl IntoIterator<Item = (Destination, f64)>) -> Self {
        let mut acc = 0.0;
        let thresholds = entries
            .into_iter()
            .map(|(destination, p)| {
                acc += p;
                Threshold::new(destination, acc)
            })
            .collect();
        Self(thresholds)
    }

    pub fn from_thresholds(thresholds: Vec<Threshold>) -> Self {
        Self(thresholds)
    }

    pub fn deterministic(destination: Destination) -> Self {
        Self(vec![Threshold::new(destination, 1.0)])
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.0
    }

    /// The destination of a single-entry row. Such rows never consume a draw.
    pub fn fixed(&self) -> Option<Destination> {
        match self.0.as_slice() {
            [only] => Some(only.destination),
            _ => None,
        }
    }

    pub fn classify(&self, u: f64) -> Destination {
        // Entries own `(previous, cumulative]`; a zero draw belongs to the first one
        if u <= 0.0 {
            return self.0[0].destination;
        }
        let idx = self.0.partition_point(|t| t.cumulative < u);
        // Rounding can leave `u` just above the last threshold
        let idx = idx.min(self.0.len() - 1);
        self.0[idx].destination
    }

    pub fn probability(&self, destination: Destination) -> f64 {
        let mut prev = 0.0;
        let mut mass = 0.0;
        for t in &self.0 {
            if t.destination == destination {
                mass += t.cumulative - prev;
            }
            prev = t.cumulative;
        }
        mass
    }

    fn validate(&mut self, from: NodeId, node_count: usize) -> Result<(), ConfigError> {
        let last = match self.0.last() {
            Some(t) => t.cumulative,
            None => return Err(ConfigError::EmptyRow { from }),
        };
        let mut prev = 0.0;
        for t in &self.0 {
            if t.cumulative.is_nan() || t.cumulative < prev {
                return Err(ConfigError::NonMonotone { from });
            }
            prev = t.cumulative;
            match t.destination {
                Destination::Exit if from.is_dispatcher() => {
                    return Err(ConfigError::DispatcherExit);
                }
                Destination::Node(node) if node.is_dispatcher() || node.into_usize() > node_count => {
                    return Err(ConfigError::UnknownDestination { from, node });
                }
                _ => {}
            }
        }
        if (last - 1.0).abs() > EPSILON {
            return Err(ConfigError::RoutingSum { from, total: last });
        }
        if let Some(t) = self.0.last_mut() {
            t.cumulative = 1.0;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RoutingConfig {
    pub node_count: usize,
    pub dispatcher: Row,
    pub nodes: Vec<Row>,
}

/// A validated row-stochastic routing matrix.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RoutingConfig", into = "RoutingConfig")]
pub struct RoutingTable {
    dispatcher: Row,
    nodes: Vec<Row>,
}

impl RoutingTable {
    pub fn new(dispatcher: Row, nodes: Vec<Row>) -> Result<Self, ConfigError> {
        let node_count = nodes.len();
        let mut dispatcher = dispatcher;
        dispatcher.validate(NodeId::DISPATCHER, node_count)?;
        let mut nodes = nodes;
        for (i, row) in nodes.iter_mut().enumerate() {
            row.validate(NodeId::new(i + 1), node_count)?;
        }
        Ok(Self { dispatcher, nodes })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn dispatcher(&self) -> &Row {
        &self.dispatcher
    }

    pub fn departure(&self, node: NodeId) -> &Row {
        &self.nodes[node.slot()]
    }

    pub fn route_arrival(&self, u: f64) -> NodeId {
        match self.dispatcher.classify(u) {
            Destination::Node(node) => node,
            // Rejected by validation
            Destination::Exit => unreachable!("dispatcher routed to exit"),
        }
    }

    pub fn entry_share(&self, node: NodeId) -> f64 {
        self.dispatcher.probability(Destination::Node(node))
    }

    pub fn is_terminal(&self, node: NodeId) -> bool {
        self.departure(node).fixed() == Some(Destination::Exit)
    }
}

impl TryFrom<RoutingConfig> for RoutingTable {
    type Error = ConfigError;

    fn try_from(cfg: RoutingConfig) -> Result<Self, Self::Error> {
        if cfg.nodes.len() != cfg.node_count {
            return Err(ConfigError::NodeCount {
                expected: cfg.node_count,
                found: cfg.nodes.len(),
            });
        }
        Self::new(cfg.dispatcher, cfg.nodes)
    }
}

impl From<RoutingTable> for RoutingConfig {
    fn from(table: RoutingTable) -> Self {
        Self {
            node_count: table.nodes.len(),
            dispatcher: table.dispatcher,
            nodes: table.nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(i: usize) -> Destination {
        Destination::Node(NodeId::new(i))
    }

    fn five_way() -> Row {
        Row::from_thresholds(
            [0.05, 0.10, 0.15, 0.20, 1.0]
                .iter()
                .enumerate()
                .map(|(i, &c)| Threshold::new(node(i + 1), c))
                .collect(),
        )
    }

    #[test]
    fn classify_half_open() {
        let row = five_way();
        assert_eq!(row.classify(0.12), node(3));
        assert_eq!(row.classify(0.21), node(5));
        assert_eq!(row.classify(0.05), node(1));
        assert_eq!(row.classify(0.0500001), node(2));
        assert_eq!(row.classify(1.0), node(5));
    }

    #[test]
    fn classify_zero_goes_first() {
        assert_eq!(five_way().classify(0.0), node(1));
    }

    #[test]
    fn probabilities_sum_to_one() {
        let nodes = (0..5).map(|_| Row::deterministic(Destination::Exit)).collect();
        let table = RoutingTable::new(five_way(), nodes).unwrap();
        assert!((table.entry_share(NodeId::new(3)) - 0.05).abs() < 1e-12);
        assert!((table.entry_share(NodeId::new(5)) - 0.80).abs() < 1e-12);
        assert!(table.is_terminal(NodeId::new(1)));
    }

    #[test]
    fn rejects_bad_sum() {
        let row = Row::from_probabilities([(node(1), 0.5), (node(2), 0.4)]);
        let err = RoutingTable::new(row, vec![Row::deterministic(Destination::Exit); 2]);
        assert!(matches!(err, Err(ConfigError::RoutingSum { .. })));
    }

    #[test]
    fn rejects_dispatcher_exit() {
        let row = Row::deterministic(Destination::Exit);
        let err = RoutingTable::new(row, vec![Row::deterministic(Destination::Exit)]);
        assert!(matches!(err, Err(ConfigError::DispatcherExit)));
    }

    #[test]
    fn rejects_unknown_node() {
        let row = Row::deterministic(node(3));
        let err = RoutingTable::new(row, vec![Row::deterministic(Destination::Exit)]);
        assert!(matches!(err, Err(ConfigError::UnknownDestination { .. })));
    }

    #[test]
    fn rejects_non_monotone() {
        let row = Row::from_thresholds(vec![
            Threshold::new(node(1), 0.6),
            Threshold::new(node(2), 0.4),
            Threshold::new(node(2), 1.0),
        ]);
        let err = RoutingTable::new(row, vec![Row::deterministic(Destination::Exit); 2]);
        assert!(matches!(err, Err(ConfigError::NonMonotone { .. })));
    }

    #[test]
    fn config_round_trip_checks_count() {
        let json = r#"{
            "node_count": 2,
            "dispatcher": [{"destination": {"node": 1}, "cumulative": 1.0}],
            "nodes": [[{"destination": "exit", "cumulative": 1.0}]]
        }"#;
        let err = serde_json::from_str::<RoutingTable>(json);
        assert!(err.is_err());
    }
}
