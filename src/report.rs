use std::fmt;

use crate::{
    ident::NodeId,
    network::Network,
    simulation::{calendar::Calendar, SimulationState},
    time::Time,
};

/// Derived metrics of one node. `None` marks a metric whose denominator is zero.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct NodeReport {
    pub id: NodeId,
    pub name: String,
    pub utilization: Option<f64>,
    pub avg_service: Option<f64>,
    /// Fraction of all services started at this node.
    pub share: Option<f64>,
    pub avg_wait: Option<f64>,
    pub avg_delay: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Report {
    pub elapsed: Time,
    pub arrivals: u64,
    pub departures: u64,
    pub refused: u64,
    pub avg_interarrival: Option<f64>,
    pub avg_wait: Option<f64>,
    pub avg_in_system: Option<f64>,
    pub avg_delay: Option<f64>,
    pub avg_in_queue: Option<f64>,
    pub nodes: Vec<NodeReport>,
}

fn ratio(num: f64, den: f64) -> Option<f64> {
    (den > 0.0).then(|| num / den)
}

impl Report {
    pub fn new<C: Calendar>(network: &Network, state: &SimulationState<C>) -> Self {
        let stats = state.stats();
        let elapsed = state.clock().current;
        let t = elapsed.into_f64();
        let total_served = stats.total_served() as f64;

        let nodes = network
            .nodes()
            .iter()
            .zip(&stats.nodes)
            .enumerate()
            .map(|(i, (desc, s))| {
                let served = s.served as f64;
                let avg_service = ratio(s.service, served);
                let avg_wait = ratio(s.area, served);
                NodeReport {
                    id: NodeId::new(i + 1),
                    name: desc.name.clone(),
                    utilization: ratio(s.service, t),
                    avg_service,
                    share: ratio(served, total_served),
                    avg_wait,
                    avg_delay: avg_wait.zip(avg_service).map(|(w, s)| w - s),
                }
            })
            .collect();

        let area = stats.total_area();
        let queued = area - stats.total_service();
        let departures = stats.departures as f64;
        Self {
            elapsed,
            arrivals: stats.arrivals,
            departures: stats.departures,
            refused: stats.refused,
            avg_interarrival: ratio(state.arrival_clock().into_f64(), stats.arrivals as f64),
            avg_wait: ratio(area, departures),
            avg_in_system: ratio(area, t),
            avg_delay: ratio(queued, departures),
            avg_in_queue: ratio(queued, t),
            nodes,
        }
    }

    pub fn rejection_rate(&self) -> Option<f64> {
        ratio(self.refused as f64, self.arrivals as f64)
    }
}

struct Metric(Option<f64>);

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => write!(f, "{:>12.6}", v),
            None => write!(f, "{:>12}", "-"),
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "elapsed ................ {:.4}", self.elapsed.into_f64())?;
        writeln!(f, "arrivals ............... {}", self.arrivals)?;
        writeln!(f, "departures ............. {}", self.departures)?;
        if self.refused > 0 {
            writeln!(f, "refused ................ {}", self.refused)?;
        }
        writeln!(f, "avg interarrival ....... {}", Metric(self.avg_interarrival))?;
        writeln!(f, "avg wait ............... {}", Metric(self.avg_wait))?;
        writeln!(f, "avg # in system ........ {}", Metric(self.avg_in_system))?;
        writeln!(f, "avg delay .............. {}", Metric(self.avg_delay))?;
        writeln!(f, "avg # in queue ......... {}", Metric(self.avg_in_queue))?;
        writeln!(f)?;
        writeln!(
            f,
            "{:>4} {:<10} {:>12} {:>12} {:>12} {:>12} {:>12}",
            "node", "name", "utilization", "service", "share", "wait", "delay"
        )?;
        for n in &self.nodes {
            writeln!(
                f,
                "{:>4} {:<10} {} {} {} {} {}",
                n.id,
                n.name,
                Metric(n.utilization),
                Metric(n.avg_service),
                Metric(n.share),
                Metric(n.avg_wait),
                Metric(n.avg_delay)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::{
        ident::StreamId,
        routing::{Destination, Row, RoutingTable},
        simulation::{calendar::LinearCalendar, Simulation},
        variate::{MultiStream, Sampler},
        NodeDesc,
    };

    fn single(horizon: f64) -> Network {
        Network::builder()
            .routing(
                RoutingTable::new(
                    Row::deterministic(Destination::Node(NodeId::ONE)),
                    vec![Row::deterministic(Destination::Exit)],
                )
                .unwrap(),
            )
            .nodes(vec![NodeDesc::builder()
                .name("only")
                .service(Sampler::exponential(0.5, StreamId::ONE))
                .build()])
            .arrival(Sampler::exponential(1.0, StreamId::ZERO))
            .horizon(horizon)
            .build()
            .unwrap()
    }

    #[test]
    fn empty_run_is_undefined() {
        let network = single(10.0);
        let state = SimulationState::<LinearCalendar>::new(1);
        let report = Report::new(&network, &state);
        assert_eq!(report.avg_wait, None);
        assert_eq!(report.avg_in_system, None);
        assert_eq!(report.nodes[0].utilization, None);
        assert_eq!(report.nodes[0].avg_delay, None);
        assert_eq!(report.rejection_rate(), None);
        assert!(report.to_string().contains("only"));
    }

    #[test]
    fn drained_single_node_metrics_agree() {
        let network = single(2_000.0);
        let mut sim = Simulation::new(&network, MultiStream::new(3));
        sim.start();
        sim.run_until_drained().unwrap();
        let report = sim.report();
        let node = &report.nodes[0];
        assert_eq!(node.share, Some(1.0));
        // Everything that entered the only node left it, so both wait averages match
        assert_relative_eq!(node.avg_wait.unwrap(), report.avg_wait.unwrap(), epsilon = 1e-9);
        assert_relative_eq!(
            node.avg_delay.unwrap(),
            report.avg_delay.unwrap(),
            epsilon = 1e-9
        );
        assert!(node.utilization.unwrap() < 1.0);
        assert!(report.avg_in_queue.unwrap() <= report.avg_in_system.unwrap());
    }
}
