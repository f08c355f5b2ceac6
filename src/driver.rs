use std::{fmt, path::Path};

use crate::{
    batch::{BatchMeans, BatchOutcome},
    ident::StreamId,
    network::{ConfigError, Network, NodeDesc},
    replication::{ReplicationOutcome, Replications, Reseed},
    report::Report,
    routing::RoutingTable,
    simulation::{
        calendar::{Calendar, HeapCalendar, LinearCalendar},
        stats::Occupancy,
        CalendarExhausted, Simulation,
    },
    time::Time,
    variate::{MultiStream, Sampler},
};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Mode {
    /// One run until the horizon, then until the network drains.
    Single,
    BatchMeans(BatchMeans),
    Replications(Replications),
    /// Replications on the rayon pool. Replication `i` plants `derive_seed(seed, i)`, so only
    /// the default [`Reseed::Continue`] is accepted.
    ParallelReplications(Replications),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, derivative::Derivative, serde::Serialize, serde::Deserialize,
)]
#[derivative(Default)]
#[serde(rename_all = "snake_case")]
pub enum CalendarKind {
    #[derivative(Default)]
    Linear,
    Heap,
}

#[derive(Debug, Clone, PartialEq, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct Config {
    routing: RoutingTable,
    arrival: Sampler,
    nodes: Vec<NodeDesc>,
    mode: Mode,

    /// External arrivals stop after this time. Unbounded when absent.
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    horizon: Option<Time>,
    #[builder(default)]
    #[serde(default)]
    seed: u64,
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    routing_stream: Option<StreamId>,
    #[builder(default)]
    #[serde(default)]
    occupancy: Occupancy,
    #[builder(default)]
    #[serde(default)]
    calendar: CalendarKind,
}

impl Config {
    pub fn network(&self) -> Result<Network, ConfigError> {
        let mut network = Network::builder()
            .routing(self.routing.clone())
            .nodes(self.nodes.clone())
            .arrival(self.arrival)
            .horizon(self.horizon.unwrap_or(Time::INFINITE))
            .build()?;
        network.routing_stream = self.routing_stream;
        Ok(network)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(tag = "mode", content = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Single(Report),
    BatchMeans(BatchOutcome),
    Replications(ReplicationOutcome),
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Single(report) => report.fmt(f),
            Outcome::BatchMeans(out) => out.fmt(f),
            Outcome::Replications(out) => out.fmt(f),
        }
    }
}

pub fn run(cfg: Config) -> Result<Outcome, Error> {
    let network = cfg.network()?;
    log::debug!(
        "{} nodes, horizon {}, seed {}",
        network.node_count(),
        network.horizon(),
        cfg.seed
    );
    match cfg.calendar {
        CalendarKind::Linear => simulate::<LinearCalendar>(&cfg, &network),
        CalendarKind::Heap => simulate::<HeapCalendar>(&cfg, &network),
    }
}

fn simulate<C: Calendar>(cfg: &Config, network: &Network) -> Result<Outcome, Error> {
    let mut sim = Simulation::<_, C>::with_calendar(network, MultiStream::new(cfg.seed))
        .occupancy(cfg.occupancy);
    match &cfg.mode {
        Mode::Single => {
            if !network.horizon().is_finite() {
                return Err(ConfigError::UnboundedHorizon.into());
            }
            sim.start();
            sim.run_until_drained()?;
            Ok(Outcome::Single(sim.report()))
        }
        Mode::BatchMeans(bm) => Ok(Outcome::BatchMeans(bm.run(&mut sim)?)),
        Mode::Replications(r) => Ok(Outcome::Replications(r.run(&mut sim)?)),
        Mode::ParallelReplications(r) => {
            if r.reseed != Reseed::Continue {
                return Err(ConfigError::ParallelReseed(r.reseed).into());
            }
            Ok(Outcome::Replications(r.run_parallel(network, cfg.seed)?))
        }
    }
}

pub fn read_config(path: impl AsRef<Path>) -> Result<Config, Error> {
    let s = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&s)?)
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration")]
    Config(#[from] ConfigError),

    #[error("simulation fault")]
    Calendar(#[from] CalendarExhausted),

    #[error("network drained after {departures} of {required} departures")]
    Drained { departures: u64, required: u64 },

    #[error("serde error")]
    Serde(#[from] serde_json::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),
}
