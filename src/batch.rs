use std::fmt;

use crate::{
    driver::Error,
    ident::NodeId,
    interval::{autocorrelation, Interval},
    network::{ConfigError, Network},
    simulation::{calendar::Calendar, stats::RunStatistics, Simulation},
    statistic::{node_wait, Observation, Statistic},
    time::Time,
    variate::VariateSource,
};

/// One long run split into `batches` consecutive batches of `total_departures / batches` system
/// departures each.
#[derive(Debug, Clone, PartialEq, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct BatchMeans {
    pub total_departures: u64,
    pub batches: u64,
    /// Leading batches left out of the estimate.
    #[builder(default)]
    #[serde(default)]
    pub warmup: u64,
    pub statistic: Statistic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct BatchNode {
    pub area: f64,
    pub departures: u64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Batch {
    pub index: u64,
    pub start: Time,
    pub end: Time,
    pub nodes: Vec<BatchNode>,
    pub estimate: Observation,
}

impl Batch {
    pub fn node(&self, id: NodeId) -> &BatchNode {
        &self.nodes[id.slot()]
    }

    pub fn wait(&self, id: NodeId) -> Observation {
        let node = self.node(id);
        node_wait(id, node.area, node.departures)
    }
}

// Cumulative values at the previous boundary
#[derive(Debug)]
struct Snapshot {
    time: Time,
    departures: u64,
    nodes: Vec<BatchNode>,
}

impl Snapshot {
    fn take(time: Time, stats: &RunStatistics) -> Self {
        Self {
            time,
            departures: stats.departures,
            nodes: stats
                .nodes
                .iter()
                .map(|n| BatchNode {
                    area: n.area,
                    departures: n.completed,
                })
                .collect(),
        }
    }

    fn since(&self, stats: &RunStatistics) -> Vec<BatchNode> {
        self.nodes
            .iter()
            .zip(&stats.nodes)
            .map(|(prev, n)| BatchNode {
                area: n.area - prev.area,
                departures: n.completed - prev.departures,
            })
            .collect()
    }
}

impl BatchMeans {
    pub fn batch_size(&self) -> u64 {
        self.total_departures / self.batches.max(1)
    }

    pub fn validate(&self, network: &Network) -> Result<(), ConfigError> {
        self.statistic.validate(network)?;
        if self.batches == 0 || self.total_departures < self.batches {
            return Err(ConfigError::Batches {
                departures: self.total_departures,
                batches: self.batches,
            });
        }
        if self.warmup >= self.batches {
            return Err(ConfigError::Warmup {
                warmup: self.warmup,
                batches: self.batches,
            });
        }
        Ok(())
    }

    /// Starts `sim` from a clean state and runs it for `batches * batch_size` system departures.
    pub fn run<V, C>(&self, sim: &mut Simulation<'_, V, C>) -> Result<BatchOutcome, Error>
    where
        V: VariateSource,
        C: Calendar,
    {
        self.validate(sim.network())?;
        let size = self.batch_size();
        log::debug!(
            "batch means: {} batches of {} departures, {} warm-up",
            self.batches,
            size,
            self.warmup
        );

        sim.start();
        let mut snapshot = Snapshot::take(Time::ZERO, sim.stats());
        let mut batches = Vec::with_capacity(self.batches as usize);
        for index in 0..self.batches {
            while sim.stats().departures - snapshot.departures < size {
                if !sim.is_open() && sim.state().is_empty() {
                    return Err(Error::Drained {
                        departures: sim.stats().departures,
                        required: self.batches * size,
                    });
                }
                sim.step()?;
            }
            let end = sim.state().clock().current;
            let nodes = snapshot.since(sim.stats());
            let mut batch = Batch {
                index,
                start: snapshot.time,
                end,
                nodes,
                estimate: Ok(0.0),
            };
            batch.estimate = self.statistic.evaluate(|n| batch.wait(n));
            match batch.estimate {
                Ok(v) => log::debug!("batch {} ended at {}: {}", index, end, v),
                Err(e) => log::warn!("batch {} ended at {}: {}", index, end, e),
            }
            snapshot = Snapshot::take(end, sim.stats());
            batches.push(batch);
        }

        Ok(BatchOutcome {
            batch_size: size,
            warmup: self.warmup,
            batches,
        })
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct BatchOutcome {
    pub batch_size: u64,
    pub warmup: u64,
    pub batches: Vec<Batch>,
}

impl BatchOutcome {
    pub fn kept(&self) -> &[Batch] {
        &self.batches[(self.warmup as usize).min(self.batches.len())..]
    }

    pub fn estimates(&self) -> Vec<f64> {
        self.kept()
            .iter()
            .filter_map(|b| b.estimate.ok())
            .collect()
    }

    pub fn degenerate(&self) -> usize {
        self.kept().iter().filter(|b| b.estimate.is_err()).count()
    }

    pub fn interval(&self, level: f64) -> Option<Interval> {
        Interval::new(&self.estimates(), level)
    }

    /// Lag-1 autocorrelation of the batch estimates. Near zero when batches are long enough to be
    /// treated as independent.
    pub fn lag1(&self) -> Option<f64> {
        autocorrelation(&self.estimates(), 1)
    }
}

impl fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for batch in self.kept() {
            match batch.estimate {
                Ok(v) => writeln!(f, "{:.6}", v)?,
                Err(_) => writeln!(f, "undefined")?,
            }
        }
        Ok(())
    }
}
