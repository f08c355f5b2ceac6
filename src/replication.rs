use std::fmt;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::{
    driver::Error,
    interval::Interval,
    network::{ConfigError, Network},
    simulation::{calendar::Calendar, Simulation},
    statistic::{node_wait, Observation, Statistic},
    time::Time,
    variate::{MultiStream, VariateSource},
};

/// How the variate source is reseeded before each replication.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, derivative::Derivative, serde::Serialize, serde::Deserialize,
)]
#[derivative(Default)]
#[serde(rename_all = "snake_case")]
pub enum Reseed {
    /// Streams continue where the previous replication left them.
    #[derivative(Default)]
    Continue,
    /// `plant_seeds(get_seed())` before each replication.
    Chain,
    /// Plants a seed derived from the base seed and the replication index.
    Derived(u64),
}

pub fn derive_seed(base: u64, index: u64) -> u64 {
    let mut rng = ChaCha8Rng::seed_from_u64(base);
    rng.set_stream(index);
    rng.next_u64()
}

/// `count` replications of the network from a clean state up to its horizon.
#[derive(Debug, Clone, PartialEq, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
pub struct Replications {
    pub count: u64,
    pub statistic: Statistic,
    #[builder(default)]
    #[serde(default)]
    pub reseed: Reseed,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Replication {
    pub index: u64,
    /// Seed planted before the replication. Under [`Reseed::Continue`] nothing is planted and
    /// this is only `get_seed()` of the source as the replication starts, which does not
    /// reproduce it.
    pub seed: u64,
    pub horizon: Time,
    pub estimate: Observation,
    pub arrivals: u64,
    pub refused: u64,
}

impl Replication {
    pub fn rejection_rate(&self) -> Option<f64> {
        (self.arrivals > 0).then(|| self.refused as f64 / self.arrivals as f64)
    }
}

impl Replications {
    pub fn validate(&self, network: &Network) -> Result<(), ConfigError> {
        if self.count == 0 {
            return Err(ConfigError::Replications);
        }
        self.statistic.validate(network)?;
        if !network.horizon().is_finite() {
            return Err(ConfigError::UnboundedHorizon);
        }
        Ok(())
    }

    pub fn run<V, C>(&self, sim: &mut Simulation<'_, V, C>) -> Result<ReplicationOutcome, Error>
    where
        V: VariateSource,
        C: Calendar,
    {
        let network = sim.network();
        self.validate(network)?;
        log::debug!(
            "{} replications to {} with {:?} reseeding",
            self.count,
            network.horizon(),
            self.reseed
        );
        let replications = (0..self.count)
            .map(|index| {
                let seed = match self.reseed {
                    Reseed::Continue => sim.source().get_seed(),
                    Reseed::Chain => {
                        let seed = sim.source().get_seed();
                        sim.source_mut().plant_seeds(seed);
                        seed
                    }
                    Reseed::Derived(base) => {
                        let seed = derive_seed(base, index);
                        sim.source_mut().plant_seeds(seed);
                        seed
                    }
                };
                self.replicate(sim, index, seed)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ReplicationOutcome {
            blocking: network.is_blocking(),
            replications,
        })
    }

    /// Runs the replications on the rayon pool, each on its own state and a [`MultiStream`]
    /// planted with [`derive_seed`]. Gives the same replications as [`Replications::run`] with
    /// [`Reseed::Derived`] whatever the number of threads.
    pub fn run_parallel(&self, network: &Network, base: u64) -> Result<ReplicationOutcome, Error> {
        self.validate(network)?;
        log::debug!(
            "{} parallel replications to {}",
            self.count,
            network.horizon()
        );
        let replications = (0..self.count)
            .into_par_iter()
            .map(|index| {
                let seed = derive_seed(base, index);
                let mut sim = Simulation::new(network, MultiStream::new(seed));
                self.replicate(&mut sim, index, seed)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ReplicationOutcome {
            blocking: network.is_blocking(),
            replications,
        })
    }

    fn replicate<V, C>(
        &self,
        sim: &mut Simulation<'_, V, C>,
        index: u64,
        seed: u64,
    ) -> Result<Replication, Error>
    where
        V: VariateSource,
        C: Calendar,
    {
        sim.start();
        sim.run_until_horizon()?;
        let stats = sim.stats();
        let estimate = self
            .statistic
            .evaluate(|n| node_wait(n, stats.node(n).area, stats.node(n).served));
        if let Err(e) = estimate {
            log::warn!("replication {}: {}", index, e);
        }
        log::debug!(
            "replication {} ended at {} after {} arrivals",
            index,
            sim.state().clock().current,
            stats.arrivals
        );
        Ok(Replication {
            index,
            seed,
            horizon: sim.network().horizon(),
            estimate,
            arrivals: stats.arrivals,
            refused: stats.refused,
        })
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ReplicationOutcome {
    pub blocking: bool,
    pub replications: Vec<Replication>,
}

impl ReplicationOutcome {
    pub fn estimates(&self) -> Vec<f64> {
        self.replications
            .iter()
            .filter_map(|r| r.estimate.ok())
            .collect()
    }

    pub fn degenerate(&self) -> usize {
        self.replications
            .iter()
            .filter(|r| r.estimate.is_err())
            .count()
    }

    pub fn interval(&self, level: f64) -> Option<Interval> {
        Interval::new(&self.estimates(), level)
    }

    pub fn rejection_rate(&self) -> Option<f64> {
        let arrivals: u64 = self.replications.iter().map(|r| r.arrivals).sum();
        let refused: u64 = self.replications.iter().map(|r| r.refused).sum();
        (arrivals > 0).then(|| refused as f64 / arrivals as f64)
    }
}

impl fmt::Display for ReplicationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.replications {
            if self.blocking {
                let pct = 100.0 * r.rejection_rate().unwrap_or(0.0);
                writeln!(f, "{} - {:4.2} %", r.refused, pct)?;
            }
            match r.estimate {
                Ok(v) => writeln!(f, "{:.6}", v)?,
                Err(_) => writeln!(f, "undefined")?,
            }
        }
        Ok(())
    }
}
