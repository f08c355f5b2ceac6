use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Exp1, Open01};
use rustc_hash::FxHashMap;

use crate::{ident::StreamId, network::ConfigError, time::Delta};

pub trait VariateSource {
    fn select_stream(&mut self, id: StreamId);

    /// A uniform draw from the open interval (0, 1).
    fn uniform(&mut self) -> f64;

    fn exponential(&mut self, mean: f64) -> f64 {
        -mean * (1.0 - self.uniform()).ln()
    }

    /// A bounded Pareto draw in `[low, high]`, by inversion.
    fn bounded_pareto(&mut self, shape: f64, low: f64, high: f64) -> f64 {
        let u = self.uniform();
        let tail = 1.0 - (low / high).powf(shape);
        (low * (1.0 - u * tail).powf(-1.0 / shape)).clamp(low, high)
    }

    fn plant_seeds(&mut self, seed: u64);

    /// Derives a seed from the state of the active stream without advancing it.
    fn get_seed(&self) -> u64;
}

/// Independent ChaCha8 streams planted from one seed.
#[derive(Debug, Clone)]
pub struct MultiStream {
    seed: u64,
    active: StreamId,
    streams: FxHashMap<StreamId, ChaCha8Rng>,
}

impl MultiStream {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            active: StreamId::ZERO,
            streams: FxHashMap::default(),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn active_stream(&self) -> StreamId {
        self.active
    }

    fn active_mut(&mut self) -> &mut ChaCha8Rng {
        let seed = self.seed;
        let id = self.active;
        self.streams
            .entry(id)
            .or_insert_with(|| planted(seed, id))
    }
}

fn planted(seed: u64, id: StreamId) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(id.into_usize() as u64);
    rng
}

impl VariateSource for MultiStream {
    fn select_stream(&mut self, id: StreamId) {
        self.active = id;
    }

    fn uniform(&mut self) -> f64 {
        self.active_mut().sample(Open01)
    }

    fn exponential(&mut self, mean: f64) -> f64 {
        let draw: f64 = self.active_mut().sample(Exp1);
        mean * draw
    }

    fn plant_seeds(&mut self, seed: u64) {
        self.seed = seed;
        self.streams.clear();
    }

    fn get_seed(&self) -> u64 {
        let mut rng = match self.streams.get(&self.active) {
            Some(rng) => rng.clone(),
            None => planted(self.seed, self.active),
        };
        rng.next_u64()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Variate {
    Exponential { mean: f64 },
    BoundedPareto { shape: f64, low: f64, high: f64 },
}

impl Variate {
    pub fn sample<V: VariateSource + ?Sized>(&self, source: &mut V) -> Delta {
        let value = match *self {
            Variate::Exponential { mean } => source.exponential(mean),
            Variate::BoundedPareto { shape, low, high } => source.bounded_pareto(shape, low, high),
        };
        Delta::new(value)
    }

    #[allow(clippy::float_cmp)]
    pub fn mean(&self) -> f64 {
        match *self {
            Variate::Exponential { mean } => mean,
            Variate::BoundedPareto { shape, low, high } => {
                let norm = 1.0 - (low / high).powf(shape);
                if shape == 1.0 {
                    (high * low / (high - low)) * (high / low).ln()
                } else {
                    low.powf(shape) / norm
                        * (shape / (shape - 1.0))
                        * (low.powf(1.0 - shape) - high.powf(1.0 - shape))
                }
            }
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        let ok = match *self {
            Variate::Exponential { mean } => mean > 0.0 && mean.is_finite(),
            Variate::BoundedPareto { shape, low, high } => {
                shape > 0.0 && shape.is_finite() && low > 0.0 && low < high && high.is_finite()
            }
        };
        if ok {
            Ok(())
        } else {
            Err(ConfigError::InvalidVariate(*self))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, derive_new::new)]
pub struct Sampler {
    pub variate: Variate,
    pub stream: StreamId,
}

impl Sampler {
    pub fn exponential(mean: f64, stream: StreamId) -> Self {
        Self::new(Variate::Exponential { mean }, stream)
    }

    pub fn bounded_pareto(shape: f64, low: f64, high: f64, stream: StreamId) -> Self {
        Self::new(Variate::BoundedPareto { shape, low, high }, stream)
    }

    pub fn draw<V: VariateSource + ?Sized>(&self, source: &mut V) -> Delta {
        source.select_stream(self.stream);
        self.variate.sample(source)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn uniform_is_open() {
        let mut src = MultiStream::new(7);
        for _ in 0..10_000 {
            let u = src.uniform();
            assert!(u > 0.0 && u < 1.0);
        }
    }

    #[test]
    fn planting_restarts_streams() {
        let mut src = MultiStream::new(123_456_789);
        let first: Vec<f64> = (0..5).map(|_| src.uniform()).collect();
        src.plant_seeds(123_456_789);
        let again: Vec<f64> = (0..5).map(|_| src.uniform()).collect();
        assert_eq!(first, again);
    }

    #[test]
    fn streams_are_distinct() {
        let mut src = MultiStream::new(1);
        src.select_stream(StreamId::new(1));
        let a = src.uniform();
        src.select_stream(StreamId::new(2));
        let b = src.uniform();
        assert_ne!(a, b);

        // Drawing from stream 2 leaves stream 1 where it was.
        let mut other = MultiStream::new(1);
        other.select_stream(StreamId::new(1));
        other.uniform();
        let next = other.uniform();
        src.select_stream(StreamId::new(1));
        assert_eq!(src.uniform(), next);
    }

    #[test]
    fn get_seed_does_not_advance() {
        let mut src = MultiStream::new(42);
        src.uniform();
        let s1 = src.get_seed();
        let s2 = src.get_seed();
        assert_eq!(s1, s2);
        let mut clone = src.clone();
        assert_eq!(src.uniform(), clone.uniform());
    }

    #[test]
    fn bounded_pareto_stays_in_bounds() {
        let mut src = MultiStream::new(3);
        for _ in 0..10_000 {
            let x = src.bounded_pareto(0.5, 0.3756009615, 8.756197416);
            assert!((0.3756009615..=8.756197416).contains(&x));
        }
    }

    #[test]
    fn sample_means() {
        let mut src = MultiStream::new(11);
        let n = 200_000;
        let exp = Variate::Exponential { mean: 2.0 };
        let sum: f64 = (0..n).map(|_| exp.sample(&mut src).into_f64()).sum();
        assert_relative_eq!(sum / n as f64, 2.0, max_relative = 0.02);

        let bp = Variate::BoundedPareto {
            shape: 1.5,
            low: 0.5,
            high: 10.0,
        };
        let sum: f64 = (0..n).map(|_| bp.sample(&mut src).into_f64()).sum();
        assert_relative_eq!(sum / n as f64, bp.mean(), max_relative = 0.02);
    }

    #[test]
    fn invalid_variates() {
        assert!(Variate::Exponential { mean: 0.0 }.validate().is_err());
        let bp = Variate::BoundedPareto {
            shape: 1.0,
            low: 2.0,
            high: 1.0,
        };
        assert!(bp.validate().is_err());
    }
}
