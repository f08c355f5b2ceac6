use crate::time::Delta;

/// An event rate, in events per unit of simulated time.
#[derive(
    Debug,
    Default,
    Copy,
    Clone,
    PartialEq,
    PartialOrd,
    derive_more::Display,
    derive_more::FromStr,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Rate(f64);

impl Rate {
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    pub const fn into_f64(self) -> f64 {
        self.0
    }

    pub fn mean(self) -> Delta {
        Delta::new(1.0 / self.0)
    }

    pub fn from_mean(mean: Delta) -> Self {
        Self(1.0 / mean.into_f64())
    }

    pub fn scale_by(self, val: f64) -> Self {
        Self(self.0 * val)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_mean() {
        let rate = Rate::new(5.0);
        assert_eq!(rate.mean(), Delta::new(0.2));
        assert_eq!(Rate::from_mean(Delta::new(0.5)), Rate::new(2.0));
    }
}
