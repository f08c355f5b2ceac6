use statrs::distribution::{ContinuousCDF, StudentsT};

/// Running mean and variance (Welford).
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct Summary {
    pub samples: u64,
    pub mean: f64,
    // Sum of squared deviations from the running mean
    m2: f64,
}

impl Summary {
    pub fn push(&mut self, x: f64) {
        self.samples += 1;
        let d = x - self.mean;
        self.mean += d / self.samples as f64;
        self.m2 += d * (x - self.mean);
    }

    /// Sample standard deviation. Zero for fewer than two samples.
    pub fn stdev(&self) -> f64 {
        if self.samples < 2 {
            0.0
        } else {
            (self.m2 / (self.samples - 1) as f64).sqrt()
        }
    }
}

impl FromIterator<f64> for Summary {
    fn from_iter<T: IntoIterator<Item = f64>>(iter: T) -> Self {
        let mut s = Summary::default();
        iter.into_iter().for_each(|x| s.push(x));
        s
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Interval {
    pub mean: f64,
    pub half_width: f64,
    pub level: f64,
    pub samples: u64,
}

impl Interval {
    /// The interval at confidence `level` (e.g. 0.95). `None` for fewer than two samples or a
    /// level outside (0, 1).
    pub fn new(samples: &[f64], level: f64) -> Option<Self> {
        let summary: Summary = samples.iter().copied().collect();
        Self::from_summary(&summary, level)
    }

    pub fn from_summary(summary: &Summary, level: f64) -> Option<Self> {
        if summary.samples < 2 || !(0.0 < level && level < 1.0) {
            return None;
        }
        let n = summary.samples as f64;
        let t = StudentsT::new(0.0, 1.0, n - 1.0).ok()?;
        let quantile = t.inverse_cdf(1.0 - (1.0 - level) / 2.0);
        Some(Self {
            mean: summary.mean,
            half_width: quantile * summary.stdev() / n.sqrt(),
            level,
            samples: summary.samples,
        })
    }

    pub fn contains(&self, x: f64) -> bool {
        (x - self.mean).abs() <= self.half_width
    }
}

/// Lag-`lag` sample autocorrelation. `None` when the series is too short or constant.
pub fn autocorrelation(samples: &[f64], lag: usize) -> Option<f64> {
    let n = samples.len();
    if lag >= n {
        return None;
    }
    let mean = samples.iter().sum::<f64>() / n as f64;
    let var: f64 = samples.iter().map(|x| (x - mean).powi(2)).sum();
    if var == 0.0 {
        return None;
    }
    let cov: f64 = samples
        .iter()
        .zip(&samples[lag..])
        .map(|(a, b)| (a - mean) * (b - mean))
        .sum();
    Some(cov / var)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn welford_matches_two_pass() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let s: Summary = xs.iter().copied().collect();
        assert_eq!(s.samples, 8);
        assert_relative_eq!(s.mean, 5.0);
        assert_relative_eq!(s.stdev(), (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn interval_width() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let iv = Interval::new(&xs, 0.95).unwrap();
        assert_relative_eq!(iv.mean, 3.0);
        // t(0.975, 4) = 2.776445
        let expected = 2.776445 * (2.5f64).sqrt() / (5.0f64).sqrt();
        assert_relative_eq!(iv.half_width, expected, max_relative = 1e-4);
        assert!(iv.contains(3.0 + expected * 0.99));
        assert!(!iv.contains(3.0 + expected * 1.01));
    }

    #[test]
    fn interval_needs_two_samples() {
        assert!(Interval::new(&[1.0], 0.95).is_none());
        assert!(Interval::new(&[1.0, 2.0], 1.0).is_none());
    }

    #[test]
    fn alternating_series_is_anticorrelated() {
        let xs: Vec<f64> = (0..100).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert_relative_eq!(autocorrelation(&xs, 1).unwrap(), -0.99, epsilon = 1e-12);
        assert!(autocorrelation(&[1.0; 10], 1).is_none());
        assert!(autocorrelation(&xs, 100).is_none());
    }
}
