use crate::units::Rate;

/// An M/M/1 queue with Poisson arrivals at `arrival` and exponential service at `service`.
#[derive(Debug, Clone, Copy, PartialEq, derive_new::new, serde::Serialize, serde::Deserialize)]
pub struct Mm1 {
    pub arrival: Rate,
    pub service: Rate,
}

impl Mm1 {
    pub fn utilization(&self) -> f64 {
        self.arrival.into_f64() / self.service.into_f64()
    }

    pub fn is_stable(&self) -> bool {
        self.utilization() < 1.0
    }

    /// E(Tq), the mean time spent queued before service.
    pub fn queue_delay(&self) -> Option<f64> {
        let rho = self.utilization();
        self.is_stable()
            .then(|| rho / self.service.into_f64() / (1.0 - rho))
    }

    pub fn response(&self) -> Option<f64> {
        self.is_stable()
            .then(|| 1.0 / (self.service.into_f64() - self.arrival.into_f64()))
    }

    pub fn in_queue(&self) -> Option<f64> {
        self.queue_delay().map(|d| d * self.arrival.into_f64())
    }

    pub fn in_system(&self) -> Option<f64> {
        self.response().map(|r| r * self.arrival.into_f64())
    }
}
