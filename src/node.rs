#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    derive_new::new,
    derivative::Derivative,
    serde::Serialize,
    serde::Deserialize,
)]
#[derivative(Default)]
pub enum Status {
    #[derivative(Default)]
    Idle,
    Busy,
}

/// Mutable state of a single-server FIFO node. Jobs are indistinguishable, so the queue is a
/// count that includes the job in service.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct NodeState {
    pub(crate) queue_len: u64,
    pub(crate) status: Status,
}

impl NodeState {
    pub fn queue_len(&self) -> u64 {
        self.queue_len
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_idle(&self) -> bool {
        self.queue_len == 0
    }

    pub fn is_full(&self, capacity: Option<u64>) -> bool {
        capacity.is_some_and(|c| self.queue_len > c)
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
