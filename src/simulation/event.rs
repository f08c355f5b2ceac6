#![allow(clippy::non_canonical_partial_ord_impl)]

use std::cmp::Reverse;

use crate::{ident::NodeId, time::Time};

/// A heap entry for a calendar slot. The greatest entry is the earliest event, ties going to the
/// lowest node.
#[derive(Debug, Clone, Copy, derivative::Derivative)]
#[derivative(PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Event {
    time: Reverse<Time>,
    node: Reverse<NodeId>,
    // Slots are rescheduled by bumping their version; older entries are stale
    #[derivative(PartialEq = "ignore", PartialOrd = "ignore", Ord = "ignore")]
    pub(crate) version: u64,
}

impl Event {
    pub(crate) fn new(time: Time, node: NodeId, version: u64) -> Self {
        Self {
            time: Reverse(time),
            node: Reverse(node),
            version,
        }
    }

    pub(crate) fn time(&self) -> Time {
        self.time.0
    }

    pub(crate) fn node(&self) -> NodeId {
        self.node.0
    }
}

/// What happened when a calendar slot fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_new::new, serde::Serialize)]
pub enum EventKind {
    Arrival(NodeId),
    Departure(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Fired {
    pub time: Time,
    pub kind: EventKind,
}
