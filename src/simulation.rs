pub mod calendar;
pub(crate) mod event;
mod processor;
pub mod stats;

use crate::{
    ident::NodeId,
    network::Network,
    node::{NodeState, Status},
    report::Report,
    time::Time,
    variate::VariateSource,
};

use self::{
    calendar::{Calendar, LinearCalendar},
    stats::{Occupancy, RunStatistics},
};

pub use self::event::{EventKind, Fired};

/// Simulated time of the last processed event and of the one about to be processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct Clock {
    pub current: Time,
    pub next: Time,
}

/// Everything a run mutates. Owned by one [`Simulation`] and fully cleared between
/// replications.
#[derive(Debug, Clone)]
pub struct SimulationState<C> {
    pub(crate) clock: Clock,
    // Time of the most recently drawn external arrival. Unlike the dispatcher slot, this keeps
    // its value once arrivals stop.
    pub(crate) arrival: Time,
    pub(crate) nodes: Vec<NodeState>,
    pub(crate) calendar: C,
    pub(crate) stats: RunStatistics,
}

impl<C: Calendar> SimulationState<C> {
    pub fn new(node_count: usize) -> Self {
        Self {
            clock: Clock::default(),
            arrival: Time::ZERO,
            nodes: vec![NodeState::default(); node_count],
            calendar: C::with_nodes(node_count),
            stats: RunStatistics::with_nodes(node_count),
        }
    }

    pub fn reset(&mut self) {
        self.clock = Clock::default();
        self.arrival = Time::ZERO;
        self.nodes.iter_mut().for_each(NodeState::reset);
        self.calendar.reset();
        self.stats.reset();
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn arrival_clock(&self) -> Time {
        self.arrival
    }

    pub fn node(&self, id: NodeId) -> &NodeState {
        &self.nodes[id.slot()]
    }

    pub fn nodes(&self) -> &[NodeState] {
        &self.nodes
    }

    pub fn calendar(&self) -> &C {
        &self.calendar
    }

    pub fn stats(&self) -> &RunStatistics {
        &self.stats
    }

    pub fn population(&self) -> u64 {
        self.nodes.iter().map(|n| n.queue_len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.iter().all(NodeState::is_idle)
    }

    /// Checks job conservation and that every node is busy exactly when it holds jobs and has a
    /// pending departure.
    pub fn is_consistent(&self) -> bool {
        let stats = &self.stats;
        let conserved =
            stats.arrivals == stats.departures + stats.refused + self.population();
        conserved
            && self.nodes.iter().enumerate().all(|(i, node)| {
                let slot = self.calendar.slot(NodeId::new(i + 1));
                let busy = node.status == Status::Busy;
                busy == (node.queue_len > 0)
                    && busy == slot.active
                    && slot.active == slot.time.is_finite()
            })
    }
}

/// The calendar had no active event. The dispatcher stays active until the horizon and every
/// non-empty node has a pending departure, so this is an internal fault.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("no active event at time {time}")]
pub struct CalendarExhausted {
    pub time: Time,
}

#[derive(Debug)]
pub struct Simulation<'n, V, C = LinearCalendar> {
    network: &'n Network,
    source: V,
    state: SimulationState<C>,
    occupancy: Occupancy,
    trace: Option<Vec<Fired>>,
}

impl<'n, V: VariateSource> Simulation<'n, V> {
    pub fn new(network: &'n Network, source: V) -> Self {
        Self::with_calendar(network, source)
    }
}

impl<'n, V: VariateSource, C: Calendar> Simulation<'n, V, C> {
    pub fn with_calendar(network: &'n Network, source: V) -> Self {
        Self {
            network,
            source,
            state: SimulationState::new(network.node_count()),
            occupancy: Occupancy::default(),
            trace: None,
        }
    }

    pub fn occupancy(mut self, occupancy: Occupancy) -> Self {
        self.occupancy = occupancy;
        self
    }

    pub fn traced(mut self) -> Self {
        self.trace = Some(Vec::new());
        self
    }

    pub fn network(&self) -> &'n Network {
        self.network
    }

    pub fn state(&self) -> &SimulationState<C> {
        &self.state
    }

    pub fn stats(&self) -> &RunStatistics {
        &self.state.stats
    }

    pub fn source(&self) -> &V {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut V {
        &mut self.source
    }

    pub fn trace(&self) -> &[Fired] {
        self.trace.as_deref().unwrap_or_default()
    }

    pub fn into_source(self) -> V {
        self.source
    }

    /// Clears the state and schedules the first external arrival.
    pub fn start(&mut self) {
        self.state.reset();
        if let Some(trace) = self.trace.as_mut() {
            trace.clear();
        }
        self.schedule_arrival();
    }

    pub fn is_open(&self) -> bool {
        self.state.calendar.is_active(NodeId::DISPATCHER)
    }

    pub fn step(&mut self) -> Result<Fired, CalendarExhausted> {
        let Some(node) = self.state.calendar.next_event() else {
            log::error!("calendar exhausted at {}", self.state.clock.current);
            return Err(CalendarExhausted {
                time: self.state.clock.current,
            });
        };
        let time = self.state.calendar.time(node);
        let prev = self.state.clock.current;
        debug_assert!(time >= prev);
        self.state.clock.next = time;
        if self.occupancy == Occupancy::PreTransition {
            self.state.stats.integrate(time - prev, &self.state.nodes);
        }
        self.state.clock.current = time;

        let kind = self.apply(node);

        if self.occupancy == Occupancy::PostTransition {
            self.state.stats.integrate(time - prev, &self.state.nodes);
        }
        debug_assert!(self.state.is_consistent());

        let fired = Fired { time, kind };
        log::trace!("{:?}", fired);
        if let Some(trace) = self.trace.as_mut() {
            trace.push(fired);
        }
        Ok(fired)
    }

    /// Runs until arrivals have stopped and every queue is empty.
    pub fn run_until_drained(&mut self) -> Result<(), CalendarExhausted> {
        while self.is_open() || !self.state.is_empty() {
            self.step()?;
        }
        Ok(())
    }

    /// Runs while the arrival clock is below the horizon. Jobs may be left in the queues.
    pub fn run_until_horizon(&mut self) -> Result<(), CalendarExhausted> {
        while self.state.arrival < self.network.horizon {
            self.step()?;
        }
        Ok(())
    }

    pub fn report(&self) -> Report {
        Report::new(self.network, &self.state)
    }
}
