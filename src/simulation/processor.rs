use crate::{
    ident::NodeId,
    node::Status,
    routing::{Destination, Row},
    variate::VariateSource,
};

use super::{calendar::Calendar, event::EventKind, Simulation};

// Event handlers
impl<V: VariateSource, C: Calendar> Simulation<'_, V, C> {
    pub(super) fn apply(&mut self, node: NodeId) -> EventKind {
        if node.is_dispatcher() {
            self.dispatch()
        } else {
            self.depart(node);
            EventKind::new_departure(node)
        }
    }

    /// Draws the next external arrival. The dispatcher closes once it passes the horizon.
    pub(super) fn schedule_arrival(&mut self) {
        let delta = self.network.arrival.draw(&mut self.source);
        self.state.arrival += delta;
        if self.state.arrival > self.network.horizon {
            self.state.calendar.cancel(NodeId::DISPATCHER);
        } else {
            self.state
                .calendar
                .schedule(NodeId::DISPATCHER, self.state.arrival);
        }
    }

    fn dispatch(&mut self) -> EventKind {
        let network = self.network;
        self.state.stats.arrivals += 1;
        let target = match self.route(network.routing.dispatcher()) {
            Destination::Node(node) => node,
            Destination::Exit => unreachable!("dispatcher routed to exit"),
        };
        self.arrive(target);
        self.schedule_arrival();
        EventKind::new_arrival(target)
    }

    pub(crate) fn arrive(&mut self, node: NodeId) {
        let capacity = self.network.node(node).capacity;
        if self.state.node(node).is_full(capacity) {
            self.state.stats.refused += 1;
            log::trace!("node {} refused a job at {}", node, self.state.clock.current);
            return;
        }
        self.state.stats.node_mut(node).arrived += 1;
        if self.state.node(node).is_idle() {
            self.start_service(node);
        }
        self.state.nodes[node.slot()].queue_len += 1;
    }

    pub(crate) fn depart(&mut self, node: NodeId) {
        let i = node.slot();
        debug_assert!(self.state.nodes[i].queue_len > 0);
        self.state.nodes[i].queue_len -= 1;
        self.state.stats.node_mut(node).completed += 1;

        let network = self.network;
        let next = self.route(network.routing.departure(node));

        if self.state.nodes[i].queue_len > 0 {
            self.start_service(node);
        } else {
            self.state.nodes[i].status = Status::Idle;
            self.state.calendar.cancel(node);
        }

        // The departing node is settled before the job reaches its next node
        match next {
            Destination::Exit => self.state.stats.departures += 1,
            Destination::Node(next) => self.arrive(next),
        }
    }

    fn start_service(&mut self, node: NodeId) {
        let service = self.network.node(node).service.draw(&mut self.source);
        let done = self.state.clock.current + service;
        self.state.calendar.schedule(node, done);
        self.state.nodes[node.slot()].status = Status::Busy;
        let stats = self.state.stats.node_mut(node);
        stats.service += service.into_f64();
        stats.served += 1;
    }

    fn route(&mut self, row: &Row) -> Destination {
        match row.fixed() {
            Some(destination) => destination,
            None => {
                self.source.select_stream(self.network.routing_stream());
                row.classify(self.source.uniform())
            }
        }
    }
}
