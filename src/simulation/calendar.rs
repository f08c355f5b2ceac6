use std::{collections::BinaryHeap, fmt::Debug};

use delegate::delegate;

use crate::{ident::NodeId, time::Time};

use super::event::Event;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Slot {
    pub time: Time,
    pub active: bool,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            time: Time::INFINITE,
            active: false,
        }
    }
}

pub trait Calendar: Debug {
    /// A calendar with every slot inactive, for `node_count` service nodes plus the dispatcher.
    fn with_nodes(node_count: usize) -> Self
    where
        Self: Sized;

    fn slot(&self, node: NodeId) -> Slot;

    fn schedule(&mut self, node: NodeId, time: Time);

    fn cancel(&mut self, node: NodeId);

    /// The active slot with the smallest time, ties broken by ascending node. `None` when no slot
    /// is active.
    fn next_event(&mut self) -> Option<NodeId>;

    fn reset(&mut self);

    fn time(&self, node: NodeId) -> Time {
        self.slot(node).time
    }

    fn is_active(&self, node: NodeId) -> bool {
        self.slot(node).active
    }
}

/// Linear scan over the slots. Fits the small fixed networks this simulator is mostly used with.
#[derive(Debug, Clone)]
pub struct LinearCalendar {
    slots: Vec<Slot>,
}

impl Calendar for LinearCalendar {
    fn with_nodes(node_count: usize) -> Self {
        Self {
            slots: vec![Slot::default(); node_count + 1],
        }
    }

    fn slot(&self, node: NodeId) -> Slot {
        self.slots[node.into_usize()]
    }

    fn schedule(&mut self, node: NodeId, time: Time) {
        self.slots[node.into_usize()] = Slot { time, active: true };
    }

    fn cancel(&mut self, node: NodeId) {
        self.slots[node.into_usize()] = Slot::default();
    }

    fn next_event(&mut self) -> Option<NodeId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.active)
            .min_by_key(|&(i, slot)| (slot.time, i))
            .map(|(i, _)| NodeId::new(i))
    }

    fn reset(&mut self) {
        self.slots.fill(Slot::default());
    }
}

#[derive(Debug, Default, Clone)]
struct EventHeap(BinaryHeap<Event>);

impl EventHeap {
    delegate! {
        to self.0 {
            fn push(&mut self, ev: Event);
            fn pop(&mut self) -> Option<Event>;
            fn peek(&self) -> Option<&Event>;
            fn clear(&mut self);
        }
    }

    /// Pops stale entries off the top until a current one surfaces.
    fn first_current(&mut self, versions: &[u64]) -> Option<Event> {
        while let Some(&ev) = self.peek() {
            if versions[ev.node().into_usize()] == ev.version {
                return Some(ev);
            }
            self.pop();
        }
        None
    }
}

/// Binary heap keyed by (time, node) with lazy invalidation: rescheduling or cancelling a slot
/// bumps its version, and stale heap entries are discarded when they reach the top.
#[derive(Debug, Clone)]
pub struct HeapCalendar {
    slots: Vec<Slot>,
    versions: Vec<u64>,
    heap: EventHeap,
}

impl Calendar for HeapCalendar {
    fn with_nodes(node_count: usize) -> Self {
        Self {
            slots: vec![Slot::default(); node_count + 1],
            versions: vec![0; node_count + 1],
            heap: EventHeap::default(),
        }
    }

    fn slot(&self, node: NodeId) -> Slot {
        self.slots[node.into_usize()]
    }

    fn schedule(&mut self, node: NodeId, time: Time) {
        let i = node.into_usize();
        self.versions[i] += 1;
        self.slots[i] = Slot { time, active: true };
        self.heap.push(Event::new(time, node, self.versions[i]));
    }

    fn cancel(&mut self, node: NodeId) {
        let i = node.into_usize();
        self.versions[i] += 1;
        self.slots[i] = Slot::default();
    }

    fn next_event(&mut self) -> Option<NodeId> {
        let ev = self.heap.first_current(&self.versions)?;
        debug_assert_eq!(ev.time(), self.slots[ev.node().into_usize()].time);
        Some(ev.node())
    }

    fn reset(&mut self) {
        self.slots.fill(Slot::default());
        self.versions.fill(0);
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario<C: Calendar>() -> C {
        let mut cal = C::with_nodes(3);
        cal.schedule(NodeId::new(1), Time::new(12.4));
        cal.schedule(NodeId::new(2), Time::new(7.1));
        cal
    }

    #[test]
    fn picks_earliest_active() {
        assert_eq!(scenario::<LinearCalendar>().next_event(), Some(NodeId::new(2)));
        assert_eq!(scenario::<HeapCalendar>().next_event(), Some(NodeId::new(2)));
    }

    fn ties<C: Calendar>() {
        let mut cal = C::with_nodes(3);
        cal.schedule(NodeId::new(3), Time::new(2.0));
        cal.schedule(NodeId::new(1), Time::new(2.0));
        assert_eq!(cal.next_event(), Some(NodeId::new(1)));
        cal.schedule(NodeId::DISPATCHER, Time::new(2.0));
        assert_eq!(cal.next_event(), Some(NodeId::DISPATCHER));
    }

    #[test]
    fn ties_break_by_node() {
        ties::<LinearCalendar>();
        ties::<HeapCalendar>();
    }

    fn cancel_and_reschedule<C: Calendar>() {
        let mut cal = scenario::<C>();
        cal.cancel(NodeId::new(2));
        assert!(!cal.is_active(NodeId::new(2)));
        assert_eq!(cal.time(NodeId::new(2)), Time::INFINITE);
        assert_eq!(cal.next_event(), Some(NodeId::new(1)));
        cal.schedule(NodeId::new(1), Time::new(20.0));
        cal.schedule(NodeId::new(3), Time::new(15.0));
        assert_eq!(cal.next_event(), Some(NodeId::new(3)));
        cal.reset();
        assert_eq!(cal.next_event(), None);
    }

    #[test]
    fn cancel_then_reschedule() {
        cancel_and_reschedule::<LinearCalendar>();
        cancel_and_reschedule::<HeapCalendar>();
    }

    #[test]
    fn empty_calendar_is_exhausted() {
        assert_eq!(LinearCalendar::with_nodes(5).next_event(), None);
        assert_eq!(HeapCalendar::with_nodes(5).next_event(), None);
    }
}
