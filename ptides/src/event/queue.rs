//! Tag-ordered event queue.

use std::collections::BTreeMap;
use std::fmt;

use slab::Slab;

use crate::event::{Event, EventId};
use crate::time::Tag;

/// Ordering key: tag, then depth, then insertion sequence number.
type OrderKey = (Tag, usize, u64);

/// An ordered container of events.
///
/// Events are ordered by tag, then by the topological depth of their
/// destination, and finally by insertion order, so that equal-tag events are
/// always extracted in the same order from one run to the next.
///
/// Events are stored in an arena and are referred to by an [`EventId`],
/// which allows the removal of arbitrary events in *O*(log(*N*)) time.
pub struct EventQueue {
    events: Slab<Stored>,
    order: BTreeMap<OrderKey, usize>,
    next_seq: u64,
}

struct Stored {
    event: Event,
    seq: u64,
}

impl Stored {
    fn order_key(&self) -> OrderKey {
        (self.event.tag, self.event.depth, self.seq)
    }

    fn id(&self, key: usize) -> EventId {
        EventId { key, seq: self.seq }
    }
}

impl EventQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            events: Slab::new(),
            order: BTreeMap::new(),
            next_seq: 0,
        }
    }

    /// Returns the number of queued events.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Checks whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Inserts an event and returns its handle.
    pub fn insert(&mut self, event: Event) -> EventId {
        let seq = self.next_seq;
        self.next_seq += 1;

        let key = self.events.insert(Stored { event, seq });
        let stored = &self.events[key];
        self.order.insert(stored.order_key(), key);

        stored.id(key)
    }

    /// Returns the event with the lowest tag, leaving it in the queue.
    pub fn peek_min(&self) -> Option<&Event> {
        self.peek_min_entry().map(|(_, event)| event)
    }

    /// Returns the handle and the event with the lowest tag, leaving it in
    /// the queue.
    pub fn peek_min_entry(&self) -> Option<(EventId, &Event)> {
        let (_, &key) = self.order.first_key_value()?;
        let stored = &self.events[key];

        Some((stored.id(key), &stored.event))
    }

    /// Returns the event associated to a handle, if it is still queued.
    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.events
            .get(id.key)
            .filter(|stored| stored.seq == id.seq)
            .map(|stored| &stored.event)
    }

    /// Iterates over all queued events in processing order.
    pub fn iter(&self) -> impl Iterator<Item = (EventId, &Event)> + '_ {
        self.order.values().map(move |&key| {
            let stored = &self.events[key];
            (stored.id(key), &stored.event)
        })
    }

    /// Removes and returns the reference event together with all events
    /// sharing its tag for which `same_group(reference, other)` is true.
    ///
    /// The reference event is always the first element of the returned
    /// vector, followed by the other events in processing order. Since the
    /// queue is tag-sorted, the scan stops at the first event with a later
    /// tag. An empty vector is returned if the reference event is no longer
    /// queued.
    pub fn take_same_tag_group<F>(&mut self, reference: EventId, mut same_group: F) -> Vec<Event>
    where
        F: FnMut(&Event, &Event) -> bool,
    {
        let Some(reference_event) = self.get(reference) else {
            return Vec::new();
        };
        let tag = reference_event.tag;

        let mut members = Vec::new();
        for (&order_key, &key) in self.order.range((tag, 0, 0)..) {
            if order_key.0 != tag {
                break;
            }
            if key != reference.key && same_group(reference_event, &self.events[key].event) {
                members.push(key);
            }
        }

        let mut group = Vec::with_capacity(members.len() + 1);
        group.extend(self.remove(reference));
        for key in members {
            let stored = self.events.remove(key);
            self.order.remove(&stored.order_key());
            group.push(stored.event);
        }

        group
    }

    /// Removes an event, returning it if it was still queued.
    pub fn remove(&mut self, id: EventId) -> Option<Event> {
        self.get(id)?;

        let stored = self.events.remove(id.key);
        self.order.remove(&stored.order_key());

        Some(stored.event)
    }

    /// Removes all events matching a predicate and returns them in
    /// processing order.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<Event>
    where
        F: FnMut(&Event) -> bool,
    {
        let keys: Vec<_> = self
            .order
            .iter()
            .filter(|&(_, &key)| predicate(&self.events[key].event))
            .map(|(&order_key, &key)| (order_key, key))
            .collect();

        keys.into_iter()
            .map(|(order_key, key)| {
                self.order.remove(&order_key);
                self.events.remove(key).event
            })
            .collect()
    }

    /// Removes all events.
    pub fn clear(&mut self) {
        self.events.clear();
        self.order.clear();
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
