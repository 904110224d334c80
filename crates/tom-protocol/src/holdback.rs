//! Holdback queue: DATA events waiting for the delivery predicate.
//!
//! Entries are kept in total order (see [`OrderKey`]). The dedup set
//! remembers every msg id ever admitted and is never pruned, so a DATA
//! that arrives again after delivery is still recognised.
use std::collections::{BTreeMap, HashSet};

use crate::clock::LamportClock;
use crate::event::{DataEvent, OrderKey};
use crate::types::MessageId;

#[derive(Debug, Default)]
pub struct HoldbackQueue {
    pending: BTreeMap<OrderKey, DataEvent>,
    seen: HashSet<MessageId>,
}

impl HoldbackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a DATA event. Returns `false` if its msg id was admitted before.
    pub fn offer_data(&mut self, event: DataEvent) -> bool {
        if !self.seen.insert(event.msg_id.clone()) {
            return false;
        }
        self.pending.insert(event.order_key(), event);
        true
    }

    /// Smallest pending event, if any.
    pub fn peek_min(&self) -> Option<&DataEvent> {
        self.pending.values().next()
    }

    /// Remove and return the smallest pending event.
    pub fn pop_min(&mut self) -> Option<DataEvent> {
        self.pending.pop_first().map(|(_, event)| event)
    }

    /// Delivery predicate: every member has been seen at or past `event`.
    pub fn can_deliver(&self, event: &DataEvent, clock: &LamportClock) -> bool {
        clock.all_seen(event.lamport_ts)
    }

    /// Pop the head if it satisfies the delivery predicate.
    pub fn pop_ready(&mut self, clock: &LamportClock) -> Option<DataEvent> {
        let ready = self
            .peek_min()
            .is_some_and(|head| self.can_deliver(head, clock));
        if ready {
            self.pop_min()
        } else {
            None
        }
    }

    /// Number of events still held back.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether `msg_id` was ever admitted (pending or already delivered).
    pub fn contains(&self, msg_id: &MessageId) -> bool {
        self.seen.contains(msg_id)
    }
}
