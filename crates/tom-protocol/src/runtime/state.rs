use std::sync::Arc;

use crate::clock::LamportClock;
use crate::event::{AckEvent, DataEvent, Event};
use crate::holdback::HoldbackQueue;
use crate::stats::ProtocolStats;
use crate::types::{MessageId, NodeId};

use super::effect::RuntimeEffect;
use super::{DeliveredMessage, ProtocolEvent, StateSnapshot};

/// Complete ordering state of one member: pure logic, no async, no network.
///
/// Every `handle_*` / `originate` call returns `Vec<RuntimeEffect>` and ends
/// with a drain pass, so deliveries made possible by a state change are in
/// the same batch.
pub struct ProtocolState {
    local_id: NodeId,
    clock: LamportClock,
    holdback: HoldbackQueue,
    stats: Arc<ProtocolStats>,
}

impl ProtocolState {
    /// State for member `local_id` of a group of `group_size`.
    pub fn new(local_id: NodeId, group_size: usize, stats: Arc<ProtocolStats>) -> Self {
        Self {
            local_id,
            clock: LamportClock::new(local_id, group_size),
            holdback: HoldbackQueue::new(),
            stats,
        }
    }

    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    pub fn stats(&self) -> Arc<ProtocolStats> {
        self.stats.clone()
    }

    pub fn clock(&self) -> &LamportClock {
        &self.clock
    }

    pub fn holdback(&self) -> &HoldbackQueue {
        &self.holdback
    }

    // ── Local origination ──────────────────────────────────────────────

    /// Multicast a new word, then acknowledge it like any receiver would.
    pub fn originate(&mut self, word: String) -> Vec<RuntimeEffect> {
        let ts = self.clock.tick();
        let data = DataEvent::new(MessageId::new(), self.local_id, ts, word);
        let msg_id = data.msg_id.clone();
        tracing::info!(msg_id = %msg_id, lamport_ts = ts, word = %data.word, "originate");

        let mut effects = vec![RuntimeEffect::Emit(ProtocolEvent::DataOriginated {
            msg_id: msg_id.clone(),
            lamport_ts: ts,
            word: data.word.clone(),
        })];
        self.holdback.offer_data(data.clone());
        self.stats.originated.inc();
        effects.push(RuntimeEffect::Multicast(Event::Data(data)));
        effects.push(self.ack(msg_id));

        self.record_watermarks();
        effects.extend(self.drain_ready());
        effects
    }

    // ── Inbound ────────────────────────────────────────────────────────

    /// Decode and process one inbound frame.
    pub fn handle_incoming(&mut self, data: &[u8]) -> Vec<RuntimeEffect> {
        match Event::from_bytes(data) {
            Ok(event) => self.handle_event(event),
            Err(e) => self.malformed(e.to_string()),
        }
    }

    /// Process one decoded event.
    pub fn handle_event(&mut self, event: Event) -> Vec<RuntimeEffect> {
        let sender = event.sender();
        if !self.clock.is_member(sender) {
            return self.malformed(format!("{sender} is not a group member"));
        }
        self.clock.observe(sender, event.lamport_ts());

        let mut effects = Vec::new();
        match event {
            Event::Data(data) => {
                self.stats.data_received.inc();
                let msg_id = data.msg_id.clone();
                tracing::trace!(msg_id = %msg_id, origin = %data.origin, lamport_ts = data.lamport_ts, "data received");
                if self.holdback.offer_data(data) {
                    effects.push(self.ack(msg_id));
                } else {
                    self.stats.duplicates.inc();
                    tracing::debug!(msg_id = %msg_id, "duplicate data ignored");
                }
            }
            Event::Ack(ack) => {
                self.stats.acks_received.inc();
                tracing::trace!(msg_id = %ack.msg_id, sender = %ack.sender, lamport_ts = ack.lamport_ts, "ack received");
            }
        }

        self.record_watermarks();
        effects.extend(self.drain_ready());
        effects
    }

    // ── Delivery ───────────────────────────────────────────────────────

    /// Deliver every head of the holdback queue that the predicate admits.
    pub fn drain_ready(&mut self) -> Vec<RuntimeEffect> {
        let mut effects = Vec::new();
        while let Some(data) = self.holdback.pop_ready(&self.clock) {
            self.stats.delivered.inc();
            tracing::info!(
                msg_id = %data.msg_id,
                origin = %data.origin,
                lamport_ts = data.lamport_ts,
                word = %data.word,
                "deliver"
            );
            tracing::debug!(last_seen = ?self.clock.last_seen(), "clock at delivery");
            effects.push(RuntimeEffect::Deliver(DeliveredMessage {
                word: data.word,
                origin: data.origin,
                lamport_ts: data.lamport_ts,
                msg_id: data.msg_id,
            }));
        }
        effects
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            lamport: self.clock.lamport(),
            last_seen: self.clock.last_seen().to_vec(),
            holdback_len: self.holdback.len(),
        }
    }

    // ── Helpers ────────────────────────────────────────────────────────

    fn ack(&mut self, msg_id: MessageId) -> RuntimeEffect {
        let ts = self.clock.tick();
        self.stats.acks_sent.inc();
        tracing::debug!(msg_id = %msg_id, lamport_ts = ts, "ack");
        RuntimeEffect::Multicast(Event::Ack(AckEvent::new(msg_id, self.local_id, ts)))
    }

    fn malformed(&mut self, reason: String) -> Vec<RuntimeEffect> {
        self.stats.malformed.inc();
        tracing::warn!("dropping malformed event: {reason}");
        vec![RuntimeEffect::Emit(ProtocolEvent::MalformedEvent { reason })]
    }

    fn record_watermarks(&self) {
        self.stats.lamport.observe(self.clock.lamport());
        self.stats.holdback_peak.observe(self.holdback.len() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{WireEvent, NO_ORIGIN};
    use crate::types::MessageType;

    const P0: NodeId = NodeId::new(0);
    const P1: NodeId = NodeId::new(1);
    const P2: NodeId = NodeId::new(2);

    fn state(local: NodeId, n: usize) -> ProtocolState {
        ProtocolState::new(local, n, Arc::new(ProtocolStats::default()))
    }

    fn multicasts(effects: &[RuntimeEffect]) -> Vec<&Event> {
        effects
            .iter()
            .filter_map(|e| match e {
                RuntimeEffect::Multicast(ev) => Some(ev),
                _ => None,
            })
            .collect()
    }

    fn deliveries(effects: &[RuntimeEffect]) -> Vec<&DeliveredMessage> {
        effects
            .iter()
            .filter_map(|e| match e {
                RuntimeEffect::Deliver(d) => Some(d),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn originate_sends_data_then_own_ack() {
        let mut s = state(P0, 3);
        let effects = s.originate("ola".into());
        let sent = multicasts(&effects);

        assert_eq!(sent.len(), 2);
        let Event::Data(data) = sent[0] else { panic!("data first") };
        let Event::Ack(ack) = sent[1] else { panic!("then ack") };
        assert_eq!(data.lamport_ts, 1);
        assert_eq!(ack.lamport_ts, 2);
        assert_eq!(ack.msg_id, data.msg_id);
        assert_eq!(ack.sender, P0);
        assert_eq!(s.holdback().len(), 1);
        assert!(deliveries(&effects).is_empty());
        assert!(matches!(
            effects[0],
            RuntimeEffect::Emit(ProtocolEvent::DataOriginated { lamport_ts: 1, .. })
        ));
    }

    #[test]
    fn single_member_group_delivers_immediately() {
        let mut s = state(P0, 1);
        let effects = s.originate("so".into());
        let delivered = deliveries(&effects);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].word, "so");
        assert!(s.holdback().is_empty());
    }

    #[test]
    fn duplicate_data_is_acked_once() {
        let mut s = state(P1, 3);
        let data = Event::Data(DataEvent::new("m1".into(), P0, 1, "w"));

        let first = s.handle_event(data.clone());
        let second = s.handle_event(data);

        assert_eq!(multicasts(&first).len(), 1);
        assert!(multicasts(&second).is_empty());
        assert_eq!(s.holdback().len(), 1);
        assert_eq!(s.stats().duplicates.get(), 1);
        assert_eq!(s.stats().data_received.get(), 2);
    }

    #[test]
    fn duplicate_still_advances_clock() {
        let mut s = state(P1, 2);
        let data = Event::Data(DataEvent::new("m1".into(), P0, 1, "w"));
        s.handle_event(data.clone());
        let before = s.clock().lamport();
        s.handle_event(data);
        assert_eq!(s.clock().lamport(), before + 1);
    }

    #[test]
    fn delivers_once_every_member_caught_up() {
        let mut s = state(P0, 3);
        s.originate("a".into());

        let effects = s.handle_event(Event::Ack(AckEvent::new("x".into(), P1, 5)));
        assert!(deliveries(&effects).is_empty());

        let effects = s.handle_event(Event::Ack(AckEvent::new("y".into(), P2, 1)));
        let delivered = deliveries(&effects);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].word, "a");
        assert_eq!(s.stats().delivered.get(), 1);
    }

    #[test]
    fn non_member_is_malformed_and_clock_untouched() {
        let mut s = state(P0, 2);
        let effects = s.handle_event(Event::Ack(AckEvent::new("x".into(), NodeId::new(5), 40)));
        assert_eq!(s.clock().lamport(), 0);
        assert_eq!(s.stats().malformed.get(), 1);
        assert!(matches!(
            effects.as_slice(),
            [RuntimeEffect::Emit(ProtocolEvent::MalformedEvent { .. })]
        ));
    }

    #[test]
    fn garbage_frame_is_malformed() {
        let mut s = state(P0, 2);
        let effects = s.handle_incoming(b"nope");
        assert_eq!(effects.len(), 1);
        assert_eq!(s.stats().malformed.get(), 1);
    }

    #[test]
    fn oversized_timestamp_is_malformed_and_clock_untouched() {
        let mut s = state(P0, 2);
        s.originate("a".into());
        let wire = WireEvent {
            variant: MessageType::Ack,
            msg_id: "m9".into(),
            origin_pid: NO_ORIGIN,
            sender_pid: 1,
            lamport_ts: u64::MAX,
            word: None,
        };
        let bytes = rmp_serde::to_vec_named(&wire).unwrap();

        let effects = s.handle_incoming(&bytes);
        assert!(matches!(
            effects.as_slice(),
            [RuntimeEffect::Emit(ProtocolEvent::MalformedEvent { .. })]
        ));
        assert_eq!(s.stats().malformed.get(), 1);
        assert_eq!(s.clock().lamport(), 2);
        assert_eq!(s.clock().last_seen(), &[2, 0]);
    }

    #[test]
    fn snapshot_reflects_clock_and_queue() {
        let mut s = state(P0, 2);
        s.originate("a".into());
        let snap = s.snapshot();
        assert_eq!(snap.lamport, 2);
        assert_eq!(snap.last_seen, vec![2, 0]);
        assert_eq!(snap.holdback_len, 1);
        assert_eq!(s.stats().lamport.get(), 2);
        assert_eq!(s.stats().holdback_peak.get(), 1);
    }
}
