//! Protocol events and their wire codec.
//!
//! An [`Event`] is either a DATA multicast carrying a word or an ACK for
//! one. Events are immutable once built. On the wire every event is the
//! same flat record ([`WireEvent`]), MessagePack-encoded with field names;
//! decoding validates that the record is a well-formed DATA or ACK.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TomProtocolError;
use crate::types::{MessageId, MessageType, NodeId};

/// `origin_pid` value carried by ACK records.
pub const NO_ORIGIN: i64 = -1;

/// A word multicast by its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEvent {
    pub msg_id: MessageId,
    pub origin: NodeId,
    pub lamport_ts: u64,
    pub word: String,
}

/// Acknowledgement of `msg_id`, broadcast by `sender` at its own clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckEvent {
    pub msg_id: MessageId,
    pub sender: NodeId,
    pub lamport_ts: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Data(DataEvent),
    Ack(AckEvent),
}

/// Total-order key: `(lamport_ts, origin, msg_id)`, compared lexicographically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderKey {
    pub lamport_ts: u64,
    pub origin: NodeId,
    pub msg_id: MessageId,
}

impl DataEvent {
    pub fn new(msg_id: MessageId, origin: NodeId, lamport_ts: u64, word: impl Into<String>) -> Self {
        Self {
            msg_id,
            origin,
            lamport_ts,
            word: word.into(),
        }
    }

    pub fn order_key(&self) -> OrderKey {
        OrderKey {
            lamport_ts: self.lamport_ts,
            origin: self.origin,
            msg_id: self.msg_id.clone(),
        }
    }
}

impl AckEvent {
    pub fn new(msg_id: MessageId, sender: NodeId, lamport_ts: u64) -> Self {
        Self {
            msg_id,
            sender,
            lamport_ts,
        }
    }
}

impl Event {
    pub fn message_type(&self) -> MessageType {
        match self {
            Event::Data(_) => MessageType::Data,
            Event::Ack(_) => MessageType::Ack,
        }
    }

    pub fn msg_id(&self) -> &MessageId {
        match self {
            Event::Data(d) => &d.msg_id,
            Event::Ack(a) => &a.msg_id,
        }
    }

    /// Whoever put this event on the wire: the origin for DATA, the acker for ACK.
    pub fn sender(&self) -> NodeId {
        match self {
            Event::Data(d) => d.origin,
            Event::Ack(a) => a.sender,
        }
    }

    pub fn lamport_ts(&self) -> u64 {
        match self {
            Event::Data(d) => d.lamport_ts,
            Event::Ack(a) => a.lamport_ts,
        }
    }

    /// Dedup identity: two events are the same logical message iff this matches.
    pub fn identity(&self) -> (MessageType, &MessageId) {
        (self.message_type(), self.msg_id())
    }

    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TomProtocolError> {
        rmp_serde::to_vec_named(&WireEvent::from(self)).map_err(Into::into)
    }

    /// Deserialize and validate MessagePack bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, TomProtocolError> {
        let wire: WireEvent = rmp_serde::from_slice(data)?;
        Event::try_from(wire)
    }
}

impl From<DataEvent> for Event {
    fn from(d: DataEvent) -> Self {
        Event::Data(d)
    }
}

impl From<AckEvent> for Event {
    fn from(a: AckEvent) -> Self {
        Event::Ack(a)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Data(d) => write!(
                f,
                "DATA{{msg_id={}, origin={}, ts={}, word={}}}",
                d.msg_id, d.origin, d.lamport_ts, d.word
            ),
            Event::Ack(a) => write!(
                f,
                "ACK{{msg_id={}, sender={}, ts={}}}",
                a.msg_id, a.sender, a.lamport_ts
            ),
        }
    }
}

// ── Wire record ─────────────────────────────────────────────────────────

/// Largest timestamp accepted off the wire; the field is a signed 64-bit
/// integer in the record schema.
pub const MAX_WIRE_LAMPORT_TS: u64 = i64::MAX as u64;

/// Flat wire record shared by both variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    pub variant: MessageType,
    pub msg_id: String,
    /// Origin pid for DATA, [`NO_ORIGIN`] for ACK.
    pub origin_pid: i64,
    pub sender_pid: i64,
    pub lamport_ts: u64,
    #[serde(default)]
    pub word: Option<String>,
}

impl From<&Event> for WireEvent {
    fn from(event: &Event) -> Self {
        match event {
            Event::Data(d) => WireEvent {
                variant: MessageType::Data,
                msg_id: d.msg_id.0.clone(),
                origin_pid: i64::from(d.origin.get()),
                sender_pid: i64::from(d.origin.get()),
                lamport_ts: d.lamport_ts,
                word: Some(d.word.clone()),
            },
            Event::Ack(a) => WireEvent {
                variant: MessageType::Ack,
                msg_id: a.msg_id.0.clone(),
                origin_pid: NO_ORIGIN,
                sender_pid: i64::from(a.sender.get()),
                lamport_ts: a.lamport_ts,
                word: None,
            },
        }
    }
}

impl TryFrom<WireEvent> for Event {
    type Error = TomProtocolError;

    fn try_from(wire: WireEvent) -> Result<Self, Self::Error> {
        if wire.msg_id.is_empty() {
            return Err(TomProtocolError::invalid_event("empty msg_id"));
        }
        let sender = pid_from_wire(wire.sender_pid, "sender_pid")?;
        if wire.lamport_ts > MAX_WIRE_LAMPORT_TS {
            return Err(TomProtocolError::invalid_event(format!(
                "lamport_ts out of range: {}",
                wire.lamport_ts
            )));
        }

        match wire.variant {
            MessageType::Data => {
                let origin = pid_from_wire(wire.origin_pid, "origin_pid")?;
                if origin != sender {
                    return Err(TomProtocolError::invalid_event(format!(
                        "DATA sender_pid {} differs from origin_pid {}",
                        wire.sender_pid, wire.origin_pid
                    )));
                }
                let word = wire
                    .word
                    .ok_or_else(|| TomProtocolError::invalid_event("DATA without word"))?;
                Ok(Event::Data(DataEvent {
                    msg_id: MessageId(wire.msg_id),
                    origin,
                    lamport_ts: wire.lamport_ts,
                    word,
                }))
            }
            MessageType::Ack => {
                if wire.origin_pid != NO_ORIGIN {
                    return Err(TomProtocolError::invalid_event(format!(
                        "ACK with origin_pid {}",
                        wire.origin_pid
                    )));
                }
                if wire.word.is_some() {
                    return Err(TomProtocolError::invalid_event("ACK carrying a word"));
                }
                Ok(Event::Ack(AckEvent {
                    msg_id: MessageId(wire.msg_id),
                    sender,
                    lamport_ts: wire.lamport_ts,
                }))
            }
        }
    }
}

fn pid_from_wire(pid: i64, field: &str) -> Result<NodeId, TomProtocolError> {
    u32::try_from(pid)
        .map(NodeId::new)
        .map_err(|_| TomProtocolError::invalid_event(format!("{field} out of range: {pid}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(id: &str, origin: u32, ts: u64) -> DataEvent {
        DataEvent::new(id.into(), NodeId::new(origin), ts, "palavra")
    }

    fn encode_wire(wire: &WireEvent) -> Vec<u8> {
        rmp_serde::to_vec_named(wire).unwrap()
    }

    #[test]
    fn order_key_is_lexicographic() {
        let a = data("m-b", 2, 1).order_key();
        let b = data("m-a", 0, 2).order_key();
        let c = data("m-a", 1, 2).order_key();
        let d = data("m-b", 1, 2).order_key();
        assert!(a < b, "lamport_ts dominates");
        assert!(b < c, "origin breaks timestamp ties");
        assert!(c < d, "msg_id breaks the remaining ties");
    }

    #[test]
    fn data_and_ack_with_same_id_are_distinct_messages() {
        let d = Event::Data(data("m1", 0, 1));
        let a = Event::Ack(AckEvent::new("m1".into(), NodeId::new(0), 2));
        assert_eq!(d.msg_id(), a.msg_id());
        assert_ne!(d.identity(), a.identity());
    }

    #[test]
    fn ack_goes_on_the_wire_without_origin() {
        let ack = Event::Ack(AckEvent::new("m1".into(), NodeId::new(3), 9));
        let wire = WireEvent::from(&ack);
        assert_eq!(wire.origin_pid, NO_ORIGIN);
        assert_eq!(wire.sender_pid, 3);
        assert!(wire.word.is_none());
        assert_eq!(Event::from_bytes(&ack.to_bytes().unwrap()).unwrap(), ack);
    }

    #[test]
    fn data_decodes_back() {
        let event = Event::Data(data("m7", 4, 12));
        let decoded = Event::from_bytes(&event.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, event);
        assert_eq!(decoded.sender(), NodeId::new(4));
    }

    #[test]
    fn garbage_is_a_deserialization_error() {
        let err = Event::from_bytes(b"\xc1\xc1 not msgpack").unwrap_err();
        assert!(matches!(err, TomProtocolError::Deserialization(_)));
    }

    #[test]
    fn data_without_word_rejected() {
        let wire = WireEvent {
            variant: MessageType::Data,
            msg_id: "m1".into(),
            origin_pid: 1,
            sender_pid: 1,
            lamport_ts: 3,
            word: None,
        };
        let err = Event::from_bytes(&encode_wire(&wire)).unwrap_err();
        assert!(err.to_string().contains("without word"));
    }

    #[test]
    fn data_with_foreign_sender_rejected() {
        let wire = WireEvent {
            variant: MessageType::Data,
            msg_id: "m1".into(),
            origin_pid: 1,
            sender_pid: 2,
            lamport_ts: 3,
            word: Some("x".into()),
        };
        assert!(Event::from_bytes(&encode_wire(&wire)).is_err());
    }

    #[test]
    fn ack_with_origin_rejected() {
        let wire = WireEvent {
            variant: MessageType::Ack,
            msg_id: "m1".into(),
            origin_pid: 0,
            sender_pid: 2,
            lamport_ts: 3,
            word: None,
        };
        assert!(Event::from_bytes(&encode_wire(&wire)).is_err());
    }

    #[test]
    fn negative_sender_rejected() {
        let wire = WireEvent {
            variant: MessageType::Ack,
            msg_id: "m1".into(),
            origin_pid: NO_ORIGIN,
            sender_pid: -5,
            lamport_ts: 3,
            word: None,
        };
        let err = Event::from_bytes(&encode_wire(&wire)).unwrap_err();
        assert!(err.to_string().contains("sender_pid out of range"));
    }

    #[test]
    fn timestamp_beyond_i64_rejected() {
        let mut wire = WireEvent {
            variant: MessageType::Ack,
            msg_id: "m1".into(),
            origin_pid: NO_ORIGIN,
            sender_pid: 1,
            lamport_ts: u64::MAX,
            word: None,
        };
        let err = Event::from_bytes(&encode_wire(&wire)).unwrap_err();
        assert!(err.to_string().contains("lamport_ts out of range"));

        wire.lamport_ts = MAX_WIRE_LAMPORT_TS;
        assert_eq!(
            Event::from_bytes(&encode_wire(&wire)).unwrap().lamport_ts(),
            MAX_WIRE_LAMPORT_TS
        );
    }

    #[test]
    fn empty_msg_id_rejected() {
        let wire = WireEvent {
            variant: MessageType::Ack,
            msg_id: String::new(),
            origin_pid: NO_ORIGIN,
            sender_pid: 0,
            lamport_ts: 1,
            word: None,
        };
        assert!(Event::from_bytes(&encode_wire(&wire)).is_err());
    }

    #[test]
    fn display_mirrors_variant() {
        let d = Event::Data(data("m1", 0, 1));
        assert_eq!(d.to_string(), "DATA{msg_id=m1, origin=p0, ts=1, word=palavra}");
    }
}
