//! ToM Protocol layer.
//!
//! Total-order multicast over a fixed process group, on top of
//! `tom-transport` (one frame per TCP connection).
//!
//! Every DATA event carries a Lamport timestamp and is acknowledged by
//! every member that admits it. A member delivers the smallest held-back
//! DATA, ordered by `(lamport_ts, origin, msg_id)`, once it has seen a
//! timestamp at least that large from every member of the group.
//!
//! Wire format: MessagePack (compact binary).

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod holdback;
pub mod runtime;
pub mod stats;
pub mod traffic;
pub mod types;

pub use clock::LamportClock;
pub use config::{Dictionary, PeerTable};
pub use error::TomProtocolError;
pub use event::{AckEvent, DataEvent, Event, OrderKey, WireEvent};
pub use holdback::HoldbackQueue;
pub use runtime::{
    DeliveredMessage, Lifecycle, ProtocolEvent, ProtocolRuntime, ProtocolState, RuntimeChannels,
    RuntimeConfig, RuntimeEffect, RuntimeHandle, StateSnapshot,
};
pub use stats::ProtocolStats;
pub use traffic::{TrafficConfig, TrafficSource};
pub use types::{MessageId, MessageType, NodeId};
pub use tom_transport::{PeerAddr, TomNodeConfig, TransportStats};
