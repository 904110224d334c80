use crate::event::Event;

use super::{DeliveredMessage, ProtocolEvent};

/// Intent produced by the pure [`ProtocolState`](super::state::ProtocolState).
///
/// Every handler returns a `Vec<RuntimeEffect>`; the loop then carries
/// them out through the transport and the application channels.
#[derive(Debug)]
pub enum RuntimeEffect {
    /// Send an event to every other member of the group.
    Multicast(Event),

    /// Hand a DATA event to the application, in total order.
    Deliver(DeliveredMessage),

    /// Notify the application of a protocol-level event.
    Emit(ProtocolEvent),
}
