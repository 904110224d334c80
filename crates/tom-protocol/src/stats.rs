use tom_metrics::{Counter, Watermark};

/// Protocol counters, updated by the runtime loop and readable from any
/// thread through [`RuntimeHandle::stats`](crate::RuntimeHandle::stats).
#[derive(Debug, Default, serde::Serialize)]
pub struct ProtocolStats {
    /// DATA events originated locally.
    pub originated: Counter,
    /// DATA events received from peers, duplicates included.
    pub data_received: Counter,
    /// Received DATA events that were already admitted.
    pub duplicates: Counter,
    pub acks_sent: Counter,
    pub acks_received: Counter,
    pub delivered: Counter,
    /// Inbound frames that did not decode to a valid event.
    pub malformed: Counter,
    /// Deliveries not handed to the observer because its channel was full.
    pub deliveries_dropped: Counter,
    /// Highest local Lamport value reached.
    pub lamport: Watermark,
    /// Largest holdback queue length seen.
    pub holdback_peak: Watermark,
}
