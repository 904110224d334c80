//! Effect executor, the only place that touches I/O.
//!
//! - Multicast -> encode once, transport.send_raw() to every peer
//! - Deliver -> delivered_tx.try_send()
//! - Emit -> event_tx.try_send()
//!
//! Nothing here blocks the loop: sends only enqueue and the application
//! channels are fed with `try_send`.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::event::Event;
use crate::stats::ProtocolStats;

use super::effect::RuntimeEffect;
use super::transport::Transport;
use super::{DeliveredMessage, ProtocolEvent};

/// Execute a list of effects using the given transport and channels.
pub(super) async fn execute_effects<T: Transport>(
    effects: Vec<RuntimeEffect>,
    transport: &T,
    delivered_tx: &mpsc::Sender<DeliveredMessage>,
    event_tx: &mpsc::Sender<ProtocolEvent>,
    stats: &ProtocolStats,
) {
    for effect in effects {
        match effect {
            RuntimeEffect::Multicast(event) => {
                multicast(transport, &event, event_tx).await;
            }
            RuntimeEffect::Deliver(msg) => match delivered_tx.try_send(msg) {
                Ok(()) => {}
                Err(TrySendError::Full(msg)) => {
                    stats.deliveries_dropped.inc();
                    tracing::warn!(msg_id = %msg.msg_id, "delivery channel full, notification dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    stats.deliveries_dropped.inc();
                }
            },
            RuntimeEffect::Emit(event) => {
                let _ = event_tx.try_send(event);
            }
        }
    }
}

/// Send an event to every peer. Failures are logged and reported, never retried here.
async fn multicast<T: Transport>(
    transport: &T,
    event: &Event,
    event_tx: &mpsc::Sender<ProtocolEvent>,
) {
    let bytes = match event.to_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(msg_id = %event.msg_id(), "encode failed: {e}");
            let _ = event_tx.try_send(ProtocolEvent::Error {
                description: format!("encode {} failed: {e}", event.message_type()),
            });
            return;
        }
    };

    for peer in transport.peers() {
        if let Err(e) = transport.send_raw(peer, &bytes).await {
            tracing::warn!(%peer, msg_id = %event.msg_id(), "send failed: {e}");
            let _ = event_tx.try_send(ProtocolEvent::Error {
                description: format!("send to {peer} failed: {e}"),
            });
        }
    }
}
