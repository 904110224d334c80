/// The protocol runtime event loop.
///
/// A single async task that owns the ordering state and multiplexes over
/// inbound frames, application commands, the drain poll and cancellation.
/// Inbound connections are still read in parallel by the transport; only
/// the decoded bytes reach this task.
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tom_transport::{TomNode, TomTransportError};

use super::executor::execute_effects;
use super::state::ProtocolState;
use super::{DeliveredMessage, ProtocolEvent, RuntimeCommand};

/// Main event loop. Owns all protocol state.
pub(super) async fn runtime_loop(
    mut node: TomNode,
    mut state: ProtocolState,
    drain_poll_interval: Duration,
    mut cmd_rx: mpsc::Receiver<RuntimeCommand>,
    delivered_tx: mpsc::Sender<DeliveredMessage>,
    event_tx: mpsc::Sender<ProtocolEvent>,
    cancel: CancellationToken,
) {
    let stats = state.stats();
    let mut drain_poll = tokio::time::interval(drain_poll_interval);
    drain_poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    drain_poll.tick().await;

    tracing::info!(node = %state.local_id(), addr = %node.local_addr(), "runtime started");

    loop {
        let effects = tokio::select! {
            _ = cancel.cancelled() => break,

            // ── 1. Incoming frame from transport ────────────────
            result = node.recv_raw() => match result {
                Ok((from, data)) => {
                    tracing::trace!(%from, len = data.len(), "frame received");
                    state.handle_incoming(&data)
                }
                Err(TomTransportError::Shutdown) => break,
                Err(e) => {
                    tracing::warn!("receive failed: {e}");
                    continue;
                }
            },

            // ── 2. Commands from the application ────────────────
            Some(cmd) = cmd_rx.recv() => match cmd {
                RuntimeCommand::Originate { word } => state.originate(word),
                RuntimeCommand::Snapshot { reply } => {
                    let _ = reply.send(state.snapshot());
                    continue;
                }
                RuntimeCommand::Shutdown => break,
            },

            // ── 3. Timer: drain poll ────────────────────────────
            _ = drain_poll.tick() => state.drain_ready(),
        };

        execute_effects(effects, &node, &delivered_tx, &event_tx, &stats).await;
    }

    node.shutdown();
    tracing::info!(
        node = %state.local_id(),
        delivered = stats.delivered.get(),
        pending = state.holdback().len(),
        "runtime stopped"
    );
}
