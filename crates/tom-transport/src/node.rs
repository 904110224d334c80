use crate::config::TomNodeConfig;
use crate::connection::OutboundLanes;
use crate::protocol::{self, HandlerState};
use crate::{NodeId, PeerAddr, TomTransportError};

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tom_metrics::Counter;

/// Transport-level statistics, shared with the accept loop and lanes.
#[derive(Debug, Default, serde::Serialize)]
pub struct TransportStats {
    /// Frames acknowledged by their receiver.
    pub frames_sent: Counter,
    /// Frames read from inbound connections.
    pub frames_received: Counter,
    /// Failed attempts that were retried.
    pub send_retries: Counter,
    /// Frames given up on (retries exhausted or lane full).
    pub sends_abandoned: Counter,
    /// Inbound connections dropped for a bad or missing frame.
    pub frames_rejected: Counter,
}

/// A ToM transport node: listens, sends and receives frames.
///
/// Owns the listening socket and the outbound lanes. Dropping the node
/// (or calling [`shutdown`](Self::shutdown)) cancels all of its tasks.
pub struct TomNode {
    id: NodeId,
    local_addr: SocketAddr,
    lanes: OutboundLanes,
    incoming_rx: mpsc::Receiver<(SocketAddr, Vec<u8>)>,
    stats: Arc<TransportStats>,
    cancel: CancellationToken,
    max_message_size: usize,
}

impl TomNode {
    /// Bind the listening socket and register the remote peers.
    ///
    /// `peers` may include `id` itself; it is skipped. The node runs until
    /// `parent` is cancelled or the node is shut down.
    pub async fn bind(
        config: TomNodeConfig,
        id: NodeId,
        listen: &PeerAddr,
        peers: HashMap<NodeId, PeerAddr>,
        parent: &CancellationToken,
    ) -> Result<Self, TomTransportError> {
        config.validate()?;

        let listener = TcpListener::bind((listen.host.as_str(), listen.port))
            .await
            .map_err(|source| TomTransportError::Bind {
                addr: listen.clone(),
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TomTransportError::Bind {
                addr: listen.clone(),
                source,
            })?;

        let cancel = parent.child_token();
        let stats = Arc::new(TransportStats::default());
        let (incoming_tx, incoming_rx) = mpsc::channel(config.recv_buffer);

        let handler_state = Arc::new(HandlerState {
            incoming_tx,
            max_message_size: config.max_message_size,
            io_timeout: config.io_timeout,
            permits: Arc::new(Semaphore::new(config.max_inbound)),
            stats: stats.clone(),
        });
        tokio::spawn(protocol::accept_loop(
            listener,
            handler_state,
            cancel.clone(),
        ));

        let max_message_size = config.max_message_size;
        let lanes = OutboundLanes::new(Arc::new(config), stats.clone(), cancel.clone());
        for (peer, addr) in peers {
            if peer != id {
                lanes.add_peer(peer, addr);
            }
        }

        tracing::debug!(node = %id, %local_addr, "transport listening");

        Ok(Self {
            id,
            local_addr,
            lanes,
            incoming_rx,
            stats,
            cancel,
            max_message_size,
        })
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The address actually bound (resolves port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Remote peers, sorted by id.
    pub fn peers(&self) -> Vec<NodeId> {
        self.lanes.peers()
    }

    /// Add or replace a remote peer address.
    pub fn add_peer(&self, id: NodeId, addr: PeerAddr) {
        if id != self.id {
            self.lanes.add_peer(id, addr);
        }
    }

    /// Queue a frame for a peer.
    ///
    /// Returns once the frame is queued on the peer's lane; delivery,
    /// retries and the final drop happen in the background.
    pub fn send_raw(&self, to: NodeId, data: &[u8]) -> Result<(), TomTransportError> {
        if self.cancel.is_cancelled() {
            return Err(TomTransportError::Shutdown);
        }
        if data.len() > self.max_message_size {
            return Err(TomTransportError::MessageTooLarge {
                size: data.len(),
                max: self.max_message_size,
            });
        }
        if to == self.id {
            return Err(TomTransportError::UnknownPeer(to));
        }
        self.lanes.enqueue(to, data.to_vec())
    }

    /// Receive the next inbound frame and the address it came from.
    pub async fn recv_raw(&mut self) -> Result<(SocketAddr, Vec<u8>), TomTransportError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(TomTransportError::Shutdown),
            frame = self.incoming_rx.recv() => frame.ok_or(TomTransportError::Shutdown),
        }
    }

    pub fn stats(&self) -> Arc<TransportStats> {
        self.stats.clone()
    }

    /// Stop accepting, abandon queued and in-flight sends.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for TomNode {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for TomNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TomNode")
            .field("id", &self.id)
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}
