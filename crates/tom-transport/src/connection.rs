use crate::config::TomNodeConfig;
use crate::node::TransportStats;
use crate::protocol::write_framed;
use crate::{NodeId, PeerAddr, TomTransportError};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

/// A known peer and, once something was sent to it, its lane.
struct PeerSlot {
    addr: PeerAddr,
    lane: Option<mpsc::Sender<Vec<u8>>>,
}

/// One outbound lane per peer. A lane is a bounded queue drained by a
/// worker task that sends frames one at a time, in order.
///
/// The lane is spawned on first use.
pub(crate) struct OutboundLanes {
    peers: Mutex<HashMap<NodeId, PeerSlot>>,
    config: Arc<TomNodeConfig>,
    stats: Arc<TransportStats>,
    cancel: CancellationToken,
}

impl OutboundLanes {
    pub fn new(
        config: Arc<TomNodeConfig>,
        stats: Arc<TransportStats>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            peers: Mutex::new(HashMap::new()),
            config,
            stats,
            cancel,
        }
    }

    /// Register or replace a peer address. A replaced lane finishes the
    /// frames already queued on it against the old address.
    pub fn add_peer(&self, id: NodeId, addr: PeerAddr) {
        self.lock_peers().insert(id, PeerSlot { addr, lane: None });
    }

    pub fn peers(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.lock_peers().keys().copied().collect();
        ids.sort();
        ids
    }

    /// Queue a frame for `to`. Never waits.
    pub fn enqueue(&self, to: NodeId, data: Vec<u8>) -> Result<(), TomTransportError> {
        let lane = {
            let mut peers = self.lock_peers();
            let slot = peers.get_mut(&to).ok_or(TomTransportError::UnknownPeer(to))?;
            match &slot.lane {
                Some(tx) if !tx.is_closed() => tx.clone(),
                _ => {
                    let tx = self.spawn_lane(to, slot.addr.clone());
                    slot.lane = Some(tx.clone());
                    tx
                }
            }
        };

        match lane.try_send(data) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.stats.sends_abandoned.inc();
                Err(TomTransportError::QueueFull(to))
            }
            Err(TrySendError::Closed(_)) => Err(TomTransportError::Shutdown),
        }
    }

    fn spawn_lane(&self, peer: NodeId, addr: PeerAddr) -> mpsc::Sender<Vec<u8>> {
        let (tx, rx) = mpsc::channel(self.config.lane_capacity);
        tokio::spawn(run_lane(
            peer,
            addr,
            rx,
            self.config.clone(),
            self.stats.clone(),
            self.cancel.clone(),
        ));
        tx
    }

    fn lock_peers(&self) -> std::sync::MutexGuard<'_, HashMap<NodeId, PeerSlot>> {
        self.peers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lane worker: send each queued frame with bounded retry, then move on.
async fn run_lane(
    peer: NodeId,
    addr: PeerAddr,
    mut rx: mpsc::Receiver<Vec<u8>>,
    config: Arc<TomNodeConfig>,
    stats: Arc<TransportStats>,
    cancel: CancellationToken,
) {
    loop {
        let data = tokio::select! {
            _ = cancel.cancelled() => break,
            next = rx.recv() => match next {
                Some(data) => data,
                None => break,
            },
        };

        let mut attempt = 1;
        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => return,
                r = deliver_once(peer, &addr, &data, &config) => r,
            };

            match result {
                Ok(()) => {
                    stats.frames_sent.inc();
                    break;
                }
                Err(e) if attempt < config.send_attempts => {
                    stats.send_retries.inc();
                    tracing::debug!(%peer, %addr, attempt, "send failed, retrying: {e}");
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(config.backoff_for(attempt)) => {}
                    }
                    attempt += 1;
                }
                Err(e) => {
                    stats.sends_abandoned.inc();
                    tracing::warn!(%peer, %addr, attempts = attempt, "dropping frame: {e}");
                    break;
                }
            }
        }
    }

    tracing::trace!(%peer, "lane stopped");
}

/// One connection, one frame. Succeeds once the receiver closes its side.
async fn deliver_once(
    peer: NodeId,
    addr: &PeerAddr,
    data: &[u8],
    config: &TomNodeConfig,
) -> Result<(), TomTransportError> {
    let connect = TcpStream::connect((addr.host.as_str(), addr.port));
    let mut stream = match tokio::time::timeout(config.connect_timeout, connect).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(TomTransportError::Connect {
                node_id: peer,
                source,
            })
        }
        Err(_) => return Err(TomTransportError::Timeout(config.connect_timeout)),
    };
    let _ = stream.set_nodelay(true);

    let exchange = async {
        write_framed(&mut stream, data).await?;
        stream.shutdown().await?;
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await?;
        Ok::<_, std::io::Error>(())
    };

    match tokio::time::timeout(config.io_timeout, exchange).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(TomTransportError::Send {
            node_id: peer,
            source,
        }),
        Err(_) => Err(TomTransportError::Timeout(config.io_timeout)),
    }
}
