/// Protocol runtime: runs the ordering core as a live event loop.
///
/// The runtime owns a `TomNode` (transport) and the ordering state (clock
/// and holdback queue). It exposes a channel-based API so the application
/// never touches raw bytes or protocol internals.
mod effect;
mod executor;
mod r#loop;
mod state;
mod transport;

pub use effect::RuntimeEffect;
pub use state::ProtocolState;
pub use transport::Transport;

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tom_transport::{PeerAddr, TomNode, TomNodeConfig, TransportStats};

use crate::config::PeerTable;
use crate::error::TomProtocolError;
use crate::stats::ProtocolStats;
use crate::traffic::{TrafficConfig, TrafficSource};
use crate::types::{MessageId, NodeId};

// ── Configuration ─────────────────────────────────────────────────────

/// Configuration for the protocol runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// This member's id.
    pub local_id: NodeId,
    /// Group membership, self included.
    pub peers: PeerTable,
    /// Words the traffic source picks from.
    pub words: Vec<String>,
    /// Traffic generation; `None` leaves origination to the application.
    pub traffic: Option<TrafficConfig>,
    /// Host to listen on. The port comes from the peer table.
    pub listen_host: String,
    /// Interval for re-checking the holdback head.
    pub drain_poll_interval: Duration,
    /// Capacity of the delivery channel.
    pub delivery_buffer: usize,
    /// Capacity of the protocol event channel.
    pub event_buffer: usize,
    pub transport: TomNodeConfig,
}

impl RuntimeConfig {
    pub fn new(local_id: NodeId, peers: PeerTable, words: Vec<String>) -> Self {
        Self {
            local_id,
            peers,
            words,
            traffic: Some(TrafficConfig::default()),
            listen_host: "0.0.0.0".to_string(),
            drain_poll_interval: Duration::from_millis(10),
            delivery_buffer: 4096,
            event_buffer: 256,
            transport: TomNodeConfig::new(),
        }
    }

    pub fn traffic(mut self, traffic: Option<TrafficConfig>) -> Self {
        self.traffic = traffic;
        self
    }

    pub fn listen_host(mut self, host: impl Into<String>) -> Self {
        self.listen_host = host.into();
        self
    }

    pub fn drain_poll_interval(mut self, interval: Duration) -> Self {
        self.drain_poll_interval = interval;
        self
    }

    pub fn transport(mut self, transport: TomNodeConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Check everything that would make the process refuse to start.
    pub fn validate(&self) -> Result<(), TomProtocolError> {
        if !self.peers.contains(self.local_id) {
            return Err(TomProtocolError::Config(format!(
                "{} not found in a peer table of {}",
                self.local_id,
                self.peers.len()
            )));
        }
        if self.words.is_empty() {
            return Err(TomProtocolError::Config("word list is empty".into()));
        }
        if let Some(traffic) = &self.traffic {
            traffic.validate()?;
        }
        if self.drain_poll_interval.is_zero() {
            return Err(TomProtocolError::Config("drain_poll_interval must be > 0".into()));
        }
        if self.delivery_buffer == 0 || self.event_buffer == 0 {
            return Err(TomProtocolError::Config("channel buffers must be > 0".into()));
        }
        Ok(())
    }
}

// ── Commands (app → runtime) ──────────────────────────────────────────

/// Commands the application sends to the runtime event loop.
pub enum RuntimeCommand {
    /// Multicast a new word to the group.
    Originate { word: String },
    /// Query: current clock and queue state.
    Snapshot { reply: oneshot::Sender<StateSnapshot> },
    /// Graceful shutdown.
    Shutdown,
}

// ── Events (runtime → app) ───────────────────────────────────────────

/// A DATA event handed to the application, in total order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredMessage {
    pub word: String,
    pub origin: NodeId,
    pub lamport_ts: u64,
    pub msg_id: MessageId,
}

/// Protocol-level events the application may want to observe.
#[derive(Debug, Clone)]
pub enum ProtocolEvent {
    /// This member multicast a new word.
    DataOriginated {
        msg_id: MessageId,
        lamport_ts: u64,
        word: String,
    },
    /// An inbound frame was dropped.
    MalformedEvent { reason: String },
    /// Runtime encountered a non-fatal error.
    Error { description: String },
}

/// Point-in-time view of the ordering state.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StateSnapshot {
    pub lamport: u64,
    pub last_seen: Vec<u64>,
    pub holdback_len: usize,
}

// ── RuntimeHandle (app-facing API) ───────────────────────────────────

/// Handle to communicate with a running ProtocolRuntime.
///
/// Cheap to clone. All methods are channel sends.
#[derive(Clone)]
pub struct RuntimeHandle {
    cmd_tx: mpsc::Sender<RuntimeCommand>,
    local_id: NodeId,
    stats: Arc<ProtocolStats>,
}

impl RuntimeHandle {
    /// This node's identity.
    pub fn local_id(&self) -> NodeId {
        self.local_id
    }

    /// Multicast `word` to the group.
    pub async fn originate(&self, word: impl Into<String>) -> Result<(), TomProtocolError> {
        self.cmd_tx
            .send(RuntimeCommand::Originate { word: word.into() })
            .await
            .map_err(|_| TomProtocolError::RuntimeShutDown)
    }

    /// Current clock and holdback state.
    pub async fn snapshot(&self) -> Result<StateSnapshot, TomProtocolError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(RuntimeCommand::Snapshot { reply: tx })
            .await
            .map_err(|_| TomProtocolError::RuntimeShutDown)?;
        rx.await.map_err(|_| TomProtocolError::RuntimeShutDown)
    }

    pub fn stats(&self) -> Arc<ProtocolStats> {
        self.stats.clone()
    }

    /// Graceful shutdown.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(RuntimeCommand::Shutdown).await;
    }
}

// ── RuntimeChannels ──────────────────────────────────────────────────

/// Channels returned to the application when the runtime starts.
pub struct RuntimeChannels {
    /// Handle to send commands to the runtime.
    pub handle: RuntimeHandle,
    /// Delivered DATA events, in total order.
    pub delivered: mpsc::Receiver<DeliveredMessage>,
    /// Receive protocol-level events.
    pub events: mpsc::Receiver<ProtocolEvent>,
}

// ── ProtocolRuntime ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::Idle => f.write_str("idle"),
            Lifecycle::Running => f.write_str("running"),
            Lifecycle::Stopped => f.write_str("stopped"),
        }
    }
}

/// The protocol runtime: `Idle → Running → Stopped`.
pub struct ProtocolRuntime {
    config: RuntimeConfig,
    lifecycle: Lifecycle,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
    transport_stats: Option<Arc<TransportStats>>,
}

impl ProtocolRuntime {
    /// Validate the configuration. Nothing is bound until [`start`](Self::start).
    pub fn new(config: RuntimeConfig) -> Result<Self, TomProtocolError> {
        config.validate()?;
        Ok(Self {
            config,
            lifecycle: Lifecycle::Idle,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            local_addr: None,
            transport_stats: None,
        })
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn local_id(&self) -> NodeId {
        self.config.local_id
    }

    /// Bound listening address, once running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn transport_stats(&self) -> Option<Arc<TransportStats>> {
        self.transport_stats.clone()
    }

    /// Bind the transport and spawn the event loop and traffic source.
    pub async fn start(&mut self) -> Result<RuntimeChannels, TomProtocolError> {
        if self.lifecycle != Lifecycle::Idle {
            return Err(TomProtocolError::InvalidState(format!(
                "cannot start a {} runtime",
                self.lifecycle
            )));
        }
        let config = &self.config;
        let local_id = config.local_id;
        let port = config
            .peers
            .addr_of(local_id)
            .map(|addr| addr.port)
            .ok_or_else(|| TomProtocolError::Config(format!("{local_id} not in peer table")))?;

        let node = TomNode::bind(
            config.transport.clone(),
            local_id,
            &PeerAddr::new(config.listen_host.clone(), port),
            config.peers.to_transport_map(),
            &self.cancel,
        )
        .await?;
        self.local_addr = Some(node.local_addr());
        self.transport_stats = Some(node.stats());

        // Command channel (app → runtime)
        let (cmd_tx, cmd_rx) = mpsc::channel::<RuntimeCommand>(64);
        // Event channels (runtime → app)
        let (delivered_tx, delivered_rx) = mpsc::channel(config.delivery_buffer);
        let (event_tx, event_rx) = mpsc::channel(config.event_buffer);

        let stats = Arc::new(ProtocolStats::default());
        let state = ProtocolState::new(local_id, config.peers.len(), stats.clone());
        let handle = RuntimeHandle {
            cmd_tx,
            local_id,
            stats,
        };

        self.tasks.push(tokio::spawn(r#loop::runtime_loop(
            node,
            state,
            config.drain_poll_interval,
            cmd_rx,
            delivered_tx,
            event_tx,
            self.cancel.clone(),
        )));

        if let Some(traffic) = &config.traffic {
            let source = TrafficSource::new(config.words.clone(), traffic.clone())?;
            self.tasks.push(tokio::spawn(
                source.run(handle.clone(), self.cancel.child_token()),
            ));
        }

        self.lifecycle = Lifecycle::Running;
        Ok(RuntimeChannels {
            handle,
            delivered: delivered_rx,
            events: event_rx,
        })
    }

    /// Cancel every task, close the listener and wait for the loop to exit.
    pub async fn stop(&mut self) -> Result<(), TomProtocolError> {
        if self.lifecycle != Lifecycle::Running {
            return Err(TomProtocolError::InvalidState(format!(
                "cannot stop a {} runtime",
                self.lifecycle
            )));
        }
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!("runtime task ended abnormally: {e}");
            }
        }
        self.lifecycle = Lifecycle::Stopped;
        Ok(())
    }
}

impl Drop for ProtocolRuntime {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
