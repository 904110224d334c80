//! ToM transport layer.
//!
//! Point-to-point exchange of opaque frames between the members of a
//! fixed process group over plain TCP. One frame per connection: the
//! sender connects, writes a length-prefixed frame and waits for the
//! receiver to close; the receiver reads exactly one frame, hands it to
//! the node's inbound channel and closes.
//!
//! Outbound frames go through one lane per peer. A lane sends its frames
//! in order, retries a failed frame a bounded number of times with linear
//! backoff and then drops it.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use tokio_util::sync::CancellationToken;
//! use tom_transport::{NodeId, PeerAddr, TomNode, TomNodeConfig};
//!
//! # async fn example() -> Result<(), tom_transport::TomTransportError> {
//! let me = NodeId::new(0);
//! let peers = HashMap::from([(NodeId::new(1), PeerAddr::new("127.0.0.1", 9001))]);
//! let mut node = TomNode::bind(
//!     TomNodeConfig::new(),
//!     me,
//!     &PeerAddr::new("127.0.0.1", 9000),
//!     peers,
//!     &CancellationToken::new(),
//! )
//! .await?;
//!
//! node.send_raw(NodeId::new(1), b"hello")?;
//! let (from, frame) = node.recv_raw().await?;
//! println!("{} bytes from {from}", frame.len());
//! node.shutdown();
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod error;
mod node;
mod protocol;

pub use config::TomNodeConfig;
pub use error::TomTransportError;
pub use node::{TomNode, TransportStats};

use std::fmt;
use std::str::FromStr;

/// Identity of a group member: its 0-based index in the peer table.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Raw index.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Index usable for per-member arrays.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl FromStr for NodeId {
    type Err = TomTransportError;

    /// Accepts `3` or `p3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix('p').unwrap_or(s);
        digits
            .parse::<u32>()
            .map(Self)
            .map_err(|_| TomTransportError::InvalidNodeId(s.to_string()))
    }
}

/// Network address of a peer, as found in the peer table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerAddr {
    pub host: String,
    pub port: u16,
}

impl PeerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for PeerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
