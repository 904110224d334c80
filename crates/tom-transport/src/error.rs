use crate::{NodeId, PeerAddr};

/// Errors returned by the ToM transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TomTransportError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: PeerAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("connection to {node_id} failed: {source}")]
    Connect {
        node_id: NodeId,
        #[source]
        source: std::io::Error,
    },

    #[error("send to {node_id} failed: {source}")]
    Send {
        node_id: NodeId,
        #[source]
        source: std::io::Error,
    },

    #[error("receive failed: {0}")]
    Receive(#[source] std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("unknown peer: {0}")]
    UnknownPeer(NodeId),

    #[error("outbound queue to {0} is full")]
    QueueFull(NodeId),

    #[error("node is shut down")]
    Shutdown,

    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_too_large() {
        let err = TomTransportError::MessageTooLarge { size: 10, max: 4 };
        assert_eq!(err.to_string(), "message too large: 10 bytes (max 4)");
    }

    #[test]
    fn display_queue_full() {
        let err = TomTransportError::QueueFull(NodeId::new(2));
        assert_eq!(err.to_string(), "outbound queue to p2 is full");
    }
}
