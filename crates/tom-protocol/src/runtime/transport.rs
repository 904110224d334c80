use tom_transport::TomTransportError;

use crate::types::NodeId;

/// Network abstraction for the runtime.
///
/// Production: implemented by `TomNode` (TCP lanes).
/// Tests: implemented by `MockTransport` (records sends).
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Queue raw bytes for a peer.
    async fn send_raw(&self, target: NodeId, data: &[u8]) -> Result<(), TomTransportError>;

    /// Every remote member of the group.
    fn peers(&self) -> Vec<NodeId>;
}

// ── TomNode (production) ────────────────────────────────────────────

#[async_trait::async_trait]
impl Transport for tom_transport::TomNode {
    async fn send_raw(&self, target: NodeId, data: &[u8]) -> Result<(), TomTransportError> {
        tom_transport::TomNode::send_raw(self, target, data)
    }

    fn peers(&self) -> Vec<NodeId> {
        tom_transport::TomNode::peers(self)
    }
}

// ── MockTransport (tests) ───────────────────────────────────────────
