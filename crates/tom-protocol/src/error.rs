use std::path::PathBuf;

/// Protocol-level errors for ToM.
///
/// Wraps transport errors and adds protocol-specific variants
/// (event validation, serialization, configuration, lifecycle).
#[derive(Debug, thiserror::Error)]
pub enum TomProtocolError {
    #[error("transport error: {0}")]
    Transport(#[from] tom_transport::TomTransportError),

    #[error("invalid event: {reason}")]
    InvalidEvent { reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("runtime shut down")]
    RuntimeShutDown,
}

impl TomProtocolError {
    pub(crate) fn invalid_event(reason: impl Into<String>) -> Self {
        TomProtocolError::InvalidEvent {
            reason: reason.into(),
        }
    }
}

impl From<rmp_serde::encode::Error> for TomProtocolError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        TomProtocolError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for TomProtocolError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        TomProtocolError::Deserialization(e.to_string())
    }
}
