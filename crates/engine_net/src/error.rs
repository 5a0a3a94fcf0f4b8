//! Network-layer error types.

use std::io;

use engine_component::PeerId;

/// Errors that can occur while encoding, framing, or moving batches.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// An update named a kind other than `create`, `update`, or `delete`.
    #[error("invalid update type '{0}'")]
    InvalidUpdateType(String),

    /// An update is missing a field its kind requires.
    #[error("malformed update: {0}")]
    MalformedUpdate(String),

    /// Failed to encode a batch to JSON.
    #[error("failed to encode batch: {0}")]
    Encode(#[source] serde_json::Error),

    /// Failed to decode a batch from JSON.
    #[error("failed to decode batch: {0}")]
    Decode(#[source] serde_json::Error),

    /// The compressor or decompressor failed, or the payload was too large
    /// once inflated.
    #[error("compression error: {0}")]
    Compression(#[source] io::Error),

    /// Socket error other than a disconnect.
    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed or reset its stream.
    #[error("peer disconnected")]
    Disconnected,

    /// A frame header announced more bytes than the configured limit.
    #[error("frame of {len} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    /// The peer stopped reading and too many bytes are waiting to be sent.
    #[error("{pending} bytes waiting to be written exceeds limit of {max} bytes")]
    WriteBacklog { pending: usize, max: usize },

    /// The connecting peer did not present a usable identity.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// No connection is open for this peer.
    #[error("unknown peer '{0}'")]
    UnknownPeer(PeerId),
}

impl NetError {
    /// Returns `true` if the stream is unusable and the peer must be torn down.
    #[must_use]
    pub fn is_fatal_to_stream(&self) -> bool {
        matches!(
            self,
            Self::Disconnected
                | Self::FrameTooLarge { .. }
                | Self::WriteBacklog { .. }
                | Self::Io(_)
        )
    }
}

/// Map an I/O error kind that means "the other side is gone" to
/// [`NetError::Disconnected`].
pub(crate) fn classify_io(err: io::Error) -> NetError {
    match err.kind() {
        io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::UnexpectedEof => NetError::Disconnected,
        _ => NetError::Io(err),
    }
}
