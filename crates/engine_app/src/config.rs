//! World configuration.

use std::time::Duration;

use engine_component::PeerId;
use engine_net::Codec;
use engine_net::codec::DEFAULT_MAX_FRAME_LEN;
use engine_net::manager::DEFAULT_HANDSHAKE_TIMEOUT;

/// Settings shared by the host and client roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldConfig {
    /// This peer's identity. Entity behaviours run only for entities whose
    /// updater matches it.
    pub identity: PeerId,
    /// Compress batches with zlib. Host and clients must agree.
    pub compression: bool,
    /// Largest frame accepted from or sent to a peer.
    pub max_frame_len: usize,
    /// How long the host waits for a new client's identity frame.
    pub handshake_timeout: Duration,
}

impl WorldConfig {
    /// Configuration for the authoritative host (`"server"`).
    #[must_use]
    pub fn host() -> Self {
        Self::client(PeerId::server())
    }

    /// Configuration for a client with the given identity.
    #[must_use]
    pub fn client(identity: impl Into<PeerId>) -> Self {
        Self {
            identity: identity.into(),
            compression: true,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// The codec both ends of a connection use.
    #[must_use]
    pub fn codec(&self) -> Codec {
        Codec {
            compression: self.compression,
            max_frame_len: self.max_frame_len,
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self::host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_identity_is_server() {
        assert!(WorldConfig::host().identity.is_server());
        assert!(!WorldConfig::client("c1").identity.is_server());
    }

    #[test]
    fn test_codec_follows_config() {
        let config = WorldConfig::client("c1").with_compression(false);
        assert_eq!(
            config.codec(),
            Codec {
                compression: false,
                max_frame_len: DEFAULT_MAX_FRAME_LEN,
            }
        );
    }
}
