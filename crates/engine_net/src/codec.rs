//! Batch codec.
//!
//! A batch is a JSON array of [`ReplicationUpdate`] records encoded as UTF-8,
//! optionally zlib-compressed (DEFLATE, best compression) before framing.
//! Decoding is tolerant per record: one malformed entry is dropped with a
//! warning while the rest of the batch still applies.

use std::io::{Read, Write};

use engine_component::PeerId;
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use serde_json::Value;
use tracing::warn;

use crate::error::NetError;
use crate::messages::ReplicationUpdate;

/// Default upper bound for one frame and for one inflated payload.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Encoding options shared by both ends of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    /// Compress payloads with zlib. Both ends must agree.
    pub compression: bool,
    /// Largest frame, and largest inflated payload, accepted.
    pub max_frame_len: usize,
}

impl Default for Codec {
    fn default() -> Self {
        Self {
            compression: true,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// The usable part of a received batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBatch {
    pub updates: Vec<ReplicationUpdate>,
    /// Entries that failed to decode or validate.
    pub rejected: usize,
}

impl Codec {
    /// Encode a batch for the wire.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Encode`] or [`NetError::Compression`].
    pub fn encode_batch(&self, updates: &[ReplicationUpdate]) -> Result<Vec<u8>, NetError> {
        let json = serde_json::to_vec(updates).map_err(NetError::Encode)?;
        if self.compression {
            compress(&json)
        } else {
            Ok(json)
        }
    }

    /// Decode a batch received from the wire.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Compression`] if the payload does not inflate, or
    /// [`NetError::Decode`] if it is not a JSON array. Individual bad entries
    /// are counted in [`DecodedBatch::rejected`] instead.
    pub fn decode_batch(&self, bytes: &[u8]) -> Result<DecodedBatch, NetError> {
        let inflated;
        let json = if self.compression {
            inflated = decompress(bytes, self.max_frame_len)?;
            inflated.as_slice()
        } else {
            bytes
        };

        let entries: Vec<Value> = serde_json::from_slice(json).map_err(NetError::Decode)?;
        let mut batch = DecodedBatch::default();

        for entry in entries {
            let decoded = serde_json::from_value::<ReplicationUpdate>(entry)
                .map_err(NetError::Decode)
                .and_then(|update| update.validate().map(|()| update));
            match decoded {
                Ok(update) => batch.updates.push(update),
                Err(err) => {
                    warn!(%err, "dropping malformed replication entry");
                    batch.rejected += 1;
                }
            }
        }

        Ok(batch)
    }
}

/// Encode the handshake frame: the raw identity string, never compressed.
#[must_use]
pub fn encode_identity(identity: &PeerId) -> Vec<u8> {
    identity.as_str().as_bytes().to_vec()
}

/// Decode the handshake frame.
///
/// # Errors
///
/// Returns [`NetError::Handshake`] if the bytes are not UTF-8 or are empty.
pub fn decode_identity(bytes: &[u8]) -> Result<PeerId, NetError> {
    let identity = std::str::from_utf8(bytes)
        .map_err(|err| NetError::Handshake(format!("identity is not UTF-8: {err}")))?;
    if identity.is_empty() {
        return Err(NetError::Handshake("empty identity".to_string()));
    }
    Ok(PeerId::from(identity))
}

fn compress(bytes: &[u8]) -> Result<Vec<u8>, NetError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes).map_err(NetError::Compression)?;
    encoder.finish().map_err(NetError::Compression)
}

fn decompress(bytes: &[u8], limit: usize) -> Result<Vec<u8>, NetError> {
    let mut inflated = Vec::new();
    ZlibDecoder::new(bytes)
        .take(limit as u64 + 1)
        .read_to_end(&mut inflated)
        .map_err(NetError::Compression)?;
    if inflated.len() > limit {
        return Err(NetError::Compression(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("inflated payload exceeds {limit} bytes"),
        )));
    }
    Ok(inflated)
}
