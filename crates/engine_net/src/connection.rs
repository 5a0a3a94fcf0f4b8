//! Client-side connection to the host.
//!
//! A [`ServerLink`] connects over TCP, sends the client's identity as the
//! very first frame, and then switches the socket to non-blocking mode so it
//! can be polled once per tick.

use std::net::{TcpStream, ToSocketAddrs};

use engine_component::PeerId;
use tracing::{debug, info, warn};

use crate::codec::{self, Codec, DecodedBatch};
use crate::error::NetError;
use crate::frame::FramedStream;
use crate::messages::ReplicationUpdate;

/// Default server address (`host:port`).
pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:5560";

/// The environment variable used to override the server address.
pub const SERVER_ADDR_ENV: &str = "ENGINE_SERVER_ADDR";

/// The server address from [`SERVER_ADDR_ENV`], falling back to
/// [`DEFAULT_SERVER_ADDR`].
#[must_use]
pub fn server_addr_from_env() -> String {
    std::env::var(SERVER_ADDR_ENV).unwrap_or_else(|_| DEFAULT_SERVER_ADDR.to_string())
}

/// A client's framed, non-blocking stream to the host.
#[derive(Debug)]
pub struct ServerLink {
    stream: FramedStream<TcpStream>,
    codec: Codec,
}

impl ServerLink {
    /// Connect to the host and perform the identity handshake.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Io`] if the connection cannot be established, or
    /// [`NetError::Disconnected`] if the host hangs up during the handshake.
    pub fn connect(
        addr: impl ToSocketAddrs,
        identity: &PeerId,
        codec: Codec,
    ) -> Result<Self, NetError> {
        let socket = TcpStream::connect(addr)?;
        socket.set_nodelay(true)?;
        let peer_addr = socket.peer_addr()?;

        let mut stream = FramedStream::new(socket, codec.max_frame_len);
        stream.send_frame(&codec::encode_identity(identity))?;
        stream.get_ref().set_nonblocking(true)?;

        info!(%peer_addr, %identity, "connected to server");
        Ok(Self { stream, codec })
    }

    /// Drain every complete batch the host has sent since the last poll.
    ///
    /// A batch that does not decode is dropped with a warning; the link
    /// stays up.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Disconnected`] once the host has gone away, or any
    /// other stream-fatal error.
    pub fn poll_batches(&mut self) -> Result<Vec<DecodedBatch>, NetError> {
        self.stream.flush_pending()?;

        let mut batches = Vec::new();
        while let Some(frame) = self.stream.try_recv_frame()? {
            match self.codec.decode_batch(&frame) {
                Ok(batch) => {
                    debug!(updates = batch.updates.len(), "received batch from server");
                    batches.push(batch);
                }
                Err(err) => warn!(%err, "dropping undecodable batch from server"),
            }
        }
        Ok(batches)
    }

    /// Encode and send one batch.
    ///
    /// # Errors
    ///
    /// Returns any encoding or stream error.
    pub fn send_batch(&mut self, updates: &[ReplicationUpdate]) -> Result<(), NetError> {
        let payload = self.codec.encode_batch(updates)?;
        self.stream.send_frame(&payload)
    }

    #[must_use]
    pub fn codec(&self) -> Codec {
        self.codec
    }
}
