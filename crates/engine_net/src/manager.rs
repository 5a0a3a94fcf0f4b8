//! Host-side connection management.
//!
//! The [`ConnectionManager`] owns the listening socket and one framed stream
//! per client, keyed by the identity each client announced in its handshake.
//! Everything is polled from the tick loop; nothing here spawns threads.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use engine_component::PeerId;
use tracing::{debug, info, warn};

use crate::codec::{self, Codec};
use crate::error::NetError;
use crate::frame::FramedStream;
use crate::messages::ReplicationUpdate;

/// Default time a new client has to send its identity.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// One decoded batch and the peer it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub from: PeerId,
    pub updates: Vec<ReplicationUpdate>,
}

/// Result of polling every client once.
#[derive(Debug, Default)]
pub struct PollOutcome {
    /// Batches in arrival order per client, clients in identity order.
    pub batches: Vec<Inbound>,
    /// Clients whose streams closed or failed. Already dropped.
    pub disconnected: Vec<PeerId>,
}

/// The host's listener and one framed stream per admitted client.
#[derive(Debug)]
pub struct ConnectionManager {
    listener: TcpListener,
    clients: BTreeMap<PeerId, FramedStream<TcpStream>>,
    lost: BTreeSet<PeerId>,
    codec: Codec,
    handshake_timeout: Duration,
}

impl ConnectionManager {
    /// Bind a non-blocking listener.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Io`] if the address cannot be bound.
    pub fn bind(
        addr: impl ToSocketAddrs,
        codec: Codec,
        handshake_timeout: Duration,
    ) -> Result<Self, NetError> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        info!(addr = %listener.local_addr()?, "listening for clients");
        Ok(Self {
            listener,
            clients: BTreeMap::new(),
            lost: BTreeSet::new(),
            codec,
            handshake_timeout,
        })
    }

    /// The bound address; useful when binding port `0`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Io`] if the socket cannot report its address.
    pub fn local_addr(&self) -> Result<SocketAddr, NetError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept every connection currently waiting and run its handshake.
    ///
    /// The handshake blocks for at most the handshake timeout per read.
    /// Clients that send nothing, send an empty or reserved identity, or
    /// reuse an identity that is already connected are closed. Returns the
    /// identities of the clients that were admitted.
    pub fn accept_pending(&mut self) -> Vec<PeerId> {
        let mut admitted = Vec::new();
        loop {
            let (socket, addr) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(%err, "failed to accept connection");
                    break;
                }
            };

            match self.handshake(socket) {
                Ok((identity, stream)) => {
                    info!(%addr, %identity, "client connected");
                    self.lost.remove(&identity);
                    self.clients.insert(identity.clone(), stream);
                    admitted.push(identity);
                }
                Err(err) => warn!(%addr, %err, "rejected connection"),
            }
        }
        admitted
    }

    fn handshake(
        &self,
        socket: TcpStream,
    ) -> Result<(PeerId, FramedStream<TcpStream>), NetError> {
        socket.set_nonblocking(false)?;
        socket.set_read_timeout(Some(self.handshake_timeout))?;
        socket.set_nodelay(true)?;

        let mut stream = FramedStream::new(socket, self.codec.max_frame_len);
        let Some(frame) = stream.try_recv_frame()? else {
            return Err(NetError::Handshake(
                "no identity before timeout".to_string(),
            ));
        };
        let identity = codec::decode_identity(&frame)?;

        if identity.is_server() {
            return Err(NetError::Handshake(format!(
                "identity '{identity}' is reserved"
            )));
        }
        if self.clients.contains_key(&identity) {
            return Err(NetError::Handshake(format!(
                "identity '{identity}' is already connected"
            )));
        }

        stream.get_ref().set_read_timeout(None)?;
        stream.get_ref().set_nonblocking(true)?;
        Ok((identity, stream))
    }

    /// Read everything every client has sent, and detect disconnects.
    ///
    /// Undecodable batches are dropped with a warning. A client whose stream
    /// has failed, here or during an earlier send, is removed and reported
    /// in [`PollOutcome::disconnected`].
    pub fn poll_inbound(&mut self) -> PollOutcome {
        let mut outcome = PollOutcome::default();
        let mut failed: Vec<PeerId> = std::mem::take(&mut self.lost).into_iter().collect();

        for (peer, stream) in &mut self.clients {
            if failed.contains(peer) {
                continue;
            }
            if let Err(err) = stream.flush_pending() {
                debug!(%peer, %err, "write failed");
                failed.push(peer.clone());
                continue;
            }
            loop {
                match stream.try_recv_frame() {
                    Ok(Some(frame)) => match self.codec.decode_batch(&frame) {
                        Ok(batch) => outcome.batches.push(Inbound {
                            from: peer.clone(),
                            updates: batch.updates,
                        }),
                        Err(err) => warn!(%peer, %err, "dropping undecodable batch"),
                    },
                    Ok(None) => break,
                    Err(err) => {
                        debug!(%peer, %err, "read failed");
                        failed.push(peer.clone());
                        break;
                    }
                }
            }
        }

        for peer in failed {
            if self.clients.remove(&peer).is_some() {
                info!(%peer, "client disconnected");
                outcome.disconnected.push(peer);
            }
        }
        outcome
    }

    /// Encode and send one batch to one client.
    ///
    /// A stream-fatal failure marks the client as lost; it is reported by the
    /// next [`poll_inbound`](Self::poll_inbound).
    ///
    /// # Errors
    ///
    /// Returns [`NetError::UnknownPeer`] if no such client is connected, or
    /// the encoding or stream error.
    pub fn send_batch(
        &mut self,
        peer: &PeerId,
        updates: &[ReplicationUpdate],
    ) -> Result<(), NetError> {
        let stream = self
            .clients
            .get_mut(peer)
            .ok_or_else(|| NetError::UnknownPeer(peer.clone()))?;
        let payload = self.codec.encode_batch(updates)?;
        let sent = stream.send_frame(&payload);
        if let Err(err) = &sent
            && err.is_fatal_to_stream()
        {
            self.lost.insert(peer.clone());
        }
        sent
    }

    /// Close a client's stream. Returns `false` if it was not connected.
    pub fn drop_client(&mut self, peer: &PeerId) -> bool {
        self.lost.remove(peer);
        self.clients.remove(peer).is_some()
    }

    /// Connected client identities, in order.
    pub fn peers(&self) -> impl Iterator<Item = &PeerId> {
        self.clients.keys()
    }

    #[must_use]
    pub fn is_connected(&self, peer: &PeerId) -> bool {
        self.clients.contains_key(peer)
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}
