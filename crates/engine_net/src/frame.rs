//! Length-prefixed framing.
//!
//! Stream sockets carry no message boundaries, so every logical message is
//! preceded by a fixed 4-byte big-endian length header. [`FramedStream`]
//! works over any `Read + Write`, blocking or not: bytes that arrive in
//! pieces are buffered until a whole frame is present, and bytes that cannot
//! be written without blocking are kept and written on the next call.

use std::io::{self, Read, Write};

use crate::error::{NetError, classify_io};

/// Size of the length header preceding every frame.
pub const HEADER_LEN: usize = 4;

/// How many maximum-size frames may wait on a peer that is not reading.
pub const MAX_PENDING_FRAMES: usize = 4;

const READ_CHUNK: usize = 8 * 1024;

/// A byte stream carrying length-prefixed frames.
#[derive(Debug)]
pub struct FramedStream<S> {
    stream: S,
    read_buf: Vec<u8>,
    write_buf: Vec<u8>,
    max_frame_len: usize,
}

impl<S: Read + Write> FramedStream<S> {
    #[must_use]
    pub fn new(stream: S, max_frame_len: usize) -> Self {
        Self {
            stream,
            read_buf: Vec::new(),
            write_buf: Vec::new(),
            max_frame_len,
        }
    }

    /// Returns a reference to the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Returns a mutable reference to the underlying stream. Reading or
    /// writing through it directly desynchronises the framing.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Bytes queued for writing that the stream has not yet accepted.
    #[must_use]
    pub fn pending_write_len(&self) -> usize {
        self.write_buf.len()
    }

    /// Queue one frame and write as much as the stream accepts.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::FrameTooLarge`] for an oversized payload,
    /// [`NetError::WriteBacklog`] if the peer has stopped reading,
    /// [`NetError::Disconnected`] if the peer is gone, or [`NetError::Io`].
    pub fn send_frame(&mut self, payload: &[u8]) -> Result<(), NetError> {
        if payload.len() > self.max_frame_len {
            return Err(NetError::FrameTooLarge {
                len: payload.len(),
                max: self.max_frame_len,
            });
        }
        let len = u32::try_from(payload.len()).map_err(|_| NetError::FrameTooLarge {
            len: payload.len(),
            max: u32::MAX as usize,
        })?;
        let pending = self.write_buf.len() + HEADER_LEN + payload.len();
        if pending > self.max_pending_write() {
            return Err(NetError::WriteBacklog {
                pending,
                max: self.max_pending_write(),
            });
        }
        self.write_buf.extend_from_slice(&len.to_be_bytes());
        self.write_buf.extend_from_slice(payload);
        self.flush_pending().map(|_| ())
    }

    /// Upper bound on bytes queued for a peer that is not reading.
    #[must_use]
    pub fn max_pending_write(&self) -> usize {
        (HEADER_LEN + self.max_frame_len).saturating_mul(MAX_PENDING_FRAMES)
    }

    /// Write queued bytes until done or the stream would block. Returns
    /// `true` once nothing is left queued.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Disconnected`] if the peer is gone, or
    /// [`NetError::Io`].
    pub fn flush_pending(&mut self) -> Result<bool, NetError> {
        while !self.write_buf.is_empty() {
            match self.stream.write(&self.write_buf) {
                Ok(0) => return Err(NetError::Disconnected),
                Ok(written) => {
                    self.write_buf.drain(..written);
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(classify_io(err)),
            }
        }
        Ok(true)
    }

    /// Return the next complete frame, reading only what is available now.
    /// `Ok(None)` means no whole frame has arrived yet, which is the normal
    /// outcome of polling an idle peer.
    ///
    /// On a blocking stream with a read timeout, `Ok(None)` means the
    /// timeout elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Disconnected`] on end of stream,
    /// [`NetError::FrameTooLarge`] if the header exceeds the limit, or
    /// [`NetError::Io`].
    pub fn try_recv_frame(&mut self) -> Result<Option<Vec<u8>>, NetError> {
        if let Some(frame) = self.take_buffered_frame()? {
            return Ok(Some(frame));
        }

        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(NetError::Disconnected),
                Ok(read) => {
                    self.read_buf.extend_from_slice(&chunk[..read]);
                    if let Some(frame) = self.take_buffered_frame()? {
                        return Ok(Some(frame));
                    }
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    return Ok(None);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
                Err(err) => return Err(classify_io(err)),
            }
        }
    }

    fn take_buffered_frame(&mut self) -> Result<Option<Vec<u8>>, NetError> {
        let Some(header) = self.read_buf.first_chunk::<HEADER_LEN>() else {
            return Ok(None);
        };
        let len = u32::from_be_bytes(*header) as usize;
        if len > self.max_frame_len {
            return Err(NetError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        if self.read_buf.len() < HEADER_LEN + len {
            return Ok(None);
        }
        let frame = self.read_buf[HEADER_LEN..HEADER_LEN + len].to_vec();
        self.read_buf.drain(..HEADER_LEN + len);
        Ok(Some(frame))
    }
}
