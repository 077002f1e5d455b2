//! Length-delimited framing over a byte stream
//!
//! ```text
//! +----------------+------------------+
//! | length u32 BE  | payload (length) |
//! +----------------+------------------+
//! ```
//!
//! The reader rejects any frame whose announced length exceeds the
//! configured maximum before buffering it.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use super::{FrameReader, FrameWriter, Transport};
use crate::error::{Error, Result};
use crate::protocol::constants::{DEFAULT_MAX_FRAME_SIZE, FRAME_HEADER_SIZE};

/// Length-prefixed frames over any async byte stream
#[derive(Debug)]
pub struct LengthDelimited<S> {
    stream: S,
    max_frame_size: usize,
}

impl<S> LengthDelimited<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(stream: S) -> Self {
        Self::with_max_frame_size(stream, DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(stream: S, max_frame_size: usize) -> Self {
        Self {
            stream,
            max_frame_size,
        }
    }
}

impl<S> Transport for LengthDelimited<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    type Reader = FramedReader<ReadHalf<S>>;
    type Writer = FramedWriter<WriteHalf<S>>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (read, write) = tokio::io::split(self.stream);
        (
            FramedReader::new(read, self.max_frame_size),
            FramedWriter::new(write),
        )
    }
}

/// Reads length-prefixed frames
#[derive(Debug)]
pub struct FramedReader<R> {
    inner: R,
    buf: BytesMut,
    max_frame_size: usize,
}

impl<R> FramedReader<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(inner: R, max_frame_size: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(8 * 1024),
            max_frame_size,
        }
    }

    /// Split a complete frame off the buffer, if one is there
    fn try_parse(&mut self) -> Result<Option<Bytes>> {
        if self.buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let len = u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if len > self.max_frame_size {
            return Err(Error::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        if self.buf.len() < FRAME_HEADER_SIZE + len {
            self.buf.reserve(FRAME_HEADER_SIZE + len - self.buf.len());
            return Ok(None);
        }

        self.buf.advance(FRAME_HEADER_SIZE);
        Ok(Some(self.buf.split_to(len).freeze()))
    }
}

impl<R> FrameReader for FramedReader<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn read_frame(&mut self) -> Result<Option<Bytes>> {
        loop {
            if let Some(frame) = self.try_parse()? {
                return Ok(Some(frame));
            }

            let n = self.inner.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                // Peer went away mid-frame
                return Err(Error::ConnectionClosed);
            }
        }
    }
}

/// Writes length-prefixed frames
#[derive(Debug)]
pub struct FramedWriter<W> {
    inner: W,
}

impl<W> FramedWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W> FrameWriter for FramedWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn write_frame(&mut self, frame: Bytes) -> Result<()> {
        let mut out = BytesMut::with_capacity(FRAME_HEADER_SIZE + frame.len());
        out.put_u32(frame.len() as u32);
        out.put_slice(&frame);

        self.inner.write_all(&out).await?;
        self.inner.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}
