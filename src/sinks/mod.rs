//! # Sinks: where drained payloads go.
//!
//! A [`Sink`] is owned by exactly one work and receives that work's payloads in
//! broker order. Writes may be partial: the work resumes from the first
//! unaccepted byte.
//!
//! - `Ok(n)` with `n < buf.len()` — partial write, the remainder is retried at once;
//! - `Err(SinkError { accepted, .. })` — failure after `accepted` bytes, retried
//!   from that offset after the recovery policy has run.
//!
//! [`WriterSink`] adapts any [`tokio::io::AsyncWrite`].

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::SinkError;

/// Destination for drained payloads.
#[async_trait]
pub trait Sink: Send + 'static {
    /// Writes a prefix of `buf`, returning how many bytes were accepted.
    async fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError>;

    /// Flushes buffered data. Called once when the work exits cleanly.
    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

/// [`Sink`] over an async writer (file, socket, `Vec<u8>`, ...).
#[derive(Debug)]
pub struct WriterSink<W> {
    inner: W,
}

impl<W> WriterSink<W> {
    /// Wraps `inner`.
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[async_trait]
impl<W> Sink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn write(&mut self, buf: &[u8]) -> Result<usize, SinkError> {
        Ok(self.inner.write(buf).await?)
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        Ok(self.inner.flush().await?)
    }
}
