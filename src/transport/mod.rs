//! Transport trait — decouples the raw-REPL channel from the wire.
//!
//! Implementations:
//! - [`serial::SerialTransport`] — a serial port at a fixed baud rate.
//! - [`tcp::TcpTransport`] — a TCP connection behind a telnet-style login.
//!
//! All implementations MUST honor an explicit timeout on every read and
//! MUST close themselves (and report [`DriverError::TransportClosed`] from
//! then on) the first time the underlying I/O fails.

pub mod serial;
pub mod tcp;

use crate::error::DriverError;
use async_trait::async_trait;
use std::time::Duration;

/// A byte-oriented, bidirectional stream to a board.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write `bytes` in full. Never short-writes: on success the whole
    /// buffer was accepted by the transport.
    async fn write(&mut self, bytes: &[u8]) -> Result<usize, DriverError>;

    /// Read up to `max` bytes, blocking until at least one byte is
    /// available or the effective timeout elapses. Returns an empty
    /// vector on timeout — never an error for a plain timeout.
    async fn read(&mut self, max: usize) -> Result<Vec<u8>, DriverError>;

    /// Set the read timeout. `None` blocks indefinitely.
    fn set_timeout(&mut self, timeout: Option<Duration>);

    /// Close the transport. Idempotent.
    fn close(&mut self);

    /// Whether the transport still believes it is open.
    fn is_closed(&self) -> bool;
}

/// Read exactly one byte, honoring whatever timeout is currently set.
/// Returns `Ok(None)` on timeout (mirrors `Transport::read` returning an
/// empty buffer), `Err` on a transport failure.
pub async fn read_one(t: &mut dyn Transport) -> Result<Option<u8>, DriverError> {
    let buf = t.read(1).await?;
    Ok(buf.into_iter().next())
}
