//! Error taxonomy for the device driver.
//!
//! Every kind named in the driver specification has exactly one variant
//! here. `TransportClosed` is terminal for the device it came from; the
//! rest are recoverable — the caller reports them and the shell continues.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    /// The transport's I/O failed or the peer went away. Terminal for the
    /// owning device; the registry entry is marked closed but retained.
    #[error("transport closed")]
    TransportClosed,

    /// Unexpected byte sequence from the board (no raw banner, no `OK`, no
    /// end-of-text where one was expected).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The board's traceback arrived on the raw-REPL error stream.
    #[error("remote exception: {}", String::from_utf8_lossy(.0))]
    RemoteException(Vec<u8>),

    /// A path could not be parsed, or named an unknown device.
    #[error("cannot resolve path: {0}")]
    Resolution(String),

    /// The board advertises neither binary stdio nor hex-decode support.
    #[error("board lacks both binary stdio and hex-decode capability")]
    Capability,

    /// Caller-side argument validation failure.
    #[error("usage error: {0}")]
    Usage(String),
}

pub type DriverResult<T> = Result<T, DriverError>;
