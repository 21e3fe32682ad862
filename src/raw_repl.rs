//! Raw-REPL channel — the state machine that drives a board's interpreter
//! into its non-echoing programmatic mode, ships a code blob, and collects
//! the result.
//!
//! The board supports two interactive modes: *friendly* (echoing,
//! prompt-driven) and *raw* (one-shot: accept code, end-of-text marker,
//! execute, emit result followed by end-of-text, return to raw prompt).
//! This type is strictly sequential — see [`RawReplState`] — and every
//! method asserts the state it expects to be called in.

use crate::consts::{CODE_ACCEPTED, CTRL_A, CTRL_B, CTRL_C, CTRL_D, RAW_REPL_BANNER};
use crate::error::DriverError;
use crate::transport::Transport;
use std::time::Duration;

/// State of one device's raw-REPL session. Only one session per device is
/// ever live; re-entry from `Friendly` to `RawReady` is always legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawReplState {
    Friendly,
    RawEntering,
    RawReady,
    Executing,
    Following,
    RawExiting,
}

/// Drives one [`Transport`] through the raw-REPL protocol.
///
/// Holds a `&'t mut dyn Transport` rather than owning a `Box<dyn Transport>`
/// so callers that already hold one behind their own indirection (e.g. a
/// device's `Box<dyn Transport>` behind a mutex guard) can borrow it here
/// without double-boxing — see [`RawReplChannel::new`].
pub struct RawReplChannel<'t> {
    transport: &'t mut dyn Transport,
    state: RawReplState,
}

/// Raised if a method is invoked while the channel is in the wrong state.
/// Indicates a caller bug: every legal sequence is enter → exec →
/// (optional transfer) → follow → exit.
fn state_error(expected: RawReplState, actual: RawReplState) -> DriverError {
    let msg = format!("raw-repl channel in state {actual:?}, expected {expected:?}");
    if cfg!(debug_assertions) {
        panic!("{msg}");
    }
    DriverError::Protocol(msg)
}

impl<'t> RawReplChannel<'t> {
    pub fn new(transport: &'t mut dyn Transport) -> Self {
        Self {
            transport,
            state: RawReplState::Friendly,
        }
    }

    pub fn state(&self) -> RawReplState {
        self.state
    }

    /// Borrow the underlying transport directly — used by the file-transfer
    /// sub-protocol, which reads and writes raw bytes mid-execution without
    /// going through the state-asserting methods above.
    pub fn transport_mut(&mut self) -> &mut dyn Transport {
        &mut *self.transport
    }

    fn require(&self, expected: RawReplState) -> Result<(), DriverError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(state_error(expected, self.state))
        }
    }

    /// Issue `Ctrl-C Ctrl-C Ctrl-A` and wait for the raw-mode banner.
    pub async fn enter_raw(&mut self) -> Result<(), DriverError> {
        self.require(RawReplState::Friendly)?;
        self.state = RawReplState::RawEntering;
        tracing::debug!("entering raw REPL");
        self.transport.write(&[CTRL_C, CTRL_C, CTRL_A]).await?;
        self.expect(RAW_REPL_BANNER.as_bytes()).await?;
        self.state = RawReplState::RawReady;
        Ok(())
    }

    /// Write `source`, then end-of-text, then wait for the board's
    /// "accepted" acknowledgement. Transitions to `Executing`.
    pub async fn exec_no_follow(&mut self, source: &[u8]) -> Result<(), DriverError> {
        self.require(RawReplState::RawReady)?;
        tracing::debug!(bytes = source.len(), "sending code block");
        self.transport.write(source).await?;
        self.transport.write(&[CTRL_D]).await?;
        self.expect(CODE_ACCEPTED.as_bytes()).await?;
        self.state = RawReplState::Executing;
        Ok(())
    }

    /// Read until the end-of-text sentinel ending normal output, then read
    /// the error channel until the raw prompt returns. If the error
    /// channel is non-empty, the call fails with `RemoteException`.
    pub async fn follow(&mut self, timeout: Duration) -> Result<Vec<u8>, DriverError> {
        self.require(RawReplState::Executing)?;
        self.state = RawReplState::Following;
        self.transport.set_timeout(Some(timeout));

        let stdout = self.read_until(CTRL_D).await?;
        let stderr = self.read_until(CTRL_D).await?;
        // Board returns to its raw prompt ('>') after the second CTRL_D.
        self.expect(b">").await?;

        self.state = RawReplState::RawReady;
        if !stderr.is_empty() {
            return Err(DriverError::RemoteException(stderr));
        }
        Ok(stdout)
    }

    /// `Ctrl-B`, return to friendly mode.
    pub async fn exit_raw(&mut self) -> Result<(), DriverError> {
        // Re-entry is always legal, and exit must be callable from any
        // raw-ish state so error paths can unconditionally restore
        // friendly mode (see the resource-discipline rule in the spec).
        self.state = RawReplState::RawExiting;
        tracing::debug!("exiting raw REPL");
        self.transport.write(&[CTRL_B]).await?;
        self.state = RawReplState::Friendly;
        Ok(())
    }

    /// Read bytes one at a time until `terminator` is seen; returns
    /// everything read before it, excluding the terminator itself.
    async fn read_until(&mut self, terminator: u8) -> Result<Vec<u8>, DriverError> {
        let mut out = Vec::new();
        loop {
            let chunk = self.transport.read(1).await?;
            match chunk.first() {
                None => continue, // timeout tick; keep waiting within the caller's deadline
                Some(&b) if b == terminator => return Ok(out),
                Some(&b) => out.push(b),
            }
        }
    }

    /// Read bytes until the literal sequence `needle` has been observed in
    /// the stream; fails with `Protocol` if the transport closes first.
    async fn expect(&mut self, needle: &[u8]) -> Result<(), DriverError> {
        let mut seen: Vec<u8> = Vec::new();
        loop {
            let chunk = self.transport.read(1).await?;
            let Some(&b) = chunk.first() else { continue };
            seen.push(b);
            if seen.len() > needle.len() {
                seen.remove(0);
            }
            if seen == needle {
                return Ok(());
            }
        }
    }
}
