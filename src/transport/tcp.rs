//! TCP transport — a network connection behind a telnet-style username and
//! password prompt, as presented by WebREPL-style board firmware.

use super::Transport;
use crate::error::DriverError;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Prompts the board emits during the login handshake.
const LOGIN_PROMPT: &str = "Login as:";
const PASSWORD_PROMPT: &str = "Password:";
/// The board's friendly-mode prompt, whose appearance marks a successful login.
const FRIENDLY_PROMPT: &str = ">>>";

pub struct TcpTransport {
    stream: Option<TcpStream>,
    addr: String,
    timeout: Option<Duration>,
}

impl TcpTransport {
    /// Connect to `addr` (`host:port`) and perform the login handshake with
    /// `user`/`password`. Fails with [`DriverError::Protocol`] if the
    /// board's friendly prompt never appears after credentials are sent.
    pub async fn connect(addr: impl Into<String>, user: &str, password: &str) -> Result<Self, DriverError> {
        let addr = addr.into();
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| DriverError::Protocol(format!("connect to {addr} failed: {e}")))?;

        let mut this = Self {
            stream: Some(stream),
            addr,
            timeout: Some(Duration::from_secs(10)),
        };

        this.expect(LOGIN_PROMPT).await?;
        this.write(user.as_bytes()).await?;
        this.write(b"\r").await?;
        this.expect(PASSWORD_PROMPT).await?;
        this.write(password.as_bytes()).await?;
        this.write(b"\r").await?;
        this.expect(FRIENDLY_PROMPT).await?;

        Ok(this)
    }

    /// Read bytes until `needle` has been seen, or fail with a protocol
    /// error once the transport closes first.
    async fn expect(&mut self, needle: &str) -> Result<(), DriverError> {
        let mut seen = Vec::new();
        loop {
            let chunk = self.read(256).await?;
            if chunk.is_empty() {
                if seen.windows(needle.len().max(1)).any(|w| w == needle.as_bytes()) {
                    return Ok(());
                }
                return Err(DriverError::Protocol(format!(
                    "timed out waiting for {needle:?} from {}",
                    self.addr
                )));
            }
            seen.extend_from_slice(&chunk);
            if seen.windows(needle.len().max(1)).any(|w| w == needle.as_bytes()) {
                return Ok(());
            }
        }
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<usize, DriverError> {
        let stream = self.stream.as_mut().ok_or(DriverError::TransportClosed)?;
        match stream.write_all(bytes).await {
            Ok(()) => Ok(bytes.len()),
            Err(_) => {
                self.close();
                Err(DriverError::TransportClosed)
            }
        }
    }

    async fn read(&mut self, max: usize) -> Result<Vec<u8>, DriverError> {
        let stream = self.stream.as_mut().ok_or(DriverError::TransportClosed)?;
        let mut buf = vec![0_u8; max.max(1)];
        let fut = stream.read(&mut buf);
        let result = match self.timeout {
            Some(d) => match tokio::time::timeout(d, fut).await {
                Ok(r) => r,
                Err(_) => return Ok(Vec::new()),
            },
            None => fut.await,
        };
        match result {
            Ok(0) => {
                self.close();
                Err(DriverError::TransportClosed)
            }
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(_) => {
                self.close();
                Err(DriverError::TransportClosed)
            }
        }
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn close(&mut self) {
        self.stream = None;
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}
