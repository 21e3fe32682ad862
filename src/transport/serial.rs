//! Serial transport — a persistent connection to a board's USB-CDC or UART
//! serial port.
//!
//! Unlike a request/response protocol, the raw-REPL channel holds the port
//! open for the lifetime of the [`Device`](crate::device::Device): every
//! remote call and the pass-through bridge share the same connection.

use super::Transport;
use crate::consts::{CTRL_C, DEFAULT_BAUD, WAIT_FOR_DEVICE_POLL_SECS};
use crate::error::DriverError;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::SerialPortBuilderExt;

/// A serial port opened at a fixed baud rate.
pub struct SerialTransport {
    port: Option<tokio_serial::SerialStream>,
    path: String,
    baud: u32,
    timeout: Option<Duration>,
}

impl SerialTransport {
    /// Open `path` at `baud` immediately, without waiting for the device
    /// node to exist and without probing it.
    pub fn open(path: impl Into<String>, baud: u32) -> Result<Self, DriverError> {
        let path = path.into();
        let port = tokio_serial::new(&path, baud)
            .open_native_async()
            .map_err(|e| DriverError::Protocol(format!("failed to open {path}: {e}")))?;
        Ok(Self {
            port: Some(port),
            path,
            baud,
            timeout: None,
        })
    }

    /// Open `path` at the default baud rate.
    pub fn open_default(path: impl Into<String>) -> Result<Self, DriverError> {
        Self::open(path, DEFAULT_BAUD)
    }

    /// Poll for `path` to exist at 0.5s intervals, printing a dotted
    /// progress indicator, then open it and probe it with a single
    /// interrupt byte — retrying every 0.5s (with more dots) until a
    /// write succeeds. Accommodates slow USB/BT enumeration.
    pub async fn open_waiting(path: impl Into<String>, baud: u32) -> Result<Self, DriverError> {
        let path = path.into();
        if !std::path::Path::new(&path).exists() {
            print!("Waiting for '{path}' to exist");
            let _ = std::io::Write::flush(&mut std::io::stdout());
            while !std::path::Path::new(&path).exists() {
                print!(".");
                let _ = std::io::Write::flush(&mut std::io::stdout());
                tokio::time::sleep(Duration::from_secs_f64(WAIT_FOR_DEVICE_POLL_SECS)).await;
            }
            println!();
        }

        let mut this = Self::open(&path, baud)?;
        loop {
            let probe = {
                let port = this
                    .port
                    .as_mut()
                    .ok_or(DriverError::TransportClosed)?;
                port.write_all(&[CTRL_C]).await
            };
            match probe {
                Ok(()) => return Ok(this),
                Err(_) => {
                    print!(".");
                    let _ = std::io::Write::flush(&mut std::io::stdout());
                    tokio::time::sleep(Duration::from_secs_f64(WAIT_FOR_DEVICE_POLL_SECS)).await;
                }
            }
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn baud(&self) -> u32 {
        self.baud
    }
}

#[async_trait::async_trait]
impl Transport for SerialTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<usize, DriverError> {
        let port = self.port.as_mut().ok_or(DriverError::TransportClosed)?;
        match port.write_all(bytes).await {
            Ok(()) => Ok(bytes.len()),
            Err(_) => {
                self.close();
                Err(DriverError::TransportClosed)
            }
        }
    }

    async fn read(&mut self, max: usize) -> Result<Vec<u8>, DriverError> {
        let port = self.port.as_mut().ok_or(DriverError::TransportClosed)?;
        let mut buf = vec![0_u8; max.max(1)];
        let fut = port.read(&mut buf);
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
        self.port = None;
    }

    fn is_closed(&self) -> bool {
        self.port.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_a_missing_port_fails() {
        let result = SerialTransport::open("/dev/ttyACM_rshell_test_does_not_exist_99", 115_200);
        assert!(result.is_err());
    }
}
