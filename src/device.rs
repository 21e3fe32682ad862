//! A single attached board: its transport, probed capabilities, and the
//! raw-REPL channel mutex that serializes remote calls against it.

use crate::consts::{DEFAULT_BUFFER_SIZE, DEFAULT_FOLLOW_TIMEOUT_SECS};
use crate::error::DriverError;
use crate::literal::Literal;
use crate::procedures;
use crate::raw_repl::RawReplChannel;
use crate::remote_call::{self, Placeholders, XferFn};
use crate::timebase::TIME_OFFSET;
use crate::transport::serial::SerialTransport;
use crate::transport::tcp::TcpTransport;
use crate::transport::Transport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Capabilities probed at connect time, deciding fast-path (binary) vs
/// fallback (hex) transfer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    pub has_binary_stdio: bool,
    pub has_hex_decode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Connected,
    Closed,
}

/// One attached board. Cheaply clonable via `Arc<Device>` from the
/// registry; internally single-owner of its transport behind a mutex so
/// remote calls serialize per device.
pub struct Device {
    short_name: String,
    display_name: parking_lot::Mutex<String>,
    name_path: parking_lot::Mutex<String>,
    root_dirs: Vec<String>,
    capabilities: Capabilities,
    status: parking_lot::Mutex<DeviceStatus>,
    buffer_size: usize,
    channel: Arc<Mutex<Box<dyn Transport>>>,
}

impl Device {
    /// Connect over a serial port, probing capabilities and board identity.
    pub async fn connect_serial(port: &str, baud: u32, wait: bool, buffer_size: usize) -> Result<Self, DriverError> {
        let transport: Box<dyn Transport> = if wait {
            Box::new(SerialTransport::open_waiting(port, baud).await?)
        } else {
            Box::new(SerialTransport::open(port, baud)?)
        };
        Self::from_transport(port.to_string(), transport, buffer_size).await
    }

    /// Connect over TCP, performing the telnet-style login handshake.
    pub async fn connect_net(name: &str, addr: &str, user: &str, password: &str, buffer_size: usize) -> Result<Self, DriverError> {
        let transport: Box<dyn Transport> = Box::new(TcpTransport::connect(addr, user, password).await?);
        Self::from_transport(name.to_string(), transport, buffer_size).await
    }

    /// Run the same connect-time capability probe and handshake as
    /// [`Self::connect_serial`]/[`Self::connect_net`] against an arbitrary
    /// transport. Used by integration tests to drive a simulated board
    /// through the real connect path.
    #[cfg(test)]
    pub(crate) async fn connect_with(short_name: impl Into<String>, transport: Box<dyn Transport>, buffer_size: usize) -> Result<Self, DriverError> {
        Self::from_transport(short_name.into(), transport, buffer_size).await
    }

    async fn from_transport(short_name: String, mut transport: Box<dyn Transport>, buffer_size: usize) -> Result<Self, DriverError> {
        transport.set_timeout(Some(Duration::from_secs(DEFAULT_FOLLOW_TIMEOUT_SECS)));

        let has_binary_stdio = probe_bool(&mut *transport, procedures::TEST_BUFFER, "test_buffer", buffer_size, false).await?;
        let has_hex_decode = if has_binary_stdio {
            true
        } else {
            probe_bool(&mut *transport, procedures::TEST_UNHEXLIFY, "test_unhexlify", buffer_size, false).await?
        };
        if !has_binary_stdio && !has_hex_decode {
            return Err(DriverError::Capability);
        }

        let root_listing = probe_eval(
            &mut *transport,
            procedures::LISTDIR,
            "listdir",
            &[Literal::Str("/".into())],
            buffer_size,
            has_binary_stdio,
        )
        .await?;
        let root_dirs = match root_listing {
            Literal::List(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    Literal::Str(name) => Some(format!("/{name}/")),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        let name_literal = probe_eval(&mut *transport, procedures::BOARD_NAME, "board_name", &[], buffer_size, has_binary_stdio).await?;
        let display_name = match name_literal {
            Literal::Str(s) => s,
            _ => "board".to_string(),
        };
        let name_path = format!("/{display_name}/");

        Ok(Device {
            short_name,
            display_name: parking_lot::Mutex::new(display_name),
            name_path: parking_lot::Mutex::new(name_path),
            root_dirs,
            capabilities: Capabilities { has_binary_stdio, has_hex_decode },
            status: parking_lot::Mutex::new(DeviceStatus::Connected),
            buffer_size,
            channel: Arc::new(Mutex::new(transport)),
        })
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn display_name(&self) -> String {
        self.display_name.lock().clone()
    }

    pub fn name_path(&self) -> String {
        self.name_path.lock().clone()
    }

    /// Used only by the registry, before the device is shared, to append a
    /// disambiguating suffix on a display-name collision.
    pub(crate) fn set_display_name(&self, name: String) {
        *self.name_path.lock() = format!("/{name}/");
        *self.display_name.lock() = name;
    }

    pub fn root_dirs(&self) -> &[String] {
        &self.root_dirs
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn status(&self) -> DeviceStatus {
        *self.status.lock()
    }

    /// Whether `filename` (with a trailing `/` appended) falls under one of
    /// this device's top-level directories.
    pub fn is_root_path(&self, filename: &str) -> bool {
        let test = format!("{filename}/");
        self.root_dirs.iter().any(|root| test.starts_with(root.as_str()))
    }

    fn mark_closed(&self) {
        *self.status.lock() = DeviceStatus::Closed;
    }

    /// Called by the pass-through session when its transport reports closed.
    pub(crate) fn note_transport_closed(&self) {
        self.mark_closed();
    }

    /// Clone of the transport mutex, for callers (pass-through) that need
    /// exclusive, extended ownership of the channel for a whole session
    /// rather than one `remote()` call.
    pub(crate) fn channel_arc(&self) -> Arc<Mutex<Box<dyn Transport>>> {
        self.channel.clone()
    }

    /// Run `procedure_source`'s `func_name(args...)` on the board and
    /// return its captured stdout verbatim.
    pub async fn remote(
        &self,
        procedure_source: &str,
        func_name: &str,
        args: &[Literal],
        xfer: Option<XferFn<'_>>,
    ) -> Result<Vec<u8>, DriverError> {
        if self.status() == DeviceStatus::Closed {
            return Err(DriverError::TransportClosed);
        }
        let mut guard = self.channel.lock().await;
        let placeholders = Placeholders {
            time_offset: TIME_OFFSET,
            has_binary_stdio: self.capabilities.has_binary_stdio,
            buffer_size: self.buffer_size,
        };
        let mut channel = RawReplChannel::new(&mut **guard);
        let result = remote_call::call(
            &mut channel,
            procedure_source,
            func_name,
            args,
            placeholders,
            Duration::from_secs(DEFAULT_FOLLOW_TIMEOUT_SECS),
            xfer,
        )
        .await;
        if matches!(result, Err(DriverError::TransportClosed)) {
            self.mark_closed();
        }
        result
    }

    /// Calls `func_name` and parses the textual result as a primitive
    /// literal value.
    pub async fn remote_eval(&self, procedure_source: &str, func_name: &str, args: &[Literal]) -> Result<Literal, DriverError> {
        let raw = self.remote(procedure_source, func_name, args, None).await?;
        remote_call::parse_result(&raw)
    }

    pub fn close(&self) {
        self.mark_closed();
        if let Ok(mut guard) = self.channel.try_lock() {
            guard.close();
        }
    }
}

/// Run a no-argument boolean probe directly against a freshly-opened
/// transport, before a `Device` (and its mutex) exists.
async fn probe_bool(transport: &mut dyn Transport, source: &str, func: &str, buffer_size: usize, has_binary_stdio: bool) -> Result<bool, DriverError> {
    match probe_eval(transport, source, func, &[], buffer_size, has_binary_stdio).await? {
        Literal::Bool(b) => Ok(b),
        _ => Ok(false),
    }
}

async fn probe_eval(
    transport: &mut dyn Transport,
    source: &str,
    func: &str,
    args: &[Literal],
    buffer_size: usize,
    has_binary_stdio: bool,
) -> Result<Literal, DriverError> {
    let placeholders = Placeholders {
        time_offset: TIME_OFFSET,
        has_binary_stdio,
        buffer_size,
    };
    let mut channel = RawReplChannel::new(transport);
    let raw = remote_call::call(
        &mut channel,
        source,
        func,
        args,
        placeholders,
        Duration::from_secs(DEFAULT_FOLLOW_TIMEOUT_SECS),
        None,
    )
    .await?;
    remote_call::parse_result(&raw)
}

#[allow(dead_code)]
pub(crate) fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

/// Test-only helpers for constructing `Device`s without a real transport,
/// used by the registry's unit tests.
#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    struct NullTransport;

    #[async_trait::async_trait]
    impl Transport for NullTransport {
        async fn write(&mut self, bytes: &[u8]) -> Result<usize, DriverError> {
            Ok(bytes.len())
        }
        async fn read(&mut self, _max: usize) -> Result<Vec<u8>, DriverError> {
            Ok(Vec::new())
        }
        fn set_timeout(&mut self, _timeout: Option<Duration>) {}
        fn close(&mut self) {}
        fn is_closed(&self) -> bool {
            false
        }
    }

    pub fn fake_device(short_name: &str, display_name: &str) -> Device {
        fake_device_with_roots(short_name, display_name, &[])
    }

    pub fn fake_device_with_roots(short_name: &str, display_name: &str, root_dirs: &[&str]) -> Device {
        Device {
            short_name: short_name.to_string(),
            display_name: parking_lot::Mutex::new(display_name.to_string()),
            name_path: parking_lot::Mutex::new(format!("/{display_name}/")),
            root_dirs: root_dirs.iter().map(|s| s.to_string()).collect(),
            capabilities: Capabilities { has_binary_stdio: true, has_hex_decode: true },
            status: parking_lot::Mutex::new(DeviceStatus::Connected),
            buffer_size: DEFAULT_BUFFER_SIZE,
            channel: Arc::new(Mutex::new(Box::new(NullTransport))),
        }
    }
}
