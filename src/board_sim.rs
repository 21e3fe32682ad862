//! An in-process stand-in for a board, used only by the integration tests
//! in [`crate::integration_tests`]. It plays the board's side of the
//! raw-REPL wire protocol (banner, `OK`, end-of-text framing) and of the
//! file-transfer sub-protocol well enough to exercise the real
//! `Device`/`RawReplChannel`/`xfer` code paths without physical hardware —
//! it does not interpret arbitrary code, only the small, fixed catalogue of
//! remote procedures in [`crate::procedures`] plus whatever a given test
//! registers for its own fixture calls.
#![cfg(test)]

use crate::consts::{ACK, CODE_ACCEPTED, CTRL_A, CTRL_B, CTRL_C, CTRL_D, RAW_REPL_BANNER};
use crate::error::DriverError;
use crate::transport::Transport;
use crate::xfer::{self, Encoding};
use std::collections::HashMap;
use std::time::Duration;

fn python_bool(b: bool) -> String {
    if b { "True".to_string() } else { "False".to_string() }
}

enum TransferOp {
    RecvFromHost {
        dst_path: String,
        remaining: usize,
        payload_chunk: usize,
        mode: Encoding,
    },
    SendToHost {
        data: Vec<u8>,
        offset: usize,
        payload_chunk: usize,
        mode: Encoding,
        pending_payload_len: usize,
    },
}

enum BoardState {
    Friendly,
    RawReady,
    Busy(TransferOp),
}

/// The simulated board's file system and identity, plus the protocol state
/// needed to answer raw-REPL and file-transfer traffic.
pub(crate) struct SimBoard {
    pub name: String,
    pub has_binary_stdio: bool,
    pub has_hex_decode: bool,
    pub root_dirs: Vec<String>,
    pub files: HashMap<String, Vec<u8>>,
    pub buffer_size: usize,
    state: BoardState,
    pending_code: Vec<u8>,
    friendly_buf: Vec<u8>,
    outbound: Vec<u8>,
}

impl SimBoard {
    pub fn new(name: &str, has_binary_stdio: bool, has_hex_decode: bool, buffer_size: usize) -> Self {
        Self {
            name: name.to_string(),
            has_binary_stdio,
            has_hex_decode,
            root_dirs: vec!["flash".to_string()],
            files: HashMap::new(),
            buffer_size,
            state: BoardState::Friendly,
            pending_code: Vec::new(),
            friendly_buf: Vec::new(),
            outbound: Vec::new(),
        }
    }

    fn encoding(&self) -> Encoding {
        if self.has_binary_stdio {
            Encoding::Binary
        } else {
            Encoding::Hex
        }
    }

    /// Extract the `name(arg1, arg2, ...)` call that `build_code_blob`
    /// appends as `output = name(args)`, returning the function name and
    /// its raw argument texts.
    fn extract_call(code: &str) -> Option<(String, Vec<String>)> {
        let marker = "output = ";
        let start = code.find(marker)? + marker.len();
        let rest = &code[start..];
        let open = rest.find('(')?;
        let name = rest[..open].trim().to_string();
        let close = rest.find(')')?;
        let args_text = &rest[open + 1..close];
        let args = if args_text.trim().is_empty() {
            Vec::new()
        } else {
            args_text.split(',').map(|a| a.trim().to_string()).collect()
        };
        Some((name, args))
    }

    fn arg_as_path(arg: &str) -> String {
        arg.trim_matches(|c| c == '"' || c == '\'').to_string()
    }

    fn run_code(&mut self, code: &str) -> (Vec<u8>, Vec<u8>, Option<TransferOp>) {
        let Some((name, args)) = Self::extract_call(code) else {
            return (Vec::new(), Vec::new(), None);
        };
        let mode = self.encoding();
        let chunk = xfer::payload_chunk_size(mode, self.buffer_size).max(1);

        match name.as_str() {
            "test_buffer" => (python_bool(self.has_binary_stdio).into_bytes(), Vec::new(), None),
            "test_unhexlify" => (python_bool(self.has_hex_decode).into_bytes(), Vec::new(), None),
            "board_name" => (format!("{:?}", self.name).into_bytes(), Vec::new(), None),
            "listdir" => {
                let listing = self
                    .root_dirs
                    .iter()
                    .map(|d| format!("{d:?}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                (format!("[{listing}]").into_bytes(), Vec::new(), None)
            }
            "get_filesize" => {
                let path = Self::arg_as_path(&args[0]);
                match self.files.get(&path) {
                    Some(bytes) => (bytes.len().to_string().into_bytes(), Vec::new(), None),
                    None => (Vec::new(), b"OSError: [Errno 2] ENOENT".to_vec(), None),
                }
            }
            "make_directory" => {
                // Tracked only well enough for tests that just check it
                // doesn't error; this simulator has no real directory tree.
                (Vec::new(), Vec::new(), None)
            }
            "remove_file" => {
                self.files.remove(&Self::arg_as_path(&args[0]));
                (Vec::new(), Vec::new(), None)
            }
            "recv_file_from_host" => {
                let path = Self::arg_as_path(&args[0]);
                let filesize: usize = args[1].trim().parse().unwrap_or(0);
                self.files.insert(path.clone(), Vec::new());
                (
                    Vec::new(),
                    Vec::new(),
                    Some(TransferOp::RecvFromHost {
                        dst_path: path,
                        remaining: filesize,
                        payload_chunk: chunk,
                        mode,
                    }),
                )
            }
            "send_file_to_host" => {
                let path = Self::arg_as_path(&args[0]);
                let data = self.files.get(&path).cloned().unwrap_or_default();
                (
                    Vec::new(),
                    Vec::new(),
                    Some(TransferOp::SendToHost {
                        data,
                        offset: 0,
                        payload_chunk: chunk,
                        mode,
                        pending_payload_len: 0,
                    }),
                )
            }
            // Test-only fixture: simulates a board-side traceback, for the
            // remote-exception scenario — not a real catalogue procedure.
            "raise_zero_division" => (
                Vec::new(),
                b"Traceback (most recent call last):\n  File \"<stdin>\", line 1, in raise_zero_division\nZeroDivisionError: division by zero\n".to_vec(),
                None,
            ),
            _ => (Vec::new(), Vec::new(), None),
        }
    }

    fn push_completion(&mut self, stdout: Vec<u8>, stderr: Vec<u8>) {
        self.outbound.extend_from_slice(&stdout);
        self.outbound.push(CTRL_D);
        self.outbound.extend_from_slice(&stderr);
        self.outbound.push(CTRL_D);
        self.outbound.push(b'>');
        self.state = BoardState::RawReady;
    }

    fn handle_write(&mut self, bytes: &[u8]) {
        if let BoardState::Busy(_) = self.state {
            self.handle_transfer_write(bytes);
            return;
        }
        if bytes == [CTRL_C, CTRL_C, CTRL_A] {
            self.pending_code.clear();
            self.outbound.extend_from_slice(RAW_REPL_BANNER.as_bytes());
            self.state = BoardState::RawReady;
            return;
        }
        if bytes == [CTRL_B] {
            self.state = BoardState::Friendly;
            self.pending_code.clear();
            return;
        }
        match self.state {
            BoardState::Friendly => self.handle_friendly_write(bytes),
            BoardState::RawReady => {
                if bytes == [CTRL_D] {
                    let code = std::mem::take(&mut self.pending_code);
                    self.outbound.extend_from_slice(CODE_ACCEPTED.as_bytes());
                    let (stdout, stderr, transfer) = self.run_code(&String::from_utf8_lossy(&code));
                    match transfer {
                        None => self.push_completion(stdout, stderr),
                        Some(op) => self.state = BoardState::Busy(op),
                    }
                } else {
                    self.pending_code.extend_from_slice(bytes);
                }
            }
            BoardState::Busy(_) => unreachable!("handled above"),
        }
    }

    fn handle_friendly_write(&mut self, bytes: &[u8]) {
        self.friendly_buf.extend_from_slice(bytes);
        if let Some(pos) = self.friendly_buf.iter().position(|&b| b == b'\r') {
            let line = String::from_utf8_lossy(&self.friendly_buf[..pos]).trim().to_string();
            self.friendly_buf.drain(..=pos);
            if line == "print(1)" {
                self.outbound.extend_from_slice(b"1\r\n");
            }
        }
    }

    fn handle_transfer_write(&mut self, bytes: &[u8]) {
        let BoardState::Busy(op) = &mut self.state else { return };
        match op {
            TransferOp::RecvFromHost { dst_path, remaining, mode, .. } => {
                let decoded = match mode {
                    Encoding::Binary => bytes.to_vec(),
                    Encoding::Hex => hex::decode(bytes).expect("valid hex on wire"),
                };
                self.files.get_mut(dst_path).expect("file opened by recv_file_from_host").extend_from_slice(&decoded);
                *remaining -= decoded.len();
                self.outbound.push(ACK);
                if *remaining == 0 {
                    self.push_completion(Vec::new(), Vec::new());
                }
            }
            TransferOp::SendToHost { offset, data, pending_payload_len, .. } => {
                assert_eq!(bytes, [ACK], "send_file_to_host expects an ACK after each chunk");
                *offset += *pending_payload_len;
                *pending_payload_len = 0;
                if *offset >= data.len() {
                    self.push_completion(Vec::new(), Vec::new());
                }
            }
        }
    }

    fn generate_next_chunk_if_needed(&mut self) {
        if !self.outbound.is_empty() {
            return;
        }
        if let BoardState::Busy(TransferOp::SendToHost { data, offset, payload_chunk, mode, pending_payload_len }) = &mut self.state {
            if *pending_payload_len > 0 {
                return;
            }
            let this_payload = (data.len() - *offset).min(*payload_chunk);
            let slice = &data[*offset..*offset + this_payload];
            let wire = match mode {
                Encoding::Binary => slice.to_vec(),
                Encoding::Hex => hex::encode(slice).into_bytes(),
            };
            self.outbound.extend_from_slice(&wire);
            *pending_payload_len = this_payload;
        }
    }
}

/// A [`Transport`] driven entirely by a [`SimBoard`] in the same process —
/// no sockets, no real time. Timeouts are accepted but not honored (there
/// is nothing to wait for: every response is produced synchronously inside
/// `write`/`read`).
///
/// The board lives behind an `Arc<std::sync::Mutex<_>>` (never held across
/// an `.await`) rather than being owned outright, so a test can keep its
/// own handle to inspect the board's resulting file contents after the
/// `Device` has taken ownership of the transport.
pub(crate) struct SimulatedTransport {
    board: std::sync::Arc<std::sync::Mutex<SimBoard>>,
    closed: bool,
}

impl SimulatedTransport {
    /// Returns the transport plus a shared handle to the same board, for
    /// post-hoc assertions.
    pub fn new(board: SimBoard) -> (Self, std::sync::Arc<std::sync::Mutex<SimBoard>>) {
        let handle = std::sync::Arc::new(std::sync::Mutex::new(board));
        (Self { board: handle.clone(), closed: false }, handle)
    }
}

#[async_trait::async_trait]
impl Transport for SimulatedTransport {
    async fn write(&mut self, bytes: &[u8]) -> Result<usize, DriverError> {
        if self.closed {
            return Err(DriverError::TransportClosed);
        }
        self.board.lock().expect("sim board lock poisoned").handle_write(bytes);
        Ok(bytes.len())
    }

    async fn read(&mut self, max: usize) -> Result<Vec<u8>, DriverError> {
        if self.closed {
            return Err(DriverError::TransportClosed);
        }
        let mut board = self.board.lock().expect("sim board lock poisoned");
        board.generate_next_chunk_if_needed();
        let n = max.min(board.outbound.len());
        Ok(board.outbound.drain(..n).collect())
    }

    fn set_timeout(&mut self, _timeout: Option<Duration>) {}

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
