//! Protocol byte constants and default parameters.
//!
//! These mirror the wire table in the driver specification exactly — the
//! board firmware and the host must agree on every value here.

/// Interrupt current line; also used as a connect-time probe byte.
pub const CTRL_C: u8 = 0x03;
/// Enter raw REPL mode.
pub const CTRL_A: u8 = 0x01;
/// Exit raw REPL mode, return to friendly mode.
pub const CTRL_B: u8 = 0x02;
/// End-of-text: ends a code block sent to the board, and ends each of the
/// board's output streams (stdout, then stderr) in raw mode.
pub const CTRL_D: u8 = 0x04;
/// ACK byte used by the file-transfer sub-protocol.
pub const ACK: u8 = 0x06;
/// Exit key for the interactive pass-through terminal (Ctrl-X).
pub const CTRL_X: u8 = 0x18;

/// Banner the board prints after entering raw mode.
pub const RAW_REPL_BANNER: &str = "raw REPL; CTRL-B to exit\r\n>";
/// Text the board sends to confirm a code block was accepted.
pub const CODE_ACCEPTED: &str = "OK";

/// Default bulk-transfer chunk size in payload bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 512;
/// Default baud rate for serial transports.
pub const DEFAULT_BAUD: u32 = 115_200;
/// Default `follow()` timeout for a remote call (seconds).
pub const DEFAULT_FOLLOW_TIMEOUT_SECS: u64 = 10;
/// Read timeout used by the interactive pass-through reader task (seconds).
pub const PASSTHROUGH_READ_TIMEOUT_SECS: u64 = 1;
/// Poll interval while waiting for a serial device node to appear, or for a
/// slow-enumerating USB/BT transport to accept its first write (seconds).
pub const WAIT_FOR_DEVICE_POLL_SECS: f64 = 0.5;

/// Default telnet-style credentials used when none are configured.
pub const DEFAULT_USER: &str = "micro";
pub const DEFAULT_PASSWORD: &str = "python";
