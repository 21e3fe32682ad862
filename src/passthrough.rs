//! Interactive pass-through terminal — bridges a board's friendly REPL to
//! the local terminal until Control-X is pressed.
//!
//! A session takes exclusive ownership of the device's transport for its
//! whole duration: remote calls are not issued while pass-through is
//! active. One task reads board output and writes it to stdout; the
//! foreground loop reads keystrokes and forwards them to the board. The
//! two halves share the transport through the cloned `Arc<Mutex<...>>`,
//! with the reader task holding the lock only while it cares about the
//! board (it checks a stop flag between reads rather than fighting the
//! foreground loop for the lock).

use crate::consts::{CTRL_X, PASSTHROUGH_READ_TIMEOUT_SECS};
use crate::device::Device;
use crate::error::DriverError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, Stdout};

/// One line optionally provided to `repl` to run non-interactively. If it
/// ends in `~`, the session exits as soon as the board stops producing
/// output rather than waiting for a keypress.
pub struct ReplLine {
    pub text: String,
    pub quit_when_no_output: bool,
}

pub fn parse_repl_line(line: &str) -> Option<ReplLine> {
    if line.is_empty() {
        return None;
    }
    let stripped = line.strip_prefix("~ ").unwrap_or(line);
    if let Some(body) = stripped.strip_suffix('~') {
        Some(ReplLine { text: body.to_string(), quit_when_no_output: true })
    } else {
        Some(ReplLine { text: stripped.to_string(), quit_when_no_output: false })
    }
}

/// Run an interactive pass-through session against `device`, reading
/// keystrokes from `keys` (one byte per item, as delivered by the caller's
/// terminal driver) and writing board output to stdout.
///
/// Returns once Control-X is seen, the keystroke source is exhausted, or
/// (when `line` requests it) the board has gone quiet.
pub async fn run(
    device: &Arc<Device>,
    line: Option<ReplLine>,
    mut keys: tokio::sync::mpsc::UnboundedReceiver<u8>,
) -> Result<(), DriverError> {
    let channel = device.channel_arc();
    let quit_flag = Arc::new(AtomicBool::new(false));
    let quit_when_no_output = line.as_ref().is_some_and(|l| l.quit_when_no_output);

    let reader_channel = channel.clone();
    let reader_quit = quit_flag.clone();
    let reader_device = device.clone();
    let reader_task = tokio::spawn(async move {
        reader_loop(reader_channel, reader_quit, quit_when_no_output, reader_device).await;
    });

    {
        let mut guard = channel.lock().await;
        guard.write(b"\r").await?;
        if let Some(line) = &line {
            if !line.text.is_empty() {
                guard.write(line.text.as_bytes()).await?;
                guard.write(b"\r").await?;
            }
        }
    }

    if !quit_when_no_output {
        while let Some(key) = keys.recv().await {
            if key == CTRL_X {
                break;
            }
            let mut guard = channel.lock().await;
            if key == b'\n' {
                guard.write(b"\r").await?;
            } else {
                guard.write(&[key]).await?;
            }
        }
    }

    quit_flag.store(true, Ordering::SeqCst);
    let _ = reader_task.await;

    if device.status() == crate::device::DeviceStatus::Closed {
        return Err(DriverError::TransportClosed);
    }
    Ok(())
}

async fn reader_loop(
    channel: Arc<tokio::sync::Mutex<Box<dyn crate::transport::Transport>>>,
    quit_flag: Arc<AtomicBool>,
    quit_when_no_output: bool,
    device: Arc<Device>,
) {
    let mut stdout: Stdout = tokio::io::stdout();
    let mut seen_output = false;
    loop {
        if quit_flag.load(Ordering::SeqCst) {
            return;
        }
        let byte = {
            let mut guard = channel.lock().await;
            guard.set_timeout(Some(Duration::from_secs(PASSTHROUGH_READ_TIMEOUT_SECS)));
            guard.read(1).await
        };
        match byte {
            Ok(bytes) if bytes.is_empty() => {
                // Only an idle window *after* some output has arrived
                // signals end-of-response; an idle tick before the board
                // has said anything just means it hasn't replied yet.
                if quit_when_no_output && seen_output {
                    quit_flag.store(true, Ordering::SeqCst);
                    return;
                }
                continue;
            }
            Ok(bytes) => {
                seen_output = true;
                if stdout.write_all(&bytes).await.is_err() {
                    return;
                }
                let _ = stdout.flush().await;
            }
            Err(DriverError::TransportClosed) => {
                device.note_transport_closed();
                return;
            }
            Err(_) => return,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_line_has_no_quit_marker() {
        let parsed = parse_repl_line("print(1)").unwrap();
        assert_eq!(parsed.text, "print(1)");
        assert!(!parsed.quit_when_no_output);
    }

    #[test]
    fn tilde_suffix_requests_quit_when_no_output() {
        let parsed = parse_repl_line("print(1)~").unwrap();
        assert_eq!(parsed.text, "print(1)");
        assert!(parsed.quit_when_no_output);
    }

    #[test]
    fn leading_tilde_marker_is_stripped() {
        let parsed = parse_repl_line("~ print(1)").unwrap();
        assert_eq!(parsed.text, "print(1)");
    }

    #[test]
    fn empty_line_is_none() {
        assert!(parse_repl_line("").is_none());
    }
}
