//! File-transfer sub-protocol — ack-paced fixed-chunk binary streaming in
//! either direction, layered over the raw channel while a remote procedure
//! is executing.
//!
//! Flow control is lock-step: the host blocks for one ACK byte (`0x06`)
//! before sending the next chunk, which keeps it at most one chunk ahead
//! of the board's small input buffer. A non-ACK byte received while
//! waiting is a diagnostic from the board (forwarded to stderr) rather
//! than a NAK — there is no explicit negative acknowledgement.

use crate::consts::ACK;
use crate::error::DriverError;
use crate::transport::Transport;

/// Wire encoding for one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Raw bytes on the wire.
    Binary,
    /// ASCII hex encoding — doubles bandwidth but survives transports that
    /// normalize newline bytes or interpret `0x03` as interrupt.
    Hex,
}

/// Direction of an in-flight transfer, tracked for diagnostics only — the
/// wire behavior is symmetric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HostToDevice,
    DeviceToHost,
}

/// The payload bytes carried in a single chunk, given the agreed on-wire
/// budget `chunk`. Hex mode halves the payload so the on-wire (encoded)
/// size stays at `chunk`.
pub fn payload_chunk_size(mode: Encoding, chunk: usize) -> usize {
    match mode {
        Encoding::Binary => chunk,
        Encoding::Hex => chunk / 2,
    }
}

/// Stream `data` to the board in `chunk`-sized pieces, waiting for one ACK
/// per chunk. Any non-ACK byte observed while waiting is forwarded to
/// `on_diagnostic` and the wait continues.
pub async fn send_host_to_device(
    transport: &mut dyn Transport,
    data: &[u8],
    chunk: usize,
    mode: Encoding,
    mut on_diagnostic: impl FnMut(u8),
) -> Result<(), DriverError> {
    let payload_size = payload_chunk_size(mode, chunk).max(1);
    for piece in data.chunks(payload_size) {
        let wire_bytes: Vec<u8> = match mode {
            Encoding::Binary => piece.to_vec(),
            Encoding::Hex => hex::encode(piece).into_bytes(),
        };
        transport.write(&wire_bytes).await?;
        wait_for_ack(transport, &mut on_diagnostic).await?;
    }
    Ok(())
}

/// Mirror image of [`send_host_to_device`]: read `filesize` payload bytes
/// from the board, ACKing each chunk as it arrives.
pub async fn recv_device_to_host(
    transport: &mut dyn Transport,
    filesize: usize,
    chunk: usize,
    mode: Encoding,
) -> Result<Vec<u8>, DriverError> {
    let payload_size = payload_chunk_size(mode, chunk).max(1);
    let mut out = Vec::with_capacity(filesize);
    let mut remaining = filesize;
    while remaining > 0 {
        let this_payload = remaining.min(payload_size);
        let wire_len = match mode {
            Encoding::Binary => this_payload,
            Encoding::Hex => this_payload * 2,
        };
        let wire_bytes = read_exact(transport, wire_len).await?;
        let decoded = match mode {
            Encoding::Binary => wire_bytes,
            Encoding::Hex => hex::decode(&wire_bytes)
                .map_err(|e| DriverError::Protocol(format!("invalid hex in transfer: {e}")))?,
        };
        out.extend_from_slice(&decoded);
        remaining -= this_payload;
        transport.write(&[ACK]).await?;
    }
    Ok(out)
}

/// Block until an ACK byte is observed; forward anything else to the
/// caller-supplied diagnostic sink and keep waiting.
async fn wait_for_ack(transport: &mut dyn Transport, on_diagnostic: &mut impl FnMut(u8)) -> Result<(), DriverError> {
    loop {
        let chunk = transport.read(1).await?;
        match chunk.first() {
            Some(&ACK) => return Ok(()),
            Some(&other) => on_diagnostic(other),
            None => continue, // timeout tick — caller's overall deadline governs
        }
    }
}

/// Read exactly `n` bytes, looping over however many the transport hands
/// back per call.
async fn read_exact(transport: &mut dyn Transport, n: usize) -> Result<Vec<u8>, DriverError> {
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        let chunk = transport.read(n - out.len()).await?;
        out.extend_from_slice(&chunk);
    }
    Ok(out)
}
