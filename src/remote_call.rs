//! Remote-call facility — builds a self-contained code blob from a
//! procedure and concrete argument values, ships it across a raw-REPL
//! channel, and returns the captured textual result.
//!
//! The board has no RPC runtime of its own: the host treats the board's
//! interpreter as the executor, shipping small self-contained fragments.
//! This keeps the board side zero-install but means every remote
//! procedure must be pure and free of references to host-side symbols.

use crate::error::DriverError;
use crate::literal::{self, Literal};
use crate::procedures;
use crate::raw_repl::RawReplChannel;
use crate::transport::Transport;
use std::time::Duration;

/// A coroutine run against the live raw-REPL transport between
/// `exec_no_follow` and `follow`, used by transfer-bearing calls.
pub type XferFn<'a> = Box<
    dyn for<'x> FnOnce(
            &'x mut dyn Transport,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), DriverError>> + 'x>>
        + Send
        + 'a,
>;

/// Parameters substituted into every procedure fragment before it is sent.
#[derive(Debug, Clone, Copy)]
pub struct Placeholders {
    pub time_offset: i64,
    pub has_binary_stdio: bool,
    pub buffer_size: usize,
}

/// Build the full code blob for `procedure(args...)`, substituting the
/// well-known placeholders and appending the output capture.
pub fn build_code_blob(procedure_source: &str, func_name: &str, args: &[Literal], placeholders: Placeholders) -> String {
    let args_repr = args
        .iter()
        .map(arg_repr)
        .collect::<Vec<_>>()
        .join(", ");

    let mut blob = String::new();
    blob.push_str(procedure_source);
    blob.push_str(&format!("output = {func_name}({args_repr})\n"));
    blob.push_str("if output is not None:\n    print(output)\n");

    blob = blob.replace(procedures::TIME_OFFSET, &placeholders.time_offset.to_string());
    blob = blob.replace(
        procedures::HAS_BINARY_STDIO,
        if placeholders.has_binary_stdio { "True" } else { "False" },
    );
    blob = blob.replace(procedures::BUFFER_SIZE, &placeholders.buffer_size.to_string());
    blob = blob.replace(procedures::IS_UPY, "True");
    blob
}

/// Values that would not round-trip through the board's textual
/// representation (opaque host objects) are replaced with the literal
/// `None`, matching the board-side `remote_repr` helper.
fn arg_repr(value: &Literal) -> String {
    value.to_string()
}

/// Invoke `procedure_source`/`func_name(args...)` over `channel`, optionally
/// running `xfer` against the live transport while the board executes.
/// `exit_raw()` always runs before returning, even on error.
pub async fn call<'x>(
    channel: &mut RawReplChannel<'x>,
    procedure_source: &str,
    func_name: &str,
    args: &[Literal],
    placeholders: Placeholders,
    follow_timeout: Duration,
    xfer: Option<XferFn<'_>>,
) -> Result<Vec<u8>, DriverError> {
    let blob = build_code_blob(procedure_source, func_name, args, placeholders);
    tracing::debug!(proc = func_name, argc = args.len(), "remote call");
    let result = run_call(channel, &blob, follow_timeout, xfer).await;
    // exit_raw must run unconditionally, regardless of how `run_call` failed,
    // so the channel is always left in `Friendly` (or `Closed`) afterward.
    let exit_result = channel.exit_raw().await;
    match result {
        Ok(output) => {
            exit_result?;
            Ok(output)
        }
        Err(e) => Err(e),
    }
}

async fn run_call<'x>(
    channel: &mut RawReplChannel<'x>,
    blob: &str,
    follow_timeout: Duration,
    xfer: Option<XferFn<'_>>,
) -> Result<Vec<u8>, DriverError> {
    channel.enter_raw().await?;
    channel.exec_no_follow(blob.as_bytes()).await?;
    if let Some(xfer) = xfer {
        xfer(channel.transport_mut()).await?;
    }
    channel.follow(follow_timeout).await
}

/// Parse the captured textual stdout as a primitive literal and return the
/// native value.
pub fn parse_result(raw: &[u8]) -> Result<Literal, DriverError> {
    let text = String::from_utf8_lossy(raw);
    literal::parse(text.trim()).map_err(|e| DriverError::Protocol(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_substitutes_all_placeholders() {
        let placeholders = Placeholders {
            time_offset: 946_684_800,
            has_binary_stdio: true,
            buffer_size: 512,
        };
        let blob = build_code_blob(
            "def f(x):\n    return x + BUFFER_SIZE\n",
            "f",
            &[Literal::Int(1)],
            placeholders,
        );
        assert!(blob.contains("512"));
        assert!(!blob.contains("BUFFER_SIZE"));
        assert!(blob.contains("output = f(1)"));
        assert!(blob.ends_with("if output is not None:\n    print(output)\n"));
    }

    #[test]
    fn opaque_values_serialize_as_none() {
        // Literal has no "opaque" variant by construction — every value we
        // can build already round-trips. This documents that invariant.
        assert_eq!(arg_repr(&Literal::None), "None");
        assert_eq!(arg_repr(&Literal::Str("a".into())), "\"a\"");
    }
}
