//! Core device-driver library: raw-REPL protocol, file-transfer
//! sub-protocol, virtual filesystem namespace, device registry, and
//! interactive pass-through. The binary in `main.rs` is a thin CLI shell
//! around these modules.

#[cfg(test)]
mod board_sim;

pub mod cli;
pub mod commands;
pub mod config;
pub mod consts;
pub mod device;
pub mod error;
pub mod literal;
pub mod passthrough;
pub mod procedures;
pub mod raw_repl;
pub mod registry;
pub mod remote_call;
pub mod session;
pub mod timebase;
pub mod transport;
pub mod vfs;
pub mod xfer;
