//! Argument parser — the thin external collaborator around the core
//! driver. Global connection flags plus a handful of subcommands enough
//! to exercise the VFS and file-transfer sub-protocol from a terminal.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rshell", about = "Remote shell for boards running a raw-REPL interpreter")]
pub struct Cli {
    /// Serial port or `user:pass@host` TCP address. Falls back to
    /// `RSHELL_PORT` if omitted.
    #[arg(long, global = true)]
    pub port: Option<String>,

    /// Serial baud rate.
    #[arg(long, global = true)]
    pub baud: Option<u32>,

    /// File-transfer chunk size in bytes.
    #[arg(long = "buffer-size", global = true)]
    pub buffer_size: Option<usize>,

    /// Log raw-REPL state transitions and remote-call procedure names
    /// (never full code blobs or file contents) at debug level.
    #[arg(short, long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to a board and list it in the registry without further action.
    Connect {
        /// Poll for the device node instead of failing immediately if absent.
        #[arg(long)]
        wait: bool,
    },
    /// List a directory, host or device.
    Ls { path: Option<String> },
    /// Print a file's contents.
    Cat { path: String },
    /// Copy a file between host and device(s), or within one side.
    Cp { src: String, dst: String },
    /// Delete a file.
    Rm { path: String },
    /// Create a directory.
    Mkdir { path: String },
    /// Enter the interactive pass-through terminal.
    Repl {
        /// Board to attach to; defaults to the registry's default device.
        board: Option<String>,
        /// A line to run non-interactively; end it with `~` to exit once
        /// the board goes quiet instead of waiting for a keypress.
        line: Option<String>,
    },
    /// List currently-registered boards.
    Boards,
}
