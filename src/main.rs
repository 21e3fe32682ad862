//! Binary entry point: argument parsing, logging setup, and command
//! dispatch. The crate's actual logic lives in the library modules; this
//! file is deliberately thin.

use clap::{CommandFactory, Parser};
use rshell_driver::cli::{Cli, Command};
use rshell_driver::commands;
use rshell_driver::config::Config;
use rshell_driver::consts::DEFAULT_BUFFER_SIZE;
use rshell_driver::device::Device;
use rshell_driver::error::DriverError;
use rshell_driver::passthrough::{self, ReplLine};
use rshell_driver::registry::Registry;
use rshell_driver::session::Session;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = Config::from_env();
    let buffer_size = cli.buffer_size.unwrap_or(config.buffer_size).max(1);
    let baud = cli.baud.unwrap_or(config.baud);
    let port = cli.port.clone().or(config.port.clone());

    let mut session = Session::new(buffer_size, cli.debug);
    let registry = Registry::new();

    // Only the outermost CLI boundary deals in `anyhow`: everything but a
    // `UsageError` gets a one-line diagnostic and the process still exits
    // non-zero; `UsageError` instead prints the offending subcommand's
    // help, per the driver's error-handling policy.
    let exit_code = match run(&cli.command, &mut session, &registry, &config, port, baud).await {
        Ok(()) => 0,
        Err(DriverError::Usage(msg)) => {
            eprintln!("usage error: {msg}\n");
            let _ = Cli::command().print_help();
            1
        }
        Err(err) => {
            let reported: anyhow::Error = err.into();
            eprintln!("error: {reported:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

/// Looks like a serial device node (`/dev/...`, `COM3`) rather than a
/// `host:port` network address.
fn looks_like_serial_path(port: &str) -> bool {
    port.starts_with('/') || port.to_uppercase().starts_with("COM")
}

async fn connect(registry: &Registry, config: &Config, port: Option<String>, baud: u32, buffer_size: usize, wait: bool) -> Result<Arc<Device>, DriverError> {
    let port = port.ok_or_else(|| DriverError::Usage("no port given; pass --port or set RSHELL_PORT".to_string()))?;
    let device = if looks_like_serial_path(&port) {
        tracing::info!(port = %port, "connecting over serial");
        Device::connect_serial(&port, baud, wait, buffer_size).await?
    } else {
        tracing::info!(addr = %port, "connecting over tcp");
        Device::connect_net(&port, &port, &config.user, &config.password, buffer_size).await?
    };
    Ok(registry.add(device))
}

async fn run(
    command: &Command,
    session: &mut Session,
    registry: &Registry,
    config: &Config,
    port: Option<String>,
    baud: u32,
) -> Result<(), DriverError> {
    match command {
        Command::Connect { wait } => {
            let device = connect(registry, config, port, baud, session.chunk_size, *wait).await?;
            println!("connected: {}", device.display_name());
            Ok(())
        }
        Command::Ls { path } => {
            ensure_connected(registry, config, port, baud, session.chunk_size).await?;
            for entry in commands::ls(session, registry, path.clone()).await? {
                println!("{entry}");
            }
            Ok(())
        }
        Command::Cat { path } => {
            ensure_connected(registry, config, port, baud, session.chunk_size).await?;
            let bytes = commands::cat(session, registry, path).await?;
            use std::io::Write;
            std::io::stdout().write_all(&bytes).ok();
            Ok(())
        }
        Command::Cp { src, dst } => {
            ensure_connected(registry, config, port, baud, session.chunk_size).await?;
            commands::cp(session, registry, src, dst).await
        }
        Command::Rm { path } => {
            ensure_connected(registry, config, port, baud, session.chunk_size).await?;
            commands::rm(session, registry, path).await
        }
        Command::Mkdir { path } => {
            ensure_connected(registry, config, port, baud, session.chunk_size).await?;
            commands::mkdir(session, registry, path).await
        }
        Command::Boards => {
            for line in commands::boards(registry) {
                println!("{line}");
            }
            Ok(())
        }
        Command::Repl { board, line } => {
            ensure_connected(registry, config, port, baud, session.chunk_size).await?;
            let device = registry
                .find(board.as_deref().unwrap_or(""))
                .ok_or_else(|| DriverError::Resolution(format!("no such board: {:?}", board)))?;
            let parsed = line.as_deref().and_then(passthrough::parse_repl_line).map(|l| ReplLine {
                text: l.text,
                quit_when_no_output: l.quit_when_no_output,
            });
            let needs_keyboard = !parsed.as_ref().is_some_and(|l| l.quit_when_no_output);

            let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
            if needs_keyboard {
                crossterm::terminal::enable_raw_mode()
                    .map_err(|e| DriverError::Protocol(format!("failed to enter raw terminal mode: {e}")))?;
                spawn_stdin_forwarder(tx);
            }
            let result = passthrough::run(&device, parsed, rx).await;
            if needs_keyboard {
                let _ = crossterm::terminal::disable_raw_mode();
            }
            result
        }
    }
}

/// Forward the user's terminal one byte at a time into `tx`, for as long as
/// stdin stays open. Runs on a blocking thread since raw-mode stdin reads
/// are synchronous.
fn spawn_stdin_forwarder(tx: tokio::sync::mpsc::UnboundedSender<u8>) {
    tokio::task::spawn_blocking(move || {
        use std::io::Read;
        let mut stdin = std::io::stdin();
        let mut byte = [0_u8; 1];
        loop {
            match stdin.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    if tx.send(byte[0]).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
}

/// Subcommands other than `connect`/`boards` need at least one registered
/// device; connect one from `--port`/`RSHELL_PORT` if the registry is empty.
async fn ensure_connected(registry: &Registry, config: &Config, port: Option<String>, baud: u32, buffer_size: usize) -> Result<(), DriverError> {
    if registry.default_device().is_some() {
        return Ok(());
    }
    connect(registry, config, port, baud, buffer_size.max(DEFAULT_BUFFER_SIZE.min(buffer_size)), false).await?;
    Ok(())
}
