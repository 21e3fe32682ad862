//! Command dispatch — wires the thin CLI collaborator to the core driver.
//! Every function here is a straight translation of one subcommand onto
//! `vfs::resolve`/`copy_plan`, the registry, and a device's `remote*`
//! calls; none of it is part of the protocol core itself.

use crate::device::{Capabilities, Device};
use crate::error::DriverError;
use crate::literal::Literal;
use crate::procedures;
use crate::registry::Registry;
use crate::remote_call::XferFn;
use crate::session::Session;
use crate::vfs::{self, CopyPlan, Resolved};
use crate::xfer::{self, Encoding};
use std::sync::Arc;

fn encoding_for(caps: Capabilities) -> Encoding {
    if caps.has_binary_stdio {
        Encoding::Binary
    } else {
        Encoding::Hex
    }
}

/// Read a whole file off `device` at `path`, via `send_file_to_host` on the
/// board side and a matching receive loop on the host side.
async fn device_read_file(device: &Arc<Device>, path: &str, chunk: usize) -> Result<Vec<u8>, DriverError> {
    let size = match device.remote_eval(procedures::GET_FILESIZE, "get_filesize", &[Literal::Str(path.to_string())]).await? {
        Literal::Int(n) if n >= 0 => n as usize,
        other => return Err(DriverError::Protocol(format!("get_filesize returned {other}"))),
    };

    let encoding = encoding_for(device.capabilities());
    let (tx, rx) = tokio::sync::oneshot::channel();
    let xfer: XferFn = Box::new(move |transport| {
        Box::pin(async move {
            let data = xfer::recv_device_to_host(transport, size, chunk, encoding).await?;
            let _ = tx.send(data);
            Ok(())
        })
    });

    device
        .remote(
            procedures::SEND_FILE_TO_HOST,
            "send_file_to_host",
            &[Literal::Str(path.to_string()), Literal::Int(size as i64)],
            Some(xfer),
        )
        .await?;

    rx.await.map_err(|_| DriverError::Protocol("transfer completed with no data captured".to_string()))
}

/// Write `data` to `device` at `path`, via `recv_file_from_host` on the
/// board side and a matching send loop on the host side.
async fn device_write_file(device: &Arc<Device>, path: &str, data: Vec<u8>, chunk: usize) -> Result<(), DriverError> {
    let size = data.len();
    let encoding = encoding_for(device.capabilities());
    let xfer: XferFn = Box::new(move |transport| {
        Box::pin(async move { xfer::send_host_to_device(transport, &data, chunk, encoding, |_diag| {}).await })
    });

    device
        .remote(
            procedures::RECV_FILE_FROM_HOST,
            "recv_file_from_host",
            &[Literal::Str(path.to_string()), Literal::Int(size as i64)],
            Some(xfer),
        )
        .await?;
    Ok(())
}

pub async fn ls(session: &Session, registry: &Registry, path: Option<String>) -> Result<Vec<String>, DriverError> {
    let target = path.unwrap_or_else(|| ".".to_string());
    match vfs::resolve(&target, session.cwd(), registry) {
        Resolved::Host(host_path) => {
            let mut entries = Vec::new();
            let mut dir = tokio::fs::read_dir(&host_path).await.map_err(|e| DriverError::Resolution(e.to_string()))?;
            while let Some(entry) = dir.next_entry().await.map_err(|e| DriverError::Resolution(e.to_string()))? {
                entries.push(entry.file_name().to_string_lossy().into_owned());
            }
            entries.sort();
            Ok(entries)
        }
        Resolved::Device(device, dev_path) => {
            match device.remote_eval(procedures::LISTDIR_STAT, "listdir_stat", &[Literal::Str(dev_path)]).await? {
                Literal::List(items) => Ok(items
                    .into_iter()
                    .filter_map(|item| match item {
                        Literal::Tuple(mut pair) if pair.len() == 2 => {
                            if let Literal::Str(name) = pair.remove(0) {
                                Some(name)
                            } else {
                                None
                            }
                        }
                        _ => None,
                    })
                    .collect()),
                other => Err(DriverError::Protocol(format!("listdir_stat returned {other}"))),
            }
        }
    }
}

pub async fn cat(session: &Session, registry: &Registry, path: &str) -> Result<Vec<u8>, DriverError> {
    match vfs::resolve(path, session.cwd(), registry) {
        Resolved::Host(host_path) => tokio::fs::read(&host_path).await.map_err(|e| DriverError::Resolution(e.to_string())),
        Resolved::Device(device, dev_path) => device_read_file(&device, &dev_path, session.chunk_size).await,
    }
}

pub async fn rm(session: &Session, registry: &Registry, path: &str) -> Result<(), DriverError> {
    match vfs::resolve(path, session.cwd(), registry) {
        Resolved::Host(host_path) => {
            let meta = tokio::fs::metadata(&host_path).await.map_err(|e| DriverError::Resolution(e.to_string()))?;
            if meta.is_dir() {
                tokio::fs::remove_dir(&host_path).await
            } else {
                tokio::fs::remove_file(&host_path).await
            }
            .map_err(|e| DriverError::Resolution(e.to_string()))
        }
        Resolved::Device(device, dev_path) => {
            device.remote(procedures::REMOVE_FILE, "remove_file", &[Literal::Str(dev_path)], None).await?;
            Ok(())
        }
    }
}

pub async fn mkdir(session: &Session, registry: &Registry, path: &str) -> Result<(), DriverError> {
    match vfs::resolve(path, session.cwd(), registry) {
        Resolved::Host(host_path) => tokio::fs::create_dir(&host_path).await.map_err(|e| DriverError::Resolution(e.to_string())),
        Resolved::Device(device, dev_path) => {
            device.remote(procedures::MAKE_DIRECTORY, "make_directory", &[Literal::Str(dev_path)], None).await?;
            Ok(())
        }
    }
}

pub async fn cp(session: &Session, registry: &Registry, src: &str, dst: &str) -> Result<(), DriverError> {
    let resolved_src = vfs::resolve(src, session.cwd(), registry);
    let resolved_dst = vfs::resolve(dst, session.cwd(), registry);

    match vfs::copy_plan(&resolved_src, &resolved_dst) {
        CopyPlan::SameSide => match (resolved_src, resolved_dst) {
            (Resolved::Host(from), Resolved::Host(to)) => {
                tokio::fs::copy(&from, &to).await.map_err(|e| DriverError::Resolution(e.to_string()))?;
                Ok(())
            }
            _ => Ok(()), // same-device remote copy: out of scope, matches the spec's Non-goal on directory sync
        },
        CopyPlan::HostToDevice { dst, dst_path } => {
            let Resolved::Host(host_src) = resolved_src else { unreachable!() };
            let data = tokio::fs::read(&host_src).await.map_err(|e| DriverError::Resolution(e.to_string()))?;
            device_write_file(&dst, &dst_path, data, session.chunk_size).await
        }
        CopyPlan::DeviceToHost { src, src_path } => {
            let Resolved::Host(host_dst) = resolved_dst else { unreachable!() };
            let data = device_read_file(&src, &src_path, session.chunk_size).await?;
            tokio::fs::write(&host_dst, &data).await.map_err(|e| DriverError::Resolution(e.to_string()))
        }
        CopyPlan::DeviceToDevice { src, src_path, dst, dst_path } => {
            // Different devices never talk to each other directly: stage
            // through an anonymous host temp file, as spelled out for `cp`
            // in the VFS namespace design.
            let data = device_read_file(&src, &src_path, session.chunk_size).await?;
            let staging = tempfile::NamedTempFile::new().map_err(|e| DriverError::Resolution(e.to_string()))?;
            tokio::fs::write(staging.path(), &data).await.map_err(|e| DriverError::Resolution(e.to_string()))?;
            let staged = tokio::fs::read(staging.path()).await.map_err(|e| DriverError::Resolution(e.to_string()))?;
            device_write_file(&dst, &dst_path, staged, session.chunk_size).await
        }
    }
}

pub fn boards(registry: &Registry) -> Vec<String> {
    let default = registry.default_device();
    registry
        .list()
        .iter()
        .map(|d| {
            let marker = if default.as_ref().is_some_and(|def| Arc::ptr_eq(def, d)) { "*" } else { " " };
            format!("{marker} {} ({})", d.display_name(), d.short_name())
        })
        .collect()
}
