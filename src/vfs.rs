//! Virtual filesystem namespace — maps host-visible paths to (device,
//! device-local path) pairs, and decides how a `cp` between two resolved
//! locations should be carried out.

use crate::device::Device;
use crate::registry::Registry;
use std::sync::Arc;

/// The outcome of resolving one path.
#[derive(Clone)]
pub enum Resolved {
    Host(String),
    Device(Arc<Device>, String),
}

impl Resolved {
    pub fn is_same_location(&self, other: &Resolved) -> bool {
        match (self, other) {
            (Resolved::Host(_), Resolved::Host(_)) => true,
            (Resolved::Device(a, _), Resolved::Device(b, _)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Expand a leading `~`, make the path absolute against `cwd`, and
/// normalize `.`/`..` components without ever climbing above the root.
///
/// `resolve_path(resolve_path(p)) == resolve_path(p)` for all `p`, and
/// `~` expands only when it is the first character.
pub fn normalize(path: &str, cwd: &str) -> String {
    let expanded = if path.starts_with('~') {
        shellexpand::tilde(path).into_owned()
    } else {
        path.to_string()
    };

    let absolute = if expanded.starts_with('/') {
        expanded
    } else if cwd.ends_with('/') {
        format!("{cwd}{expanded}")
    } else {
        format!("{cwd}/{expanded}")
    };

    let mut new_comps: Vec<&str> = Vec::new();
    for comp in absolute.split('/') {
        if comp == "." {
            continue;
        }
        if comp == ".." {
            if new_comps.len() > 1 {
                new_comps.pop();
            }
            continue;
        }
        new_comps.push(comp);
    }
    if new_comps.len() == 1 {
        format!("{}/", new_comps[0])
    } else {
        new_comps.join("/")
    }
}

/// Resolve a (possibly relative, possibly `~`-prefixed) path to exactly one
/// of {host, a specific device}, given the current registry snapshot.
///
/// Routing:
/// - if the default device exists and the normalized path begins with one
///   of its `root_dirs`, route to the default device with the path
///   unchanged;
/// - otherwise, if the path starts with some registered device's mount
///   prefix (`/<display_name>/`), route to that device with the prefix
///   stripped (`/board1` alone becomes `(board1, "/")`);
/// - otherwise, route to the host with the literal path.
pub fn resolve(path: &str, cwd: &str, registry: &Registry) -> Resolved {
    let normalized = normalize(path, cwd);

    if let Some(default) = registry.default_device() {
        if default.is_root_path(&normalized) {
            return Resolved::Device(default, normalized);
        }
    }

    let test = format!("{normalized}/");
    for device in registry.list() {
        let prefix = device.name_path();
        if test.starts_with(prefix.as_str()) {
            let stripped = &normalized[prefix.len() - 1..];
            let dev_path = if stripped.is_empty() { "/".to_string() } else { stripped.to_string() };
            return Resolved::Device(device, dev_path);
        }
    }

    Resolved::Host(normalized)
}

/// How a `cp` between two resolved locations should be carried out.
pub enum CopyPlan {
    /// Both endpoints are the host, or both are the same device: a local
    /// (or same-device remote) copy suffices.
    SameSide,
    /// Host source, device destination: a single write-direction transfer.
    HostToDevice { dst: Arc<Device>, dst_path: String },
    /// Device source, host destination: a single read-direction transfer.
    DeviceToHost { src: Arc<Device>, src_path: String },
    /// Different devices: stage through an anonymous host temp file.
    DeviceToDevice {
        src: Arc<Device>,
        src_path: String,
        dst: Arc<Device>,
        dst_path: String,
    },
}

pub fn copy_plan(src: &Resolved, dst: &Resolved) -> CopyPlan {
    match (src, dst) {
        (Resolved::Host(_), Resolved::Host(_)) => CopyPlan::SameSide,
        (Resolved::Device(a, _), Resolved::Device(b, _)) if Arc::ptr_eq(a, b) => CopyPlan::SameSide,
        (Resolved::Host(_), Resolved::Device(dst_dev, dst_path)) => CopyPlan::HostToDevice {
            dst: dst_dev.clone(),
            dst_path: dst_path.clone(),
        },
        (Resolved::Device(src_dev, src_path), Resolved::Host(_)) => CopyPlan::DeviceToHost {
            src: src_dev.clone(),
            src_path: src_path.clone(),
        },
        (Resolved::Device(src_dev, src_path), Resolved::Device(dst_dev, dst_path)) => CopyPlan::DeviceToDevice {
            src: src_dev.clone(),
            src_path: src_path.clone(),
            dst: dst_dev.clone(),
            dst_path: dst_path.clone(),
        },
    }
}
