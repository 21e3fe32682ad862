//! Device registry — an ordered collection of attached boards plus a
//! pointer to the default one, mutated only under a single lock.

use crate::device::Device;
use std::sync::Arc;

struct RegistryInner {
    devices: Vec<Arc<Device>>,
    default: Option<Arc<Device>>,
    next_suffix: u32,
}

/// Thread-safe set of attached devices. `default` is always either `None`
/// or a member; names are unique; the suffix counter never reuses a value
/// within a process lifetime.
pub struct Registry {
    inner: parking_lot::RwLock<RegistryInner>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: parking_lot::RwLock::new(RegistryInner {
                devices: Vec::new(),
                default: None,
                next_suffix: 2,
            }),
        }
    }

    /// Add `device` to the registry. If a device with the same
    /// `short_name` is already present, it is closed and replaced first
    /// (clearing `default` if it pointed at the replaced device). If
    /// `display_name` collides with another registered device, a
    /// monotonic `-N` suffix is appended to make it unique.
    pub fn add(&self, device: Device) -> Arc<Device> {
        let mut inner = self.inner.write();

        if let Some(idx) = inner.devices.iter().position(|d| d.short_name() == device.short_name()) {
            let removed = inner.devices.remove(idx);
            removed.close();
            if inner.default.as_ref().is_some_and(|d| Arc::ptr_eq(d, &removed)) {
                inner.default = None;
            }
        }

        let base_name = device.display_name();
        if inner.devices.iter().any(|d| d.display_name() == base_name) {
            let suffix = inner.next_suffix;
            inner.next_suffix += 1;
            device.set_display_name(format!("{base_name}-{suffix}"));
        }

        let arc = Arc::new(device);
        inner.devices.push(arc.clone());
        if inner.default.is_none() {
            inner.default = Some(arc.clone());
        }
        arc
    }

    /// Close and remove the device registered under `short_name`, if any.
    pub fn remove_by_short_name(&self, short_name: &str) {
        let mut inner = self.inner.write();
        if let Some(idx) = inner.devices.iter().position(|d| d.short_name() == short_name) {
            let removed = inner.devices.remove(idx);
            removed.close();
            if inner.default.as_ref().is_some_and(|d| Arc::ptr_eq(d, &removed)) {
                inner.default = None;
            }
        }
    }

    /// Make `short_name`'s device the default, if registered.
    pub fn set_default(&self, short_name: &str) -> bool {
        let mut inner = self.inner.write();
        if let Some(dev) = inner.devices.iter().find(|d| d.short_name() == short_name).cloned() {
            inner.default = Some(dev);
            true
        } else {
            false
        }
    }

    /// Empty name returns the default device; otherwise an exact
    /// display-name match.
    pub fn find(&self, name: &str) -> Option<Arc<Device>> {
        let inner = self.inner.read();
        if name.is_empty() {
            return inner.default.clone();
        }
        inner.devices.iter().find(|d| d.display_name() == name).cloned()
    }

    pub fn default_device(&self) -> Option<Arc<Device>> {
        self.inner.read().default.clone()
    }

    /// Snapshot of all registered devices, for UI listing.
    pub fn list(&self) -> Vec<Arc<Device>> {
        self.inner.read().devices.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::tests_support::fake_device;

    #[test]
    fn first_added_device_becomes_default() {
        let registry = Registry::new();
        let a = registry.add(fake_device("s1", "pyboard"));
        assert!(Arc::ptr_eq(&registry.default_device().unwrap(), &a));
    }

    #[test]
    fn name_collisions_get_monotonic_suffixes() {
        let registry = Registry::new();
        registry.add(fake_device("s1", "pyboard"));
        let second = registry.add(fake_device("s2", "pyboard"));
        let third = registry.add(fake_device("s3", "pyboard"));
        assert_eq!(second.display_name(), "pyboard-2");
        assert_eq!(third.display_name(), "pyboard-3");

        let names: Vec<_> = registry.list().iter().map(|d| d.display_name()).collect();
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
        assert_eq!(names[0], "pyboard");
    }

    #[test]
    fn re_adding_same_short_name_replaces_and_clears_default() {
        let registry = Registry::new();
        let first = registry.add(fake_device("s1", "pyboard"));
        assert!(Arc::ptr_eq(&registry.default_device().unwrap(), &first));

        registry.add(fake_device("s1", "pyboard"));
        assert_eq!(registry.list().len(), 1);
        // A fresh default is assigned since the list became non-empty again
        // through the same `add` call.
        assert!(registry.default_device().is_some());
    }

    #[test]
    fn removing_default_clears_it() {
        let registry = Registry::new();
        registry.add(fake_device("s1", "pyboard"));
        registry.remove_by_short_name("s1");
        assert!(registry.default_device().is_none());
        assert!(registry.list().is_empty());
    }

    #[test]
    fn find_empty_name_returns_default() {
        let registry = Registry::new();
        let dev = registry.add(fake_device("s1", "pyboard"));
        let found = registry.find("").unwrap();
        assert!(Arc::ptr_eq(&found, &dev));
    }

    #[test]
    fn find_by_name_after_collision_suffix() {
        let registry = Registry::new();
        registry.add(fake_device("s1", "pyboard"));
        registry.add(fake_device("s2", "pyboard"));
        assert!(registry.find("pyboard-2").is_some());
        assert!(registry.find("pyboard-7").is_none());
    }
}
