use std::collections::HashMap;

use crate::model::{Device, DeviceId};

/// Known devices keyed by UDN, ignoring case, in arrival order.
#[derive(Debug, Default)]
pub struct DeviceSet {
    devices: HashMap<DeviceId, Device>,
    order: Vec<DeviceId>,
}

impl DeviceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `device` unless its UDN is already known. The first device seen
    /// for a UDN is kept.
    pub fn insert(&mut self, device: Device) -> bool {
        let id = device.id();
        if self.devices.contains_key(&id) {
            return false;
        }
        self.order.push(id.clone());
        self.devices.insert(id, device);
        true
    }

    pub fn remove(&mut self, udn: &str) -> Option<Device> {
        let id = DeviceId::from_udn(udn);
        let removed = self.devices.remove(&id)?;
        self.order.retain(|known| known != &id);
        Some(removed)
    }

    pub fn get(&self, udn: &str) -> Option<&Device> {
        self.devices.get(&DeviceId::from_udn(udn))
    }

    pub fn contains(&self, udn: &str) -> bool {
        self.get(udn).is_some()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Copy of the current contents, in arrival order.
    pub fn snapshot(&self) -> Vec<Device> {
        self.order
            .iter()
            .filter_map(|id| self.devices.get(id).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MEDIA_RENDERER_DEVICE_TYPE;

    fn device(udn: &str, name: &str) -> Device {
        Device::new(udn, name, MEDIA_RENDERER_DEVICE_TYPE)
    }

    #[test]
    fn first_seen_wins_ignoring_case() {
        let mut set = DeviceSet::new();
        assert!(set.insert(device("uuid:AAA", "first")));
        assert!(!set.insert(device("uuid:aaa", "second")));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("UUID:AAA").unwrap().friendly_name(), "first");
    }

    #[test]
    fn snapshot_keeps_arrival_order_after_removal() {
        let mut set = DeviceSet::new();
        set.insert(device("uuid:1", "one"));
        set.insert(device("uuid:2", "two"));
        set.insert(device("uuid:3", "three"));

        let removed = set.remove("UUID:2").unwrap();
        assert_eq!(removed.friendly_name(), "two");
        assert!(set.remove("uuid:2").is_none());

        let names: Vec<_> = set
            .snapshot()
            .iter()
            .map(|d| d.friendly_name().to_string())
            .collect();
        assert_eq!(names, vec!["one", "three"]);
    }
}
