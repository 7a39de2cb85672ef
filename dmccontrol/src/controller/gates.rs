use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::model::{Device, DeviceId};

/// One read/write gate per device.
///
/// Commands that change device state hold the write side for their whole
/// exchange; queries share the read side.
#[derive(Default)]
pub(crate) struct DeviceGates {
    gates: Mutex<HashMap<DeviceId, Arc<RwLock<()>>>>,
}

impl DeviceGates {
    pub(crate) fn gate(&self, device: &Device) -> Arc<RwLock<()>> {
        let mut gates = self.gates.lock();
        Arc::clone(gates.entry(device.id()).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MEDIA_RENDERER_DEVICE_TYPE;

    #[test]
    fn same_udn_shares_a_gate() {
        let gates = DeviceGates::default();
        let a = Device::new("uuid:Renderer", "a", MEDIA_RENDERER_DEVICE_TYPE);
        let b = Device::new("uuid:renderer", "b", MEDIA_RENDERER_DEVICE_TYPE);
        let c = Device::new("uuid:other", "c", MEDIA_RENDERER_DEVICE_TYPE);

        assert!(Arc::ptr_eq(&gates.gate(&a), &gates.gate(&b)));
        assert!(!Arc::ptr_eq(&gates.gate(&a), &gates.gate(&c)));

        let gate = gates.gate(&a);
        let _write = gate.write();
        assert!(gates.gate(&b).try_read().is_none());
        assert!(gates.gate(&c).try_write().is_some());
    }
}
