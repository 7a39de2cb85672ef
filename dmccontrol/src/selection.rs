use std::sync::Arc;

use parking_lot::RwLock;

use crate::model::Device;

/// The device the user is currently driving, shared by discovery and the
/// transport controller.
///
/// Writes happen on the event dispatcher thread only; readers get a clone.
#[derive(Clone, Debug, Default)]
pub struct SelectedDevice {
    inner: Arc<RwLock<Option<Device>>>,
}

impl SelectedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<Device> {
        self.inner.read().clone()
    }

    pub fn is_selected(&self, udn: &str) -> bool {
        self.inner
            .read()
            .as_ref()
            .is_some_and(|device| device.has_udn(udn))
    }

    pub(crate) fn set(&self, device: Option<Device>) {
        *self.inner.write() = device;
    }

    /// Clears the selection if it is `udn`, returning the cleared device.
    pub(crate) fn take_if(&self, udn: &str) -> Option<Device> {
        let mut selected = self.inner.write();
        if selected.as_ref().is_some_and(|device| device.has_udn(udn)) {
            selected.take()
        } else {
            None
        }
    }
}
